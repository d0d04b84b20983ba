//! Owned subscription handles.
//!
//! A [`Subscription`] owns whichever store listener currently feeds it.
//! For query subscriptions that listener can change once, from the indexed
//! query to the collection-scan fallback; the swap happens under the
//! subscription's own lock and bumps a generation number so that late
//! deliveries from the retired listener are ignored.
//!
//! Every delivery runs under the subscription's delivery gate. `cancel`
//! and the fallback swap pass through the same gate, so once either has
//! returned no delivery from before it can still be running.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use perfdesk_store::ListenerHandle;

/// Callback fed by a subscription.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

pub(crate) const PRIMARY: u64 = 1;
pub(crate) const FALLBACK: u64 = 2;

#[derive(Default)]
struct Slot {
    current: Option<ListenerHandle>,
    fell_back: bool,
}

pub(crate) struct Shared {
    cancelled: AtomicBool,
    generation: AtomicU64,
    slot: Mutex<Slot>,
    gate: Mutex<()>,
    /// Thread currently inside a delivery, if any.
    delivering: Mutex<Option<ThreadId>>,
}

/// Clears the delivering thread when a delivery ends, even by panic.
struct DeliveryMark<'a>(&'a Shared);

impl Drop for DeliveryMark<'_> {
    fn drop(&mut self) {
        *lock(&self.0.delivering) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Shared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            generation: AtomicU64::new(PRIMARY),
            slot: Mutex::new(Slot::default()),
            gate: Mutex::new(()),
            delivering: Mutex::new(None),
        })
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        lock(&self.slot)
    }

    fn delivering_here(&self) -> bool {
        *lock(&self.delivering) == Some(thread::current().id())
    }

    /// Run `deliver` if listener `generation` is still live, holding the
    /// delivery gate for the whole call. A delivery nested inside another
    /// on the same thread (a callback that writes to the store) runs
    /// without taking the gate again.
    pub(crate) fn deliver(&self, generation: u64, deliver: impl FnOnce()) {
        if self.delivering_here() {
            if self.is_live(generation) {
                deliver();
            }
            return;
        }
        let _gate = lock(&self.gate);
        *lock(&self.delivering) = Some(thread::current().id());
        let _mark = DeliveryMark(self);
        if self.is_live(generation) {
            deliver();
        }
    }

    /// Wait for a delivery running on another thread to finish.
    fn quiesce(&self) {
        if !self.delivering_here() {
            drop(lock(&self.gate));
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether a delivery from listener `generation` may reach the callback.
    pub(crate) fn is_live(&self, generation: u64) -> bool {
        !self.is_cancelled() && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Store the handle returned by registering the primary listener.
    /// If the subscription was cancelled or already fell back in the
    /// meantime, the handle is released instead.
    pub(crate) fn install_primary(&self, handle: ListenerHandle) {
        let mut slot = self.slot();
        if self.is_cancelled() || slot.fell_back {
            drop(slot);
            handle.cancel();
        } else {
            slot.current = Some(handle);
        }
    }

    /// Retire the primary listener ahead of registering the fallback.
    /// Returns false when there is nothing to fall back from: the
    /// subscription was cancelled or has already switched.
    pub(crate) fn begin_fallback(&self) -> bool {
        let retired = {
            let mut slot = self.slot();
            if self.is_cancelled() || slot.fell_back {
                return false;
            }
            slot.fell_back = true;
            self.generation.store(FALLBACK, Ordering::SeqCst);
            slot.current.take()
        };
        self.quiesce();
        if let Some(handle) = retired {
            handle.cancel();
        }
        true
    }

    /// Store the fallback listener's handle, unless the subscription was
    /// cancelled while it was being registered.
    pub(crate) fn install_fallback(&self, handle: ListenerHandle) {
        let mut slot = self.slot();
        if self.is_cancelled() {
            drop(slot);
            handle.cancel();
        } else {
            slot.current = Some(handle);
        }
    }

    /// The store terminated listener `generation` on its own. Forget its
    /// handle so the subscription reports that it is no longer listening.
    pub(crate) fn listener_lost(&self, generation: u64) {
        let lost = {
            let mut slot = self.slot();
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            slot.current.take()
        };
        drop(lost);
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.quiesce();
        let current = self.slot().current.take();
        if let Some(handle) = current {
            handle.cancel();
        }
    }

    fn fell_back(&self) -> bool {
        self.slot().fell_back
    }

    fn has_listener(&self) -> bool {
        self.slot().current.as_ref().is_some_and(ListenerHandle::is_active)
    }
}

/// A live subscription. Cancel it explicitly or drop it.
///
/// `cancel` is idempotent, and once it returns the callback is never
/// invoked again. If a delivery is running on another thread, `cancel`
/// waits for it. A callback may cancel its own subscription.
pub struct Subscription {
    shared: Arc<Shared>,
}

impl Subscription {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Whether the subscription has switched to the collection-scan
    /// fallback.
    pub fn is_degraded(&self) -> bool {
        self.shared.fell_back()
    }

    /// Whether a store listener is currently registered for this
    /// subscription.
    pub fn is_listening(&self) -> bool {
        !self.shared.is_cancelled() && self.shared.has_listener()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}
