//! Perfdesk store crate - the capability interface to a hierarchical
//! real-time key-value store.
//!
//! Defines the [`Store`] trait the data layer is written against, the
//! structured [`StoreError`] it reports, owned [`ListenerHandle`]s for
//! change listeners, time-ordered push keys, and [`MemoryStore`], a
//! complete in-process implementation used by tests and the CLI.

pub mod error;
pub mod memory;
pub mod path;
pub mod push_id;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use push_id::PushIdGenerator;
pub use store::{ListenTarget, ListenerHandle, OnChange, OnError, Store};
