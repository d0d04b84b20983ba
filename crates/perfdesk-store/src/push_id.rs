//! Time-ordered unique keys for insert-with-generated-key.
//!
//! A key is 20 characters: 8 encode the millisecond timestamp and 12 are
//! random. Keys sort lexicographically in creation order, and keys minted in
//! the same millisecond increment the random tail so ordering still holds.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const TIME_LEN: usize = 8;
const RAND_LEN: usize = 12;

#[derive(Default)]
struct State {
    last_millis: i64,
    last_rand: [u8; RAND_LEN],
}

/// Generator for push keys. Safe to share between threads.
#[derive(Default)]
pub struct PushIdGenerator {
    state: Mutex<State>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a key for the current instant.
    pub fn generate(&self) -> String {
        self.generate_at(Utc::now().timestamp_millis())
    }

    /// Mint a key as if the clock read `millis`. A clock that steps back is
    /// treated as standing still.
    pub fn generate_at(&self, millis: i64) -> String {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = millis.max(state.last_millis);
        if now == state.last_millis && state.last_rand != [0; RAND_LEN] {
            increment(&mut state.last_rand);
        } else {
            let mut rng = rand::rng();
            for slot in state.last_rand.iter_mut() {
                *slot = rng.random_range(0..64);
            }
            // An all-zero tail is reserved to mean "not yet seeded".
            if state.last_rand == [0; RAND_LEN] {
                state.last_rand[RAND_LEN - 1] = 1;
            }
        }
        state.last_millis = now;

        let mut key = [0u8; TIME_LEN + RAND_LEN];
        let mut remaining = now.max(0) as u64;
        for slot in key[..TIME_LEN].iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }
        for (slot, digit) in key[TIME_LEN..].iter_mut().zip(state.last_rand.iter()) {
            *slot = PUSH_CHARS[*digit as usize];
        }

        key.iter().map(|&b| b as char).collect()
    }
}

/// Add one to a base-64 digit string, carrying leftwards.
fn increment(digits: &mut [u8; RAND_LEN]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shape() {
        let key = PushIdGenerator::new().generate();
        assert_eq!(key.len(), 20);
        assert!(key.bytes().all(|b| PUSH_CHARS.contains(&b)));
    }

    #[test]
    fn test_same_millisecond_keys_are_ordered() {
        let generator = PushIdGenerator::new();
        let keys: Vec<String> = (0..200).map(|_| generator.generate_at(1_700_000_000_000)).collect();
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_later_time_sorts_later() {
        let generator = PushIdGenerator::new();
        let a = generator.generate_at(1_000);
        let b = generator.generate_at(2_000);
        assert!(a < b);
        assert_ne!(a[..TIME_LEN], b[..TIME_LEN]);
    }

    #[test]
    fn test_clock_step_back_keeps_order() {
        let generator = PushIdGenerator::new();
        let a = generator.generate_at(5_000);
        let b = generator.generate_at(4_000);
        assert!(a < b);
    }

    #[test]
    fn test_increment_carries() {
        let mut digits = [0u8; RAND_LEN];
        digits[RAND_LEN - 1] = 63;
        digits[RAND_LEN - 2] = 63;
        increment(&mut digits);
        assert_eq!(digits[RAND_LEN - 1], 0);
        assert_eq!(digits[RAND_LEN - 2], 0);
        assert_eq!(digits[RAND_LEN - 3], 1);
    }
}
