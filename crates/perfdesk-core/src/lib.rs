pub mod config;
pub mod error;
pub mod events;
pub mod timestamp;
pub mod types;

pub use config::PerfdeskConfig;
pub use error::{PerfdeskError, Result};
pub use events::DomainEvent;
pub use timestamp::DateInput;
pub use types::*;
