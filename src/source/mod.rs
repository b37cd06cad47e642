//! Energy event sources feeding the accumulator.

/// Seeded synthetic household profile.
pub mod synthetic;
pub mod types;

pub use synthetic::SyntheticSource;
pub use types::{EventSource, RecordedEvents};
