//! Common trait for event sources.

use crate::sim::types::EnergyEvent;

/// Anything that can supply an ordered stream of energy events.
///
/// The core never pulls from a source lazily: callers materialise the full
/// event list first and hand the slice to the accumulator and valuator.
pub trait EventSource {
    /// Returns the complete event list in timestamp order.
    fn events(&mut self) -> Vec<EnergyEvent>;

    /// Returns a human-readable name for the source.
    fn source_type(&self) -> &'static str;
}

/// Events that were already loaded from elsewhere, e.g. a recorded sheet.
#[derive(Debug, Clone, Default)]
pub struct RecordedEvents {
    events: Vec<EnergyEvent>,
}

impl RecordedEvents {
    pub fn new(events: Vec<EnergyEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for RecordedEvents {
    fn events(&mut self) -> Vec<EnergyEvent> {
        self.events.clone()
    }

    fn source_type(&self) -> &'static str {
        "Recorded"
    }
}
