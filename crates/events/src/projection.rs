use crate::{Event, EventEnvelope};

/// A projection builds a read model from domain events.
///
/// Read models are **disposable**: the analytics counters can always be
/// rebuilt from the stored records, so a projection only has to keep up with
/// live traffic.
///
/// ## Idempotency
///
/// Each envelope carries a unique `event_id`; implementations that can see the
/// same envelope twice should skip ids they already applied.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    ///
    /// Events that are not relevant to the projection are ignored.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
