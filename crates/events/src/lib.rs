//! Domain events and the read-model plumbing that consumes them.

pub mod envelope;
pub mod event;
pub mod handler;
pub mod projection;

pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use projection::Projection;
