//! Event model and builders.

mod builder;
mod model;

pub use builder::{FixedEventBuilder, FlexibleEventBuilder};
pub use model::{Event, EventId, EventKind, TimeSpan};
