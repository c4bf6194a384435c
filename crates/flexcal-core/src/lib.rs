//! # flexcal core library
//!
//! Calendar events come in two kinds: fixed events that never move, and
//! flexible events that may be placed anywhere inside a permitted window.
//! This library places new flexible events in the earliest free gap and
//! re-packs a whole day's flexible events so that as few of them as
//! possible overlap.
//!
//! ## Architecture
//!
//! - **Event**: the fixed/flexible event model and its builders
//! - **Timeline**: day boundaries and the earliest-fit slot finder
//! - **Optimizer**: a discrete-time integer program over one day
//! - **Storage**: SQLite event storage and TOML configuration
//! - **Sync**: the external calendar seam and a Google Calendar client
//!
//! ## Key Components
//!
//! - [`FlexibleEventBuilder`]: places a new flexible event
//! - [`DayOptimizer`]: minimizes overlaps within a day and writes back moves
//! - [`EventDb`]: event persistence
//! - [`Config`]: configuration management
//! - [`CalendarService`]: trait for external calendars

pub mod error;
pub mod event;
pub mod optimizer;
pub mod storage;
pub mod sync;
pub mod timeline;

pub use error::{CalendarError, ConfigError, SchedulerError, StoreError, ValidationError};
pub use event::{Event, EventId, EventKind, FixedEventBuilder, FlexibleEventBuilder, TimeSpan};
pub use optimizer::{DayOptimizer, IlpSolver, OptimizationReport, PlacementSolver, Relocation};
pub use storage::{Config, EventDb, EventStore, MemoryEventStore};
pub use sync::{CalendarService, EventManager, GoogleCalendarClient};
pub use timeline::{DayWindow, SlotFinder, SlotSearch};
