//! Time-axis primitives: day boundaries and earliest-fit slot search.

mod day;
mod slot_finder;

pub use day::DayWindow;
pub use slot_finder::{Gap, SlotFinder, SlotSearch};
