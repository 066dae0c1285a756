//! Appointment time-slot computation.
//!
//! Converts fractional-hour slots on a calendar date into UTC instants using
//! the acting user's time zone, and validates slots against the clinic grid.

mod slot;
mod timezone;

pub use slot::*;
pub use timezone::*;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Slot errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlotError {
    #[error("Start hour {hour} is outside clinic hours ({opening}-{closing})")]
    OutOfRange { hour: f64, opening: f64, closing: f64 },

    #[error("Start hour {hour} is not a multiple of {step} hours")]
    OffGrid { hour: f64, step: f64 },

    #[error("Invalid fractional hour: {0}")]
    InvalidHour(f64),

    #[error("A {duration} hour slot starting at {start} does not end within the day")]
    InvalidDuration { start: f64, duration: f64 },

    #[error("Unknown time zone: {0}")]
    UnknownTimezone(String),

    #[error("Local time {0} does not exist in the selected time zone")]
    NonexistentLocalTime(NaiveDateTime),
}

pub type SlotResult<T> = Result<T, SlotError>;
