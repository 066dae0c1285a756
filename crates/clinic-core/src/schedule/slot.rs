//! Fractional-hour slot arithmetic.
//!
//! A fractional hour encodes a time of day as decimal hours: 9.25 = 09:15,
//! 14.5 = 14:30. Minutes are obtained by rounding to the nearest minute.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::timezone::localize;
use super::{SlotError, SlotResult};
use crate::config::SchedulingConfig;

/// Tolerance when comparing fractional hours against the slot grid.
const GRID_EPSILON: f64 = 1e-6;

/// Fractional hour of midnight at the end of the day.
const END_OF_DAY: f64 = 24.0;

/// How the end of a slot is given. Exactly one form is authoritative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotEnd {
    /// Length in hours
    Duration(f64),
    /// Explicit end as a fractional hour
    EndHour(f64),
}

impl SlotEnd {
    /// Duration in hours for a slot starting at `start_hour`, never negative.
    pub fn duration_from(&self, start_hour: f64) -> f64 {
        match *self {
            SlotEnd::Duration(hours) => hours.max(0.0),
            SlotEnd::EndHour(end) => duration_of(start_hour, end),
        }
    }
}

/// Legal slot values: `[opening_hour, closing_hour]` in `slot_step` increments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotPolicy {
    pub opening_hour: f64,
    pub closing_hour: f64,
    pub slot_step: f64,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self::from_config(&SchedulingConfig::default())
    }
}

impl SlotPolicy {
    pub fn from_config(config: &SchedulingConfig) -> Self {
        Self {
            opening_hour: config.opening_hour,
            closing_hour: config.closing_hour,
            slot_step: config.slot_step,
        }
    }

    fn on_grid(&self, hour: f64) -> bool {
        let steps = (hour - self.opening_hour) / self.slot_step;
        (steps - steps.round()).abs() < GRID_EPSILON
    }

    fn in_range(&self, hour: f64) -> bool {
        hour >= self.opening_hour - GRID_EPSILON && hour <= self.closing_hour + GRID_EPSILON
    }

    /// True when `hour` is one of the selectable slot values.
    pub fn is_legal(&self, hour: f64) -> bool {
        hour.is_finite() && self.in_range(hour) && self.on_grid(hour)
    }

    /// Check a start hour against the grid.
    pub fn validate_start(&self, hour: f64) -> SlotResult<()> {
        if !hour.is_finite() || !self.in_range(hour) {
            return Err(SlotError::OutOfRange {
                hour,
                opening: self.opening_hour,
                closing: self.closing_hour,
            });
        }
        if !self.on_grid(hour) {
            return Err(SlotError::OffGrid {
                hour,
                step: self.slot_step,
            });
        }
        Ok(())
    }

    /// Check that a slot of `duration_hours` from `start_hour` ends by
    /// midnight. Negative durations count as zero.
    pub fn validate_duration(&self, start_hour: f64, duration_hours: f64) -> SlotResult<()> {
        if !duration_hours.is_finite() || start_hour + duration_hours.max(0.0) > END_OF_DAY + GRID_EPSILON {
            return Err(SlotError::InvalidDuration {
                start: start_hour,
                duration: duration_hours,
            });
        }
        Ok(())
    }

    /// Check an explicit end hour; ends before the start are allowed and clamp later.
    pub fn validate_end(&self, start_hour: f64, end_hour: f64) -> SlotResult<()> {
        if !end_hour.is_finite() || end_hour > END_OF_DAY + GRID_EPSILON {
            return Err(SlotError::InvalidHour(end_hour));
        }
        self.validate_duration(start_hour, duration_of(start_hour, end_hour))
    }

    /// Default end proposed when the start changes: one step later, but only
    /// if that value is itself a legal slot value.
    pub fn propose_end(&self, start_hour: f64) -> Option<f64> {
        let candidate = start_hour + self.slot_step;
        self.is_legal(candidate).then_some(candidate)
    }
}

/// Non-negative difference between two fractional hours.
pub fn duration_of(start_hour: f64, end_hour: f64) -> f64 {
    (end_hour - start_hour).max(0.0)
}

/// Whole minutes in a fractional hour value, rounded; negatives clamp to 0.
pub fn hours_to_minutes(hours: f64) -> i64 {
    if !hours.is_finite() || hours <= 0.0 {
        return 0;
    }
    (hours * 60.0).round() as i64
}

/// Render a duration as `H:MM`. Negative durations render as `0:00`.
pub fn format_duration(hours: f64) -> String {
    let minutes = hours_to_minutes(hours);
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Wall-clock time for a fractional hour in `[0, 24)`.
pub fn hour_to_time(hour: f64) -> SlotResult<NaiveTime> {
    if !hour.is_finite() || !(0.0..24.0).contains(&hour) {
        return Err(SlotError::InvalidHour(hour));
    }
    let minutes = hours_to_minutes(hour);
    if minutes >= 24 * 60 {
        return Err(SlotError::InvalidHour(hour));
    }
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
        .ok_or(SlotError::InvalidHour(hour))
}

/// A slot resolved to UTC instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub duration_hours: f64,
    /// `H:MM`
    pub duration_display: String,
}

/// Resolve a date plus fractional start/end in zone `tz` to UTC instants.
///
/// The end instant is the start instant plus the elapsed duration, so
/// `end_utc >= start_utc` holds across DST transitions.
pub fn compute_slot(date: NaiveDate, start_hour: f64, end: SlotEnd, tz: Tz) -> SlotResult<TimeSlot> {
    let local_start = date.and_time(hour_to_time(start_hour)?);
    let start_utc = localize(tz, local_start)?;

    let duration_hours = end.duration_from(start_hour);
    let invalid = || SlotError::InvalidDuration {
        start: start_hour,
        duration: duration_hours,
    };
    let (SlotEnd::Duration(raw) | SlotEnd::EndHour(raw)) = end;
    if !raw.is_finite() || !duration_hours.is_finite() || start_hour + duration_hours > END_OF_DAY + GRID_EPSILON {
        return Err(invalid());
    }
    let end_utc = TimeDelta::try_minutes(hours_to_minutes(duration_hours))
        .and_then(|elapsed| start_utc.checked_add_signed(elapsed))
        .ok_or_else(invalid)?;

    Ok(TimeSlot {
        start_utc,
        end_utc,
        duration_hours,
        duration_display: format_duration(duration_hours),
    })
}
