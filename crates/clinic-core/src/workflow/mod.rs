//! Clinic workflows: the named actions invoked by the host application.
//!
//! Each workflow borrows the [`Database`](crate::db::Database) and runs as a
//! single SQLite transaction. Any error rolls the whole unit back.

mod appointments;
mod calendar;
mod clinical;
mod lifecycle;
mod registry;

pub use appointments::*;
pub use calendar::*;
pub use clinical::*;
pub use lifecycle::*;
pub use registry::*;

use chrono::NaiveDate;
use thiserror::Error;

use crate::audit::AuditError;
use crate::db::DbError;
use crate::schedule::{resolve_timezone, SlotError};

/// Workflow errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Business rule violation, shown to the user as-is
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid time slot: {0}")]
    Slot(#[from] SlotError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(e: rusqlite::Error) -> Self {
        WorkflowError::Database(e.into())
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// The staff member performing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    pub user_id: String,
    /// IANA zone from the user's preferences
    pub timezone: Option<String>,
}

impl ActingUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            timezone: None,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Current date in the user's zone (or `fallback_tz`).
    pub fn today(&self, fallback_tz: &str) -> WorkflowResult<NaiveDate> {
        let tz = resolve_timezone(self.timezone.as_deref(), fallback_tz)?;
        Ok(chrono::Utc::now().with_timezone(&tz).date_naive())
    }
}
