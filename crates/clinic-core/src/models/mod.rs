//! Domain models for the clinic.

mod action;
mod appointment;
mod calendar;
mod consultation;
mod drawing;
mod patient;

pub use action::*;
pub use appointment::*;
pub use calendar::*;
pub use consultation::*;
pub use drawing::*;
pub use patient::*;
