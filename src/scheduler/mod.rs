//! Scheduler module
//!
//! Fires session/duration rotations at configured wall-clock times in a
//! single fixed timezone.

mod rotation;

pub use rotation::{RotationScheduler, ScheduleEntry, SchedulerState};
