//! RepairDesk Core — domain models, error taxonomy and repository traits
//! shared by the storage and service layers.

pub mod clock;
pub mod error;
pub mod models;
pub mod repository;

pub use clock::{Clock, SteppingClock, SystemClock};
pub use error::{ErrorKind, Failure, RepairError, RepairResult};
