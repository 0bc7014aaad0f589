//! Core constants, error types, and environment seams.

pub mod constants;
mod error;
mod traits;

pub use error::{DeadReason, LinkError};
pub use traits::{Clock, SystemClock};
