//! Core types shared by every PiNet subsystem.
//!
//! Currently this is the error taxonomy and the user-facing error reporting
//! in [`error`].

pub mod error;

pub use error::{ErrorContext, PinetError, user_friendly_error};
