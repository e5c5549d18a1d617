//! Core types for steadycall.
//!
//! This crate provides the transport-free pieces shared by the client and by
//! test servers that speak the same stream format.
//!
//! ## Modules
//!
//! - [`error`]: The failure taxonomy and status classification
//! - [`frame`]: Event stream framing

mod error;
pub mod frame;

pub use error::*;
pub use frame::{Frame, FrameError, StreamFormat, TrailerError};
