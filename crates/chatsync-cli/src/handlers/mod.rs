//! Command handlers.

pub mod remote;
pub mod replay;
