//! Core data models for the storage gateway.
//!
//! None of these persist past a single request: keys are derived per call,
//! objects stream straight through to the backend and presigned URLs are
//! re-signed every time they are asked for.

pub mod key;
pub mod object;
pub mod presigned;
