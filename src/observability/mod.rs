//! Observability subsystem.
//!
//! All subsystems log through `tracing` with structured fields; this module
//! only owns subscriber setup.

pub mod logging;
