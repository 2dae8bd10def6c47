//! Compile-cycle orchestration for relaybuild.
//!
//! This crate ties together fragment discovery, the fetch join, the build
//! service client, and artifact injection into one cycle (`compile_cycle`),
//! fronted by a configure-once [`pipeline::Session`].

pub mod pipeline;

pub use pipeline::{CycleReport, Session, SilentStatus, StatusReporter, compile_cycle};
