//! Domain types shared by every mvbot crate.
//!
//! Holds no runtime state and depends on no other workspace crate. The
//! [`job`] module owns the job record and its state machine; the engine
//! drives transitions through the methods defined there.

pub mod error;
pub mod job;
pub mod job_events;
pub mod types;
