//! Lock Integration Tests
//!
//! Read, write and dump locks taken through sessions: exclusion, writer
//! preference, cancellation and schema-edit exclusivity.

#[path = "../common/mod.rs"]
mod common;

mod exclusion;
mod cancellation;
