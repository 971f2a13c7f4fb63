//! Engine Integration Tests
//!
//! Tests for dirstore-engine: transactions, checkpoints, namespaces,
//! hooks, queries and crash recovery.

#[path = "../common/mod.rs"]
mod common;

mod checkpoints;
mod hooks;
mod namespaces;
mod queries;
mod recovery;
mod transactions;
