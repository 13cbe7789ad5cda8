//! # Storage Backends
//!
//! Disk-backed implementations of `RuleStore`.

mod redb_graph;

pub use redb_graph::RedbGraph;
