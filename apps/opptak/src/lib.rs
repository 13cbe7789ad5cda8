//! # Opptak Application Library
//!
//! The HTTP API, CLI, catalog import and configuration loading of the
//! `opptak` binary, exposed as a library for integration tests.

pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
