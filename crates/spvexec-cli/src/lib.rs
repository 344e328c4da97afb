//! Manifest-driven runner for the SPIR-V execution harness.

pub mod manifest;

pub use manifest::{CaseFilter, Manifest};
