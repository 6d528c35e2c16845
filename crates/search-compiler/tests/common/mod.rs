//! Common test utilities for search compiler testing.
//!
//! - [`fixtures`] - Registry and tenant policy fixtures
//! - [`harness`] - Compiler harness bound to the fixtures
//! - [`assertions`] - Result assertions
//! - [`evaluator`] - In-memory evaluation of compiled queries

#![allow(dead_code)]

pub mod assertions;
pub mod evaluator;
pub mod fixtures;
pub mod harness;
