//! # Cross-Module Test Suite
//!
//! Shared fakes for the clock and the serial link, plus end-to-end scenarios
//! that run the real threads against them.

pub mod support;
