//! THA Test Harness - Simulation and validation for the animator
//!
//! This crate provides:
//! - Mock inference adapters (pose probe, flaky, slow and recording)
//! - A simulated-time harness for the frame driver
//! - End-to-end scenarios over the full pipeline

pub mod adapters;
pub mod integration;
pub mod simulation;

pub use adapters::*;
pub use integration::*;
pub use simulation::*;
