//! robocmd Common Library
//!
//! Shared building blocks for the robocmd workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`hal`] - Clock and robot-state collaborators
//! - [`telemetry`] - Dashboard sink trait and in-memory table
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use robocmd_common::prelude::*;
//!
//! let clock = ManualClock::new();
//! clock.advance(0.02);
//! assert!(clock.now() > 0.0);
//! ```

pub mod config;
pub mod hal;
pub mod prelude;
pub mod telemetry;
