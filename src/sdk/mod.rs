// src/sdk/mod.rs
//! Binding seam for the Cerebus acquisition SDK

pub mod simulator;
pub mod traits;
pub mod types;

pub use traits::*;
pub use types::*;
