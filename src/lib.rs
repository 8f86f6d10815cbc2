//! cerebus-core: typed connection layer for the Blackrock Cerebus NSP
//!
//! This crate wraps a Cerebus acquisition SDK binding behind one shared
//! connection handle. It features:
//!
//! - A single authoritative [`CerebusHandle`] owning connection lifecycle,
//!   merged configuration and the per-channel spike cache
//! - A typed seam ([`sdk::CerebusSdk`]) over the vendor binding, with a
//!   deterministic software NSP ([`sdk::simulator::NspSimulator`]) behind it
//! - Field-wise configuration merging that never clobbers sibling settings
//! - Vendor result codes normalized into structured errors or logged absence
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cerebus_core::{CerebusHandle, HandleOptions};
//! use cerebus_core::sdk::simulator::{NspSimulator, SimulatorConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sdk = NspSimulator::new(SimulatorConfig::default())?;
//!     let mut handle = CerebusHandle::new(sdk, HandleOptions::default());
//!
//!     let mut session = handle.session()?;
//!     for _ in 0..10 {
//!         if let Some(batch) = session.event_data() {
//!             println!("events on {} channels", batch.channels.len());
//!         }
//!     }
//!     // session drop closes the connection
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod error;
pub mod sdk;

// Re-export commonly used types for convenience
pub use config::{
    BufferParameters, CerebusOptions, ConnectionParameters, ConnectionParametersUpdate,
    HandleOptions, RangeParameters, SessionConfig, SessionConfigUpdate,
};
pub use connection::{CerebusHandle, ConnectionState, Session, SharedHandle};
pub use error::CbError;
pub use sdk::{
    CerebusSdk, Comment, ContinuousBatch, EventBatch, RecordingInfo, ResultCode, Rgba,
    SpikeWaveform, SystemParams, WaveformCursor,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
