//! # CoboltLink Core Library
//!
//! Core functionality for driving Cobolt laser controllers over a serial link.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A rate-limited, line-framed command channel
//! - Device discovery by port or by serial number
//! - Identification and model-driven classification of the laser
//! - Per-family command vocabularies with mW/mA host units
//! - A simulated laser for tests and offline use
//!
//! ## Supported families
//!
//! - 06-MLD (modulated laser diodes)
//! - 06-DPL (modulated diode-pumped lasers)
//! - 08 series (SCPI command set)
//! - Any other Cobolt laser through the generic command set
//!
//! ## Example
//!
//! ```rust,ignore
//! use coboltlink_core::prelude::*;
//!
//! let mut laser = Laser::connect(ConnectTarget::BySerial("12345".into()), LaserConfig::default())?;
//! println!("{laser}");
//!
//! laser.constant_power(Some(12.5))?;
//! laser.turn_on()?;
//! println!("P = {} mW", laser.power()?);
//! laser.shutdown()?;
//! ```

pub mod config;
pub mod laser;
pub mod protocol;
pub mod simulator;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigError, LaserConfig};
    pub use crate::laser::{
        list_lasers, AutostartState, DeviceIdentity, Fault, Laser, ModulationState,
        ModulationSubMode, OperatingMode, Variant,
    };
    pub use crate::protocol::{
        CommandChannel, ConnectTarget, PortInfo, PortProvider, ProbeSkip, ProtocolError,
        SystemPorts, Transport,
    };
    pub use crate::simulator::{SimulatedBus, SimulatedLaser};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
