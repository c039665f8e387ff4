//! Laser sessions
//!
//! A [`Laser`] is an identified device on an open command channel. The
//! command set it speaks is a [`Variant`] chosen from the model number right
//! after identification; every operation goes through the variant's
//! [`Vocabulary`] and converts between host units (mW, mA) and the units the
//! firmware expects.

pub mod commands;
pub mod identity;
mod modulation;
mod session;
pub mod status;
pub mod units;
mod variant;

pub use commands::{Operation, Vocabulary};
pub use identity::{derive_legacy_model, identify, DeviceIdentity};
pub use modulation::ModulationSubMode;
pub use session::{list_lasers, Laser};
pub use status::{AutostartState, Fault, ModulationState, OperatingMode};
pub use variant::Variant;
