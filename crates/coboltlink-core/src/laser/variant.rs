//! Laser families and model classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command set selected for a session.
///
/// Chosen once per connection from the model number and fixed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Baseline commands common to every laser
    #[default]
    Generic,
    /// 06-MLD modulated laser diodes
    Mld,
    /// 06-DPL modulated diode-pumped lasers
    Dpl,
    /// 08 series speaking SCPI
    Scpi,
}

/// Family code of the 06-01 series
const FAMILY_06: &str = "-06-";
/// Family code of the SCPI series
const FAMILY_08: &str = "-08-";
/// Class code excluded from the DPL family
const NON_DPL_CLASS: &str = "-71-";
/// Class codes marking a modulated DPL
const DPL_CLASSES: [&str; 2] = ["-91-", "-93-"];
/// Wavelength prefixes (nm) of the DPL lines
const DPL_WAVELENGTHS: [&str; 3] = ["0532", "0553", "0561"];

impl Variant {
    /// Pick the command set for a model number. Unknown or missing model
    /// numbers stay [`Variant::Generic`].
    pub fn classify(model_number: Option<&str>) -> Variant {
        let Some(model) = model_number else {
            return Variant::Generic;
        };

        if model.contains(FAMILY_08) {
            return Variant::Scpi;
        }

        if model.contains(FAMILY_06) {
            let dpl_marker = DPL_CLASSES.iter().any(|c| model.contains(c))
                || DPL_WAVELENGTHS.iter().any(|w| model.starts_with(w));
            if dpl_marker && !model.contains(NON_DPL_CLASS) {
                return Variant::Dpl;
            }
            return Variant::Mld;
        }

        Variant::Generic
    }

    /// Whether this command set has modulation commands
    pub fn supports_modulation(&self) -> bool {
        !matches!(self, Variant::Generic)
    }

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Generic => "generic",
            Variant::Mld => "06-MLD",
            Variant::Dpl => "06-DPL",
            Variant::Scpi => "SCPI",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Variant::Generic),
            "mld" | "06-mld" => Ok(Variant::Mld),
            "dpl" | "06-dpl" => Ok(Variant::Dpl),
            "scpi" => Ok(Variant::Scpi),
            other => Err(format!("unknown laser variant '{other}'")),
        }
    }
}
