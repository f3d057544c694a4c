//! Processing options and the instruction they select.

use serde::{Deserialize, Serialize};

/// Aggressiveness used when none is given.
pub const DEFAULT_AGGRESSIVENESS: u8 = 50;

/// Options controlling how the remote model is instructed.
///
/// The value is replaced wholesale on change and read once, when a request
/// is started; an in-flight request keeps the options it captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// How hard the model should try, from 0 to 100.
    pub aggressiveness: u8,
    /// Only detect watermarks. Currently not consulted when building requests.
    pub detect_only: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            aggressiveness: DEFAULT_AGGRESSIVENESS,
            detect_only: false,
        }
    }
}

impl ProcessingOptions {
    /// Create options, clamping `aggressiveness` to 100.
    #[must_use]
    pub fn new(aggressiveness: u8, detect_only: bool) -> Self {
        Self {
            aggressiveness: aggressiveness.min(100),
            detect_only,
        }
    }

    /// Copy of these options with a different aggressiveness (clamped to 100).
    #[must_use]
    pub fn with_aggressiveness(self, aggressiveness: u8) -> Self {
        Self::new(aggressiveness, self.detect_only)
    }

    /// The instruction template these options select.
    #[must_use]
    pub fn instruction(&self) -> Instruction {
        Instruction::for_aggressiveness(self.aggressiveness)
    }
}

/// The three instruction templates sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Remove only obvious overlays and keep everything else.
    Gentle,
    /// Remove the watermark and fill the area in.
    Balanced,
    /// Remove every overlay and reconstruct the background.
    Aggressive,
}

impl Instruction {
    /// Pick a template: below 30 is gentle, above 70 is aggressive.
    #[must_use]
    pub fn for_aggressiveness(aggressiveness: u8) -> Self {
        if aggressiveness < 30 {
            Self::Gentle
        } else if aggressiveness > 70 {
            Self::Aggressive
        } else {
            Self::Balanced
        }
    }

    /// The natural-language prompt for this template.
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Gentle => {
                "Gently remove the most obvious watermarks or text overlays from this image, \
                 preserving all other details."
            }
            Self::Balanced => {
                "Remove the watermark from this image. Fill in the removed areas to match the \
                 background seamlessly."
            }
            Self::Aggressive => {
                "Aggressively remove all watermarks, text, logos, and transparent patterns \
                 overlaying this image. Reconstruct the background where the watermarks were \
                 removed."
            }
        }
    }

    /// Short label, as shown next to the aggressiveness control.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Gentle => "Gentle",
            Self::Balanced => "Balanced",
            Self::Aggressive => "Aggressive",
        }
    }
}
