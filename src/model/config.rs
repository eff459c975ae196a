//! Model and Loss Selection
//!
//! The architecture and loss function are tagged variants resolved at
//! configuration-parse time: an unknown name fails immediately with the list
//! of valid choices, rather than surfacing at first use deep in the run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::unet::UnetConfig;
use crate::utils::error::ShipSegError;

/// Segmentation architecture variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelKind {
    /// Full-width U-Net (base 32 filters)
    Unet,
    /// Narrow U-Net for CPU runs and quick experiments
    UnetLite,
}

impl ModelKind {
    pub const ALL: &'static [ModelKind] = &[ModelKind::Unet, ModelKind::UnetLite];

    /// The model configuration this variant maps to.
    pub fn config(&self) -> UnetConfig {
        match self {
            ModelKind::Unet => UnetConfig::new(),
            ModelKind::UnetLite => UnetConfig::lite(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Unet => write!(f, "unet"),
            ModelKind::UnetLite => write!(f, "unet-lite"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = ShipSegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unet" => Ok(ModelKind::Unet),
            "unet-lite" | "unet_lite" => Ok(ModelKind::UnetLite),
            other => Err(ShipSegError::Config(format!(
                "unknown model '{}' (valid: unet, unet-lite)",
                other
            ))),
        }
    }
}

/// Loss function variants, all operating on raw logits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LossKind {
    /// Binary cross-entropy with logits
    Bce,
    /// Focal loss mixed with a log-dice term
    Focal,
    /// BCE plus a soft-dice penalty
    BceDice,
    /// BCE plus a soft-jaccard penalty
    BceJaccard,
}

impl LossKind {
    pub const ALL: &'static [LossKind] = &[
        LossKind::Bce,
        LossKind::Focal,
        LossKind::BceDice,
        LossKind::BceJaccard,
    ];
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossKind::Bce => write!(f, "bce"),
            LossKind::Focal => write!(f, "focal"),
            LossKind::BceDice => write!(f, "bce-dice"),
            LossKind::BceJaccard => write!(f, "bce-jaccard"),
        }
    }
}

impl FromStr for LossKind {
    type Err = ShipSegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bce" => Ok(LossKind::Bce),
            "focal" => Ok(LossKind::Focal),
            "bce-dice" | "bce_dice" => Ok(LossKind::BceDice),
            "bce-jaccard" | "bce_jaccard" => Ok(LossKind::BceJaccard),
            other => Err(ShipSegError::Config(format!(
                "unknown loss '{}' (valid: bce, focal, bce-dice, bce-jaccard)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_round_trip() {
        for kind in ModelKind::ALL {
            let parsed: ModelKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn test_loss_kind_round_trip() {
        for kind in LossKind::ALL {
            let parsed: LossKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn test_unknown_names_rejected_at_parse_time() {
        assert!("resnet34".parse::<ModelKind>().is_err());
        assert!("mse".parse::<LossKind>().is_err());
    }

    #[test]
    fn test_registry_maps_to_distinct_configs() {
        let full = ModelKind::Unet.config();
        let lite = ModelKind::UnetLite.config();
        assert!(lite.base_filters < full.base_filters);
    }
}
