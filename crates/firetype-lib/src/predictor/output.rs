//! Label resolution for display
//!
//! Maps the classifier's numeric label to a fire category, display text
//! and banner colour. Total: unmapped labels resolve to `Unknown`.

use crate::models::ClassLabel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Banner colour of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayColor {
    Green,
    Orange,
    Blue,
    Gray,
}

impl DisplayColor {
    /// CSS colour value used for the banner background
    pub fn css(self) -> &'static str {
        match self {
            DisplayColor::Green => "#4CAF50",
            DisplayColor::Orange => "#FF9800",
            DisplayColor::Blue => "#2196F3",
            DisplayColor::Gray => "gray",
        }
    }
}

/// MODIS fire type categories known to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireCategory {
    VegetationFire,
    OtherStaticLandSource,
    OffshoreFire,
    Unknown,
}

impl FireCategory {
    pub const ALL: [FireCategory; 4] = [
        FireCategory::VegetationFire,
        FireCategory::OtherStaticLandSource,
        FireCategory::OffshoreFire,
        FireCategory::Unknown,
    ];

    pub fn from_label(label: ClassLabel) -> Self {
        match label {
            0 => FireCategory::VegetationFire,
            2 => FireCategory::OtherStaticLandSource,
            3 => FireCategory::OffshoreFire,
            _ => FireCategory::Unknown,
        }
    }

    pub fn display_text(self) -> &'static str {
        match self {
            FireCategory::VegetationFire => "Vegetation Fire",
            FireCategory::OtherStaticLandSource => "Other Static Land Source",
            FireCategory::OffshoreFire => "Offshore Fire",
            FireCategory::Unknown => "Unknown",
        }
    }

    pub fn color(self) -> DisplayColor {
        match self {
            FireCategory::VegetationFire => DisplayColor::Green,
            FireCategory::OtherStaticLandSource => DisplayColor::Orange,
            FireCategory::OffshoreFire => DisplayColor::Blue,
            FireCategory::Unknown => DisplayColor::Gray,
        }
    }

    /// Short name for metric labels and structured logs
    pub fn as_str(self) -> &'static str {
        match self {
            FireCategory::VegetationFire => "vegetation_fire",
            FireCategory::OtherStaticLandSource => "other_static_land_source",
            FireCategory::OffshoreFire => "offshore_fire",
            FireCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FireCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

/// Display text and colour for a label
pub fn resolve_label(label: ClassLabel) -> (&'static str, DisplayColor) {
    let category = FireCategory::from_label(label);
    (category.display_text(), category.color())
}
