//! Core data models for the fire type classifier

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of input features the classifier and scaler are fit on
pub const NUM_FEATURES: usize = 6;

/// Display names of the feature slots, in model order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] =
    ["brightness", "bright_t31", "frp", "scan", "track", "confidence"];

/// Class label returned by the classifier
pub type ClassLabel = i64;

/// Bounds and default for one numeric input control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub min: f64,
    pub max: Option<f64>,
    pub default: f64,
}

impl FieldSpec {
    /// Check a submitted value against the control's bounds
    pub fn check(&self, value: f64) -> Result<f64, InputError> {
        if !value.is_finite() {
            return Err(InputError::NotFinite { field: self.name });
        }
        let above_max = self.max.map(|max| value > max).unwrap_or(false);
        if value < self.min || above_max {
            return Err(InputError::OutOfRange {
                field: self.name,
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(value)
    }
}

pub mod fields {
    use super::FieldSpec;

    pub const BRIGHTNESS: FieldSpec = FieldSpec {
        name: "brightness",
        label: "Brightness",
        min: 200.0,
        max: Some(600.0),
        default: 300.0,
    };

    pub const BRIGHT_T31: FieldSpec = FieldSpec {
        name: "bright_t31",
        label: "Brightness T31",
        min: 200.0,
        max: Some(400.0),
        default: 290.0,
    };

    pub const FRP: FieldSpec = FieldSpec {
        name: "frp",
        label: "Fire Radiative Power (FRP)",
        min: 0.0,
        max: None,
        default: 15.0,
    };

    pub const SCAN: FieldSpec = FieldSpec {
        name: "scan",
        label: "Scan",
        min: 0.0,
        max: None,
        default: 1.0,
    };

    pub const TRACK: FieldSpec = FieldSpec {
        name: "track",
        label: "Track",
        min: 0.0,
        max: None,
        default: 1.0,
    };

    /// Numeric controls in form layout order
    pub const NUMERIC: [FieldSpec; 5] = [BRIGHTNESS, BRIGHT_T31, FRP, SCAN, TRACK];
}

/// MODIS detection confidence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Low,
    Nominal,
    High,
}

impl Confidence {
    /// Options in dropdown order
    pub const ALL: [Confidence; 3] = [Confidence::Low, Confidence::Nominal, Confidence::High];

    /// Numeric code the model was fit on
    pub fn code(self) -> u8 {
        match self {
            Confidence::Low => 0,
            Confidence::Nominal => 1,
            Confidence::High => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Confidence::Low),
            1 => Some(Confidence::Nominal),
            2 => Some(Confidence::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Nominal => "nominal",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Confidence::Low),
            "nominal" => Ok(Confidence::Nominal),
            "high" => Ok(Confidence::High),
            other => Err(InputError::UnknownConfidence(other.to_string())),
        }
    }
}

/// One set of MODIS readings as entered in the form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub brightness: f64,
    pub bright_t31: f64,
    pub frp: f64,
    pub scan: f64,
    pub track: f64,
    pub confidence: Confidence,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            brightness: fields::BRIGHTNESS.default,
            bright_t31: fields::BRIGHT_T31.default,
            frp: fields::FRP.default,
            scan: fields::SCAN.default,
            track: fields::TRACK.default,
            confidence: Confidence::default(),
        }
    }
}

impl SensorReading {
    /// Build a reading, applying the same bounds the input controls enforce
    pub fn new(
        brightness: f64,
        bright_t31: f64,
        frp: f64,
        scan: f64,
        track: f64,
        confidence: Confidence,
    ) -> Result<Self, InputError> {
        Ok(Self {
            brightness: fields::BRIGHTNESS.check(brightness)?,
            bright_t31: fields::BRIGHT_T31.check(bright_t31)?,
            frp: fields::FRP.check(frp)?,
            scan: fields::SCAN.check(scan)?,
            track: fields::TRACK.check(track)?,
            confidence,
        })
    }

    /// Assemble the fixed-order feature row
    pub fn to_raw_features(&self) -> RawFeatures {
        RawFeatures([
            self.brightness,
            self.bright_t31,
            self.frp,
            self.scan,
            self.track,
            f64::from(self.confidence.code()),
        ])
    }
}

/// Feature row before scaling, in `FEATURE_NAMES` order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFeatures(pub [f64; NUM_FEATURES]);

impl RawFeatures {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Feature row after the scaler transform, same order and arity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledFeatures(pub Vec<f64>);

impl ScaledFeatures {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_codes() {
        assert_eq!(Confidence::Low.code(), 0);
        assert_eq!(Confidence::Nominal.code(), 1);
        assert_eq!(Confidence::High.code(), 2);
        for c in Confidence::ALL {
            assert_eq!(Confidence::from_code(c.code()), Some(c));
            assert_eq!(c.as_str().parse::<Confidence>().unwrap(), c);
        }
        assert_eq!(Confidence::from_code(3), None);
    }

    #[test]
    fn test_confidence_rejects_other_strings() {
        for s in ["", "Low", "HIGH", "medium", "nominal "] {
            assert!(s.parse::<Confidence>().is_err(), "{:?} should be rejected", s);
        }
    }

    #[test]
    fn test_default_reading_matches_controls() {
        let r = SensorReading::default();
        assert_eq!(r.brightness, 300.0);
        assert_eq!(r.bright_t31, 290.0);
        assert_eq!(r.frp, 15.0);
        assert_eq!(r.scan, 1.0);
        assert_eq!(r.track, 1.0);
        assert_eq!(r.confidence, Confidence::Low);
    }

    #[test]
    fn test_feature_order() {
        let r = SensorReading::new(300.0, 290.0, 15.0, 1.0, 1.0, Confidence::Nominal).unwrap();
        assert_eq!(r.to_raw_features().0, [300.0, 290.0, 15.0, 1.0, 1.0, 1.0]);

        let r = SensorReading::new(410.5, 301.0, 0.0, 2.5, 1.3, Confidence::High).unwrap();
        assert_eq!(r.to_raw_features().0, [410.5, 301.0, 0.0, 2.5, 1.3, 2.0]);
    }

    #[test]
    fn test_brightness_bounds_inclusive() {
        assert!(SensorReading::new(200.0, 290.0, 15.0, 1.0, 1.0, Confidence::Low).is_ok());
        assert!(SensorReading::new(600.0, 290.0, 15.0, 1.0, 1.0, Confidence::Low).is_ok());
        assert!(SensorReading::new(199.9, 290.0, 15.0, 1.0, 1.0, Confidence::Low).is_err());
        assert!(SensorReading::new(600.1, 290.0, 15.0, 1.0, 1.0, Confidence::Low).is_err());
    }

    #[test]
    fn test_lower_bounded_fields() {
        assert!(SensorReading::new(300.0, 290.0, -0.1, 1.0, 1.0, Confidence::Low).is_err());
        assert!(SensorReading::new(300.0, 290.0, 15.0, -1.0, 1.0, Confidence::Low).is_err());
        assert!(SensorReading::new(300.0, 290.0, 15.0, 1.0, -1.0, Confidence::Low).is_err());
        // No upper bound on frp
        assert!(SensorReading::new(300.0, 290.0, 1.0e6, 1.0, 1.0, Confidence::Low).is_ok());
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = SensorReading::new(f64::NAN, 290.0, 15.0, 1.0, 1.0, Confidence::Low).unwrap_err();
        assert!(matches!(err, InputError::NotFinite { field: "brightness" }));
        assert!(SensorReading::new(300.0, 290.0, f64::INFINITY, 1.0, 1.0, Confidence::Low).is_err());
    }
}
