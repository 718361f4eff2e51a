//! Unit scaling between user configuration and internal SI values.
//!
//! Internally everything is meters and radians. Configuration declares
//! what one user unit is worth, and these scales are applied exactly once
//! at the config boundary.

use serde::{Deserialize, Serialize};

/// Scale factors from user units to SI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Units {
    /// Meters per user length unit.
    #[serde(default = "default_unity")]
    pub m_per_length_units: f64,
    /// Radians per user angle unit.
    #[serde(default = "default_unity")]
    pub rad_per_angle_units: f64,
}

fn default_unity() -> f64 {
    1.0
}

impl Default for Units {
    fn default() -> Self {
        Self { m_per_length_units: 1.0, rad_per_angle_units: 1.0 }
    }
}

impl Units {
    #[inline]
    pub fn length_to_si(&self, v: f64) -> f64 {
        v * self.m_per_length_units
    }

    #[inline]
    pub fn angle_to_si(&self, v: f64) -> f64 {
        v * self.rad_per_angle_units
    }

    #[inline]
    pub fn length_from_si(&self, v: f64) -> f64 {
        v / self.m_per_length_units
    }

    #[inline]
    pub fn angle_from_si(&self, v: f64) -> f64 {
        v / self.rad_per_angle_units
    }

    /// Positive scales only.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.m_per_length_units <= 0.0 {
            return Err("m_per_length_units must be positive");
        }
        if self.rad_per_angle_units <= 0.0 {
            return Err("rad_per_angle_units must be positive");
        }
        Ok(())
    }
}
