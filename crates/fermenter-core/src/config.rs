use crate::fixed::{Fixed64, f64_to_fixed64};
use serde::{Deserialize, Serialize};

/// Known global domain of one weather quantity. Factor ranges interpolate
/// across it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherDomain {
    pub min: Fixed64,
    pub max: Fixed64,
}

impl WeatherDomain {
    pub fn new(min: Fixed64, max: Fixed64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, v: Fixed64) -> Fixed64 {
        if self.min <= self.max {
            v.clamp(self.min, self.max)
        } else {
            v.clamp(self.max, self.min)
        }
    }
}

/// Domains for each weather input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherDomains {
    pub sun_glow: WeatherDomain,
    pub rain_rate: WeatherDomain,
    pub snow_rate: WeatherDomain,
    pub wind_speed: WeatherDomain,
}

impl Default for WeatherDomains {
    fn default() -> Self {
        Self {
            sun_glow: WeatherDomain::new(Fixed64::ZERO, Fixed64::ONE),
            rain_rate: WeatherDomain::new(Fixed64::ZERO, Fixed64::ONE),
            snow_rate: WeatherDomain::new(Fixed64::ZERO, Fixed64::ONE),
            wind_speed: WeatherDomain::new(Fixed64::ZERO, f64_to_fixed64(1.5)),
        }
    }
}

/// Runtime settings shared by every fermenter on a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FermenterConfig {
    pub weather: WeatherDomains,
    /// A running batch below this speed factor reports as slow.
    pub slow_speed_threshold: Fixed64,
    /// When true a batch reaching full ruin resets the whole fermenter.
    /// Otherwise the ruined batch stays as wreckage until taken out.
    pub reset_on_ruin: bool,
    /// Per-kind capacity of the site's event ring buffers.
    pub event_buffer_capacity: usize,
}

impl Default for FermenterConfig {
    fn default() -> Self {
        Self {
            weather: WeatherDomains::default(),
            slow_speed_threshold: f64_to_fixed64(0.75),
            reset_on_ruin: false,
            event_buffer_capacity: 256,
        }
    }
}
