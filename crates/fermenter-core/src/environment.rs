//! Environment collaborator interface.
//!
//! The core never computes weather or temperature; hosts sample them per
//! location and hand the values in. All sampling is a pure read.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// A cell position on the host map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub z: i32,
}

impl Location {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Ambient conditions at a fermenter's location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSample {
    /// Ambient temperature in degrees Celsius.
    pub temperature: Fixed64,
    pub sun_glow: Fixed64,
    pub rain_rate: Fixed64,
    pub snow_rate: Fixed64,
    pub wind_speed: Fixed64,
    /// Fraction of the building's footprint under a roof, in `[0, 1]`.
    pub roof_fraction: Fixed64,
}

impl EnvironmentSample {
    /// Calm indoor conditions at the given temperature: no sun, rain, snow or
    /// wind, fully roofed.
    pub fn indoors(temperature: Fixed64) -> Self {
        Self {
            temperature,
            sun_glow: Fixed64::ZERO,
            rain_rate: Fixed64::ZERO,
            snow_rate: Fixed64::ZERO,
            wind_speed: Fixed64::ZERO,
            roof_fraction: Fixed64::ONE,
        }
    }

    /// Open-air conditions at the given temperature with no weather.
    pub fn outdoors(temperature: Fixed64) -> Self {
        Self {
            roof_fraction: Fixed64::ZERO,
            ..Self::indoors(temperature)
        }
    }

    /// Share of the sky left open, `1 - roof_fraction`, clamped to `[0, 1]`.
    pub fn open_sky(&self) -> Fixed64 {
        (Fixed64::ONE - self.roof_fraction).clamp(Fixed64::ZERO, Fixed64::ONE)
    }
}

/// Supplies ambient conditions for a location.
pub trait EnvironmentSampler {
    fn sample(&self, location: Location) -> EnvironmentSample;
}

/// A sampler that reports the same conditions everywhere.
#[derive(Debug, Clone, Copy)]
pub struct ConstantEnvironment(pub EnvironmentSample);

impl EnvironmentSampler for ConstantEnvironment {
    fn sample(&self, _location: Location) -> EnvironmentSample {
        self.0
    }
}

impl<F> EnvironmentSampler for F
where
    F: Fn(Location) -> EnvironmentSample,
{
    fn sample(&self, location: Location) -> EnvironmentSample {
        self(location)
    }
}

/// Fraction of a footprint that is roofed. An empty footprint counts as
/// unroofed.
pub fn roof_fraction(roofed_tiles: u32, total_tiles: u32) -> Fixed64 {
    if total_tiles == 0 {
        return Fixed64::ZERO;
    }
    Fixed64::from_num(roofed_tiles.min(total_tiles)) / Fixed64::from_num(total_tiles)
}

/// Externally supplied switches that must all be on for a batch to make
/// progress. They never gate spoilage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalGates {
    pub fueled: bool,
    pub powered: bool,
    pub switched_on: bool,
}

impl Default for OperationalGates {
    fn default() -> Self {
        Self {
            fueled: true,
            powered: true,
            switched_on: true,
        }
    }
}

impl OperationalGates {
    pub fn all_open(&self) -> bool {
        self.fueled && self.powered && self.switched_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roof_fraction_of_partial_footprint() {
        assert_eq!(roof_fraction(1, 2), Fixed64::from_num(0.5));
        assert_eq!(roof_fraction(0, 4), Fixed64::ZERO);
        assert_eq!(roof_fraction(4, 4), Fixed64::ONE);
    }

    #[test]
    fn roof_fraction_empty_footprint_is_zero() {
        assert_eq!(roof_fraction(0, 0), Fixed64::ZERO);
    }

    #[test]
    fn gates_require_all_open() {
        assert!(OperationalGates::default().all_open());
        let unpowered = OperationalGates {
            powered: false,
            ..Default::default()
        };
        assert!(!unpowered.all_open());
    }

    #[test]
    fn closure_sampler() {
        let sampler = |loc: Location| EnvironmentSample::outdoors(Fixed64::from_num(loc.x));
        assert_eq!(sampler.sample(Location::new(12, 0)).temperature, Fixed64::from_num(12));
    }

    #[test]
    fn open_sky_complements_roof() {
        let s = EnvironmentSample {
            roof_fraction: Fixed64::from_num(0.25),
            ..EnvironmentSample::outdoors(Fixed64::ZERO)
        };
        assert_eq!(s.open_sky(), Fixed64::from_num(0.75));
    }
}
