use crate::config::{WeatherDomain, WeatherDomains};
use crate::environment::EnvironmentSample;
use crate::filter::ItemFilter;
use crate::fixed::{Fixed64, f64_to_fixed64, lerp_double, lerp_double_clamped};
use crate::id::ItemKindId;
use crate::quality::{QualityCategory, QualityThresholds};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

/// A closed temperature interval in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min: Fixed64,
    pub max: Fixed64,
}

impl TemperatureRange {
    pub fn new(min: Fixed64, max: Fixed64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, t: Fixed64) -> bool {
        self.min <= t && t <= self.max
    }

    pub fn contains_range(&self, other: &TemperatureRange) -> bool {
        self.min <= other.min && other.max <= self.max
    }
}

/// Speed multipliers at the bottom and top of a weather domain. A zero-width
/// range disables the input entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorRange {
    pub min: Fixed64,
    pub max: Fixed64,
}

impl Default for FactorRange {
    fn default() -> Self {
        Self::flat()
    }
}

impl FactorRange {
    pub fn new(min: Fixed64, max: Fixed64) -> Self {
        Self { min, max }
    }

    /// The disabled range `(1, 1)`.
    pub fn flat() -> Self {
        Self::new(Fixed64::ONE, Fixed64::ONE)
    }

    pub fn span(&self) -> Fixed64 {
        self.max - self.min
    }

    pub fn is_disabled(&self) -> bool {
        self.span() == Fixed64::ZERO
    }

    /// Interpolate `value` (clamped into `domain`) into this range.
    fn factor(&self, domain: &WeatherDomain, value: Fixed64) -> Fixed64 {
        if self.is_disabled() {
            return Fixed64::ONE;
        }
        lerp_double_clamped(domain.min, domain.max, self.min, self.max, domain.clamp(value))
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// How batches of a process may share one fermenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GroupingMode {
    /// One batch that fills the whole fermenter. Further ingredients of the
    /// same process are merged into it.
    #[default]
    Single,
    /// Independent batches of this process only.
    Multiple,
    /// Independent batches that may run alongside other `MultipleMixed`
    /// processes.
    MultipleMixed,
}

// ---------------------------------------------------------------------------
// Speed factors
// ---------------------------------------------------------------------------

/// Which environmental input is holding a batch back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitingFactor {
    Temperature,
    Sun,
    Rain,
    Snow,
    Wind,
}

/// Per-input speed multipliers for one environment sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedFactors {
    pub temperature: Fixed64,
    pub sun: Fixed64,
    pub rain: Fixed64,
    pub snow: Fixed64,
    pub wind: Fixed64,
}

impl SpeedFactors {
    /// All five factors at 1.
    pub fn neutral() -> Self {
        Self {
            temperature: Fixed64::ONE,
            sun: Fixed64::ONE,
            rain: Fixed64::ONE,
            snow: Fixed64::ONE,
            wind: Fixed64::ONE,
        }
    }

    /// The overall speed factor, never negative.
    pub fn combined(&self) -> Fixed64 {
        let product = self
            .temperature
            .saturating_mul(self.sun)
            .saturating_mul(self.rain)
            .saturating_mul(self.snow)
            .saturating_mul(self.wind);
        product.max(Fixed64::ZERO)
    }

    /// Factors below 1, in a fixed order.
    pub fn limiting(&self) -> Vec<LimitingFactor> {
        [
            (LimitingFactor::Temperature, self.temperature),
            (LimitingFactor::Sun, self.sun),
            (LimitingFactor::Rain, self.rain),
            (LimitingFactor::Snow, self.snow),
            (LimitingFactor::Wind, self.wind),
        ]
        .into_iter()
        .filter(|(_, f)| *f < Fixed64::ONE)
        .map(|(l, _)| l)
        .collect()
    }
}

/// Where an ambient temperature sits relative to a process's ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemperatureStatus {
    NotApplicable,
    Ideal,
    Safe,
    TooCold,
    TooHot,
}

// ---------------------------------------------------------------------------
// Process definition
// ---------------------------------------------------------------------------

/// One conversion recipe. Immutable once registered in a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub name: String,
    pub product: ItemKindId,
    pub ingredient_filter: ItemFilter,
    pub uses_temperature: bool,
    pub temperature_safe: TemperatureRange,
    pub temperature_ideal: TemperatureRange,
    pub speed_below_safe: Fixed64,
    pub speed_above_safe: Fixed64,
    /// Ruin gained per degree outside the safe range per hour, in percent.
    pub ruined_per_degree_per_hour: Fixed64,
    pub total_days: Fixed64,
    pub max_capacity: u32,
    pub efficiency: Fixed64,
    pub sun_factor: FactorRange,
    pub rain_factor: FactorRange,
    pub snow_factor: FactorRange,
    pub wind_factor: FactorRange,
    pub uses_quality: bool,
    pub quality_thresholds: QualityThresholds,
    pub grouping: GroupingMode,
    /// RGBA overlay tint. Opaque to the simulation.
    pub color: Option<[u8; 4]>,
    pub graphic_suffix: Option<String>,
    pub custom_label: Option<String>,
}

impl ProcessDefinition {
    /// A process with stock settings: safe -1..32 °C, ideal 7..32 °C,
    /// 2.5 %/°C/h ruin, six days, 25 items, no weather sensitivity.
    pub fn new(name: &str, product: ItemKindId, ingredient_filter: ItemFilter) -> Self {
        Self {
            name: name.to_string(),
            product,
            ingredient_filter,
            uses_temperature: true,
            temperature_safe: TemperatureRange::new(f64_to_fixed64(-1.0), f64_to_fixed64(32.0)),
            temperature_ideal: TemperatureRange::new(f64_to_fixed64(7.0), f64_to_fixed64(32.0)),
            speed_below_safe: f64_to_fixed64(0.1),
            speed_above_safe: Fixed64::ONE,
            ruined_per_degree_per_hour: f64_to_fixed64(2.5),
            total_days: f64_to_fixed64(6.0),
            max_capacity: 25,
            efficiency: Fixed64::ONE,
            sun_factor: FactorRange::flat(),
            rain_factor: FactorRange::flat(),
            snow_factor: FactorRange::flat(),
            wind_factor: FactorRange::flat(),
            uses_quality: false,
            quality_thresholds: QualityThresholds::default(),
            grouping: GroupingMode::Single,
            color: None,
            graphic_suffix: None,
            custom_label: None,
        }
    }

    pub fn accepts(&self, kind: ItemKindId) -> bool {
        self.ingredient_filter.allows(kind)
    }

    /// Temperature multiplier: floors outside the safe range, linear ramps
    /// between the safe and ideal edges, 1 inside the ideal range.
    pub fn temperature_factor(&self, t: Fixed64) -> Fixed64 {
        if !self.uses_temperature {
            return Fixed64::ONE;
        }
        let safe = &self.temperature_safe;
        let ideal = &self.temperature_ideal;
        if t < safe.min {
            self.speed_below_safe
        } else if t > safe.max {
            self.speed_above_safe
        } else if t < ideal.min {
            lerp_double(safe.min, ideal.min, self.speed_below_safe, Fixed64::ONE, t)
        } else if t > ideal.max {
            lerp_double(ideal.max, safe.max, Fixed64::ONE, self.speed_above_safe, t)
        } else {
            Fixed64::ONE
        }
    }

    /// Break the environment down into the five per-input factors.
    pub fn speed_factors(&self, sample: &EnvironmentSample, domains: &WeatherDomains) -> SpeedFactors {
        let open_sky = sample.open_sky();
        let snowing = sample.snow_rate != Fixed64::ZERO;
        let roofed = sample.roof_fraction > Fixed64::ZERO;

        let sun = self
            .sun_factor
            .factor(&domains.sun_glow, sample.sun_glow.saturating_mul(open_sky));

        // Falling snow also raises the rain signal, so treat it as dry.
        let rain = if self.rain_factor.is_disabled() {
            Fixed64::ONE
        } else if snowing {
            self.rain_factor.min
        } else {
            self.rain_factor
                .factor(&domains.rain_rate, sample.rain_rate.saturating_mul(open_sky))
        };

        let snow = self
            .snow_factor
            .factor(&domains.snow_rate, sample.snow_rate.saturating_mul(open_sky));

        let wind = if self.wind_factor.is_disabled() {
            Fixed64::ONE
        } else if roofed {
            self.wind_factor.min
        } else {
            self.wind_factor.factor(&domains.wind_speed, sample.wind_speed)
        };

        SpeedFactors {
            temperature: self.temperature_factor(sample.temperature),
            sun,
            rain,
            snow,
            wind,
        }
    }

    /// Product of all environmental factors, floored at 0.
    pub fn speed_factor(&self, sample: &EnvironmentSample, domains: &WeatherDomains) -> Fixed64 {
        self.speed_factors(sample, domains).combined()
    }

    pub fn temperature_status(&self, t: Fixed64) -> TemperatureStatus {
        if !self.uses_temperature {
            TemperatureStatus::NotApplicable
        } else if t < self.temperature_safe.min {
            TemperatureStatus::TooCold
        } else if t > self.temperature_safe.max {
            TemperatureStatus::TooHot
        } else if self.temperature_ideal.contains(t) {
            TemperatureStatus::Ideal
        } else {
            TemperatureStatus::Safe
        }
    }

    /// Whether `t` keeps batches of this process from spoiling.
    pub fn temperature_safe_at(&self, t: Fixed64) -> bool {
        !self.uses_temperature || self.temperature_safe.contains(t)
    }

    /// Degrees outside the safe range, always non-negative.
    pub fn temperature_excess(&self, t: Fixed64) -> Fixed64 {
        if !self.uses_temperature {
            Fixed64::ZERO
        } else if t > self.temperature_safe.max {
            t - self.temperature_safe.max
        } else if t < self.temperature_safe.min {
            self.temperature_safe.min - t
        } else {
            Fixed64::ZERO
        }
    }

    /// Days a batch needs to reach `target`, or `total_days` without quality.
    pub fn target_duration_days(&self, target: QualityCategory) -> Fixed64 {
        if self.uses_quality {
            self.quality_thresholds.days_for(target)
        } else {
            self.total_days
        }
    }

    /// Quality reached after `days`. Always `None` without quality.
    pub fn quality_for_days(&self, days: Fixed64) -> Option<QualityCategory> {
        if !self.uses_quality {
            return None;
        }
        self.quality_thresholds.quality_for_days(days)
    }

    /// Output units for `input` held units, rounded half away from zero.
    pub fn yield_for(&self, input: u32) -> u32 {
        let out = Fixed64::saturating_from_num(input).saturating_mul(self.efficiency);
        if out <= Fixed64::ZERO {
            return 0;
        }
        out.saturating_round().saturating_to_num::<u32>()
    }

    /// The label stamped on products, if one is configured.
    pub fn product_label(&self) -> Option<&str> {
        self.custom_label.as_deref().filter(|l| !l.is_empty())
    }
}
