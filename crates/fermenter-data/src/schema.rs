//! Serde data file structs for fermenter content.
//!
//! These structs define the on-disk format for item kinds, processes,
//! fermenter types and settings. Numbers are plain floats on disk and are
//! converted to fixed point by the loader. Every optional field defaults to
//! the stock process values.

use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// An item kind definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    /// Dropped back on the ground when a batch holding it is reset.
    #[serde(default)]
    pub retrievable_when_incomplete: bool,
}

// ===========================================================================
// Processes
// ===========================================================================

/// A `(min, max)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RangeData {
    pub min: f64,
    pub max: f64,
}

impl RangeData {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

fn default_safe() -> RangeData {
    RangeData::new(-1.0, 32.0)
}

fn default_ideal() -> RangeData {
    RangeData::new(7.0, 32.0)
}

fn default_flat() -> RangeData {
    RangeData::new(1.0, 1.0)
}

fn default_true() -> bool {
    true
}

fn default_ruin() -> f64 {
    2.5
}

fn default_below_safe() -> f64 {
    0.1
}

fn default_one() -> f64 {
    1.0
}

fn default_days() -> f64 {
    6.0
}

fn default_max_capacity() -> u32 {
    25
}

/// Days to reach each quality tier, Awful through Legendary.
///
/// Accepts a seven-element list, a named table, or the legacy
/// parenthesized string form `"(1, 2, 3, 4, 5, 6, 7)"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QualityDaysData {
    List([f64; 7]),
    Named {
        awful: f64,
        poor: f64,
        normal: f64,
        good: f64,
        excellent: f64,
        masterwork: f64,
        legendary: f64,
    },
    Text(String),
}

impl Default for QualityDaysData {
    fn default() -> Self {
        QualityDaysData::List([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
    }
}

impl QualityDaysData {
    /// The seven day counts, or `None` when the text form is malformed.
    pub fn days(&self) -> Option<[f64; 7]> {
        match self {
            QualityDaysData::List(days) => Some(*days),
            QualityDaysData::Named {
                awful,
                poor,
                normal,
                good,
                excellent,
                masterwork,
                legendary,
            } => Some([
                *awful,
                *poor,
                *normal,
                *good,
                *excellent,
                *masterwork,
                *legendary,
            ]),
            QualityDaysData::Text(text) => {
                let inner = text.trim().trim_start_matches('(').trim_end_matches(')');
                let parsed: Vec<f64> = inner
                    .split(',')
                    .map(|part| part.trim().parse::<f64>())
                    .collect::<Result<_, _>>()
                    .ok()?;
                parsed.try_into().ok()
            }
        }
    }
}

/// How batches of a process share a fermenter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingData {
    #[default]
    #[serde(alias = "Single")]
    Single,
    #[serde(alias = "Multiple")]
    Multiple,
    #[serde(alias = "MultipleMixed")]
    MultipleMixed,
}

/// A process definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessData {
    pub name: String,
    /// Name of the produced item kind.
    pub product: String,
    /// Names of accepted ingredient kinds.
    pub ingredients: Vec<String>,
    #[serde(default = "default_true")]
    pub uses_temperature: bool,
    #[serde(default = "default_safe")]
    pub temperature_safe: RangeData,
    #[serde(default = "default_ideal")]
    pub temperature_ideal: RangeData,
    #[serde(default = "default_ruin")]
    pub ruined_per_degree_per_hour: f64,
    #[serde(default = "default_below_safe")]
    pub speed_below_safe: f64,
    #[serde(default = "default_one")]
    pub speed_above_safe: f64,
    #[serde(default = "default_days", alias = "process_days")]
    pub total_days: f64,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
    #[serde(default = "default_one")]
    pub efficiency: f64,
    #[serde(default = "default_flat")]
    pub sun_factor: RangeData,
    #[serde(default = "default_flat")]
    pub rain_factor: RangeData,
    #[serde(default = "default_flat")]
    pub snow_factor: RangeData,
    #[serde(default = "default_flat")]
    pub wind_factor: RangeData,
    #[serde(default)]
    pub uses_quality: bool,
    #[serde(default)]
    pub quality_days: QualityDaysData,
    #[serde(default)]
    pub grouping: GroupingData,
    /// Overlay tint is only applied when set.
    #[serde(default)]
    pub color_coded: bool,
    /// RGB or RGBA, each channel in `0.0..=1.0`.
    #[serde(default)]
    pub color: Option<Vec<f64>>,
    #[serde(default)]
    pub graphic_suffix: Option<String>,
    #[serde(default)]
    pub custom_label: Option<String>,
}

// ===========================================================================
// Fermenter types
// ===========================================================================

/// A fermenter type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct FermenterTypeData {
    pub name: String,
    /// Process names, in priority order.
    #[serde(default)]
    pub processes: Vec<String>,
    /// Deprecated spelling of `processes`.
    #[serde(default)]
    pub products: Vec<String>,
    /// Product names enabled on a freshly built fermenter. All when absent.
    #[serde(default)]
    pub default_products: Option<Vec<String>>,
}

// ===========================================================================
// Settings
// ===========================================================================

/// Weather domain overrides. Unset bounds keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WeatherData {
    pub sun_glow: Option<RangeData>,
    pub rain_rate: Option<RangeData>,
    pub snow_rate: Option<RangeData>,
    pub wind_speed: Option<RangeData>,
}

/// The optional `settings` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsData {
    pub weather: WeatherData,
    pub slow_speed_threshold: Option<f64>,
    pub reset_on_ruin: Option<bool>,
    pub event_buffer_capacity: Option<usize>,
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// Wrapper for a list of items in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlItems {
    pub items: Vec<ItemData>,
}

/// Wrapper for a list of processes in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlProcesses {
    pub processes: Vec<ProcessData>,
}

/// Wrapper for a list of fermenter types in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlFermenters {
    pub fermenters: Vec<FermenterTypeData>,
}

// ===========================================================================
// Tests
// ===========================================================================
