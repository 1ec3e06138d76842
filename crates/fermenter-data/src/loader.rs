//! Resolution pipeline: reads data files, resolves names, builds the catalog.
//!
//! Provides format detection (RON/JSON/TOML), file discovery and
//! deserialization helpers, and the [`load_fermenter_data`] entry point that
//! ties them together.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fermenter_core::config::{FermenterConfig, WeatherDomain};
use fermenter_core::filter::ItemFilter;
use fermenter_core::fixed::{Fixed64, f64_to_fixed64};
use fermenter_core::id::{ItemKindId, ProcessId};
use fermenter_core::process::{FactorRange, GroupingMode, ProcessDefinition, TemperatureRange};
use fermenter_core::quality::QualityThresholds;
use fermenter_core::registry::{Catalog, CatalogBuilder, RegistryError};
use serde::de::DeserializeOwned;

use crate::schema::{
    FermenterTypeData, GroupingData, ItemData, ProcessData, RangeData, SettingsData,
};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A field parsed but holds an unusable value.
    #[error("invalid {field} on '{name}' in {file}: {detail}")]
    InvalidField {
        file: PathBuf,
        name: String,
        field: &'static str,
        detail: String,
    },

    /// The resolved content failed catalog validation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let mut table: toml::Table =
                toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table.remove(toml_key).ok_or_else(|| {
                parse_error(path, format!("missing key '{toml_key}' in TOML file"))
            })?;
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Conversion
// ===========================================================================

fn temperature(r: RangeData) -> TemperatureRange {
    TemperatureRange::new(f64_to_fixed64(r.min), f64_to_fixed64(r.max))
}

fn factor(r: RangeData) -> FactorRange {
    FactorRange::new(f64_to_fixed64(r.min), f64_to_fixed64(r.max))
}

fn domain(r: RangeData) -> WeatherDomain {
    WeatherDomain::new(f64_to_fixed64(r.min), f64_to_fixed64(r.max))
}

/// The first field holding NaN or an infinity. Fixed point has no such values.
fn first_non_finite<'a>(
    fields: impl IntoIterator<Item = (&'static str, &'a f64)>,
) -> Option<(&'static str, f64)> {
    fields
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(field, v)| (field, *v))
}

fn range_fields<'a>(field: &'static str, r: &'a RangeData) -> [(&'static str, &'a f64); 2] {
    [(field, &r.min), (field, &r.max)]
}

fn grouping(g: GroupingData) -> GroupingMode {
    match g {
        GroupingData::Single => GroupingMode::Single,
        GroupingData::Multiple => GroupingMode::Multiple,
        GroupingData::MultipleMixed => GroupingMode::MultipleMixed,
    }
}

/// Channels in `0.0..=1.0` to 8-bit RGBA. A missing alpha is opaque.
fn color_bytes(channels: &[f64]) -> Option<[u8; 4]> {
    let byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    match channels {
        [r, g, b] => Some([byte(*r), byte(*g), byte(*b), 255]),
        [r, g, b, a] => Some([byte(*r), byte(*g), byte(*b), byte(*a)]),
        _ => None,
    }
}

fn build_process(
    data: ProcessData,
    items: &HashMap<String, ItemKindId>,
    file: &Path,
) -> Result<ProcessDefinition, DataLoadError> {
    let invalid = |field: &'static str, detail: String| DataLoadError::InvalidField {
        file: file.to_path_buf(),
        name: data.name.clone(),
        field,
        detail,
    };

    let product = *resolve_name(items, &data.product, file, "item")?;
    let mut ingredients = ItemFilter::new();
    for name in &data.ingredients {
        ingredients.set_allowed(*resolve_name(items, name, file, "item")?, true);
    }

    let days = data
        .quality_days
        .days()
        .ok_or_else(|| invalid("quality_days", "expected seven day counts".into()))?;

    let color = match (&data.color, data.color_coded) {
        (Some(channels), true) => Some(
            color_bytes(channels)
                .ok_or_else(|| invalid("color", format!("{} channels", channels.len())))?,
        ),
        (None, true) => {
            tracing::warn!(process = %data.name, "color_coded set without a color");
            None
        }
        (_, false) => None,
    };

    let scalars = [
        ("ruined_per_degree_per_hour", &data.ruined_per_degree_per_hour),
        ("speed_below_safe", &data.speed_below_safe),
        ("speed_above_safe", &data.speed_above_safe),
        ("total_days", &data.total_days),
        ("efficiency", &data.efficiency),
    ];
    let ranges = [
        ("temperature_safe", &data.temperature_safe),
        ("temperature_ideal", &data.temperature_ideal),
        ("sun_factor", &data.sun_factor),
        ("rain_factor", &data.rain_factor),
        ("snow_factor", &data.snow_factor),
        ("wind_factor", &data.wind_factor),
    ];
    let channels = data.color.iter().flatten().map(|c| ("color", c));
    if let Some((field, v)) = first_non_finite(
        scalars
            .into_iter()
            .chain(ranges.into_iter().flat_map(|(f, r)| range_fields(f, r)))
            .chain(days.iter().map(|d| ("quality_days", d)))
            .chain(channels),
    ) {
        return Err(invalid(field, format!("{v} is not a finite number")));
    }

    if data.total_days <= 0.0 {
        return Err(invalid("total_days", format!("{} is not positive", data.total_days)));
    }

    let mut def = ProcessDefinition::new(&data.name, product, ingredients);
    def.uses_temperature = data.uses_temperature;
    def.temperature_safe = temperature(data.temperature_safe);
    def.temperature_ideal = temperature(data.temperature_ideal);
    def.ruined_per_degree_per_hour = f64_to_fixed64(data.ruined_per_degree_per_hour);
    def.speed_below_safe = f64_to_fixed64(data.speed_below_safe);
    def.speed_above_safe = f64_to_fixed64(data.speed_above_safe);
    def.total_days = f64_to_fixed64(data.total_days);
    def.max_capacity = data.max_capacity;
    def.efficiency = f64_to_fixed64(data.efficiency);
    def.sun_factor = factor(data.sun_factor);
    def.rain_factor = factor(data.rain_factor);
    def.snow_factor = factor(data.snow_factor);
    def.wind_factor = factor(data.wind_factor);
    def.uses_quality = data.uses_quality;
    def.quality_thresholds = QualityThresholds::new(days.map(f64_to_fixed64));
    def.grouping = grouping(data.grouping);
    def.color = color;
    def.graphic_suffix = data.graphic_suffix;
    def.custom_label = data.custom_label;
    Ok(def)
}

/// Process names of a fermenter type, honouring the deprecated `products`
/// spelling.
fn process_names(data: &FermenterTypeData) -> Vec<&str> {
    if data.products.is_empty() {
        return data.processes.iter().map(String::as_str).collect();
    }
    if data.processes.is_empty() {
        tracing::warn!(
            fermenter = %data.name,
            "'products' is deprecated, use 'processes'"
        );
        return data.products.iter().map(String::as_str).collect();
    }
    tracing::warn!(
        fermenter = %data.name,
        "both 'processes' and deprecated 'products' set; ignoring 'products'"
    );
    data.processes.iter().map(String::as_str).collect()
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Everything loaded from a content directory.
#[derive(Debug, Clone)]
pub struct FermenterData {
    pub catalog: Arc<Catalog>,
    pub config: FermenterConfig,
}

/// Load `items`, `processes` and `fermenters` (required) and `settings`
/// (optional) from `dir`.
///
/// Names are resolved in that order, so processes may only reference items
/// and fermenters may only reference processes and items.
pub fn load_fermenter_data(dir: &Path) -> Result<FermenterData, DataLoadError> {
    let mut builder = CatalogBuilder::new();

    let items_path = require_data_file(dir, "items")?;
    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;
    let mut item_ids: HashMap<String, ItemKindId> = HashMap::new();
    for item in &items {
        check_duplicate(&item_ids, &item.name, &items_path)?;
        let id = builder.register_item(&item.name, item.retrievable_when_incomplete);
        item_ids.insert(item.name.clone(), id);
    }

    let processes_path = require_data_file(dir, "processes")?;
    let processes: Vec<ProcessData> = deserialize_list(&processes_path, "processes")?;
    let mut process_ids: HashMap<String, ProcessId> = HashMap::new();
    for data in processes {
        check_duplicate(&process_ids, &data.name, &processes_path)?;
        let name = data.name.clone();
        let def = build_process(data, &item_ids, &processes_path)?;
        process_ids.insert(name, builder.register_process(def));
    }

    let fermenters_path = require_data_file(dir, "fermenters")?;
    let fermenters: Vec<FermenterTypeData> = deserialize_list(&fermenters_path, "fermenters")?;
    let mut fermenter_names: HashMap<String, ()> = HashMap::new();
    for data in &fermenters {
        check_duplicate(&fermenter_names, &data.name, &fermenters_path)?;
        let list = process_names(data)
            .into_iter()
            .map(|name| resolve_name(&process_ids, name, &fermenters_path, "process").copied())
            .collect::<Result<Vec<_>, _>>()?;
        let defaults = match &data.default_products {
            Some(names) => Some(
                names
                    .iter()
                    .map(|name| resolve_name(&item_ids, name, &fermenters_path, "item").copied())
                    .collect::<Result<ItemFilter, _>>()?,
            ),
            None => None,
        };
        builder.register_fermenter(&data.name, list, defaults);
        fermenter_names.insert(data.name.clone(), ());
    }

    let catalog = builder.build()?;
    let config = load_settings(dir)?;
    tracing::debug!(
        dir = %dir.display(),
        items = catalog.item_count(),
        processes = catalog.process_count(),
        fermenters = catalog.fermenter_count(),
        "fermenter data loaded"
    );
    Ok(FermenterData {
        catalog: Arc::new(catalog),
        config,
    })
}

/// Load the optional `settings` file over [`FermenterConfig::default`].
pub fn load_settings(dir: &Path) -> Result<FermenterConfig, DataLoadError> {
    let mut config = FermenterConfig::default();
    let Some(path) = find_data_file(dir, "settings")? else {
        return Ok(config);
    };
    let data: SettingsData = deserialize_file(&path)?;

    let ranges = [
        ("weather.sun_glow", &data.weather.sun_glow),
        ("weather.rain_rate", &data.weather.rain_rate),
        ("weather.snow_rate", &data.weather.snow_rate),
        ("weather.wind_speed", &data.weather.wind_speed),
    ];
    if let Some((field, v)) = first_non_finite(
        ranges
            .into_iter()
            .filter_map(|(f, r)| r.as_ref().map(|r| range_fields(f, r)))
            .flatten()
            .chain(data.slow_speed_threshold.iter().map(|t| ("slow_speed_threshold", t))),
    ) {
        return Err(DataLoadError::InvalidField {
            file: path,
            name: "settings".into(),
            field,
            detail: format!("{v} is not a finite number"),
        });
    }

    let weather = &mut config.weather;
    for (slot, range) in [
        (&mut weather.sun_glow, data.weather.sun_glow),
        (&mut weather.rain_rate, data.weather.rain_rate),
        (&mut weather.snow_rate, data.weather.snow_rate),
        (&mut weather.wind_speed, data.weather.wind_speed),
    ] {
        if let Some(range) = range {
            if range.min > range.max {
                tracing::warn!(
                    file = %path.display(),
                    min = range.min,
                    max = range.max,
                    "weather domain is inverted"
                );
            }
            *slot = domain(range);
        }
    }
    if let Some(threshold) = data.slow_speed_threshold {
        config.slow_speed_threshold = f64_to_fixed64(threshold).max(Fixed64::ZERO);
    }
    if let Some(reset) = data.reset_on_ruin {
        config.reset_on_ruin = reset;
    }
    if let Some(capacity) = data.event_buffer_capacity {
        config.event_buffer_capacity = capacity;
    }
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
