//! Analysis configuration types.
//!
//! These types define `analysis.json`: sampler controls, the model formula,
//! map display options, and where the datasets live.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisConfig {
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub sampler: SamplerSettings,

    #[serde(default)]
    pub model: ModelSpec,

    #[serde(default)]
    pub render: RenderOptions,

    #[serde(default)]
    pub datasets: DatasetLayout,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            sampler: SamplerSettings::default(),
            model: ModelSpec::default(),
            render: RenderOptions::default(),
            datasets: DatasetLayout::default(),
        }
    }
}

/// Likelihood family passed to the external sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    #[default]
    Poisson,
    Binomial,
    Gaussian,
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Poisson => write!(f, "poisson"),
            Family::Binomial => write!(f, "binomial"),
            Family::Gaussian => write!(f, "gaussian"),
        }
    }
}

/// MCMC control parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SamplerSettings {
    #[serde(default)]
    pub family: Family,

    /// Draws discarded before any are kept.
    #[serde(default = "default_burn_in")]
    pub burn_in: u64,

    /// Total draws including burn-in.
    #[serde(default = "default_n_sample")]
    pub n_sample: u64,

    /// Keep every `thin`-th draw after burn-in.
    #[serde(default = "default_thin")]
    pub thin: u64,

    /// Order of the temporal autoregressive process (1 or 2).
    #[serde(default = "default_ar_order")]
    pub ar_order: u8,
}

fn default_burn_in() -> u64 {
    20_000
}

fn default_n_sample() -> u64 {
    220_000
}

fn default_thin() -> u64 {
    100
}

fn default_ar_order() -> u8 {
    1
}

impl Default for SamplerSettings {
    fn default() -> Self {
        SamplerSettings {
            family: Family::default(),
            burn_in: default_burn_in(),
            n_sample: default_n_sample(),
            thin: default_thin(),
            ar_order: default_ar_order(),
        }
    }
}

impl SamplerSettings {
    /// Number of draws the sampler keeps after burn-in and thinning.
    pub fn retained_draws(&self) -> u64 {
        if self.thin == 0 || self.n_sample <= self.burn_in {
            return 0;
        }
        (self.n_sample - self.burn_in) / self.thin
    }
}

/// Model specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelSpec {
    /// Model formula, e.g. `cases ~ offset(log(population)) + imd`.
    #[serde(default = "default_formula")]
    pub formula: String,
}

fn default_formula() -> String {
    "cases ~ offset(log(population))".to_string()
}

impl Default for ModelSpec {
    fn default() -> Self {
        ModelSpec {
            formula: default_formula(),
        }
    }
}

/// Named sequential colour palettes for choropleth maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Palette {
    #[default]
    YlOrRd,
    Blues,
    Greens,
    Viridis,
}

impl std::fmt::Display for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Palette::YlOrRd => write!(f, "YlOrRd"),
            Palette::Blues => write!(f, "Blues"),
            Palette::Greens => write!(f, "Greens"),
            Palette::Viridis => write!(f, "Viridis"),
        }
    }
}

/// Map display options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderOptions {
    #[serde(default)]
    pub palette: Palette,

    #[serde(default = "default_legend_title")]
    pub legend_title: String,

    #[serde(default = "default_true")]
    pub scale_bar: bool,

    /// Polygon fill opacity in [0, 1].
    #[serde(default = "default_fill_opacity")]
    pub fill_opacity: f64,

    #[serde(default = "default_outline_colour")]
    pub outline_colour: String,
}

fn default_legend_title() -> String {
    "Prevalence".to_string()
}

fn default_true() -> bool {
    true
}

fn default_fill_opacity() -> f64 {
    0.7
}

fn default_outline_colour() -> String {
    "#000000".to_string()
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            palette: Palette::default(),
            legend_title: default_legend_title(),
            scale_bar: true,
            fill_opacity: default_fill_opacity(),
            outline_colour: default_outline_colour(),
        }
    }
}

/// Where the input datasets live inside a data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetLayout {
    /// Root directory of the data store.
    #[serde(default)]
    pub store: Option<PathBuf>,

    /// Dataset name (subdirectory of the store).
    #[serde(default)]
    pub dataset: Option<String>,

    #[serde(default = "default_observations")]
    pub observations: String,

    #[serde(default = "default_roster")]
    pub roster: String,

    /// Covariate file; `None` aligns without covariates.
    #[serde(default = "default_covariates")]
    pub covariates: Option<String>,

    #[serde(default = "default_adjacency")]
    pub adjacency: String,

    #[serde(default = "default_polygons")]
    pub polygons: String,

    /// GeoJSON feature property holding the unit code.
    #[serde(default = "default_unit_property")]
    pub unit_property: String,
}

fn default_observations() -> String {
    "observations.csv".to_string()
}

fn default_roster() -> String {
    "roster.csv".to_string()
}

fn default_covariates() -> Option<String> {
    Some("covariates.csv".to_string())
}

fn default_adjacency() -> String {
    "adjacency.csv".to_string()
}

fn default_polygons() -> String {
    "polygons.geojson".to_string()
}

fn default_unit_property() -> String {
    "code".to_string()
}

impl Default for DatasetLayout {
    fn default() -> Self {
        DatasetLayout {
            store: None,
            dataset: None,
            observations: default_observations(),
            roster: default_roster(),
            covariates: default_covariates(),
            adjacency: default_adjacency(),
            polygons: default_polygons(),
            unit_property: default_unit_property(),
        }
    }
}
