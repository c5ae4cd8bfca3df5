//! Choropleth rendering.
//!
//! A [`Renderer`] colours each polygon by one value of a domain vector.
//! The shipped [`GeoJsonRenderer`] writes a styled GeoJSON
//! FeatureCollection (simplestyle `fill`, `fill-opacity` and `stroke`
//! properties plus a `legend` member) that any web map can display.

use serde::Serialize;
use serde_json::{json, Map, Value};
use sta_common::{Error, Result};
use sta_config::{Palette, RenderOptions};
use std::io::Write;
use tracing::info;

use crate::geometry::PolygonSet;
use crate::logging::event_names;

/// Number of colour classes in every palette.
pub const N_CLASSES: usize = 5;

/// Fill for polygons with no value.
pub const NA_COLOUR: &str = "#cccccc";

/// Hex colours of a palette, light to dark (or low to high).
pub fn palette_colours(palette: Palette) -> [&'static str; N_CLASSES] {
    match palette {
        Palette::YlOrRd => ["#ffffb2", "#fecc5c", "#fd8d3c", "#f03b20", "#bd0026"],
        Palette::Blues => ["#eff3ff", "#bdd7e7", "#6baed6", "#3182bd", "#08519c"],
        Palette::Greens => ["#edf8e9", "#bae4b3", "#74c476", "#31a354", "#006d2c"],
        Palette::Viridis => ["#440154", "#3b528b", "#21918c", "#5ec962", "#fde725"],
    }
}

/// One legend class: values in `[lower, upper]` are drawn in `colour`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendClass {
    pub lower: f64,
    pub upper: f64,
    pub colour: &'static str,
}

/// Equal-interval classification of a value domain onto a palette.
#[derive(Debug, Clone, PartialEq)]
pub struct ColourScale {
    colours: [&'static str; N_CLASSES],
    /// `(min, max)` of the finite values; `None` when there are none.
    range: Option<(f64, f64)>,
}

impl ColourScale {
    pub fn new(palette: Palette, domain: &[Option<f64>]) -> Self {
        let range = domain
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            });
        ColourScale {
            colours: palette_colours(palette),
            range,
        }
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    /// Class index of a value; `None` for absent or non-finite values.
    pub fn class_of(&self, value: Option<f64>) -> Option<usize> {
        let v = value.filter(|v| v.is_finite())?;
        let (lo, hi) = self.range?;
        if hi <= lo {
            return Some(0);
        }
        let position = ((v - lo) / (hi - lo) * N_CLASSES as f64).floor();
        Some((position.max(0.0) as usize).min(N_CLASSES - 1))
    }

    pub fn colour(&self, value: Option<f64>) -> &'static str {
        match self.class_of(value) {
            Some(class) => self.colours[class],
            None => NA_COLOUR,
        }
    }

    /// Class boundaries and colours; empty when the domain has no values.
    pub fn classes(&self) -> Vec<LegendClass> {
        let Some((lo, hi)) = self.range else {
            return Vec::new();
        };
        let width = (hi - lo) / N_CLASSES as f64;
        (0..N_CLASSES)
            .map(|i| LegendClass {
                lower: lo + width * i as f64,
                upper: if i + 1 == N_CLASSES {
                    hi
                } else {
                    lo + width * (i + 1) as f64
                },
                colour: self.colours[i],
            })
            .collect()
    }
}

/// Draws a choropleth of `domain` over `polygons`.
///
/// `domain[i]` belongs to `polygons.units()[i]`; the lengths must match.
pub trait Renderer {
    fn render(
        &mut self,
        polygons: &PolygonSet,
        domain: &[Option<f64>],
        options: &RenderOptions,
    ) -> Result<()>;
}

/// Writes a styled GeoJSON FeatureCollection.
#[derive(Debug)]
pub struct GeoJsonRenderer<W: Write> {
    writer: W,
}

impl<W: Write> GeoJsonRenderer<W> {
    pub fn new(writer: W) -> Self {
        GeoJsonRenderer { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn styled_feature(
    feature: &Value,
    value: Option<f64>,
    fill: &str,
    options: &RenderOptions,
) -> Value {
    let mut feature = match feature {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    feature.entry("type").or_insert_with(|| json!("Feature"));

    let mut properties = match feature.remove("properties") {
        Some(Value::Object(p)) => p,
        _ => Map::new(),
    };
    properties.insert("value".to_string(), json!(value));
    properties.insert("fill".to_string(), json!(fill));
    properties.insert("fill-opacity".to_string(), json!(options.fill_opacity));
    properties.insert("stroke".to_string(), json!(options.outline_colour));
    feature.insert("properties".to_string(), Value::Object(properties));
    Value::Object(feature)
}

impl<W: Write> Renderer for GeoJsonRenderer<W> {
    fn render(
        &mut self,
        polygons: &PolygonSet,
        domain: &[Option<f64>],
        options: &RenderOptions,
    ) -> Result<()> {
        if domain.len() != polygons.len() {
            return Err(Error::ShapeMismatch {
                what: "map domain values".to_string(),
                expected: polygons.len(),
                actual: domain.len(),
            });
        }

        let scale = ColourScale::new(options.palette, domain);
        let features: Vec<Value> = polygons
            .features()
            .iter()
            .zip(domain)
            .map(|(feature, value)| styled_feature(feature, *value, scale.colour(*value), options))
            .collect();
        let shaded = domain.iter().filter(|v| scale.class_of(**v).is_some()).count();

        let collection = json!({
            "type": "FeatureCollection",
            "legend": {
                "title": options.legend_title,
                "palette": options.palette.to_string(),
                "classes": scale.classes(),
                "na_colour": NA_COLOUR,
                "scale_bar": options.scale_bar,
            },
            "features": features,
        });

        serde_json::to_writer_pretty(&mut self.writer, &collection)?;
        writeln!(self.writer)?;
        self.writer.flush()?;

        info!(
            target: event_names::RENDER_WRITTEN,
            features = polygons.len(),
            shaded,
            palette = %options.palette,
            "map written"
        );
        Ok(())
    }
}
