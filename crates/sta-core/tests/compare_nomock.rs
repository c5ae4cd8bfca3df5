//! Result comparator over the bundled prediction fixtures.

use chrono::NaiveDate;
use serde_json::Value;
use sta_common::{Error, OutputFormat, UnitCode};
use sta_config::{Palette, RenderOptions};
use sta_core::compare::{merge_predictions, unit_means, Prediction, PredictionTable, Side};
use sta_core::data::read_predictions;
use sta_core::geometry::read_polygons;
use sta_core::output::format_unit_means;
use sta_core::render::{GeoJsonRenderer, Renderer, NA_COLOUR};
use std::fs::File;
use std::path::PathBuf;

fn fixture(name: &str) -> File {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/lattice")
        .join(name);
    File::open(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

fn fixture_predictions() -> (PredictionTable, PredictionTable) {
    let car = read_predictions(fixture("predictions_car.csv"), "predictions_car.csv", "car").unwrap();
    let ml = read_predictions(fixture("predictions_ml.csv"), "predictions_ml.csv", "ml").unwrap();
    (car, ml)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
}

#[test]
fn merge_keeps_shared_keys_in_left_order() {
    let (car, ml) = fixture_predictions();
    let merged = merge_predictions(&car, &ml).unwrap();

    let keys: Vec<(&str, NaiveDate)> = merged
        .rows
        .iter()
        .map(|r| (r.unit.as_str(), r.date))
        .collect();
    assert_eq!(
        keys,
        vec![("U1", day(7)), ("U2", day(7)), ("U1", day(14)), ("U4", day(21))]
    );
    assert_eq!(merged.rows[0].left, 9.5);
    assert_eq!(merged.rows[0].right, 10.5);
    assert_eq!(merged.left_name, "car");
    assert_eq!(merged.right_name, "ml");
}

#[test]
fn unit_means_average_across_time() {
    let (car, ml) = fixture_predictions();
    let means = unit_means(&merge_predictions(&car, &ml).unwrap());

    let order: Vec<&str> = means.means.iter().map(|m| m.unit.as_str()).collect();
    assert_eq!(order, vec!["U1", "U2", "U4"]);

    let u1 = means.get("U1").unwrap();
    assert_eq!(u1.n, 2);
    assert_eq!(u1.left_mean, 10.25);
    assert_eq!(u1.right_mean, 11.25);
    assert_eq!(u1.difference, -1.0);
    assert_eq!(means.get("U4").unwrap().difference, 1.0);
    assert!(means.get("U3").is_none());
}

#[test]
fn disjoint_tables_merge_to_nothing() {
    let left = PredictionTable::new(
        "a",
        vec![Prediction {
            unit: UnitCode::from("U1"),
            date: day(7),
            value: 1.0,
        }],
    );
    let right = PredictionTable::new(
        "b",
        vec![Prediction {
            unit: UnitCode::from("U1"),
            date: day(14),
            value: 2.0,
        }],
    );
    let merged = merge_predictions(&left, &right).unwrap();
    assert!(merged.is_empty());
    assert!(unit_means(&merged).means.is_empty());
}

#[test]
fn repeated_key_is_rejected() {
    let row = Prediction {
        unit: UnitCode::from("U1"),
        date: day(7),
        value: 1.0,
    };
    let left = PredictionTable::new("dup", vec![row.clone(), row.clone()]);
    let right = PredictionTable::new("ok", vec![row]);
    let err = merge_predictions(&left, &right).unwrap_err();
    match err {
        Error::DuplicateKey { table, .. } => assert_eq!(table, "dup"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn map_domain_follows_polygon_order() {
    let (car, ml) = fixture_predictions();
    let means = unit_means(&merge_predictions(&car, &ml).unwrap());
    let polygons = read_polygons(fixture("polygons.geojson"), "polygons.geojson", "code").unwrap();

    let domain = means.domain_for(polygons.units(), Side::Difference);
    assert_eq!(domain, vec![Some(-1.0), Some(1.0), None, Some(1.0)]);

    let options = RenderOptions {
        palette: Palette::Blues,
        legend_title: "car - ml".to_string(),
        ..RenderOptions::default()
    };
    let mut renderer = GeoJsonRenderer::new(Vec::new());
    renderer.render(&polygons, &domain, &options).unwrap();
    let doc: Value = serde_json::from_slice(&renderer.into_inner()).unwrap();

    assert_eq!(doc["legend"]["title"], "car - ml");
    let features = doc["features"].as_array().unwrap();
    assert_eq!(features.len(), 4);
    assert_eq!(features[0]["properties"]["fill"], "#eff3ff");
    assert_eq!(features[1]["properties"]["fill"], "#08519c");
    assert_eq!(features[2]["properties"]["fill"], NA_COLOUR);
    // Geometry passes through untouched.
    assert_eq!(features[3]["geometry"]["type"], "Polygon");
}

#[test]
fn unit_means_csv_uses_table_names() {
    let (car, ml) = fixture_predictions();
    let means = unit_means(&merge_predictions(&car, &ml).unwrap());
    let csv = format_unit_means(&means, OutputFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "unit,n,car,ml,difference");
    assert_eq!(lines[1], "U1,2,10.25,11.25,-1");
    assert_eq!(lines.len(), 4);
}
