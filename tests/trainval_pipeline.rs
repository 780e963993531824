//! Trainval construction from CSV inputs through to binary artifacts.

use approx::assert_relative_eq;
use chrono::NaiveDateTime;
use reserve_forecast::config::TrainvalConfig;
use reserve_forecast::error::ReserveError;
use reserve_forecast::io::{load_matrix, LabeledMatrix};
use reserve_forecast::pipeline::run_trainval;
use std::fs;
use std::path::Path;

const N: usize = 8;
const PRODUCTS: [[f64; 3]; 4] = [
    [100.0, 20.0, 10.0],
    [102.0, 21.0, 11.0],
    [101.0, 19.0, 9.0],
    [103.0, 22.0, 10.0],
];

fn header() -> String {
    let mut cols = vec!["datetime".to_string()];
    for p in 0..PRODUCTS.len() {
        for kind in ["L", "S", "W"] {
            cols.push(format!("{kind}{p}"));
        }
    }
    cols.join(",")
}

fn timestamp(i: usize) -> String {
    format!("2020-01-01 {:02}:{:02}:00", i / 4, (i % 4) * 15)
}

/// `L0` climbs by one per row; every other column is constant.
fn write_values(path: &Path) {
    let mut text = header();
    text.push('\n');
    for i in 0..N {
        text.push_str(&timestamp(i));
        for (p, triplet) in PRODUCTS.iter().enumerate() {
            for (k, v) in triplet.iter().enumerate() {
                let v = if p == 0 && k == 0 { v + i as f64 } else { *v };
                text.push_str(&format!(",{v}"));
            }
        }
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

/// All flags `True` except the `(row, column)` cells listed in `invalid`.
fn write_validity(path: &Path, invalid: &[(usize, &str)]) {
    let mut text = header();
    text.push('\n');
    let columns: Vec<String> = header().split(',').skip(1).map(str::to_string).collect();
    for i in 0..N {
        text.push_str(&timestamp(i));
        for c in &columns {
            let bad = invalid.iter().any(|&(row, col)| row == i && col == c.as_str());
            text.push_str(if bad { ",False" } else { ",True" });
        }
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

fn config_toml(dir: &Path) -> String {
    let products: Vec<String> = (0..PRODUCTS.len())
        .map(|p| format!("{{ load = \"L{p}\", solar = \"S{p}\", wind = \"W{p}\" }}"))
        .collect();
    format!(
        r#"
[input]
values = '{values}'
validity = '{validity}'

[output]
directory = '{out}'

[window]
response_lead = 1
[[window.predictors]]
column = "L0"
start = -2
end = 1
label_prefix = "Load"

[calendar]
longitude = -119.4179
utc_offset_hours = -8.0

[response]
products = [{products}]
"#,
        values = dir.join("values.csv").display(),
        validity = dir.join("validity.csv").display(),
        out = dir.join("out").display(),
        products = products.join(", "),
    )
}

fn setup(invalid: &[(usize, &str)]) -> (tempfile::TempDir, TrainvalConfig) {
    let dir = tempfile::tempdir().unwrap();
    write_values(&dir.path().join("values.csv"));
    write_validity(&dir.path().join("validity.csv"), invalid);
    let config = TrainvalConfig::from_toml(&config_toml(dir.path())).unwrap();
    (dir, config)
}

#[test]
fn artifacts_hold_aligned_samples() {
    let (_dir, config) = setup(&[]);
    let set = run_trainval(&config).unwrap();

    // Two rows back for the lag window, one ahead for the response.
    assert_eq!(set.n_samples(), N - 2 - 1);

    let inputs: LabeledMatrix<f64> = load_matrix(config.output.inputs_path()).unwrap();
    assert_eq!(
        inputs.row_labels,
        vec![
            "Load_T-2",
            "Load_T-1",
            "Load_T0",
            "Load_T+1",
            "Solar_Hour_Angle_T+1",
            "Solar_Day_Angle_T+1",
            "Num_Days_from_Start_Date_T+1",
        ]
    );
    assert_eq!(inputs.column_positions, vec![2, 3, 4, 5, 6]);
    assert_eq!(inputs.row("Load_T0").unwrap(), &[102.0, 103.0, 104.0, 105.0, 106.0]);
    assert_eq!(inputs.row("Load_T-2").unwrap()[0], 100.0);
    assert!(inputs
        .row("Num_Days_from_Start_Date_T+1")
        .unwrap()
        .iter()
        .all(|&d| d == 0.0));

    let output: LabeledMatrix<f64> = load_matrix(config.output.output_path()).unwrap();
    assert_eq!(output.row_labels, vec!["Net_Load_Forecast_Error_T+1"]);
    // Net load 70 + row for the current product against re-forecasts 70, 73 and 71.
    for (j, &base) in output.column_positions.iter().enumerate() {
        let expected = (70.0 + (base + 1) as f64) - 214.0 / 3.0;
        assert_relative_eq!(output.values[0][j], expected, epsilon = 1e-9);
    }

    let datetimes: LabeledMatrix<NaiveDateTime> =
        load_matrix(config.output.datetimes_path()).unwrap();
    assert_eq!(datetimes.row_labels, vec!["T-2", "T-1", "T0", "T+1"]);
    assert_eq!(datetimes.row("T0").unwrap(), datetimes.column_timestamps.as_slice());
    assert_eq!(
        datetimes.row("T-2").unwrap()[0].to_string(),
        "2020-01-01 00:00:00"
    );
}

#[test]
fn invalid_flag_drops_only_the_samples_it_touches() {
    // W2 at row 5 feeds the response of base 4 and nothing else.
    let (_dir, config) = setup(&[(5, "W2")]);
    let set = run_trainval(&config).unwrap();
    assert_eq!(set.base_positions, vec![2, 3, 5, 6]);

    // L0 at row 4 sits in the lag window of bases 3 through 6.
    let (_dir, config) = setup(&[(4, "L0")]);
    let set = run_trainval(&config).unwrap();
    assert_eq!(set.base_positions, vec![2]);
}

#[test]
fn mismatched_validity_columns_write_nothing() {
    let (dir, config) = setup(&[]);
    let validity = dir.path().join("validity.csv");
    let text = fs::read_to_string(&validity).unwrap();
    fs::write(&validity, text.replacen("L0,S0", "S0,L0", 1)).unwrap();

    let err = run_trainval(&config).unwrap_err();

    assert!(matches!(err, ReserveError::ColumnOrderMismatch { position: 0, .. }));
    assert!(!config.output.inputs_path().exists());
    assert!(!config.output.directory.exists());
}

#[test]
fn missing_input_file_is_an_io_error() {
    let (dir, config) = setup(&[]);
    fs::remove_file(dir.path().join("values.csv")).unwrap();
    assert!(matches!(run_trainval(&config), Err(ReserveError::Io(_))));
}
