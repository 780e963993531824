//! Trainval pipeline configuration.
//!
//! Loaded from TOML. Each predictor is a single record naming its raw
//! column, lag window and labels, so the column list, the windows and the
//! labels cannot drift out of step.

use crate::error::{ReserveError, Result};
use crate::features::calendar::{
    CalendarParams, DAYS_FROM_START_COLUMN, DAY_ANGLE_COLUMN, HOUR_ANGLE_COLUMN,
};
use crate::features::response::{ForecastProduct, NetLoadForecastError};
use crate::transform::window::{offset_label, LagWindow, PredictorSpec, WindowSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Calendar columns and the label prefixes of their predictor rows.
const CALENDAR_PREDICTORS: [(&str, &str); 3] = [
    (HOUR_ANGLE_COLUMN, "Solar_Hour_Angle"),
    (DAY_ANGLE_COLUMN, "Solar_Day_Angle"),
    (DAYS_FROM_START_COLUMN, "Num_Days_from_Start_Date"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainvalConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub window: WindowConfig,
    #[serde(default)]
    pub calendar: Option<CalendarParams>,
    pub response: ResponseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// CSV of raw values, first column timestamps.
    pub values: PathBuf,
    /// CSV of validity flags with the same shape; `true` marks a usable value.
    pub validity: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_inputs_file")]
    pub inputs_file: String,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_datetimes_file")]
    pub datetimes_file: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_inputs_file() -> String {
    "trainval_inputs.bin".to_string()
}

fn default_output_file() -> String {
    "trainval_output.bin".to_string()
}

fn default_datetimes_file() -> String {
    "trainval_datetimes.bin".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            inputs_file: default_inputs_file(),
            output_file: default_output_file(),
            datetimes_file: default_datetimes_file(),
        }
    }
}

impl OutputConfig {
    pub fn inputs_path(&self) -> PathBuf {
        self.directory.join(&self.inputs_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.directory.join(&self.output_file)
    }

    pub fn datetimes_path(&self) -> PathBuf {
        self.directory.join(&self.datetimes_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Offset of the response from the base timestamp.
    #[serde(default = "default_response_lead")]
    pub response_lead: i64,
    pub predictors: Vec<PredictorConfig>,
}

fn default_response_lead() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    pub column: String,
    pub start: i64,
    pub end: i64,
    /// Prefix for generated labels; defaults to the column name.
    #[serde(default)]
    pub label_prefix: Option<String>,
    /// Explicit labels, one per offset.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

impl PredictorConfig {
    fn new(column: &str, start: i64, end: i64, label_prefix: &str) -> Self {
        Self {
            column: column.to_string(),
            start,
            end,
            label_prefix: Some(label_prefix.to_string()),
            labels: None,
        }
    }

    fn to_spec(&self) -> Result<PredictorSpec> {
        let window = LagWindow::new(self.start, self.end)?;
        match &self.labels {
            Some(labels) => PredictorSpec::with_labels(&self.column, window, labels.clone()),
            None => Ok(PredictorSpec::new(
                &self.column,
                window,
                self.label_prefix.as_deref().unwrap_or(&self.column),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(default = "default_response_label")]
    pub label: String,
    /// Current product first, then its re-forecasts.
    pub products: Vec<ForecastProduct>,
}

fn default_response_label() -> String {
    "Net_Load_Forecast_Error".to_string()
}

impl Default for TrainvalConfig {
    /// CAISO RTPD/RTD setup: three RTPD columns with windows `[-2, 1]`, nine
    /// RTD columns with `[-2, -1]`, calendar terms for central California.
    fn default() -> Self {
        let mut predictors = Vec::new();
        for product in ["RTPD", "RTD_1", "RTD_2", "RTD_3"] {
            let end = if product == "RTPD" { 1 } else { -1 };
            for kind in ["Load", "Solar", "Wind"] {
                predictors.push(PredictorConfig::new(
                    &format!("{kind}_{product}_Forecast"),
                    -2,
                    end,
                    &format!("{product}_{kind}_Forecast"),
                ));
            }
        }

        Self {
            input: InputConfig {
                values: PathBuf::from("inputs_to_code/input_values.csv"),
                validity: PathBuf::from("inputs_to_code/input_validity_flags.csv"),
            },
            output: OutputConfig::default(),
            window: WindowConfig {
                response_lead: default_response_lead(),
                predictors,
            },
            calendar: Some(CalendarParams {
                longitude: -119.4179,
                utc_offset_hours: -8.0,
                start_date: None,
            }),
            response: ResponseConfig {
                label: default_response_label(),
                products: ["RTPD", "RTD_1", "RTD_2", "RTD_3"]
                    .iter()
                    .map(|p| {
                        ForecastProduct::new(
                            format!("Load_{p}_Forecast"),
                            format!("Solar_{p}_Forecast"),
                            format!("Wind_{p}_Forecast"),
                        )
                    })
                    .collect(),
            },
        }
    }
}

impl TrainvalConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| ReserveError::io("failed reading config", path, err))?;
        let config = Self::from_toml(&text)?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| ReserveError::Config(err.to_string()))?;
        config.window_spec()?;
        config.response_formula()?;
        Ok(config)
    }

    /// Sample layout, with calendar predictors appended at the response lead.
    pub fn window_spec(&self) -> Result<WindowSpec> {
        let lead = self.window.response_lead;
        let mut specs = self
            .window
            .predictors
            .iter()
            .map(PredictorConfig::to_spec)
            .collect::<Result<Vec<_>>>()?;

        if self.calendar.is_some() {
            for (column, prefix) in CALENDAR_PREDICTORS {
                specs.push(PredictorSpec::new(column, LagWindow::at(lead)?, prefix));
            }
        }

        let response_label = format!("{}_{}", self.response.label, offset_label(lead));
        WindowSpec::new(specs, response_label, lead)
    }

    pub fn response_formula(&self) -> Result<NetLoadForecastError> {
        NetLoadForecastError::from_products(&self.response.label, &self.response.products)
    }
}
