//! Calendar-based predictors: solar hour angle, solar day angle and days elapsed.
//!
//! Formulae follow the usual solar-time derivation: the day angle drives an
//! equation-of-time correction, which together with the longitudinal offset
//! from the local standard time meridian shifts clock time to local solar
//! time.

use crate::core::{Masked, MaskedTable};
use crate::error::Result;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const HOUR_ANGLE_COLUMN: &str = "Hour_Angle";
pub const DAY_ANGLE_COLUMN: &str = "Day_Angle";
pub const DAYS_FROM_START_COLUMN: &str = "Days_from_Start_Date";

const SECONDS_PER_DAY: i64 = 86_400;

/// Site and reference date for calendar predictors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarParams {
    /// Degrees, east positive.
    pub longitude: f64,
    /// Fixed offset of the timestamps from UTC, in hours.
    pub utc_offset_hours: f64,
    /// Reference for days elapsed; defaults to the first timestamp.
    #[serde(default)]
    pub start_date: Option<NaiveDateTime>,
}

/// Intermediate solar-time quantities for one timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarTime {
    /// Degrees.
    pub day_angle: f64,
    /// Minutes.
    pub equation_of_time: f64,
    /// Minutes.
    pub time_correction: f64,
    /// Hours.
    pub local_solar_time: f64,
    /// Degrees.
    pub hour_angle: f64,
}

/// Calendar predictors for a whole timestamp sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarFeatures {
    pub hour_angle: Vec<f64>,
    pub day_angle: Vec<f64>,
    pub days_from_start: Vec<i64>,
}

impl CalendarFeatures {
    pub fn len(&self) -> usize {
        self.hour_angle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hour_angle.is_empty()
    }
}

/// Solar time at `timestamp` (local standard time) for a site.
pub fn solar_time(timestamp: &NaiveDateTime, longitude: f64, utc_offset_hours: f64) -> SolarTime {
    let day_of_year = timestamp.ordinal() as f64;
    let day_angle = (360.0 / 365.0) * (day_of_year - 81.0);
    let b = day_angle.to_radians();
    let equation_of_time = 9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin();

    let meridian = 15.0 * utc_offset_hours;
    let time_correction = 4.0 * (longitude - meridian) + equation_of_time;
    let local_solar_time =
        timestamp.hour() as f64 + timestamp.minute() as f64 / 60.0 + time_correction / 60.0;

    SolarTime {
        day_angle,
        equation_of_time,
        time_correction,
        local_solar_time,
        hour_angle: 15.0 * (local_solar_time - 12.0),
    }
}

/// Whole days elapsed from `start` to `timestamp`, rounded toward negative infinity.
pub fn days_since(timestamp: &NaiveDateTime, start: &NaiveDateTime) -> i64 {
    (*timestamp - *start)
        .num_seconds()
        .div_euclid(SECONDS_PER_DAY)
}

/// Compute calendar predictors for every timestamp.
pub fn calendar_features(timestamps: &[NaiveDateTime], params: &CalendarParams) -> CalendarFeatures {
    let start = params.start_date.or_else(|| timestamps.first().copied());

    let mut features = CalendarFeatures {
        hour_angle: Vec::with_capacity(timestamps.len()),
        day_angle: Vec::with_capacity(timestamps.len()),
        days_from_start: Vec::with_capacity(timestamps.len()),
    };

    for ts in timestamps {
        let solar = solar_time(ts, params.longitude, params.utc_offset_hours);
        features.hour_angle.push(solar.hour_angle);
        features.day_angle.push(solar.day_angle);
        features
            .days_from_start
            .push(start.map(|s| days_since(ts, &s)).unwrap_or(0));
    }

    features
}

/// Append the three calendar columns to `table`.
pub fn append_calendar_columns(table: &mut MaskedTable, params: &CalendarParams) -> Result<()> {
    let features = calendar_features(table.timestamps(), params);
    let present = |values: &[f64]| values.iter().map(|&v| Masked::present(v)).collect();

    table.push_column(HOUR_ANGLE_COLUMN, present(&features.hour_angle))?;
    table.push_column(DAY_ANGLE_COLUMN, present(&features.day_angle))?;
    table.push_column(
        DAYS_FROM_START_COLUMN,
        features
            .days_from_start
            .iter()
            .map(|&d| Masked::present(d as f64))
            .collect(),
    )?;
    Ok(())
}
