//! Derived columns: calendar terms and the response variable.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use reserve_forecast::features::{calendar_features, CalendarParams};
//!
//! let noon = NaiveDate::from_ymd_opt(2020, 6, 1)
//!     .unwrap()
//!     .and_hms_opt(12, 0, 0)
//!     .unwrap();
//! let params = CalendarParams {
//!     longitude: -120.0,
//!     utc_offset_hours: -8.0,
//!     start_date: None,
//! };
//!
//! let features = calendar_features(&[noon], &params);
//! assert_eq!(features.days_from_start, vec![0]);
//! ```

pub mod calendar;
pub mod response;

pub use calendar::{
    append_calendar_columns, calendar_features, days_since, solar_time, CalendarFeatures,
    CalendarParams, SolarTime, DAYS_FROM_START_COLUMN, DAY_ANGLE_COLUMN, HOUR_ANGLE_COLUMN,
};
pub use response::{ForecastProduct, NetLoadForecastError, ResponseFormula};
