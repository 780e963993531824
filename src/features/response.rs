//! Response variables computed from the raw value table.

use crate::core::{Masked, MaskedTable};
use crate::error::{ReserveError, Result};
use serde::{Deserialize, Serialize};

/// A per-timestamp formula over raw columns.
///
/// Implementations must propagate missing inputs: a missing operand at a
/// timestamp yields a missing response at that timestamp.
pub trait ResponseFormula {
    /// Column name of the computed response.
    fn name(&self) -> &str;

    /// Evaluate the response at every timestamp of `table`.
    fn evaluate(&self, table: &MaskedTable) -> Result<Vec<Masked>>;
}

/// Column names of one load/solar/wind forecast product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastProduct {
    pub load: String,
    pub solar: String,
    pub wind: String,
}

impl ForecastProduct {
    pub fn new(load: impl Into<String>, solar: impl Into<String>, wind: impl Into<String>) -> Self {
        Self {
            load: load.into(),
            solar: solar.into(),
            wind: wind.into(),
        }
    }

    /// Net load (`load - solar - wind`) at every timestamp.
    pub fn net_load(&self, table: &MaskedTable) -> Result<Vec<Masked>> {
        let load = table.column(&self.load)?;
        let solar = table.column(&self.solar)?;
        let wind = table.column(&self.wind)?;

        Ok(load
            .iter()
            .zip(solar)
            .zip(wind)
            .map(|((&l, &s), &w)| l - s - w)
            .collect())
    }
}

/// Net-load forecast error: the current product's net load minus the average
/// net load of the subsequent re-forecast products.
#[derive(Debug, Clone, PartialEq)]
pub struct NetLoadForecastError {
    name: String,
    current: ForecastProduct,
    reforecasts: Vec<ForecastProduct>,
}

impl NetLoadForecastError {
    pub fn new(
        name: impl Into<String>,
        current: ForecastProduct,
        reforecasts: Vec<ForecastProduct>,
    ) -> Result<Self> {
        if reforecasts.is_empty() {
            return Err(ReserveError::InvalidParameter(
                "net-load forecast error needs at least one re-forecast product".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            current,
            reforecasts,
        })
    }

    /// First product is the current one, the rest are re-forecasts.
    pub fn from_products(name: impl Into<String>, products: &[ForecastProduct]) -> Result<Self> {
        match products.split_first() {
            Some((current, rest)) => Self::new(name, current.clone(), rest.to_vec()),
            None => Err(ReserveError::InvalidParameter(
                "response needs at least two forecast products".to_string(),
            )),
        }
    }

    /// The RTPD product against three RTD re-forecasts.
    pub fn caiso_default() -> Self {
        Self {
            name: "Net_Load_Forecast_Error".to_string(),
            current: ForecastProduct::new(
                "Load_RTPD_Forecast",
                "Solar_RTPD_Forecast",
                "Wind_RTPD_Forecast",
            ),
            reforecasts: (1..=3)
                .map(|k| {
                    ForecastProduct::new(
                        format!("Load_RTD_{k}_Forecast"),
                        format!("Solar_RTD_{k}_Forecast"),
                        format!("Wind_RTD_{k}_Forecast"),
                    )
                })
                .collect(),
        }
    }
}

impl ResponseFormula for NetLoadForecastError {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, table: &MaskedTable) -> Result<Vec<Masked>> {
        let current = self.current.net_load(table)?;
        let others = self
            .reforecasts
            .iter()
            .map(|p| p.net_load(table))
            .collect::<Result<Vec<_>>>()?;

        let mut row = Vec::with_capacity(others.len());
        Ok((0..table.len())
            .map(|i| {
                row.clear();
                row.extend(others.iter().map(|series| series[i]));
                current[i] - Masked::mean(&row)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    fn one_timestamp() -> Vec<NaiveDateTime> {
        vec![NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()]
    }

    fn caiso_table(triplets: [[Masked; 3]; 4]) -> MaskedTable {
        let formula = NetLoadForecastError::caiso_default();
        let products: Vec<&ForecastProduct> = std::iter::once(&formula.current)
            .chain(formula.reforecasts.iter())
            .collect();

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (product, triplet) in products.iter().zip(triplets) {
            for (name, v) in [&product.load, &product.solar, &product.wind]
                .into_iter()
                .zip(triplet)
            {
                columns.push(name.clone());
                values.push(vec![v]);
            }
        }
        MaskedTable::new(one_timestamp(), columns, values).unwrap()
    }

    fn triplet(load: f64, solar: f64, wind: f64) -> [Masked; 3] {
        [load.into(), solar.into(), wind.into()]
    }

    #[test]
    fn net_load_forecast_error_known_value() {
        let table = caiso_table([
            triplet(100.0, 20.0, 10.0),
            triplet(102.0, 21.0, 11.0),
            triplet(101.0, 19.0, 9.0),
            triplet(103.0, 22.0, 10.0),
        ]);

        let response = NetLoadForecastError::caiso_default()
            .evaluate(&table)
            .unwrap();

        // Net loads: 70 now, 70 / 73 / 71 for the re-forecasts.
        assert_relative_eq!(
            response[0].value().unwrap(),
            70.0 - 214.0 / 3.0,
            epsilon = 1e-10
        );
    }

    #[test]
    fn any_missing_product_gives_missing_response() {
        for product in 0..4 {
            for component in 0..3 {
                let mut triplets = [
                    triplet(100.0, 20.0, 10.0),
                    triplet(102.0, 21.0, 11.0),
                    triplet(101.0, 19.0, 9.0),
                    triplet(103.0, 22.0, 10.0),
                ];
                triplets[product][component] = Masked::MISSING;

                let response = NetLoadForecastError::caiso_default()
                    .evaluate(&caiso_table(triplets))
                    .unwrap();
                assert!(
                    response[0].is_missing(),
                    "product {product} component {component} should poison the response"
                );
            }
        }
    }

    #[test]
    fn absent_column_is_an_error() {
        let table = MaskedTable::new(
            one_timestamp(),
            vec!["Load_RTPD_Forecast".to_string()],
            vec![vec![Masked::present(1.0)]],
        )
        .unwrap();

        let result = NetLoadForecastError::caiso_default().evaluate(&table);
        assert!(matches!(result, Err(ReserveError::MissingColumn(_))));
    }

    #[test]
    fn needs_a_reforecast_product() {
        let current = ForecastProduct::new("l", "s", "w");
        assert!(NetLoadForecastError::new("e", current.clone(), vec![]).is_err());
        assert!(NetLoadForecastError::from_products("e", &[current]).is_err());
    }
}
