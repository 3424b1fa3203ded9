//! Configuration validation.
//!
//! Validates every `[backtest]` and `[data]` key before a run and builds the
//! typed settings from them.

use chrono::NaiveDate;

use crate::domain::backtest::{BacktestConfig, Sizing};
use crate::domain::error::BlocktraderError;
use crate::domain::metrics::TRADING_DAYS_PER_YEAR;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BlocktraderError {
    BlocktraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BlocktraderError> {
    validate_initial_capital(config)?;
    validate_periods_per_year(config)?;
    validate_risk_free_rate(config)?;
    validate_sizing(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), BlocktraderError> {
    match config.get_string("data", "candles") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(BlocktraderError::ConfigMissing {
                section: "data".to_string(),
                key: "candles".to_string(),
            });
        }
    }
    if let Some(months) = config.get_string("data", "favorable_months") {
        parse_favorable_months(&months)?;
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), BlocktraderError> {
    let value = config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if !(value > 0.0 && value.is_finite()) {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), BlocktraderError> {
    let value = config.get_double("backtest", "periods_per_year", TRADING_DAYS_PER_YEAR);
    if !(value > 0.0 && value.is_finite()) {
        return Err(invalid(
            "backtest",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), BlocktraderError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_sizing(config: &dyn ConfigPort) -> Result<(), BlocktraderError> {
    let mode = config
        .get_string("backtest", "sizing")
        .unwrap_or_else(|| "units".to_string());
    match mode.trim() {
        "units" => {
            let quantity = config.get_double("backtest", "quantity", 1.0);
            if !(quantity > 0.0 && quantity.is_finite()) {
                return Err(invalid("backtest", "quantity", "quantity must be positive"));
            }
        }
        "equity_fraction" => {
            let size = config.get_double("backtest", "position_size", 1.0);
            if !(size > 0.0 && size <= 1.0) {
                return Err(invalid(
                    "backtest",
                    "position_size",
                    "position_size must be in (0, 1]",
                ));
            }
        }
        other => {
            return Err(invalid(
                "backtest",
                "sizing",
                format!("unknown sizing '{other}', expected units or equity_fraction"),
            ));
        }
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), BlocktraderError> {
    let (start, end) = date_range(config)?;
    if matches!((start, end), (Some(s), Some(e)) if s >= e) {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn parse_date(value: Option<String>, field: &str) -> Result<Option<NaiveDate>, BlocktraderError> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                invalid(
                    "backtest",
                    field,
                    format!("invalid {field} format, expected YYYY-MM-DD"),
                )
            })
        })
        .transpose()
}

/// Optional `[backtest] start_date` / `end_date` bounds.
pub fn date_range(
    config: &dyn ConfigPort,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), BlocktraderError> {
    let start = parse_date(config.get_string("backtest", "start_date"), "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date"), "end_date")?;
    Ok((start, end))
}

/// Comma separated months, e.g. `"10, 11,12"`.
pub fn parse_favorable_months(value: &str) -> Result<Vec<u32>, BlocktraderError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u32>() {
            Ok(m) if (1..=12).contains(&m) => Ok(m),
            _ => Err(invalid(
                "data",
                "favorable_months",
                format!("'{s}' is not a month number 1-12"),
            )),
        })
        .collect()
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, BlocktraderError> {
    validate_backtest_config(config)?;
    let sizing = match config.get_string("backtest", "sizing").as_deref().map(str::trim) {
        Some("equity_fraction") => {
            Sizing::EquityFraction(config.get_double("backtest", "position_size", 1.0))
        }
        _ => Sizing::Units(config.get_double("backtest", "quantity", 1.0)),
    };
    Ok(BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        periods_per_year: config.get_double("backtest", "periods_per_year", TRADING_DAYS_PER_YEAR),
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.0),
        sizing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn with(mut self, section: &str, key: &str, value: &str) -> Self {
            self.0
                .insert((section.to_string(), key.to_string()), value.to_string());
            self
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    fn key_of(err: BlocktraderError) -> String {
        match err {
            BlocktraderError::ConfigInvalid { key, .. } | BlocktraderError::ConfigMissing { key, .. } => key,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = MapConfig::default();
        assert!(validate_backtest_config(&config).is_ok());
        let built = build_backtest_config(&config).unwrap();
        assert!((built.initial_capital - 10_000.0).abs() < f64::EPSILON);
        assert!((built.periods_per_year - 252.0).abs() < f64::EPSILON);
        assert_eq!(built.sizing, Sizing::Units(1.0));
    }

    #[test]
    fn rejects_non_positive_capital() {
        let config = MapConfig::default().with("backtest", "initial_capital", "0");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "initial_capital");
    }

    #[test]
    fn rejects_bad_risk_free_rate() {
        let config = MapConfig::default().with("backtest", "risk_free_rate", "1.5");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "risk_free_rate");
    }

    #[test]
    fn sizing_modes() {
        let config = MapConfig::default()
            .with("backtest", "sizing", "equity_fraction")
            .with("backtest", "position_size", "0.25");
        assert_eq!(
            build_backtest_config(&config).unwrap().sizing,
            Sizing::EquityFraction(0.25)
        );

        let config = MapConfig::default().with("backtest", "sizing", "kelly");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "sizing");

        let config = MapConfig::default()
            .with("backtest", "sizing", "equity_fraction")
            .with("backtest", "position_size", "1.5");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "position_size");
    }

    #[test]
    fn dates_must_parse_and_be_ordered() {
        let config = MapConfig::default().with("backtest", "start_date", "2024/01/01");
        assert_eq!(key_of(validate_backtest_config(&config).unwrap_err()), "start_date");

        let config = MapConfig::default()
            .with("backtest", "start_date", "2024-06-01")
            .with("backtest", "end_date", "2024-01-01");
        assert!(validate_backtest_config(&config).is_err());

        let config = MapConfig::default().with("backtest", "end_date", "2024-01-01");
        let (start, end) = date_range(&config).unwrap();
        assert!(start.is_none());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn data_section_needs_candles() {
        let config = MapConfig::default();
        assert!(matches!(
            validate_data_config(&config),
            Err(BlocktraderError::ConfigMissing { .. })
        ));
        let config = MapConfig::default().with("data", "candles", "bars.csv");
        assert!(validate_data_config(&config).is_ok());
    }

    #[test]
    fn favorable_months_parsing() {
        assert_eq!(parse_favorable_months("10, 11,12").unwrap(), vec![10, 11, 12]);
        assert!(parse_favorable_months("").unwrap().is_empty());
        assert!(parse_favorable_months("0").is_err());
        assert!(parse_favorable_months("nov").is_err());
    }
}
