use std::env;

/// Distance below which the current step counts as done.
pub const DEFAULT_ADVANCE_THRESHOLD_M: f64 = 20.0;
const DEFAULT_DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a positive number of meters, got {value:?}")]
    InvalidDistance { name: &'static str, value: String },
    #[error("{name} must be true or false, got {value:?}")]
    InvalidFlag { name: &'static str, value: String },
    #[error("DIRECTIONS_API_KEY is not set")]
    MissingApiKey,
    #[error("either --route or --destination is required")]
    MissingRoute,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationConfig {
    pub advance_threshold_m: f64,
    /// Distance to destination, on the last step, that ends the trip.
    pub arrival_threshold_m: f64,
    /// Whether a session returns to idle once the user arrives.
    pub stop_on_arrival: bool,
    /// Fixes reporting a worse horizontal accuracy are dropped.
    pub max_fix_accuracy_m: Option<f64>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            advance_threshold_m: DEFAULT_ADVANCE_THRESHOLD_M,
            arrival_threshold_m: DEFAULT_ADVANCE_THRESHOLD_M,
            stop_on_arrival: true,
            max_fix_accuracy_m: None,
        }
    }
}

impl NavigationConfig {
    /// Defaults overridden by `NAV_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_overriding(None)
    }

    /// Like [`from_env`](Self::from_env), with an explicit advance threshold
    /// taking precedence over `NAV_ADVANCE_THRESHOLD_M`. The arrival
    /// threshold follows it unless `NAV_ARRIVAL_THRESHOLD_M` is set.
    pub fn from_env_overriding(advance_threshold_m: Option<f64>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok(), advance_threshold_m)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        advance_override: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let distance = |name: &'static str, fallback: f64| match lookup(name) {
            Some(raw) => parse_distance(name, &raw),
            None => Ok(fallback),
        };

        let advance_threshold_m = match advance_override {
            Some(value) => check_distance("advance threshold", value)?,
            None => distance("NAV_ADVANCE_THRESHOLD_M", defaults.advance_threshold_m)?,
        };
        let arrival_threshold_m = distance("NAV_ARRIVAL_THRESHOLD_M", advance_threshold_m)?;
        let stop_on_arrival = match lookup("NAV_STOP_ON_ARRIVAL") {
            Some(raw) => parse_flag("NAV_STOP_ON_ARRIVAL", &raw)?,
            None => defaults.stop_on_arrival,
        };
        let max_fix_accuracy_m = lookup("NAV_MAX_FIX_ACCURACY_M")
            .map(|raw| parse_distance("NAV_MAX_FIX_ACCURACY_M", &raw))
            .transpose()?;

        Ok(Self {
            advance_threshold_m,
            arrival_threshold_m,
            stop_on_arrival,
            max_fix_accuracy_m,
        })
    }
}

/// Settings for the directions provider client.
#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    pub api_key: String,
    pub base_url: String,
    /// Travel mode passed to the provider; campus routes are walked.
    pub mode: String,
}

impl DirectionsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_DIRECTIONS_URL.to_string(),
            mode: "walking".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("DIRECTIONS_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = env::var("DIRECTIONS_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

/// Parse a strictly positive, finite distance in meters.
pub fn parse_distance(name: &'static str, raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(ConfigError::InvalidDistance {
            name,
            value: raw.to_string(),
        }),
    }
}

fn check_distance(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidDistance {
            name,
            value: value.to_string(),
        })
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = NavigationConfig::from_lookup(lookup(&[]), None).unwrap();
        assert_eq!(config, NavigationConfig::default());
        assert_eq!(config.advance_threshold_m, 20.0);
    }

    #[test]
    fn arrival_threshold_follows_advance_threshold() {
        let config =
            NavigationConfig::from_lookup(lookup(&[("NAV_ADVANCE_THRESHOLD_M", "15")]), None)
                .unwrap();
        assert_eq!(config.advance_threshold_m, 15.0);
        assert_eq!(config.arrival_threshold_m, 15.0);
    }

    #[test]
    fn all_overrides() {
        let config = NavigationConfig::from_lookup(lookup(&[
            ("NAV_ADVANCE_THRESHOLD_M", "25"),
            ("NAV_ARRIVAL_THRESHOLD_M", "10"),
            ("NAV_STOP_ON_ARRIVAL", "false"),
            ("NAV_MAX_FIX_ACCURACY_M", "50"),
        ]), None)
        .unwrap();
        assert_eq!(config.advance_threshold_m, 25.0);
        assert_eq!(config.arrival_threshold_m, 10.0);
        assert!(!config.stop_on_arrival);
        assert_eq!(config.max_fix_accuracy_m, Some(50.0));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let err = NavigationConfig::from_lookup(lookup(&[("NAV_ADVANCE_THRESHOLD_M", "-3")]), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDistance { .. }));
    }

    #[test]
    fn rejects_garbage_flag() {
        let err =
            NavigationConfig::from_lookup(lookup(&[("NAV_STOP_ON_ARRIVAL", "maybe")]), None)
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlag { .. }));
    }

    #[test]
    fn explicit_threshold_wins_and_arrival_follows() {
        let config =
            NavigationConfig::from_lookup(lookup(&[("NAV_ADVANCE_THRESHOLD_M", "15")]), Some(8.0))
                .unwrap();
        assert_eq!(config.advance_threshold_m, 8.0);
        assert_eq!(config.arrival_threshold_m, 8.0);
    }

    #[test]
    fn explicit_threshold_keeps_configured_arrival() {
        let config =
            NavigationConfig::from_lookup(lookup(&[("NAV_ARRIVAL_THRESHOLD_M", "5")]), Some(30.0))
                .unwrap();
        assert_eq!(config.advance_threshold_m, 30.0);
        assert_eq!(config.arrival_threshold_m, 5.0);
    }

    #[test]
    fn explicit_threshold_must_be_positive_and_finite() {
        for bad in [-5.0, 0.0, f64::NAN, f64::INFINITY] {
            let err = NavigationConfig::from_lookup(lookup(&[]), Some(bad)).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidDistance { .. }), "{bad}");
        }
    }

    #[test]
    fn parse_distance_rejects_nan_and_negatives() {
        assert_eq!(parse_distance("x", " 12.5 ").unwrap(), 12.5);
        for raw in ["-1", "NaN", "inf", "0", "twenty"] {
            assert!(parse_distance("x", raw).is_err(), "{raw}");
        }
    }
}
