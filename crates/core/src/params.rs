//! Tunable thresholds shared by every pipeline stage.
//!
//! Lengths are in points (1/72 inch). A [`Params`] value is built once per
//! run, from defaults, an optional TOML file and `KEY=VALUE` overrides, and
//! handed to each stage by reference.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Unknown parameter: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("Malformed override '{0}' (expected KEY=VALUE)")]
    MalformedOverride(String),
    #[error("Invalid parameter file: {0}")]
    Config(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct Params {
    /// Deepest outline level kept in the output.
    pub max_levels: usize,
    /// Alignment tolerance and quantisation bin width.
    pub tol_bin_size: f32,
    /// Largest horizontal gap bridged when joining same-style spans on a line.
    pub tol_join_span: f32,
    /// A further column is kept while its area exceeds this share of the
    /// previously kept column.
    pub align_decay_rate: f32,
    pub align_left_ratio: f32,
    pub align_mid_ratio: f32,
    pub filter_fontsize_smaller: f32,
    pub filter_text_avg_len: f32,
    pub filter_min_spans_per_group: usize,
    pub filter_max_spans_per_page: usize,
    /// Share of all-caps spans above which a group is split.
    pub split_group_ratio: f32,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_levels: 3,
            tol_bin_size: 6.0,
            tol_join_span: 24.0,
            align_decay_rate: 0.5,
            align_left_ratio: 0.6,
            align_mid_ratio: 0.6,
            filter_fontsize_smaller: 2.1,
            filter_text_avg_len: 2.0,
            filter_min_spans_per_group: 3,
            filter_max_spans_per_page: 10,
            split_group_ratio: 0.3,
        }
    }
}

impl Params {
    /// Parameter names as accepted by [`Params::set`].
    pub const KEYS: [&'static str; 11] = [
        "MAX_LEVELS",
        "TOL_BIN_SIZE",
        "TOL_JOIN_SPAN",
        "ALIGN_DECAY_RATE",
        "ALIGN_LEFT_RATIO",
        "ALIGN_MID_RATIO",
        "FILTER_FONTSIZE_SMALLER",
        "FILTER_TEXT_AVG_LEN",
        "FILTER_MIN_SPANS_PER_GROUP",
        "FILTER_MAX_SPANS_PER_PAGE",
        "SPLIT_GROUP_RATIO",
    ];

    /// Parse a TOML document of `KEY = value` pairs on top of the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ParamsError> {
        let params: Params = toml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    /// Set a single parameter from its textual value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ParamsError> {
        let invalid = || ParamsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let number: f32 = value.trim().parse().map_err(|_| invalid())?;
        if !number.is_finite() {
            return Err(invalid());
        }
        let count = || {
            if number >= 0.0 && number.fract() == 0.0 {
                Ok(number as usize)
            } else {
                Err(invalid())
            }
        };

        match key.trim() {
            "MAX_LEVELS" => self.max_levels = count()?,
            "TOL_BIN_SIZE" => {
                if number <= 0.0 {
                    return Err(invalid());
                }
                self.tol_bin_size = number
            }
            "TOL_JOIN_SPAN" => self.tol_join_span = number,
            "ALIGN_DECAY_RATE" => self.align_decay_rate = number,
            "ALIGN_LEFT_RATIO" => self.align_left_ratio = number,
            "ALIGN_MID_RATIO" => self.align_mid_ratio = number,
            "FILTER_FONTSIZE_SMALLER" => self.filter_fontsize_smaller = number,
            "FILTER_TEXT_AVG_LEN" => self.filter_text_avg_len = number,
            "FILTER_MIN_SPANS_PER_GROUP" => self.filter_min_spans_per_group = count()?,
            "FILTER_MAX_SPANS_PER_PAGE" => self.filter_max_spans_per_page = count()?,
            "SPLIT_GROUP_RATIO" => self.split_group_ratio = number,
            other => return Err(ParamsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Apply comma separated `KEY=VALUE` pairs, e.g. `MAX_LEVELS=2,TOL_BIN_SIZE=4`.
    pub fn apply_overrides(&mut self, overrides: &str) -> Result<(), ParamsError> {
        for pair in overrides.split(',').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ParamsError::MalformedOverride(pair.to_string()))?;
            self.set(key, value)?;
        }
        Ok(())
    }

    /// `(name, value)` pairs in declaration order, for display.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let values = [
            self.max_levels.to_string(),
            self.tol_bin_size.to_string(),
            self.tol_join_span.to_string(),
            self.align_decay_rate.to_string(),
            self.align_left_ratio.to_string(),
            self.align_mid_ratio.to_string(),
            self.filter_fontsize_smaller.to_string(),
            self.filter_text_avg_len.to_string(),
            self.filter_min_spans_per_group.to_string(),
            self.filter_max_spans_per_page.to_string(),
            self.split_group_ratio.to_string(),
        ];
        Self::KEYS.into_iter().zip(values).collect()
    }

    fn validate(&self) -> Result<(), ParamsError> {
        if self.tol_bin_size <= 0.0 || !self.tol_bin_size.is_finite() {
            return Err(ParamsError::InvalidValue {
                key: "TOL_BIN_SIZE".to_string(),
                value: self.tol_bin_size.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Params::default();
        assert_eq!(p.max_levels, 3);
        assert_eq!(p.tol_bin_size, 6.0);
        assert_eq!(p.tol_join_span, 24.0);
        assert_eq!(p.filter_min_spans_per_group, 3);
        assert_eq!(p.filter_max_spans_per_page, 10);
    }

    #[test]
    fn test_apply_overrides() {
        let mut p = Params::default();
        p.apply_overrides("MAX_LEVELS=1,ALIGN_DECAY_RATE=0.25")
            .unwrap();
        assert_eq!(p.max_levels, 1);
        assert_eq!(p.align_decay_rate, 0.25);
    }

    #[test]
    fn test_apply_overrides_accepts_integral_float_for_counts() {
        let mut p = Params::default();
        p.apply_overrides("FILTER_MIN_SPANS_PER_GROUP=2.0").unwrap();
        assert_eq!(p.filter_min_spans_per_group, 2);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut p = Params::default();
        let err = p.apply_overrides("NOPE=1").unwrap_err();
        assert!(matches!(err, ParamsError::UnknownKey(k) if k == "NOPE"));
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let mut p = Params::default();
        let err = p.set("TOL_BIN_SIZE", "wide").unwrap_err();
        assert!(matches!(err, ParamsError::InvalidValue { .. }));
    }

    #[test]
    fn test_fractional_count_rejected() {
        let mut p = Params::default();
        assert!(p.set("MAX_LEVELS", "1.5").is_err());
    }

    #[test]
    fn test_zero_bin_size_rejected() {
        let mut p = Params::default();
        assert!(p.set("TOL_BIN_SIZE", "0").is_err());
    }

    #[test]
    fn test_malformed_override() {
        let mut p = Params::default();
        let err = p.apply_overrides("MAX_LEVELS").unwrap_err();
        assert!(matches!(err, ParamsError::MalformedOverride(_)));
    }

    #[test]
    fn test_from_toml_partial() {
        let p = Params::from_toml_str("MAX_LEVELS = 2\nSPLIT_GROUP_RATIO = 0.5\n").unwrap();
        assert_eq!(p.max_levels, 2);
        assert_eq!(p.split_group_ratio, 0.5);
        assert_eq!(p.tol_bin_size, 6.0);
    }

    #[test]
    fn test_from_toml_unknown_field() {
        assert!(matches!(
            Params::from_toml_str("BOGUS = 1"),
            Err(ParamsError::Config(_))
        ));
    }

    #[test]
    fn test_entries_cover_all_keys() {
        let entries = Params::default().entries();
        assert_eq!(entries.len(), Params::KEYS.len());
        assert_eq!(entries[0], ("MAX_LEVELS", "3".to_string()));
        assert_eq!(entries[6], ("FILTER_FONTSIZE_SMALLER", "2.1".to_string()));
    }
}
