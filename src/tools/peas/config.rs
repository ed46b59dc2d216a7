use std::io::Read;

use anyhow::Context;
use log::info;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::{
    AggregateKind,
    Bins,
    DistributionKind,
    ObjectiveKind,
    ShuffleCount,
    Tail,
};
use crate::error::PeasError;
use crate::{
    ensure_config,
    with_field_fn,
};

/// Without an explicit bound, regions may span up to this fraction of the
/// (trimmed) input.
pub const DEFAULT_MAX_SIZE_FACTOR: usize = 4;

/// Parameters of a region search.
///
/// Unknown fields are rejected when deserializing, missing ones take their
/// default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeasConfig {
    pub min_size:                   usize,
    /// Resolved against the input length when `None`.
    pub max_size:                   Option<usize>,
    /// Only applied when positive.
    pub min_score:                  f64,
    pub max_pvalue:                 Option<f64>,
    pub tail:                       Tail,
    pub maximization_target:        ObjectiveKind,
    pub edge_weight_power:          f64,
    /// Resolve ties between candidate regions towards the longer one.
    pub prefer_larger_regions:      bool,
    pub num_shuffles:               ShuffleCount,
    pub pvalue_target:              f64,
    pub max_pvalue_cv:              f64,
    pub random_seed:                Option<u64>,
    /// 0 disables smoothing of the tail parameters.
    pub parameter_smoothing_window: usize,
    pub aggregate_function:         AggregateKind,
    pub start_diagonal:             usize,
    pub null_distribution:          DistributionKind,
    pub bins:                       Bins,
    pub min_pvalue:                 f64,
    pub quantile_normalize:         bool,
    pub fill_nan_diagonals:         bool,
    pub stitch_adjacent:            bool,
}

impl Default for PeasConfig {
    fn default() -> Self {
        Self {
            min_size:                   2,
            max_size:                   None,
            min_score:                  0.0,
            max_pvalue:                 Some(0.05),
            tail:                       Tail::Both,
            maximization_target:        ObjectiveKind::PProd,
            edge_weight_power:          1.0,
            prefer_larger_regions:      true,
            num_shuffles:               ShuffleCount::Auto,
            pvalue_target:              1e-4,
            max_pvalue_cv:              0.05,
            random_seed:                None,
            parameter_smoothing_window: 0,
            aggregate_function:         AggregateKind::Mean,
            start_diagonal:             1,
            null_distribution:          DistributionKind::Hybrid,
            bins:                       Bins::Auto,
            min_pvalue:                 1e-300,
            quantile_normalize:         false,
            fill_nan_diagonals:         true,
            stitch_adjacent:            true,
        }
    }
}

impl PeasConfig {
    with_field_fn!(min_size, usize);

    with_field_fn!(max_size, Option<usize>);

    with_field_fn!(min_score, f64);

    with_field_fn!(max_pvalue, Option<f64>);

    with_field_fn!(tail, Tail);

    with_field_fn!(maximization_target, ObjectiveKind);

    with_field_fn!(edge_weight_power, f64);

    with_field_fn!(prefer_larger_regions, bool);

    with_field_fn!(num_shuffles, ShuffleCount);

    with_field_fn!(pvalue_target, f64);

    with_field_fn!(max_pvalue_cv, f64);

    with_field_fn!(random_seed, Option<u64>);

    with_field_fn!(parameter_smoothing_window, usize);

    with_field_fn!(aggregate_function, AggregateKind);

    with_field_fn!(start_diagonal, usize);

    with_field_fn!(null_distribution, DistributionKind);

    with_field_fn!(bins, Bins);

    with_field_fn!(min_pvalue, f64);

    with_field_fn!(quantile_normalize, bool);

    with_field_fn!(fill_nan_diagonals, bool);

    with_field_fn!(stitch_adjacent, bool);

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Failed to parse PEAS configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_reader(reader).context("Failed to read PEAS configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure_config!(
            self.min_size >= 2,
            "min_size must be at least 2, got {}",
            self.min_size
        );
        if let Some(max_size) = self.max_size {
            ensure_config!(
                max_size >= self.min_size,
                "max_size {} is smaller than min_size {}",
                max_size,
                self.min_size
            );
        }
        ensure_config!(
            self.min_score.is_finite() && self.min_score >= 0.0,
            "min_score must be non-negative, got {}",
            self.min_score
        );
        if let Some(max_pvalue) = self.max_pvalue {
            ensure_config!(
                max_pvalue > 0.0 && max_pvalue <= 1.0,
                "max_pvalue must be in (0, 1], got {}",
                max_pvalue
            );
        }
        ensure_config!(
            self.edge_weight_power.is_finite() && self.edge_weight_power >= 1.0,
            "edge_weight_power must be at least 1, got {}",
            self.edge_weight_power
        );
        ensure_config!(
            self.pvalue_target > 0.0 && self.pvalue_target < 1.0,
            "pvalue_target must be in (0, 1), got {}",
            self.pvalue_target
        );
        ensure_config!(
            self.max_pvalue_cv > 0.0 && self.max_pvalue_cv.is_finite(),
            "max_pvalue_cv must be positive, got {}",
            self.max_pvalue_cv
        );
        ensure_config!(
            self.parameter_smoothing_window == 0
                || (self.parameter_smoothing_window >= 3
                    && self.parameter_smoothing_window % 2 == 1),
            "parameter_smoothing_window must be 0 or an odd number of at least 3, got {}",
            self.parameter_smoothing_window
        );
        ensure_config!(
            self.start_diagonal < self.min_size,
            "start_diagonal {} must be smaller than min_size {}",
            self.start_diagonal,
            self.min_size
        );
        ensure_config!(
            self.min_pvalue > 0.0 && self.min_pvalue < 0.5,
            "min_pvalue must be in (0, 0.5), got {}",
            self.min_pvalue
        );
        ensure_config!(
            !matches!(self.num_shuffles, ShuffleCount::Fixed(0)),
            "number of shuffles must be positive"
        );
        ensure_config!(
            !matches!(self.bins, Bins::Fixed(0)),
            "number of bins must be positive"
        );
        Ok(())
    }

    /// Upper bound on region size for an input of `n` elements.
    ///
    /// Bounds above half the input are lowered to `n / 2`.
    pub fn resolve_max_size(
        &self,
        n: usize,
    ) -> anyhow::Result<usize> {
        let requested = self
            .max_size
            .unwrap_or_else(|| (n / DEFAULT_MAX_SIZE_FACTOR).max(self.min_size + 1));
        let half = n / 2;
        let max_size = if requested > half {
            info!(
                "Max size {} is too large for {} elements, setting to {}",
                requested, n, half
            );
            half
        }
        else {
            requested
        };

        if max_size < self.min_size {
            return Err(PeasError::InsufficientData {
                needed: 2 * self.min_size - 1,
                found:  n,
            }
            .into());
        }
        Ok(max_size)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PeasConfig::default();
        config.validate().unwrap();
        assert_eq!(config.min_size, 2);
        assert_eq!(config.max_pvalue, Some(0.05));
        assert_eq!(config.tail, Tail::Both);
        assert!(config.stitch_adjacent);
    }

    #[test]
    fn json_with_partial_fields() {
        let config = PeasConfig::from_json(
            r#"{"min_size": 3, "tail": "right", "num_shuffles": "250", "random_seed": 7}"#,
        )
        .unwrap();
        assert_eq!(config.min_size, 3);
        assert_eq!(config.tail, Tail::Right);
        assert_eq!(config.num_shuffles, ShuffleCount::Fixed(250));
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.aggregate_function, AggregateKind::Mean);

        let round_trip = PeasConfig::from_json(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(round_trip, config);
    }

    #[rstest]
    #[case(r#"{"tail": "upper"}"#)]
    #[case(r#"{"min_size": 1}"#)]
    #[case(r#"{"unknown": 1}"#)]
    #[case(r#"{"parameter_smoothing_window": 4}"#)]
    #[case(r#"{"min_size": 2, "start_diagonal": 2}"#)]
    fn invalid_json(#[case] json: &str) {
        assert!(PeasConfig::from_json(json).is_err());
    }

    #[test]
    fn validation_errors_are_configuration_errors() {
        let err = PeasConfig::default()
            .with_max_pvalue(Some(0.0))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PeasError>(),
            Some(PeasError::Configuration(_))
        ));
    }

    #[rstest]
    #[case(None, 100, 25)]
    #[case(None, 10, 3)]
    #[case(Some(8), 100, 8)]
    #[case(Some(80), 100, 50)]
    fn max_size_resolution(
        #[case] max_size: Option<usize>,
        #[case] n: usize,
        #[case] expected: usize,
    ) {
        let config = PeasConfig::default().with_max_size(max_size);
        assert_eq!(config.resolve_max_size(n).unwrap(), expected);
    }

    #[test]
    fn max_size_below_min_size() {
        let err = PeasConfig::default()
            .with_min_size(4)
            .with_start_diagonal(1)
            .resolve_max_size(6)
            .unwrap_err();
        assert!(err.downcast_ref::<PeasError>().unwrap().is_insufficient_data());
    }
}
