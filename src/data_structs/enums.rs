use std::fmt::Display;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

use crate::error::PeasError;

/// Implements string based (de)serialization through [`Display`] and
/// [`FromStr`].
macro_rules! string_serde {
    ($name: ident) => {
        impl Serialize for $name {
            fn serialize<S>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer, {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>, {
                let s = String::deserialize(deserializer)?;
                FromStr::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Aggregate statistic computed over every interval.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "console", derive(clap::ValueEnum))]
pub enum AggregateKind {
    Sum,
    #[default]
    Mean,
    Min,
    Max,
}

impl AggregateKind {
    /// Combines two values of adjacent smaller intervals for the
    /// non-invertible statistics.
    #[inline]
    pub(crate) fn extremum(
        &self,
        a: f64,
        b: f64,
    ) -> f64 {
        match self {
            AggregateKind::Min => a.min(b),
            AggregateKind::Max => a.max(b),
            _ => unreachable!("extremum is only defined for min and max"),
        }
    }

    /// Aggregate of `values` computed directly. `NaN` if there are none.
    pub fn aggregate<I>(
        &self,
        values: I,
    ) -> f64
    where
        I: IntoIterator<Item = f64>, {
        let mut iter = values.into_iter();
        let Some(first) = iter.next()
        else {
            return f64::NAN;
        };
        match self {
            AggregateKind::Sum => iter.fold(first, |acc, v| acc + v),
            AggregateKind::Mean => {
                let (sum, count) = iter.fold((first, 1usize), |(s, c), v| (s + v, c + 1));
                sum / count as f64
            },
            extremum => iter.fold(first, |acc, v| extremum.extremum(acc, v)),
        }
    }
}

impl Display for AggregateKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            AggregateKind::Sum => write!(f, "sum"),
            AggregateKind::Mean => write!(f, "mean"),
            AggregateKind::Min => write!(f, "min"),
            AggregateKind::Max => write!(f, "max"),
        }
    }
}

impl FromStr for AggregateKind {
    type Err = PeasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(AggregateKind::Sum),
            "mean" => Ok(AggregateKind::Mean),
            "min" => Ok(AggregateKind::Min),
            "max" => Ok(AggregateKind::Max),
            other => {
                Err(PeasError::config(format!(
                    "unknown aggregate function '{}', expected one of sum/mean/min/max",
                    other
                )))
            },
        }
    }
}

string_serde!(AggregateKind);

/// Which tail of the null distribution counts as significant.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "console", derive(clap::ValueEnum))]
pub enum Tail {
    /// Unusually small aggregates.
    Left,
    /// Unusually large aggregates.
    Right,
    /// Either direction, p-value doubled.
    #[default]
    Both,
}

impl Display for Tail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Tail::Left => write!(f, "left"),
            Tail::Right => write!(f, "right"),
            Tail::Both => write!(f, "both"),
        }
    }
}

impl FromStr for Tail {
    type Err = PeasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Tail::Left),
            "right" => Ok(Tail::Right),
            "both" => Ok(Tail::Both),
            other => {
                Err(PeasError::config(format!(
                    "unknown tail '{}', expected one of left/right/both",
                    other
                )))
            },
        }
    }
}

string_serde!(Tail);

/// Objective maximized by the region selector.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "console", derive(clap::ValueEnum))]
pub enum ObjectiveKind {
    /// Minimize the product of p-values (maximize the sum of p-scores).
    #[default]
    #[cfg_attr(feature = "console", value(name = "p_prod"))]
    PProd,
    /// Maximize the distance from the diagonal, i.e. coverage.
    Coverage,
    /// Maximize the summed raw aggregate.
    Score,
    /// Maximize the information content under the null.
    Information,
    /// Maximize the summed standard normal quantiles of the p-values.
    Z,
}

impl Display for ObjectiveKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ObjectiveKind::PProd => write!(f, "p_prod"),
            ObjectiveKind::Coverage => write!(f, "coverage"),
            ObjectiveKind::Score => write!(f, "score"),
            ObjectiveKind::Information => write!(f, "information"),
            ObjectiveKind::Z => write!(f, "z"),
        }
    }
}

impl FromStr for ObjectiveKind {
    type Err = PeasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "p_prod" | "pprod" => Ok(ObjectiveKind::PProd),
            "coverage" => Ok(ObjectiveKind::Coverage),
            "score" => Ok(ObjectiveKind::Score),
            "information" => Ok(ObjectiveKind::Information),
            "z" => Ok(ObjectiveKind::Z),
            other => {
                Err(PeasError::config(format!(
                    "unknown maximization target '{}', expected one of \
                     p_prod/coverage/score/information/z",
                    other
                )))
            },
        }
    }
}

string_serde!(ObjectiveKind);

/// Null distribution family fitted to permuted matrix samples.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "console", derive(clap::ValueEnum))]
pub enum DistributionKind {
    /// Plain histogram of the permuted sample.
    Empirical,
    /// Histogram center with generalized Pareto tails.
    #[default]
    Hybrid,
}

impl Display for DistributionKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            DistributionKind::Empirical => write!(f, "empirical"),
            DistributionKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for DistributionKind {
    type Err = PeasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "empirical" => Ok(DistributionKind::Empirical),
            "hybrid" => Ok(DistributionKind::Hybrid),
            other => {
                Err(PeasError::config(format!(
                    "unknown null distribution '{}', expected empirical or hybrid",
                    other
                )))
            },
        }
    }
}

string_serde!(DistributionKind);

/// Number of matrix permutations, either given or derived from the p-value
/// precision target.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default)]
pub enum ShuffleCount {
    #[default]
    Auto,
    Fixed(usize),
}

impl Display for ShuffleCount {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ShuffleCount::Auto => write!(f, "auto"),
            ShuffleCount::Fixed(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for ShuffleCount {
    type Err = PeasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(ShuffleCount::Auto);
        }
        match s.parse::<usize>() {
            Ok(0) | Err(_) => {
                Err(PeasError::config(format!(
                    "number of shuffles must be 'auto' or a positive integer, got '{}'",
                    s
                )))
            },
            Ok(n) => Ok(ShuffleCount::Fixed(n)),
        }
    }
}

string_serde!(ShuffleCount);

/// Histogram bin count.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, Default)]
pub enum Bins {
    /// The larger of the Sturges and Freedman-Diaconis bin counts.
    #[default]
    Auto,
    Fixed(usize),
}

impl Display for Bins {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Bins::Auto => write!(f, "auto"),
            Bins::Fixed(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for Bins {
    type Err = PeasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Bins::Auto);
        }
        match s.parse::<usize>() {
            Ok(0) | Err(_) => {
                Err(PeasError::config(format!(
                    "bins must be 'auto' or a positive integer, got '{}'",
                    s
                )))
            },
            Ok(n) => Ok(Bins::Fixed(n)),
        }
    }
}

string_serde!(Bins);
