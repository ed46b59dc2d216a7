use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised by the region finding pipeline.
///
/// Functions in this crate return [`anyhow::Result`]; the variants below are
/// the root causes callers may want to tell apart, e.g. with
/// `err.downcast_ref::<PeasError>()`.
#[derive(Debug, Clone, PartialEq)]
pub enum PeasError {
    /// Invalid parameters or input shape. Never recoverable.
    Configuration(String),
    /// The (trimmed) input is too short to hold a region of the minimum
    /// size. Fatal for that input only.
    InsufficientData { needed: usize, found: usize },
}

impl PeasError {
    pub fn config<S: Into<String>>(desc: S) -> Self {
        PeasError::Configuration(desc.into())
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, PeasError::InsufficientData { .. })
    }
}

impl Display for PeasError {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            PeasError::Configuration(desc) => {
                write!(f, "Configuration error: {}", desc)
            },
            PeasError::InsufficientData { needed, found } => {
                write!(
                    f,
                    "Insufficient data: {} elements remain after trimming, more than {} needed",
                    found, needed
                )
            },
        }
    }
}

impl Error for PeasError {}

/// Returns early with a [`PeasError::Configuration`] if the condition fails.
#[macro_export]
macro_rules! ensure_config {
    ($cond: expr, $($arg: tt)+) => {
        if !$cond {
            return Err($crate::error::PeasError::config(format!($($arg)+)).into());
        }
    };
}
