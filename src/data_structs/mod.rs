//! Core data structures shared by the pipeline stages.
//!
//! - [`Signal`]: the ordered input, either a vector or a symmetric matrix.
//! - [`Region`] and [`PeasResult`]: what a run reports.
//! - Closed enumerations selecting the aggregate statistic
//!   ([`AggregateKind`]), the tested tail ([`Tail`]), the optimized objective
//!   ([`ObjectiveKind`]) and the null model ([`DistributionKind`]).

mod enums;
mod region;
mod signal;

pub use enums::{
    AggregateKind,
    Bins,
    DistributionKind,
    ObjectiveKind,
    ShuffleCount,
    Tail,
};
pub use region::{
    PeasResult,
    Region,
};
pub use signal::Signal;
