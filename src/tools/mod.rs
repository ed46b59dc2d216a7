//! The stages of a region search, in pipeline order.
//!
//! - [`tables`]: aggregate statistic of every interval, built diagonal by
//!   diagonal, and the cached mean denominators of matrix tables.
//! - [`null`]: aggregates of randomly permuted matrices, the null sample of
//!   every interval size, and the number of permutations needed.
//! - [`dist`]: queryable null distributions per interval size, histograms
//!   with optional generalized Pareto tails.
//! - [`scoring`]: p-scores, the admissibility mask and the edge weights of
//!   the configured objective.
//! - [`choosing`]: dynamic programming selection of non-overlapping
//!   intervals and stitching of touching ones.
//! - [`peas`]: the orchestrator tying the stages together.
pub mod choosing;
pub mod dist;
pub mod null;
pub mod peas;
pub mod scoring;
pub mod tables;
