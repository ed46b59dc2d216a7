//! # peas
//!
//! `peas` finds statistically significant contiguous regions in an ordered
//! signal: a vector of values, or a symmetric matrix over ordered elements
//! such as a correlation matrix.
//!
//! Every interval (or triangular submatrix) up to a maximum size is
//! summarized by an aggregate statistic, its significance is estimated
//! against a null distribution of that statistic for intervals of the same
//! size, and the set of non-overlapping intervals that jointly maximizes the
//! chosen objective is selected by dynamic programming.
//!
//! ## Key Features
//!
//! * **Incremental tables**: sums, means, minima and maxima of all intervals
//!   in O(n * max_size) through a diagonal recurrence.
//! * **Null models**: closed form distributions for vectors, random
//!   symmetric permutations for matrices with the number of permutations
//!   derived from the p-value precision target.
//! * **Tail extrapolation**: generalized Pareto tails beyond the point where
//!   permutation p-values stop being precise, fitted with `argmin`.
//! * **Optimal selection**: exact maximization of the summed edge weights
//!   with deterministic tie-breaking.
//! * **Parallel Processing**: permutations, tail fits and scoring run on a
//!   rayon thread pool.
//!
//! Number of threads to be used can be configured with setting
//! `PEAS_NUM_THREADS` environment variable.
//!
//! ## Structure
//!
//! * [`data_structs`]: inputs, results and the closed enumerations of the
//!   configuration.
//! * [`tools`]: the pipeline stages and the [`PeaFinder`] orchestrator.
//! * [`utils`]: trimming, gap filling and statistical helpers.
//! * [`error`]: the [`PeasError`] root causes.
//!
//! ## Usage
//!
//! ```no_run
//! use peas::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let values = vec![0.1, -0.2, 0.0, 2.9, 3.1, 3.0, 0.1, -0.1, 0.2, 0.0];
//!     let config = PeasConfig::default()
//!         .with_min_size(3)
//!         .with_tail(Tail::Right);
//!     let finder = PeaFinder::new(config)?;
//!
//!     for region in finder.find(&Signal::from(values))?.regions {
//!         println!("{}", region);
//!     }
//!     Ok(())
//! }
//! ```

pub mod data_structs;
pub mod error;
pub mod prelude;
pub mod tools;
pub mod utils;

pub use crate::error::PeasError;
pub use crate::tools::peas::{
    PeaFinder,
    PeasConfig,
};
