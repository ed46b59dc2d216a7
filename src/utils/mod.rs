//! Utility functions and helper macros used throughout the crate.
//!
//! - The crate-wide rayon [`THREAD_POOL`], sized by the `PEAS_NUM_THREADS`
//!   environment variable (all cores when unset).
//! - Statistical helpers: Pearson correlation, ranks and the rank-based
//!   inverse normal transform.
//! - Array helpers for trimming missing edges and filling missing matrix
//!   cells.
//! - The builder-style `with_*` method macro.

mod arrays;
mod stats;

pub use arrays::*;
use once_cell::sync::Lazy;
use rayon::{
    ThreadPool,
    ThreadPoolBuilder,
};
pub use stats::*;

pub static THREAD_POOL: Lazy<ThreadPool> = Lazy::new(|| {
    let num_threads: Option<usize> = std::env::var("PEAS_NUM_THREADS")
        .ok()
        .and_then(|str| str.parse::<usize>().ok());
    ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .expect("Failed to create thread pool")
});

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
            self.$field_name = value;
            self
            }
        }
    };
}
pub use with_field_fn;
