//! Statistical reductions over rasters
//!
//! - **masked**: area-of-interest sums and means, per-class sums and counts,
//!   per-class change counts

pub mod masked;

pub use masked::{changed_by_class, class_counts, class_summaries, masked_summary, Summary};
