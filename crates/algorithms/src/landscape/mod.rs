//! Landscape structure algorithms
//!
//! Geometric measures over categorical land-cover rasters:
//! - **Edge distance**: Euclidean distance from forest pixels to the forest edge
//! - **Proximity**: distance to the nearest source pixel (e.g. infrastructure)
//! - **FFQI**: Gaussian-smoothed naturalness (forest fragmentation quality index)

mod distance;
mod fragmentation;

pub use distance::{
    edge_distance, euclidean_distance_transform, proximity,
    EdgeDistance, EdgeDistanceParams,
};
pub use fragmentation::{
    ffqi, ffqi_excluding, gaussian_blur, gaussian_kernel,
    Ffqi, FfqiParams,
};
