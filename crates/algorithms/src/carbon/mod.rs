//! Aboveground carbon
//!
//! - **pools**: carbon densities per land-cover class from a CSV table
//! - **regression**: biomass as a log function of forest edge distance
//! - **stock**: per-pixel carbon from regression, table or class mean

mod pools;
mod regression;
mod stock;

pub use pools::{
    CarbonPool, CarbonPoolTable,
    C_ABOVE_MEAN_COLUMN, C_BELOW_COLUMN, C_DEAD_COLUMN, C_SOIL_COLUMN, LULC_COLUMN,
};
pub use regression::LogRegression;
pub use stock::{CarbonModel, CarbonParams, CarbonSource};
