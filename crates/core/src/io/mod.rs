//! Reading and writing rasters and parameter tables

mod geotiff;
mod table;

pub use geotiff::{
    read_geotiff, read_geotiff_from_buffer, read_raster_info, write_geotiff,
    write_geotiff_in_place, write_geotiff_to_buffer, RasterInfo,
};
pub use table::{load_table, LookupTable, Record, Value};
