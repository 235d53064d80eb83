//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::{self, Debug, Display};

/// Element type tag carried by rasters and raster files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    I32,
    F32,
    F64,
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U8 => "u8",
            DataType::I32 => "i32",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// Implemented for exactly the element types the raster files support:
/// `u8`, `i32`, `f32` and `f64`.
pub trait RasterElement:
    Copy + Clone + Debug + Display + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Type tag written to and checked against raster files
    const DATA_TYPE: DataType;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $tag:expr, $nodata:expr) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = $tag;

            fn default_nodata() -> Self {
                $nodata
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $tag:expr) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = $tag;

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

impl_raster_element_int!(u8, DataType::U8, u8::MAX);
impl_raster_element_int!(i32, DataType::I32, -1);
impl_raster_element_float!(f32, DataType::F32);
impl_raster_element_float!(f64, DataType::F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_nan_is_always_nodata() {
        assert!(f32::NAN.is_nodata(None));
        assert!(f64::NAN.is_nodata(Some(-9999.0)));
        assert!(!1.5f32.is_nodata(None));
    }

    #[test]
    fn test_int_nodata_requires_sentinel() {
        assert!(!(-1i32).is_nodata(None));
        assert!((-1i32).is_nodata(Some(-1)));
        assert_eq!(<u8 as RasterElement>::DATA_TYPE, DataType::U8);
    }
}
