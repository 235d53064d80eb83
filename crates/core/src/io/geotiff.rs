//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for the container. Georeferencing lives in the
//! standard GeoTIFF tags: `ModelPixelScale` + `ModelTiepoint` for north-up
//! grids, `ModelTransformation` for anything skewed or flipped. The no-data
//! value is stored in the `GDAL_NODATA` ASCII tag and the projection
//! definition in `GeoAsciiParams`, both as plain text.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{DataType, GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, ColorType as EncodeColorType};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;

/// Header metadata of a raster file, read without decoding pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub cols: usize,
    pub rows: usize,
    pub data_type: DataType,
    pub transform: GeoTransform,
    pub projection: String,
    pub nodata: Option<f64>,
}

fn tiff_err(context: &str, e: tiff::TiffError) -> Error {
    match e {
        tiff::TiffError::IoError(io) => Error::Io(io),
        other => Error::Other(format!("{}: {}", context, other)),
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::from_io(e, path))
}

/// Read a GeoTIFF file into a Raster.
///
/// Values are cast to `T`; cells that cannot be represented become the
/// type's default no-data value.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    decode_geotiff(open(path.as_ref())?)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

/// Read dimensions, element type and georeferencing of a GeoTIFF file
pub fn read_raster_info<P: AsRef<Path>>(path: P) -> Result<RasterInfo> {
    let mut decoder =
        Decoder::new(open(path.as_ref())?).map_err(|e| tiff_err("TIFF decode error", e))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| tiff_err("Cannot read dimensions", e))?;
    let data_type = read_data_type(&mut decoder)?;
    let meta = read_georeference(&mut decoder);

    Ok(RasterInfo {
        cols: width as usize,
        rows: height as usize,
        data_type,
        transform: meta.transform,
        projection: meta.projection,
        nodata: meta.nodata,
    })
}

fn read_data_type<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<DataType> {
    let bits = decoder.get_tag_u32(Tag::BitsPerSample).unwrap_or(8);
    // SampleFormat: 1 = unsigned, 2 = signed, 3 = IEEE float
    let format = decoder.get_tag_u32(Tag::SampleFormat).unwrap_or(1);
    match (bits, format) {
        (8, 1) => Ok(DataType::U8),
        (32, 2) => Ok(DataType::I32),
        (32, 3) => Ok(DataType::F32),
        (64, 3) => Ok(DataType::F64),
        _ => Err(Error::UnsupportedDataType(format!(
            "{}-bit samples with sample format {}",
            bits, format
        ))),
    }
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| tiff_err("TIFF decode error", e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| tiff_err("Cannot read dimensions", e))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| tiff_err("Cannot read image data", e))?;

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "only u8, i32, f32 and f64 rasters are supported".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    let meta = read_georeference(&mut decoder);
    raster.set_transform(meta.transform);
    if !meta.projection.is_empty() {
        raster.set_crs(Some(CRS::new(meta.projection)));
    }
    raster.set_nodata(meta.nodata.and_then(num_traits::cast));

    Ok(raster)
}

struct Georeference {
    transform: GeoTransform,
    projection: String,
    nodata: Option<f64>,
}

fn read_georeference<R: Read + Seek>(decoder: &mut Decoder<R>) -> Georeference {
    let transform = read_transform(decoder).unwrap_or_default();

    let projection = decoder
        .get_tag_ascii_string(Tag::GeoAsciiParamsTag)
        .map(|s| {
            let s = s.trim_end_matches('\0');
            s.strip_suffix('|').unwrap_or(s).to_string()
        })
        .unwrap_or_default();

    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok());

    Georeference {
        transform,
        projection,
        nodata,
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() >= 8 {
            return Some(GeoTransform {
                origin_x: m[3],
                pixel_width: m[0],
                row_skew: m[1],
                origin_y: m[7],
                col_skew: m[4],
                pixel_height: m[5],
            });
        }
    }

    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// Write a Raster to a GeoTIFF file using `T`'s element type and the
/// raster's no-data value.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Overwrite an existing GeoTIFF, which must already hold `T` values on
/// the same grid.
pub fn write_geotiff_in_place<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let info = read_raster_info(path.as_ref())?;
    if info.data_type != T::DATA_TYPE {
        return Err(Error::Mismatch {
            what: "element type",
            expected: info.data_type.to_string(),
            actual: T::DATA_TYPE.to_string(),
        });
    }
    if (info.rows, info.cols) != raster.shape() {
        return Err(Error::Mismatch {
            what: "dimensions",
            expected: format!("{}x{}", info.cols, info.rows),
            actual: format!("{}x{}", raster.cols(), raster.rows()),
        });
    }
    if info.transform != *raster.transform() {
        return Err(Error::Mismatch {
            what: "geotransform",
            expected: info.transform.to_string(),
            actual: raster.transform().to_string(),
        });
    }
    write_geotiff(raster, path)
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn values_as<T: RasterElement, U: RasterElement>(raster: &Raster<T>) -> Result<Vec<U>> {
    raster
        .values()
        .map(|v| {
            num_traits::cast::<T, U>(v)
                .ok_or_else(|| Error::UnsupportedDataType(format!("cannot encode {} as {}", v, U::DATA_TYPE)))
        })
        .collect()
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;

    match T::DATA_TYPE {
        DataType::U8 => {
            let data: Vec<u8> = values_as(raster)?;
            write_band::<colortype::Gray8, _, _>(&mut encoder, raster, &data)
        }
        DataType::I32 => {
            let data: Vec<i32> = values_as(raster)?;
            write_band::<colortype::GrayI32, _, _>(&mut encoder, raster, &data)
        }
        DataType::F32 => {
            let data: Vec<f32> = values_as(raster)?;
            write_band::<colortype::Gray32Float, _, _>(&mut encoder, raster, &data)
        }
        DataType::F64 => {
            let data: Vec<f64> = values_as(raster)?;
            write_band::<colortype::Gray64Float, _, _>(&mut encoder, raster, &data)
        }
    }
}

fn write_band<C, T, W>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, data: &[C::Inner]) -> Result<()>
where
    C: EncodeColorType,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("Cannot create TIFF image", e))?;

    write_georeference(image.encoder(), raster)?;

    image
        .write_data(data)
        .map_err(|e| tiff_err("Cannot write image data", e))
}

fn write_georeference<W, K, T>(dir: &mut DirectoryEncoder<'_, W, K>, raster: &Raster<T>) -> Result<()>
where
    W: Write + Seek,
    K: TiffKind,
    T: RasterElement,
{
    let gt = raster.transform();

    if gt.is_north_up() {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])
            .map_err(|e| tiff_err("Cannot write scale tag", e))?;
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])
            .map_err(|e| tiff_err("Cannot write tiepoint tag", e))?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_skew, 0.0, gt.origin_x,
            gt.col_skew, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, &matrix[..])
            .map_err(|e| tiff_err("Cannot write transformation tag", e))?;
    }

    // GeoKeyDirectory: version 1.1.0, GTModelType = projected,
    // GTRasterType = PixelIsArea, plus a citation pointing into
    // GeoAsciiParams when a projection is present.
    let projection = raster.projection();
    let mut geokeys: Vec<u16> = vec![1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
    if !projection.is_empty() {
        let ascii = format!("{}|", projection);
        let count = u16::try_from(ascii.len()).map_err(|_| Error::InvalidParameter {
            name: "projection",
            value: raster.crs().map(CRS::identifier).unwrap_or_default(),
            reason: "definition longer than 65534 bytes".to_string(),
        })?;
        geokeys[3] = 3;
        geokeys.extend_from_slice(&[1026, 34737, count, 0]);
        dir.write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())
            .map_err(|e| tiff_err("Cannot write projection tag", e))?;
    }
    dir.write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| tiff_err("Cannot write geokey tag", e))?;

    if let Some(nd) = raster.nodata() {
        let text = nd.to_string();
        dir.write_tag(Tag::GdalNodata, text.as_str())
            .map_err(|e| tiff_err("Cannot write nodata tag", e))?;
    }

    Ok(())
}
