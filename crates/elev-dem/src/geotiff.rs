//! GeoTIFF reading and writing.
//!
//! Georeferencing is carried by the standard GeoTIFF tags:
//! - `ModelTransformation` (34264), or `ModelTiepoint` (33922) + `ModelPixelScale` (33550)
//! - `GeoKeyDirectory` (34735) for the EPSG code of the reference system
//! - `GDAL_NODATA` (42113) for the no-data sentinel, stored as ASCII
//!
//! Bands are read either from interleaved samples of a single image or from
//! successive full-size pages. Bands are written as successive pages.

use crate::geo::{Crs, CrsKind, GeoTransform};
use crate::{DemError, Raster, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::str::FromStr;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// Pixel data type used when writing a raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    /// Unsigned 16-bit integers.
    #[default]
    UInt16,
    /// Signed 16-bit integers.
    Int16,
    /// 32-bit floats.
    Float32,
    /// 64-bit floats.
    Float64,
}

impl PixelType {
    /// Inclusive value range of the integer pixel types.
    fn integer_range(&self) -> Option<(f64, f64)> {
        match self {
            PixelType::UInt16 => Some((0.0, f64::from(u16::MAX))),
            PixelType::Int16 => Some((f64::from(i16::MIN), f64::from(i16::MAX))),
            PixelType::Float32 | PixelType::Float64 => None,
        }
    }

    /// The no-data sentinel as stored in this pixel type.
    ///
    /// Integer types cannot hold NaN or a sentinel outside their range
    /// (ASTER's -9999 in UInt16); missing cells are stored as 0 instead.
    pub fn stored_no_data(&self, no_data: Option<f64>) -> Option<f64> {
        let value = no_data?;
        match self.integer_range() {
            Some((min, max)) => {
                let rounded = value.round();
                Some(if (min..=max).contains(&rounded) { rounded } else { 0.0 })
            }
            None => Some(value),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelType::UInt16 => "UInt16",
            PixelType::Int16 => "Int16",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uint16" | "u16" => Ok(PixelType::UInt16),
            "int16" | "i16" => Ok(PixelType::Int16),
            "float32" | "f32" => Ok(PixelType::Float32),
            "float64" | "f64" => Ok(PixelType::Float64),
            other => Err(format!("unknown pixel type '{}'", other)),
        }
    }
}

/// Raster container format tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterFormat {
    /// GeoTIFF.
    #[default]
    #[serde(rename = "GTiff", alias = "gtiff")]
    GTiff,
}

impl FromStr for RasterFormat {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("gtiff") {
            Ok(RasterFormat::GTiff)
        } else {
            Err(DemError::UnsupportedFormat(s.to_string()))
        }
    }
}

/// Load a raster from a GeoTIFF file.
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    let file = BufReader::new(File::open(path)?);
    let mut decoder = Decoder::new(file)?;

    // Set limits to allow large DEM files
    // 1/3 arc-second tiles are 10812 x 10812 pixels = ~116 million pixels
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    decoder = decoder.with_limits(limits);

    let (width, height) = decoder.dimensions()?;
    let geo_transform = read_geotransform(&mut decoder, path)?;
    let crs = read_crs(&mut decoder);
    let no_data = read_nodata_value(&mut decoder);

    let pixels = width as usize * height as usize;
    let mut data = Vec::new();
    let mut bands = 0;
    loop {
        let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1) as usize;
        let values = decode_elevation_data(&mut decoder)?;
        if values.len() != pixels * samples {
            return Err(DemError::InvalidGeoTiff(format!(
                "{}: page has {} samples, expected {}",
                path.display(),
                values.len(),
                pixels * samples
            )));
        }
        deinterleave(&values, samples, &mut data);
        bands += samples;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
        // Overviews and masks have other dimensions; only full-size pages are bands.
        if decoder.dimensions()? != (width, height) {
            break;
        }
    }

    debug!(
        path = %path.display(),
        width,
        height,
        bands,
        %crs,
        "Read GeoTIFF"
    );

    Raster::new(
        data,
        bands,
        height as usize,
        width as usize,
        geo_transform,
        crs,
        no_data,
    )
}

/// Append interleaved samples to `out` as separate bands.
fn deinterleave(values: &[f64], samples: usize, out: &mut Vec<f64>) {
    if samples == 1 {
        out.extend_from_slice(values);
        return;
    }
    for band in 0..samples {
        out.extend(values.iter().skip(band).step_by(samples));
    }
}

/// Read the geotransform from GeoTIFF tags.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<GeoTransform> {
    // ModelTransformation is a row-major 4x4 matrix mapping (col, row, 0, 1) to (x, y, z, 1)
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() >= 16 {
            return Ok(GeoTransform::from_array([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
    let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 {
            // Tiepoint format: [i, j, k, x, y, z] where (i,j) is pixel coords and (x,y) is geo coords
            let (i, j, tie_x, tie_y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
            let (scale_x, scale_y) = (scale[0], scale[1]);

            // Data goes south and east from the tie point
            return Ok(GeoTransform::north_up(
                tie_x - i * scale_x,
                tie_y + j * scale_y,
                scale_x,
                -scale_y,
            ));
        }
    }

    Err(DemError::InvalidGeoTiff(format!(
        "{}: no ModelTransformation or ModelTiepoint/ModelPixelScale tags",
        path.display()
    )))
}

/// Read the reference system from the GeoKey directory.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Crs {
    match decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag) {
        Ok(keys) => parse_geo_keys(&keys),
        Err(_) => Crs::Unknown,
    }
}

/// Extract the EPSG code from a GeoKey directory.
///
/// The directory is a header `[version, revision, minor, count]` followed by
/// `count` entries of `[key, location, count, value]`. Only inline values
/// (location 0) carry EPSG codes.
fn parse_geo_keys(keys: &[u16]) -> Crs {
    if keys.len() < 4 {
        return Crs::Unknown;
    }
    let count = keys[3] as usize;
    let mut geographic = None;
    let mut projected = None;

    for entry in keys[4..].chunks_exact(4).take(count) {
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_KEY => projected = Some(entry[3]),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(entry[3]),
            _ => {}
        }
    }

    let usable = |code: &u16| *code != 0 && *code != USER_DEFINED;
    projected
        .filter(usable)
        .or(geographic.filter(usable))
        .map_or(Crs::Unknown, |code| Crs::Epsg(u32::from(code)))
}

/// Decode one page of samples from the TIFF decoder.
fn decode_elevation_data<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f64>> {
    let result = decoder.read_image()?;

    match result {
        DecodingResult::F32(data) => Ok(data.into_iter().map(f64::from).collect()),
        DecodingResult::F64(data) => Ok(data),
        DecodingResult::I16(data) => Ok(data.into_iter().map(f64::from).collect()),
        DecodingResult::I32(data) => Ok(data.into_iter().map(f64::from).collect()),
        DecodingResult::U16(data) => Ok(data.into_iter().map(f64::from).collect()),
        DecodingResult::U32(data) => Ok(data.into_iter().map(f64::from).collect()),
        DecodingResult::U8(data) => Ok(data.into_iter().map(f64::from).collect()),
        DecodingResult::I8(data) => Ok(data.into_iter().map(f64::from).collect()),
        DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f64).collect()),
        DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f64).collect()),
    }
}

/// Try to read the no-data value from the GDAL_NODATA tag.
fn read_nodata_value<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let text = text.trim_matches(char::from(0)).trim();
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

/// Save a raster in the given container format.
pub fn write_raster<P: AsRef<Path>>(
    path: P,
    raster: &Raster,
    pixel_type: PixelType,
    format: RasterFormat,
) -> Result<()> {
    match format {
        RasterFormat::GTiff => write_geotiff(path, raster, pixel_type),
    }
}

/// Save a raster as a GeoTIFF file, one page per band.
///
/// For integer pixel types, missing cells are written as the no-data sentinel
/// the pixel type can store (see [`PixelType::stored_no_data`], 0 without a
/// sentinel) and other values are rounded to the nearest integer. Values the
/// pixel type cannot hold are rejected. `GDAL_NODATA` records the stored
/// sentinel.
pub fn write_geotiff<P: AsRef<Path>>(path: P, raster: &Raster, pixel_type: PixelType) -> Result<()> {
    let path = path.as_ref();
    let no_data = pixel_type.stored_no_data(raster.no_data());
    let tags = GeoTags::for_raster(raster, no_data)?;
    let fill = no_data.unwrap_or(0.0);
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;

    for band in 0..raster.band_count() {
        let values = raster.band(band)?;
        match pixel_type {
            PixelType::UInt16 => {
                let data = to_integer_pixels(raster, band, values, pixel_type, fill, |v| {
                    (0.0..=f64::from(u16::MAX)).contains(&v).then(|| v as u16)
                })?;
                write_page::<_, colortype::Gray16>(&mut encoder, raster, &tags, &data)?;
            }
            PixelType::Int16 => {
                let data = to_integer_pixels(raster, band, values, pixel_type, fill, |v| {
                    (f64::from(i16::MIN)..=f64::from(i16::MAX))
                        .contains(&v)
                        .then(|| v as i16)
                })?;
                write_page::<_, colortype::GrayI16>(&mut encoder, raster, &tags, &data)?;
            }
            PixelType::Float32 => {
                let data = to_f32_pixels(band, values)?;
                write_page::<_, colortype::Gray32Float>(&mut encoder, raster, &tags, &data)?;
            }
            PixelType::Float64 => {
                write_page::<_, colortype::Gray64Float>(&mut encoder, raster, &tags, values)?;
            }
        }
    }

    debug!(
        path = %path.display(),
        rows = raster.rows(),
        cols = raster.cols(),
        bands = raster.band_count(),
        %pixel_type,
        "Wrote GeoTIFF"
    );
    Ok(())
}

fn write_page<W, C>(
    encoder: &mut TiffEncoder<W>,
    raster: &Raster,
    tags: &GeoTags,
    data: &[C::Inner],
) -> Result<()>
where
    W: Write + Seek,
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(raster.cols() as u32, raster.rows() as u32)?;
    let directory = image.encoder();
    match &tags.transformation {
        Some(matrix) => directory.write_tag(Tag::ModelTransformationTag, &matrix[..])?,
        None => {
            directory.write_tag(Tag::ModelTiepointTag, &tags.tiepoint[..])?;
            directory.write_tag(Tag::ModelPixelScaleTag, &tags.pixel_scale[..])?;
        }
    }
    if let Some(keys) = &tags.geo_keys {
        directory.write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
    }
    if let Some(nodata) = &tags.nodata {
        directory.write_tag(Tag::GdalNodata, nodata.as_str())?;
    }
    image.write_data(data)?;
    Ok(())
}

fn to_integer_pixels<T: Copy>(
    raster: &Raster,
    band: usize,
    values: &[f64],
    pixel_type: PixelType,
    fill: f64,
    convert: impl Fn(f64) -> Option<T>,
) -> Result<Vec<T>> {
    values
        .iter()
        .enumerate()
        .map(|(cell, &v)| {
            let v = if raster.is_no_data(v) { fill } else { v.round() };
            convert(v).ok_or(DemError::ValueOutOfRange {
                value: v,
                band,
                cell,
                pixel_type: pixel_type.name(),
            })
        })
        .collect()
}

fn to_f32_pixels(band: usize, values: &[f64]) -> Result<Vec<f32>> {
    values
        .iter()
        .enumerate()
        .map(|(cell, &v)| {
            let narrowed = v as f32;
            if v.is_finite() && !narrowed.is_finite() {
                return Err(DemError::ValueOutOfRange {
                    value: v,
                    band,
                    cell,
                    pixel_type: PixelType::Float32.name(),
                });
            }
            Ok(narrowed)
        })
        .collect()
}

/// Georeferencing tag values shared by every written page.
struct GeoTags {
    transformation: Option<Vec<f64>>,
    tiepoint: Vec<f64>,
    pixel_scale: Vec<f64>,
    geo_keys: Option<Vec<u16>>,
    nodata: Option<String>,
}

impl GeoTags {
    fn for_raster(raster: &Raster, no_data: Option<f64>) -> Result<Self> {
        let gt = raster.geo_transform();
        // Tiepoint + scale can only express north-up rasters with a negative pixel height.
        let transformation = (!gt.is_north_up() || gt.pixel_height > 0.0).then(|| {
            vec![
                gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
                gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ]
        });

        let geo_keys = match raster.crs() {
            Crs::Epsg(code) => {
                let code = u16::try_from(code).map_err(|_| {
                    DemError::InvalidGeoTiff(format!("EPSG code {} does not fit a GeoKey", code))
                })?;
                let (model_type, type_key) = match raster.crs().kind() {
                    CrsKind::Geographic => (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_KEY),
                    _ => (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_KEY),
                };
                Some(vec![
                    1, 1, 0, 3,
                    GT_MODEL_TYPE_KEY, 0, 1, model_type,
                    GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
                    type_key, 0, 1, code,
                ])
            }
            Crs::Unknown => None,
        };

        let nodata = no_data.map(|v| {
            if v.is_nan() {
                "nan".to_string()
            } else {
                v.to_string()
            }
        });

        Ok(Self {
            transformation,
            tiepoint: vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0],
            pixel_scale: vec![gt.pixel_width, -gt.pixel_height, 0.0],
            geo_keys,
            nodata,
        })
    }
}
