//! EXIF handling for exported crops.
//!
//! An export keeps a short whitelist of camera tags from the source photo,
//! all GPS tags, and records the crop in the UserComment tag as JSON.

use std::io::Cursor;
use std::path::Path;

use exif::experimental::Writer;
use exif::{Context, Field, In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const IFD0_WHITELIST: &[u16] = &[
    0x010f, // Make
    0x0110, // Model
    0x0132, // DateTime
];

const EXIF_WHITELIST: &[u16] = &[
    0x829a, // ExposureTime
    0x829d, // FNumber
    0x8822, // ExposureProgram
    0x8827, // ISOSpeedRatings
    0x8830, // SensitivityType
    0x8832, // RecommendedExposureIndex
    0x9000, // ExifVersion
    0x9003, // DateTimeOriginal
    0x9004, // DateTimeDigitized
    0x9010, // OffsetTime
    0x9011, // OffsetTimeOriginal
    0x9012, // OffsetTimeDigitized
    0x9201, // ShutterSpeedValue
    0x9202, // ApertureValue
    0x9203, // BrightnessValue
    0x9204, // ExposureBiasValue
    0x9205, // MaxApertureValue
    0x9207, // MeteringMode
    0x9208, // LightSource
    0x9209, // Flash
    0x920a, // FocalLength
    0xa402, // ExposureMode
    0xa403, // WhiteBalance
    0xa404, // DigitalZoomRatio
    0xa405, // FocalLengthIn35mmFilm
    0xa406, // SceneCaptureType
    0xa408, // Contrast
    0xa409, // Saturation
    0xa40a, // Sharpness
    0xa432, // LensSpecification
    0xa433, // LensMake
    0xa434, // LensModel
];

const TAG_IMAGE_WIDTH: Tag = Tag(Context::Tiff, 0x0100);
const TAG_IMAGE_LENGTH: Tag = Tag(Context::Tiff, 0x0101);
const TAG_SOFTWARE: Tag = Tag(Context::Tiff, 0x0131);
const TAG_PIXEL_X_DIMENSION: Tag = Tag(Context::Exif, 0xa002);
const TAG_PIXEL_Y_DIMENSION: Tag = Tag(Context::Exif, 0xa003);
const TAG_USER_COMMENT: Tag = Tag(Context::Exif, 0x9286);

const ASCII_CHARSET: &[u8; 8] = b"ASCII\0\0\0";
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("user comment may only contain ASCII characters")]
    NonAsciiComment,
    #[error("data is not a JPEG stream")]
    NotJpeg,
    #[error("EXIF block of {0} bytes does not fit in an APP1 segment")]
    TooLarge(usize),
    #[error("invalid crop comment: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crop rectangle in source image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Payload stored in the UserComment tag of an exported crop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropComment {
    pub crop_area: CropArea,
    pub downscaled: bool,
    /// Quality as a fraction, 0.9 for 90.
    pub jpeg_export_quality: f32,
}

impl CropComment {
    pub fn to_json(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// All EXIF fields of a JPEG; a JPEG without EXIF yields none.
pub fn read_fields(jpeg: &[u8]) -> Result<Vec<Field>, MetadataError> {
    match Reader::new().read_from_container(&mut Cursor::new(jpeg)) {
        Ok(exif) => Ok(exif.fields().map(copy_field).collect()),
        Err(exif::Error::NotFound(_)) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Build the TIFF-structured EXIF block for an exported square of `size` pixels.
pub fn build_export_exif(
    source: &[Field],
    size: u32,
    software: &str,
    user_comment: &str,
) -> Result<Vec<u8>, MetadataError> {
    if !user_comment.is_ascii() {
        return Err(MetadataError::NonAsciiComment);
    }

    let mut fields: Vec<Field> = source
        .iter()
        .filter(|field| field.ifd_num == In::PRIMARY && is_whitelisted(field.tag))
        .filter(|field| !matches!(field.value, Value::Unknown(..)))
        .map(copy_field)
        .collect();

    let mut comment = ASCII_CHARSET.to_vec();
    comment.extend_from_slice(user_comment.as_bytes());
    fields.extend([
        primary(TAG_IMAGE_WIDTH, Value::Long(vec![size])),
        primary(TAG_IMAGE_LENGTH, Value::Long(vec![size])),
        primary(TAG_SOFTWARE, Value::Ascii(vec![software.as_bytes().to_vec()])),
        primary(TAG_PIXEL_X_DIMENSION, Value::Long(vec![size])),
        primary(TAG_PIXEL_Y_DIMENSION, Value::Long(vec![size])),
        primary(TAG_USER_COMMENT, Value::Undefined(comment, 0)),
    ]);

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false)?;
    Ok(buf.into_inner())
}

/// Insert an EXIF block as an APP1 segment, after a leading JFIF APP0 if any.
pub fn insert_exif(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>, MetadataError> {
    if jpeg.len() < 4 || jpeg[0] != 0xff || jpeg[1] != 0xd8 {
        return Err(MetadataError::NotJpeg);
    }
    let payload = EXIF_HEADER.len() + tiff.len();
    let segment_len = u16::try_from(payload + 2).map_err(|_| MetadataError::TooLarge(payload))?;

    let mut insert_at = 2;
    if jpeg[2] == 0xff && jpeg[3] == 0xe0 {
        if jpeg.len() < 6 {
            return Err(MetadataError::NotJpeg);
        }
        let app0_len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        insert_at = 4 + app0_len;
        if insert_at > jpeg.len() {
            return Err(MetadataError::NotJpeg);
        }
    }

    let mut out = Vec::with_capacity(jpeg.len() + payload + 4);
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&[0xff, 0xe1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[insert_at..]);
    Ok(out)
}

/// The crop recorded in a previously exported JPEG, if it carries one.
pub fn read_crop_comment(jpeg: &[u8]) -> Result<Option<CropComment>, MetadataError> {
    let fields = read_fields(jpeg)?;
    let Some(field) = fields
        .iter()
        .find(|f| f.tag == TAG_USER_COMMENT && f.ifd_num == In::PRIMARY)
    else {
        return Ok(None);
    };
    let bytes = match &field.value {
        Value::Undefined(bytes, _) => bytes.as_slice(),
        Value::Ascii(parts) => parts.first().map(Vec::as_slice).unwrap_or_default(),
        _ => return Ok(None),
    };
    let text = strip_charset(bytes);
    let text = String::from_utf8_lossy(text);
    let text = text.trim_end_matches(['\0', ' ']);
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Crop area of an exported file; unreadable files are logged and skipped.
pub fn read_crop_area(path: &Path) -> Option<CropArea> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::error!("failed to read {}: {err}", path.display());
            return None;
        }
    };
    match read_crop_comment(&bytes) {
        Ok(comment) => comment.map(|c| c.crop_area),
        Err(err) => {
            log::debug!("no crop area in {}: {err}", path.display());
            None
        }
    }
}

fn is_whitelisted(tag: Tag) -> bool {
    match tag.0 {
        Context::Tiff => IFD0_WHITELIST.contains(&tag.1),
        Context::Exif => EXIF_WHITELIST.contains(&tag.1),
        Context::Gps => true,
        _ => false,
    }
}

fn strip_charset(bytes: &[u8]) -> &[u8] {
    const CHARSETS: [&[u8; 8]; 3] = [ASCII_CHARSET, b"UNICODE\0", b"\0\0\0\0\0\0\0\0"];
    if bytes.len() >= 8 && CHARSETS.iter().any(|c| &bytes[..8] == c.as_slice()) {
        &bytes[8..]
    } else {
        bytes
    }
}

fn primary(tag: Tag, value: Value) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    }
}

fn copy_field(field: &Field) -> Field {
    Field {
        tag: field.tag,
        ifd_num: field.ifd_num,
        value: field.value.clone(),
    }
}
