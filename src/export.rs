//! Square crop export: crop, downscale, encode, tag, write.

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use thiserror::Error;

use crate::editor::CropRequest;
use crate::fs_resolver::ExportLayout;
use crate::metadata::{self, CropArea, CropComment, MetadataError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("only square crops can be exported, got {width}x{height}")]
    NotSquare { width: u32, height: u32 },
    #[error("crop region is empty")]
    Empty,
    #[error("crop ({x}, {y}) size {size} exceeds image bounds {image_width}x{image_height}")]
    OutOfBounds {
        x: u32,
        y: u32,
        size: u32,
        image_width: u32,
        image_height: u32,
    },
    #[error("no free export file name for {0}")]
    NoFreeName(String),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportSettings {
    pub max_crop_size: u32,
    pub jpeg_quality: u8,
    pub software: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            max_crop_size: 2048,
            jpeg_quality: 90,
            software: format!("SquareCropper {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Result of cropping, before encoding.
pub struct SquareCrop {
    pub image: DynamicImage,
    pub area: CropArea,
    pub downscaled: bool,
}

/// Cut the requested square out of `image`, scaling it down to `max_size`.
pub fn crop_square(
    image: &DynamicImage,
    request: &CropRequest,
    max_size: u32,
) -> Result<SquareCrop, ExportError> {
    let x = request.min.x.round().max(0.0) as u32;
    let y = request.min.y.round().max(0.0) as u32;
    let width = (request.max.x - request.min.x).round().max(0.0) as u32;
    let height = (request.max.y - request.min.y).round().max(0.0) as u32;
    if width != height {
        return Err(ExportError::NotSquare { width, height });
    }
    let size = width;
    if size == 0 {
        return Err(ExportError::Empty);
    }
    if x + size > image.width() || y + size > image.height() {
        return Err(ExportError::OutOfBounds {
            x,
            y,
            size,
            image_width: image.width(),
            image_height: image.height(),
        });
    }

    let cropped = image.crop_imm(x, y, size, size);
    let downscaled = size > max_size;
    let image = if downscaled {
        cropped.resize_exact(max_size, max_size, FilterType::Lanczos3)
    } else {
        cropped
    };
    Ok(SquareCrop {
        image,
        area: CropArea {
            x,
            y,
            width: size,
            height: size,
        },
        downscaled,
    })
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(out)
}

/// Encoded JPEG bytes of the crop, carrying the source's whitelisted EXIF.
pub fn render_export(
    source_bytes: &[u8],
    image: &DynamicImage,
    request: &CropRequest,
    settings: &ExportSettings,
) -> Result<Vec<u8>, ExportError> {
    let crop = crop_square(image, request, settings.max_crop_size)?;
    let comment = CropComment {
        crop_area: crop.area,
        downscaled: crop.downscaled,
        jpeg_export_quality: settings.jpeg_quality as f32 / 100.0,
    };
    let source_fields = metadata::read_fields(source_bytes).unwrap_or_else(|err| {
        log::warn!("source EXIF unreadable, exporting without it: {err}");
        Vec::new()
    });
    let tiff = metadata::build_export_exif(
        &source_fields,
        crop.image.width(),
        &settings.software,
        &comment.to_json()?,
    )?;
    let jpeg = encode_jpeg(&crop.image, settings.jpeg_quality)?;
    Ok(metadata::insert_exif(&jpeg, &tiff)?)
}

/// Export the crop next to `source_path` and return the written file.
pub fn export_crop(
    source_path: &Path,
    source_bytes: &[u8],
    image: &DynamicImage,
    request: &CropRequest,
    settings: &ExportSettings,
    layout: &ExportLayout,
) -> Result<PathBuf, ExportError> {
    let bytes = render_export(source_bytes, image, request, settings)?;
    let folders = layout.create_folders(source_path)?;
    let original = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = layout
        .free_export_name(&folders.export_dir, &original)?
        .ok_or_else(|| ExportError::NoFreeName(original.clone()))?;
    let path = folders.new_dir.join(name);
    fs::write(&path, bytes)?;
    log::info!(
        "exported {}x{} crop of {} to {}",
        request.side(),
        request.side(),
        original,
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::ImagePoint;
    use image::{GenericImageView, RgbImage};
    use tempfile::tempdir;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn request(x0: f32, y0: f32, x1: f32, y1: f32) -> CropRequest {
        CropRequest {
            min: ImagePoint::new(x0, y0),
            max: ImagePoint::new(x1, y1),
        }
    }

    #[test]
    fn crops_exact_square() {
        let img = gradient(300, 200);
        let crop = crop_square(&img, &request(50.0, 20.0, 150.0, 120.0), 2048).unwrap();
        assert_eq!(crop.image.dimensions(), (100, 100));
        assert_eq!(crop.image.get_pixel(0, 0).0[..2], [50, 20]);
        assert!(!crop.downscaled);
        assert_eq!(
            crop.area,
            CropArea {
                x: 50,
                y: 20,
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn downscales_large_crops() {
        let img = gradient(300, 200);
        let crop = crop_square(&img, &request(0.0, 0.0, 200.0, 200.0), 64).unwrap();
        assert_eq!(crop.image.dimensions(), (64, 64));
        assert!(crop.downscaled);
        assert_eq!(crop.area.width, 200);
    }

    #[test]
    fn rejects_bad_regions() {
        let img = gradient(300, 200);
        assert!(matches!(
            crop_square(&img, &request(0.0, 0.0, 100.0, 90.0), 64),
            Err(ExportError::NotSquare {
                width: 100,
                height: 90
            })
        ));
        assert!(matches!(
            crop_square(&img, &request(10.0, 10.0, 10.0, 10.0), 64),
            Err(ExportError::Empty)
        ));
        assert!(matches!(
            crop_square(&img, &request(200.0, 50.0, 350.0, 200.0), 64),
            Err(ExportError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn exports_into_new_folder_with_comment() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("IMG_1.jpg");
        let img = gradient(300, 200);
        let source_bytes = encode_jpeg(&img, 90).unwrap();
        fs::write(&source_path, &source_bytes).unwrap();

        let settings = ExportSettings {
            max_crop_size: 150,
            ..ExportSettings::default()
        };
        let layout = ExportLayout::default();
        let req = request(50.0, 0.0, 250.0, 200.0);
        let first = export_crop(&source_path, &source_bytes, &img, &req, &settings, &layout).unwrap();
        let second = export_crop(&source_path, &source_bytes, &img, &req, &settings, &layout).unwrap();
        assert_eq!(first, dir.path().join("iNat/iNat_new/IMG_1_iNat.jpg"));
        assert_eq!(second, dir.path().join("iNat/iNat_new/IMG_1_iNat_2.jpg"));

        let written = fs::read(&first).unwrap();
        assert_eq!(image::load_from_memory(&written).unwrap().dimensions(), (150, 150));
        let comment = metadata::read_crop_comment(&written).unwrap().unwrap();
        assert_eq!(
            comment.crop_area,
            CropArea {
                x: 50,
                y: 0,
                width: 200,
                height: 200
            }
        );
        assert!(comment.downscaled);
        assert_eq!(comment.jpeg_export_quality, 0.9);

        assert_eq!(layout.related_images(&source_path), vec![first, second]);
    }
}
