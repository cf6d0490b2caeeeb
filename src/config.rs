use std::path::PathBuf;

use clap::Parser;

use crate::coords::{DEFAULT_GRAB_DISTANCE, DEFAULT_PADDING};
use crate::editor::EditorSettings;
use crate::export::ExportSettings;
use crate::fs_resolver::ExportLayout;

/// Cut square crops out of a folder of JPEG photos.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "SquareCropper", version, about)]
pub struct Config {
    /// Folder to open on startup.
    #[arg(value_name = "FOLDER")]
    pub folder: Option<PathBuf>,

    /// Exported crops larger than this are downscaled to it.
    #[arg(long, default_value_t = 2048, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_crop_size: u32,

    /// JPEG quality of exported crops (1-100).
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Space kept free around the image, in pixels.
    #[arg(long, default_value_t = DEFAULT_PADDING, value_parser = non_negative)]
    pub padding: f32,

    /// How close the pointer must be to grab a corner, in screen points.
    #[arg(long, default_value_t = DEFAULT_GRAB_DISTANCE, value_parser = positive)]
    pub grab_distance: f32,

    /// Export folder created next to the photos.
    #[arg(long, default_value = "iNat", value_name = "NAME")]
    pub export_dir: String,

    /// Subfolder of the export folder that receives new crops.
    #[arg(long, default_value = "iNat_new", value_name = "NAME")]
    pub new_dir: String,

    /// Appended to the photo's name to form the export name.
    #[arg(long, default_value = "_iNat")]
    pub suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        let layout = ExportLayout::default();
        Self {
            folder: None,
            max_crop_size: 2048,
            jpeg_quality: 90,
            padding: DEFAULT_PADDING,
            grab_distance: DEFAULT_GRAB_DISTANCE,
            export_dir: layout.export_dir,
            new_dir: layout.new_dir,
            suffix: layout.suffix,
        }
    }
}

impl Config {
    pub fn editor_settings(&self) -> EditorSettings {
        EditorSettings {
            padding: self.padding,
            grab_distance: self.grab_distance,
            max_export_size: self.max_crop_size,
        }
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            max_crop_size: self.max_crop_size,
            jpeg_quality: self.jpeg_quality,
            ..ExportSettings::default()
        }
    }

    pub fn layout(&self) -> ExportLayout {
        ExportLayout {
            export_dir: self.export_dir.clone(),
            new_dir: self.new_dir.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

fn parse_finite(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|err| format!("{err}"))?;
    if !value.is_finite() {
        return Err(format!("{s} is not a finite number"));
    }
    Ok(value)
}

fn positive(s: &str) -> Result<f32, String> {
    let value = parse_finite(s)?;
    if value <= 0.0 {
        return Err(format!("{s} must be greater than 0"));
    }
    Ok(value)
}

fn non_negative(s: &str) -> Result<f32, String> {
    let value = parse_finite(s)?;
    if value < 0.0 {
        return Err(format!("{s} must not be negative"));
    }
    Ok(value)
}
