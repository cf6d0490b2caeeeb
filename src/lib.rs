//! Square crop selection and export for folders of JPEG photos.
//!
//! The selection model ([`coords`], [`selector`], [`overlay`], [`editor`])
//! has no UI dependency; [`app`] and [`canvas`] wire it to egui.

pub mod app;
pub mod canvas;
pub mod config;
pub mod coords;
pub mod editor;
pub mod export;
pub mod fs_resolver;
pub mod metadata;
pub mod overlay;
pub mod selector;
