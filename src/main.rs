#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use clap::Parser;
use eframe::egui;
use square_cropper::app::SquareCropperApp;
use square_cropper::config::Config;

fn main() -> eframe::Result {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let config = Config::parse();
    log::debug!("starting with {config:?}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 750.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };
    eframe::run_native(
        "Square Cropper",
        options,
        Box::new(|cc| Ok(Box::new(SquareCropperApp::new(cc, config)))),
    )
}
