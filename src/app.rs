use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use eframe::egui;
use image::DynamicImage;

use crate::canvas;
use crate::config::Config;
use crate::coords::Surface;
use crate::editor::{CropEditor, CropRequest, EditorEvent, EditorSettings};
use crate::export::{self, ExportSettings};
use crate::fs_resolver::{self, ExportLayout};
use crate::metadata::{self, CropArea};
use crate::overlay::{self, BUTTON_BAR_HEIGHT, BUTTON_BAR_WIDTH};
use crate::selector::CursorStyle;

struct LoadedImage {
    path: PathBuf,
    bytes: Vec<u8>,
    image: DynamicImage,
    texture: egui::TextureHandle,
    related: Vec<CropArea>,
}

pub struct SquareCropperApp {
    editor_settings: EditorSettings,
    export_settings: ExportSettings,
    layout: ExportLayout,
    folder: Option<PathBuf>,
    files: Vec<PathBuf>,
    selected: Option<usize>,
    current: Option<LoadedImage>,
    // Created once the canvas has been laid out.
    editor: Option<CropEditor>,
    status: String,
}

impl SquareCropperApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config) -> Self {
        let mut app = Self {
            editor_settings: config.editor_settings(),
            export_settings: config.export_settings(),
            layout: config.layout(),
            folder: None,
            files: Vec::new(),
            selected: None,
            current: None,
            editor: None,
            status: String::new(),
        };
        if let Some(folder) = &config.folder {
            app.open_folder(&cc.egui_ctx, folder, None);
        }
        app
    }

    fn open_folder(&mut self, ctx: &egui::Context, folder: &Path, select: Option<&Path>) {
        match fs_resolver::list_jpeg_files(folder)
            .with_context(|| format!("cannot list {}", folder.display()))
        {
            Ok(files) => {
                log::info!("opened {} with {} photos", folder.display(), files.len());
                self.status = format!("{} photos", files.len());
                self.folder = Some(folder.to_path_buf());
                self.files = files;
                self.selected = None;
                self.current = None;
                self.editor = None;
                let index = select
                    .and_then(|path| self.files.iter().position(|f| f == path))
                    .or_else(|| (!self.files.is_empty()).then_some(0));
                if let Some(index) = index {
                    self.select(ctx, index);
                }
            }
            Err(err) => self.fail(err),
        }
    }

    fn select(&mut self, ctx: &egui::Context, index: usize) {
        let Some(path) = self.files.get(index).cloned() else {
            return;
        };
        self.editor = None;
        match load_image(ctx, &path, &self.layout) {
            Ok(loaded) => {
                self.status = format!(
                    "{}: {} earlier crops",
                    file_name(&loaded.path),
                    loaded.related.len()
                );
                self.current = Some(loaded);
                self.selected = Some(index);
            }
            Err(err) => {
                self.current = None;
                self.selected = Some(index);
                self.fail(err);
            }
        }
    }

    fn fail(&mut self, err: anyhow::Error) {
        log::error!("{err:#}");
        self.status = format!("{err:#}");
    }

    fn apply(&mut self, event: EditorEvent) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        if let Some(request) = editor.handle(event) {
            self.export(request);
        }
    }

    fn export(&mut self, request: CropRequest) {
        let Some(loaded) = self.current.as_mut() else {
            return;
        };
        let result = export::export_crop(
            &loaded.path,
            &loaded.bytes,
            &loaded.image,
            &request,
            &self.export_settings,
            &self.layout,
        );
        match result {
            Ok(path) => {
                loaded.related = related_areas(&self.layout, &loaded.path);
                self.status = format!("Exported {}", file_name(&path));
            }
            Err(err) => self.fail(anyhow::Error::new(err).context("export failed")),
        }
    }

    fn sync_editor(&mut self, surface: Surface) {
        if let Some(editor) = self.editor.as_mut() {
            if editor.mapper().surface() != surface {
                editor.handle(EditorEvent::SurfaceChanged(surface));
            }
            return;
        }
        let Some(loaded) = &self.current else {
            return;
        };
        let (width, height) = (loaded.image.width(), loaded.image.height());
        match CropEditor::new(width, height, surface, self.editor_settings) {
            Ok(editor) => self.editor = Some(editor),
            Err(err) => self.fail(anyhow::Error::new(err).context("cannot edit image")),
        }
    }

    /// Feeds this frame's raw pointer events to the editor in arrival order.
    fn handle_pointer(&mut self, ctx: &egui::Context) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let surface = editor.mapper().surface();
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            match event {
                egui::Event::PointerMoved(pos) => {
                    editor.handle(EditorEvent::PointerMove(canvas::to_pointer(pos)));
                }
                egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    ..
                } => {
                    let p = canvas::to_pointer(pos);
                    if pressed {
                        let over_buttons = ctx
                            .layer_id_at(pos)
                            .is_some_and(|layer| layer.id == button_bar_id());
                        if surface.contains(p) && !over_buttons {
                            editor.handle(EditorEvent::PointerDown(p));
                        }
                    } else if editor.selector().is_dragging() {
                        editor.handle(EditorEvent::PointerUp(p));
                    }
                }
                _ => {}
            }
        }
        if editor.selector().is_dragging() && !ctx.input(|i| i.pointer.primary_down()) {
            editor.handle(EditorEvent::PointerReleasedOutside);
        }
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        if self.current.is_none() {
            ui.centered_and_justified(|ui| {
                ui.label("Open a folder of JPEG photos, or drop one here.");
            });
            return;
        }
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
        self.sync_editor(canvas::surface_for(rect, ui.ctx().pixels_per_point()));
        self.handle_pointer(ui.ctx());

        let (Some(loaded), Some(editor)) = (&self.current, &self.editor) else {
            return;
        };
        let painter = ui.painter_at(rect);
        canvas::paint_image(&painter, editor.mapper(), loaded.texture.id());
        painter.extend(canvas::related_shapes(editor.mapper(), &loaded.related));
        if let Some(scene) = editor.scene() {
            painter.extend(canvas::scene_shapes(editor.mapper(), &scene));
        }
        if response.hovered() || editor.selector().is_dragging() {
            ui.ctx().set_cursor_icon(cursor_icon(editor.cursor()));
        }
    }

    fn button_bar(&self, ctx: &egui::Context) -> Option<EditorEvent> {
        let editor = self.editor.as_ref()?;
        let region = editor.selector().defined_region()?;
        let mapper = editor.mapper();
        let surface = mapper.surface();
        let bottom = surface.origin.y + surface.height as f32 / surface.pixels_per_point;
        let origin = overlay::button_bar_origin(
            mapper.image_to_pointer(region.min()),
            mapper.image_to_pointer(region.max()),
            surface.origin.y,
            bottom,
        );
        let oversized = editor.is_oversized();
        let mut action = None;
        egui::Area::new(button_bar_id())
            .order(egui::Order::Foreground)
            .fixed_pos(canvas::to_pos(origin))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_min_size(egui::vec2(BUTTON_BAR_WIDTH, BUTTON_BAR_HEIGHT) * 0.8);
                    ui.horizontal_centered(|ui| {
                        if ui.button("Clear").clicked() {
                            action = Some(EditorEvent::Cancel);
                        }
                        if oversized
                            && ui
                                .button("Reduce")
                                .on_hover_text("Shrink to the export size")
                                .clicked()
                        {
                            action = Some(EditorEvent::ReduceToMaxSize);
                        }
                        if ui.button("Export").clicked() {
                            action = Some(EditorEvent::Commit);
                        }
                    });
                });
            });
        action
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(path) = dropped.into_iter().find_map(|file| file.path) else {
            return;
        };
        if path.is_dir() {
            self.open_folder(ctx, &path, None);
        } else if fs_resolver::is_jpeg(&path) {
            if let Some(folder) = path.parent() {
                self.open_folder(ctx, folder, Some(&path));
            }
        } else {
            self.status = format!("{} is not a JPEG file", file_name(&path));
        }
    }

    fn info_text(&self) -> String {
        let Some(loaded) = &self.current else {
            return String::new();
        };
        let mut text = format!(
            "{}  {}x{}",
            file_name(&loaded.path),
            loaded.image.width(),
            loaded.image.height()
        );
        if let Some(region) = self.editor.as_ref().and_then(|e| e.current_region()) {
            let min = region.min();
            text.push_str(&format!(
                "  crop {}, {} size {}",
                min.x,
                min.y,
                region.side()
            ));
            if region.side() > self.export_settings.max_crop_size as f32 {
                text.push_str(&format!(" (exported at {})", self.export_settings.max_crop_size));
            }
        }
        text
    }
}

impl eframe::App for SquareCropperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);

        let mut pending = Vec::new();
        let (enter, escape) =
            ctx.input(|i| (i.key_pressed(egui::Key::Enter), i.key_pressed(egui::Key::Escape)));
        if enter {
            pending.push(EditorEvent::Commit);
        }
        if escape {
            pending.push(EditorEvent::Cancel);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open folder…").clicked() {
                    if let Some(folder) = rfd::FileDialog::new().pick_folder() {
                        self.open_folder(ctx, &folder, None);
                    }
                }
                let has_image = self.editor.is_some();
                if ui
                    .add_enabled(has_image, egui::Button::new("Full image"))
                    .clicked()
                {
                    pending.push(EditorEvent::FullImageCrop);
                }
                if let Some(folder) = &self.folder {
                    ui.label(folder.display().to_string());
                }
            });
        });

        egui::TopBottomPanel::bottom("info").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.info_text());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(self.status.as_str());
                });
            });
        });

        let mut clicked = None;
        egui::SidePanel::left("files")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for (index, path) in self.files.iter().enumerate() {
                        let selected = self.selected == Some(index);
                        if ui.selectable_label(selected, file_name(path)).clicked() && !selected {
                            clicked = Some(index);
                        }
                    }
                });
            });
        if let Some(index) = clicked {
            self.select(ctx, index);
        }

        egui::CentralPanel::default().show(ctx, |ui| self.canvas_ui(ui));

        if let Some(event) = self.button_bar(ctx) {
            pending.push(event);
        }
        for event in pending {
            self.apply(event);
        }
    }
}

fn button_bar_id() -> egui::Id {
    egui::Id::new("crop_button_bar")
}

fn load_image(
    ctx: &egui::Context,
    path: &Path,
    layout: &ExportLayout,
) -> anyhow::Result<LoadedImage> {
    let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let image = image::load_from_memory(&bytes)
        .with_context(|| format!("cannot decode {}", path.display()))?;
    let texture = load_texture(ctx, &image);
    let related = related_areas(layout, path);
    Ok(LoadedImage {
        path: path.to_path_buf(),
        bytes,
        image,
        texture,
        related,
    })
}

/// Upload the image, shrunk to the GPU's texture limit when needed.
fn load_texture(ctx: &egui::Context, image: &DynamicImage) -> egui::TextureHandle {
    let max_side = ctx.input(|i| i.max_texture_side) as u32;
    let preview;
    let image = if image.width() > max_side || image.height() > max_side {
        preview = image.thumbnail(max_side, max_side);
        &preview
    } else {
        image
    };
    let size = [image.width() as usize, image.height() as usize];
    let rgba = image.to_rgba8();
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_flat_samples().as_slice());
    ctx.load_texture("photo", color_image, egui::TextureOptions::LINEAR)
}

fn related_areas(layout: &ExportLayout, image: &Path) -> Vec<CropArea> {
    layout
        .related_images(image)
        .iter()
        .filter_map(|path| metadata::read_crop_area(path))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn cursor_icon(style: CursorStyle) -> egui::CursorIcon {
    match style {
        CursorStyle::Default => egui::CursorIcon::Default,
        CursorStyle::Crosshair => egui::CursorIcon::Crosshair,
        CursorStyle::Move => egui::CursorIcon::Move,
        CursorStyle::NwseResize => egui::CursorIcon::ResizeNwSe,
        CursorStyle::NeswResize => egui::CursorIcon::ResizeNeSw,
    }
}
