//! Crop editing session for one displayed image.
//!
//! The application feeds every pointer event, surface change and command
//! through [`CropEditor::handle`] in the order it receives them. The editor
//! maps positions into image space and drives the [`RegionSelector`].

use crate::coords::{
    CoordinateMapper, DEFAULT_GRAB_DISTANCE, DEFAULT_PADDING, GeometryError, ImagePoint,
    PointerPoint, Surface,
};
use crate::overlay::{self, OverlayScene};
use crate::selector::{CursorStyle, Region, RegionSelector};

/// Smallest corner grab radius, in image pixels. A plain click squares to a
/// one pixel box, which must stay below the discard size.
const MIN_PROXIMITY_THRESHOLD: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EditorSettings {
    pub padding: f32,
    pub grab_distance: f32,
    pub max_export_size: u32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            grab_distance: DEFAULT_GRAB_DISTANCE,
            max_export_size: 2048,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditorEvent {
    PointerDown(PointerPoint),
    PointerMove(PointerPoint),
    PointerUp(PointerPoint),
    /// The primary button was released somewhere we have no position for.
    PointerReleasedOutside,
    SurfaceChanged(Surface),
    Cancel,
    Commit,
    ReduceToMaxSize,
    FullImageCrop,
}

/// A committed square, corners normalized to min/max.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRequest {
    pub min: ImagePoint,
    pub max: ImagePoint,
}

impl CropRequest {
    pub fn from_region(region: &Region) -> Self {
        Self {
            min: region.min(),
            max: region.max(),
        }
    }

    pub fn side(&self) -> f32 {
        self.max.x - self.min.x
    }
}

pub struct CropEditor {
    mapper: CoordinateMapper,
    selector: RegionSelector,
    max_export_size: u32,
    last_inside: Option<PointerPoint>,
    hover: Option<ImagePoint>,
}

impl CropEditor {
    pub fn new(
        image_width: u32,
        image_height: u32,
        surface: Surface,
        settings: EditorSettings,
    ) -> Result<Self, GeometryError> {
        let mapper = CoordinateMapper::new(
            image_width,
            image_height,
            surface,
            settings.padding,
            settings.grab_distance,
        )?;
        let selector = RegionSelector::new(image_width, image_height, threshold_for(&mapper))?;
        Ok(Self {
            mapper,
            selector,
            max_export_size: settings.max_export_size,
            last_inside: None,
            hover: None,
        })
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn selector(&self) -> &RegionSelector {
        &self.selector
    }

    pub fn max_export_size(&self) -> u32 {
        self.max_export_size
    }

    /// Process one event. Only `Commit` from a defined selection yields a request.
    pub fn handle(&mut self, event: EditorEvent) -> Option<CropRequest> {
        match event {
            EditorEvent::PointerDown(p) => {
                self.track(p);
                let image_point = self.mapper.pointer_to_image(p);
                self.selector.pointer_down(image_point);
            }
            EditorEvent::PointerMove(p) => {
                self.track(p);
                self.selector.pointer_move(self.mapper.pointer_to_image(p));
            }
            EditorEvent::PointerUp(p) => {
                let release = if self.mapper.surface().contains(p) {
                    Some(p)
                } else {
                    self.last_inside
                };
                self.release_at(release.unwrap_or(p));
                self.hover = Some(self.mapper.pointer_to_image(p));
            }
            EditorEvent::PointerReleasedOutside => match self.last_inside {
                Some(p) => self.release_at(p),
                None if self.selector.is_dragging() => {
                    log::warn!("released outside with no known position, dropping drag");
                    self.selector.cancel();
                }
                None => {}
            },
            EditorEvent::SurfaceChanged(surface) => self.resize(surface),
            EditorEvent::Cancel => self.selector.cancel(),
            EditorEvent::Commit => {
                return self.selector.commit().map(|region| CropRequest::from_region(&region));
            }
            EditorEvent::ReduceToMaxSize => {
                self.selector.reduce_to_max_size(self.max_export_size as f32)
            }
            EditorEvent::FullImageCrop => self.selector.set_full_image_crop(),
        }
        None
    }

    pub fn cursor(&self) -> CursorStyle {
        match self.hover {
            Some(p) => self.selector.cursor(p),
            None => CursorStyle::Default,
        }
    }

    pub fn scene(&self) -> Option<OverlayScene> {
        overlay::build_scene(
            &self.selector,
            &self.mapper,
            self.hover,
            self.max_export_size as f32,
        )
    }

    /// The box currently shown, whether finalized or still being dragged.
    pub fn current_region(&self) -> Option<Region> {
        self.selector.state().current_region()
    }

    pub fn is_oversized(&self) -> bool {
        self.selector
            .defined_region()
            .is_some_and(|region| region.side() > self.max_export_size as f32)
    }

    fn track(&mut self, p: PointerPoint) {
        if self.mapper.surface().contains(p) {
            self.last_inside = Some(p);
        }
        self.hover = Some(self.mapper.pointer_to_image(p));
    }

    fn release_at(&mut self, p: PointerPoint) {
        self.selector.pointer_up(self.mapper.pointer_to_image(p));
    }

    fn resize(&mut self, surface: Surface) {
        if let Err(err) = self.mapper.set_surface(surface) {
            log::warn!("ignoring surface change: {err}");
            return;
        }
        let threshold = threshold_for(&self.mapper);
        log::debug!(
            "surface {}x{} @{}, proximity threshold {threshold}",
            surface.width,
            surface.height,
            surface.pixels_per_point
        );
        self.selector.set_proximity_threshold(threshold);
    }
}

fn threshold_for(mapper: &CoordinateMapper) -> f32 {
    mapper.proximity_threshold().max(MIN_PROXIMITY_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectorState;

    // Scenario geometry: 1000x800 image on a 600x500 surface, padding 16.
    // Scale 0.568, image placed at (16, 23).
    fn editor() -> CropEditor {
        let surface = Surface::new(PointerPoint::new(0.0, 0.0), 600, 500, 1.0);
        let settings = EditorSettings {
            max_export_size: 250,
            ..EditorSettings::default()
        };
        CropEditor::new(1000, 800, surface, settings).unwrap()
    }

    fn at(editor: &CropEditor, x: f32, y: f32) -> PointerPoint {
        editor.mapper().image_to_pointer(ImagePoint::new(x, y))
    }

    fn defined(editor: &CropEditor) -> Region {
        editor.selector().defined_region().expect("defined selection")
    }

    #[test]
    fn rejects_zero_sized_image() {
        let surface = Surface::new(PointerPoint::default(), 600, 500, 1.0);
        assert!(CropEditor::new(0, 800, surface, EditorSettings::default()).is_err());
    }

    #[test]
    fn pointer_events_map_into_image_space() {
        let mut ed = editor();
        let down = at(&ed, 100.0, 100.0);
        ed.handle(EditorEvent::PointerDown(down));
        let target = at(&ed, 400.0, 700.0);
        ed.handle(EditorEvent::PointerMove(target));
        ed.handle(EditorEvent::PointerUp(target));
        let region = defined(&ed);
        assert_eq!(region.corner1, ImagePoint::new(100.0, 100.0));
        assert_eq!(region.corner2, ImagePoint::new(700.0, 700.0));
    }

    #[test]
    fn release_outside_uses_last_position_on_the_surface() {
        let mut ed = editor();
        ed.handle(EditorEvent::PointerDown(at(&ed, 100.0, 100.0)));
        ed.handle(EditorEvent::PointerMove(at(&ed, 300.0, 300.0)));
        // Leaves the surface far to the right and releases there.
        ed.handle(EditorEvent::PointerMove(PointerPoint::new(900.0, 200.0)));
        ed.handle(EditorEvent::PointerUp(PointerPoint::new(950.0, 200.0)));
        assert_eq!(
            defined(&ed),
            Region::new(ImagePoint::new(100.0, 100.0), ImagePoint::new(300.0, 300.0))
        );
    }

    #[test]
    fn release_without_position_finishes_the_drag() {
        let mut ed = editor();
        ed.handle(EditorEvent::PointerDown(at(&ed, 100.0, 100.0)));
        ed.handle(EditorEvent::PointerMove(at(&ed, 300.0, 300.0)));
        ed.handle(EditorEvent::PointerReleasedOutside);
        assert!(!ed.selector().is_dragging());
        assert_eq!(defined(&ed).side(), 200.0);
    }

    #[test]
    fn commit_yields_normalized_corners() {
        let mut ed = editor();
        ed.handle(EditorEvent::PointerDown(at(&ed, 400.0, 400.0)));
        ed.handle(EditorEvent::PointerUp(at(&ed, 100.0, 100.0)));
        assert_eq!(ed.handle(EditorEvent::Cancel), None);
        assert_eq!(*ed.selector().state(), SelectorState::Empty);

        ed.handle(EditorEvent::PointerDown(at(&ed, 400.0, 400.0)));
        ed.handle(EditorEvent::PointerUp(at(&ed, 100.0, 100.0)));
        let request = ed.handle(EditorEvent::Commit).unwrap();
        assert_eq!(request.min, ImagePoint::new(100.0, 100.0));
        assert_eq!(request.max, ImagePoint::new(400.0, 400.0));
        assert_eq!(request.side(), 300.0);
        assert_eq!(ed.handle(EditorEvent::Commit), None);
    }

    #[test]
    fn reduce_uses_configured_export_size() {
        let mut ed = editor();
        ed.handle(EditorEvent::FullImageCrop);
        assert!(ed.is_oversized());
        ed.handle(EditorEvent::ReduceToMaxSize);
        let region = defined(&ed);
        assert_eq!(region.side(), 250.0);
        assert_eq!(region.min(), ImagePoint::new(375.0, 275.0));
        assert!(!ed.is_oversized());
    }

    #[test]
    fn surface_change_updates_threshold() {
        let mut ed = editor();
        assert_eq!(ed.selector().proximity_threshold(), 42.0);
        let surface = Surface::new(PointerPoint::new(0.0, 0.0), 1032, 832, 1.0);
        ed.handle(EditorEvent::SurfaceChanged(surface));
        assert_eq!(ed.selector().proximity_threshold(), 24.0);

        let bad = Surface::new(PointerPoint::new(0.0, 0.0), 1032, 832, f32::NAN);
        ed.handle(EditorEvent::SurfaceChanged(bad));
        assert_eq!(ed.mapper().surface(), surface);
    }

    #[test]
    fn tiny_grab_distance_still_discards_plain_clicks() {
        let surface = Surface::new(PointerPoint::new(0.0, 0.0), 600, 500, 1.0);
        let settings = EditorSettings {
            grab_distance: 0.1,
            ..EditorSettings::default()
        };
        let mut ed = CropEditor::new(1000, 800, surface, settings).unwrap();
        assert_eq!(ed.selector().proximity_threshold(), 2.0);

        let p = at(&ed, 500.0, 500.0);
        ed.handle(EditorEvent::PointerDown(p));
        ed.handle(EditorEvent::PointerUp(p));
        assert_eq!(*ed.selector().state(), SelectorState::Empty);

        ed.handle(EditorEvent::SurfaceChanged(Surface::new(
            PointerPoint::new(0.0, 0.0),
            1200,
            1000,
            2.0,
        )));
        assert_eq!(ed.selector().proximity_threshold(), 2.0);
    }

    #[test]
    fn cursor_follows_hover() {
        let mut ed = editor();
        assert_eq!(ed.cursor(), CursorStyle::Default);
        ed.handle(EditorEvent::PointerMove(at(&ed, 500.0, 500.0)));
        assert_eq!(ed.cursor(), CursorStyle::Crosshair);
        ed.handle(EditorEvent::FullImageCrop);
        assert_eq!(ed.cursor(), CursorStyle::Move);
        ed.handle(EditorEvent::PointerMove(at(&ed, 100.0, 0.0)));
        assert_eq!(ed.cursor(), CursorStyle::NwseResize);
        assert!(ed.scene().unwrap().highlight.is_some());
    }
}
