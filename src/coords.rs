//! Coordinate transformations: pointer -> display <-> image.
//!
//! Pointer space is egui's logical coordinate system (points). Display space
//! is the backing-store pixel grid of the drawing surface, i.e. pointer
//! offsets scaled by the pixel ratio. Image space is the pixel grid of the
//! source photo.

use thiserror::Error;

/// Padding around the fitted image, in display pixels.
pub const DEFAULT_PADDING: f32 = 16.0;
/// Pointer distance within which a corner counts as grabbed.
pub const DEFAULT_GRAB_DISTANCE: f32 = 24.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImagePoint {
    pub x: f32,
    pub y: f32,
}

impl ImagePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: ImagePoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

impl DisplayPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerPoint {
    pub x: f32,
    pub y: f32,
}

impl PointerPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Placement of the scaled image inside the drawing surface, in display pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitGeometry {
    pub left: f32,
    pub top: f32,
    pub scaled_width: f32,
    pub scaled_height: f32,
}

/// The drawing surface as laid out on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    /// Top-left corner in pointer space.
    pub origin: PointerPoint,
    /// Backing-store size in display pixels.
    pub width: u32,
    pub height: u32,
    pub pixels_per_point: f32,
}

impl Surface {
    pub fn new(origin: PointerPoint, width: u32, height: u32, pixels_per_point: f32) -> Self {
        Self {
            origin,
            width,
            height,
            pixels_per_point,
        }
    }

    /// Whether a pointer position lies on the surface (edges included).
    pub fn contains(&self, p: PointerPoint) -> bool {
        let right = self.origin.x + self.width as f32 / self.pixels_per_point;
        let bottom = self.origin.y + self.height as f32 / self.pixels_per_point;
        p.x >= self.origin.x && p.x <= right && p.y >= self.origin.y && p.y <= bottom
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("image must have positive dimensions, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
    #[error("pixel ratio must be positive and finite, got {0}")]
    InvalidPixelRatio(f32),
}

pub(crate) fn check_image_size(width: u32, height: u32) -> Result<(), GeometryError> {
    if width == 0 || height == 0 {
        return Err(GeometryError::EmptyImage { width, height });
    }
    Ok(())
}

/// Clamp a point into `[0, width] x [0, height]`, upper bounds included.
pub fn clamp_point(p: ImagePoint, width: f32, height: f32) -> ImagePoint {
    ImagePoint::new(p.x.clamp(0.0, width), p.y.clamp(0.0, height))
}

/// Round half up, so `-2.5` becomes `-2` rather than `-3`.
fn round_half_up(v: f32) -> f32 {
    (v + 0.5).floor()
}

#[derive(Clone, Debug)]
pub struct CoordinateMapper {
    image_width: u32,
    image_height: u32,
    surface: Surface,
    padding: f32,
    grab_distance: f32,
}

impl CoordinateMapper {
    pub fn new(
        image_width: u32,
        image_height: u32,
        surface: Surface,
        padding: f32,
        grab_distance: f32,
    ) -> Result<Self, GeometryError> {
        check_image_size(image_width, image_height)?;
        check_pixel_ratio(surface.pixels_per_point)?;
        Ok(Self {
            image_width,
            image_height,
            surface,
            padding,
            grab_distance,
        })
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn set_surface(&mut self, surface: Surface) -> Result<(), GeometryError> {
        check_pixel_ratio(surface.pixels_per_point)?;
        self.surface = surface;
        Ok(())
    }

    pub fn pointer_to_display(&self, p: PointerPoint) -> DisplayPoint {
        let ppp = self.surface.pixels_per_point;
        DisplayPoint::new(
            (p.x - self.surface.origin.x) * ppp,
            (p.y - self.surface.origin.y) * ppp,
        )
    }

    pub fn display_to_pointer(&self, p: DisplayPoint) -> PointerPoint {
        let ppp = self.surface.pixels_per_point;
        PointerPoint::new(
            p.x / ppp + self.surface.origin.x,
            p.y / ppp + self.surface.origin.y,
        )
    }

    pub fn display_to_image(&self, p: DisplayPoint) -> ImagePoint {
        let fit = self.fit_geometry();
        let (scale_x, scale_y) = self.scale_factors(&fit);
        ImagePoint::new(
            round_half_up((p.x - fit.left) / scale_x),
            round_half_up((p.y - fit.top) / scale_y),
        )
    }

    pub fn image_to_display(&self, p: ImagePoint) -> DisplayPoint {
        let fit = self.fit_geometry();
        let (scale_x, scale_y) = self.scale_factors(&fit);
        DisplayPoint::new(p.x * scale_x + fit.left, p.y * scale_y + fit.top)
    }

    pub fn pointer_to_image(&self, p: PointerPoint) -> ImagePoint {
        self.display_to_image(self.pointer_to_display(p))
    }

    pub fn image_to_pointer(&self, p: ImagePoint) -> PointerPoint {
        self.display_to_pointer(self.image_to_display(p))
    }

    pub fn clamp_to_image(&self, p: ImagePoint) -> ImagePoint {
        clamp_point(p, self.image_width as f32, self.image_height as f32)
    }

    /// Centers the image inside the padded surface, scaling down only.
    pub fn fit_geometry(&self) -> FitGeometry {
        let image_w = self.image_width as f32;
        let image_h = self.image_height as f32;
        // A surface thinner than its padding still gets a one-pixel slot,
        // otherwise the scale collapses to zero and the inverse divides by it.
        let inner_w = (self.surface.width as f32 - self.padding * 2.0).max(1.0);
        let inner_h = (self.surface.height as f32 - self.padding * 2.0).max(1.0);
        let scale = (inner_w / image_w).min(inner_h / image_h).min(1.0);
        let scaled_width = (image_w * scale).round().max(1.0);
        let scaled_height = (image_h * scale).round().max(1.0);
        FitGeometry {
            left: ((inner_w - scaled_width) / 2.0).floor() + self.padding,
            top: ((inner_h - scaled_height) / 2.0).floor() + self.padding,
            scaled_width,
            scaled_height,
        }
    }

    /// Image-space length of the grab distance at the current scale.
    pub fn proximity_threshold(&self) -> f32 {
        let origin = self.surface.origin;
        let start = self.pointer_to_image(origin);
        let end = self.pointer_to_image(PointerPoint::new(origin.x + self.grab_distance, origin.y));
        end.x - start.x
    }

    fn scale_factors(&self, fit: &FitGeometry) -> (f32, f32) {
        (
            fit.scaled_width / self.image_width as f32,
            fit.scaled_height / self.image_height as f32,
        )
    }
}

fn check_pixel_ratio(ppp: f32) -> Result<(), GeometryError> {
    if !ppp.is_finite() || ppp <= 0.0 {
        return Err(GeometryError::InvalidPixelRatio(ppp));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(image: (u32, u32), surface: (u32, u32), ppp: f32) -> CoordinateMapper {
        let surface = Surface::new(PointerPoint::new(40.0, 30.0), surface.0, surface.1, ppp);
        CoordinateMapper::new(image.0, image.1, surface, DEFAULT_PADDING, DEFAULT_GRAB_DISTANCE)
            .unwrap()
    }

    #[test]
    fn rejects_empty_images() {
        let surface = Surface::new(PointerPoint::default(), 100, 100, 1.0);
        let err = CoordinateMapper::new(0, 10, surface, 16.0, 24.0).unwrap_err();
        assert_eq!(err, GeometryError::EmptyImage { width: 0, height: 10 });
        assert!(CoordinateMapper::new(10, 0, surface, 16.0, 24.0).is_err());
    }

    #[test]
    fn rejects_bad_pixel_ratio() {
        let surface = Surface::new(PointerPoint::default(), 100, 100, 0.0);
        assert_eq!(
            CoordinateMapper::new(10, 10, surface, 16.0, 24.0).unwrap_err(),
            GeometryError::InvalidPixelRatio(0.0)
        );
    }

    #[test]
    fn fits_large_image_into_padded_surface() {
        let m = mapper((1000, 800), (600, 500), 1.0);
        // inner 568x468, scale = min(0.568, 0.585) = 0.568
        let fit = m.fit_geometry();
        assert_eq!(fit.scaled_width, 568.0);
        assert_eq!(fit.scaled_height, 454.0);
        assert_eq!(fit.left, 16.0);
        assert_eq!(fit.top, 23.0);
    }

    #[test]
    fn never_upscales_small_images() {
        let m = mapper((100, 50), (600, 500), 1.0);
        let fit = m.fit_geometry();
        assert_eq!(fit.scaled_width, 100.0);
        assert_eq!(fit.scaled_height, 50.0);
        assert_eq!(fit.left, 234.0 + 16.0);
        assert_eq!(fit.top, 209.0 + 16.0);
    }

    #[test]
    fn tiny_surface_keeps_a_positive_scale() {
        let m = mapper((1000, 800), (10, 10), 1.0);
        let fit = m.fit_geometry();
        assert!(fit.scaled_width >= 1.0 && fit.scaled_height >= 1.0);
        let p = m.display_to_image(DisplayPoint::new(20.0, 20.0));
        assert!(p.x.is_finite() && p.y.is_finite());
    }

    #[test]
    fn pointer_to_display_applies_offset_and_ratio() {
        let m = mapper((1000, 800), (1200, 1000), 2.0);
        let d = m.pointer_to_display(PointerPoint::new(50.0, 40.0));
        assert_eq!(d, DisplayPoint::new(20.0, 20.0));
        assert_eq!(m.display_to_pointer(d), PointerPoint::new(50.0, 40.0));
    }

    #[test]
    fn display_to_image_rounds_to_nearest_pixel() {
        let m = mapper((1000, 800), (600, 500), 1.0);
        // scale_x = 0.568; 16 + 100 * 0.568 = 72.8
        assert_eq!(m.display_to_image(DisplayPoint::new(72.8, 23.0)), ImagePoint::new(100.0, 0.0));
        assert_eq!(m.display_to_image(DisplayPoint::new(73.0, 23.0)).x, 100.0);
        assert_eq!(m.display_to_image(DisplayPoint::new(16.0, 23.0)), ImagePoint::new(0.0, 0.0));
    }

    #[test]
    fn clamping_is_idempotent() {
        let m = mapper((1000, 800), (600, 500), 1.0);
        for p in [
            ImagePoint::new(-5.0, 900.0),
            ImagePoint::new(1000.0, 800.0),
            ImagePoint::new(1200.5, -0.5),
            ImagePoint::new(10.0, 20.0),
        ] {
            let once = m.clamp_to_image(p);
            assert_eq!(m.clamp_to_image(once), once);
            assert!(once.x >= 0.0 && once.x <= 1000.0 && once.y >= 0.0 && once.y <= 800.0);
        }
        assert_eq!(m.clamp_to_image(ImagePoint::new(1000.0, 800.0)), ImagePoint::new(1000.0, 800.0));
    }

    #[test]
    fn round_trip_is_stable() {
        for m in [
            mapper((1000, 800), (600, 500), 1.0),
            mapper((4000, 3000), (1280, 900), 2.0),
            mapper((333, 777), (700, 700), 1.5),
        ] {
            let (w, h) = m.image_size();
            for i in 0..=20 {
                let p = ImagePoint::new((w * i / 20) as f32, (h * (20 - i) / 20) as f32);
                let once = m.display_to_image(m.image_to_display(p));
                assert!((once.x - p.x).abs() <= 1.0 && (once.y - p.y).abs() <= 1.0);
                let twice = m.display_to_image(m.image_to_display(once));
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn proximity_threshold_follows_scale() {
        let small = mapper((1000, 800), (600, 500), 1.0);
        // 24 display pixels at scale 0.568 cover about 42 image pixels
        assert_eq!(small.proximity_threshold(), 42.0);

        let native = mapper((100, 100), (600, 500), 1.0);
        assert_eq!(native.proximity_threshold(), 24.0);

        let retina = mapper((100, 100), (1200, 1000), 2.0);
        assert_eq!(retina.proximity_threshold(), 48.0);
    }

    #[test]
    fn surface_contains_uses_logical_size() {
        let surface = Surface::new(PointerPoint::new(10.0, 10.0), 200, 100, 2.0);
        assert!(surface.contains(PointerPoint::new(110.0, 60.0)));
        assert!(!surface.contains(PointerPoint::new(111.0, 30.0)));
        assert!(!surface.contains(PointerPoint::new(9.0, 30.0)));
    }
}
