//! Viewport state: output-surface size, pixel density, projection aspect.
//!
//! The viewport owns the numbers every resize has to keep consistent:
//! - the physical window size reported by winit,
//! - the device pixel ratio, capped at 2.0 to bound fill-rate cost,
//! - the projection aspect ratio derived from the size.
//!
//! `Viewer::resize` pushes `surface_size()` into the GPU surface and
//! `aspect()` into the camera, so both are recomputed before the next frame.

use winit::dpi::PhysicalSize;

/// Upper bound on the device pixel ratio used for rendering.
pub const MAX_PIXEL_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    width: u32,
    height: u32,
    scale_factor: f64,
}

impl Viewport {
    pub fn new(size: PhysicalSize<u32>, scale_factor: f64) -> Self {
        Self {
            width: size.width,
            height: size.height,
            scale_factor: scale_factor.max(1.0),
        }
    }

    /// Record a new physical size (from `WindowEvent::Resized`).
    pub fn on_resize(&mut self, new_size: PhysicalSize<u32>) {
        self.width = new_size.width;
        self.height = new_size.height;
    }

    /// Record a new device scale factor (from `WindowEvent::ScaleFactorChanged`).
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor.max(1.0);
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Effective pixel ratio, capped at [`MAX_PIXEL_RATIO`].
    #[inline]
    pub fn pixel_ratio(&self) -> f64 {
        self.scale_factor.min(MAX_PIXEL_RATIO)
    }

    /// Projection aspect ratio (width / height).
    ///
    /// Both dimensions are clamped to at least 1 so a zero-sized window
    /// (minimize) cannot divide by zero.
    #[inline]
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    /// The size to configure the render surface with.
    ///
    /// Winit sizes are already in physical pixels (logical * scale factor);
    /// applying `pixel_ratio / scale_factor` re-derives the buffer size as if
    /// the display density were capped at [`MAX_PIXEL_RATIO`].
    pub fn surface_size(&self) -> PhysicalSize<u32> {
        let ratio = self.pixel_ratio() / self.scale_factor;
        let w = (self.width as f64 * ratio).round() as u32;
        let h = (self.height as f64 * ratio).round() as u32;
        PhysicalSize::new(w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_equals_width_over_height_exactly() {
        let vp = Viewport::new(PhysicalSize::new(1920, 1080), 1.0);
        assert_eq!(vp.aspect(), 1920.0 / 1080.0);

        let vp = Viewport::new(PhysicalSize::new(777, 333), 1.0);
        assert_eq!(vp.aspect(), 777.0 / 333.0);
    }

    #[test]
    fn zero_dimensions_are_tolerated() {
        let mut vp = Viewport::new(PhysicalSize::new(800, 600), 1.0);
        vp.on_resize(PhysicalSize::new(0, 0));
        assert!(vp.aspect().is_finite());
        assert_eq!(vp.aspect(), 1.0);
    }

    #[test]
    fn pixel_ratio_is_capped_at_two() {
        let vp = Viewport::new(PhysicalSize::new(100, 100), 1.5);
        assert_eq!(vp.pixel_ratio(), 1.5);

        let vp = Viewport::new(PhysicalSize::new(100, 100), 3.0);
        assert_eq!(vp.pixel_ratio(), 2.0);
    }

    #[test]
    fn surface_size_downscales_high_density_displays() {
        // Physical 3000x1500 at scale factor 3 -> capped to density 2.
        let vp = Viewport::new(PhysicalSize::new(3000, 1500), 3.0);
        let s = vp.surface_size();
        assert_eq!((s.width, s.height), (2000, 1000));

        // At or below the cap the surface matches the window exactly.
        let vp = Viewport::new(PhysicalSize::new(1600, 900), 2.0);
        let s = vp.surface_size();
        assert_eq!((s.width, s.height), (1600, 900));
    }

    #[test]
    fn resize_updates_aspect_before_the_next_frame() {
        let mut vp = Viewport::new(PhysicalSize::new(800, 600), 1.0);
        vp.on_resize(PhysicalSize::new(1024, 256));
        assert_eq!(vp.aspect(), 4.0);
        assert_eq!((vp.width(), vp.height()), (1024, 256));
    }
}
