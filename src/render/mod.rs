//! Rendering collaborator
//!
//! The filter never looks inside the renderer: it hands over a pose and a
//! camera and receives one depth value per pixel. GPU implementations live
//! outside this crate; tests use analytic scenes.

use serde::{Deserialize, Serialize};

use nalgebra::DVector;

use crate::filter::errors::FilterError;

/// Depth value of a pixel whose ray hits no surface
pub const NO_SURFACE: f64 = f64::INFINITY;

/// Pinhole camera intrinsics and image size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Image width [px]
    pub width: usize,
    /// Image height [px]
    pub height: usize,
    /// Focal length along x [px]
    pub fx: f64,
    /// Focal length along y [px]
    pub fy: f64,
    /// Principal point x [px]
    pub cx: f64,
    /// Principal point y [px]
    pub cy: f64,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self::new(64, 48, 60.0, 60.0, 31.5, 23.5)
    }
}

impl CameraModel {
    /// Create a camera
    pub fn new(width: usize, height: usize, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx,
            cy,
        }
    }

    /// Number of pixels, row-major
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// `(column, row)` of a row-major pixel index
    #[inline]
    pub fn pixel_coordinates(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    /// Normalized image-plane coordinates `((u - cx)/fx, (v - cy)/fy)` of a pixel
    pub fn normalized_ray(&self, index: usize) -> (f64, f64) {
        let (u, v) = self.pixel_coordinates(index);
        ((u as f64 - self.cx) / self.fx, (v as f64 - self.cy) / self.fy)
    }

    /// Reject degenerate intrinsics
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.width == 0 || self.height == 0 {
            return Err(FilterError::configuration("camera image must not be empty"));
        }
        if !(self.fx > 0.0 && self.fy > 0.0) || !self.fx.is_finite() || !self.fy.is_finite() {
            return Err(FilterError::configuration("focal lengths must be positive"));
        }
        if !self.cx.is_finite() || !self.cy.is_finite() {
            return Err(FilterError::configuration("principal point must be finite"));
        }
        Ok(())
    }
}

/// Rendered depth buffer, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    width: usize,
    height: usize,
    depths: Vec<f64>,
}

impl DepthImage {
    /// Wrap a row-major depth buffer
    pub fn new(width: usize, height: usize, depths: Vec<f64>) -> Result<Self, FilterError> {
        if depths.len() != width * height {
            return Err(FilterError::dimension_mismatch(
                width * height,
                depths.len(),
                "depth buffer size",
            ));
        }
        Ok(Self {
            width,
            height,
            depths,
        })
    }

    /// Image with every pixel at the same depth
    pub fn filled(width: usize, height: usize, depth: f64) -> Self {
        Self {
            width,
            height,
            depths: vec![depth; width * height],
        }
    }

    /// Build an image pixel by pixel; `None` marks a pixel without surface
    pub fn from_fn<F>(camera: &CameraModel, mut f: F) -> Self
    where
        F: FnMut(usize) -> Option<f64>,
    {
        let depths = (0..camera.pixel_count())
            .map(|i| f(i).unwrap_or(NO_SURFACE))
            .collect();
        Self {
            width: camera.width,
            height: camera.height,
            depths,
        }
    }

    /// Image width [px]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height [px]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.depths.len()
    }

    /// Depth of pixel `index`, `None` when the ray hits no surface
    #[inline]
    pub fn depth(&self, index: usize) -> Option<f64> {
        self.depths
            .get(index)
            .copied()
            .filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Raw depth values, including sentinels
    pub fn as_slice(&self) -> &[f64] {
        &self.depths
    }

    /// Number of pixels without a rendered surface
    pub fn no_surface_count(&self) -> usize {
        (0..self.pixel_count())
            .filter(|&i| self.depth(i).is_none())
            .count()
    }

    /// Check that the buffer matches the camera resolution
    pub fn check_size(&self, camera: &CameraModel) -> Result<(), FilterError> {
        if self.width != camera.width || self.height != camera.height {
            return Err(FilterError::dimension_mismatch(
                camera.pixel_count(),
                self.pixel_count(),
                format!(
                    "rendered image {}x{} for a {}x{} camera",
                    self.width, self.height, camera.width, camera.height
                ),
            ));
        }
        Ok(())
    }
}

/// Produces synthetic depth images for hypothesized poses
///
/// Rendering is synchronous and deterministic for a fixed pose and camera.
/// Implementations report failures as [`FilterError::RenderUnavailable`].
pub trait Renderer {
    /// Render the depth buffer of the object at `pose`
    fn render(&self, pose: &DVector<f64>, camera: &CameraModel) -> Result<DepthImage, FilterError>;

    /// Render several poses; GPU renderers batch these into one draw call
    fn render_batch(
        &self,
        poses: &[DVector<f64>],
        camera: &CameraModel,
    ) -> Result<Vec<DepthImage>, FilterError> {
        poses.iter().map(|pose| self.render(pose, camera)).collect()
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&self, pose: &DVector<f64>, camera: &CameraModel) -> Result<DepthImage, FilterError> {
        (**self).render(pose, camera)
    }

    fn render_batch(
        &self,
        poses: &[DVector<f64>],
        camera: &CameraModel,
    ) -> Result<Vec<DepthImage>, FilterError> {
        (**self).render_batch(poses, camera)
    }
}
