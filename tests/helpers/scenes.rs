//! Analytic scenes standing in for the GPU renderer
//!
//! The tracked object is a tilted plane: the depth of pixel `i` is
//! `pose[0] + pose[1] · xᵢ`, with `xᵢ` the normalized image column. Poses of
//! any dimension ≥ 2 are accepted; extra coordinates do not affect the image.

use std::cell::Cell;

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use robust_depth_filters_rs::{
    CameraModel, Covariance, DampedWienerProcess, DepthImage, FilterError, Renderer,
    TrackerConfig,
};

/// Tilted plane; columns below `masked_columns` render no surface
#[derive(Debug, Clone, Default)]
pub struct TiltedPlane {
    pub masked_columns: usize,
}

impl TiltedPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_masked_columns(masked_columns: usize) -> Self {
        Self { masked_columns }
    }

    /// Noise-free depth of pixel `index` at `pose`
    pub fn depth(&self, pose: &[f64], camera: &CameraModel, index: usize) -> Option<f64> {
        let (column, _) = camera.pixel_coordinates(index);
        if column < self.masked_columns {
            return None;
        }
        let (x, _) = camera.normalized_ray(index);
        Some(pose[0] + pose[1] * x)
    }
}

impl Renderer for TiltedPlane {
    fn render(&self, pose: &DVector<f64>, camera: &CameraModel) -> Result<DepthImage, FilterError> {
        Ok(DepthImage::from_fn(camera, |i| {
            self.depth(pose.as_slice(), camera, i)
        }))
    }
}

/// Renderer whose backend is gone
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, _pose: &DVector<f64>, _camera: &CameraModel) -> Result<DepthImage, FilterError> {
        Err(FilterError::render_unavailable("rendering context lost"))
    }
}

/// Tilted plane that counts render calls
#[derive(Debug, Default)]
pub struct CountingRenderer {
    pub scene: TiltedPlane,
    pub renders: Cell<usize>,
}

impl Renderer for CountingRenderer {
    fn render(&self, pose: &DVector<f64>, camera: &CameraModel) -> Result<DepthImage, FilterError> {
        self.renders.set(self.renders.get() + 1);
        self.scene.render(pose, camera)
    }
}

/// 16x12 camera with default sensor and occlusion parameters
pub fn small_config() -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.camera = CameraModel::new(16, 12, 16.0, 16.0, 7.5, 5.5);
    config
}

/// Slowly diffusing 2-D plane pose
pub fn plane_pose_model() -> DampedWienerProcess {
    DampedWienerProcess::brownian(2, 0.01).unwrap()
}

pub fn pose_covariance(variance: f64) -> Covariance {
    Covariance::isotropic(2, variance)
}

/// Seeded sensor simulator for the tilted plane
pub struct SensorSimulator {
    pub scene: TiltedPlane,
    pub camera: CameraModel,
    noise: Normal<f64>,
    rng: StdRng,
}

impl SensorSimulator {
    pub fn new(camera: CameraModel, noise_sigma: f64, seed: u64) -> Self {
        Self {
            scene: TiltedPlane::new(),
            camera,
            noise: Normal::new(0.0, noise_sigma).unwrap(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One noisy frame of the plane at `pose`
    pub fn frame(&mut self, pose: &[f64]) -> Vec<f64> {
        (0..self.camera.pixel_count())
            .map(|i| match self.scene.depth(pose, &self.camera, i) {
                Some(d) => d + self.noise.sample(&mut self.rng),
                None => f64::NAN,
            })
            .collect()
    }

    /// Frame with `offset` added to every pixel in the first `columns` columns
    pub fn frame_with_occluder(&mut self, pose: &[f64], columns: usize, offset: f64) -> Vec<f64> {
        let mut frame = self.frame(pose);
        for (i, value) in frame.iter_mut().enumerate() {
            if self.camera.pixel_coordinates(i).0 < columns {
                *value += offset;
            }
        }
        frame
    }
}

/// Indices of the pixels in the first `columns` columns
pub fn column_pixels(camera: &CameraModel, columns: usize) -> Vec<usize> {
    (0..camera.pixel_count())
        .filter(|&i| camera.pixel_coordinates(i).0 < columns)
        .collect()
}
