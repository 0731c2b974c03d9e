//! Configuration management for the overlay pipeline

use crate::compositor::{Background, LayerFlags};
use crate::constants::{
    DEFAULT_BLUR_SIGMA, DEFAULT_MARKER_RADIUS, DEFAULT_RENDER_MAX_FPS, EXPRESSION_FACTOR, FACE_BOX_HOLD_MS,
    GAZE_FACTOR, GAZE_SCALE, POSITION_RATE, ROTATION_RATE, SCALE_RATE, SNAPSHOT_HOLD_MS,
};
use crate::detection::AccelerationMode;
use crate::face_box::BoxPadding;
use crate::pipeline::FeatureFlags;
use crate::stabilizer::AvatarSettings;
use crate::{Error, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hold windows and smoothing rates
    pub stabilizer: StabilizerConfig,

    /// Face box padding profiles
    pub face_box: FaceBoxConfig,

    /// Compositing configuration
    pub compositor: CompositorConfig,

    /// Feature switches
    pub features: FeatureConfig,

    /// Detector runtime configuration
    pub detector: DetectorConfig,

    /// Overlay renderer configuration
    pub renderer: RendererConfig,
}

/// Hold and smoothing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// How long the effective snapshot survives detection gaps (ms)
    pub snapshot_hold_ms: u64,

    /// How long the avatar face box survives without a snapshot (ms)
    pub face_box_hold_ms: u64,

    /// Position smoothing rate (per second)
    pub position_rate: f32,

    /// Scale smoothing rate (per second)
    pub scale_rate: f32,

    /// Rotation slerp rate (per second)
    pub rotation_rate: f32,

    /// Per-frame expression interpolation factor
    pub expression_factor: f32,

    /// Per-frame gaze interpolation factor
    pub gaze_factor: f32,

    /// Scale applied to raw gaze weights
    pub gaze_scale: f32,
}

/// Padding profiles for the two face box consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceBoxConfig {
    /// 2D image-mask overlay
    pub mask: BoxPadding,

    /// 3D avatar head fit
    pub avatar: BoxPadding,
}

/// Background source when replacement is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Blurred copy of the live frame
    Blur,
    /// Still image from `background_image`
    Image,
}

/// Compositing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Mirror the output horizontally (selfie view)
    pub mirror: bool,

    /// Background source
    pub background: BackgroundMode,

    /// Still background image path
    pub background_image: Option<PathBuf>,

    /// Gaussian sigma for the blurred background
    pub blur_sigma: f32,

    /// Image stretched over the face box; landmark markers when absent
    pub overlay_image: Option<PathBuf>,

    /// Landmark marker radius in pixels
    pub marker_radius: u32,
}

/// Feature switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Replace the background behind the person
    pub background_replacement: bool,

    /// Draw the 2D face overlay
    pub face_overlay: bool,

    /// Drive the 3D avatar renderer
    pub avatar: bool,

    /// Keep the avatar visible through detection loss
    pub continuous_avatar: bool,
}

/// Detector runtime parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Acceleration modes to try, in order
    pub acceleration: Vec<AccelerationMode>,
}

/// Overlay renderer parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Upper bound on renders per second while the avatar is enabled
    pub max_fps: u32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            snapshot_hold_ms: SNAPSHOT_HOLD_MS,
            face_box_hold_ms: FACE_BOX_HOLD_MS,
            position_rate: POSITION_RATE,
            scale_rate: SCALE_RATE,
            rotation_rate: ROTATION_RATE,
            expression_factor: EXPRESSION_FACTOR,
            gaze_factor: GAZE_FACTOR,
            gaze_scale: GAZE_SCALE,
        }
    }
}

impl Default for FaceBoxConfig {
    fn default() -> Self {
        Self {
            mask: BoxPadding::MASK,
            avatar: BoxPadding::AVATAR,
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            mirror: true,
            background: BackgroundMode::Blur,
            background_image: None,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            overlay_image: None,
            marker_radius: DEFAULT_MARKER_RADIUS,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            background_replacement: false,
            face_overlay: true,
            avatar: false,
            continuous_avatar: false,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            acceleration: AccelerationMode::PREFERENCE.to_vec(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_fps: DEFAULT_RENDER_MAX_FPS,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the YAML is malformed
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let s = &self.stabilizer;
        if s.snapshot_hold_ms == 0 || s.face_box_hold_ms == 0 {
            return Err(Error::ConfigError("Hold windows must be greater than 0".to_string()));
        }
        for (name, rate) in [
            ("position_rate", s.position_rate),
            ("scale_rate", s.scale_rate),
            ("rotation_rate", s.rotation_rate),
        ] {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(Error::ConfigError(format!("{name} must be positive")));
            }
        }
        for (name, factor) in [("expression_factor", s.expression_factor), ("gaze_factor", s.gaze_factor)] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(Error::ConfigError(format!("{name} must be in (0, 1]")));
            }
        }
        if !(s.gaze_scale.is_finite() && s.gaze_scale >= 0.0) {
            return Err(Error::ConfigError("gaze_scale must be non-negative".to_string()));
        }

        for (name, padding) in [("mask", &self.face_box.mask), ("avatar", &self.face_box.avatar)] {
            if !(padding.pad_x >= 0.0 && padding.pad_y >= 0.0) {
                return Err(Error::ConfigError(format!("{name} padding must be non-negative")));
            }
            if !(0.0..=1.0).contains(&padding.y_shift) {
                return Err(Error::ConfigError(format!("{name} y_shift must be between 0.0 and 1.0")));
            }
        }

        let c = &self.compositor;
        if !(c.blur_sigma.is_finite() && c.blur_sigma >= 0.0) {
            return Err(Error::ConfigError("blur_sigma must be non-negative".to_string()));
        }
        if c.background == BackgroundMode::Image {
            match &c.background_image {
                None => {
                    return Err(Error::ConfigError(
                        "background: image requires background_image".to_string(),
                    ))
                }
                Some(path) if !path.exists() => {
                    return Err(Error::ConfigError(format!(
                        "Background image not found: {}",
                        path.display()
                    )))
                }
                Some(_) => {}
            }
        }
        if let Some(path) = &c.overlay_image {
            if !path.exists() {
                return Err(Error::ConfigError(format!("Overlay image not found: {}", path.display())));
            }
        }

        if self.detector.acceleration.is_empty() {
            return Err(Error::ConfigError("At least one acceleration mode is required".to_string()));
        }
        if self.renderer.max_fps == 0 {
            return Err(Error::ConfigError("Renderer max_fps must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Hold window for the effective snapshot
    #[must_use]
    pub fn snapshot_hold(&self) -> Duration {
        Duration::from_millis(self.stabilizer.snapshot_hold_ms)
    }

    /// Settings for the avatar stabilizer
    #[must_use]
    pub fn avatar_settings(&self) -> AvatarSettings {
        let s = &self.stabilizer;
        AvatarSettings {
            padding: self.face_box.avatar,
            mirror: self.compositor.mirror,
            box_hold: Duration::from_millis(s.face_box_hold_ms),
            position_rate: s.position_rate,
            scale_rate: s.scale_rate,
            rotation_rate: s.rotation_rate,
            expression_factor: s.expression_factor,
            gaze_factor: s.gaze_factor,
            gaze_scale: s.gaze_scale,
        }
    }

    #[must_use]
    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags {
            background_replacement: self.features.background_replacement,
            face_overlay: self.features.face_overlay,
            avatar: self.features.avatar,
            continuous_avatar: self.features.continuous_avatar,
            mirror: self.compositor.mirror,
        }
    }

    #[must_use]
    pub fn layer_flags(&self) -> LayerFlags {
        self.feature_flags().layer_flags()
    }

    /// Build the configured background, loading the still image if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the background image cannot be loaded
    pub fn background(&self) -> Result<Background> {
        match (self.compositor.background, &self.compositor.background_image) {
            (BackgroundMode::Image, Some(path)) => Ok(Background::Image(image::open(path)?.to_rgba8())),
            (BackgroundMode::Image, None) => Err(Error::ConfigError(
                "background: image requires background_image".to_string(),
            )),
            (BackgroundMode::Blur, _) => Ok(Background::Blur {
                sigma: self.compositor.blur_sigma,
            }),
        }
    }

    /// Load the configured face overlay image
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be loaded
    pub fn overlay_image(&self) -> Result<Option<RgbaImage>> {
        self.compositor
            .overlay_image
            .as_ref()
            .map(|path| -> Result<RgbaImage> { Ok(image::open(path)?.to_rgba8()) })
            .transpose()
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Face Overlay Configuration

# Hold windows and smoothing
stabilizer:
  snapshot_hold_ms: 600
  face_box_hold_ms: 1500
  position_rate: 12.0
  scale_rate: 10.0
  rotation_rate: 12.0
  expression_factor: 0.25
  gaze_factor: 0.15
  gaze_scale: 0.4

# Face box padding profiles
face_box:
  mask:
    pad_x: 0.2
    pad_y: 0.4
    y_shift: 0.3
  avatar:
    pad_x: 0.6
    pad_y: 0.9
    y_shift: 0.55

# Compositing
compositor:
  mirror: true
  background: "blur"          # blur | image
  # background_image: "assets/beach.png"
  blur_sigma: 12.0
  # overlay_image: "assets/mask.png"
  marker_radius: 1

# Feature switches
features:
  background_replacement: false
  face_overlay: true
  avatar: false
  continuous_avatar: false

# Detector runtime
detector:
  acceleration: ["gpu", "cpu"]

# Overlay renderer
renderer:
  max_fps: 30
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed = Config::from_yaml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed = Config::from_yaml("features:\n  avatar: true\n").unwrap();
        assert!(parsed.features.avatar);
        assert!(parsed.features.face_overlay);
        assert_eq!(parsed.stabilizer.snapshot_hold_ms, 600);
    }

    #[test]
    fn test_image_background_requires_path() {
        let mut config = Config::default();
        config.compositor.background = BackgroundMode::Image;
        assert!(config.validate().is_err());
        assert!(config.background().is_err());
    }

    #[test]
    fn test_avatar_settings_follow_config() {
        let mut config = Config::default();
        config.stabilizer.face_box_hold_ms = 900;
        config.compositor.mirror = false;
        let settings = config.avatar_settings();
        assert_eq!(settings.box_hold, Duration::from_millis(900));
        assert!(!settings.mirror);
        assert_eq!(settings.padding, BoxPadding::AVATAR);
    }
}
