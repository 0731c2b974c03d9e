//! Constants used throughout the pipeline

/// Number of landmarks produced by the dense face mesh detector
pub const NUM_FACE_MESH_LANDMARKS: usize = 468;

/// Hold window for the effective snapshot feeding the 2D overlay path (ms)
pub const SNAPSHOT_HOLD_MS: u64 = 600;

/// Hold window for the last-known avatar face box (ms)
pub const FACE_BOX_HOLD_MS: u64 = 1500;

/// Exponential rate constants (per second) for `1 - e^(-k * dt)` smoothing
pub const POSITION_RATE: f32 = 12.0;
pub const SCALE_RATE: f32 = 10.0;
pub const ROTATION_RATE: f32 = 12.0;

/// Per-frame interpolation factor for expression weights
pub const EXPRESSION_FACTOR: f32 = 0.25;

/// Per-frame interpolation factor for gaze/eye-direction weights
pub const GAZE_FACTOR: f32 = 0.15;

/// Raw gaze weights are scaled by this before interpolation
pub const GAZE_SCALE: f32 = 0.4;

/// Expression weights whose lowercased name contains this are gaze/eye-direction
pub const GAZE_MARKER: &str = "eyelook";

/// 2D image-mask overlay padding profile
pub const MASK_PAD_X: f32 = 0.2;
pub const MASK_PAD_Y: f32 = 0.4;
pub const MASK_Y_SHIFT: f32 = 0.3;

/// 3D avatar head padding profile (wider, biased further upward)
pub const AVATAR_PAD_X: f32 = 0.6;
pub const AVATAR_PAD_Y: f32 = 0.9;
pub const AVATAR_Y_SHIFT: f32 = 0.55;

/// Default Gaussian sigma for the blurred-background mode
pub const DEFAULT_BLUR_SIGMA: f32 = 12.0;

/// Radius in pixels of debug landmark markers
pub const DEFAULT_MARKER_RADIUS: u32 = 1;

/// Upper bound on overlay renderer invalidations per second
pub const DEFAULT_RENDER_MAX_FPS: u32 = 30;

/// Numeric precision epsilon
pub const EPSILON: f32 = 1e-6;
