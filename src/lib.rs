//! Face tracking overlay pipeline.
//!
//! Turns noisy, possibly missing per-frame face detections into a stable
//! overlay on a live video stream:
//! 1. Detection results are normalized into immutable pose snapshots
//! 2. A temporal stabilizer keeps the last good snapshot alive across short
//!    tracking gaps and smooths the avatar pose per display frame
//! 3. Face boxes are derived from landmark extents with padding profiles
//! 4. The compositor layers background, person cutout and face overlay
//!
//! Face and segmentation models run in an external runtime behind the
//! [`detection::FaceDetector`] and [`detection::Segmenter`] traits; a 3D
//! renderer can be attached through [`renderer::OverlayRenderer`].
//!
//! # Examples
//!
//! ```no_run
//! use face_overlay::{config::Config, pipeline::OverlayPipeline, replay::ReplayTrack};
//!
//! # fn main() -> face_overlay::Result<()> {
//! let config = Config::default();
//! let track = ReplayTrack::from_file("session/track.yaml")?;
//! let mut pipeline = OverlayPipeline::from_config(&config)?;
//! pipeline.initialize_detection(&config.detector.acceleration, |mode| Ok(track.models(mode)))?;
//!
//! for recorded in &track.frames {
//!     let frame = recorded.load()?;
//!     let report = pipeline.tick(frame.timestamp, &frame)?;
//!     println!("{:?} face box: {:?}", report.hold, report.face_box);
//! }
//! # Ok(())
//! # }
//! ```

/// Core data model
pub mod types;

/// Detection adapter contract and acceleration fallback
pub mod detection;

/// Normalization of detector output into pose snapshots
pub mod snapshot;

/// Last-known-good value with a timeout
pub mod hold;

/// Snapshot hold policy and avatar pose smoothing
pub mod stabilizer;

/// Time-based smoothing filters
pub mod filters;

/// Face box derivation from landmarks
pub mod face_box;

/// Layered output compositing
pub mod compositor;

/// Overlay renderer contract and scheduling
pub mod renderer;

/// Per-frame pipeline orchestration
pub mod pipeline;

/// Recorded detection tracks for offline runs
pub mod replay;

/// Configuration management
pub mod config;

/// Constants used throughout the pipeline
pub mod constants;

/// Error types and result handling
pub mod error;

/// Numeric and image helpers
pub mod utils;

pub use error::{Error, Result};
