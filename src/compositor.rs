//! Layered compositing of the output frame.
//!
//! Layers, bottom to top:
//! 1. background: a still image or a blurred copy of the live frame, only
//!    when replacement is on and a mask arrived
//! 2. person cutout: the live frame kept only where the mask is opaque
//! 3. face overlay: an image stretched to the face box, or landmark markers
//!
//! Without replacement (or without a mask) the live frame is copied as is.
//! Mirroring wraps every layer, so the face box is derived unmirrored.

use crate::constants::{DEFAULT_BLUR_SIGMA, DEFAULT_MARKER_RADIUS};
use crate::detection::SegmentationMask;
use crate::face_box::{derive_face_box, BoxPadding};
use crate::types::{FaceBox, FrameSize, LandmarkPoint, PoseSnapshot, VideoFrame};
use crate::utils::image_conversion::{
    apply_alpha_mask, fit_into, mask_to_alpha, soft_blur_into, BlurScratch,
};
use crate::utils::safe_cast::{f32_to_i64_floor, f32_to_u32_clamp};
use crate::{Error, Result};
use image::{imageops, Rgba, RgbaImage};
use log::{debug, info, warn};
use std::time::Duration;

/// Color of landmark debug markers
pub const MARKER_COLOR: Rgba<u8> = Rgba([0, 255, 128, 255]);

/// What replaces the background behind the person cutout
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// Blurred copy of the live frame
    Blur { sigma: f32 },
    /// User-supplied still image, stretched to the frame
    Image(RgbaImage),
}

impl Default for Background {
    fn default() -> Self {
        Self::Blur {
            sigma: DEFAULT_BLUR_SIGMA,
        }
    }
}

/// Feature switches read once per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerFlags {
    pub background_replacement: bool,
    pub face_overlay: bool,
    pub mirror: bool,
}

/// Lazily allocated buffer that is only reallocated when the size changes
#[derive(Debug)]
struct OffscreenBuffer {
    name: &'static str,
    image: Option<RgbaImage>,
}

impl OffscreenBuffer {
    const fn new(name: &'static str) -> Self {
        Self { name, image: None }
    }

    fn ensure(&mut self, size: FrameSize) -> Result<&mut RgbaImage> {
        if !size.is_known() {
            return Err(Error::InvalidInput(format!("Cannot allocate {} buffer of zero size", self.name)));
        }
        let fits = self
            .image
            .as_ref()
            .is_some_and(|image| image.dimensions() == (size.width, size.height));
        if !fits {
            debug!("Allocating {} buffer at {}x{}", self.name, size.width, size.height);
            self.image = Some(RgbaImage::new(size.width, size.height));
        }
        Ok(self.image.get_or_insert_with(|| RgbaImage::new(size.width, size.height)))
    }

    fn get(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }
}

/// Composites one output frame per distinct source timestamp
#[derive(Debug)]
pub struct Compositor {
    flags: LayerFlags,
    padding: BoxPadding,
    marker_radius: u32,
    background: Background,
    overlay_image: Option<RgbaImage>,
    output: OffscreenBuffer,
    mask_canvas: OffscreenBuffer,
    person: OffscreenBuffer,
    mask_columns: Vec<usize>,
    blur: BlurScratch,
    scaled_background: Option<RgbaImage>,
    scaled_overlay: Option<RgbaImage>,
    frame_size: FrameSize,
    last_drawn: Option<Duration>,
    face_box: Option<FaceBox>,
}

impl Compositor {
    #[must_use]
    pub fn new(flags: LayerFlags) -> Self {
        Self {
            flags,
            padding: BoxPadding::MASK,
            marker_radius: DEFAULT_MARKER_RADIUS,
            background: Background::default(),
            overlay_image: None,
            output: OffscreenBuffer::new("output"),
            mask_canvas: OffscreenBuffer::new("mask"),
            person: OffscreenBuffer::new("person"),
            mask_columns: Vec::new(),
            blur: BlurScratch::default(),
            scaled_background: None,
            scaled_overlay: None,
            frame_size: FrameSize::default(),
            last_drawn: None,
            face_box: None,
        }
    }

    #[must_use]
    pub fn with_padding(mut self, padding: BoxPadding) -> Self {
        self.padding = padding;
        self
    }

    #[must_use]
    pub fn with_marker_radius(mut self, radius: u32) -> Self {
        self.marker_radius = radius;
        self
    }

    #[must_use]
    pub fn with_background(mut self, background: Background) -> Self {
        self.set_background(background);
        self
    }

    #[must_use]
    pub fn with_overlay_image(mut self, image: Option<RgbaImage>) -> Self {
        self.set_overlay_image(image);
        self
    }

    pub fn set_flags(&mut self, flags: LayerFlags) {
        self.flags = flags;
    }

    #[must_use]
    pub fn flags(&self) -> LayerFlags {
        self.flags
    }

    pub fn set_background(&mut self, background: Background) {
        self.background = background;
        self.scaled_background = None;
    }

    /// Replace the uploaded face image; `None` falls back to landmark markers
    pub fn set_overlay_image(&mut self, image: Option<RgbaImage>) {
        self.overlay_image = image;
        self.scaled_overlay = None;
    }

    /// True when `timestamp` differs from the last composited frame.
    ///
    /// A timestamp older than the last draw counts as a new frame so a source
    /// whose clock restarted keeps producing output.
    #[must_use]
    pub fn is_dirty(&self, timestamp: Duration) -> bool {
        self.last_drawn != Some(timestamp)
    }

    /// Source timestamp of the last composited frame
    #[must_use]
    pub fn last_drawn(&self) -> Option<Duration> {
        self.last_drawn
    }

    /// Forget the last drawn timestamp so the next frame is composited
    pub fn invalidate(&mut self) {
        self.last_drawn = None;
    }

    /// Face box from the last composited frame, in unmirrored frame pixels
    #[must_use]
    pub fn face_box(&self) -> Option<FaceBox> {
        self.face_box
    }

    /// Face box as it appears on screen, for hit testing
    #[must_use]
    pub fn display_face_box(&self) -> Option<FaceBox> {
        #[allow(clippy::cast_precision_loss)]
        let width = self.frame_size.width as f32;
        self.face_box
            .map(|b| if self.flags.mirror { b.mirrored(width) } else { b })
    }

    /// Last composited frame
    #[must_use]
    pub fn output(&self) -> Option<&RgbaImage> {
        self.output.get()
    }

    #[must_use]
    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    /// Composite one frame. The mask is consumed and released here.
    ///
    /// If any offscreen step fails the live frame is drawn directly with no
    /// overlay for this frame.
    ///
    /// # Errors
    ///
    /// Returns an error only if the frame itself has zero size
    pub fn compose(
        &mut self,
        frame: &VideoFrame,
        mask: Option<SegmentationMask>,
        snapshot: Option<&PoseSnapshot>,
    ) -> Result<&RgbaImage> {
        let size = frame.size();
        if !size.is_known() {
            return Err(Error::InvalidInput("Frame has zero size".to_string()));
        }
        if size != self.frame_size {
            info!("Frame size changed to {}x{}", size.width, size.height);
            self.frame_size = size;
            self.scaled_background = None;
        }

        if let Err(e) = self.draw_layers(&frame.image, mask.as_ref(), snapshot, size) {
            warn!("Compositing failed, drawing live frame: {}", e);
            self.face_box = None;
            self.output.ensure(size)?.copy_from_slice(frame.image.as_raw());
        }
        drop(mask);

        let output = self.output.ensure(size)?;
        if self.flags.mirror {
            imageops::flip_horizontal_in_place(output);
        }
        self.last_drawn = Some(frame.timestamp);
        Ok(output)
    }

    fn draw_layers(
        &mut self,
        frame: &RgbaImage,
        mask: Option<&SegmentationMask>,
        snapshot: Option<&PoseSnapshot>,
        size: FrameSize,
    ) -> Result<()> {
        let output = self.output.ensure(size)?;

        match mask {
            Some(mask) if self.flags.background_replacement && !mask.is_empty() => {
                let mask_canvas = self.mask_canvas.ensure(size)?;
                mask_to_alpha(mask, mask_canvas, &mut self.mask_columns)?;
                let person = self.person.ensure(size)?;
                apply_alpha_mask(frame, mask_canvas, person)?;

                match &self.background {
                    Background::Image(image) => {
                        let scaled = fit_into(image, size.width, size.height, &mut self.scaled_background);
                        output.copy_from_slice(scaled.as_raw());
                        // Transparent areas of the still image show black
                        for pixel in output.pixels_mut() {
                            pixel[3] = u8::MAX;
                        }
                    }
                    Background::Blur { sigma } => soft_blur_into(frame, *sigma, &mut self.blur, output)?,
                }
                imageops::overlay(output, &*person, 0, 0);
            }
            _ => output.copy_from_slice(frame.as_raw()),
        }

        self.face_box = snapshot.and_then(|s| derive_face_box(s.landmarks(), size, self.padding, false));

        if let (true, Some(face_box), Some(snapshot)) = (self.flags.face_overlay, self.face_box, snapshot) {
            match &self.overlay_image {
                Some(image) => {
                    let width = f32_to_u32_clamp(face_box.width, 1, size.width.saturating_mul(4));
                    let height = f32_to_u32_clamp(face_box.height, 1, size.height.saturating_mul(4));
                    let scaled = fit_into(image, width, height, &mut self.scaled_overlay);
                    imageops::overlay(output, scaled, f32_to_i64_floor(face_box.x)?, f32_to_i64_floor(face_box.y)?);
                }
                None => draw_markers(output, snapshot.landmarks(), self.marker_radius),
            }
        }
        Ok(())
    }
}

/// Filled square markers at every landmark
fn draw_markers(canvas: &mut RgbaImage, landmarks: &[LandmarkPoint], radius: u32) {
    let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let r = i64::from(radius);

    for point in landmarks {
        #[allow(clippy::cast_precision_loss)]
        let (px, py) = (point.x * width as f32, point.y * height as f32);
        let (Ok(cx), Ok(cy)) = (f32_to_i64_floor(px), f32_to_i64_floor(py)) else {
            continue;
        };
        for y in (cy - r).max(0)..=(cy + r).min(height - 1) {
            for x in (cx - r).max(0)..=(cx + r).min(width - 1) {
                // Bounds checked above, so both fit in u32
                if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
                    canvas.put_pixel(x, y, MARKER_COLOR);
                }
            }
        }
    }
}
