//! Segmentation mask and frame buffer conversions for compositing.

use super::safe_cast::{f32_to_u32_clamp, scaled_index};
use crate::detection::SegmentationMask;
use crate::{Error, Result};
use image::{imageops, Rgba, RgbaImage};

/// Map a person confidence in `[0, 1]` to an 8-bit alpha; non-finite maps to 0
#[must_use]
pub fn confidence_to_alpha(confidence: f32) -> u8 {
    if !confidence.is_finite() {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped to [0, 255]
    let alpha = (confidence.clamp(0.0, 1.0) * 255.0).round() as u8;
    alpha
}

/// Resample a mask onto `canvas` as opaque white with the mask as alpha.
///
/// The mask may be at any resolution; it is stretched to the canvas with
/// nearest-cell sampling. `columns` holds the column lookup between calls.
///
/// # Errors
///
/// Returns an error if the mask or the canvas is empty
pub fn mask_to_alpha(mask: &SegmentationMask, canvas: &mut RgbaImage, columns: &mut Vec<usize>) -> Result<()> {
    if mask.is_empty() {
        return Err(Error::InvalidInput("Segmentation mask has no cells".to_string()));
    }
    let (width, height) = (canvas.width() as usize, canvas.height() as usize);
    if width == 0 || height == 0 {
        return Err(Error::InvalidInput("Mask canvas has zero size".to_string()));
    }

    // Column lookups are shared by every row
    columns.clear();
    columns.extend((0..width).map(|x| scaled_index(x, width, mask.width())));

    for (y, row) in canvas.rows_mut().enumerate() {
        let src_row = scaled_index(y, height, mask.height());
        for (pixel, &src_col) in row.zip(columns.iter()) {
            *pixel = Rgba([u8::MAX, u8::MAX, u8::MAX, mask.alpha_at(src_row, src_col)]);
        }
    }
    Ok(())
}

/// Keep `frame` only where `mask_canvas` is opaque (destination-in)
///
/// # Errors
///
/// Returns an error if the buffers differ in size
pub fn apply_alpha_mask(frame: &RgbaImage, mask_canvas: &RgbaImage, out: &mut RgbaImage) -> Result<()> {
    if frame.dimensions() != mask_canvas.dimensions() || frame.dimensions() != out.dimensions() {
        return Err(Error::InvalidInput(format!(
            "Buffer size mismatch: frame {:?}, mask {:?}, output {:?}",
            frame.dimensions(),
            mask_canvas.dimensions(),
            out.dimensions()
        )));
    }

    for ((dst, src), m) in out.pixels_mut().zip(frame.pixels()).zip(mask_canvas.pixels()) {
        let alpha = u8::try_from(u16::from(src[3]) * u16::from(m[3]) / 255).unwrap_or(u8::MAX);
        *dst = Rgba([src[0], src[1], src[2], alpha]);
    }
    Ok(())
}

/// Working buffers for [`soft_blur_into`], kept between frames
#[derive(Debug, Default)]
pub struct BlurScratch {
    small: Option<RgbaImage>,
    pass: Option<RgbaImage>,
}

impl BlurScratch {
    fn buffers(&mut self, width: u32, height: u32) -> (&mut RgbaImage, &mut RgbaImage) {
        let small = reuse_or_allocate(&mut self.small, width, height);
        let pass = reuse_or_allocate(&mut self.pass, width, height);
        (small, pass)
    }
}

fn reuse_or_allocate(slot: &mut Option<RgbaImage>, width: u32, height: u32) -> &mut RgbaImage {
    if slot.as_ref().map_or(true, |image| image.dimensions() != (width, height)) {
        *slot = Some(RgbaImage::new(width, height));
    }
    slot.get_or_insert_with(|| RgbaImage::new(width, height))
}

/// Blur a frame into `out` for the blurred-background mode.
///
/// Three box passes approximate a Gaussian of `sigma`. Large sigmas run on a
/// quarter-size copy that is scaled back up bilinearly, which looks the same
/// and costs a fraction of a full-size blur. Buffers in `scratch` are only
/// reallocated when the frame size changes.
///
/// # Errors
///
/// Returns an error if `out` differs in size from `frame`
pub fn soft_blur_into(frame: &RgbaImage, sigma: f32, scratch: &mut BlurScratch, out: &mut RgbaImage) -> Result<()> {
    const DOWNSCALE: u32 = 4;

    if frame.dimensions() != out.dimensions() {
        return Err(Error::InvalidInput(format!(
            "Blur size mismatch: frame {:?}, output {:?}",
            frame.dimensions(),
            out.dimensions()
        )));
    }
    let (width, height) = frame.dimensions();
    if sigma.is_nan() || sigma <= 0.0 || width == 0 || height == 0 {
        out.copy_from_slice(frame.as_raw());
        return Ok(());
    }

    #[allow(clippy::cast_precision_loss)]
    let factor = if sigma >= DOWNSCALE as f32 && width >= 16 && height >= 16 {
        DOWNSCALE
    } else {
        1
    };
    let (small_w, small_h) = (width / factor, height / factor);
    #[allow(clippy::cast_precision_loss)]
    let small_sigma = sigma / factor as f32;
    // Box width for three passes: sqrt(12 * sigma^2 / 3 + 1)
    let radius = f32_to_u32_clamp(
        ((4.0 * small_sigma * small_sigma + 1.0).sqrt() - 1.0) / 2.0,
        0,
        small_w.max(small_h),
    ) as usize;

    let (small, pass) = scratch.buffers(small_w, small_h);
    if factor == 1 {
        small.copy_from_slice(frame.as_raw());
    } else {
        downsample_area(frame, small);
    }

    if radius > 0 {
        let (w, h) = (small_w as usize, small_h as usize);
        for _ in 0..3 {
            for y in 0..h {
                box_blur_line(small.as_raw(), pass, y * w * 4, 4, w, radius);
            }
            for x in 0..w {
                box_blur_line(pass.as_raw(), small, x * 4, w * 4, h, radius);
            }
        }
    }

    if factor == 1 {
        out.copy_from_slice(small.as_raw());
    } else {
        upsample_bilinear(small, out);
    }
    Ok(())
}

/// Running-sum box filter over `len` pixels starting at byte `start`, spaced
/// `stride` bytes apart. Edges repeat the outermost pixel.
fn box_blur_line(src: &[u8], dst: &mut [u8], start: usize, stride: usize, len: usize, radius: usize) {
    let window = 2 * radius + 1;
    let at = |i: usize| start + i.min(len - 1) * stride;

    let mut sums = [0usize; 4];
    for k in 0..window {
        let base = at(k.saturating_sub(radius));
        for (c, sum) in sums.iter_mut().enumerate() {
            *sum += usize::from(src[base + c]);
        }
    }

    for i in 0..len {
        let base = start + i * stride;
        for (c, sum) in sums.iter().enumerate() {
            dst[base + c] = u8::try_from((sum + window / 2) / window).unwrap_or(u8::MAX);
        }
        let (outgoing, incoming) = (at(i.saturating_sub(radius)), at(i + radius + 1));
        for (c, sum) in sums.iter_mut().enumerate() {
            *sum = *sum + usize::from(src[incoming + c]) - usize::from(src[outgoing + c]);
        }
    }
}

/// Average each block of `src` that maps onto one pixel of the smaller `dst`
fn downsample_area(src: &RgbaImage, dst: &mut RgbaImage) {
    let (src_w, src_h) = src.dimensions();
    let (dst_w, dst_h) = dst.dimensions();

    for (x, y, pixel) in dst.enumerate_pixels_mut() {
        let x0 = x * src_w / dst_w;
        let x1 = ((x + 1) * src_w / dst_w).max(x0 + 1);
        let y0 = y * src_h / dst_h;
        let y1 = ((y + 1) * src_h / dst_h).max(y0 + 1);

        let mut sums = [0u32; 4];
        for sy in y0..y1 {
            for sx in x0..x1 {
                for (sum, &v) in sums.iter_mut().zip(src.get_pixel(sx, sy).0.iter()) {
                    *sum += u32::from(v);
                }
            }
        }
        let count = (x1 - x0) * (y1 - y0);
        for (channel, sum) in pixel.0.iter_mut().zip(sums) {
            *channel = u8::try_from((sum + count / 2) / count).unwrap_or(u8::MAX);
        }
    }
}

/// Stretch `src` over the larger `dst` with cell-center bilinear sampling
#[allow(clippy::cast_precision_loss)] // Image dimensions are far below f32 precision limits
fn upsample_bilinear(src: &RgbaImage, dst: &mut RgbaImage) {
    let (src_w, src_h) = src.dimensions();
    let (dst_w, dst_h) = dst.dimensions();
    let (scale_x, scale_y) = (src_w as f32 / dst_w as f32, src_h as f32 / dst_h as f32);
    let (max_x, max_y) = ((src_w - 1) as f32, (src_h - 1) as f32);

    for (x, y, pixel) in dst.enumerate_pixels_mut() {
        let fx = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, max_x);
        let fy = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, max_y);
        let (tx, ty) = (fx.fract(), fy.fract());
        let x0 = f32_to_u32_clamp(fx.floor(), 0, src_w - 1);
        let y0 = f32_to_u32_clamp(fy.floor(), 0, src_h - 1);
        let (x1, y1) = ((x0 + 1).min(src_w - 1), (y0 + 1).min(src_h - 1));

        let (p00, p10) = (src.get_pixel(x0, y0), src.get_pixel(x1, y0));
        let (p01, p11) = (src.get_pixel(x0, y1), src.get_pixel(x1, y1));
        for c in 0..4 {
            let top = f32::from(p00[c]) * (1.0 - tx) + f32::from(p10[c]) * tx;
            let bottom = f32::from(p01[c]) * (1.0 - tx) + f32::from(p11[c]) * tx;
            let value = top * (1.0 - ty) + bottom * ty;
            pixel[c] = u8::try_from(f32_to_u32_clamp(value, 0, 255)).unwrap_or(u8::MAX);
        }
    }
}

/// Stretch `image` to exactly `width` x `height`, reusing `cache` when it
/// already holds a copy of that size
pub fn fit_into<'a>(image: &RgbaImage, width: u32, height: u32, cache: &'a mut Option<RgbaImage>) -> &'a RgbaImage {
    let stale = cache.as_ref().map_or(true, |c| c.dimensions() != (width, height));
    if stale {
        *cache = Some(if image.dimensions() == (width, height) {
            image.clone()
        } else {
            imageops::resize(image, width, height, imageops::FilterType::Triangle)
        });
    }
    cache.get_or_insert_with(|| image.clone())
}
