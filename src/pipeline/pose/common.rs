use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Landmark, NUM_POSE_LANDMARKS};

pub const INPUT_SIZE: u32 = 256;
/// x, y, z, visibility, presence
pub const LANDMARK_STRIDE: usize = 5;

#[derive(Clone, Debug)]
pub struct PoseOutput {
    /// Normalized to the source frame
    pub landmarks: Vec<Landmark>,
    pub confidence: f32,
}

impl PoseOutput {
    pub fn empty() -> Self {
        Self {
            landmarks: Vec::new(),
            confidence: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Resizes `frame` into a black square of `target_size`, keeping aspect
/// ratio, as an NHWC tensor scaled to `[0, 1]`.
pub fn letterbox_frame(frame: &Frame, target_size: u32) -> Result<(Array4<f32>, LetterboxInfo)> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.width == 0 || frame.height == 0 || frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {} bytes for {}x{}",
            frame.rgba.len(),
            frame.width,
            frame.height
        ));
    }

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target_size);

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((target_size - new_w) / 2) as usize;
    let pad_y = ((target_size - new_h) / 2) as usize;
    let side = target_size as usize;
    let mut canvas = vec![0f32; side * side * 3];
    canvas
        .par_chunks_mut(side * 3)
        .enumerate()
        .skip(pad_y)
        .take(new_h as usize)
        .for_each(|(row, dst)| {
            let src_row = (row - pad_y) * new_w as usize * 4;
            let src = &resized[src_row..src_row + new_w as usize * 4];
            for (dst_px, src_px) in dst[pad_x * 3..].chunks_mut(3).zip(src.chunks_exact(4)) {
                dst_px[0] = src_px[0] as f32 / 255.0;
                dst_px[1] = src_px[1] as f32 / 255.0;
                dst_px[2] = src_px[2] as f32 / 255.0;
            }
        });

    let input = Array4::<f32>::from_shape_vec((1, side, side, 3), canvas)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    Ok((
        input,
        LetterboxInfo {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            orig_w: frame.width,
            orig_h: frame.height,
        },
    ))
}

/// Splits the flat model output into per-landmark rows.
pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; LANDMARK_STRIDE]>> {
    let needed = NUM_POSE_LANDMARKS * LANDMARK_STRIDE;
    if flat.len() < needed {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {needed}",
            flat.len()
        ));
    }

    Ok(flat
        .chunks_exact(LANDMARK_STRIDE)
        .take(NUM_POSE_LANDMARKS)
        .map(|c| [c[0], c[1], c[2], c[3], c[4]])
        .collect())
}

/// Maps model-space rows back onto the source frame, normalized to `[0, 1]`.
pub fn project_landmarks(
    rows: &[[f32; LANDMARK_STRIDE]],
    letterbox: &LetterboxInfo,
) -> Vec<Landmark> {
    let (w, h) = (letterbox.orig_w as f32, letterbox.orig_h as f32);
    rows.iter()
        .map(|&[x, y, _z, visibility, _presence]| {
            let px = (x - letterbox.pad_x) / letterbox.scale;
            let py = (y - letterbox.pad_y) / letterbox.scale;
            Landmark {
                x: (px / w).clamp(0.0, 1.0),
                y: (py / h).clamp(0.0, 1.0),
                visibility: sigmoid(visibility),
            }
        })
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
