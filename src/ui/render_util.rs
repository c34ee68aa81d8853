use std::sync::Arc;

use gpui::RenderImage;
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{pipeline::skeleton::draw_skeleton, types::Frame};

pub(super) fn frame_to_image(
    frame: &Frame,
    landmarks: Option<&[Option<(f32, f32)>]>,
) -> Option<Arc<RenderImage>> {
    let mut rgba = frame.rgba.clone();
    if let Some(points) = landmarks {
        draw_skeleton(&mut rgba, frame.width, frame.height, points);
    }

    // GPUI expects BGRA; convert in place to avoid the async asset pipeline and flicker.
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, rgba)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}
