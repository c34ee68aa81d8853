use anyhow::{Result, anyhow};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

#[derive(Debug)]
pub struct RgbaFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub fn convert_camera_frame(frame: &Buffer) -> Result<RgbaFrame> {
    let resolution = frame.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = frame.buffer();

    let rgba = match frame.source_frame_format() {
        FrameFormat::NV12 => nv12_to_rgba(data, width, height)?,
        FrameFormat::YUYV => yuyv_to_rgba(data, width, height)?,
        FrameFormat::MJPEG => return mjpeg_to_rgba(data),
        FrameFormat::RAWRGB => raw_rgb_to_rgba(data, width, height)?,
        FrameFormat::RAWBGR => raw_bgr_to_rgba(data, width, height)?,
        FrameFormat::GRAY => gray_to_rgba(data, width, height)?,
    };

    Ok(RgbaFrame {
        rgba,
        width,
        height,
    })
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn ensure_len(kind: &str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(anyhow!(
            "{kind} buffer too small: got {}, expected {expected}",
            data.len()
        ));
    }
    Ok(())
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_len = pixel_count(width, height);
    let uv_len = y_len / 2;
    ensure_len("NV12", data, y_len + uv_len)?;

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_len],
        y_stride: width,
        uv_plane: &data[y_len..y_len + uv_len],
        uv_stride: width,
        width,
        height,
    };

    let mut rgba = vec![0u8; y_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12→RGBA failed: {err:?}"))?;

    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    ensure_len("YUYV", data, pixel_count(width, height) * 2)?;

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgba = vec![0u8; pixel_count(width, height) * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422→RGBA failed: {err:?}"))?;

    Ok(rgba)
}

/// Sizes the frame from the JPEG header rather than the negotiated format.
fn mjpeg_to_rgba(data: &[u8]) -> Result<RgbaFrame> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let mut rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG header missing after decode"))?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));

    let expected = pixel_count(width, height) * 4;
    if rgba.len() < expected {
        return Err(anyhow!(
            "MJPEG decode produced too few bytes: got {}, expected {expected}",
            rgba.len()
        ));
    }
    rgba.truncate(expected);

    Ok(RgbaFrame {
        rgba,
        width,
        height,
    })
}

fn raw_rgb_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    expand_rgb(data, width, height, [0, 1, 2])
}

fn raw_bgr_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    expand_rgb(data, width, height, [2, 1, 0])
}

/// `order` names the source byte feeding each of R, G and B.
fn expand_rgb(data: &[u8], width: u32, height: u32, order: [usize; 3]) -> Result<Vec<u8>> {
    let pixels = pixel_count(width, height);
    ensure_len("RGB", data, pixels * 3)?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_exact_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            dst[0] = src[order[0]];
            dst[1] = src[order[1]];
            dst[2] = src[order[2]];
            dst[3] = u8::MAX;
        });

    Ok(rgba)
}

fn gray_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let pixels = pixel_count(width, height);
    ensure_len("GRAY", data, pixels)?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_exact_mut(4)
        .zip(data.par_iter())
        .for_each(|(dst, &value)| {
            dst[..3].fill(value);
            dst[3] = u8::MAX;
        });

    Ok(rgba)
}

/// Flips an RGBA image left to right in place, like a mirror.
pub fn mirror_horizontal(rgba: &mut [u8], width: u32, height: u32) {
    let stride = width as usize * 4;
    if stride == 0 || rgba.len() < stride * height as usize {
        return;
    }

    rgba.par_chunks_exact_mut(stride)
        .take(height as usize)
        .for_each(|row| {
            let (mut left, mut right) = (0usize, width as usize - 1);
            while left < right {
                for channel in 0..4 {
                    row.swap(left * 4 + channel, right * 4 + channel);
                }
                left += 1;
                right -= 1;
            }
        });
}

#[cfg(test)]
mod tests {
    use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};

    use super::*;

    #[test]
    fn mjpeg_size_comes_from_the_bitstream() {
        let rgb: Vec<u8> = (0..4 * 2).flat_map(|i| [i * 30, 128, 255 - i * 30]).collect();
        let mut jpeg = Vec::new();
        JpegEncoder::new(&mut jpeg)
            .encode(&rgb, 4, 2, ExtendedColorType::Rgb8)
            .unwrap();

        let frame = mjpeg_to_rgba(&jpeg).unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(frame.rgba.len(), 4 * 2 * 4);
        assert!(frame.rgba.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn corrupt_mjpeg_is_an_error() {
        assert!(mjpeg_to_rgba(&[0xFF, 0xD8, 0x00, 0x01]).is_err());
    }

    #[test]
    fn mirror_swaps_pixels_within_each_row() {
        let mut rgba = vec![
            1, 1, 1, 255, 2, 2, 2, 255, 3, 3, 3, 255, //
            4, 4, 4, 255, 5, 5, 5, 255, 6, 6, 6, 255,
        ];
        mirror_horizontal(&mut rgba, 3, 2);
        assert_eq!(
            rgba,
            vec![
                3, 3, 3, 255, 2, 2, 2, 255, 1, 1, 1, 255, //
                6, 6, 6, 255, 5, 5, 5, 255, 4, 4, 4, 255,
            ]
        );
    }

    #[test]
    fn mirror_ignores_short_buffers() {
        let mut rgba = vec![9u8; 7];
        mirror_horizontal(&mut rgba, 2, 1);
        assert_eq!(rgba, vec![9u8; 7]);
    }

    #[test]
    fn bgr_rows_are_swapped_to_rgba() {
        let rgba = raw_bgr_to_rgba(&[10, 20, 30, 40, 50, 60], 2, 1).unwrap();
        assert_eq!(rgba, vec![30, 20, 10, 255, 60, 50, 40, 255]);
        assert!(raw_rgb_to_rgba(&[1, 2], 1, 1).is_err());
    }

    #[test]
    fn gray_expands_to_opaque_rgba() {
        let rgba = gray_to_rgba(&[7, 200], 2, 1).unwrap();
        assert_eq!(rgba, vec![7, 7, 7, 255, 200, 200, 200, 255]);
    }
}
