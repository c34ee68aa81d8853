use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Sender;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::rgba_converter;
use crate::{config::CameraConfig, types::Frame};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Capture thread handle; stops and joins when dropped.
#[derive(Debug)]
pub struct CameraStream {
    index: u32,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn log_available_cameras() {
    match query(ApiBackend::Auto) {
        Ok(cameras) if cameras.is_empty() => log::warn!("no cameras detected"),
        Ok(cameras) => {
            for info in cameras {
                log::info!("camera {}: {}", info.index(), info.human_name());
            }
        }
        Err(err) => log::warn!("failed to enumerate cameras: {err}"),
    }
}

fn build_camera(index: &CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Opens the first index in `config.indices` that yields a stream.
pub fn open_first_camera(
    config: &CameraConfig,
    frame_tx: Sender<Frame>,
) -> Result<CameraStream> {
    if config.indices.is_empty() {
        return Err(anyhow!("no camera indices configured"));
    }
    let mut last_err = None;

    for &index in &config.indices {
        match start_camera_stream(index, config.mirror, frame_tx.clone()) {
            Ok(stream) => {
                log::info!("camera {index} opened");
                return Ok(stream);
            }
            Err(err) => {
                log::warn!("camera {index} unavailable: {err:#}");
                last_err = Some(err);
            }
        }
    }

    log_available_cameras();
    Err(last_err
        .unwrap_or_else(|| anyhow!("no camera opened"))
        .context("failed to open any configured camera"))
}

pub fn start_camera_stream(
    index: u32,
    mirror: bool,
    frame_tx: Sender<Frame>,
) -> Result<CameraStream> {
    let camera_index = CameraIndex::Index(index);
    // Fail fast before spawning the capture thread.
    drop(build_camera(&camera_index).with_context(|| format!("failed to open camera {index}"))?);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(&camera_index) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to reopen camera {index}: {err:?}");
                return;
            }
        };

        while !stop_flag.load(Ordering::Relaxed) {
            let frame_start = Instant::now();
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!(
                        "camera frame read failed (after {:?}): {err:?}",
                        frame_start.elapsed()
                    );
                    continue;
                }
            };

            let mut converted = match rgba_converter::convert_camera_frame(&buffer) {
                Ok(rgba) => rgba,
                Err(err) => {
                    log::warn!("failed to decode camera frame {err:?}");
                    continue;
                }
            };
            if mirror {
                rgba_converter::mirror_horizontal(
                    &mut converted.rgba,
                    converted.width,
                    converted.height,
                );
            }

            let frame = Frame {
                rgba: converted.rgba,
                width: converted.width,
                height: converted.height,
                timestamp: Instant::now(),
            };

            // Drop if the pose worker is busy.
            let _ = frame_tx.try_send(frame);
        }

        if let Err(err) = camera.stop_stream() {
            log::debug!("camera {index} stop failed: {err}");
        }
    });

    Ok(CameraStream {
        index,
        stop,
        handle: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;

    use super::*;

    #[test]
    fn empty_index_list_fails_without_touching_devices() {
        let config = CameraConfig {
            indices: Vec::new(),
            ..CameraConfig::default()
        };
        let (frame_tx, _frame_rx) = bounded(1);
        let err = open_first_camera(&config, frame_tx).unwrap_err();
        assert_eq!(err.to_string(), "no camera indices configured");
    }
}
