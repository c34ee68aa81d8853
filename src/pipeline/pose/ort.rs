use std::{path::Path, thread};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    PoseEngine,
    common::{self, PoseOutput},
    run_worker_loop,
};
use crate::{
    config::ModelConfig,
    model_download::{ModelDownloadEvent, ensure_pose_model_ready},
    types::{Frame, PoseFrame},
};

pub fn start_worker(
    model: ModelConfig,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<PoseFrame>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let ready = ensure_pose_model_ready(&model.path, |event| {
            if event == ModelDownloadEvent::AlreadyPresent {
                log::debug!("pose model found at {}", model.path.display());
            }
        });
        if let Err(err) = ready {
            log::error!(
                "failed to prepare pose model at {}: {err:?}",
                model.path.display()
            );
            return;
        }

        let engine = match OrtPoseEngine::new(&model.path) {
            Ok(engine) => {
                log::info!("pose ORT backend ready using {}", model.path.display());
                engine
            }
            Err(err) => {
                log::error!("failed to load ORT pose model: {err:?}");
                return;
            }
        };

        run_worker_loop(engine, frame_rx, result_tx, model.min_confidence);
    })
}

pub struct OrtPoseEngine {
    session: Session,
}

impl OrtPoseEngine {
    pub fn new(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        Ok(Self { session })
    }
}

impl PoseEngine for OrtPoseEngine {
    fn infer(&mut self, frame: &Frame) -> Result<PoseOutput> {
        let (input, letterbox) = common::letterbox_frame(frame, common::INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() == 0 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let rows = common::decode_landmarks(&flattened)?;

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            0.0
        };

        Ok(PoseOutput {
            landmarks: common::project_landmarks(&rows, &letterbox),
            confidence: confidence.clamp(0.0, 1.0),
        })
    }
}
