mod common;
mod ort;

use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::{
    config::ModelConfig,
    types::{Frame, NUM_POSE_LANDMARKS, PoseFrame, PoseLandmarks},
};

pub use self::common::PoseOutput;

pub(crate) trait PoseEngine: Send + 'static {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<PoseOutput>;
}

fn run_worker_loop<E: PoseEngine>(
    mut engine: E,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<PoseFrame>,
    min_confidence: f32,
) {
    while let Some(frame) = recv_latest_frame(&frame_rx) {
        let output = engine.infer(&frame).unwrap_or_else(|err| {
            log::warn!("pose inference failed: {err:?}");
            PoseOutput::empty()
        });

        // The controller must still see the frame to keep its clock running.
        if result_tx
            .send(build_pose_frame(output, frame, min_confidence))
            .is_err()
        {
            break;
        }
    }
    log::debug!("pose worker exiting");
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

pub(crate) fn build_pose_frame(
    output: PoseOutput,
    frame: Frame,
    min_confidence: f32,
) -> PoseFrame {
    let detected =
        output.confidence >= min_confidence && output.landmarks.len() >= NUM_POSE_LANDMARKS;

    PoseFrame {
        frame,
        pose: detected.then(|| PoseLandmarks {
            points: output.landmarks,
            confidence: output.confidence,
        }),
    }
}

pub fn start_pose_worker(
    model: ModelConfig,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<PoseFrame>,
) -> thread::JoinHandle<()> {
    log::info!("starting pose backend: ort ({})", model.path.display());

    ort::start_worker(model, frame_rx, result_tx)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crossbeam_channel::{bounded, unbounded};

    use super::*;
    use crate::types::Landmark;

    fn frame(width: u32) -> Frame {
        Frame {
            rgba: vec![0; (width * 2 * 4) as usize],
            width,
            height: 2,
            timestamp: Instant::now(),
        }
    }

    struct FixedEngine {
        confidence: f32,
        seen: Sender<u32>,
    }

    impl PoseEngine for FixedEngine {
        fn infer(&mut self, frame: &Frame) -> anyhow::Result<PoseOutput> {
            let _ = self.seen.send(frame.width);
            Ok(PoseOutput {
                landmarks: vec![Landmark::new(0.5, 0.5); NUM_POSE_LANDMARKS],
                confidence: self.confidence,
            })
        }
    }

    struct FailingEngine;

    impl PoseEngine for FailingEngine {
        fn infer(&mut self, _frame: &Frame) -> anyhow::Result<PoseOutput> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    #[test]
    fn low_confidence_means_no_person() {
        let output = PoseOutput {
            landmarks: vec![Landmark::new(0.1, 0.1); NUM_POSE_LANDMARKS],
            confidence: 0.3,
        };
        assert!(build_pose_frame(output.clone(), frame(1), 0.5).pose.is_none());
        let found = build_pose_frame(output, frame(1), 0.2).pose.unwrap();
        assert_eq!(found.points.len(), NUM_POSE_LANDMARKS);
    }

    #[test]
    fn truncated_landmarks_mean_no_person() {
        let output = PoseOutput {
            landmarks: vec![Landmark::new(0.1, 0.1); 10],
            confidence: 0.9,
        };
        assert!(build_pose_frame(output, frame(1), 0.5).pose.is_none());
    }

    #[test]
    fn worker_skips_to_newest_frame() {
        let (frame_tx, frame_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let (seen_tx, seen_rx) = unbounded();

        for width in 1..=3 {
            frame_tx.send(frame(width)).unwrap();
        }
        drop(frame_tx);

        run_worker_loop(
            FixedEngine {
                confidence: 0.9,
                seen: seen_tx,
            },
            frame_rx,
            result_tx,
            0.5,
        );

        let seen: Vec<u32> = seen_rx.try_iter().collect();
        assert_eq!(seen, vec![3]);
        let result = result_rx.try_recv().unwrap();
        assert_eq!(result.frame.width, 3);
        assert!(result.pose.is_some());
    }

    #[test]
    fn inference_errors_still_forward_the_frame() {
        let (frame_tx, frame_rx) = bounded(1);
        let (result_tx, result_rx) = bounded(1);
        let handle = thread::spawn(move || run_worker_loop(FailingEngine, frame_rx, result_tx, 0.5));

        frame_tx.send(frame(4)).unwrap();
        let result = result_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(result.frame.width, 4);
        assert!(result.pose.is_none());

        drop(frame_tx);
        handle.join().unwrap();
    }
}
