use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture time; drives the workout clock
    pub timestamp: Instant,
}

pub const NUM_POSE_LANDMARKS: usize = 33;
/// Joints below this visibility are not drawn on the overlay.
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

/// MediaPipe pose landmark indices used by the squat rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum PoseIndex {
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftWrist = 15,
    RightWrist = 16,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
}

/// Single landmark, `x`/`y` normalized to the frame (0.0..1.0).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            visibility: 1.0,
        }
    }

    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

#[derive(Clone, Debug)]
pub struct PoseLandmarks {
    pub points: Vec<Landmark>,
    pub confidence: f32,
}

impl PoseLandmarks {
    pub fn get(&self, index: PoseIndex) -> Landmark {
        self.points
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Pixel positions for drawing; poorly visible joints map to `None`.
    pub fn to_pixels(&self, width: u32, height: u32) -> Vec<Option<(f32, f32)>> {
        self.points
            .iter()
            .map(|lm| (lm.visibility >= VISIBILITY_THRESHOLD).then(|| lm.to_pixel(width, height)))
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct PoseFrame {
    pub frame: Frame,
    pub pose: Option<PoseLandmarks>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Progress,
    Alert,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Banner {
    pub text: String,
    pub tone: Tone,
    pub large: bool,
}

impl Banner {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
            large: false,
        }
    }

    pub fn large(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Alert,
            large: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DebugLine {
    pub state: &'static str,
    pub depth: f32,
    pub torso_ratio: f32,
    pub back_ok: bool,
}

impl DebugLine {
    pub fn text(&self) -> String {
        format!(
            "State:{} | D:{:.2} | TR:{:.2}",
            self.state, self.depth, self.torso_ratio
        )
    }
}

/// Everything the overlay prints on top of the camera image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HudState {
    pub banner: Option<Banner>,
    pub count: Option<u32>,
    pub debug: Option<DebugLine>,
    pub coach_lines: Vec<String>,
    pub hold_remaining: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoachStatus {
    Standby,
    Workout { difficulty: String },
}

impl CoachStatus {
    pub fn label(&self) -> String {
        match self {
            CoachStatus::Standby => "VR 신호 대기 중".to_string(),
            CoachStatus::Workout { difficulty } => format!("{difficulty} 모드 운동 중"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OverlayFrame {
    pub frame: Frame,
    pub landmarks: Option<Vec<Option<(f32, f32)>>>,
    pub hud: HudState,
}

/// Controller end of the overlay link. Status changes are never dropped;
/// frames are dropped while the UI is behind.
#[derive(Clone, Debug)]
pub struct OverlaySender {
    status_tx: Sender<CoachStatus>,
    frame_tx: Sender<OverlayFrame>,
}

#[derive(Debug)]
pub struct OverlayReceiver {
    pub status_rx: Receiver<CoachStatus>,
    pub frame_rx: Receiver<OverlayFrame>,
}

pub fn overlay_channel(frame_capacity: usize) -> (OverlaySender, OverlayReceiver) {
    let (status_tx, status_rx) = unbounded();
    let (frame_tx, frame_rx) = bounded(frame_capacity);
    (
        OverlaySender {
            status_tx,
            frame_tx,
        },
        OverlayReceiver {
            status_rx,
            frame_rx,
        },
    )
}

impl OverlaySender {
    pub fn status(&self, status: CoachStatus) {
        if self.status_tx.send(status).is_err() {
            log::trace!("overlay closed");
        }
    }

    pub fn frame(&self, frame: OverlayFrame) {
        match self.frame_tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("overlay busy, frame dropped"),
            Err(TrySendError::Disconnected(_)) => log::trace!("overlay closed"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayCommand {
    StopWorkout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_landmark_defaults_to_origin() {
        let pose = PoseLandmarks {
            points: vec![Landmark::new(0.5, 0.5)],
            confidence: 1.0,
        };
        assert_eq!(pose.get(PoseIndex::LeftHip), Landmark::default());
    }

    #[test]
    fn landmark_projects_to_pixels() {
        let lm = Landmark::new(0.5, 0.25);
        assert_eq!(lm.to_pixel(640, 480), (320.0, 120.0));
    }

    #[test]
    fn hidden_landmarks_are_not_drawn() {
        let mut hidden = Landmark::new(0.5, 0.5);
        hidden.visibility = 0.2;
        let pose = PoseLandmarks {
            points: vec![Landmark::new(0.25, 0.5), hidden],
            confidence: 1.0,
        };
        assert_eq!(pose.to_pixels(100, 100), vec![Some((25.0, 50.0)), None]);
    }

    fn overlay_frame(width: u32) -> OverlayFrame {
        OverlayFrame {
            frame: Frame {
                rgba: vec![0; (width * 4) as usize],
                width,
                height: 1,
                timestamp: Instant::now(),
            },
            landmarks: None,
            hud: HudState::default(),
        }
    }

    #[test]
    fn status_is_delivered_behind_a_full_frame_queue() {
        let (tx, rx) = overlay_channel(2);
        for width in 1..=5 {
            tx.frame(overlay_frame(width));
        }
        tx.status(CoachStatus::Standby);

        assert_eq!(rx.frame_rx.len(), 2);
        assert_eq!(rx.frame_rx.try_recv().unwrap().frame.width, 1);
        assert_eq!(rx.status_rx.try_recv(), Ok(CoachStatus::Standby));
    }

    #[test]
    fn closed_overlay_does_not_panic() {
        let (tx, rx) = overlay_channel(1);
        drop(rx);
        tx.status(CoachStatus::Standby);
        tx.frame(overlay_frame(1));
    }

    #[test]
    fn debug_line_formats_two_decimals() {
        let line = DebugLine {
            state: "DOWN",
            depth: 0.456,
            torso_ratio: 0.9,
            back_ok: true,
        };
        assert_eq!(line.text(), "State:DOWN | D:0.46 | TR:0.90");
    }
}
