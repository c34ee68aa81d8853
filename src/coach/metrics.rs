use crate::{
    config::WorkoutConfig,
    types::{PoseIndex, PoseLandmarks},
};

use super::calibration::Baseline;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn midpoint(a: Vec2, b: Vec2) -> Vec2 {
        Vec2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    fn distance(self, other: Vec2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Pixel-space joint midpoints for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyGeometry {
    pub shoulder: Vec2,
    pub hip: Vec2,
    pub knee: Vec2,
    pub ankle: Vec2,
}

impl BodyGeometry {
    pub fn from_landmarks(pose: &PoseLandmarks, width: u32, height: u32) -> Self {
        let pixel = |index: PoseIndex| {
            let lm = pose.get(index);
            Vec2::new(lm.x as f64 * width as f64, lm.y as f64 * height as f64)
        };
        let mid = |a: PoseIndex, b: PoseIndex| Vec2::midpoint(pixel(a), pixel(b));

        Self {
            shoulder: mid(PoseIndex::LeftShoulder, PoseIndex::RightShoulder),
            hip: mid(PoseIndex::LeftHip, PoseIndex::RightHip),
            knee: mid(PoseIndex::LeftKnee, PoseIndex::RightKnee),
            ankle: mid(PoseIndex::LeftAnkle, PoseIndex::RightAnkle),
        }
    }

    pub fn torso_len(&self) -> f64 {
        self.shoulder.distance(self.hip)
    }

    /// Vertical hip-to-knee distance; shrinks as the user sits down.
    pub fn vthigh(&self) -> f64 {
        (self.knee.y - self.hip.y).abs()
    }

    pub fn thigh_len(&self) -> f64 {
        self.hip.distance(self.knee)
    }

    /// Horizontal knee-over-ankle offset relative to thigh length.
    pub fn valgus(&self) -> f64 {
        ((self.knee.x - self.ankle.x) / (self.thigh_len() + 1e-6)).abs()
    }
}

/// Arms held level with the shoulders, in normalized coordinates.
pub fn is_tpose(pose: &PoseLandmarks, tolerance: f64) -> bool {
    let level = |shoulder: PoseIndex, wrist: PoseIndex| {
        ((pose.get(shoulder).y - pose.get(wrist).y) as f64).abs() < tolerance
    };
    level(PoseIndex::LeftShoulder, PoseIndex::LeftWrist)
        && level(PoseIndex::RightShoulder, PoseIndex::RightWrist)
}

/// Smoothed squat depth: 0.0 standing, towards 1.0 as the thigh goes level.
#[derive(Clone, Debug)]
pub struct DepthTracker {
    alpha: f64,
    ema: Option<f64>,
}

impl DepthTracker {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, ema: None }
    }

    /// Seeds the filter at the standing ratio.
    pub fn reset(&mut self) {
        self.ema = Some(1.0);
    }

    pub fn update(&mut self, vthigh: f64, baseline_vthigh: f64) -> f64 {
        let ratio = (vthigh / baseline_vthigh).clamp(0.0, 1.5);
        let ema = match self.ema {
            None => ratio,
            Some(prev) => self.alpha * ratio + (1.0 - self.alpha) * prev,
        };
        self.ema = Some(ema);
        (1.0 - ema).clamp(0.0, 1.2)
    }
}

/// Pass/fail gates for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Assessment {
    pub depth: f64,
    pub torso_ratio: f64,
    pub valgus: f64,
    pub depth_ok: bool,
    pub back_ok: bool,
    pub knee_ok: bool,
    /// Depth relative to the target depth, for the headset gauge
    pub gauge: f64,
}

impl Assessment {
    pub fn evaluate(
        depth: f64,
        geometry: &BodyGeometry,
        baseline: &Baseline,
        config: &WorkoutConfig,
    ) -> Self {
        let torso_ratio = geometry.torso_len() / baseline.torso;
        let valgus = geometry.valgus();

        Self {
            depth,
            torso_ratio,
            valgus,
            depth_ok: depth >= config.depth_down,
            back_ok: torso_ratio >= config.spine_limit_ratio,
            knee_ok: valgus <= config.valgus_limit,
            gauge: (depth / config.depth_down.max(1e-6)).clamp(0.0, 1.0),
        }
    }

    pub fn all_ok(&self) -> bool {
        self.depth_ok && self.back_ok && self.knee_ok
    }
}
