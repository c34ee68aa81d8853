use crate::config::WorkoutConfig;

const TPOSE_ANNOUNCE_EVERY: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TPoseStatus {
    Measuring { count: u32 },
    NeedPose,
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TPoseNotice {
    /// Periodic progress, in percent
    Progress(u32),
    /// A run of T-pose frames was interrupted
    Interrupted,
    /// Nothing collected yet
    Instruct,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TPoseStep {
    pub status: TPoseStatus,
    pub notice: Option<TPoseNotice>,
}

/// Counts consecutive T-pose frames before the workout may begin.
#[derive(Clone, Debug)]
pub struct TPoseGate {
    count: u32,
    lost: u32,
    target: u32,
    loss_limit: u32,
}

impl TPoseGate {
    pub fn new(config: &WorkoutConfig) -> Self {
        Self {
            count: 0,
            lost: 0,
            target: config.tpose_frames.max(1),
            loss_limit: config.tpose_loss_frames,
        }
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn observe(&mut self, in_pose: bool) -> TPoseStep {
        let mut notice = None;
        let mut status;

        if in_pose {
            self.lost = 0;
            self.count += 1;
            if self.count % TPOSE_ANNOUNCE_EVERY == 0 {
                notice = Some(TPoseNotice::Progress(self.percent()));
            }
            status = TPoseStatus::Measuring { count: self.count };
        } else {
            self.lost += 1;
            if self.lost > self.loss_limit {
                if self.count > self.loss_limit {
                    notice = Some(TPoseNotice::Interrupted);
                } else if self.count == 0 {
                    notice = Some(TPoseNotice::Instruct);
                }
                self.count = 0;
                status = TPoseStatus::NeedPose;
            } else {
                status = TPoseStatus::Measuring { count: self.count };
            }
        }

        if self.count >= self.target {
            status = TPoseStatus::Complete;
            // the completion line supersedes the final progress line
            notice = None;
        }

        TPoseStep { status, notice }
    }

    fn percent(&self) -> u32 {
        (self.count * 100 / self.target).min(100)
    }
}

/// Standing reference lengths, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Baseline {
    pub vthigh: f64,
    pub torso: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaselineStep {
    pub first: bool,
    pub percent: u32,
    pub complete: Option<Baseline>,
}

/// Running mean of the standing thigh and torso lengths.
#[derive(Clone, Debug)]
pub struct StandingBaseline {
    frames: u32,
    target: u32,
    vthigh: f64,
    torso: f64,
}

impl StandingBaseline {
    pub fn new(config: &WorkoutConfig) -> Self {
        Self {
            frames: 0,
            target: config.baseline_frames.max(1),
            vthigh: 0.0,
            torso: 0.0,
        }
    }

    pub fn observe(&mut self, vthigh: f64, torso: f64) -> BaselineStep {
        self.frames += 1;
        let first = self.frames == 1;
        if first {
            self.vthigh = vthigh;
            self.torso = torso;
        } else {
            let n = self.frames as f64;
            self.vthigh += (vthigh - self.vthigh) / n;
            self.torso += (torso - self.torso) / n;
        }

        let percent = ((self.frames as f64 / self.target as f64) * 100.0).min(100.0) as u32;
        let complete = (self.frames >= self.target).then(|| Baseline {
            vthigh: self.vthigh.max(1.0),
            torso: self.torso.max(1.0),
        });

        BaselineStep {
            first,
            percent,
            complete,
        }
    }
}
