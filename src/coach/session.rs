use std::time::{Duration, Instant};

use rand::{SeedableRng, rngs::StdRng};

use super::{
    Difficulty,
    calibration::{Baseline, StandingBaseline, TPoseGate, TPoseNotice, TPoseStatus},
    metrics::{Assessment, BodyGeometry, DepthTracker, is_tpose},
    rep_counter::{RepCounter, RepState},
    report::{FaultTally, SessionSummary, summarize},
    script::{self, Cue},
};
use crate::{
    config::WorkoutConfig,
    protocol::Telemetry,
    types::{Banner, DebugLine, HudState, PoseLandmarks, Tone},
};

const COUNTDOWN: [(f64, &str, &str); 4] = [
    (1.0, "3", "3"),
    (2.0, "2", "2"),
    (3.0, "1", "1"),
    (4.0, "START!", script::COUNTDOWN_GO),
];

/// A coach line to speak, subject to the caller's rate limiting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuideRequest {
    pub text: String,
    pub force: bool,
}

impl GuideRequest {
    pub fn new(text: impl Into<String>, force: bool) -> Self {
        Self {
            text: text.into(),
            force,
        }
    }
}

/// Result of feeding one camera frame to the session.
#[derive(Clone, Debug, Default)]
pub struct StepOutcome {
    pub telemetry: Vec<Telemetry>,
    pub guides: Vec<GuideRequest>,
    pub hud: HudState,
    pub finished: bool,
}

impl StepOutcome {
    fn guide(&mut self, text: impl Into<String>, force: bool) {
        self.guides.push(GuideRequest::new(text, force));
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    TPose,
    Countdown { started: Instant },
    Baseline,
    Active { baseline: Baseline },
    Finished,
}

pub struct WorkoutSession {
    difficulty: Difficulty,
    config: WorkoutConfig,
    phase: Phase,
    gate: TPoseGate,
    standing: StandingBaseline,
    depth: DepthTracker,
    reps: RepCounter,
    faults: FaultTally,
    coach_lines: Vec<String>,
    last_frame: Instant,
    last_coach: Instant,
    rng: StdRng,
}

impl WorkoutSession {
    pub fn new(difficulty: Difficulty, config: WorkoutConfig, now: Instant) -> Self {
        Self::with_rng(difficulty, config, now, StdRng::from_entropy())
    }

    pub fn with_rng(
        difficulty: Difficulty,
        config: WorkoutConfig,
        now: Instant,
        rng: StdRng,
    ) -> Self {
        Self {
            difficulty,
            gate: TPoseGate::new(&config),
            standing: StandingBaseline::new(&config),
            depth: DepthTracker::new(config.ema_alpha),
            reps: RepCounter::new(difficulty.hold_secs(), config.depth_up),
            config,
            phase: Phase::TPose,
            faults: FaultTally::default(),
            coach_lines: Vec::new(),
            last_frame: now,
            last_coach: now,
            rng,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn welcome(&mut self) -> GuideRequest {
        GuideRequest::new(Cue::Welcome.pick(&mut self.rng), true)
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn count(&self) -> u32 {
        self.reps.count()
    }

    pub fn step(
        &mut self,
        now: Instant,
        pose: Option<&PoseLandmarks>,
        width: u32,
        height: u32,
    ) -> StepOutcome {
        let dt = now.saturating_duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;

        let mut out = StepOutcome::default();
        if self.is_finished() {
            out.finished = true;
            return out;
        }

        let Some(pose) = pose else {
            if !matches!(self.phase, Phase::Countdown { .. }) {
                out.guide(script::FIND_CENTER, false);
            }
            out.hud.banner = Some(Banner::new(script::SEARCHING, Tone::Alert));
            return out;
        };

        match self.phase {
            Phase::TPose => self.calibrate(now, pose, &mut out),
            Phase::Countdown { started } => self.countdown(now, started, &mut out),
            Phase::Baseline => {
                let geometry = BodyGeometry::from_landmarks(pose, width, height);
                self.collect_baseline(&geometry, &mut out);
            }
            Phase::Active { baseline } => {
                let geometry = BodyGeometry::from_landmarks(pose, width, height);
                self.analyse(now, dt, &geometry, &baseline, &mut out);
            }
            Phase::Finished => {}
        }

        out.finished = self.is_finished();
        out
    }

    /// Ends the session and builds the report.
    pub fn finish(&mut self) -> SessionSummary {
        self.phase = Phase::Finished;
        summarize(
            self.reps.count(),
            self.reps.attempts(),
            self.reps.scores(),
            self.faults,
            self.config.kcal_per_rep,
        )
    }

    fn calibrate(&mut self, now: Instant, pose: &PoseLandmarks, out: &mut StepOutcome) {
        let step = self
            .gate
            .observe(is_tpose(pose, self.config.tpose_tolerance));

        match step.notice {
            Some(TPoseNotice::Progress(percent)) => out.guide(script::tpose_progress(percent), true),
            Some(TPoseNotice::Interrupted) => out.guide(script::TPOSE_LOST, true),
            Some(TPoseNotice::Instruct) => out.guide(script::TPOSE_INSTRUCT, false),
            None => {}
        }

        out.hud.banner = Some(match step.status {
            TPoseStatus::Measuring { count } => Banner::new(
                script::tpose_counter(count, self.gate.target()),
                Tone::Progress,
            ),
            TPoseStatus::NeedPose => Banner::new(script::TPOSE_NEEDED, Tone::Alert),
            TPoseStatus::Complete => Banner::new(
                script::tpose_counter(self.gate.target(), self.gate.target()),
                Tone::Progress,
            ),
        });

        if step.status == TPoseStatus::Complete {
            log::info!("T-pose calibration complete, starting countdown");
            self.phase = Phase::Countdown { started: now };
            out.guide(script::TPOSE_DONE, true);
            out.guide(Cue::StartCountdown.pick(&mut self.rng), true);
        }
    }

    fn countdown(&mut self, now: Instant, started: Instant, out: &mut StepOutcome) {
        let elapsed = now.saturating_duration_since(started).as_secs_f64();
        match COUNTDOWN.iter().find(|(until, _, _)| elapsed < *until) {
            Some((_, shown, spoken)) => {
                out.hud.banner = Some(Banner::large(*shown));
                out.guide(*spoken, true);
            }
            None => {
                log::debug!("countdown finished, collecting standing baseline");
                self.phase = Phase::Baseline;
            }
        }
    }

    fn collect_baseline(&mut self, geometry: &BodyGeometry, out: &mut StepOutcome) {
        let step = self.standing.observe(geometry.vthigh(), geometry.torso_len());
        if step.first {
            out.guide(script::BASELINE_START, true);
        }

        let line = script::baseline_progress(step.percent);
        out.hud.banner = Some(Banner::new(line.clone(), Tone::Progress));
        self.coach_lines = vec![line];

        out.telemetry.extend([
            Telemetry::Depth { data: 0.0 },
            Telemetry::Hold { data: 0.0 },
            Telemetry::Spine { is_good: true },
            Telemetry::Knee { is_good: true },
        ]);

        if let Some(baseline) = step.complete {
            log::info!(
                "standing baseline ready: thigh {:.1}px, torso {:.1}px",
                baseline.vthigh,
                baseline.torso
            );
            self.depth.reset();
            self.reps.reset();
            self.phase = Phase::Active { baseline };
            self.coach_lines = vec![script::BASELINE_DONE.to_string()];
            out.guide(script::BASELINE_DONE, true);
        }
    }

    fn analyse(
        &mut self,
        now: Instant,
        dt: f64,
        geometry: &BodyGeometry,
        baseline: &Baseline,
        out: &mut StepOutcome,
    ) {
        let depth = self.depth.update(geometry.vthigh(), baseline.vthigh);
        let assessment = Assessment::evaluate(depth, geometry, baseline, &self.config);

        out.telemetry.extend([
            Telemetry::Depth {
                data: assessment.gauge,
            },
            Telemetry::Spine {
                is_good: assessment.back_ok,
            },
            Telemetry::Knee {
                is_good: assessment.knee_ok,
            },
        ]);

        self.coach(now, &assessment, out);

        let step = self.reps.update(&assessment, dt);
        if let Some(remaining) = step.hold_remaining {
            out.telemetry.push(Telemetry::Hold { data: remaining });
        }

        if let Some(rep) = step.completed {
            log::debug!("rep finished: score {} success {}", rep.score, rep.success);
            let cue = if rep.success {
                out.telemetry.push(Telemetry::Count);
                if self.reps.count() >= self.difficulty.target_reps() {
                    log::info!("target of {} reps reached", self.difficulty.target_reps());
                    out.guide(Cue::MissionComplete.pick(&mut self.rng), true);
                    self.phase = Phase::Finished;
                    return;
                }
                Cue::Good
            } else if self.difficulty.hold_secs() > 0.0 {
                Cue::HoldFail
            } else {
                Cue::Fail
            };
            let line = cue.pick(&mut self.rng);
            out.guide(line, false);
            self.coach_lines = vec![line.to_string()];
            self.last_coach = now;
        }

        out.hud.count = Some(self.reps.count());
        out.hud.debug = Some(DebugLine {
            state: self.reps.state().label(),
            depth: assessment.depth as f32,
            torso_ratio: assessment.torso_ratio as f32,
            back_ok: assessment.back_ok,
        });
        out.hud.coach_lines = self.coach_lines.clone();
        out.hud.hold_remaining = self.reps.hold_remaining().map(|secs| secs as f32);
    }

    fn coach(&mut self, now: Instant, assessment: &Assessment, out: &mut StepOutcome) {
        let since = now.saturating_duration_since(self.last_coach);
        if since <= Duration::from_secs_f64(self.config.coach_interval_secs) {
            return;
        }

        let cue = if !assessment.knee_ok {
            log::debug!("knee valgus {:.2}", assessment.valgus);
            self.faults.knee += 1;
            Cue::KneeBad
        } else if !assessment.back_ok {
            self.faults.back += 1;
            Cue::SpineBad
        } else if self.reps.state() == RepState::Down
            && !assessment.depth_ok
            && since > Duration::from_secs_f64(self.config.depth_coach_interval_secs)
        {
            self.faults.depth += 1;
            Cue::DepthBad
        } else {
            return;
        };

        let line = cue.pick(&mut self.rng);
        out.guide(line, false);
        self.coach_lines = vec![line.to_string()];
        self.last_coach = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::metrics::fixtures::*;

    const FRAME: Duration = Duration::from_millis(33);

    struct Driver {
        session: WorkoutSession,
        now: Instant,
    }

    impl Driver {
        fn new(difficulty: Difficulty) -> Self {
            let now = Instant::now();
            Self {
                session: WorkoutSession::with_rng(
                    difficulty,
                    WorkoutConfig::default(),
                    now,
                    StdRng::seed_from_u64(42),
                ),
                now,
            }
        }

        fn step(&mut self, pose: Option<&PoseLandmarks>) -> StepOutcome {
            self.now += FRAME;
            self.session.step(self.now, pose, 100, 100)
        }

        fn run(&mut self, pose: &PoseLandmarks, frames: usize) -> Vec<StepOutcome> {
            (0..frames).map(|_| self.step(Some(pose))).collect()
        }

        /// Walks through T-pose, countdown and baseline collection.
        fn warm_up(&mut self) {
            self.run(&tpose(), 60);
            self.now += Duration::from_secs(4);
            self.step(Some(&standing()));
            self.run(&standing(), 45);
            assert!(matches!(self.session.phase, Phase::Active { .. }));
        }

        fn squat(&mut self, bottom_frames: usize) -> Vec<StepOutcome> {
            let mut all = self.run(&squatting(), bottom_frames);
            all.extend(self.run(&standing(), 20));
            all
        }
    }

    fn guides(outcomes: &[StepOutcome]) -> Vec<GuideRequest> {
        outcomes.iter().flat_map(|o| o.guides.clone()).collect()
    }

    #[test]
    fn missing_person_asks_to_step_in() {
        let mut driver = Driver::new(Difficulty::Normal);
        let out = driver.step(None);
        assert_eq!(out.guides, vec![GuideRequest::new(script::FIND_CENTER, false)]);
        assert_eq!(out.hud.banner.map(|b| b.text).as_deref(), Some(script::SEARCHING));
        assert!(out.telemetry.is_empty());
    }

    #[test]
    fn tpose_completion_starts_countdown() {
        let mut driver = Driver::new(Difficulty::Easy);
        let outcomes = driver.run(&tpose(), 60);
        let last = outcomes.last().unwrap();
        assert_eq!(last.guides[0], GuideRequest::new(script::TPOSE_DONE, true));
        assert!(Cue::StartCountdown.lines().contains(&last.guides[1].text.as_str()));
        assert!(matches!(driver.session.phase, Phase::Countdown { .. }));

        let progress: Vec<_> = guides(&outcomes[..59])
            .into_iter()
            .map(|g| g.text)
            .collect();
        assert_eq!(progress, vec![script::tpose_progress(33), script::tpose_progress(66)]);
    }

    #[test]
    fn countdown_shows_numbers_and_ignores_missing_person() {
        let mut driver = Driver::new(Difficulty::Easy);
        driver.run(&tpose(), 60);

        let out = driver.step(Some(&standing()));
        let banner = out.hud.banner.unwrap();
        assert_eq!(banner.text, "3");
        assert!(banner.large);
        assert_eq!(out.guides, vec![GuideRequest::new("3", true)]);

        assert!(driver.step(None).guides.is_empty());

        driver.now += Duration::from_millis(3_000);
        let out = driver.step(Some(&standing()));
        assert_eq!(out.hud.banner.unwrap().text, "START!");
        assert_eq!(out.guides, vec![GuideRequest::new(script::COUNTDOWN_GO, true)]);

        driver.now += Duration::from_secs(1);
        let out = driver.step(Some(&standing()));
        assert!(out.guides.is_empty());
        assert_eq!(driver.session.phase, Phase::Baseline);
    }

    #[test]
    fn baseline_reports_neutral_telemetry() {
        let mut driver = Driver::new(Difficulty::Normal);
        driver.run(&tpose(), 60);
        driver.now += Duration::from_secs(4);
        driver.step(Some(&standing()));

        let outcomes = driver.run(&standing(), 45);
        assert_eq!(
            outcomes[0].guides,
            vec![GuideRequest::new(script::BASELINE_START, true)]
        );
        assert_eq!(
            outcomes[0].telemetry,
            vec![
                Telemetry::Depth { data: 0.0 },
                Telemetry::Hold { data: 0.0 },
                Telemetry::Spine { is_good: true },
                Telemetry::Knee { is_good: true },
            ]
        );
        assert_eq!(
            outcomes[44].guides,
            vec![GuideRequest::new(script::BASELINE_DONE, true)]
        );
        match driver.session.phase {
            Phase::Active { baseline } => {
                assert!((baseline.vthigh - 20.0).abs() < 1e-3);
                assert!((baseline.torso - 20.0).abs() < 1e-3);
            }
            other => panic!("unexpected phase {other:?}"),
        }
    }

    #[test]
    fn easy_session_counts_reps_until_target() {
        let mut driver = Driver::new(Difficulty::Easy);
        driver.warm_up();

        let first = driver.squat(30);
        assert_eq!(driver.session.count(), 1);
        assert!(first.iter().any(|o| o.telemetry.contains(&Telemetry::Count)));
        assert!(
            guides(&first)
                .iter()
                .any(|g| Cue::Good.lines().contains(&g.text.as_str()))
        );

        let mut last = Vec::new();
        for _ in 0..4 {
            last = driver.squat(30);
        }
        assert!(driver.session.is_finished());
        let finale = last.iter().find(|o| o.finished).unwrap();
        let mission = finale.guides.last().unwrap();
        assert!(mission.force);
        assert!(Cue::MissionComplete.lines().contains(&mission.text.as_str()));

        let summary = driver.session.finish();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.attempts, 5);
        assert_eq!(summary.kcal, 4.0);
        assert!(driver.step(Some(&standing())).finished);
    }

    #[test]
    fn normal_session_requires_hold() {
        let mut driver = Driver::new(Difficulty::Normal);
        driver.warm_up();

        // too short a hold
        let quick = driver.squat(20);
        assert_eq!(driver.session.count(), 0);
        assert!(
            guides(&quick)
                .iter()
                .any(|g| Cue::HoldFail.lines().contains(&g.text.as_str()))
        );
        assert!(
            quick
                .iter()
                .any(|o| o.telemetry.iter().any(|t| matches!(t, Telemetry::Hold { .. })))
        );

        driver.squat(90);
        assert_eq!(driver.session.count(), 1);
        assert_eq!(driver.session.finish().attempts, 2);
    }

    #[test]
    fn knee_fault_is_coached_and_tallied() {
        let mut driver = Driver::new(Difficulty::Easy);
        driver.warm_up();
        driver.now += Duration::from_secs(5);

        let mut caving = squatting();
        caving.points[crate::types::PoseIndex::LeftKnee as usize].x += 0.12;
        let out = driver.step(Some(&caving));

        assert!(out.telemetry.contains(&Telemetry::Knee { is_good: false }));
        let line = &out.guides[0];
        assert!(!line.force);
        assert!(Cue::KneeBad.lines().contains(&line.text.as_str()));
        assert_eq!(out.hud.coach_lines, vec![line.text.clone()]);
        assert_eq!(driver.session.faults.knee, 1);

        // next line only after the coaching interval
        let out = driver.step(Some(&caving));
        assert!(out.guides.is_empty());
        assert_eq!(driver.session.faults.knee, 1);
    }

    #[test]
    fn spine_fault_is_coached_and_tallied() {
        let mut driver = Driver::new(Difficulty::Easy);
        driver.warm_up();
        driver.now += Duration::from_secs(5);

        let out = driver.step(Some(&body(58.0, 0.0, 60.0, 40.0)));

        assert!(out.telemetry.contains(&Telemetry::Spine { is_good: false }));
        assert!(Cue::SpineBad.lines().contains(&out.guides[0].text.as_str()));
        assert_eq!(driver.session.faults.back, 1);
        assert_eq!(driver.session.faults.knee, 0);
    }

    #[test]
    fn knee_fault_outranks_spine_fault() {
        let mut driver = Driver::new(Difficulty::Easy);
        driver.warm_up();
        driver.now += Duration::from_secs(5);

        let mut both = body(58.0, 0.0, 60.0, 40.0);
        both.points[crate::types::PoseIndex::LeftKnee as usize].x += 0.12;
        let out = driver.step(Some(&both));

        assert!(out.telemetry.contains(&Telemetry::Spine { is_good: false }));
        assert!(out.telemetry.contains(&Telemetry::Knee { is_good: false }));
        assert_eq!(out.guides.len(), 1);
        assert!(Cue::KneeBad.lines().contains(&out.guides[0].text.as_str()));
        assert_eq!(driver.session.faults.knee, 1);
        assert_eq!(driver.session.faults.back, 0);
    }

    #[test]
    fn shallow_hold_is_coached_after_six_seconds() {
        let mut driver = Driver::new(Difficulty::Easy);
        driver.warm_up();
        driver.squat(30);
        assert_eq!(driver.session.count(), 1);

        driver.run(&squatting(), 30);
        assert_eq!(driver.session.reps.state(), RepState::Down);
        let depth_faults = driver.session.faults.depth;

        // rising to a half squat: 4 to 6 seconds after the rep was counted
        driver.now += Duration::from_secs(3);
        let half = body(63.0, 0.0, 60.0, 30.0);
        let early = driver.run(&half, 10);
        assert!(guides(&early).is_empty());
        assert_eq!(driver.session.faults.depth, depth_faults);

        driver.now += Duration::from_secs(2);
        let out = driver.step(Some(&half));
        assert!(Cue::DepthBad.lines().contains(&out.guides[0].text.as_str()));
        assert_eq!(driver.session.faults.depth, depth_faults + 1);
        assert_eq!(driver.session.reps.state(), RepState::Down);
    }

    #[test]
    fn active_hud_shows_debug_state() {
        let mut driver = Driver::new(Difficulty::Normal);
        driver.warm_up();
        let out = driver.step(Some(&standing()));
        assert_eq!(out.hud.count, Some(0));
        let debug = out.hud.debug.unwrap();
        assert_eq!(debug.state, "UP");
        assert!(debug.back_ok);
        assert_eq!(out.hud.hold_remaining, None);
    }
}
