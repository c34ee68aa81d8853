use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::{
    coach::{Difficulty, GuideRequest, WorkoutSession, script},
    config::Config,
    link::{GuideThrottle, HeadsetLink},
    pipeline::open_first_camera,
    protocol::{ControlMessage, Telemetry},
    types::{CoachStatus, Frame, OverlayCommand, OverlayFrame, OverlaySender, PoseFrame},
};

/// Upper bound on how long the frame loop waits before rechecking stop requests.
const FRAME_POLL: Duration = Duration::from_millis(100);

/// Owns the headset link and runs standby and workout loops on its thread.
pub struct Controller {
    config: Config,
    link: HeadsetLink,
    throttle: GuideThrottle,
    frame_tx: Sender<Frame>,
    pose_rx: Receiver<PoseFrame>,
    overlay: Option<OverlaySender>,
    command_rx: Receiver<OverlayCommand>,
}

impl Controller {
    pub fn new(
        config: Config,
        link: HeadsetLink,
        frame_tx: Sender<Frame>,
        pose_rx: Receiver<PoseFrame>,
        overlay: Option<OverlaySender>,
        command_rx: Receiver<OverlayCommand>,
    ) -> Self {
        Self {
            config,
            link,
            throttle: GuideThrottle::new(),
            frame_tx,
            pose_rx,
            overlay,
            command_rx,
        }
    }

    pub fn run(mut self) {
        log::info!(
            "waiting for headset start signal on {} (headset {})",
            self.config.network.listen_addr,
            self.link.headset_addr()
        );
        self.publish_status(CoachStatus::Standby);

        loop {
            self.standby_once();
        }
    }

    /// One standby poll; runs a workout if the headset asked for one.
    fn standby_once(&mut self) {
        // stop presses while idle have nothing to stop
        while self.command_rx.try_recv().is_ok() {}

        match self.link.wait_control(self.config.network.standby_poll()) {
            Some(ControlMessage::Start { difficulty }) => {
                let difficulty = Difficulty::from_label(difficulty.as_deref());
                log::info!("start signal received: {} mode", difficulty.label());
                self.run_workout(difficulty);
                log::info!("back to standby");
                self.publish_status(CoachStatus::Standby);
            }
            Some(ControlMessage::Stop) => log::debug!("stop received while idle"),
            None => {}
        }
    }

    fn run_workout(&mut self, difficulty: Difficulty) {
        let mut session = WorkoutSession::new(
            difficulty,
            self.config.workout.clone(),
            Instant::now(),
        );
        self.publish_status(CoachStatus::Workout {
            difficulty: difficulty.label().to_string(),
        });

        let welcome = session.welcome();
        self.speak(welcome, Instant::now());

        while self.pose_rx.try_recv().is_ok() {}
        let camera = match open_first_camera(&self.config.camera, self.frame_tx.clone()) {
            Ok(camera) => camera,
            Err(err) => {
                log::error!("{err:#}");
                self.announce(script::CAMERA_FAILED, Instant::now());
                return;
            }
        };
        log::info!(
            "{} workout running on camera {}",
            session.difficulty().label(),
            camera.index()
        );

        let stall_timeout = self.config.camera.stall_timeout();
        let mut last_frame = Instant::now();

        loop {
            if self.stop_requested() {
                break;
            }

            let pose_frame = match self.pose_rx.recv_timeout(FRAME_POLL) {
                Ok(pose_frame) => pose_frame,
                Err(RecvTimeoutError::Timeout) => {
                    if last_frame.elapsed() > stall_timeout {
                        log::error!("no camera frames for {stall_timeout:?}, ending workout");
                        break;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::error!("pose worker stopped, ending workout");
                    break;
                }
            };
            last_frame = Instant::now();

            if self.process_frame(&mut session, pose_frame) {
                log::info!("target reached, ending workout");
                break;
            }
        }

        camera.stop();
        self.finish_workout(&mut session);
    }

    /// Feeds one frame to the session on the capture clock; true once the
    /// session has ended.
    fn process_frame(&mut self, session: &mut WorkoutSession, pose_frame: PoseFrame) -> bool {
        let PoseFrame { frame, pose } = pose_frame;
        let now = frame.timestamp;
        if let Some(pose) = &pose {
            log::trace!("pose confidence {:.2}", pose.confidence);
        }
        let outcome = session.step(now, pose.as_ref(), frame.width, frame.height);

        for message in &outcome.telemetry {
            self.link.send(message);
        }
        for guide in outcome.guides {
            self.speak(guide, now);
        }

        let landmarks = pose
            .as_ref()
            .map(|p| p.to_pixels(frame.width, frame.height));
        self.publish_frame(OverlayFrame {
            frame,
            landmarks,
            hud: outcome.hud,
        });

        outcome.finished
    }

    fn finish_workout(&mut self, session: &mut WorkoutSession) {
        log::info!("workout ended after {} reps", session.count());
        let summary = session.finish();
        log::info!("sending result to headset");
        self.link.send(&summary.to_telemetry());
        log::info!("workout report\n{summary}");
    }

    fn stop_requested(&mut self) -> bool {
        match self.link.poll_control() {
            Some(ControlMessage::Stop) => {
                log::info!("stop signal received from headset");
                return true;
            }
            Some(ControlMessage::Start { .. }) => {
                log::warn!("start signal ignored, a workout is already running");
            }
            None => {}
        }

        if let Ok(OverlayCommand::StopWorkout) = self.command_rx.try_recv() {
            log::info!("workout stopped from overlay");
            return true;
        }
        false
    }

    /// Sends a coach line to the headset if the throttle admits it.
    fn speak(&mut self, guide: GuideRequest, now: Instant) -> bool {
        if !self.throttle.admit(&guide.text, guide.force, now) {
            return false;
        }
        self.say(guide.text);
        true
    }

    /// Sends a line regardless of the cooldown.
    fn announce(&mut self, text: &str, now: Instant) {
        self.throttle.record(text, now);
        self.say(text.to_string());
    }

    fn say(&self, text: String) {
        log::info!("AI 트레이너: {text}");
        self.link.send(&Telemetry::Msg { data: text });
    }

    fn publish_status(&self, status: CoachStatus) {
        if let Some(overlay) = &self.overlay {
            overlay.status(status);
        }
    }

    fn publish_frame(&self, frame: OverlayFrame) {
        if let Some(overlay) = &self.overlay {
            overlay.frame(frame);
        }
    }
}
