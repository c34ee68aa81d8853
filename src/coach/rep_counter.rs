use super::metrics::Assessment;

const HOLD_EPSILON: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepState {
    Up,
    Down,
}

impl RepState {
    pub fn label(&self) -> &'static str {
        match self {
            RepState::Up => "UP",
            RepState::Down => "DOWN",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepResult {
    pub score: u32,
    pub success: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RepStep {
    pub started: bool,
    /// Seconds left to hold, reported every frame while down
    pub hold_remaining: Option<f64>,
    pub completed: Option<RepResult>,
}

#[derive(Clone, Debug)]
pub struct RepCounter {
    state: RepState,
    hold_target: f64,
    depth_up: f64,
    held: f64,
    hold_success: bool,
    count: u32,
    attempts: u32,
    scores: Vec<u32>,
}

impl RepCounter {
    pub fn new(hold_target: f64, depth_up: f64) -> Self {
        Self {
            state: RepState::Up,
            hold_target,
            depth_up,
            held: 0.0,
            hold_success: false,
            count: 0,
            attempts: 0,
            scores: Vec::new(),
        }
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn scores(&self) -> &[u32] {
        &self.scores
    }

    /// Returns to UP without touching the tallies.
    pub fn reset(&mut self) {
        self.state = RepState::Up;
        self.held = 0.0;
        self.hold_success = false;
    }

    pub fn hold_remaining(&self) -> Option<f64> {
        (self.state == RepState::Down && self.hold_target > 0.0)
            .then(|| (self.hold_target - self.held).max(0.0))
    }

    pub fn update(&mut self, assessment: &Assessment, dt: f64) -> RepStep {
        let mut step = RepStep::default();

        match self.state {
            RepState::Up => {
                if assessment.depth_ok {
                    self.attempts += 1;
                    self.state = RepState::Down;
                    self.held = 0.0;
                    self.hold_success = false;
                    step.started = true;
                }
            }
            RepState::Down => {
                if self.hold_target > 0.0 {
                    if assessment.all_ok() {
                        self.held += dt;
                    }
                    step.hold_remaining = Some((self.hold_target - self.held).max(0.0));
                    if self.held >= self.hold_target - HOLD_EPSILON {
                        self.hold_success = true;
                    }
                } else {
                    self.hold_success = true;
                }

                if assessment.depth < self.depth_up {
                    let score = 1
                        + if self.hold_success { 2 } else { 0 }
                        + u32::from(assessment.knee_ok)
                        + u32::from(assessment.back_ok);
                    self.scores.push(score);
                    if self.hold_success {
                        self.count += 1;
                    }
                    step.completed = Some(RepResult {
                        score,
                        success: self.hold_success,
                    });
                    self.state = RepState::Up;
                    self.held = 0.0;
                }
            }
        }

        step
    }
}
