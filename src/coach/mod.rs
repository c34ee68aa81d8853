//! Squat rule engine: calibration, depth tracking, rep counting and
//! spoken coaching, independent of camera and network I/O.

pub mod calibration;
pub mod metrics;
pub mod rep_counter;
pub mod report;
pub mod script;
pub mod session;

pub use session::{GuideRequest, WorkoutSession};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    /// Missing or unrecognised labels fall back to `Normal`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some(l) if l.eq_ignore_ascii_case("easy") => Difficulty::Easy,
            Some(l) if l.eq_ignore_ascii_case("hard") => Difficulty::Hard,
            Some(l) if l.eq_ignore_ascii_case("normal") => Difficulty::Normal,
            Some(other) => {
                log::warn!("unknown difficulty {other:?}, using Normal");
                Difficulty::Normal
            }
            None => Difficulty::Normal,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn target_reps(&self) -> u32 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Normal => 10,
            Difficulty::Hard => 20,
        }
    }

    /// Seconds the bottom position must be held; zero disables holding.
    pub fn hold_secs(&self) -> f64 {
        match self {
            Difficulty::Easy => 0.0,
            Difficulty::Normal => 2.0,
            Difficulty::Hard => 6.0,
        }
    }
}
