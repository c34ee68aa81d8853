use std::fmt;

use crate::protocol::Telemetry;

const NO_ATTEMPTS: &str = "인식된 동작이 없었습니다.";
const NO_SUCCESS: &str = "성공 횟수가 없네요. 조금 더 연습해볼까요?";
const EXCELLENT: &str = "완벽합니다! 아주 잘하셨어요. 👍";
const GOOD: &str = "잘하셨어요! 꾸준함이 답입니다.";
const KEEP_GOING: &str = "고생하셨어요! 자세에 조금 더 신경써보세요.";

/// Coaching interventions per fault during one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultTally {
    pub knee: u32,
    pub back: u32,
    pub depth: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub count: u32,
    pub attempts: u32,
    pub average_score: f64,
    pub kcal: f64,
    pub feedback: String,
}

impl SessionSummary {
    pub fn to_telemetry(&self) -> Telemetry {
        Telemetry::Result {
            count: self.count,
            score: self.average_score,
            kcal: self.kcal,
            feedback: self.feedback.clone(),
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(30);
        writeln!(f, "{rule}")?;
        writeln!(f, "운동 종료 리포트")?;
        writeln!(f, "- 총 횟수: {}", self.count)?;
        writeln!(f, "{}", self.feedback)?;
        write!(f, "{rule}")
    }
}

pub fn summarize(
    count: u32,
    attempts: u32,
    scores: &[u32],
    faults: FaultTally,
    kcal_per_rep: f64,
) -> SessionSummary {
    let average_score = if scores.is_empty() {
        0.0
    } else {
        let total: u32 = scores.iter().sum();
        round_to(total as f64 / scores.len() as f64, 1)
    };

    SessionSummary {
        count,
        attempts,
        average_score,
        kcal: round_to(count as f64 * kcal_per_rep, 2),
        feedback: feedback(attempts, count, average_score, faults),
    }
}

fn feedback(attempts: u32, count: u32, average_score: f64, faults: FaultTally) -> String {
    if attempts == 0 {
        return NO_ATTEMPTS.to_string();
    }

    let success_rate = count as f64 / attempts as f64;
    let headline = if count == 0 {
        NO_SUCCESS
    } else if average_score >= 4.0 && success_rate > 0.8 {
        EXCELLENT
    } else if average_score >= 3.0 {
        GOOD
    } else {
        KEEP_GOING
    };

    let mut lines = vec![headline.to_string()];
    if faults.knee > 0 {
        lines.push(format!("- 무릎 쏠림이 {}회 있었어요.", faults.knee));
    }
    if faults.back > 0 {
        lines.push(format!("- 허리가 {}회 굽어졌어요.", faults.back));
    }
    if faults.depth > 0 {
        lines.push(format!("- 깊이가 부족한 횟수가 {}회 있었어요.", faults.depth));
    }
    lines.join("\n")
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
