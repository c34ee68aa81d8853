use rand::{Rng, seq::SliceRandom};

pub const FIND_CENTER: &str = "회원님, 카메라 중앙에 서주세요!";
pub const SEARCHING: &str = "사람 찾는 중...";
pub const TPOSE_LOST: &str = "측정이 끊겼어요. 다시 T자를!";
pub const TPOSE_INSTRUCT: &str = "양팔을 벌려 T자를 만들어주세요.";
pub const TPOSE_NEEDED: &str = "T-포즈 필요";
pub const TPOSE_DONE: &str = "측정 완료! 잠시 후 시작합니다.";
pub const COUNTDOWN_GO: &str = "시작하세요!";
pub const BASELINE_START: &str = "서있는 기준값 측정 중... 잠시만요!";
pub const BASELINE_DONE: &str = "기준 설정 완료! 스쿼트를 시작하세요.";
pub const CAMERA_FAILED: &str = "카메라 연결 실패! PC 확인";

pub fn tpose_progress(percent: u32) -> String {
    format!("측정 중입니다... {percent}%")
}

pub fn tpose_counter(count: u32, target: u32) -> String {
    format!("측정 중... {count}/{target}")
}

pub fn baseline_progress(percent: u32) -> String {
    format!("서있는 기준값 측정 중... {percent}%")
}

pub fn hold_remaining(seconds: f64) -> String {
    format!("버티기: {seconds:.1}초")
}

/// Categories of spoken coach lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cue {
    Welcome,
    StartCountdown,
    KneeBad,
    SpineBad,
    DepthBad,
    Good,
    Fail,
    HoldFail,
    MissionComplete,
}

impl Cue {
    #[cfg(test)]
    pub const ALL: [Cue; 9] = [
        Cue::Welcome,
        Cue::StartCountdown,
        Cue::KneeBad,
        Cue::SpineBad,
        Cue::DepthBad,
        Cue::Good,
        Cue::Fail,
        Cue::HoldFail,
        Cue::MissionComplete,
    ];

    pub fn lines(self) -> &'static [&'static str] {
        match self {
            Cue::Welcome => &[
                "안녕하세요 회원님! 가볍게 몸 좀 풀어볼까요?",
                "반갑습니다! 오늘도 즐겁게 운동해봅시다.",
                "어서오세요! 카메라 앞에 편하게 서주세요.",
            ],
            Cue::StartCountdown => &[
                "자, 준비하시고... 시작합니다!",
                "카운트다운 들어갑니다. 준비!",
                "측정 끝! 바로 시작해볼게요.",
            ],
            Cue::KneeBad => &[
                "무릎이 안쪽으로 쏠려요. 살짝 벌려주세요.",
                "무릎을 발끝 방향으로! 그래야 안전해요.",
                "무릎 사이를 조금 더 넓혀볼까요?",
            ],
            Cue::SpineBad => &[
                "허리가 굽었어요. 가슴을 펴주세요.",
                "상체를 곧게 세워야 운동이 잘 돼요.",
                "시선은 정면! 땅을 보지 마세요.",
            ],
            Cue::DepthBad => &[
                "조금만 더 앉아볼까요?",
                "자극을 느끼려면 더 깊게!",
                "엉덩이를 조금만 더 내려보세요.",
            ],
            Cue::Good => &[
                "좋아요! 아주 완벽해요.",
                "나이스! 자세가 정말 좋습니다.",
                "훌륭해요! 그 느낌 기억하세요.",
                "좋습니다! 계속 그렇게 해주세요.",
            ],
            Cue::Fail => &[
                "아쉽네요, 조금 더 깊게 앉아보세요.",
                "자세가 무너졌어요. 다시 집중!",
                "천천히 다시 해봅시다.",
            ],
            Cue::HoldFail => &[
                "버티기 실패! 조금만 더 힘내세요.",
                "시간이 부족했어요. 꽉 버텨야 해요!",
                "허벅지에 힘 꽉!",
            ],
            Cue::MissionComplete => &[
                "미션 컴플리트! 정말 고생하셨습니다.",
                "목표 달성! 끝까지 해내셨군요. 최고예요!",
                "운동 종료! 아주 멋진 퍼포먼스였습니다.",
            ],
        }
    }

    pub fn pick<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        self.lines().choose(rng).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn every_cue_has_lines() {
        for cue in Cue::ALL {
            assert!(cue.lines().len() >= 3, "{cue:?}");
        }
        assert_eq!(Cue::Good.lines().len(), 4);
    }

    #[test]
    fn pick_stays_within_category() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let line = Cue::KneeBad.pick(&mut rng);
            assert!(Cue::KneeBad.lines().contains(&line));
        }
    }

    #[test]
    fn formatted_lines() {
        assert_eq!(tpose_progress(33), "측정 중입니다... 33%");
        assert_eq!(tpose_counter(12, 60), "측정 중... 12/60");
        assert_eq!(baseline_progress(100), "서있는 기준값 측정 중... 100%");
        assert_eq!(hold_remaining(1.26), "버티기: 1.3초");
        assert_eq!(hold_remaining(0.0), "버티기: 0.0초");
    }
}
