use crate::game::timing_windows::{
    COMBO_BUCKET, GOOD_WINDOW_S, HOLD_POINTS_MAX, HOLD_POINTS_MIN, MAX_COMBO_MULTIPLIER,
    PERFECT_WINDOW_S,
};
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum JudgeGrade {
    Perfect,
    Good,
    Ok,
}

impl JudgeGrade {
    pub const fn points(self) -> u32 {
        match self {
            Self::Perfect => 3,
            Self::Good => 2,
            Self::Ok => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Judgment {
    /// Signed: negative means the tap came early.
    pub time_error_s: f32,
    pub grade: JudgeGrade,
}

impl Judgment {
    pub fn from_tap(tap_time: f32, target_time: f32) -> Self {
        let time_error_s = tap_time - target_time;
        Self {
            time_error_s,
            grade: classify_tap(time_error_s),
        }
    }

    #[inline(always)]
    pub fn time_error_ms(&self) -> f32 {
        self.time_error_s * 1000.0
    }
}

#[inline(always)]
pub fn classify_tap(time_error_s: f32) -> JudgeGrade {
    let err = time_error_s.abs();
    if err < PERFECT_WINDOW_S {
        JudgeGrade::Perfect
    } else if err < GOOD_WINDOW_S {
        JudgeGrade::Good
    } else {
        JudgeGrade::Ok
    }
}

/// Score multiplier for a combo that already includes the current hit.
#[inline(always)]
pub const fn combo_multiplier(combo: u32) -> u32 {
    let m = combo / COMBO_BUCKET + 1;
    if m > MAX_COMBO_MULTIPLIER {
        MAX_COMBO_MULTIPLIER
    } else {
        m
    }
}

/// Points for a hold released after `held_fraction` of its length.
pub fn hold_points(held_fraction: f32) -> u32 {
    let f = if held_fraction.is_finite() {
        held_fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let min = HOLD_POINTS_MIN as f32;
    let max = HOLD_POINTS_MAX as f32;
    (max - min).mul_add(f, min).round() as u32
}

#[cfg(test)]
mod tests {
    use super::{JudgeGrade, Judgment, classify_tap, combo_multiplier, hold_points};

    #[test]
    fn tap_grade_boundaries() {
        assert_eq!(classify_tap(0.0), JudgeGrade::Perfect);
        assert_eq!(classify_tap(0.079), JudgeGrade::Perfect);
        assert_eq!(classify_tap(-0.079), JudgeGrade::Perfect);
        assert_eq!(classify_tap(0.08), JudgeGrade::Good);
        assert_eq!(classify_tap(0.189), JudgeGrade::Good);
        assert_eq!(classify_tap(-0.189), JudgeGrade::Good);
        assert_eq!(classify_tap(0.19), JudgeGrade::Ok);
        assert_eq!(classify_tap(2.0), JudgeGrade::Ok);
        assert_eq!(JudgeGrade::Perfect.points(), 3);
        assert_eq!(JudgeGrade::Good.points(), 2);
        assert_eq!(JudgeGrade::Ok.points(), 1);
    }

    #[test]
    fn judgment_keeps_signed_error() {
        let j = Judgment::from_tap(9.9, 10.0);
        assert_eq!(j.grade, JudgeGrade::Good);
        assert!((j.time_error_ms() + 100.0).abs() <= 1e-2, "got {}", j.time_error_ms());
    }

    #[test]
    fn combo_multiplier_buckets_and_caps() {
        assert_eq!(combo_multiplier(1), 1);
        assert_eq!(combo_multiplier(9), 1);
        assert_eq!(combo_multiplier(10), 2);
        assert_eq!(combo_multiplier(12), 2);
        assert_eq!(JudgeGrade::Perfect.points() * combo_multiplier(12), 6);
        assert_eq!(combo_multiplier(40), 5);
        assert_eq!(combo_multiplier(1000), 5);
    }

    #[test]
    fn hold_points_interpolate_and_round() {
        assert_eq!(hold_points(0.0), 1);
        assert_eq!(hold_points(0.5), 3); // 2.5 rounds away from zero
        assert_eq!(hold_points(0.3), 2);
        assert_eq!(hold_points(1.0), 4);
        assert_eq!(hold_points(7.0), 4);
        assert_eq!(hold_points(-1.0), 1);
        assert_eq!(hold_points(f32::NAN), 1);
    }
}
