// Shared timing and scoring constants so gameplay and presentation agree.

// Tap windows in seconds, compared strictly against the absolute error.
pub const PERFECT_WINDOW_S: f32 = 0.08;
pub const GOOD_WINDOW_S: f32 = 0.19;

// Hold points scale from MIN (released at once) to MAX (held to the end).
pub const HOLD_POINTS_MIN: u32 = 1;
pub const HOLD_POINTS_MAX: u32 = 4;

// Every COMBO_BUCKET consecutive hits raise the multiplier by one.
pub const COMBO_BUCKET: u32 = 10;
pub const MAX_COMBO_MULTIPLIER: u32 = 5;

/// Note-on velocity for every tile sound.
pub const NOTE_VELOCITY: u8 = 100;

#[inline(always)]
pub fn tap_windows_ms() -> [f32; 2] {
    [PERFECT_WINDOW_S * 1000.0, GOOD_WINDOW_S * 1000.0]
}
