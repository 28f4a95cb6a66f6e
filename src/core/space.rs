use crate::config::Config;
use crate::game::lanes::LANE_COUNT;

/// External screen geometry supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSize {
    pub width: f32,
    pub height: f32,
}

impl ScreenSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub const fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.screen_width, cfg.screen_height)
    }

    #[inline(always)]
    pub fn lane_width(&self) -> f32 {
        self.width / LANE_COUNT as f32
    }

    /// Maps a horizontal touch coordinate to a lane, `None` when off-screen.
    pub fn lane_at(&self, x: f32) -> Option<usize> {
        if !x.is_finite() || x < 0.0 || x >= self.width {
            return None;
        }
        Some(((x / self.lane_width()) as usize).min(LANE_COUNT - 1))
    }

    pub fn lane_center_x(&self, lane: usize) -> f32 {
        (lane as f32 + 0.5) * self.lane_width()
    }
}

/// Vertical layout of the play area that tile positions are derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playfield {
    pub screen: ScreenSize,
    pub tile_height: f32,
    pub hit_line_y: f32,
}

impl Playfield {
    pub fn new(screen: ScreenSize, cfg: &Config) -> Self {
        Self {
            screen,
            tile_height: cfg.tile_height,
            hit_line_y: screen.height * cfg.hit_line_ratio,
        }
    }

    /// Seconds of travel per grid row at the given fall speed.
    #[inline(always)]
    pub fn grid_unit(&self, fall_speed: f32) -> f32 {
        self.tile_height / fall_speed.max(f32::EPSILON)
    }

    /// Seconds a tile needs to travel from fully above the screen to the hit line.
    #[inline(always)]
    pub fn entry_lead_seconds(&self, fall_speed: f32) -> f32 {
        self.hit_line_y / fall_speed.max(f32::EPSILON)
    }

    /// Bottom edge of a tile whose bottom reaches the hit line at `target_time`.
    #[inline(always)]
    pub fn bottom_y(&self, target_time: f32, now: f32, fall_speed: f32) -> f32 {
        (now - target_time).mul_add(fall_speed, self.hit_line_y)
    }
}
