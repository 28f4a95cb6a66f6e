use crate::core::input::TouchId;
use crate::core::space::Playfield;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileState {
    Falling,
    Holding { touch: TouchId },
    Tapped,
    Missed,
    Failed,
    HoldComplete,
}

impl TileState {
    /// Resolved states that are removed once they scroll out below the screen.
    #[inline(always)]
    pub const fn is_prunable(self) -> bool {
        matches!(self, Self::Tapped | Self::Missed | Self::HoldComplete)
    }

    /// Still waiting on the player: blocks the loop from restarting.
    #[inline(always)]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Falling | Self::Holding { .. })
    }
}

#[derive(Clone, Debug)]
pub struct Tile {
    /// Unique within a run, in spawn order.
    pub id: u64,
    pub note_index: usize,
    pub pitch: u8,
    pub lane: usize,
    /// Song time at which the tile's bottom edge meets the hit line.
    pub target_time: f32,
    pub duration_s: f32,
    /// Bottom edge, refreshed every tick.
    pub y: f32,
    pub state: TileState,
    pub tapped_at: Option<f32>,
    pub released_at: Option<f32>,
    pub is_hold: bool,
    pub hold_end_time: Option<f32>,
}

impl Tile {
    /// Vertical size in screen units. Holds stretch with their length but never shrink below a tap.
    pub fn extent(&self, tile_height: f32, fall_speed: f32) -> f32 {
        match self.hold_end_time {
            Some(end) if self.is_hold => ((end - self.target_time) * fall_speed).max(tile_height),
            _ => tile_height,
        }
    }

    #[inline(always)]
    pub fn top_y(&self, field: &Playfield, fall_speed: f32) -> f32 {
        self.y - self.extent(field.tile_height, fall_speed)
    }

    pub fn update_position(&mut self, field: &Playfield, now: f32, fall_speed: f32) {
        self.y = field.bottom_y(self.target_time, now, fall_speed);
    }

    /// Entirely below the bottom edge of the screen.
    #[inline(always)]
    pub fn is_below_screen(&self, field: &Playfield, fall_speed: f32) -> bool {
        self.top_y(field, fall_speed) > field.screen.height
    }

    /// Bottom edge has not yet crossed the top of the screen.
    #[inline(always)]
    pub fn is_above_screen(&self) -> bool {
        self.y < 0.0
    }

    pub fn contains_y(&self, field: &Playfield, fall_speed: f32, y: f32) -> bool {
        y >= self.top_y(field, fall_speed) && y <= self.y
    }
}
