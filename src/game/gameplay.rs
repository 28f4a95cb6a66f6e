use crate::config::Config;
use crate::core::input::{InputEvent, TouchId};
use crate::core::space::{Playfield, ScreenSize};
use crate::game::judgment::{self, JudgeGrade, Judgment};
use crate::game::lanes::LANE_COUNT;
use crate::game::scheduler::spawn_lookahead_tiles;
use crate::game::song::SongData;
use crate::game::tile::{Tile, TileState};
use crate::game::timing_windows::{HOLD_POINTS_MAX, NOTE_VELOCITY, tap_windows_ms};
use log::{debug, info, trace};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EndReason {
    Missed,
    WrongLane,
    Completed,
}

impl EndReason {
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Countdown,
    Playing,
    /// Fail animation running; the tile field is frozen.
    Failing,
    Ended(EndReason),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Failure {
    pub tile_id: u64,
    pub reason: EndReason,
    /// Song time of the fatal event.
    pub started_at: f32,
    /// Real seconds since the fatal event.
    pub elapsed: f32,
}

/// Side effects of one update, drained by the host after every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GameEvent {
    CountdownTick { remaining: u32 },
    /// `release_after_s` is set for plain taps; holds are released by `NoteOff`.
    NoteOn {
        pitch: u8,
        velocity: u8,
        release_after_s: Option<f32>,
    },
    NoteOff { pitch: u8 },
    Buzzer,
    RunEnded { reason: EndReason },
}

pub struct State {
    pub song: Arc<SongData>,
    pub config: Config,
    pub playfield: Playfield,
    pub phase: RunPhase,
    /// Negative during the countdown.
    pub song_time: f32,
    pub next_note_index: usize,
    pub lane_last_target: [f32; LANE_COUNT],
    /// Target of the most recently spawned tile in any lane.
    pub last_target: f32,
    pub last_spawned_lane: Option<usize>,
    pub loop_count: u32,
    pub loop_time_offset: f32,
    /// In spawn order.
    pub tiles: Vec<Tile>,

    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub perfect_count: u32,
    pub good_count: u32,
    pub ok_count: u32,
    pub tiles_completed: u32,
    pub speed_multiplier: f32,
    pub last_judgment: Option<Judgment>,
    pub failure: Option<Failure>,
    /// Real seconds spent outside the countdown.
    pub play_seconds: f32,

    pub(crate) next_tile_id: u64,
    last_countdown: Option<u32>,
    events: Vec<GameEvent>,
    pending_inputs: VecDeque<InputEvent>,

    log_timer: f32,
}

impl State {
    pub fn new(song: Arc<SongData>, config: Config, screen: ScreenSize) -> Self {
        let song_time = -config.countdown_seconds;
        let mut state = Self {
            playfield: Playfield::new(screen, &config),
            phase: if song_time < 0.0 {
                RunPhase::Countdown
            } else {
                RunPhase::Playing
            },
            song_time,
            next_note_index: 0,
            lane_last_target: [f32::NEG_INFINITY; LANE_COUNT],
            last_target: f32::NEG_INFINITY,
            last_spawned_lane: None,
            loop_count: 0,
            loop_time_offset: 0.0,
            tiles: Vec::new(),
            score: 0,
            combo: 0,
            max_combo: 0,
            perfect_count: 0,
            good_count: 0,
            ok_count: 0,
            tiles_completed: 0,
            speed_multiplier: 1.0,
            last_judgment: None,
            failure: None,
            play_seconds: 0.0,
            next_tile_id: 0,
            last_countdown: None,
            events: Vec::new(),
            pending_inputs: VecDeque::new(),
            log_timer: 0.0,
            song,
            config,
        };
        emit_countdown_tick(&mut state);

        let [perfect_ms, good_ms] = tap_windows_ms();
        info!(
            "Run start: '{}' ({} notes, {:.1} BPM, fall speed {:.0}/s, grid {:.3}s, windows {perfect_ms:.0}/{good_ms:.0}ms)",
            state.song.title,
            state.song.notes.len(),
            state.song.bpm,
            state.song.fall_speed,
            state.grid_unit()
        );
        state
    }

    /// Minimum spacing between two tiles in one lane, in song seconds.
    #[inline(always)]
    pub fn grid_unit(&self) -> f32 {
        self.playfield.grid_unit(self.song.fall_speed)
    }

    pub fn countdown_remaining(&self) -> u32 {
        if self.song_time < 0.0 {
            (-self.song_time).ceil() as u32
        } else {
            0
        }
    }

    pub const fn end_reason(&self) -> Option<EndReason> {
        match self.phase {
            RunPhase::Ended(reason) => Some(reason),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn is_ended(&self) -> bool {
        matches!(self.phase, RunPhase::Ended(_))
    }

    /// The only tile a new touch can interact with.
    pub fn first_falling(&self) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.state == TileState::Falling)
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, GameEvent> {
        self.events.drain(..)
    }

    fn target_speed_multiplier(&self) -> f32 {
        let cfg = &self.config;
        let steps = if cfg.speed_step_tiles == 0 {
            0
        } else {
            self.tiles_completed / cfg.speed_step_tiles
        };
        let raw = (steps as f32).mul_add(cfg.speed_step_bonus, 1.0)
            + self.loop_count as f32 * cfg.loop_speed_bonus;
        raw.min(cfg.max_speed_multiplier)
    }
}

pub fn queue_input(state: &mut State, event: InputEvent) {
    state.pending_inputs.push_back(event);
}

#[inline(always)]
fn refresh_speed_multiplier(state: &mut State) {
    // Never slows down within a run.
    state.speed_multiplier = state.speed_multiplier.max(state.target_speed_multiplier());
}

fn emit_countdown_tick(state: &mut State) {
    let remaining = state.countdown_remaining();
    if remaining > 0 && state.last_countdown != Some(remaining) {
        state.last_countdown = Some(remaining);
        state.events.push(GameEvent::CountdownTick { remaining });
    }
}

/// Combo, score and completion bookkeeping for one resolved tile.
fn award(state: &mut State, points: u32) {
    state.combo += 1;
    state.max_combo = state.max_combo.max(state.combo);
    let multiplier = judgment::combo_multiplier(state.combo);
    state.score += u64::from(points * multiplier);
    state.tiles_completed += 1;
    refresh_speed_multiplier(state);
}

fn end_run(state: &mut State, reason: EndReason) {
    if state.is_ended() {
        return;
    }
    state.phase = RunPhase::Ended(reason);
    state.pending_inputs.clear();
    state.events.push(GameEvent::RunEnded { reason });
    info!(
        "Run ended ({reason:?}) at {:.2}s: score {}, max combo {}, {} tiles, {} loops",
        state.song_time, state.score, state.max_combo, state.tiles_completed, state.loop_count
    );
}

fn begin_failure(state: &mut State, tile_index: usize, reason: EndReason) {
    let tile = &mut state.tiles[tile_index];
    tile.state = match reason {
        EndReason::Missed => TileState::Missed,
        _ => TileState::Failed,
    };
    let tile_id = tile.id;
    state.combo = 0;
    state.failure = Some(Failure {
        tile_id,
        reason,
        started_at: state.song_time,
        elapsed: 0.0,
    });
    state.events.push(GameEvent::Buzzer);
    info!("Tile {tile_id} failed ({reason:?}) at {:.3}s", state.song_time);
    match reason {
        EndReason::Missed => end_run(state, reason),
        _ => state.phase = RunPhase::Failing,
    }
}

fn complete_hold(state: &mut State, tile_index: usize, points: u32) {
    let tile = &mut state.tiles[tile_index];
    tile.state = TileState::HoldComplete;
    tile.released_at = Some(state.song_time);
    let pitch = tile.pitch;
    state.events.push(GameEvent::NoteOff { pitch });
    award(state, points);
}

/// Moves every tile, resolving misses and finished holds. Returns `false` once a miss ended the run.
fn update_tiles(state: &mut State) -> bool {
    let now = state.song_time;
    let fall_speed = state.song.fall_speed;
    let field = state.playfield;

    for i in 0..state.tiles.len() {
        let tile = &mut state.tiles[i];
        if tile.state == TileState::Failed {
            continue;
        }
        tile.update_position(&field, now, fall_speed);
        let missed = tile.state == TileState::Falling && tile.is_below_screen(&field, fall_speed);
        let hold_finished = matches!(tile.state, TileState::Holding { .. })
            && tile.hold_end_time.is_some_and(|end| now >= end);
        if missed {
            begin_failure(state, i, EndReason::Missed);
            return false;
        }
        if hold_finished {
            complete_hold(state, i, HOLD_POINTS_MAX);
        }
    }
    true
}

fn handle_touch_down(state: &mut State, lane: usize, y: f32, touch: TouchId) {
    if lane >= LANE_COUNT {
        trace!("Touch in invalid lane {lane} ignored");
        return;
    }
    let now = state.song_time;
    let fall_speed = state.song.fall_speed;
    let field = state.playfield;
    let Some(index) = state.tiles.iter().position(|t| t.state == TileState::Falling) else {
        trace!("Touch in lane {lane} with no falling tile ignored");
        return;
    };

    let tile = &mut state.tiles[index];
    if tile.is_above_screen() {
        trace!("Premature touch on tile {} ignored", tile.id);
        return;
    }
    if tile.lane != lane || !tile.contains_y(&field, fall_speed, y) {
        debug!(
            "Touch lane {lane} y {y:.0} missed tile {} (lane {}, y {:.0}..{:.0})",
            tile.id,
            tile.lane,
            tile.top_y(&field, fall_speed),
            tile.y
        );
        begin_failure(state, index, EndReason::WrongLane);
        return;
    }

    tile.tapped_at = Some(now);
    let pitch = tile.pitch;
    if tile.is_hold {
        tile.state = TileState::Holding { touch };
        state.events.push(GameEvent::NoteOn {
            pitch,
            velocity: NOTE_VELOCITY,
            release_after_s: None,
        });
        return;
    }

    tile.state = TileState::Tapped;
    let duration_s = tile.duration_s;
    let judged = Judgment::from_tap(now, tile.target_time);
    match judged.grade {
        JudgeGrade::Perfect => state.perfect_count += 1,
        JudgeGrade::Good => state.good_count += 1,
        JudgeGrade::Ok => state.ok_count += 1,
    }
    trace!("Tap {:?} ({:+.1}ms)", judged.grade, judged.time_error_ms());
    state.last_judgment = Some(judged);
    state.events.push(GameEvent::NoteOn {
        pitch,
        velocity: NOTE_VELOCITY,
        release_after_s: Some(duration_s),
    });
    award(state, judged.grade.points());
}

fn handle_touch_up(state: &mut State, touch: TouchId) {
    let Some(index) = state
        .tiles
        .iter()
        .position(|t| t.state == TileState::Holding { touch })
    else {
        trace!("Release of {touch:?} with no held tile ignored");
        return;
    };
    let tile = &state.tiles[index];
    let now = state.song_time;
    let tapped_at = tile.tapped_at.unwrap_or(tile.target_time);
    let length = tile
        .hold_end_time
        .map_or(0.0, |end| end - tile.target_time);
    let fraction = if length > 0.0 {
        ((now - tapped_at) / length).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let points = judgment::hold_points(fraction);
    trace!("Hold {} released at {:.0}% for {points} points", tile.id, fraction * 100.0);
    complete_hold(state, index, points);
}

fn process_inputs(state: &mut State) {
    while let Some(event) = state.pending_inputs.pop_front() {
        if state.phase != RunPhase::Playing {
            // The run failed on an earlier event this tick.
            state.pending_inputs.clear();
            return;
        }
        match event {
            InputEvent::TouchDown { lane, y, touch } => handle_touch_down(state, lane, y, touch),
            InputEvent::TouchUp { touch, .. } => handle_touch_up(state, touch),
        }
    }
}

fn prune_tiles(state: &mut State) {
    let field = state.playfield;
    let fall_speed = state.song.fall_speed;
    state
        .tiles
        .retain(|t| !(t.state.is_prunable() && t.is_below_screen(&field, fall_speed)));
}

fn check_loop(state: &mut State) {
    if state.next_note_index < state.song.notes.len()
        || state.tiles.iter().any(|t| t.state.is_active())
    {
        return;
    }
    let target = state.config.target_play_seconds;
    if target > 0.0 && state.song_time >= target {
        end_run(state, EndReason::Completed);
        return;
    }

    let latest = state
        .lane_last_target
        .iter()
        .copied()
        .filter(|t| t.is_finite())
        .reduce(f32::max)
        .unwrap_or(state.loop_time_offset);
    state.loop_time_offset = latest + state.grid_unit();
    state.next_note_index = 0;
    state.loop_count += 1;
    refresh_speed_multiplier(state);
    info!(
        "Loop {} starts at {:.2}s (speed x{:.2})",
        state.loop_count, state.loop_time_offset, state.speed_multiplier
    );
}

/// Advances the run by one frame of `delta_time` real seconds.
pub fn update(state: &mut State, delta_time: f32) {
    if state.is_ended() {
        state.pending_inputs.clear();
        return;
    }
    let dt = if delta_time.is_finite() {
        delta_time.clamp(0.0, state.config.max_delta_seconds)
    } else {
        0.0
    };

    if state.song_time < 0.0 {
        state.song_time += dt;
    } else {
        state.song_time += dt * state.speed_multiplier;
        state.play_seconds += dt;
    }

    if state.phase == RunPhase::Countdown {
        if state.song_time < 0.0 {
            emit_countdown_tick(state);
            state.pending_inputs.clear();
            return;
        }
        state.phase = RunPhase::Playing;
        debug!("Countdown finished.");
    }

    if state.phase == RunPhase::Failing {
        state.pending_inputs.clear();
        if let Some(failure) = state.failure.as_mut() {
            failure.elapsed += dt;
            if failure.elapsed >= state.config.fail_animation_seconds {
                let reason = failure.reason;
                end_run(state, reason);
            }
        }
        return;
    }

    if state.song.notes.is_empty() {
        end_run(state, EndReason::Completed);
        return;
    }

    spawn_lookahead_tiles(state);
    if !update_tiles(state) {
        return;
    }
    process_inputs(state);
    prune_tiles(state);
    check_loop(state);

    state.log_timer += dt;
    if state.log_timer >= 1.0 {
        debug!(
            "Time: {:.2}, Score: {}, Combo: {}, Loop: {}, Speed: x{:.2}, Active Tiles: {}",
            state.song_time,
            state.score,
            state.combo,
            state.loop_count,
            state.speed_multiplier,
            state.tiles.len()
        );
        state.log_timer -= 1.0;
    }
}
