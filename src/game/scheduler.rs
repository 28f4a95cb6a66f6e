//! Look-ahead tile spawning.
//!
//! Target times live on a global grid of `tile_height / fall_speed` seconds, so
//! tiles sharing a lane can never overlap on screen. Each target is pushed late
//! as far as needed: past the previous tile in its lane, never before the
//! previously spawned tile, and far enough out that the tile starts fully above
//! the screen.

use crate::game::gameplay::State;
use crate::game::tile::{Tile, TileState};
use log::trace;
use std::sync::Arc;

/// Smallest multiple of `grid` that is not below `time`.
#[inline(always)]
pub fn snap_up(time: f32, grid: f32) -> f32 {
    if !time.is_finite() || grid <= 0.0 {
        return time;
    }
    let mut slot = (time / grid).ceil();
    if slot * grid < time {
        slot += 1.0;
    }
    slot * grid
}

/// Grid-aligned target no earlier than the note, one grid after the lane's
/// previous tile, no earlier than the previously spawned tile and no earlier
/// than `entry_min`.
///
/// `lane_last_target` and `previous_target` are targets this function produced,
/// so they already sit on the grid and are advanced by whole slots.
pub fn schedule_target(
    musical_time: f32,
    lane_last_target: f32,
    previous_target: f32,
    grid: f32,
    entry_min: f32,
) -> f32 {
    let lane_next = ((lane_last_target / grid).round() + 1.0) * grid;
    snap_up(musical_time, grid)
        .max(snap_up(entry_min, grid))
        .max(lane_next)
        .max(previous_target)
}

/// Turns every note that falls inside the look-ahead horizon into a falling tile.
pub fn spawn_lookahead_tiles(state: &mut State) {
    let song = Arc::clone(&state.song);
    let seconds_per_beat = song.seconds_per_beat();
    let fall_speed = song.fall_speed;
    let grid = state.grid_unit();
    let now = state.song_time;
    let horizon = now + state.config.look_ahead_seconds;
    let entry_min = now + state.playfield.entry_lead_seconds(fall_speed);

    while let Some(note) = song.notes.get(state.next_note_index) {
        let musical = note.start_beat.mul_add(seconds_per_beat, state.loop_time_offset);
        if musical > horizon {
            break;
        }
        let lane = note.lane;
        let target_time = schedule_target(
            musical,
            state.lane_last_target[lane],
            state.last_target,
            grid,
            entry_min,
        );
        let duration_s = note.duration_beats * seconds_per_beat;
        let is_hold = note.duration_beats > state.config.hold_threshold_beats;

        let mut tile = Tile {
            id: state.next_tile_id,
            note_index: state.next_note_index,
            pitch: note.pitch,
            lane,
            target_time,
            duration_s,
            y: 0.0,
            state: TileState::Falling,
            tapped_at: None,
            released_at: None,
            is_hold,
            hold_end_time: is_hold.then_some(target_time + duration_s),
        };
        tile.update_position(&state.playfield, now, fall_speed);
        trace!(
            "Spawned tile {} (note {}) lane {lane} musical {musical:.3}s -> target {target_time:.3}s",
            tile.id,
            tile.note_index
        );

        state.tiles.push(tile);
        state.lane_last_target[lane] = target_time;
        state.last_target = target_time;
        state.last_spawned_lane = Some(lane);
        state.next_tile_id += 1;
        state.next_note_index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{schedule_target, snap_up, spawn_lookahead_tiles};
    use crate::config::Config;
    use crate::core::space::ScreenSize;
    use crate::game::gameplay::State;
    use crate::game::lanes::LANE_COUNT;
    use crate::game::song::{NoteEvent, SongData};
    use std::sync::Arc;

    #[test]
    fn snaps_up_to_grid() {
        assert!((snap_up(0.6, 0.5) - 1.0).abs() <= 1e-6);
        assert!((snap_up(1.0, 0.5) - 1.0).abs() <= 1e-6);
        assert!((snap_up(-0.3, 0.5) - 0.0).abs() <= 1e-6);
    }

    #[test]
    fn snap_never_lands_below_its_input() {
        let grid = 0.468_75;
        for i in 0..2000 {
            let time = i as f32 * 0.013_7 + 0.000_01;
            let snapped = snap_up(time, grid);
            assert!(snapped >= time, "{time} snapped down to {snapped}");
            assert!(snapped - time < grid * 1.001, "{time} snapped past one grid to {snapped}");
        }
        assert!(snap_up(1.000_01, 0.5) >= 1.000_01);
    }

    #[test]
    fn target_respects_lane_spacing_and_entry() {
        let grid = 0.5;
        let none = f32::NEG_INFINITY;
        assert!((schedule_target(2.1, none, none, grid, 0.0) - 2.5).abs() <= 1e-6);
        assert!((schedule_target(2.1, 2.5, none, grid, 0.0) - 3.0).abs() <= 1e-6);
        assert!((schedule_target(2.1, none, none, grid, 4.2) - 4.5).abs() <= 1e-6);
        // A tile in another lane pushed back by its grid holds this one back too.
        assert!((schedule_target(2.1, none, 4.0, grid, 0.0) - 4.0).abs() <= 1e-6);
    }

    #[test]
    fn targets_never_decrease_in_spawn_order() {
        let mut cfg = Config::default();
        cfg.countdown_seconds = 0.0;
        // Three quick notes crowd one lane; the fourth, in another lane, comes just after.
        let notes = [4.0, 4.1, 4.2, 4.3]
            .iter()
            .enumerate()
            .map(|(i, &seconds)| NoteEvent::new(60 + i as u8, seconds * 2.0, 0.1))
            .collect();
        let mut song = SongData::from_notes(3, "crowded", "", 120.0, notes, &cfg);
        song.fall_speed = 640.0;
        for (note, lane) in song.notes.iter_mut().zip([0, 0, 0, 1]) {
            note.lane = lane;
        }
        let mut state = State::new(Arc::new(song), cfg, ScreenSize::from_config(&cfg));
        state.song_time = 1.0;
        spawn_lookahead_tiles(&mut state);
        let targets: Vec<f32> = state.tiles.iter().map(|t| t.target_time).collect();
        assert_eq!(targets.len(), 4);
        assert!((targets[2] - 5.0).abs() <= 1e-4, "lane 0 pushed back: {targets:?}");
        for w in targets.windows(2) {
            assert!(w[1] >= w[0], "out of order: {targets:?}");
        }
    }

    #[test]
    fn same_lane_targets_never_overlap() {
        let mut cfg = Config::default();
        cfg.countdown_seconds = 0.0;
        // Dense, irregular phrase: many notes share lanes within one grid unit.
        let notes: Vec<NoteEvent> = (0..120)
            .map(|i| {
                let jitter = [0.0, 0.13, 0.31, 0.07][i % 4];
                NoteEvent::new(50 + (i % 30) as u8, i as f32 * 0.37 + jitter, 0.25)
            })
            .collect();
        let song = Arc::new(SongData::from_notes(7, "dense", "", 140.0, notes, &cfg));
        let mut state = State::new(song, cfg, ScreenSize::from_config(&cfg));
        // Push the clock far enough that every note is inside the horizon.
        state.song_time = 1000.0;
        spawn_lookahead_tiles(&mut state);
        assert_eq!(state.tiles.len(), 120);
        for w in state.tiles.windows(2) {
            assert!(w[1].target_time >= w[0].target_time, "spawn order is arrival order");
        }

        let grid = state.grid_unit();
        let seconds_per_beat = state.song.seconds_per_beat();
        for lane in 0..LANE_COUNT {
            let targets: Vec<f32> = state
                .tiles
                .iter()
                .filter(|t| t.lane == lane)
                .map(|t| t.target_time)
                .collect();
            for w in targets.windows(2) {
                assert!(
                    w[1] - w[0] >= grid * (1.0 - 1e-3),
                    "lane {lane}: {} then {} with grid {grid}",
                    w[0],
                    w[1]
                );
            }
        }
        for tile in &state.tiles {
            let note = state.song.notes[tile.note_index];
            assert!(tile.target_time >= note.start_beat * seconds_per_beat);
            let on_grid = tile.target_time / grid;
            assert!((on_grid - on_grid.round()).abs() <= 1e-2, "off grid: {}", tile.target_time);
        }
    }

    #[test]
    fn spawns_only_inside_lookahead() {
        let mut cfg = Config::default();
        cfg.countdown_seconds = 0.0;
        let notes = (0..10).map(|i| NoteEvent::new(60, 8.0 + i as f32, 1.0)).collect();
        let song = Arc::new(SongData::from_notes(1, "t", "", 120.0, notes, &cfg));
        let mut state = State::new(song, cfg, ScreenSize::from_config(&cfg));
        spawn_lookahead_tiles(&mut state);
        // Musical times 4.0, 4.5, ...; only the first fits in a 4s horizon at t = 0.
        assert_eq!(state.tiles.len(), 1);
        assert_eq!(state.next_note_index, 1);
        assert!(state.tiles[0].y <= 0.0, "tiles spawn above the screen");
    }
}
