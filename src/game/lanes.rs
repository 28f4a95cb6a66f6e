//! Seeded lane distribution.
//!
//! Lanes are drawn from a weighted distribution that discourages repeating the
//! last few lanes. The generator is seeded from the notes themselves, so a given
//! score always produces the same layout while different scores differ.

use crate::game::song::NoteEvent;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

pub const LANE_COUNT: usize = 4;

const SEED_NOTE_LIMIT: usize = 64;
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// Weight of the most recent, second and third most recent lane.
const RECENT_LANE_WEIGHTS: [f32; 3] = [0.05, 0.2, 0.5];

#[inline(always)]
fn fnv_mix(hash: u64, value: u64) -> u64 {
    (hash ^ value).wrapping_mul(FNV_PRIME)
}

/// FNV-1a over (pitch, start-beat bits) of the first notes.
pub fn lane_seed(notes: &[NoteEvent]) -> u64 {
    notes
        .iter()
        .take(SEED_NOTE_LIMIT)
        .fold(FNV_OFFSET_BASIS, |hash, note| {
            let hash = fnv_mix(hash, u64::from(note.pitch));
            fnv_mix(hash, u64::from(note.start_beat.to_bits()))
        })
}

#[inline(always)]
fn lane_weight(lane: usize, recent: &[usize]) -> f32 {
    recent
        .iter()
        .position(|&l| l == lane)
        .map_or(1.0, |pos| RECENT_LANE_WEIGHTS[pos])
}

fn pick_lane<R: Rng>(rng: &mut R, recent: &[usize]) -> usize {
    let weights: [f32; LANE_COUNT] = std::array::from_fn(|lane| lane_weight(lane, recent));
    let total: f32 = weights.iter().sum();
    let draw = rng.random::<f32>() * total;
    let mut cumulative = 0.0;
    for (lane, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if draw < cumulative {
            return lane;
        }
    }
    // Rounding can leave the draw on the upper edge.
    LANE_COUNT - 1
}

type RecentLanes = SmallVec<[usize; RECENT_LANE_WEIGHTS.len()]>;

/// Most recent first, never longer than the weight table.
#[inline(always)]
fn remember_lane(recent: &mut RecentLanes, lane: usize) {
    recent.truncate(RECENT_LANE_WEIGHTS.len() - 1);
    recent.insert(0, lane);
}

/// Overwrites every note's lane. Deterministic for a given note list.
pub fn assign_lanes(notes: &mut [NoteEvent]) {
    let mut rng = SmallRng::seed_from_u64(lane_seed(notes));
    let mut recent = RecentLanes::new();
    for note in notes.iter_mut() {
        let lane = pick_lane(&mut rng, &recent);
        note.lane = lane;
        remember_lane(&mut recent, lane);
    }
}

#[inline(always)]
pub const fn opposite_lane(lane: usize) -> usize {
    (lane + 2) % LANE_COUNT
}

/// Moves notes that would land in a lane still occupied by a hold to the opposite lane.
pub fn resolve_hold_conflicts(notes: &mut [NoteEvent], hold_threshold_beats: f32) {
    for i in 0..notes.len() {
        let hold = notes[i];
        if hold.duration_beats <= hold_threshold_beats {
            continue;
        }
        let hold_end = hold.end_beat();
        for later in notes[i + 1..].iter_mut() {
            if later.start_beat >= hold_end {
                break;
            }
            if later.lane == hold.lane {
                later.lane = opposite_lane(later.lane);
            }
        }
    }
}
