use crate::config::Config;
use crate::game::builtin::BuiltInScore;
use crate::game::lanes;
use crate::game::parsing::{ParseError, midi};
use crate::game::scroll;
use log::info;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;
use twox_hash::XxHash64;

pub const DEFAULT_BPM: f32 = 120.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub start_beat: f32,
    pub duration_beats: f32,
    /// Assigned by the lane assigner; 0 until then.
    pub lane: usize,
}

impl NoteEvent {
    pub const fn new(pitch: u8, start_beat: f32, duration_beats: f32) -> Self {
        Self {
            pitch,
            start_beat,
            duration_beats,
            lane: 0,
        }
    }

    #[inline(always)]
    pub fn end_beat(&self) -> f32 {
        self.start_beat + self.duration_beats
    }
}

/// Start beat ascending, ties broken by pitch descending.
pub fn note_order(a: &NoteEvent, b: &NoteEvent) -> Ordering {
    a.start_beat
        .partial_cmp(&b.start_beat)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.pitch.cmp(&a.pitch))
}

#[derive(Clone, Debug)]
pub struct SongData {
    pub id: u64,
    pub title: String,
    pub composer: String,
    pub bpm: f32,
    pub notes: Vec<NoteEvent>,
    /// Screen units per second.
    pub fall_speed: f32,
}

impl SongData {
    /// Finishes a note list into a playable song: ordering, lanes, hold conflicts, fall speed.
    pub fn from_notes(
        id: u64,
        title: &str,
        composer: &str,
        bpm: f32,
        mut notes: Vec<NoteEvent>,
        cfg: &Config,
    ) -> Self {
        let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { DEFAULT_BPM };
        notes.sort_by(note_order);
        lanes::assign_lanes(&mut notes);
        lanes::resolve_hold_conflicts(&mut notes, cfg.hold_threshold_beats);
        let fall_speed = scroll::adaptive_fall_speed(
            &notes,
            bpm,
            cfg.tile_height,
            cfg.fall_speed_min,
            cfg.fall_speed_max,
        );
        Self {
            id,
            title: title.to_string(),
            composer: composer.to_string(),
            bpm,
            notes,
            fall_speed,
        }
    }

    pub fn empty(id: u64, title: &str, composer: &str, cfg: &Config) -> Self {
        Self {
            id,
            title: title.to_string(),
            composer: composer.to_string(),
            bpm: DEFAULT_BPM,
            notes: Vec::new(),
            fall_speed: cfg.fall_speed_min,
        }
    }

    #[inline(always)]
    pub fn seconds_per_beat(&self) -> f32 {
        60.0 / self.bpm
    }

    /// Length of one pass through the score, in seconds.
    pub fn length_seconds(&self) -> f32 {
        let last_beat = self
            .notes
            .iter()
            .map(NoteEvent::end_beat)
            .fold(0.0_f32, f32::max);
        last_beat * self.seconds_per_beat()
    }
}

pub fn song_id(bytes: &[u8]) -> u64 {
    XxHash64::oneshot(0, bytes)
}

/// Where a playable score comes from.
#[derive(Clone, Debug)]
pub enum SongSource {
    BuiltIn(&'static BuiltInScore),
    File(PathBuf),
}

impl SongSource {
    pub fn load(&self, cfg: &Config) -> Result<SongData, ParseError> {
        match self {
            Self::BuiltIn(score) => Ok(score.load(cfg)),
            Self::File(path) => {
                let bytes = std::fs::read(path)?;
                let title = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let song = midi::load_score(&bytes, &title, "", cfg)?;
                info!(
                    "Loaded '{}' from {}: {} notes at {:.1} BPM",
                    song.title,
                    path.display(),
                    song.notes.len(),
                    song.bpm
                );
                Ok(song)
            }
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::BuiltIn(score) => score.title.to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}
