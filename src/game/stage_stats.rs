use crate::game::gameplay::{EndReason, State};
use log::debug;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// End-of-run snapshot handed to the host.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageSummary {
    pub song_id: u64,
    pub title: String,
    pub score: u64,
    pub max_combo: u32,
    pub perfect: u32,
    pub good: u32,
    pub ok: u32,
    pub tiles_completed: u32,
    pub loops: u32,
    pub song_seconds: f32,
    pub play_seconds: f32,
    pub final_speed: f32,
    pub end_reason: Option<EndReason>,
}

impl StageSummary {
    pub fn from_state(state: &State) -> Self {
        Self {
            song_id: state.song.id,
            title: state.song.title.clone(),
            score: state.score,
            max_combo: state.max_combo,
            perfect: state.perfect_count,
            good: state.good_count,
            ok: state.ok_count,
            tiles_completed: state.tiles_completed,
            loops: state.loop_count,
            song_seconds: state.song_time.max(0.0),
            play_seconds: state.play_seconds,
            final_speed: state.speed_multiplier,
            end_reason: state.end_reason(),
        }
    }
}

/// Best-score persistence supplied by the host.
pub trait StatsSink {
    fn record_play(&mut self, song_id: u64, score: u64);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl StatsSink for NullStats {
    fn record_play(&mut self, _song_id: u64, _score: u64) {}
}

/// In-memory stats: every play in order plus the best score per song.
#[derive(Debug, Default, Clone)]
pub struct MemoryStats {
    pub plays: Vec<(u64, u64)>,
    best: FxHashMap<u64, u64>,
}

impl MemoryStats {
    pub fn best_score(&self, song_id: u64) -> Option<u64> {
        self.best.get(&song_id).copied()
    }
}

impl StatsSink for MemoryStats {
    fn record_play(&mut self, song_id: u64, score: u64) {
        self.plays.push((song_id, score));
        let best = self.best.entry(song_id).or_insert(0);
        if score > *best {
            debug!("New best for song {song_id:016x}: {score} (was {})", *best);
            *best = score;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStats, StageSummary, StatsSink};
    use crate::config::Config;
    use crate::core::space::ScreenSize;
    use crate::game::gameplay::State;
    use crate::game::song::SongData;
    use std::sync::Arc;

    #[test]
    fn memory_stats_keep_best_per_song() {
        let mut stats = MemoryStats::default();
        stats.record_play(1, 50);
        stats.record_play(1, 20);
        stats.record_play(2, 5);
        stats.record_play(1, 70);
        assert_eq!(stats.best_score(1), Some(70));
        assert_eq!(stats.best_score(2), Some(5));
        assert_eq!(stats.best_score(3), None);
        assert_eq!(stats.plays.len(), 4);
    }

    #[test]
    fn summary_serializes_to_json() {
        let cfg = Config::default();
        let song = Arc::new(SongData::empty(0xABCD, "quiet", "", &cfg));
        let state = State::new(song, cfg, ScreenSize::from_config(&cfg));
        let summary = StageSummary::from_state(&state);
        assert_eq!(summary.end_reason, None);
        let json = serde_json::to_value(&summary).expect("summary serializes");
        assert_eq!(json["song_id"], 0xABCD);
        assert_eq!(json["title"], "quiet");
        assert!(json["end_reason"].is_null());
    }
}
