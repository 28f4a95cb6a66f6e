use crate::config::Config;
use crate::game::song::{NoteEvent, SongData, song_id};

/// A hand-authored score: (pitch, start beat, duration in beats).
#[derive(Debug)]
pub struct BuiltInScore {
    pub name: &'static str,
    pub title: &'static str,
    pub composer: &'static str,
    pub bpm: f32,
    pub notes: &'static [(u8, f32, f32)],
}

impl BuiltInScore {
    pub fn load(&self, cfg: &Config) -> SongData {
        let notes = self
            .notes
            .iter()
            .map(|&(pitch, start, duration)| NoteEvent::new(pitch, start, duration))
            .collect();
        SongData::from_notes(
            song_id(self.name.as_bytes()),
            self.title,
            self.composer,
            self.bpm,
            notes,
            cfg,
        )
    }
}

pub fn find(name: &str) -> Option<&'static BuiltInScore> {
    BUILT_IN.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

// Each score opens with a one-bar rest so the first tiles enter from off-screen.
pub static BUILT_IN: [BuiltInScore; 2] = [
    BuiltInScore {
        name: "ode-to-joy",
        title: "Ode to Joy",
        composer: "Ludwig van Beethoven",
        bpm: 100.0,
        notes: &[
            (64, 4.0, 1.0), (64, 5.0, 1.0), (65, 6.0, 1.0), (67, 7.0, 1.0),
            (67, 8.0, 1.0), (65, 9.0, 1.0), (64, 10.0, 1.0), (62, 11.0, 1.0),
            (60, 12.0, 1.0), (60, 13.0, 1.0), (62, 14.0, 1.0), (64, 15.0, 1.0),
            (64, 16.0, 1.5), (62, 17.5, 0.5), (62, 18.0, 2.0),
            (64, 20.0, 1.0), (64, 21.0, 1.0), (65, 22.0, 1.0), (67, 23.0, 1.0),
            (67, 24.0, 1.0), (65, 25.0, 1.0), (64, 26.0, 1.0), (62, 27.0, 1.0),
            (60, 28.0, 1.0), (60, 29.0, 1.0), (62, 30.0, 1.0), (64, 31.0, 1.0),
            (62, 32.0, 1.5), (60, 33.5, 0.5), (60, 34.0, 2.0),
        ],
    },
    BuiltInScore {
        name: "twinkle",
        title: "Twinkle, Twinkle, Little Star",
        composer: "Traditional",
        bpm: 110.0,
        notes: &[
            (60, 4.0, 1.0), (60, 5.0, 1.0), (67, 6.0, 1.0), (67, 7.0, 1.0),
            (69, 8.0, 1.0), (69, 9.0, 1.0), (67, 10.0, 2.0),
            (65, 12.0, 1.0), (65, 13.0, 1.0), (64, 14.0, 1.0), (64, 15.0, 1.0),
            (62, 16.0, 1.0), (62, 17.0, 1.0), (60, 18.0, 2.0),
            (67, 20.0, 1.0), (67, 21.0, 1.0), (65, 22.0, 1.0), (65, 23.0, 1.0),
            (64, 24.0, 1.0), (64, 25.0, 1.0), (62, 26.0, 2.0),
            (67, 28.0, 1.0), (67, 29.0, 1.0), (65, 30.0, 1.0), (65, 31.0, 1.0),
            (64, 32.0, 1.0), (64, 33.0, 1.0), (62, 34.0, 2.0),
        ],
    },
];
