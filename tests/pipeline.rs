use std::sync::Arc;
use std::time::{Duration, Instant};
use tilesync::config::Config;
use tilesync::core::audio::{AudioCommand, RecordingAudio};
use tilesync::core::input::TouchId;
use tilesync::game::gameplay::{EndReason, RunPhase};
use tilesync::game::parsing::ParseError;
use tilesync::game::parsing::midi::load_score;
use tilesync::game::session::Session;
use tilesync::game::song::SongSource;
use tilesync::game::stage_stats::MemoryStats;

const PPQN: u16 = 480;

fn vlq(out: &mut Vec<u8>, mut value: u32) {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    out.extend(groups.iter().rev());
}

fn chunk(tag: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Sixteen quarter notes from beat 6 at 120 BPM, the last held for four beats,
/// plus a chord tone under the first note and a drum track.
fn score_bytes() -> Vec<u8> {
    let mut conductor = Vec::new();
    vlq(&mut conductor, 0);
    conductor.extend_from_slice(&[0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]); // 500000 us
    vlq(&mut conductor, 0);
    conductor.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    let quarter = u32::from(PPQN);
    let mut melody = Vec::new();
    let pitches = [60u8, 62, 64, 65, 67, 69, 71, 72, 72, 71, 69, 67, 65, 64, 62, 60];
    vlq(&mut melody, 6 * quarter);
    melody.extend_from_slice(&[0x90, 55, 80]);
    for (i, pitch) in pitches.iter().enumerate() {
        let length = if i + 1 == pitches.len() { 4 * quarter } else { quarter };
        vlq(&mut melody, 0);
        melody.extend_from_slice(&[0x90, *pitch, 100]);
        vlq(&mut melody, length);
        // Running status note-off by zero velocity.
        melody.extend_from_slice(&[*pitch, 0]);
        if i == 0 {
            vlq(&mut melody, 0);
            melody.extend_from_slice(&[0x80, 55, 0]);
        }
    }
    vlq(&mut melody, 0);
    melody.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    let mut drums = Vec::new();
    for _ in 0..8 {
        vlq(&mut drums, 0);
        drums.extend_from_slice(&[0x99, 36, 100]);
        vlq(&mut drums, quarter);
        drums.extend_from_slice(&[0x89, 36, 0]);
    }

    let mut header = Vec::new();
    header.extend_from_slice(&1u16.to_be_bytes());
    header.extend_from_slice(&3u16.to_be_bytes());
    header.extend_from_slice(&PPQN.to_be_bytes());

    let mut out = chunk(b"MThd", &header);
    out.extend(chunk(b"MTrk", &conductor));
    out.extend(chunk(b"MTrk", &melody));
    out.extend(chunk(b"MTrk", &drums));
    out
}

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.target_play_seconds = 20.0;
    cfg
}

#[test]
fn parses_score_into_a_playable_song() {
    let cfg = test_config();
    let song = load_score(&score_bytes(), "scale", "tests", &cfg).expect("score parses");
    assert!((song.bpm - 120.0).abs() <= 1e-3);
    assert_eq!(song.notes.len(), 16, "chord tone collapsed, drums dropped");
    assert_eq!(song.notes[0].pitch, 60);
    assert!((song.notes[0].start_beat - 6.0).abs() <= 1e-5);
    assert!((song.notes[15].duration_beats - 4.0).abs() <= 1e-5);
    // The final hold ends on beat 25.
    assert!((song.length_seconds() - 12.5).abs() <= 1e-3);
    // One tile height per half second.
    assert!((song.fall_speed - 640.0).abs() <= 1e-2, "got {}", song.fall_speed);
}

#[test]
fn autoplay_completes_two_passes() {
    let cfg = test_config();
    let song = Arc::new(load_score(&score_bytes(), "scale", "tests", &cfg).expect("score parses"));
    let song_id = song.id;
    let mut session = Session::new(cfg, RecordingAudio::default(), MemoryStats::default());
    session.start_run(song);

    let frame = Duration::from_secs_f64(1.0 / 60.0);
    let mut clock = Instant::now();
    let mut touch = 0;
    session.tick(clock);
    for _ in 0..4000 {
        let state = session.state().expect("run active");
        if state.is_ended() {
            break;
        }
        if let Some(tile) = state.first_falling()
            && state.song_time >= tile.target_time
        {
            let x = state.playfield.screen.lane_center_x(tile.lane);
            let y = (tile.top_y(&state.playfield, state.song.fall_speed) + tile.y) * 0.5;
            touch += 1;
            session.touch_down_at(x, y, TouchId(touch));
        }
        clock += frame;
        session.tick(clock);
    }

    let state = session.state().expect("run kept after end");
    assert_eq!(state.phase, RunPhase::Ended(EndReason::Completed));
    assert_eq!(state.tiles_completed, 32);
    assert_eq!(state.loop_count, 1);
    assert_eq!(state.perfect_count + state.good_count, 30);
    assert_eq!(state.ok_count, 0);
    assert_eq!(state.max_combo, 32);

    let audio = session.audio();
    assert_eq!(audio.count(AudioCommand::Tick), 3);
    assert_eq!(audio.count(AudioCommand::Buzzer), 0);
    assert_eq!(audio.count(AudioCommand::FailureSequence), 0);
    assert_eq!(audio.count(AudioCommand::Stop), 2, "run start and run end");
    assert_eq!(audio.count(AudioCommand::PlayNote { pitch: 72, velocity: 100 }), 4);
    assert!(audio.count(AudioCommand::StopNote { pitch: 60 }) >= 2, "hold releases reach the synth");

    let summary = session.last_summary().expect("summary");
    assert_eq!(summary.end_reason, Some(EndReason::Completed));
    assert_eq!(session.stats().plays, vec![(song_id, summary.score)]);
    assert_eq!(session.stats().best_score(song_id), Some(summary.score));
    assert!(summary.final_speed > 1.0);
}

#[test]
fn file_source_uses_file_stem_as_title() {
    let path = std::env::temp_dir().join(format!("tilesync-pipeline-{}.mid", std::process::id()));
    std::fs::write(&path, score_bytes()).expect("temp file written");
    let song = SongSource::File(path.clone()).load(&test_config());
    let _ = std::fs::remove_file(&path);
    let song = song.expect("file loads");
    assert!(song.title.starts_with("tilesync-pipeline-"));
    assert_eq!(song.notes.len(), 16);
}

#[test]
fn truncated_file_is_rejected() {
    let mut bytes = score_bytes();
    bytes.truncate(bytes.len() - 3);
    assert!(matches!(
        load_score(&bytes, "broken", "", &test_config()),
        Err(ParseError::UnexpectedEnd)
    ));
}
