use log::{info, trace, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tilesync::config;
use tilesync::core::audio::ChannelAudio;
use tilesync::core::input::TouchId;
use tilesync::game::builtin::{self, BUILT_IN};
use tilesync::game::session::Session;
use tilesync::game::song::SongSource;
use tilesync::game::stage_stats::{MemoryStats, StageSummary};

const FRAME_RATE: f64 = 60.0;
const DEFAULT_RUN_SECONDS: f32 = 60.0;

fn song_source(arg: Option<&str>) -> SongSource {
    match arg {
        None => SongSource::BuiltIn(&BUILT_IN[0]),
        Some(name) => builtin::find(name)
            .map_or_else(|| SongSource::File(PathBuf::from(name)), SongSource::BuiltIn),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    let cfg = config::get();
    log::set_max_level(cfg.log_level.as_level_filter());

    let mut args = std::env::args().skip(1);
    let source = song_source(args.next().as_deref());
    let run_seconds = match args.next() {
        Some(s) => s.parse::<f32>()?,
        None => DEFAULT_RUN_SECONDS,
    };

    let song = Arc::new(source.load(&cfg)?);
    info!(
        "Autoplaying '{}' ({}, {:.1}s per pass) for up to {run_seconds:.0}s",
        song.title,
        source.display_name(),
        song.length_seconds()
    );

    let (audio, audio_worker) = ChannelAudio::spawn(|cmd| trace!("Audio: {cmd:?}"));
    let mut session = Session::new(cfg, audio, MemoryStats::default());
    session.start_run(song);

    let frame = Duration::from_secs_f64(1.0 / FRAME_RATE);
    let frames = (f64::from(run_seconds) * FRAME_RATE).ceil() as u64;
    let mut clock = Instant::now();
    let mut next_touch = 0u64;
    session.tick(clock);

    for _ in 0..frames {
        let Some(state) = session.state() else {
            break;
        };
        if state.is_ended() {
            break;
        }
        if let Some(tile) = state.first_falling()
            && state.song_time >= tile.target_time
        {
            let x = state.playfield.screen.lane_center_x(tile.lane);
            let y = (tile.top_y(&state.playfield, state.song.fall_speed) + tile.y) * 0.5;
            next_touch += 1;
            session.touch_down_at(x, y, TouchId(next_touch));
        }
        clock += frame;
        session.tick(clock);
    }

    let summary = match (session.last_summary(), session.state()) {
        (Some(summary), _) => summary.clone(),
        (None, Some(state)) => StageSummary::from_state(state),
        (None, None) => return Err("no run was started".into()),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    drop(session);
    if audio_worker.join().is_err() {
        warn!("Audio worker panicked.");
    }
    Ok(())
}
