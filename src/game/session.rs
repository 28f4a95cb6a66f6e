//! Owns the active run and its collaborators.
//!
//! The host calls `tick` once per frame and forwards raw touches at any time;
//! touches are queued and applied inside the next tick. Every run gets a new
//! generation number, and delayed note-offs scheduled by a previous run are
//! discarded instead of firing into the new one.

use crate::config::Config;
use crate::core::audio::AudioSink;
use crate::core::input::{InputEvent, TouchId};
use crate::core::space::ScreenSize;
use crate::game::gameplay::{self, GameEvent, State};
use crate::game::song::SongData;
use crate::game::stage_stats::{StageSummary, StatsSink};
use log::{debug, info, trace};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NoteOffTimer {
    due: Instant,
    pitch: u8,
    generation: u64,
}

pub struct Session<A: AudioSink, S: StatsSink> {
    config: Config,
    screen: ScreenSize,
    audio: A,
    stats: S,
    generation: u64,
    run: Option<State>,
    timers: Vec<NoteOffTimer>,
    last_tick: Option<Instant>,
    summary: Option<StageSummary>,
}

impl<A: AudioSink, S: StatsSink> Session<A, S> {
    pub fn new(config: Config, audio: A, stats: S) -> Self {
        Self {
            screen: ScreenSize::from_config(&config),
            config,
            audio,
            stats,
            generation: 0,
            run: None,
            timers: Vec::new(),
            last_tick: None,
            summary: None,
        }
    }

    /// Discards the current run, silences audio and starts a countdown for `song`.
    pub fn start_run(&mut self, song: Arc<SongData>) {
        self.generation += 1;
        self.audio.stop();
        self.last_tick = None;
        self.summary = None;
        info!("Starting run {} with '{}'", self.generation, song.title);
        self.run = Some(State::new(song, self.config, self.screen));
        self.dispatch_events(Instant::now());
    }

    pub fn tick(&mut self, now: Instant) {
        self.fire_due_timers(now);
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let dt = self
            .last_tick
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f32());
        self.last_tick = Some(now);
        gameplay::update(run, dt);
        self.dispatch_events(now);
    }

    pub fn touch_down(&mut self, lane: usize, y: f32, touch: TouchId) {
        if let Some(run) = self.run.as_mut() {
            gameplay::queue_input(run, InputEvent::TouchDown { lane, y, touch });
        }
    }

    /// Raw screen coordinates; touches left or right of the lanes are dropped.
    pub fn touch_down_at(&mut self, x: f32, y: f32, touch: TouchId) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        match run.playfield.screen.lane_at(x) {
            Some(lane) => gameplay::queue_input(run, InputEvent::TouchDown { lane, y, touch }),
            None => trace!("Touch at x {x:.0} is outside the lanes"),
        }
    }

    pub fn touch_up(&mut self, lane: usize, touch: TouchId) {
        if let Some(run) = self.run.as_mut() {
            gameplay::queue_input(run, InputEvent::TouchUp { lane, touch });
        }
    }

    /// Applies to the next run; the current run keeps its geometry.
    pub fn set_screen_size(&mut self, screen: ScreenSize) {
        self.screen = screen;
    }

    pub const fn state(&self) -> Option<&State> {
        self.run.as_ref()
    }

    pub const fn audio(&self) -> &A {
        &self.audio
    }

    pub const fn stats(&self) -> &S {
        &self.stats
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn last_summary(&self) -> Option<&StageSummary> {
        self.summary.as_ref()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn fire_due_timers(&mut self, now: Instant) {
        let generation = self.generation;
        let audio = &mut self.audio;
        self.timers.retain(|timer| {
            if timer.generation != generation {
                trace!("Dropping stale note-off for pitch {}", timer.pitch);
                return false;
            }
            if timer.due <= now {
                audio.stop_note(timer.pitch);
                return false;
            }
            true
        });
    }

    fn dispatch_events(&mut self, now: Instant) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let events: Vec<GameEvent> = run.drain_events().collect();
        for event in events {
            match event {
                GameEvent::CountdownTick { remaining } => {
                    debug!("Countdown {remaining}");
                    self.audio.play_tick();
                }
                GameEvent::NoteOn {
                    pitch,
                    velocity,
                    release_after_s,
                } => {
                    self.audio.play_note(pitch, velocity);
                    if let Some(seconds) = release_after_s {
                        let delay = Duration::try_from_secs_f32(seconds.max(0.0))
                            .unwrap_or(Duration::ZERO);
                        self.timers.push(NoteOffTimer {
                            due: now + delay,
                            pitch,
                            generation: self.generation,
                        });
                    }
                }
                GameEvent::NoteOff { pitch } => self.audio.stop_note(pitch),
                GameEvent::Buzzer => self.audio.play_buzzer(),
                GameEvent::RunEnded { reason } => {
                    if reason.is_failure() {
                        self.audio.play_failure_sequence();
                    } else {
                        self.audio.stop();
                    }
                    if let Some(run) = self.run.as_ref() {
                        self.stats.record_play(run.song.id, run.score);
                        self.summary = Some(StageSummary::from_state(run));
                    }
                }
            }
        }
    }
}
