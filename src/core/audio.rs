use log::{info, warn};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};

/// Audio collaborator driven by the tick loop. Implementations must not block.
pub trait AudioSink {
    fn play_note(&mut self, pitch: u8, velocity: u8);
    fn stop_note(&mut self, pitch: u8);
    /// Countdown beep.
    fn play_tick(&mut self);
    fn play_buzzer(&mut self);
    fn play_failure_sequence(&mut self);
    /// Silences everything; also used at the end of a successful run.
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCommand {
    PlayNote { pitch: u8, velocity: u8 },
    StopNote { pitch: u8 },
    Tick,
    Buzzer,
    FailureSequence,
    Stop,
}

/// Forwards commands to a synth thread over a channel; sends never wait on the receiver.
pub struct ChannelAudio {
    sender: Sender<AudioCommand>,
    disconnected: bool,
}

impl ChannelAudio {
    pub const fn new(sender: Sender<AudioCommand>) -> Self {
        Self {
            sender,
            disconnected: false,
        }
    }

    /// Starts a worker that feeds every command to `handler` until the sink is dropped.
    pub fn spawn<F>(handler: F) -> (Self, JoinHandle<()>)
    where
        F: FnMut(AudioCommand) + Send + 'static,
    {
        let (sender, receiver) = channel();
        let worker = thread::spawn(move || audio_worker_thread(receiver, handler));
        (Self::new(sender), worker)
    }

    fn send(&mut self, cmd: AudioCommand) {
        if self.sender.send(cmd).is_err() && !self.disconnected {
            // Only report once; gameplay keeps running without sound.
            self.disconnected = true;
            warn!("Audio worker disconnected; dropping audio commands.");
        }
    }
}

fn audio_worker_thread<F: FnMut(AudioCommand)>(receiver: Receiver<AudioCommand>, mut handler: F) {
    info!("Audio worker started.");
    while let Ok(cmd) = receiver.recv() {
        handler(cmd);
    }
    info!("Audio worker stopped.");
}

impl AudioSink for ChannelAudio {
    fn play_note(&mut self, pitch: u8, velocity: u8) {
        self.send(AudioCommand::PlayNote { pitch, velocity });
    }

    fn stop_note(&mut self, pitch: u8) {
        self.send(AudioCommand::StopNote { pitch });
    }

    fn play_tick(&mut self) {
        self.send(AudioCommand::Tick);
    }

    fn play_buzzer(&mut self) {
        self.send(AudioCommand::Buzzer);
    }

    fn play_failure_sequence(&mut self) {
        self.send(AudioCommand::FailureSequence);
    }

    fn stop(&mut self) {
        self.send(AudioCommand::Stop);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play_note(&mut self, _pitch: u8, _velocity: u8) {}
    fn stop_note(&mut self, _pitch: u8) {}
    fn play_tick(&mut self) {}
    fn play_buzzer(&mut self) {}
    fn play_failure_sequence(&mut self) {}
    fn stop(&mut self) {}
}

/// Keeps every command in order; handy for replays and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingAudio {
    pub commands: Vec<AudioCommand>,
}

impl RecordingAudio {
    pub fn count(&self, cmd: AudioCommand) -> usize {
        self.commands.iter().filter(|c| **c == cmd).count()
    }
}

impl AudioSink for RecordingAudio {
    fn play_note(&mut self, pitch: u8, velocity: u8) {
        self.commands.push(AudioCommand::PlayNote { pitch, velocity });
    }

    fn stop_note(&mut self, pitch: u8) {
        self.commands.push(AudioCommand::StopNote { pitch });
    }

    fn play_tick(&mut self) {
        self.commands.push(AudioCommand::Tick);
    }

    fn play_buzzer(&mut self) {
        self.commands.push(AudioCommand::Buzzer);
    }

    fn play_failure_sequence(&mut self) {
        self.commands.push(AudioCommand::FailureSequence);
    }

    fn stop(&mut self) {
        self.commands.push(AudioCommand::Stop);
    }
}
