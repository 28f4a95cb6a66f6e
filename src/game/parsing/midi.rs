//! Standard MIDI File decoding into a flat, beat-quantized note list.
//!
//! Only what the tile pipeline needs is kept: pitched notes with start and end
//! ticks, and tempo changes. Everything else is skipped by its declared length.

use crate::config::Config;
use crate::game::parsing::ParseError;
use crate::game::parsing::reader::ByteReader;
use crate::game::song::{DEFAULT_BPM, NoteEvent, SongData, song_id};
use log::{debug, info, trace};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

const HEADER_TAG: &[u8] = b"MThd";
const TRACK_TAG: &[u8] = b"MTrk";
const HEADER_MIN_LENGTH: u32 = 6;
const SMPTE_DIVISION_BIT: u16 = 0x8000;

const PERCUSSION_CHANNEL: u8 = 9;
const META_EVENT: u8 = 0xFF;
const META_TEMPO: u8 = 0x51;
const SYSEX_START: u8 = 0xF0;
const SYSEX_ESCAPE: u8 = 0xF7;

const DEDUP_WINDOW_BEATS: f32 = 0.02;
const MIN_DURATION_BEATS: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawNote {
    pub channel: u8,
    pub pitch: u8,
    pub start_tick: u64,
    pub end_tick: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoChange {
    pub tick: u64,
    pub micros_per_beat: u32,
}

impl TempoChange {
    #[inline(always)]
    pub fn bpm(&self) -> f32 {
        (60_000_000.0 / f64::from(self.micros_per_beat)) as f32
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParsedMidi {
    pub ppqn: u16,
    pub notes: Vec<RawNote>,
    pub tempo_changes: Vec<TempoChange>,
}

/// Decodes header and tracks. Notes are in track order, not yet sorted.
pub fn parse_smf(bytes: &[u8]) -> Result<ParsedMidi, ParseError> {
    let mut reader = ByteReader::new(bytes);
    let tag = reader
        .read_tag(HEADER_TAG.len())
        .map_err(|_| ParseError::InvalidHeader)?;
    if tag != HEADER_TAG {
        return Err(ParseError::InvalidHeader);
    }
    let header_len = reader.read_u32()?;
    if header_len < HEADER_MIN_LENGTH {
        return Err(ParseError::InvalidHeader);
    }
    let _format = reader.read_u16()?;
    let track_count = reader.read_u16()?;
    let division = reader.read_u16()?;
    reader.skip((header_len - HEADER_MIN_LENGTH) as usize)?;

    if division & SMPTE_DIVISION_BIT != 0 {
        return Err(ParseError::SmpteNotSupported);
    }
    let ppqn = division & !SMPTE_DIVISION_BIT;
    if ppqn == 0 {
        return Err(ParseError::InvalidHeader);
    }

    let mut parsed = ParsedMidi {
        ppqn,
        ..ParsedMidi::default()
    };
    for track_index in 0..track_count {
        let tag = reader.read_tag(TRACK_TAG.len())?;
        if tag != TRACK_TAG {
            return Err(ParseError::InvalidTrackHeader);
        }
        let len = reader.read_u32()? as usize;
        let data = reader.read_slice(len)?;
        parse_track(&mut ByteReader::new(data), &mut parsed)?;
        trace!("Parsed track {track_index} ({len} bytes)");
    }
    Ok(parsed)
}

fn close_note(
    pending: &mut FxHashMap<(u8, u8), u64>,
    out: &mut Vec<RawNote>,
    channel: u8,
    pitch: u8,
    tick: u64,
) {
    if let Some(start_tick) = pending.remove(&(channel, pitch)) {
        out.push(RawNote {
            channel,
            pitch,
            start_tick,
            end_tick: tick,
        });
    }
}

fn parse_track(track: &mut ByteReader<'_>, out: &mut ParsedMidi) -> Result<(), ParseError> {
    let mut tick: u64 = 0;
    let mut running_status: Option<u8> = None;
    let mut pending: FxHashMap<(u8, u8), u64> = FxHashMap::default();

    while !track.is_at_end() {
        tick += u64::from(track.read_vlq()?);
        let mut status = track.read_u8()?;
        if status < 0x80 {
            let Some(previous) = running_status else {
                trace!("Data byte {status:#04x} without running status at tick {tick}");
                continue;
            };
            track.unread_byte();
            status = previous;
        }

        match status {
            META_EVENT => {
                let kind = track.read_u8()?;
                let len = track.read_vlq()? as usize;
                if kind == META_TEMPO && len == 3 {
                    let b = track.read_slice(3)?;
                    let micros_per_beat = u32::from_be_bytes([0, b[0], b[1], b[2]]);
                    if micros_per_beat > 0 {
                        out.tempo_changes.push(TempoChange {
                            tick,
                            micros_per_beat,
                        });
                    }
                } else {
                    track.skip(len)?;
                }
            }
            SYSEX_START | SYSEX_ESCAPE => {
                let len = track.read_vlq()? as usize;
                track.skip(len)?;
            }
            0x80..=0xEF => {
                running_status = Some(status);
                let channel = status & 0x0F;
                match status & 0xF0 {
                    0x80 => {
                        let pitch = track.read_u8()? & 0x7F;
                        let _velocity = track.read_u8()?;
                        close_note(&mut pending, &mut out.notes, channel, pitch, tick);
                    }
                    0x90 => {
                        let pitch = track.read_u8()? & 0x7F;
                        let velocity = track.read_u8()?;
                        if velocity == 0 {
                            close_note(&mut pending, &mut out.notes, channel, pitch, tick);
                        } else {
                            // Re-opening an open (channel, pitch) restarts it.
                            pending.insert((channel, pitch), tick);
                        }
                    }
                    0xA0 | 0xB0 | 0xE0 => track.skip(2)?,
                    _ => track.skip(1)?, // 0xC0 program change, 0xD0 channel pressure
                }
            }
            // System common / realtime bytes carry no payload in a file.
            _ => {}
        }
    }

    if !pending.is_empty() {
        let mut dangling: Vec<((u8, u8), u64)> = pending.into_iter().collect();
        dangling.sort_unstable();
        debug!("Closing {} dangling notes at tick {tick}", dangling.len());
        out.notes.extend(dangling.into_iter().map(|((channel, pitch), start_tick)| RawNote {
            channel,
            pitch,
            start_tick,
            end_tick: tick,
        }));
    }
    Ok(())
}

/// The tempo governing the largest tick span; the last span runs to `last_tick`.
pub fn dominant_bpm(changes: &[TempoChange], last_tick: u64) -> f32 {
    match changes {
        [] => DEFAULT_BPM,
        [only] => only.bpm(),
        _ => {
            let mut sorted: SmallVec<[TempoChange; 8]> = changes.iter().copied().collect();
            sorted.sort_by_key(|c| c.tick);
            let mut best = sorted[0];
            let mut best_span = 0u64;
            for (i, change) in sorted.iter().enumerate() {
                let end = sorted.get(i + 1).map_or(last_tick, |next| next.tick);
                let span = end.saturating_sub(change.tick);
                if span > best_span {
                    best = *change;
                    best_span = span;
                }
            }
            best.bpm()
        }
    }
}

/// Sorts, converts ticks to beats, collapses near-simultaneous starts and trims overlaps.
pub fn quantize_notes(raw: &[RawNote], ppqn: u16) -> Vec<NoteEvent> {
    let mut sorted = raw.to_vec();
    sorted.sort_by(|a, b| {
        a.start_tick
            .cmp(&b.start_tick)
            .then_with(|| b.pitch.cmp(&a.pitch))
    });

    let ppq = f32::from(ppqn.max(1));
    let mut kept: Vec<NoteEvent> = Vec::with_capacity(sorted.len());
    for note in &sorted {
        let start = note.start_tick as f32 / ppq;
        let duration =
            (note.end_tick.saturating_sub(note.start_tick) as f32 / ppq).max(MIN_DURATION_BEATS);
        if let Some(prev) = kept.last()
            && start - prev.start_beat < DEDUP_WINDOW_BEATS
        {
            continue;
        }
        kept.push(NoteEvent::new(note.pitch, start, duration));
    }

    for i in 1..kept.len() {
        let next_start = kept[i].start_beat;
        let prev = &mut kept[i - 1];
        if prev.start_beat + prev.duration_beats > next_start {
            prev.duration_beats = (next_start - prev.start_beat).max(MIN_DURATION_BEATS);
        }
    }
    kept
}

/// Parses SMF bytes into a finished, lane-assigned song.
pub fn load_score(
    bytes: &[u8],
    title: &str,
    composer: &str,
    cfg: &Config,
) -> Result<SongData, ParseError> {
    let parsed = parse_smf(bytes)?;
    let id = song_id(bytes);
    let total_notes = parsed.notes.len();
    let notes: Vec<RawNote> = parsed
        .notes
        .into_iter()
        .filter(|n| n.channel != PERCUSSION_CHANNEL)
        .collect();
    if notes.is_empty() {
        info!("'{title}' has no pitched notes; using an empty song.");
        return Ok(SongData::empty(id, title, composer, cfg));
    }

    let last_tick = notes.iter().map(|n| n.end_tick).max().unwrap_or(0);
    let bpm = dominant_bpm(&parsed.tempo_changes, last_tick);
    let events = quantize_notes(&notes, parsed.ppqn);
    debug!(
        "'{title}': {total_notes} raw notes, {} pitched, {} kept; {} tempo changes -> {bpm:.2} BPM",
        notes.len(),
        events.len(),
        parsed.tempo_changes.len()
    );
    Ok(SongData::from_notes(id, title, composer, bpm, events, cfg))
}
