pub mod midi;
pub mod reader;

use thiserror::Error;

/// Failure to turn a score file into a playable song. Fatal to the load attempt only.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid MIDI header")]
    InvalidHeader,
    #[error("SMPTE time division is not supported")]
    SmpteNotSupported,
    #[error("unexpected end of data")]
    UnexpectedEnd,
    #[error("invalid track header")]
    InvalidTrackHeader,
    #[error("failed to read score file: {0}")]
    Io(#[from] std::io::Error),
}
