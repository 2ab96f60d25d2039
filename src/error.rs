use thiserror::Error;

/// Errors that can escape the decoder.
///
/// Corruption found inside the frame stream (bad tags, misaligned payloads,
/// time or iteration desyncs, unknown event types) is counted and logged by
/// the parser loop instead of being raised; only setup-time failures and
/// genuine I/O problems surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The file contains no recognizable log session headers.
    #[error("no blackbox log sessions found")]
    NoSessions,

    /// A header-range byte sequence is not an ASCII `H name:value` line.
    #[error("malformed header line at byte {offset}: {reason}")]
    HeaderMalformed { offset: usize, reason: String },

    /// `set_log_index` called with an index outside `[1, log_count]`.
    #[error("log index {index} out of range 1..={count}")]
    IndexOutOfRange { index: usize, count: usize },

    /// A field definition references a predictor id this decoder does not know.
    #[error("unknown predictor id {0}")]
    UnknownPredictor(i64),

    /// A field definition references an encoding id this decoder does not know.
    #[error("unknown encoding id {0}")]
    UnknownEncoding(i64),

    /// The encoding id is known but has no decode routine for this data version.
    #[error("encoding {encoding} is not supported for data version {data_version}")]
    UnsupportedEncoding { encoding: i64, data_version: i64 },

    /// The byte source ran out. Normal termination inside the parser loop.
    #[error("unexpected end of data")]
    EndOfData,
}

pub type Result<T> = std::result::Result<T, Error>;
