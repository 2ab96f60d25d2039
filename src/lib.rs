//! Decoder for Cleanflight/Betaflight blackbox flight-recorder logs.
//!
//! A blackbox file concatenates one or more log sessions, each made of an
//! ASCII header block followed by delta-compressed binary frames. The
//! headers describe, per frame type, how every field is encoded and which
//! predictor reconstructs its absolute value from recent history; this
//! crate binds those definitions once per session and then streams decoded
//! frames lazily, surviving byte-level corruption by resynchronizing on
//! the next valid frame tag.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bbl_decode::Parser;
//!
//! let mut parser = Parser::load("flight.bbl").unwrap();
//! println!("sessions: {}", parser.log_count());
//! println!("fields: {:?}", parser.field_names());
//! for frame in parser.frames() {
//!     println!("{:?}: {:?}", frame.frame_type, frame.data);
//! }
//! // complete only after the frame iterator is exhausted
//! println!("events: {:?}", parser.events());
//! println!("stats: {:?}", parser.stats());
//! ```

pub mod error;
pub mod export;
pub mod parser;
pub mod reader;
pub mod types;

pub use error::{Error, Result};
pub use parser::{Context, DecodedValue, Encoding, Frames, Parser, Predictor};
pub use reader::{Reader, ReaderOptions};
pub use types::{
    Event, EventType, FieldDef, FieldDefs, Frame, FrameType, HeaderValue, Headers, Stats,
};
