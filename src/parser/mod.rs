pub mod context;
pub mod decoder;
pub mod event;
pub mod frame;
pub mod header;
pub mod predictor;
pub mod stream;

pub use context::Context;
pub use decoder::{DecodedValue, Encoding};
pub use event::END_OF_LOG_MESSAGE;
pub use frame::{Frames, Parser};
pub use header::build_field_defs;
pub use predictor::Predictor;
pub use stream::ByteStream;
