use log::{debug, warn};

use crate::error::Result;
use crate::parser::context::Context;
use crate::parser::stream::ByteStream;
use crate::types::{Event, EventType};

/// Trailer bytes that must follow a log-end event.
pub const END_OF_LOG_MESSAGE: &[u8] = b"End of log\x00";

/// Decode one event frame body (the `E` tag byte is already consumed).
///
/// Returns whether the event closed the log. An unrecognized event-type byte
/// is counted as an invalid frame and skipped; a log-end event missing its
/// trailer is logged and counted but still closes the log.
pub(crate) fn parse_event(
    stream: &mut ByteStream,
    ctx: &mut Context,
    events: &mut Vec<Event>,
) -> Result<bool> {
    let byte = stream.next_byte()?;
    let Some(event_type) = EventType::from_byte(byte) else {
        debug!(
            "unknown event type {} in frame #{}",
            byte,
            ctx.read_frame_count + 1
        );
        ctx.invalid_frame_count += 1;
        return Ok(false);
    };

    let mut event = Event::new(event_type);
    let mut log_ended = false;
    match event_type {
        EventType::SyncBeep => {
            event
                .data
                .insert("time".to_string(), stream.read_unsigned_vb()? as i64);
        }
        EventType::FlightMode => {
            event
                .data
                .insert("new_flags".to_string(), stream.read_unsigned_vb()? as i64);
            event
                .data
                .insert("old_flags".to_string(), stream.read_unsigned_vb()? as i64);
        }
        EventType::LogEnd => {
            if !stream.starts_with(END_OF_LOG_MESSAGE) {
                warn!("log end event without its trailer message");
                ctx.invalid_frame_count += 1;
            }
            log_ended = true;
        }
        // payload formats for the remaining event types are not published;
        // record them without one
        _ => {}
    }
    events.push(event);
    Ok(log_ended)
}
