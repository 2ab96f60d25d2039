use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use crate::error::Result;
use crate::parser::context::Context;
use crate::parser::decoder::DecodedValue;
use crate::parser::event::parse_event;
use crate::parser::stream::ByteStream;
use crate::reader::Reader;
use crate::types::{Event, FieldDefs, Frame, FrameType, Headers, Stats};

/// A frame stepping backwards in time by more than this many microseconds
/// is discarded as desynced.
const MAX_TIME_JUMP_US: i64 = 10 * 1_000_000;
/// Companion bound for backwards loop-iteration jumps.
const MAX_ITER_JUMP: i64 = 500 * 10;

/// Alignment of the cursor with frame boundaries. One unrecognized tag byte
/// costs one invalid-frame tick and a rewind; further garbage bytes are
/// consumed silently until a valid tag realigns the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Aligned,
    CorruptSkip,
}

/// Streaming decoder for one log session of a blackbox file.
///
/// Frames are produced lazily through [`Parser::frames`]; events accumulate
/// on the side and are complete once iteration has finished. Selecting
/// another log session resets all decoding state.
pub struct Parser {
    reader: Reader,
    ctx: Context,
    events: Vec<Event>,
    filtered_headers: Headers,
    field_names: Vec<String>,
    last_slow: Option<Frame>,
    last_time: Option<i64>,
    last_valid_iter: i64,
    last_frame_pos: usize,
    sync: SyncState,
    end_of_log: bool,
}

impl Parser {
    /// Open a file and select its first log session.
    pub fn load(path: impl AsRef<Path>) -> Result<Parser> {
        Ok(Parser::new(Reader::open(path)?))
    }

    /// Open a file and select the given 1-based log session.
    pub fn load_with_index(path: impl AsRef<Path>, index: usize) -> Result<Parser> {
        let mut parser = Parser::load(path)?;
        if index != parser.reader.log_index() {
            parser.set_log_index(index)?;
        }
        Ok(parser)
    }

    pub fn new(reader: Reader) -> Parser {
        let ctx = Context::new(reader.headers().clone(), Arc::clone(reader.field_defs()));
        let mut parser = Parser {
            reader,
            ctx,
            events: Vec::new(),
            filtered_headers: Headers::new(),
            field_names: Vec::new(),
            last_slow: None,
            last_time: None,
            last_valid_iter: 0,
            last_frame_pos: 0,
            sync: SyncState::Aligned,
            end_of_log: false,
        };
        parser.refresh_session_views();
        parser
    }

    /// Select a log session by 1-based index, discarding all decoding state
    /// and results of the previous session.
    pub fn set_log_index(&mut self, index: usize) -> Result<()> {
        self.reader.set_log_index(index)?;
        self.ctx = Context::new(
            self.reader.headers().clone(),
            Arc::clone(self.reader.field_defs()),
        );
        self.events.clear();
        self.last_slow = None;
        self.last_time = None;
        self.last_valid_iter = 0;
        self.last_frame_pos = 0;
        self.sync = SyncState::Aligned;
        self.end_of_log = false;
        self.refresh_session_views();
        Ok(())
    }

    pub fn log_count(&self) -> usize {
        self.reader.log_count()
    }

    pub fn log_index(&self) -> usize {
        self.reader.log_index()
    }

    /// Session headers, without the field definition entries.
    pub fn headers(&self) -> &Headers {
        &self.filtered_headers
    }

    /// Column names of emitted frames: main fields, then slow fields, then
    /// GPS fields minus the leading time.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Events seen so far. Complete only after [`Parser::frames`] has been
    /// driven to its end.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn stats(&self) -> Stats {
        self.ctx.stats()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Lazy frame sequence for the selected session. Iteration can be
    /// abandoned and resumed; the cursor keeps its place.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { parser: self }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.end_of_log {
            return None;
        }
        let Parser {
            reader,
            ctx,
            events,
            last_slow,
            last_time,
            last_valid_iter,
            last_frame_pos,
            sync,
            end_of_log,
            ..
        } = self;
        let mut stream = ByteStream::at(reader.frame_data(), ctx.pos);

        let emitted = loop {
            let Ok(tag) = stream.next_byte() else {
                break None;
            };
            let Some(frame_type) = FrameType::from_byte(tag) else {
                if *sync == SyncState::Aligned {
                    debug!(
                        "corrupt tag byte 0x{:02x} at offset {}",
                        tag,
                        stream.tell() - 1
                    );
                    stream.seek(*last_frame_pos + 1);
                    ctx.read_frame_count += 1;
                    ctx.invalid_frame_count += 1;
                    *sync = SyncState::CorruptSkip;
                }
                continue;
            };
            *sync = SyncState::Aligned;
            *last_frame_pos = stream.tell() - 1;
            ctx.frame_type = Some(frame_type);

            if frame_type == FrameType::Event {
                let Ok(log_ended) = parse_event(&mut stream, ctx, events) else {
                    break None;
                };
                ctx.read_frame_count += 1;
                if log_ended {
                    *end_of_log = true;
                    let stats = ctx.stats();
                    info!(
                        "frames: total: {}, parsed: {}, invalid: {} ({:.2}%)",
                        stats.total, stats.parsed, stats.invalid, stats.invalid_percent
                    );
                    break None;
                }
                continue;
            }

            let Ok(values) = decode_fields(&mut stream, ctx, frame_type) else {
                break None;
            };

            match frame_type {
                FrameType::Slow => {
                    *last_slow = Some(Frame::new(frame_type, values));
                    ctx.read_frame_count += 1;
                    continue;
                }
                FrameType::Gps => {
                    ctx.last_gps = Frame::new(frame_type, values);
                    ctx.read_frame_count += 1;
                    continue;
                }
                FrameType::GpsHome => {
                    ctx.last_gps_home = Frame::new(frame_type, values);
                    ctx.read_frame_count += 1;
                    continue;
                }
                _ => {}
            }

            let current_time = ctx.current_value_by_name(frame_type, "time", 0);
            if let Some(previous) = *last_time {
                if previous >= current_time && current_time - previous > MAX_TIME_JUMP_US {
                    debug!(
                        "invalid {} frame #{} due to time desync",
                        frame_type.tag(),
                        ctx.read_frame_count + 1
                    );
                    *last_time = Some(current_time);
                    ctx.read_frame_count += 1;
                    ctx.invalid_frame_count += 1;
                    continue;
                }
            }
            *last_time = Some(current_time);

            let current_iter = ctx.current_value_by_name(frame_type, "loopIteration", 0);
            ctx.last_iter = current_iter;
            if *last_valid_iter >= current_iter && current_iter + *last_valid_iter > MAX_ITER_JUMP {
                debug!(
                    "invalid {} frame #{} due to iteration desync",
                    frame_type.tag(),
                    ctx.read_frame_count + 1
                );
                *last_valid_iter = current_iter;
                ctx.read_frame_count += 1;
                ctx.invalid_frame_count += 1;
                continue;
            }
            *last_valid_iter = current_iter;

            // a decoder that misread its width leaves the cursor mid-field,
            // so the next byte fails to look like a frame tag
            if let Some(next_tag) = stream.peek() {
                if FrameType::from_byte(next_tag).is_none() {
                    debug!(
                        "dropping corrupt {} frame #{}",
                        frame_type.tag(),
                        ctx.read_frame_count + 1
                    );
                    ctx.read_frame_count += 1;
                    ctx.invalid_frame_count += 1;
                    continue;
                }
            }

            let mut frame = Frame::new(frame_type, values);
            extend_with_tail(&mut frame, last_slow.as_ref(), ctx);
            ctx.read_frame_count += 1;
            ctx.add_frame(frame.clone());
            break Some(frame);
        };

        ctx.pos = stream.tell();
        emitted
    }

    fn refresh_session_views(&mut self) {
        self.filtered_headers = self
            .reader
            .headers()
            .iter()
            .filter(|(key, _)| !key.contains("Field "))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.field_names = emitted_field_names(self.reader.field_defs());
    }
}

/// Lazy iterator over the emitted frames of one session.
pub struct Frames<'a> {
    parser: &'a mut Parser,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.parser.next_frame()
    }
}

/// Decode every field of one frame, applying predictors as values land.
///
/// Grouped encodings hand back several values at once; each one is finished
/// by the predictor of its own field definition, in order.
fn decode_fields(
    stream: &mut ByteStream,
    ctx: &mut Context,
    frame_type: FrameType,
) -> Result<Vec<i64>> {
    let defs = Arc::clone(&ctx.field_defs);
    let fields = defs.get(frame_type).unwrap_or(&[]);
    ctx.field_index = 0;
    ctx.current_frame.clear();
    while ctx.field_index < fields.len() {
        let field = &fields[ctx.field_index];
        match field.encoding.decode(stream, ctx)? {
            DecodedValue::Scalar(raw) => {
                let value = field.predictor.apply(raw, ctx);
                ctx.current_frame.push(value);
                ctx.field_index += 1;
            }
            DecodedValue::Group(raws) => {
                for raw in raws {
                    if ctx.field_index >= fields.len() {
                        break;
                    }
                    let field = &fields[ctx.field_index];
                    let value = field.predictor.apply(raw, ctx);
                    ctx.current_frame.push(value);
                    ctx.field_index += 1;
                }
            }
        }
    }
    Ok(ctx.current_frame.clone())
}

/// Append the slow and GPS tails to an emitted main frame. Tail positions
/// for which no frame has arrived yet are filled with placeholders.
fn extend_with_tail(frame: &mut Frame, last_slow: Option<&Frame>, ctx: &Context) {
    if ctx.field_defs.contains(FrameType::Slow) {
        match last_slow {
            Some(slow) => frame.data.extend(slow.data.iter().copied()),
            None => {
                let count = ctx.field_defs.count(FrameType::Slow);
                frame.data.extend(std::iter::repeat(None).take(count));
            }
        }
    }
    if ctx.field_defs.contains(FrameType::Gps) {
        // the GPS time field is never part of the tail
        let count = ctx.field_defs.count(FrameType::Gps).saturating_sub(1);
        if ctx.last_gps.data.is_empty() {
            frame.data.extend(std::iter::repeat(None).take(count));
        } else {
            frame.data.extend(ctx.last_gps.data.iter().skip(1).copied());
        }
    }
}

/// Column layout of emitted frames for the given definitions.
pub(crate) fn emitted_field_names(defs: &FieldDefs) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(main) = defs.get(FrameType::Intra).or_else(|| defs.get(FrameType::Inter)) {
        names.extend(main.iter().map(|f| f.name.clone()));
    }
    if let Some(slow) = defs.get(FrameType::Slow) {
        names.extend(slow.iter().map(|f| f.name.clone()));
    }
    if let Some(gps) = defs.get(FrameType::Gps) {
        names.extend(gps.iter().skip(1).map(|f| f.name.clone()));
    }
    names
}
