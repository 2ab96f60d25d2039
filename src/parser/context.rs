use std::sync::Arc;

use crate::types::{FieldDefs, Frame, FrameType, Headers, Stats};

/// Mutable per-session decoding state.
///
/// Owned by the parser loop; predictors and grouped decoders get read-only
/// access while a frame is in flight. Rebuilt from scratch whenever another
/// log session is selected.
#[derive(Debug, Clone)]
pub struct Context {
    pub headers: Headers,
    pub data_version: i64,
    pub field_defs: Arc<FieldDefs>,

    /// Logging cadence: every `i_interval`-th iteration gets a keyframe.
    pub i_interval: i64,
    pub p_interval_num: i64,
    pub p_interval_denom: i64,

    /// The three most recent main frames, newest first. Committing a
    /// keyframe overwrites all three slots with it.
    pub past_frames: [Frame; 3],
    pub last_gps: Frame,
    pub last_gps_home: Frame,

    /// Values decoded so far for the frame in flight.
    pub current_frame: Vec<i64>,
    pub frame_type: Option<FrameType>,
    pub field_index: usize,
    /// Most recently observed `loopIteration`, -1 before the first one.
    pub last_iter: i64,

    /// Frames decoded, validated and emitted.
    pub frame_count: u64,
    /// Frames whose tag byte was consumed.
    pub read_frame_count: u64,
    /// Frames dropped due to corruption or desync.
    pub invalid_frame_count: u64,

    /// Cursor offset into the session's frame-data region.
    pub(crate) pos: usize,
}

impl Context {
    pub fn new(headers: Headers, field_defs: Arc<FieldDefs>) -> Context {
        let data_version = headers
            .get("Data version")
            .and_then(|v| v.as_int())
            .unwrap_or(1);
        let i_interval = headers
            .get("I interval")
            .and_then(|v| v.as_int())
            .unwrap_or(1)
            .max(1);
        let (p_interval_num, p_interval_denom) = parse_p_interval(&headers);
        Context {
            headers,
            data_version,
            field_defs,
            i_interval,
            p_interval_num,
            p_interval_denom,
            past_frames: [
                Frame::empty(FrameType::Intra),
                Frame::empty(FrameType::Intra),
                Frame::empty(FrameType::Intra),
            ],
            last_gps: Frame::empty(FrameType::Gps),
            last_gps_home: Frame::empty(FrameType::GpsHome),
            current_frame: Vec::new(),
            frame_type: None,
            field_index: 0,
            last_iter: -1,
            frame_count: 0,
            read_frame_count: 0,
            invalid_frame_count: 0,
            pos: 0,
        }
    }

    /// Commit an emitted main frame to history. A keyframe collapses the
    /// whole ring so predictors see it as every neighbor.
    pub fn add_frame(&mut self, frame: Frame) {
        if frame.frame_type == FrameType::Intra {
            self.past_frames = [frame.clone(), frame.clone(), frame];
        } else {
            self.past_frames.rotate_right(1);
            self.past_frames[0] = frame;
        }
        self.frame_count += 1;
    }

    /// History value for the current field at the given age (0 = newest).
    pub fn past_value(&self, age: usize, default: i64) -> i64 {
        self.past_frames
            .get(age)
            .and_then(|frame| frame.value_at(self.field_index))
            .unwrap_or(default)
    }

    /// Value of a named field in the partially decoded current frame.
    pub fn current_value_by_name(&self, frame_type: FrameType, name: &str, default: i64) -> i64 {
        self.field_defs
            .index_of(frame_type, name)
            .and_then(|index| self.current_frame.get(index).copied())
            .unwrap_or(default)
    }

    pub fn header_int(&self, key: &str, default: i64) -> i64 {
        self.headers
            .get(key)
            .and_then(|v| v.as_int())
            .unwrap_or(default)
    }

    pub fn header_int_at(&self, key: &str, index: usize, default: i64) -> i64 {
        self.headers
            .get(key)
            .and_then(|v| v.int_at(index))
            .unwrap_or(default)
    }

    /// Whether the logging cadence produces a frame at this loop iteration.
    pub fn should_have_frame_at(&self, index: i64) -> bool {
        (index % self.i_interval + self.p_interval_num - 1) % self.p_interval_denom
            < self.p_interval_num
    }

    /// Number of loop iterations after the last seen one for which the
    /// cadence logged no frame.
    pub fn count_skipped_frames(&self) -> i64 {
        if self.last_iter == -1 {
            return 0;
        }
        let mut index = self.last_iter + 1;
        while !self.should_have_frame_at(index) {
            index += 1;
        }
        index - self.last_iter - 1
    }

    pub fn stats(&self) -> Stats {
        let skipped = self
            .read_frame_count
            .saturating_sub(self.frame_count + self.invalid_frame_count);
        Stats {
            total: self.read_frame_count,
            parsed: self.frame_count,
            skipped,
            invalid: self.invalid_frame_count,
            invalid_percent: if self.read_frame_count > 0 {
                self.invalid_frame_count as f64 / self.read_frame_count as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

/// `P interval` is either an integer denominator or a `num/denom` ratio.
/// Degenerate values fall back to 1/1 so the cadence predicate stays total.
fn parse_p_interval(headers: &Headers) -> (i64, i64) {
    let (num, denom) = match headers.get("P interval") {
        Some(value) => {
            if let Some(denom) = value.as_int() {
                (1, denom)
            } else if let Some(text) = value.as_str() {
                match text.split_once('/') {
                    Some((num, denom)) => (
                        num.trim().parse().unwrap_or(1),
                        denom.trim().parse().unwrap_or(1),
                    ),
                    None => (1, 1),
                }
            } else {
                (1, 1)
            }
        }
        None => (1, 0),
    };
    if denom < 1 || num < 1 {
        (1, 1)
    } else {
        (num, denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeaderValue;

    fn ctx_with_intervals(i_interval: &str, p_interval: &str) -> Context {
        let mut headers = Headers::new();
        headers.insert(
            "I interval".to_string(),
            HeaderValue::parse_value(i_interval),
        );
        headers.insert(
            "P interval".to_string(),
            HeaderValue::parse_value(p_interval),
        );
        Context::new(headers, Arc::new(FieldDefs::default()))
    }

    #[test]
    fn intra_commit_collapses_history() {
        let mut ctx = Context::new(Headers::new(), Arc::new(FieldDefs::default()));
        ctx.add_frame(Frame::new(FrameType::Inter, vec![1]));
        ctx.add_frame(Frame::new(FrameType::Intra, vec![7]));
        assert_eq!(ctx.past_frames[0], ctx.past_frames[1]);
        assert_eq!(ctx.past_frames[1], ctx.past_frames[2]);
        assert_eq!(ctx.past_frames[0].value_at(0), Some(7));
        assert_eq!(ctx.frame_count, 2);
    }

    #[test]
    fn inter_commit_shifts_history() {
        let mut ctx = Context::new(Headers::new(), Arc::new(FieldDefs::default()));
        ctx.add_frame(Frame::new(FrameType::Intra, vec![1]));
        ctx.add_frame(Frame::new(FrameType::Inter, vec![2]));
        ctx.add_frame(Frame::new(FrameType::Inter, vec![3]));
        let ages: Vec<_> = ctx
            .past_frames
            .iter()
            .map(|f| f.value_at(0).unwrap())
            .collect();
        assert_eq!(ages, vec![3, 2, 1]);
    }

    #[test]
    fn cadence_ratio_notation() {
        let ctx = ctx_with_intervals("32", "1/4");
        assert_eq!((ctx.p_interval_num, ctx.p_interval_denom), (1, 4));
        // depends only on index % i_interval
        for index in 0..256 {
            assert_eq!(
                ctx.should_have_frame_at(index),
                ctx.should_have_frame_at(index % 32),
            );
        }
    }

    #[test]
    fn cadence_integer_notation() {
        // an integer denominator d reads as the ratio 1/d
        let ctx = ctx_with_intervals("2", "2");
        assert_eq!((ctx.p_interval_num, ctx.p_interval_denom), (1, 2));
        assert!(ctx.should_have_frame_at(0));
        assert!(!ctx.should_have_frame_at(1));
        assert!(ctx.should_have_frame_at(2));
    }

    #[test]
    fn cadence_defaults_are_total() {
        let ctx = Context::new(Headers::new(), Arc::new(FieldDefs::default()));
        for index in 0..64 {
            assert!(ctx.should_have_frame_at(index));
        }
    }

    #[test]
    fn degenerate_intervals_fall_back() {
        let ctx = ctx_with_intervals("0", "0");
        assert_eq!(ctx.i_interval, 1);
        assert_eq!((ctx.p_interval_num, ctx.p_interval_denom), (1, 1));
    }

    #[test]
    fn skipped_frames_zero_before_first_iteration() {
        let ctx = ctx_with_intervals("2", "1/2");
        assert_eq!(ctx.count_skipped_frames(), 0);
    }

    #[test]
    fn skipped_frames_counts_cadence_gaps() {
        // frames exist where index % 2 == 0
        let mut ctx = ctx_with_intervals("2", "1/2");
        assert!(ctx.should_have_frame_at(0));
        assert!(!ctx.should_have_frame_at(1));
        ctx.last_iter = 0;
        assert_eq!(ctx.count_skipped_frames(), 1);
        ctx.last_iter = 1;
        assert_eq!(ctx.count_skipped_frames(), 0);
    }

    #[test]
    fn stats_counters_are_consistent() {
        let mut ctx = Context::new(Headers::new(), Arc::new(FieldDefs::default()));
        ctx.read_frame_count = 10;
        ctx.frame_count = 7;
        ctx.invalid_frame_count = 1;
        let stats = ctx.stats();
        assert_eq!(stats.total, 10);
        assert_eq!(stats.parsed, 7);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.invalid, 1);
        assert!((stats.invalid_percent - 10.0).abs() < 1e-9);
        assert!(stats.parsed + stats.invalid + stats.skipped <= stats.total);
    }
}
