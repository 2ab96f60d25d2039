use crate::error::{Error, Result};
use crate::parser::context::Context;
use crate::types::FrameType;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A field predictor, resolved from its header id at bind time.
///
/// Predictors reconstruct an absolute field value from the decoded residual
/// plus session state: recent main-frame history, the partially decoded
/// current frame, the last GPS home frame, or header constants.
///
/// `HomeLon` never appears in headers under its own id; the binder rewrites
/// predictor 7 on the `GPS_coord[1]` field to it so longitude reads the
/// second home coordinate instead of the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Predictor {
    Noop,
    Previous,
    StraightLine,
    Average2,
    MinThrottle,
    Motor0,
    Increment,
    HomeLat,
    Add1500,
    VBatRef,
    LastMainFrameTime,
    MinMotor,
    HomeLon,
}

impl Predictor {
    pub fn from_header(id: i64) -> Result<Predictor> {
        match id {
            0 => Ok(Predictor::Noop),
            1 => Ok(Predictor::Previous),
            2 => Ok(Predictor::StraightLine),
            3 => Ok(Predictor::Average2),
            4 => Ok(Predictor::MinThrottle),
            5 => Ok(Predictor::Motor0),
            6 => Ok(Predictor::Increment),
            7 => Ok(Predictor::HomeLat),
            8 => Ok(Predictor::Add1500),
            9 => Ok(Predictor::VBatRef),
            10 => Ok(Predictor::LastMainFrameTime),
            11 => Ok(Predictor::MinMotor),
            256 => Ok(Predictor::HomeLon),
            _ => Err(Error::UnknownPredictor(id)),
        }
    }

    pub fn id(self) -> u16 {
        match self {
            Predictor::Noop => 0,
            Predictor::Previous => 1,
            Predictor::StraightLine => 2,
            Predictor::Average2 => 3,
            Predictor::MinThrottle => 4,
            Predictor::Motor0 => 5,
            Predictor::Increment => 6,
            Predictor::HomeLat => 7,
            Predictor::Add1500 => 8,
            Predictor::VBatRef => 9,
            Predictor::LastMainFrameTime => 10,
            Predictor::MinMotor => 11,
            Predictor::HomeLon => 256,
        }
    }

    /// Turn a decoded residual into an absolute value.
    pub fn apply(self, residual: i64, ctx: &Context) -> i64 {
        match self {
            Predictor::Noop => residual,
            Predictor::Previous => residual + ctx.past_value(0, 0),
            Predictor::StraightLine => {
                let prev = ctx.past_value(0, 0);
                let prev2 = ctx.past_value(1, prev);
                residual + 2 * prev - prev2
            }
            Predictor::Average2 => {
                let prev = ctx.past_value(0, 0);
                let prev2 = ctx.past_value(1, prev);
                residual + (prev + prev2) / 2
            }
            Predictor::MinThrottle => residual + ctx.header_int("minthrottle", 0),
            Predictor::Motor0 => {
                residual + ctx.current_value_by_name(FrameType::Intra, "motor[0]", 0)
            }
            // the residual is not on the wire for incrementing counters;
            // reconstruct from history and the logging cadence
            Predictor::Increment => 1 + ctx.past_value(0, 0) + ctx.count_skipped_frames(),
            Predictor::HomeLat => match ctx.last_gps_home.value_at(0) {
                Some(home) => residual + home,
                None => 0,
            },
            Predictor::HomeLon => match ctx.last_gps_home.value_at(1) {
                Some(home) => residual + home,
                None => 0,
            },
            Predictor::Add1500 => residual + 1500,
            Predictor::VBatRef => residual + ctx.header_int("vbatref", 0),
            Predictor::LastMainFrameTime => residual + ctx.past_value(1, 0),
            Predictor::MinMotor => residual + ctx.header_int_at("motorOutput", 0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDef, FieldDefs, Frame, FrameType, HeaderValue, Headers};
    use crate::Encoding;
    use std::sync::Arc;

    fn main_field_defs(names: &[&str]) -> FieldDefs {
        let mut defs = FieldDefs::default();
        for frame_type in [FrameType::Intra, FrameType::Inter] {
            let fields = names
                .iter()
                .map(|&name| FieldDef {
                    frame_type,
                    name: name.to_string(),
                    signed: true,
                    predictor: Predictor::Noop,
                    encoding: Encoding::SignedVb,
                })
                .collect();
            defs.insert(frame_type, fields);
        }
        defs
    }

    fn ctx_with_history(values: &[i64], older: &[i64]) -> Context {
        let defs = main_field_defs(&["a", "b"]);
        let mut ctx = Context::new(Headers::new(), Arc::new(defs));
        ctx.add_frame(Frame::new(FrameType::Intra, older.to_vec()));
        ctx.add_frame(Frame::new(FrameType::Inter, values.to_vec()));
        ctx.frame_type = Some(FrameType::Inter);
        ctx.field_index = 0;
        ctx
    }

    #[test]
    fn previous_adds_newest_history() {
        let ctx = ctx_with_history(&[100, 7], &[90, 5]);
        assert_eq!(Predictor::Previous.apply(-3, &ctx), 97);
        assert_eq!(Predictor::Noop.apply(-3, &ctx), -3);
    }

    #[test]
    fn previous_without_history_falls_back_to_zero() {
        let defs = main_field_defs(&["a"]);
        let mut ctx = Context::new(Headers::new(), Arc::new(defs));
        ctx.frame_type = Some(FrameType::Inter);
        assert_eq!(Predictor::Previous.apply(42, &ctx), 42);
        assert_eq!(Predictor::StraightLine.apply(42, &ctx), 42);
        assert_eq!(Predictor::Average2.apply(42, &ctx), 42);
    }

    #[test]
    fn straight_line_extrapolates() {
        let ctx = ctx_with_history(&[110, 0], &[100, 0]);
        // 2 * 110 - 100 = 120
        assert_eq!(Predictor::StraightLine.apply(5, &ctx), 125);
    }

    #[test]
    fn average2_truncates_toward_zero() {
        let ctx = ctx_with_history(&[-3, 0], &[-4, 0]);
        // (-3 + -4) / 2 = -3 (truncation, not floor)
        assert_eq!(Predictor::Average2.apply(0, &ctx), -3);
        let ctx = ctx_with_history(&[3, 0], &[4, 0]);
        assert_eq!(Predictor::Average2.apply(0, &ctx), 3);
    }

    #[test]
    fn header_constant_predictors() {
        let defs = main_field_defs(&["a"]);
        let mut headers = Headers::new();
        headers.insert("minthrottle".to_string(), HeaderValue::Int(1070));
        headers.insert("vbatref".to_string(), HeaderValue::Int(420));
        headers.insert(
            "motorOutput".to_string(),
            HeaderValue::parse_value("48,2047"),
        );
        let ctx = Context::new(headers, Arc::new(defs));
        assert_eq!(Predictor::MinThrottle.apply(10, &ctx), 1080);
        assert_eq!(Predictor::VBatRef.apply(-20, &ctx), 400);
        assert_eq!(Predictor::MinMotor.apply(2, &ctx), 50);
        assert_eq!(Predictor::Add1500.apply(-250, &ctx), 1250);
    }

    #[test]
    fn header_constants_default_to_zero() {
        let ctx = Context::new(Headers::new(), Arc::new(main_field_defs(&["a"])));
        assert_eq!(Predictor::MinThrottle.apply(10, &ctx), 10);
        assert_eq!(Predictor::VBatRef.apply(10, &ctx), 10);
        assert_eq!(Predictor::MinMotor.apply(10, &ctx), 10);
    }

    #[test]
    fn motor0_reads_partial_current_frame() {
        let defs = main_field_defs(&["time", "motor[0]", "motor[1]"]);
        let mut ctx = Context::new(Headers::new(), Arc::new(defs));
        ctx.frame_type = Some(FrameType::Intra);
        ctx.current_frame = vec![12345, 1480];
        ctx.field_index = 2;
        assert_eq!(Predictor::Motor0.apply(15, &ctx), 1495);
    }

    #[test]
    fn home_coord_predictors_need_a_home_frame() {
        let mut ctx = ctx_with_history(&[0, 0], &[0, 0]);
        assert_eq!(Predictor::HomeLat.apply(123, &ctx), 0);
        assert_eq!(Predictor::HomeLon.apply(123, &ctx), 0);
        ctx.last_gps_home = Frame::new(FrameType::GpsHome, vec![500_000_000, 60_000_000]);
        assert_eq!(Predictor::HomeLat.apply(123, &ctx), 500_000_123);
        assert_eq!(Predictor::HomeLon.apply(-7, &ctx), 59_999_993);
    }

    #[test]
    fn increment_counts_skipped_iterations() {
        let mut ctx = ctx_with_history(&[100, 0], &[99, 0]);
        ctx.last_iter = -1;
        assert_eq!(Predictor::Increment.apply(999, &ctx), 101);
    }

    #[test]
    fn last_main_frame_time_uses_older_history() {
        let ctx = ctx_with_history(&[200, 0], &[150, 0]);
        assert_eq!(Predictor::LastMainFrameTime.apply(3, &ctx), 153);
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert!(matches!(
            Predictor::from_header(12),
            Err(Error::UnknownPredictor(12))
        ));
        assert_eq!(Predictor::from_header(256).unwrap(), Predictor::HomeLon);
    }
}
