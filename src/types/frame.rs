use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::parser::decoder::Encoding;
use crate::parser::predictor::Predictor;

/// The kind of a frame, identified by a single tag byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrameType {
    /// `I` keyframe holding absolute values.
    Intra,
    /// `P` delta frame holding residuals against recent history.
    Inter,
    /// `G` GPS position frame.
    Gps,
    /// `H` GPS home position frame.
    GpsHome,
    /// `S` low-rate auxiliary telemetry frame.
    Slow,
    /// `E` event marker frame.
    Event,
}

impl FrameType {
    /// Map a tag byte to a frame type. Any other byte is stream corruption.
    pub fn from_byte(byte: u8) -> Option<FrameType> {
        match byte {
            b'I' => Some(FrameType::Intra),
            b'P' => Some(FrameType::Inter),
            b'G' => Some(FrameType::Gps),
            b'H' => Some(FrameType::GpsHome),
            b'S' => Some(FrameType::Slow),
            b'E' => Some(FrameType::Event),
            _ => None,
        }
    }

    pub fn tag(self) -> char {
        match self {
            FrameType::Intra => 'I',
            FrameType::Inter => 'P',
            FrameType::Gps => 'G',
            FrameType::GpsHome => 'H',
            FrameType::Slow => 'S',
            FrameType::Event => 'E',
        }
    }

    pub fn is_main(self) -> bool {
        matches!(self, FrameType::Intra | FrameType::Inter)
    }
}

/// One field of one frame type, bound to its decode and predict routines.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDef {
    pub frame_type: FrameType,
    pub name: String,
    pub signed: bool,
    pub predictor: Predictor,
    pub encoding: Encoding,
}

/// Field definitions for every frame type of one session, immutable after
/// binding. Name-to-index lookups are precomputed here so predictors can
/// resolve fields like `motor[0]` without scanning.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldDefs {
    defs: HashMap<FrameType, Vec<FieldDef>>,
    name_indices: HashMap<FrameType, HashMap<String, usize>>,
}

impl FieldDefs {
    pub fn get(&self, frame_type: FrameType) -> Option<&[FieldDef]> {
        self.defs.get(&frame_type).map(Vec::as_slice)
    }

    pub fn contains(&self, frame_type: FrameType) -> bool {
        self.defs.contains_key(&frame_type)
    }

    pub fn count(&self, frame_type: FrameType) -> usize {
        self.defs.get(&frame_type).map_or(0, Vec::len)
    }

    pub fn index_of(&self, frame_type: FrameType, name: &str) -> Option<usize> {
        self.name_indices.get(&frame_type)?.get(name).copied()
    }

    pub(crate) fn insert(&mut self, frame_type: FrameType, fields: Vec<FieldDef>) {
        let indices = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        self.name_indices.insert(frame_type, indices);
        self.defs.insert(frame_type, fields);
    }

    pub(crate) fn rename(&mut self, frame_type: FrameType, names: &[String]) {
        if let Some(fields) = self.defs.get_mut(&frame_type) {
            for (field, name) in fields.iter_mut().zip(names) {
                field.name = name.clone();
            }
            let indices = fields
                .iter()
                .enumerate()
                .map(|(i, f)| (f.name.clone(), i))
                .collect();
            self.name_indices.insert(frame_type, indices);
        }
    }
}

/// A decoded frame: the frame type plus one value per field.
///
/// Emitted main frames carry a tail of slow and GPS fields after their own
/// fields; `None` marks a tail position for which no SLOW or GPS frame has
/// been seen yet. Positions belonging to the frame's own fields are always
/// `Some`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    pub frame_type: FrameType,
    pub data: Vec<Option<i64>>,
}

impl Frame {
    pub fn new(frame_type: FrameType, values: Vec<i64>) -> Frame {
        Frame {
            frame_type,
            data: values.into_iter().map(Some).collect(),
        }
    }

    pub(crate) fn empty(frame_type: FrameType) -> Frame {
        Frame {
            frame_type,
            data: Vec::new(),
        }
    }

    /// Value at a field position, if present and not a filler.
    pub fn value_at(&self, index: usize) -> Option<i64> {
        self.data.get(index).copied().flatten()
    }
}

/// Session counters reported once iteration ends (or at any point during it).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats {
    /// Frames whose tag byte was consumed.
    pub total: u64,
    /// Frames decoded, validated and emitted.
    pub parsed: u64,
    /// Frames read but intentionally not emitted (slow, GPS, events).
    pub skipped: u64,
    /// Frames dropped due to corruption or desync.
    pub invalid: u64,
    pub invalid_percent: f64,
}
