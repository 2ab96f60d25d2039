use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Event codes carried by `E` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventType {
    SyncBeep,
    AutotuneCycleStart,
    AutotuneCycleResult,
    AutotuneTargets,
    InflightAdjustment,
    LoggingResume,
    GtuneCycleResult,
    FlightMode,
    TwitchTest,
    Custom,
    CustomBlank,
    LogEnd,
}

impl EventType {
    /// Map a wire byte to an event type. Unknown bytes are corruption.
    pub fn from_byte(byte: u8) -> Option<EventType> {
        match byte {
            0 => Some(EventType::SyncBeep),
            10 => Some(EventType::AutotuneCycleStart),
            11 => Some(EventType::AutotuneCycleResult),
            12 => Some(EventType::AutotuneTargets),
            13 => Some(EventType::InflightAdjustment),
            14 => Some(EventType::LoggingResume),
            20 => Some(EventType::GtuneCycleResult),
            30 => Some(EventType::FlightMode),
            40 => Some(EventType::TwitchTest),
            250 => Some(EventType::Custom),
            251 => Some(EventType::CustomBlank),
            255 => Some(EventType::LogEnd),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            EventType::SyncBeep => 0,
            EventType::AutotuneCycleStart => 10,
            EventType::AutotuneCycleResult => 11,
            EventType::AutotuneTargets => 12,
            EventType::InflightAdjustment => 13,
            EventType::LoggingResume => 14,
            EventType::GtuneCycleResult => 20,
            EventType::FlightMode => 30,
            EventType::TwitchTest => 40,
            EventType::Custom => 250,
            EventType::CustomBlank => 251,
            EventType::LogEnd => 255,
        }
    }
}

/// A decoded event. `data` maps payload field names to values and is empty
/// for event types whose payload format is unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    pub event_type: EventType,
    pub data: HashMap<String, i64>,
}

impl Event {
    pub fn new(event_type: EventType) -> Event {
        Event {
            event_type,
            data: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_mapping_round_trips() {
        for code in [0u8, 10, 11, 12, 13, 14, 20, 30, 40, 250, 251, 255] {
            let ev = EventType::from_byte(code).unwrap();
            assert_eq!(ev.code(), code);
        }
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        assert_eq!(EventType::from_byte(1), None);
        assert_eq!(EventType::from_byte(99), None);
        assert_eq!(EventType::from_byte(254), None);
    }
}
