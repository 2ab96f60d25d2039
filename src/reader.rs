use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::parser::header::build_field_defs;
use crate::types::{FieldDefs, HeaderValue, Headers};

/// Headers the decoder relies on; absence is tolerated but worth a warning
/// since the defaults change decoded values.
const EXPECTED_HEADERS: [&str; 6] = [
    "Data version",
    "I interval",
    "P interval",
    "minthrottle",
    "motorOutput",
    "vbatref",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Recover from a malformed header line by skipping ahead to the first
    /// keyframe tag instead of failing.
    pub allow_invalid_header: bool,
}

/// Loads a blackbox file, locates its log sessions and splits the selected
/// session into a parsed header block and a binary frame-data region.
///
/// A file may concatenate several sessions; each repeats the byte-exact
/// first header line of the file, which is what the locator searches for.
pub struct Reader {
    data: Vec<u8>,
    session_offsets: Vec<usize>,
    options: ReaderOptions,
    index: usize,
    headers: Headers,
    field_defs: Arc<FieldDefs>,
    frame_data_start: usize,
    frame_data_end: usize,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>) -> Result<Reader> {
        Reader::open_with(path, ReaderOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Reader> {
        Reader::from_bytes(std::fs::read(path)?, options)
    }

    /// Build a reader over an in-memory file image and select its first
    /// session.
    pub fn from_bytes(data: Vec<u8>, options: ReaderOptions) -> Result<Reader> {
        let session_offsets = locate_sessions(&data)?;
        debug!("found {} log session(s)", session_offsets.len());
        let mut reader = Reader {
            data,
            session_offsets,
            options,
            index: 0,
            headers: Headers::new(),
            field_defs: Arc::new(FieldDefs::default()),
            frame_data_start: 0,
            frame_data_end: 0,
        };
        reader.set_log_index(1)?;
        Ok(reader)
    }

    pub fn log_count(&self) -> usize {
        self.session_offsets.len()
    }

    /// 1-based index of the selected session.
    pub fn log_index(&self) -> usize {
        self.index
    }

    /// Select a session, reparsing its headers and rebinding field
    /// definitions.
    pub fn set_log_index(&mut self, index: usize) -> Result<()> {
        if index < 1 || index > self.session_offsets.len() {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.session_offsets.len(),
            });
        }
        let start = self.session_offsets[index - 1];
        let end = self
            .session_offsets
            .get(index)
            .copied()
            .unwrap_or(self.data.len());
        let (headers, frame_data_start) =
            parse_header_block(&self.data, start, end, self.options)?;
        for key in EXPECTED_HEADERS {
            if !headers.contains_key(key) {
                warn!("header not found: {} (using its default)", key);
            }
        }
        let data_version = headers
            .get("Data version")
            .and_then(|v| v.as_int())
            .unwrap_or(1);
        self.field_defs = Arc::new(build_field_defs(&headers, data_version)?);
        self.headers = headers;
        self.frame_data_start = frame_data_start;
        self.frame_data_end = end;
        self.index = index;
        Ok(())
    }

    /// Raw headers of the selected session, field definitions included.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn field_defs(&self) -> &Arc<FieldDefs> {
        &self.field_defs
    }

    /// The binary frame-data region of the selected session.
    pub fn frame_data(&self) -> &[u8] {
        &self.data[self.frame_data_start..self.frame_data_end]
    }
}

/// Offsets of every session start: all byte-exact occurrences of the first
/// header line.
fn locate_sessions(data: &[u8]) -> Result<Vec<usize>> {
    let first_line_end = data
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(data.len());
    let marker = &data[..first_line_end];
    if marker.first() != Some(&b'H') {
        return Err(Error::NoSessions);
    }
    let mut offsets = Vec::new();
    let mut at = 0;
    while at + marker.len() <= data.len() {
        if &data[at..at + marker.len()] == marker {
            offsets.push(at);
            at += marker.len();
        } else {
            at += 1;
        }
    }
    Ok(offsets)
}

/// Parse consecutive `H name:value` lines from `start`; the first line not
/// opening with `H` begins the binary frame data.
fn parse_header_block(
    data: &[u8],
    start: usize,
    end: usize,
    options: ReaderOptions,
) -> Result<(Headers, usize)> {
    let mut headers = Headers::new();
    let mut at = start;
    while at < end && data[at] == b'H' {
        let line_end = data[at..end]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| at + i)
            .unwrap_or(end);
        match parse_header_line(&data[at..line_end]) {
            Ok((name, value)) => {
                headers.insert(name, value);
            }
            Err(reason) => {
                if !options.allow_invalid_header {
                    return Err(Error::HeaderMalformed { offset: at, reason });
                }
                warn!("malformed header at byte {}: {}", at, reason);
                let resync = data[at..end]
                    .iter()
                    .position(|&b| b == b'I')
                    .map(|i| at + i)
                    .unwrap_or(end);
                return Ok((headers, resync));
            }
        }
        at = line_end + 1;
    }
    Ok((headers, at.min(end)))
}

fn parse_header_line(line: &[u8]) -> std::result::Result<(String, HeaderValue), String> {
    if !line.is_ascii() {
        return Err("non-ascii bytes in header range".to_string());
    }
    let text =
        std::str::from_utf8(line).map_err(|_| "non-ascii bytes in header range".to_string())?;
    let body = text.strip_prefix("H ").unwrap_or(text);
    let (name, value) = body
        .split_once(':')
        .ok_or_else(|| "missing ':' separator".to_string())?;
    Ok((name.trim().to_string(), HeaderValue::parse_value(value.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(extra_headers: &str, frame_data: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"H Product:Blackbox flight data recorder\n");
        data.extend_from_slice(b"H Data version:2\n");
        data.extend_from_slice(extra_headers.as_bytes());
        data.extend_from_slice(frame_data);
        data
    }

    #[test]
    fn splits_headers_from_frame_data() {
        let data = session("H vbatref:420\n", b"IPGE");
        let reader = Reader::from_bytes(data, ReaderOptions::default()).unwrap();
        assert_eq!(reader.log_count(), 1);
        assert_eq!(
            reader.headers().get("Data version"),
            Some(&HeaderValue::Int(2))
        );
        assert_eq!(reader.headers().get("vbatref"), Some(&HeaderValue::Int(420)));
        assert_eq!(reader.frame_data(), b"IPGE");
    }

    #[test]
    fn locates_concatenated_sessions() {
        let mut data = session("", b"III\n");
        let second = session("H vbatref:100\n", b"PPP");
        data.extend_from_slice(&second);
        let mut reader = Reader::from_bytes(data, ReaderOptions::default()).unwrap();
        assert_eq!(reader.log_count(), 2);
        assert_eq!(reader.frame_data(), b"III\n");
        assert!(reader.headers().get("vbatref").is_none());

        reader.set_log_index(2).unwrap();
        assert_eq!(reader.frame_data(), b"PPP");
        assert_eq!(reader.headers().get("vbatref"), Some(&HeaderValue::Int(100)));
    }

    #[test]
    fn index_out_of_range_is_fatal() {
        let data = session("", b"I");
        let mut reader = Reader::from_bytes(data, ReaderOptions::default()).unwrap();
        assert!(matches!(
            reader.set_log_index(0),
            Err(Error::IndexOutOfRange { index: 0, count: 1 })
        ));
        assert!(matches!(
            reader.set_log_index(2),
            Err(Error::IndexOutOfRange { index: 2, count: 1 })
        ));
    }

    #[test]
    fn reselecting_the_same_index_is_observably_unchanged() {
        let data = session("H looptime:500\n", b"IP");
        let mut reader = Reader::from_bytes(data, ReaderOptions::default()).unwrap();
        let headers = reader.headers().clone();
        let frame_data = reader.frame_data().to_vec();
        reader.set_log_index(1).unwrap();
        assert_eq!(reader.headers(), &headers);
        assert_eq!(reader.frame_data(), frame_data.as_slice());
    }

    #[test]
    fn garbage_input_has_no_sessions() {
        assert!(matches!(
            Reader::from_bytes(b"not a log".to_vec(), ReaderOptions::default()),
            Err(Error::NoSessions)
        ));
        assert!(matches!(
            Reader::from_bytes(Vec::new(), ReaderOptions::default()),
            Err(Error::NoSessions)
        ));
    }

    #[test]
    fn malformed_header_line_is_fatal_by_default() {
        let data = session("H broken line without separator\n", b"I");
        assert!(matches!(
            Reader::from_bytes(data, ReaderOptions::default()),
            Err(Error::HeaderMalformed { .. })
        ));
    }

    #[test]
    fn malformed_header_line_can_resync_on_keyframe() {
        let data = session("H broken line without separator\njunk", b"IPI");
        let options = ReaderOptions {
            allow_invalid_header: true,
        };
        let reader = Reader::from_bytes(data, options).unwrap();
        assert_eq!(reader.frame_data(), b"IPI");
    }

    #[test]
    fn header_values_parse_hex_and_lists() {
        let data = session("H motorOutput:48,2047\nH enabled_features:0x8000\n", b"I");
        let reader = Reader::from_bytes(data, ReaderOptions::default()).unwrap();
        assert_eq!(
            reader.headers().get("motorOutput").unwrap().int_at(1),
            Some(2047)
        );
        assert_eq!(
            reader.headers().get("enabled_features"),
            Some(&HeaderValue::Int(0x8000))
        );
    }
}
