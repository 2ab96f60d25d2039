//! Writers for decoded session data.
//!
//! CSV gets one column per emitted field and one row per frame; filler
//! positions become empty cells. Events serialize to JSON.

#[cfg(any(feature = "csv", feature = "json"))]
use anyhow::Result;

#[cfg(any(feature = "csv", feature = "json"))]
use crate::parser::Parser;

/// Stream every frame of the selected session to CSV.
#[cfg(feature = "csv")]
pub fn write_csv<W: std::io::Write>(parser: &mut Parser, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(parser.field_names())?;
    let mut record = Vec::new();
    for frame in parser.frames() {
        record.clear();
        record.extend(
            frame
                .data
                .iter()
                .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
        );
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Dump the events accumulated so far as pretty-printed JSON.
#[cfg(feature = "json")]
pub fn write_events_json<W: std::io::Write>(parser: &Parser, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, parser.events())?;
    Ok(())
}

#[cfg(all(test, feature = "csv"))]
mod tests {
    use super::*;
    use crate::reader::{Reader, ReaderOptions};

    fn parser_for(data: Vec<u8>) -> Parser {
        Parser::new(Reader::from_bytes(data, ReaderOptions::default()).unwrap())
    }

    #[test]
    fn csv_header_row_matches_field_names() {
        let mut data = Vec::new();
        data.extend_from_slice(b"H Product:Blackbox flight data recorder\n");
        data.extend_from_slice(b"H Data version:2\n");
        data.extend_from_slice(b"H Field I name:loopIteration,time,gyroADC[0]\n");
        data.extend_from_slice(b"H Field I signed:0,0,1\n");
        data.extend_from_slice(b"H Field I predictor:0,0,0\n");
        data.extend_from_slice(b"H Field I encoding:1,1,0\n");
        data.extend_from_slice(b"H Field P predictor:6,2,1\n");
        data.extend_from_slice(b"H Field P encoding:9,0,0\n");
        // one keyframe: loopIteration 1, time 1000, gyro -5
        data.extend_from_slice(&[b'I', 0x01, 0xe8, 0x07, 0x09]);
        data.extend_from_slice(&[b'E', 0xff]);
        data.extend_from_slice(b"End of log\x00");

        let mut parser = parser_for(data);
        let mut out = Vec::new();
        write_csv(&mut parser, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("loopIteration,time,gyroADC[0]"));
        assert_eq!(lines.next(), Some("1,1000,-5"));
        assert_eq!(lines.next(), None);
    }
}
