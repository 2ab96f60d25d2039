use crate::error::Result;
use crate::parser::decoder::Encoding;
use crate::parser::predictor::Predictor;
use crate::types::{FieldDef, FieldDefs, FrameType, HeaderValue, Headers};

/// Frame types that can carry field definition headers.
const FIELD_FRAME_TYPES: [FrameType; 5] = [
    FrameType::Intra,
    FrameType::Inter,
    FrameType::Gps,
    FrameType::Slow,
    FrameType::GpsHome,
];

/// Bind the `Field <tag> <property>` headers of one session into per-frame
/// field definition tables.
///
/// Unknown predictor or encoding ids are fatal; a session without INTER
/// definitions binds whatever is present and is treated as partial by the
/// caller.
pub fn build_field_defs(headers: &Headers, data_version: i64) -> Result<FieldDefs> {
    let mut defs = FieldDefs::default();
    for frame_type in FIELD_FRAME_TYPES {
        if let Some(fields) = bind_frame_type(headers, frame_type, data_version)? {
            defs.insert(frame_type, fields);
        }
    }
    // INTER fields share their identity with INTRA; the headers only name
    // them once
    if defs.contains(FrameType::Inter) {
        if let Some(intra) = defs.get(FrameType::Intra) {
            let names: Vec<String> = intra.iter().map(|f| f.name.clone()).collect();
            defs.rename(FrameType::Inter, &names);
        }
    }
    Ok(defs)
}

fn bind_frame_type(
    headers: &Headers,
    frame_type: FrameType,
    data_version: i64,
) -> Result<Option<Vec<FieldDef>>> {
    let tag = frame_type.tag();
    let names = property(headers, tag, "name");
    let signed = property(headers, tag, "signed");
    let predictors = property(headers, tag, "predictor");
    let encodings = property(headers, tag, "encoding");

    let count = [&names, &signed, &predictors, &encodings]
        .into_iter()
        .flatten()
        .map(Vec::len)
        .max();
    let Some(count) = count else {
        return Ok(None);
    };

    let mut fields = Vec::with_capacity(count);
    for i in 0..count {
        let name = names
            .as_ref()
            .and_then(|items| items.get(i))
            .map(|v| v.to_string())
            .unwrap_or_default();
        let signed = signed
            .as_ref()
            .and_then(|items| items.get(i))
            .and_then(|v| v.as_int())
            .unwrap_or(0)
            != 0;
        let predictor_id = predictors
            .as_ref()
            .and_then(|items| items.get(i))
            .and_then(|v| v.as_int())
            .unwrap_or(0);
        let encoding_id = encodings
            .as_ref()
            .and_then(|items| items.get(i))
            .and_then(|v| v.as_int())
            .unwrap_or(0);

        let mut predictor = Predictor::from_header(predictor_id)?;
        let encoding = Encoding::from_header(encoding_id, data_version)?;

        // latitude and longitude share predictor id 7 in the headers but
        // must read different home coordinates
        if frame_type == FrameType::Gps && name == "GPS_coord[1]" && predictor == Predictor::HomeLat
        {
            predictor = Predictor::HomeLon;
        }

        fields.push(FieldDef {
            frame_type,
            name,
            signed,
            predictor,
            encoding,
        });
    }
    Ok(Some(fields))
}

/// One `Field <tag> <property>` header as a positional list of values.
fn property(headers: &Headers, tag: char, prop: &str) -> Option<Vec<HeaderValue>> {
    let value = headers.get(&format!("Field {} {}", tag, prop))?;
    Some(match value {
        HeaderValue::List(items) => items.clone(),
        other => vec![other.clone()],
    })
}
