use crate::error::{Error, Result};
use crate::parser::context::Context;
use crate::parser::stream::{
    sign_extend_14bit, sign_extend_16bit, sign_extend_24bit, sign_extend_2bit, sign_extend_4bit,
    sign_extend_6bit, sign_extend_8bit, ByteStream,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A numeric field encoding, resolved from its header id at bind time.
///
/// Only decodable encodings exist as variants: id 8 resolves to the v2
/// routine when the session's data version allows it, and ids whose wire
/// format is unspecified (8 below v2, 10) are rejected during binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Encoding {
    SignedVb,
    UnsignedVb,
    Neg14Bit,
    Tag8_8Svb,
    Tag2_3S32,
    Tag8_4S16V2,
    Null,
}

/// Result of decoding one field position: a single value, or a run of
/// values produced by a grouped encoding and consumed by as many field
/// definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Scalar(i64),
    Group(Vec<i64>),
}

impl Encoding {
    /// Resolve a header encoding id, specializing versioned encodings once.
    pub fn from_header(id: i64, data_version: i64) -> Result<Encoding> {
        match id {
            0 => Ok(Encoding::SignedVb),
            1 => Ok(Encoding::UnsignedVb),
            3 => Ok(Encoding::Neg14Bit),
            6 => Ok(Encoding::Tag8_8Svb),
            7 => Ok(Encoding::Tag2_3S32),
            8 if data_version >= 2 => Ok(Encoding::Tag8_4S16V2),
            9 => Ok(Encoding::Null),
            8 | 10 => Err(Error::UnsupportedEncoding {
                encoding: id,
                data_version,
            }),
            _ => Err(Error::UnknownEncoding(id)),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Encoding::SignedVb => 0,
            Encoding::UnsignedVb => 1,
            Encoding::Neg14Bit => 3,
            Encoding::Tag8_8Svb => 6,
            Encoding::Tag2_3S32 => 7,
            Encoding::Tag8_4S16V2 => 8,
            Encoding::Null => 9,
        }
    }

    /// Decode one field position from the stream.
    pub fn decode(self, stream: &mut ByteStream, ctx: &Context) -> Result<DecodedValue> {
        match self {
            Encoding::SignedVb => Ok(DecodedValue::Scalar(stream.read_signed_vb()? as i64)),
            Encoding::UnsignedVb => Ok(DecodedValue::Scalar(stream.read_unsigned_vb()? as i64)),
            Encoding::Neg14Bit => {
                let value = stream.read_unsigned_vb()?;
                Ok(DecodedValue::Scalar(-(sign_extend_14bit(value) as i64)))
            }
            Encoding::Null => Ok(DecodedValue::Scalar(0)),
            Encoding::Tag8_8Svb => decode_tag8_8svb(stream, ctx),
            Encoding::Tag2_3S32 => decode_tag2_3s32(stream),
            Encoding::Tag8_4S16V2 => decode_tag8_4s16_v2(stream),
        }
    }
}

/// Runs of up to 8 adjacent fields with this encoding share one presence
/// bitmap. The run length is the number of consecutive same-encoding fields
/// starting at the current one, cut off at the first other encoding or the
/// end of the definitions. A run of one degenerates to a plain signed VLQ.
fn decode_tag8_8svb(stream: &mut ByteStream, ctx: &Context) -> Result<DecodedValue> {
    let fields = ctx
        .frame_type
        .and_then(|ft| ctx.field_defs.get(ft))
        .unwrap_or(&[]);
    let start = ctx.field_index;
    let mut group = 1;
    while group < 8
        && start + group < fields.len()
        && fields[start + group].encoding == Encoding::Tag8_8Svb
    {
        group += 1;
    }
    if group == 1 {
        return Ok(DecodedValue::Scalar(stream.read_signed_vb()? as i64));
    }
    let mut header = stream.next_byte()?;
    let mut values = Vec::with_capacity(group);
    for _ in 0..group {
        if header & 0x01 != 0 {
            values.push(stream.read_signed_vb()? as i64);
        } else {
            values.push(0);
        }
        header >>= 1;
    }
    Ok(DecodedValue::Group(values))
}

/// Three fields packed behind a two-bit subformat selector in the lead byte.
fn decode_tag2_3s32(stream: &mut ByteStream) -> Result<DecodedValue> {
    let lead = stream.next_byte()? as u32;
    let values = match lead >> 6 {
        0 => {
            // three 2-bit fields in the low six bits of the lead byte
            vec![
                sign_extend_2bit((lead >> 4) & 0x03) as i64,
                sign_extend_2bit((lead >> 2) & 0x03) as i64,
                sign_extend_2bit(lead & 0x03) as i64,
            ]
        }
        1 => {
            let v1 = sign_extend_4bit(lead & 0x0f) as i64;
            let next = stream.next_byte()? as u32;
            vec![
                v1,
                sign_extend_4bit(next >> 4) as i64,
                sign_extend_4bit(next & 0x0f) as i64,
            ]
        }
        2 => {
            let v1 = sign_extend_6bit(lead & 0x3f) as i64;
            let v2 = sign_extend_6bit(stream.next_byte()? as u32 & 0x3f) as i64;
            let v3 = sign_extend_6bit(stream.next_byte()? as u32 & 0x3f) as i64;
            vec![v1, v2, v3]
        }
        _ => {
            // per-field width selectors, low bit pair first
            let mut selector = lead;
            let mut values = Vec::with_capacity(3);
            for _ in 0..3 {
                let value = match selector & 0x03 {
                    0 => sign_extend_8bit(stream.next_byte()? as u32) as i64,
                    1 => {
                        let b1 = stream.next_byte()? as u32;
                        let b2 = stream.next_byte()? as u32;
                        sign_extend_16bit(b1 | (b2 << 8)) as i64
                    }
                    2 => {
                        let b1 = stream.next_byte()? as u32;
                        let b2 = stream.next_byte()? as u32;
                        let b3 = stream.next_byte()? as u32;
                        sign_extend_24bit(b1 | (b2 << 8) | (b3 << 16)) as i64
                    }
                    _ => {
                        let b1 = stream.next_byte()? as u32;
                        let b2 = stream.next_byte()? as u32;
                        let b3 = stream.next_byte()? as u32;
                        let b4 = stream.next_byte()? as u32;
                        (b1 | (b2 << 8) | (b3 << 16) | (b4 << 24)) as i64
                    }
                };
                values.push(value);
                selector >>= 2;
            }
            values
        }
    };
    Ok(DecodedValue::Group(values))
}

/// Four fields sized by two-bit sub-selectors, nibble-packed. 4-bit fields
/// alternate between the high and low nibble of a shared buffer byte; a
/// pending low nibble re-aligns following 8- and 16-bit reads.
fn decode_tag8_4s16_v2(stream: &mut ByteStream) -> Result<DecodedValue> {
    let selector = stream.next_byte()?;
    let mut values = Vec::with_capacity(4);
    let mut nibble_pending = false;
    let mut buffer = 0u8;
    for i in 0..4 {
        match (selector >> (i * 2)) & 0x03 {
            0 => values.push(0),
            1 => {
                if nibble_pending {
                    values.push(sign_extend_4bit((buffer & 0x0f) as u32) as i64);
                    nibble_pending = false;
                } else {
                    buffer = stream.next_byte()?;
                    values.push(sign_extend_4bit((buffer >> 4) as u32) as i64);
                    nibble_pending = true;
                }
            }
            2 => {
                if nibble_pending {
                    let mut value = (buffer & 0x0f) << 4;
                    buffer = stream.next_byte()?;
                    value |= buffer >> 4;
                    values.push(sign_extend_8bit(value as u32) as i64);
                } else {
                    values.push(sign_extend_8bit(stream.next_byte()? as u32) as i64);
                }
            }
            _ => {
                if nibble_pending {
                    let b1 = stream.next_byte()? as u32;
                    let b2 = stream.next_byte()? as u32;
                    let value = (((buffer & 0x0f) as u32) << 12) | (b1 << 4) | (b2 >> 4);
                    values.push(sign_extend_16bit(value) as i64);
                    buffer = b2 as u8;
                } else {
                    let b1 = stream.next_byte()? as u32;
                    let b2 = stream.next_byte()? as u32;
                    values.push(sign_extend_16bit((b1 << 8) | b2) as i64);
                }
            }
        }
    }
    Ok(DecodedValue::Group(values))
}
