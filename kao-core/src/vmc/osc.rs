//! Minimal OSC 1.0 codec for the VMC addresses the relay speaks.
//!
//! An OSC message is an address pattern, a type-tag string, and the
//! arguments, each 4-byte aligned with NUL padding and numbers in
//! big-endian. Bundles are not supported; the VMC peers the relay talks
//! to send plain messages.

use bytes::{BufMut, Bytes, BytesMut};

/// Outbound command address: apply a blend shape.
pub const BLEND_APPLY_ADDR: &str = "/VMC/Ext/Blend/Apply";

/// Inbound telemetry address prefix; the shape name is the address suffix.
pub const BLEND_VALUE_PREFIX: &str = "/VMC/Ext/Blend/Val";

/// Errors produced while decoding an OSC packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OscError {
    #[error("packet truncated")]
    Truncated,
    #[error("address must start with '/'")]
    BadAddress,
    #[error("type tag string must start with ','")]
    BadTypeTags,
    #[error("string argument is not valid UTF-8")]
    BadUtf8,
    #[error("unsupported type tag '{0}'")]
    UnsupportedType(char),
}

/// One decoded OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Str(String),
    Float(f32),
    Int(i32),
}

/// A decoded OSC message.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// First float argument, if any.
    pub fn first_float(&self) -> Option<f32> {
        self.args.iter().find_map(|arg| match arg {
            OscArg::Float(v) => Some(*v),
            _ => None,
        })
    }
}

/// Encode a `/VMC/Ext/Blend/Apply` command carrying a shape name and an
/// intensity. The caller is responsible for clamping the intensity.
pub fn encode_blend_apply(shape: &str, value: f32) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    put_padded_str(&mut buf, BLEND_APPLY_ADDR);
    put_padded_str(&mut buf, ",sf");
    put_padded_str(&mut buf, shape);
    buf.put_f32(value);
    buf.freeze()
}

/// Decode a single OSC message from a datagram.
pub fn decode(packet: &[u8]) -> Result<OscMessage, OscError> {
    let mut cursor = packet;
    let address = read_padded_str(&mut cursor)?;
    if !address.starts_with('/') {
        return Err(OscError::BadAddress);
    }
    let tags = read_padded_str(&mut cursor)?;
    let tags = tags.strip_prefix(',').ok_or(OscError::BadTypeTags)?;

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            's' => OscArg::Str(read_padded_str(&mut cursor)?),
            'f' => OscArg::Float(f32::from_be_bytes(read_word(&mut cursor)?)),
            'i' => OscArg::Int(i32::from_be_bytes(read_word(&mut cursor)?)),
            other => return Err(OscError::UnsupportedType(other)),
        };
        args.push(arg);
    }
    Ok(OscMessage { address, args })
}

/// Append a NUL-terminated string padded to a 4-byte boundary.
fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
    while buf.len() % 4 != 0 {
        buf.put_u8(0);
    }
}

/// Read a NUL-terminated, 4-byte padded string and advance the cursor.
fn read_padded_str(cursor: &mut &[u8]) -> Result<String, OscError> {
    let nul = cursor
        .iter()
        .position(|&b| b == 0)
        .ok_or(OscError::Truncated)?;
    let s = std::str::from_utf8(&cursor[..nul])
        .map_err(|_| OscError::BadUtf8)?
        .to_owned();
    // Padding rounds (length + terminator) up to the next multiple of 4.
    let advance = (nul / 4 + 1) * 4;
    if advance > cursor.len() {
        return Err(OscError::Truncated);
    }
    *cursor = &cursor[advance..];
    Ok(s)
}

fn read_word(cursor: &mut &[u8]) -> Result<[u8; 4], OscError> {
    if cursor.len() < 4 {
        return Err(OscError::Truncated);
    }
    let (head, rest) = cursor.split_at(4);
    *cursor = rest;
    Ok([head[0], head[1], head[2], head[3]])
}

/// Build a `/VMC/Ext/Blend/Val/<shape>` telemetry frame the way a VMC
/// peer emits it. The relay only decodes these; the encoder exists for
/// tests and peer simulators.
pub fn encode_blend_value(shape: &str, value: f32) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    put_padded_str(&mut buf, &format!("{BLEND_VALUE_PREFIX}/{shape}"));
    put_padded_str(&mut buf, ",f");
    buf.put_f32(value);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_apply_golden_bytes() {
        let packet = encode_blend_apply("Joy", 1.0);
        // 20-byte address + NUL + 3 pad, ",sf" + NUL, "Joy" + NUL, f32.
        assert_eq!(packet.len(), 36);
        assert_eq!(&packet[..20], b"/VMC/Ext/Blend/Apply");
        assert_eq!(&packet[20..24], &[0, 0, 0, 0]);
        assert_eq!(&packet[24..28], b",sf\0");
        assert_eq!(&packet[28..32], b"Joy\0");
        assert_eq!(&packet[32..36], &1.0f32.to_be_bytes());
    }

    #[test]
    fn blend_apply_round_trips() {
        let packet = encode_blend_apply("Sorrow", 0.25);
        let msg = decode(&packet).unwrap();
        assert_eq!(msg.address, BLEND_APPLY_ADDR);
        assert_eq!(
            msg.args,
            vec![OscArg::Str("Sorrow".into()), OscArg::Float(0.25)]
        );
    }

    #[test]
    fn telemetry_packet_decodes() {
        let packet = encode_blend_value("Joy", 0.5);
        let msg = decode(&packet).unwrap();
        assert_eq!(msg.address, "/VMC/Ext/Blend/Val/Joy");
        assert_eq!(msg.first_float(), Some(0.5));
    }

    #[test]
    fn truncated_packet_is_rejected() {
        let packet = encode_blend_apply("Joy", 1.0);
        assert_eq!(decode(&packet[..10]), Err(OscError::Truncated));
        assert_eq!(decode(&packet[..packet.len() - 2]), Err(OscError::Truncated));
    }

    #[test]
    fn missing_slash_is_rejected() {
        let mut buf = BytesMut::new();
        put_padded_str(&mut buf, "#bundle");
        put_padded_str(&mut buf, ",f");
        buf.put_f32(0.0);
        assert_eq!(decode(&buf), Err(OscError::BadAddress));
    }

    #[test]
    fn unsupported_type_tag_is_rejected() {
        let mut buf = BytesMut::new();
        put_padded_str(&mut buf, "/VMC/Ext/T");
        put_padded_str(&mut buf, ",b");
        assert_eq!(decode(&buf), Err(OscError::UnsupportedType('b')));
    }

    #[test]
    fn string_padding_lengths() {
        // 4-byte aligned input still gets a full pad word for the NUL.
        let mut buf = BytesMut::new();
        put_padded_str(&mut buf, "abcd");
        assert_eq!(&buf[..], b"abcd\0\0\0\0");
    }
}
