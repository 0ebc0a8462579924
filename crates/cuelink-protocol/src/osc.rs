//! OSC message encoding and the partial decoding QLab replies need.
//!
//! Every field of an OSC message is a NUL-terminated string padded with
//! zeros to a 4-byte boundary:
//!
//! ```text
//! +-------------------+------------------+-------------------------+
//! | address\0 (pad 4) | ,s\0\0 or ,\0\0\0 | argument\0 (pad 4)      |
//! +-------------------+------------------+-------------------------+
//! ```
//!
//! Only the no-argument and single-string-argument forms are produced.
//! Inbound packets are not decoded per their type tag: replies carry raw
//! JSON after the header, so only the address is recovered here and the
//! payload is searched for the JSON block.

/// Size of the type-tag block for messages with at most one argument.
pub const TYPE_TAG_BLOCK_LEN: usize = 4;

/// Returns the on-wire size of a string of `len` bytes: the bytes, at
/// least one NUL, then zero padding up to a multiple of 4.
pub fn padded_len(len: usize) -> usize {
    (len + 1).next_multiple_of(4)
}

fn push_padded(buffer: &mut Vec<u8>, value: &str) {
    buffer.extend_from_slice(value.as_bytes());
    let padding = padded_len(value.len()) - value.len();
    buffer.resize(buffer.len() + padding, 0);
}

/// Encodes an OSC message with an optional single string argument.
///
/// # Example
///
/// ```rust
/// use cuelink_protocol::osc::encode;
///
/// let packet = encode("/go", None);
/// assert_eq!(packet, b"/go\0,\0\0\0");
/// ```
pub fn encode(address: &str, arg: Option<&str>) -> Vec<u8> {
    let type_tag = if arg.is_some() { ",s" } else { "," };
    let capacity =
        padded_len(address.len()) + TYPE_TAG_BLOCK_LEN + arg.map_or(0, |a| padded_len(a.len()));

    let mut buffer = Vec::with_capacity(capacity);
    push_padded(&mut buffer, address);
    push_padded(&mut buffer, type_tag);
    if let Some(arg) = arg {
        push_padded(&mut buffer, arg);
    }
    buffer
}

/// Returns the address: everything before the first NUL, or an empty
/// string when the packet has no NUL at all.
pub fn decode_address(raw: &[u8]) -> String {
    match raw.iter().position(|&b| b == 0) {
        Some(end) => String::from_utf8_lossy(&raw[..end]).into_owned(),
        None => String::new(),
    }
}

/// Splits a packet into its address and the bytes after the padded
/// address field.
///
/// A packet without a NUL yields an empty address and an empty payload.
pub fn split_packet(raw: &[u8]) -> (String, &[u8]) {
    let Some(end) = raw.iter().position(|&b| b == 0) else {
        return (String::new(), &[]);
    };
    let address = String::from_utf8_lossy(&raw[..end]).into_owned();
    let payload = raw.get(padded_len(end)..).unwrap_or_default();
    (address, payload)
}

/// Returns the text from the first `{` to the last `}` inclusive.
///
/// Returns `None` when either brace is missing or they are out of order.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// The string argument of an update notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateArgument {
    /// The message has no argument.
    Missing,
    /// The argument is an empty string: the value was cleared.
    Cleared,
    /// The argument value.
    Value(String),
}

impl UpdateArgument {
    /// Returns the value, treating both missing and cleared as `None`.
    pub fn into_value(self) -> Option<String> {
        match self {
            Self::Value(value) => Some(value),
            Self::Missing | Self::Cleared => None,
        }
    }
}

/// Reads the single string argument of an update notification.
///
/// The first comma marks the type-tag block; the argument starts right
/// after the fixed [`TYPE_TAG_BLOCK_LEN`]-byte block.
pub fn extract_update_argument(raw: &[u8]) -> UpdateArgument {
    extract_update_argument_with(raw, TYPE_TAG_BLOCK_LEN)
}

/// [`extract_update_argument`] with an explicit type-tag block length.
pub fn extract_update_argument_with(raw: &[u8], type_tag_len: usize) -> UpdateArgument {
    let Some(comma) = raw.iter().position(|&b| b == b',') else {
        return UpdateArgument::Missing;
    };
    let rest = match raw.get(comma + type_tag_len..) {
        Some(rest) if !rest.is_empty() => rest,
        _ => return UpdateArgument::Missing,
    };

    match rest.iter().position(|&b| b == 0) {
        Some(0) => UpdateArgument::Cleared,
        Some(end) => UpdateArgument::Value(String::from_utf8_lossy(&rest[..end]).into_owned()),
        None => UpdateArgument::Value(String::from_utf8_lossy(rest).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscMessage, OscPacket, OscType};

    #[test]
    fn padded_len_always_leaves_a_terminator() {
        assert_eq!(padded_len(0), 4);
        assert_eq!(padded_len(3), 4);
        assert_eq!(padded_len(4), 8);
        assert_eq!(padded_len(7), 8);
        assert_eq!(padded_len(8), 12);
    }

    #[test]
    fn encode_without_argument() {
        assert_eq!(encode("/go", None), b"/go\0,\0\0\0");
        assert_eq!(encode("/panic", None), b"/panic\0\0,\0\0\0");
    }

    #[test]
    fn encode_with_argument() {
        let packet = encode("/connect", Some("1234"));
        assert_eq!(packet, b"/connect\0\0\0\0,s\0\01234\0\0\0\0");
    }

    #[test]
    fn encoded_packets_are_aligned() {
        let addresses = ["", "/", "/go", "/wsp", "/workspace/ABC-123/cue_id/XYZ/name"];
        let args = [None, Some(""), Some("a"), Some("abc"), Some("abcd"), Some("Act II")];

        for address in addresses {
            for arg in args {
                let packet = encode(address, arg);
                assert_eq!(packet.len() % 4, 0, "{address:?} {arg:?}");
                let terminator = address.len();
                assert!(terminator < padded_len(address.len()));
                assert_eq!(packet[terminator], 0);
            }
        }
    }

    #[test]
    fn decode_address_recovers_encoded_address() {
        for address in ["/go", "/workspaces", "/workspace/ABC/playhead/next"] {
            assert_eq!(decode_address(&encode(address, None)), address);
            assert_eq!(decode_address(&encode(address, Some("x"))), address);
        }
    }

    #[test]
    fn decode_address_without_nul_is_empty() {
        assert_eq!(decode_address(b"/go"), "");
        assert_eq!(decode_address(b""), "");
    }

    #[test]
    fn split_packet_returns_payload_after_address() {
        let packet = encode("/reply/workspaces", Some("{}"));
        let (address, payload) = split_packet(&packet);
        assert_eq!(address, "/reply/workspaces");
        assert_eq!(&payload[..4], b",s\0\0");
        assert_eq!(&payload[4..6], b"{}");
    }

    #[test]
    fn extract_json_finds_outer_object() {
        let text = ",s\0\0{\"data\":[{\"uniqueID\":\"A\"}]}\0\0";
        assert_eq!(extract_json(text), Some("{\"data\":[{\"uniqueID\":\"A\"}]}"));
    }

    #[test]
    fn extract_json_tolerates_garbage() {
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("no braces"), None);
        assert_eq!(extract_json("{ unterminated"), None);
        assert_eq!(extract_json("} backwards {"), None);
        assert_eq!(extract_json("{}"), Some("{}"));
    }

    #[test]
    fn string_argument_round_trips() {
        for arg in ["", "A", "cue-42", "Scene 3: Storm"] {
            let packet = encode("/update/workspace/W/cueList/L/playbackPosition", Some(arg));
            let expected = if arg.is_empty() {
                UpdateArgument::Cleared
            } else {
                UpdateArgument::Value(arg.to_string())
            };
            assert_eq!(extract_update_argument(&packet), expected);
        }
    }

    #[test]
    fn update_without_argument_is_missing() {
        let packet = encode("/update/workspace/W", None);
        assert_eq!(extract_update_argument(&packet), UpdateArgument::Missing);
        assert_eq!(extract_update_argument(b"/no/type/tag\0\0\0\0"), UpdateArgument::Missing);
    }

    #[test]
    fn update_argument_into_value() {
        assert_eq!(UpdateArgument::Value("A".into()).into_value(), Some("A".into()));
        assert_eq!(UpdateArgument::Cleared.into_value(), None);
        assert_eq!(UpdateArgument::Missing.into_value(), None);
    }

    #[test]
    fn encoded_packets_decode_as_osc() {
        let packet = encode("/workspace/W/cue_id/C/name", Some("Storm"));
        let (rest, decoded) = rosc::decoder::decode_udp(&packet).unwrap();
        assert!(rest.is_empty());

        match decoded {
            OscPacket::Message(message) => {
                assert_eq!(message.addr, "/workspace/W/cue_id/C/name");
                assert_eq!(message.args, vec![OscType::String("Storm".to_string())]);
            }
            OscPacket::Bundle(_) => panic!("expected a message"),
        }
    }

    #[test]
    fn reads_arguments_encoded_by_other_implementations() {
        let message = OscMessage {
            addr: "/update/workspace/W/cueList/L/playbackPosition".to_string(),
            args: vec![OscType::String("CUE-7".to_string())],
        };
        let packet = rosc::encoder::encode(&OscPacket::Message(message)).unwrap();

        assert_eq!(
            decode_address(&packet),
            "/update/workspace/W/cueList/L/playbackPosition"
        );
        assert_eq!(
            extract_update_argument(&packet),
            UpdateArgument::Value("CUE-7".to_string())
        );
        assert_eq!(packet, encode("/update/workspace/W/cueList/L/playbackPosition", Some("CUE-7")));
    }
}
