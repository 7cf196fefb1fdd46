//! Datagram wire formats
//!
//! Two encodings are accepted on the same socket, told apart by the first
//! non-whitespace byte:
//!
//! * **Indexed text**: `<decimal-index>:<utf8-text>`. The index is one or
//!   more ASCII digits. Everything after the first `:` is the entry,
//!   verbatim, newlines included. One datagram is one entry.
//! * **Connector JSON**: `{"tabs": [..], "log1": "..", "log2": ".."}` as
//!   sent by the Maurina connectors. `logN` targets channel `N - 1`, empty
//!   values are skipped, and `tabs` renames channels by position.

use serde_json::Value;

use crate::error::DecodeError;

/// Separator between the index and the payload
pub const INDEX_SEPARATOR: u8 = b':';

/// Key prefix of connector log fields
const CONNECTOR_LOG_PREFIX: &str = "log";

/// Key of the connector caption list
const CONNECTOR_TABS_KEY: &str = "tabs";

/// A decoded datagram, validated against the channel count
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    /// Entries to append, in channel order
    pub entries: Vec<(usize, String)>,
    /// Captions announced by the sender, by position; `None` leaves that
    /// channel's caption alone
    pub captions: Option<Vec<Option<String>>>,
}

impl Packet {
    /// Packet holding a single entry
    pub fn entry(index: usize, text: impl Into<String>) -> Self {
        Self {
            entries: vec![(index, text.into())],
            captions: None,
        }
    }

    /// The single entry of an indexed-text packet
    pub fn single(&self) -> Option<(usize, &str)> {
        match self.entries.as_slice() {
            [(index, text)] => Some((*index, text.as_str())),
            _ => None,
        }
    }
}

/// Decode a raw datagram for a console with `channel_count` channels
pub fn decode(raw: &[u8], channel_count: usize) -> Result<Packet, DecodeError> {
    match raw.iter().find(|b| !b.is_ascii_whitespace()) {
        None => Err(DecodeError::Empty),
        Some(b'{') => decode_connector(raw, channel_count),
        Some(_) => decode_indexed(raw, channel_count),
    }
}

/// Decode the `<index>:<text>` encoding
pub fn decode_indexed(raw: &[u8], channel_count: usize) -> Result<Packet, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }

    let sep = raw
        .iter()
        .position(|&b| b == INDEX_SEPARATOR)
        .ok_or(DecodeError::MissingSeparator)?;
    let (head, rest) = raw.split_at(sep);

    let index = parse_index(head)?;
    if index >= channel_count {
        return Err(DecodeError::OutOfRange(index));
    }

    let text = std::str::from_utf8(&rest[1..]).map_err(|_| DecodeError::InvalidUtf8)?;
    Ok(Packet::entry(index, text))
}

fn parse_index(head: &[u8]) -> Result<usize, DecodeError> {
    if head.is_empty() || !head.iter().all(u8::is_ascii_digit) {
        return Err(DecodeError::InvalidIndex);
    }
    // Digits only, so this cannot fail on encoding; it fails on overflow.
    std::str::from_utf8(head)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or(DecodeError::InvalidIndex)
}

/// Decode the connector JSON encoding
pub fn decode_connector(raw: &[u8], channel_count: usize) -> Result<Packet, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?;
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| DecodeError::InvalidJson("expected an object".into()))?;

    let captions = match object.get(CONNECTOR_TABS_KEY) {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .take(channel_count)
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Vec<_>>(),
        ),
        Some(_) => return Err(DecodeError::InvalidJson("tabs must be an array".into())),
        None => None,
    }
    .filter(|c| c.iter().any(Option::is_some));

    let mut entries: Vec<(usize, String)> = object
        .iter()
        .filter_map(|(key, value)| {
            let number = key.strip_prefix(CONNECTOR_LOG_PREFIX)?.parse::<usize>().ok()?;
            let index = number.checked_sub(1)?;
            let text = value.as_str()?;
            (index < channel_count && !text.is_empty()).then(|| (index, text.to_string()))
        })
        .collect();
    entries.sort_by_key(|(index, _)| *index);

    if entries.is_empty() && captions.is_none() {
        return Err(DecodeError::NothingToDisplay);
    }

    Ok(Packet { entries, captions })
}

/// Encode an entry in the indexed-text format
pub fn encode_indexed(index: usize, text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 4);
    out.extend_from_slice(index.to_string().as_bytes());
    out.push(INDEX_SEPARATOR);
    out.extend_from_slice(text.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_indexed_basic() {
        let packet = decode(b"0:hello", 2).unwrap();
        assert_eq!(packet.single(), Some((0, "hello")));
        assert!(packet.captions.is_none());
    }

    #[test]
    fn test_indexed_payload_keeps_separators_and_newlines() {
        let packet = decode(b"1:a:b\nsecond line\n", 2).unwrap();
        assert_eq!(packet.single(), Some((1, "a:b\nsecond line\n")));
    }

    #[test]
    fn test_indexed_empty_payload_is_an_entry() {
        let packet = decode(b"0:", 1).unwrap();
        assert_eq!(packet.single(), Some((0, "")));
    }

    #[test]
    fn test_indexed_rejections() {
        assert_eq!(decode(b"", 2), Err(DecodeError::Empty));
        assert_eq!(decode(b"  \n", 2), Err(DecodeError::Empty));
        assert_eq!(decode(b"hello", 2), Err(DecodeError::MissingSeparator));
        assert_eq!(decode(b":hello", 2), Err(DecodeError::InvalidIndex));
        assert_eq!(decode(b"-1:hello", 2), Err(DecodeError::InvalidIndex));
        assert_eq!(decode(b" 1:hello", 2), Err(DecodeError::InvalidIndex));
        assert_eq!(decode(b"x1:hello", 2), Err(DecodeError::InvalidIndex));
        assert_eq!(
            decode(b"99999999999999999999999999:x", 2),
            Err(DecodeError::InvalidIndex)
        );
        assert_eq!(decode(b"9:bad", 2), Err(DecodeError::OutOfRange(9)));
        assert_eq!(decode(b"2:bad", 2), Err(DecodeError::OutOfRange(2)));
        assert_eq!(decode(b"0:\xff\xfe", 2), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_connector_message() {
        let raw = br#"{"tabs":["&User","&Errors","&Request","&Session"],"log1":"","log2":"boom","log3":"","log4":""}"#;
        let packet = decode(raw, 4).unwrap();
        assert_eq!(packet.entries, vec![(1, "boom".to_string())]);
        assert_eq!(
            packet.captions,
            Some(vec![
                Some("&User".to_string()),
                Some("&Errors".into()),
                Some("&Request".into()),
                Some("&Session".into()),
            ])
        );
    }

    #[test]
    fn test_connector_ignores_out_of_range_and_extra_tabs() {
        let raw = br#"{"tabs":["A","B","C"],"log1":"one","log7":"far","log0":"zero"}"#;
        let packet = decode(raw, 2).unwrap();
        assert_eq!(packet.entries, vec![(0, "one".to_string())]);
        assert_eq!(packet.captions, Some(vec![Some("A".to_string()), Some("B".into())]));
    }

    #[test]
    fn test_connector_tabs_keep_positions() {
        let packet = decode(br#"{"tabs":["A",null,"C"],"log1":"x"}"#, 3).unwrap();
        assert_eq!(
            packet.captions,
            Some(vec![Some("A".to_string()), None, Some("C".into())])
        );

        let packet = decode(br#"{"tabs":[null,7],"log1":"x"}"#, 3).unwrap();
        assert_eq!(packet.captions, None);
    }

    #[test]
    fn test_connector_rejections() {
        assert!(matches!(decode(b"{not json", 4), Err(DecodeError::InvalidJson(_))));
        assert!(matches!(decode(br#"{"tabs":"A"}"#, 4), Err(DecodeError::InvalidJson(_))));
        assert_eq!(
            decode(br#"{"log1":"","log9":"x"}"#, 4),
            Err(DecodeError::NothingToDisplay)
        );
    }

    proptest! {
        #[test]
        fn prop_in_range_index_yields_one_entry(index in 0usize..16, text in "\\PC*") {
            let raw = encode_indexed(index, &text);
            let packet = decode(&raw, 16).unwrap();
            prop_assert_eq!(packet.single(), Some((index, text.as_str())));
        }

        #[test]
        fn prop_out_of_range_index_is_rejected(count in 1usize..16, extra in 0usize..1000, text in "\\PC*") {
            let raw = encode_indexed(count + extra, &text);
            prop_assert_eq!(decode(&raw, count), Err(DecodeError::OutOfRange(count + extra)));
        }

        #[test]
        fn prop_decode_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode(&raw, 4);
        }
    }
}
