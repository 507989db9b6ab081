//! Precompiled candidate sets for matching object member names
//!
//! [`JsonReader::select_name`](crate::reader::JsonReader::select_name) matches
//! the next member name against an [`Options`] set. Each candidate is
//! precompiled to its JSON-encoded byte form once, so matching a name which
//! contains no escape sequences is a plain byte comparison against the
//! unconsumed input, without decoding or allocating.

/// An immutable set of member name candidates with their precompiled
/// JSON encodings
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Options {
    names: Vec<String>,
    /// For each name: its JSON-escaped bytes followed by the closing `"`,
    /// matching the raw input of a double-quoted name whose opening quote
    /// is already consumed
    encoded: Vec<Vec<u8>>,
}

impl Options {
    /// Creates a candidate set from the given names, preserving their order
    ///
    /// The index returned by a successful
    /// [`select_name`](crate::reader::JsonReader::select_name) refers to
    /// this order.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let encoded = names.iter().map(|name| encode_name(name)).collect();
        Options { names, encoded }
    }

    /// Number of candidate names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set contains no candidates
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The candidate name at `index`
    ///
    /// Panics if `index` is out of bounds.
    pub fn get(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub(crate) fn encoded(&self, index: usize) -> &[u8] {
        &self.encoded[index]
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }
}

/// JSON-escapes `name` and appends the closing quote, without the opening one
fn encode_name(name: &str) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(name.len() + 1);
    let mut utf8_buf = [0_u8; 4];
    for c in name.chars() {
        match c {
            '"' => encoded.extend_from_slice(b"\\\""),
            '\\' => encoded.extend_from_slice(b"\\\\"),
            '\u{0008}' => encoded.extend_from_slice(b"\\b"),
            '\t' => encoded.extend_from_slice(b"\\t"),
            '\n' => encoded.extend_from_slice(b"\\n"),
            '\u{000C}' => encoded.extend_from_slice(b"\\f"),
            '\r' => encoded.extend_from_slice(b"\\r"),
            c if (c as u32) < 0x20 => {
                let mut hex = [b'\\', b'u', b'0', b'0', 0, 0];
                let value = c as u32;
                hex[4] = char::from_digit(value >> 4, 16).unwrap_or('0') as u8;
                hex[5] = char::from_digit(value & 0xF, 16).unwrap_or('0') as u8;
                encoded.extend_from_slice(&hex);
            }
            c => encoded.extend_from_slice(c.encode_utf8(&mut utf8_buf).as_bytes()),
        }
    }
    encoded.push(b'"');
    encoded
}
