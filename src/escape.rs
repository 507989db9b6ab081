//! Decoding of escape sequences in JSON string values

use crate::source::Source;
use std::io::Error as IoError;
use thiserror::Error;

/// Error while decoding an escape sequence; the reader converts this into
/// its own error type with path information attached
#[derive(Error, Debug)]
pub(crate) enum EscapeError {
    #[error("{0}")]
    Io(#[from] IoError),
    #[error("unexpected end of input inside escape sequence")]
    Truncated,
    #[error("unknown escape character '{}'", *.0 as char)]
    UnknownEscapeChar(u8),
    #[error("malformed unicode escape")]
    MalformedUnicodeEscape,
    #[error("unpaired UTF-16 surrogate in unicode escape")]
    UnpairedSurrogate,
}

/// Reads the escape sequence after an already consumed `\` and returns the
/// character it denotes
///
/// `\uXXXX` escapes encoding UTF-16 surrogates must be paired; the second
/// escape of the pair is consumed as well. In lenient mode an escaped real
/// line break is treated like `\n`.
pub(crate) fn read_escape_char<S: Source>(
    source: &mut S,
    lenient: bool,
) -> Result<char, EscapeError> {
    if !source.request(1)? {
        return Err(EscapeError::Truncated);
    }
    let escaped = source.read_byte()?;
    match escaped {
        b'"' => Ok('"'),
        b'\\' => Ok('\\'),
        b'/' => Ok('/'),
        b'b' => Ok('\u{0008}'),
        b'f' => Ok('\u{000C}'),
        b'n' => Ok('\n'),
        b'r' => Ok('\r'),
        b't' => Ok('\t'),
        b'u' => read_unicode_escape(source, lenient),
        b'\'' | b'\n' if lenient => Ok(escaped as char),
        _ => Err(EscapeError::UnknownEscapeChar(escaped)),
    }
}

/// Reads the four hex digits of a `\u` escape whose `\u` prefix is already
/// consumed
fn read_hex_code_unit<S: Source>(source: &mut S) -> Result<u16, EscapeError> {
    if !source.request(4)? {
        return Err(EscapeError::Truncated);
    }
    let mut value: u16 = 0;
    for offset in 0..4 {
        let digit = match source.peek_byte(offset) {
            c @ b'0'..=b'9' => c - b'0',
            c @ b'a'..=b'f' => c - b'a' + 10,
            c @ b'A'..=b'F' => c - b'A' + 10,
            _ => return Err(EscapeError::MalformedUnicodeEscape),
        };
        value = value << 4 | digit as u16;
    }
    source.skip(4);
    Ok(value)
}

fn read_unicode_escape<S: Source>(source: &mut S, _lenient: bool) -> Result<char, EscapeError> {
    let code_unit = read_hex_code_unit(source)?;
    match code_unit {
        // High surrogate, must be followed by an escaped low surrogate
        0xD800..=0xDBFF => {
            if !source.request(2)? || source.peek_byte(0) != b'\\' || source.peek_byte(1) != b'u' {
                return Err(EscapeError::UnpairedSurrogate);
            }
            source.skip(2);
            let low = read_hex_code_unit(source)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(EscapeError::UnpairedSurrogate);
            }
            let code_point = 0x10000
                + ((code_unit as u32 - 0xD800) << 10)
                + (low as u32 - 0xDC00);
            // All values built from a surrogate pair are valid code points
            char::from_u32(code_point).ok_or(EscapeError::UnpairedSurrogate)
        }
        0xDC00..=0xDFFF => Err(EscapeError::UnpairedSurrogate),
        _ => {
            // u16 outside the surrogate ranges is always a valid char
            char::from_u32(code_unit as u32).ok_or(EscapeError::MalformedUnicodeEscape)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BufferedSource;

    fn read(escape: &str, lenient: bool) -> Result<char, EscapeError> {
        // Input is the escape sequence without the leading backslash
        let mut source = BufferedSource::new(escape.as_bytes());
        read_escape_char(&mut source, lenient)
    }

    #[test]
    fn short_escapes() {
        assert_eq!('"', read("\"", false).unwrap());
        assert_eq!('\\', read("\\", false).unwrap());
        assert_eq!('/', read("/", false).unwrap());
        assert_eq!('\u{0008}', read("b", false).unwrap());
        assert_eq!('\u{000C}', read("f", false).unwrap());
        assert_eq!('\n', read("n", false).unwrap());
        assert_eq!('\r', read("r", false).unwrap());
        assert_eq!('\t', read("t", false).unwrap());
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!('A', read("u0041", false).unwrap());
        assert_eq!('\u{0000}', read("u0000", false).unwrap());
        assert_eq!('\u{FFFF}', read("uFFFF", false).unwrap());
        // Hex digits in both cases
        assert_eq!('\u{ABCD}', read("uabCD", false).unwrap());
    }

    #[test]
    fn surrogate_pairs() {
        assert_eq!('\u{10000}', read("uD800\\uDC00", false).unwrap());
        assert_eq!('\u{1D11E}', read("uD834\\uDD1E", false).unwrap());
        assert_eq!('\u{10FFFF}', read("uDBFF\\uDFFF", false).unwrap());
    }

    #[test]
    fn unpaired_surrogates() {
        assert!(matches!(
            read("uD800", false),
            Err(EscapeError::UnpairedSurrogate)
        ));
        assert!(matches!(
            read("uD800\\u0041", false),
            Err(EscapeError::UnpairedSurrogate)
        ));
        assert!(matches!(
            read("uDC00", false),
            Err(EscapeError::UnpairedSurrogate)
        ));
    }

    #[test]
    fn malformed_and_truncated() {
        assert!(matches!(
            read("u00G1", false),
            Err(EscapeError::MalformedUnicodeEscape)
        ));
        assert!(matches!(read("u00", false), Err(EscapeError::Truncated)));
        assert!(matches!(read("", false), Err(EscapeError::Truncated)));
        assert!(matches!(
            read("x", false),
            Err(EscapeError::UnknownEscapeChar(b'x'))
        ));
    }

    #[test]
    fn lenient_only_escapes() {
        assert_eq!('\'', read("'", true).unwrap());
        assert_eq!('\n', read("\n", true).unwrap());
        assert!(matches!(
            read("'", false),
            Err(EscapeError::UnknownEscapeChar(b'\''))
        ));
    }
}
