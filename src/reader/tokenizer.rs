//! Pull-based JSON tokenizer implementation

use crate::escape::{self, EscapeError};
use crate::number::{self, NumberError};
use crate::options::Options;
use crate::source::{BufferedSource, Source};
use log::warn;
use std::fmt::Display;
use std::io::{Error as IoError, ErrorKind, Read};

use super::{JsonSyntaxError, ReaderError, SyntaxErrorKind, Token};

/// Default for [`ReaderSettings::nesting_limit`]
const DEFAULT_NESTING_LIMIT: usize = 256;
/// Initial capacity of the scope stack
const INITIAL_SCOPE_CAPACITY: usize = 32;
/// Maximum length in bytes of an unquoted or number literal
const MAX_LITERAL_LENGTH: usize = 1024;

/// Bytes which end an unquoted literal
const UNQUOTED_TERMINALS: &[u8] = b"{}[]:, \n\t\r\x0C/\\;#=";

/// Accumulator limit below which multiplying by 10 would overflow while
/// pre-parsing an integer literal
const MIN_INCOMPLETE_INTEGER: i64 = i64::MIN / 10;

/// Settings to customize the JSON reader behavior
///
/// These settings are used by [`JsonReader::new_custom`]. To avoid future
/// breakage, construct modified settings with `..Default::default()`:
/// ```
/// # use pulljson::reader::ReaderSettings;
/// let settings = ReaderSettings {
///     lenient: true,
///     ..Default::default()
/// };
/// # drop(settings);
/// ```
#[derive(Clone, Debug)]
pub struct ReaderSettings {
    /// Whether to accept documents which deviate from the JSON grammar
    ///
    /// When enabled the reader additionally accepts:
    /// - `/* */`, `//` and `#` comments
    /// - unquoted and single-quoted strings and member names
    /// - `;` as separator between values and members
    /// - `=` and `=>` as separator between a member name and its value
    /// - `NaN` and `Infinity` number values
    /// - keywords with arbitrary capitalization, such as `TRUE`
    /// - multiple top-level values
    /// - missing array elements, such as `[1,,3]`, which are read as `null`
    pub lenient: bool,

    /// Maximum depth to which arrays and objects may be nested
    ///
    /// When the document exceeds this depth,
    /// [`ReaderError::NestingLimitExceeded`] is returned. The limit protects
    /// against deeply nested documents causing unbounded memory usage.
    pub nesting_limit: usize,

    /// Whether to maintain the JSONPath-style path returned by
    /// [`JsonReader::path`] and included in errors
    ///
    /// Disabling this avoids storing member names, at the cost of less
    /// precise error locations.
    pub track_path: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        ReaderSettings {
            lenient: false,
            nesting_limit: DEFAULT_NESTING_LIMIT,
            track_path: true,
        }
    }
}

/// Where the reader currently is inside the document structure
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
enum Scope {
    /// Document start, no value read yet
    EmptyDocument,
    /// The top-level value has been read
    NonemptyDocument,
    /// Inside `[`, no element read yet
    EmptyArray,
    /// Inside an array with at least one element read
    NonemptyArray,
    /// Inside `{`, no member read yet
    EmptyObject,
    /// A member name has been read, its value has not
    DanglingName,
    /// Inside an object with at least one member read
    NonemptyObject,
    /// The reader has been closed
    Closed,
}

/// Result of looking ahead at the next token, more detailed than [`Token`]
/// because it also captures how the token is written in the document
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
enum Peeked {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    True,
    False,
    Null,
    DoubleQuoted,
    SingleQuoted,
    Unquoted,
    /// String value which has already been decoded into `peeked_string`
    Buffered,
    DoubleQuotedName,
    SingleQuotedName,
    UnquotedName,
    /// Member name which has already been decoded into `peeked_string`
    BufferedName,
    /// Integral number already parsed into `peeked_long`; its bytes are
    /// consumed from the source
    Long,
    /// Number literal of `peeked_number_length` bytes, still buffered in
    /// the source
    Number,
    Eof,
}

fn token_for(peeked: Peeked) -> Token {
    match peeked {
        Peeked::BeginObject => Token::BeginObject,
        Peeked::EndObject => Token::EndObject,
        Peeked::BeginArray => Token::BeginArray,
        Peeked::EndArray => Token::EndArray,
        Peeked::True | Peeked::False => Token::Boolean,
        Peeked::Null => Token::Null,
        Peeked::DoubleQuoted | Peeked::SingleQuoted | Peeked::Unquoted | Peeked::Buffered => {
            Token::String
        }
        Peeked::DoubleQuotedName
        | Peeked::SingleQuotedName
        | Peeked::UnquotedName
        | Peeked::BufferedName => Token::Name,
        Peeked::Long | Peeked::Number => Token::Number,
        Peeked::Eof => Token::EndOfDocument,
    }
}

/// A pull-based JSON tokenizer reading from a [`Source`]
///
/// The reader holds at most one peeked token; [`peek`](Self::peek) is
/// idempotent until one of the consuming methods clears the peeked token.
/// Methods return an error for malformed or unexpected document content,
/// and panic when the reader is used incorrectly, for example when it is
/// used after [`close`](Self::close) was called.
pub struct JsonReader<S: Source> {
    source: S,
    settings: ReaderSettings,
    peeked: Option<Peeked>,
    /// Value of a [`Peeked::Long`]
    peeked_long: i64,
    /// Length of a [`Peeked::Number`] literal
    peeked_number_length: usize,
    /// Value of a [`Peeked::Buffered`] or [`Peeked::BufferedName`]
    peeked_string: Option<String>,
    /// Never empty; the bottom element is the document scope
    scopes: Vec<Scope>,
    /// Member name per scope stack frame, for path tracking
    path_names: Vec<Option<String>>,
    /// Count of consumed values per scope stack frame, for path tracking
    path_indices: Vec<u32>,
    /// Reused scratch buffer for assembling string values
    value_buf: Vec<u8>,
}

impl<R: Read> JsonReader<BufferedSource<R>> {
    /// Creates a JSON reader with [default settings](ReaderSettings::default)
    pub fn new(reader: R) -> Self {
        JsonReader::new_custom(reader, ReaderSettings::default())
    }

    /// Creates a JSON reader with custom settings
    pub fn new_custom(reader: R, settings: ReaderSettings) -> Self {
        JsonReader::from_source_custom(BufferedSource::new(reader), settings)
    }
}

impl<S: Source> JsonReader<S> {
    /// Creates a JSON reader on a custom [`Source`] with
    /// [default settings](ReaderSettings::default)
    pub fn from_source(source: S) -> Self {
        JsonReader::from_source_custom(source, ReaderSettings::default())
    }

    /// Creates a JSON reader on a custom [`Source`] with custom settings
    pub fn from_source_custom(source: S, settings: ReaderSettings) -> Self {
        let mut scopes = Vec::with_capacity(INITIAL_SCOPE_CAPACITY);
        scopes.push(Scope::EmptyDocument);
        let track_path = settings.track_path;
        JsonReader {
            source,
            settings,
            peeked: None,
            peeked_long: 0,
            peeked_number_length: 0,
            peeked_string: None,
            scopes,
            path_names: if track_path { vec![None] } else { Vec::new() },
            path_indices: if track_path { vec![0] } else { Vec::new() },
            value_buf: Vec::new(),
        }
    }

    /// A JSONPath-style path to the current position in the document, for
    /// example `$.store.items[2]`
    ///
    /// Returns `$` when [`ReaderSettings::track_path`] is disabled.
    pub fn path(&self) -> String {
        let mut path = String::from("$");
        if !self.settings.track_path {
            return path;
        }
        for (i, scope) in self.scopes.iter().enumerate() {
            match scope {
                Scope::EmptyArray | Scope::NonemptyArray => {
                    if let Some(index) = self.path_indices.get(i) {
                        path.push('[');
                        path.push_str(&index.to_string());
                        path.push(']');
                    }
                }
                Scope::EmptyObject | Scope::DanglingName | Scope::NonemptyObject => {
                    path.push('.');
                    if let Some(Some(name)) = self.path_names.get(i) {
                        path.push_str(name);
                    }
                }
                _ => {}
            }
        }
        path
    }

    /// Peeks at the type of the next token without consuming it
    pub fn peek(&mut self) -> Result<Token, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        Ok(token_for(peeked))
    }

    /// Consumes the `[` beginning an array
    pub fn begin_array(&mut self) -> Result<(), ReaderError> {
        let peeked = self.peeked_or_peek()?;
        if peeked == Peeked::BeginArray {
            self.push_scope(Scope::EmptyArray)?;
            self.peeked = None;
            Ok(())
        } else {
            Err(self.type_mismatch("BeginArray", token_for(peeked)))
        }
    }

    /// Consumes the `]` ending an array
    pub fn end_array(&mut self) -> Result<(), ReaderError> {
        let peeked = self.peeked_or_peek()?;
        if peeked == Peeked::EndArray {
            self.pop_scope();
            self.end_value();
            self.peeked = None;
            Ok(())
        } else {
            Err(self.type_mismatch("EndArray", token_for(peeked)))
        }
    }

    /// Consumes the `{` beginning an object
    pub fn begin_object(&mut self) -> Result<(), ReaderError> {
        let peeked = self.peeked_or_peek()?;
        if peeked == Peeked::BeginObject {
            self.push_scope(Scope::EmptyObject)?;
            self.peeked = None;
            Ok(())
        } else {
            Err(self.type_mismatch("BeginObject", token_for(peeked)))
        }
    }

    /// Consumes the `}` ending an object
    pub fn end_object(&mut self) -> Result<(), ReaderError> {
        let peeked = self.peeked_or_peek()?;
        if peeked == Peeked::EndObject {
            self.pop_scope();
            self.end_value();
            self.peeked = None;
            Ok(())
        } else {
            Err(self.type_mismatch("EndObject", token_for(peeked)))
        }
    }

    /// Whether the current array or object has another element respectively
    /// member, or, at the top level, whether the document has another value
    pub fn has_next(&mut self) -> Result<bool, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        Ok(!matches!(
            peeked,
            Peeked::EndArray | Peeked::EndObject | Peeked::Eof
        ))
    }

    /// Consumes the name of the next object member
    pub fn next_name(&mut self) -> Result<String, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        let name = match peeked {
            Peeked::DoubleQuotedName => self.next_quoted_value(b'"')?,
            Peeked::SingleQuotedName => self.next_quoted_value(b'\'')?,
            Peeked::UnquotedName => self.next_unquoted_value()?,
            // Invariant: a buffered name always has its string stashed
            Peeked::BufferedName => self.peeked_string.take().unwrap(),
            _ => return Err(self.type_mismatch("a name", token_for(peeked))),
        };
        self.peeked = None;
        self.record_path_name(&name);
        Ok(name)
    }

    /// Matches the name of the next object member against `options`
    ///
    /// On a match the name is consumed and its index within the options is
    /// returned. `None` is returned without consuming anything when the name
    /// matches no candidate, or when the next token is not a name at all;
    /// the caller then typically calls [`skip_name`](Self::skip_name) or
    /// [`next_name`](Self::next_name).
    ///
    /// Names which are written without escape sequences are matched directly
    /// against the document bytes, without decoding or allocation.
    pub fn select_name(&mut self, options: &Options) -> Result<Option<usize>, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        match peeked {
            Peeked::DoubleQuotedName
            | Peeked::SingleQuotedName
            | Peeked::UnquotedName
            | Peeked::BufferedName => {}
            _ => return Ok(None),
        }

        if peeked == Peeked::BufferedName {
            // Invariant: a buffered name always has its string stashed
            let matched = options.position(self.peeked_string.as_deref().unwrap());
            if let Some(index) = matched {
                self.peeked = None;
                let name = self.peeked_string.take().unwrap();
                self.record_path_name(&name);
                return Ok(Some(index));
            }
            return Ok(None);
        }

        if peeked == Peeked::DoubleQuotedName {
            for index in 0..options.len() {
                if self.matches_source(options.encoded(index))? {
                    self.peeked = None;
                    self.record_path_name(options.get(index));
                    return Ok(Some(index));
                }
            }
        }

        // Slow path: decode the name; keep it buffered when it matches no
        // candidate so that `next_name` / `skip_name` can still consume it
        let previous_name = if self.settings.track_path {
            self.path_names.last().cloned().flatten()
        } else {
            None
        };
        let name = self.next_name()?;
        match options.position(&name) {
            Some(index) => Ok(Some(index)),
            None => {
                self.peeked = Some(Peeked::BufferedName);
                self.peeked_string = Some(name);
                if self.settings.track_path {
                    if let Some(slot) = self.path_names.last_mut() {
                        *slot = previous_name;
                    }
                }
                Ok(None)
            }
        }
    }

    /// Consumes the name of the next object member without decoding it
    ///
    /// The path records the name as `<skipped>`.
    pub fn skip_name(&mut self) -> Result<(), ReaderError> {
        let peeked = self.peeked_or_peek()?;
        match peeked {
            Peeked::DoubleQuotedName => self.skip_quoted_value(b'"')?,
            Peeked::SingleQuotedName => self.skip_quoted_value(b'\'')?,
            Peeked::UnquotedName => self.skip_unquoted_value()?,
            Peeked::BufferedName => self.peeked_string = None,
            _ => return Err(self.type_mismatch("a name", token_for(peeked))),
        }
        self.peeked = None;
        self.record_path_name("<skipped>");
        Ok(())
    }

    /// Consumes the next string value
    ///
    /// Number values are read as their literal text.
    pub fn next_string(&mut self) -> Result<String, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        let value = match peeked {
            Peeked::DoubleQuoted => self.next_quoted_value(b'"')?,
            Peeked::SingleQuoted => self.next_quoted_value(b'\'')?,
            Peeked::Unquoted => self.next_unquoted_value()?,
            // Invariant: a buffered value always has its string stashed
            Peeked::Buffered => self.peeked_string.take().unwrap(),
            Peeked::Long => self.peeked_long.to_string(),
            Peeked::Number => self.take_number_literal()?,
            _ => return Err(self.type_mismatch("a string", token_for(peeked))),
        };
        self.peeked = None;
        self.end_value();
        Ok(value)
    }

    /// Consumes the next boolean value
    pub fn next_bool(&mut self) -> Result<bool, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        let value = match peeked {
            Peeked::True => true,
            Peeked::False => false,
            _ => return Err(self.type_mismatch("a boolean", token_for(peeked))),
        };
        self.peeked = None;
        self.end_value();
        Ok(value)
    }

    /// Consumes the next `null` value
    pub fn next_null(&mut self) -> Result<(), ReaderError> {
        let peeked = self.peeked_or_peek()?;
        if peeked == Peeked::Null {
            self.peeked = None;
            self.end_value();
            Ok(())
        } else {
            Err(self.type_mismatch("null", token_for(peeked)))
        }
    }

    /// Consumes the next number value as `i32`
    ///
    /// Returns a [`ReaderError::TypeMismatch`] error if the value is not an
    /// integer or does not fit `i32`.
    pub fn next_int(&mut self) -> Result<i32, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        if peeked == Peeked::Long {
            let value = self.peeked_long;
            return match i32::try_from(value) {
                Ok(int) => {
                    self.peeked = None;
                    self.end_value();
                    Ok(int)
                }
                Err(_) => Err(self.type_mismatch("an int", value)),
            };
        }
        let text = self.buffer_scalar_text(peeked, "an int")?;
        if let Ok(value) = number::parse_i32(&text) {
            self.consume_buffered();
            return Ok(value);
        }
        match number::parse_f64(&text, self.settings.lenient) {
            Ok(double)
                if double >= i32::MIN as f64
                    && double <= i32::MAX as f64
                    && (double as i32) as f64 == double =>
            {
                let value = double as i32;
                self.consume_buffered();
                Ok(value)
            }
            _ => Err(self.type_mismatch("an int", text)),
        }
    }

    /// Consumes the next number value as `i64`
    ///
    /// Returns a [`ReaderError::TypeMismatch`] error if the value is not an
    /// integer or does not fit `i64`.
    pub fn next_long(&mut self) -> Result<i64, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        if peeked == Peeked::Long {
            let value = self.peeked_long;
            self.peeked = None;
            self.end_value();
            return Ok(value);
        }
        let text = self.buffer_scalar_text(peeked, "a long")?;
        if let Ok(value) = number::parse_i64(&text) {
            self.consume_buffered();
            return Ok(value);
        }
        match number::parse_f64(&text, self.settings.lenient) {
            // The upper bound 2^63 itself is excluded; a double of exactly
            // that value does not represent any i64
            Ok(double)
                if double >= i64::MIN as f64
                    && double < 9_223_372_036_854_775_808.0
                    && (double as i64) as f64 == double =>
            {
                let value = double as i64;
                self.consume_buffered();
                Ok(value)
            }
            _ => Err(self.type_mismatch("a long", text)),
        }
    }

    /// Consumes the next number value as `f64`
    ///
    /// String values containing a number are accepted as well. Non-finite
    /// results are only permitted in lenient mode.
    pub fn next_double(&mut self) -> Result<f64, ReaderError> {
        let peeked = self.peeked_or_peek()?;
        if peeked == Peeked::Long {
            let value = self.peeked_long;
            self.peeked = None;
            self.end_value();
            return Ok(value as f64);
        }
        let text = self.buffer_scalar_text(peeked, "a double")?;
        match number::parse_f64(&text, self.settings.lenient) {
            Ok(value) => {
                self.consume_buffered();
                Ok(value)
            }
            Err(NumberError::NonFinite) => {
                Err(self.syntax_error(SyntaxErrorKind::NonFiniteNumber))
            }
            Err(_) => Err(self.type_mismatch("a double", text)),
        }
    }

    /// Consumes and discards the next value, including all nested values
    /// when it is an array or object
    ///
    /// Works iteratively with a depth counter, so skipping does not recurse.
    /// The path records the skipped value's member name as `<skipped>`.
    pub fn skip_value(&mut self) -> Result<(), ReaderError> {
        let mut depth = 0_u32;
        loop {
            let peeked = self.peeked_or_peek()?;
            match peeked {
                Peeked::BeginArray => {
                    self.push_scope(Scope::EmptyArray)?;
                    depth += 1;
                }
                Peeked::BeginObject => {
                    self.push_scope(Scope::EmptyObject)?;
                    depth += 1;
                }
                Peeked::EndArray | Peeked::EndObject => {
                    if depth == 0 {
                        return Err(self.type_mismatch("a value", token_for(peeked)));
                    }
                    self.pop_scope();
                    depth -= 1;
                }
                Peeked::DoubleQuoted | Peeked::DoubleQuotedName => {
                    self.skip_quoted_value(b'"')?;
                }
                Peeked::SingleQuoted | Peeked::SingleQuotedName => {
                    self.skip_quoted_value(b'\'')?;
                }
                Peeked::Unquoted | Peeked::UnquotedName => self.skip_unquoted_value()?,
                Peeked::Buffered | Peeked::BufferedName => self.peeked_string = None,
                Peeked::Number => {
                    let length = self.peeked_number_length;
                    self.source.skip(length);
                }
                Peeked::True | Peeked::False | Peeked::Null | Peeked::Long => {}
                Peeked::Eof => {
                    return Err(self.type_mismatch("a value", Token::EndOfDocument));
                }
            }
            self.peeked = None;
            if depth == 0 {
                break;
            }
        }
        self.end_value();
        self.record_path_name("<skipped>");
        Ok(())
    }

    /// Closes the reader and the underlying source
    ///
    /// A failure to close the source is logged instead of returned, so that
    /// it cannot mask an earlier, more interesting error. Any reader call
    /// after `close` panics.
    pub fn close(&mut self) {
        self.peeked = None;
        self.peeked_string = None;
        self.scopes.clear();
        self.scopes.push(Scope::Closed);
        self.path_names.clear();
        self.path_indices.clear();
        if let Err(error) = self.source.close() {
            warn!("failed to close JSON source: {error}");
        }
    }

    // --- Peeking ---

    fn peeked_or_peek(&mut self) -> Result<Peeked, ReaderError> {
        match self.peeked {
            Some(peeked) => Ok(peeked),
            None => self.do_peek(),
        }
    }

    fn set_peeked(&mut self, peeked: Peeked) -> Peeked {
        self.peeked = Some(peeked);
        peeked
    }

    fn do_peek(&mut self) -> Result<Peeked, ReaderError> {
        // Scope stack is never empty
        let peek_scope = *self.scopes.last().unwrap();
        match peek_scope {
            Scope::EmptyArray => {
                *self.scopes.last_mut().unwrap() = Scope::NonemptyArray;
            }
            Scope::NonemptyArray => {
                let byte = self.require_non_whitespace("array")?;
                self.source.skip(1);
                match byte {
                    b']' => return Ok(self.set_peeked(Peeked::EndArray)),
                    b';' => self.require_lenient()?,
                    b',' => {}
                    _ => return Err(self.syntax_error(SyntaxErrorKind::UnterminatedArray)),
                }
            }
            Scope::EmptyObject | Scope::NonemptyObject => {
                *self.scopes.last_mut().unwrap() = Scope::DanglingName;
                if peek_scope == Scope::NonemptyObject {
                    let byte = self.require_non_whitespace("object")?;
                    self.source.skip(1);
                    match byte {
                        b'}' => return Ok(self.set_peeked(Peeked::EndObject)),
                        b';' => self.require_lenient()?,
                        b',' => {}
                        _ => {
                            return Err(self.syntax_error(SyntaxErrorKind::UnterminatedObject));
                        }
                    }
                }
                let byte = self.require_non_whitespace("object member name")?;
                match byte {
                    b'"' => {
                        self.source.skip(1);
                        return Ok(self.set_peeked(Peeked::DoubleQuotedName));
                    }
                    b'\'' => {
                        self.require_lenient()?;
                        self.source.skip(1);
                        return Ok(self.set_peeked(Peeked::SingleQuotedName));
                    }
                    b'}' => {
                        if peek_scope == Scope::NonemptyObject {
                            // `}` directly after the member separator
                            return Err(self.syntax_error(SyntaxErrorKind::ExpectedName));
                        }
                        self.source.skip(1);
                        return Ok(self.set_peeked(Peeked::EndObject));
                    }
                    _ => {
                        self.require_lenient()?;
                        if self.is_literal_char(byte)? {
                            return Ok(self.set_peeked(Peeked::UnquotedName));
                        }
                        return Err(self.syntax_error(SyntaxErrorKind::ExpectedName));
                    }
                }
            }
            Scope::DanglingName => {
                *self.scopes.last_mut().unwrap() = Scope::NonemptyObject;
                let byte = self.require_non_whitespace("object member")?;
                self.source.skip(1);
                match byte {
                    b':' => {}
                    b'=' => {
                        self.require_lenient()?;
                        if self.request(1)? && self.source.peek_byte(0) == b'>' {
                            self.source.skip(1);
                        }
                    }
                    _ => return Err(self.syntax_error(SyntaxErrorKind::ExpectedColon)),
                }
            }
            Scope::EmptyDocument => {
                *self.scopes.last_mut().unwrap() = Scope::NonemptyDocument;
            }
            Scope::NonemptyDocument => match self.next_non_whitespace()? {
                None => return Ok(self.set_peeked(Peeked::Eof)),
                // Multiple top-level values
                Some(_) => self.require_lenient()?,
            },
            Scope::Closed => panic!("Incorrect reader usage: reader is closed"),
        }

        let byte = self.require_non_whitespace("value")?;
        match byte {
            b'"' => {
                self.source.skip(1);
                return Ok(self.set_peeked(Peeked::DoubleQuoted));
            }
            b'\'' => {
                self.require_lenient()?;
                self.source.skip(1);
                return Ok(self.set_peeked(Peeked::SingleQuoted));
            }
            b'[' => {
                self.source.skip(1);
                return Ok(self.set_peeked(Peeked::BeginArray));
            }
            b'{' => {
                self.source.skip(1);
                return Ok(self.set_peeked(Peeked::BeginObject));
            }
            b']' => {
                if peek_scope == Scope::EmptyArray {
                    self.source.skip(1);
                    return Ok(self.set_peeked(Peeked::EndArray));
                }
                if peek_scope == Scope::NonemptyArray {
                    // Trailing separator as in `[1,]`: the missing element
                    // is read as null, the `]` stays unconsumed
                    self.require_lenient()?;
                    return Ok(self.set_peeked(Peeked::Null));
                }
                return Err(self.syntax_error(SyntaxErrorKind::ExpectedValue));
            }
            b',' | b';' => {
                if peek_scope == Scope::EmptyArray || peek_scope == Scope::NonemptyArray {
                    // Missing array element as in `[,1]`, read as null;
                    // the separator stays unconsumed
                    self.require_lenient()?;
                    return Ok(self.set_peeked(Peeked::Null));
                }
                return Err(self.syntax_error(SyntaxErrorKind::ExpectedValue));
            }
            _ => {}
        }

        if let Some(peeked) = self.peek_keyword()? {
            return Ok(peeked);
        }
        if let Some(peeked) = self.peek_number()? {
            return Ok(peeked);
        }
        if !self.is_literal_char(byte)? {
            return Err(self.syntax_error(SyntaxErrorKind::ExpectedValue));
        }
        self.require_lenient()?;
        Ok(self.set_peeked(Peeked::Unquoted))
    }

    /// Tries to peek `true`, `false` or `null`, consuming the keyword on
    /// success
    fn peek_keyword(&mut self) -> Result<Option<Peeked>, ReaderError> {
        let first = self.source.peek_byte(0);
        let (keyword, peeked) = match first.to_ascii_lowercase() {
            b't' => ("true", Peeked::True),
            b'f' => ("false", Peeked::False),
            b'n' => ("null", Peeked::Null),
            _ => return Ok(None),
        };
        let keyword_bytes = keyword.as_bytes();
        if !self.settings.lenient && first != keyword_bytes[0] {
            return Ok(None);
        }
        for (i, &expected) in keyword_bytes.iter().enumerate().skip(1) {
            if !self.request(i + 1)? {
                return Ok(None);
            }
            let byte = self.source.peek_byte(i);
            let matches = if self.settings.lenient {
                byte.eq_ignore_ascii_case(&expected)
            } else {
                byte == expected
            };
            if !matches {
                return Ok(None);
            }
        }
        // The keyword must not continue, `truey` is not a keyword
        if self.request(keyword_bytes.len() + 1)?
            && self.is_literal_char(self.source.peek_byte(keyword_bytes.len()))?
        {
            return Ok(None);
        }
        self.source.skip(keyword_bytes.len());
        Ok(Some(self.set_peeked(peeked)))
    }

    /// Tries to peek a number literal, validating its shape without
    /// consuming it
    ///
    /// Integral values fitting `i64` are parsed on the fly into
    /// `peeked_long` ([`Peeked::Long`]) and their bytes consumed; other
    /// numbers stay buffered with their length in `peeked_number_length`
    /// ([`Peeked::Number`]).
    fn peek_number(&mut self) -> Result<Option<Peeked>, ReaderError> {
        #[derive(PartialEq, Clone, Copy)]
        enum NumberState {
            Start,
            Sign,
            IntDigit,
            Decimal,
            FractionDigit,
            ExpE,
            ExpSign,
            ExpDigit,
        }

        // Accumulated in the negative range so that i64::MIN parses
        let mut value = 0_i64;
        let mut negative = false;
        let mut fits_in_long = true;
        let mut state = NumberState::Start;
        let mut i = 0;

        loop {
            if i == MAX_LITERAL_LENGTH {
                return Err(self.value_too_long());
            }
            if !self.request(i + 1)? {
                break;
            }
            let byte = self.source.peek_byte(i);
            match byte {
                b'-' => match state {
                    NumberState::Start => {
                        negative = true;
                        state = NumberState::Sign;
                    }
                    NumberState::ExpE => state = NumberState::ExpSign,
                    _ => return Ok(None),
                },
                b'+' => match state {
                    NumberState::ExpE => state = NumberState::ExpSign,
                    _ => return Ok(None),
                },
                b'e' | b'E' => match state {
                    NumberState::IntDigit | NumberState::FractionDigit => {
                        state = NumberState::ExpE;
                    }
                    _ => return Ok(None),
                },
                b'.' => match state {
                    NumberState::IntDigit => state = NumberState::Decimal,
                    _ => return Ok(None),
                },
                b'0'..=b'9' => {
                    let digit = (byte - b'0') as i64;
                    match state {
                        NumberState::Start | NumberState::Sign => {
                            value = -digit;
                            state = NumberState::IntDigit;
                        }
                        NumberState::IntDigit => {
                            if value == 0 {
                                // Leading zero
                                return Ok(None);
                            }
                            let new_value = value.wrapping_mul(10).wrapping_sub(digit);
                            fits_in_long &= value > MIN_INCOMPLETE_INTEGER
                                || (value == MIN_INCOMPLETE_INTEGER && new_value < value);
                            value = new_value;
                        }
                        NumberState::Decimal | NumberState::FractionDigit => {
                            state = NumberState::FractionDigit;
                        }
                        NumberState::ExpE | NumberState::ExpSign | NumberState::ExpDigit => {
                            state = NumberState::ExpDigit;
                        }
                    }
                }
                _ => {
                    if self.is_literal_char(byte)? {
                        // Literal continues with non-number chars, `123a`
                        return Ok(None);
                    }
                    break;
                }
            }
            i += 1;
        }

        if state == NumberState::IntDigit
            && fits_in_long
            && (value != i64::MIN || negative)
            && (value != 0 || !negative)
        {
            self.peeked_long = if negative { value } else { -value };
            self.source.skip(i);
            Ok(Some(self.set_peeked(Peeked::Long)))
        } else if matches!(
            state,
            NumberState::IntDigit | NumberState::FractionDigit | NumberState::ExpDigit
        ) {
            self.peeked_number_length = i;
            Ok(Some(self.set_peeked(Peeked::Number)))
        } else {
            Ok(None)
        }
    }

    // --- Whitespace and comments ---

    /// Skips whitespace and, in lenient mode, comments; returns the next
    /// byte without consuming it, or `None` at the end of the document
    fn next_non_whitespace(&mut self) -> Result<Option<u8>, ReaderError> {
        loop {
            while self.request(1)? {
                match self.source.peek_byte(0) {
                    b' ' | b'\t' | b'\n' | b'\r' => self.source.skip(1),
                    _ => break,
                }
            }
            if !self.request(1)? {
                return Ok(None);
            }
            match self.source.peek_byte(0) {
                b'/' => {
                    if !self.request(2)? {
                        return Ok(Some(b'/'));
                    }
                    self.require_lenient()?;
                    match self.source.peek_byte(1) {
                        b'*' => {
                            self.source.skip(2);
                            self.skip_block_comment()?;
                        }
                        b'/' => {
                            self.source.skip(2);
                            self.skip_line_comment()?;
                        }
                        _ => return Ok(Some(b'/')),
                    }
                }
                b'#' => {
                    self.require_lenient()?;
                    self.source.skip(1);
                    self.skip_line_comment()?;
                }
                byte => return Ok(Some(byte)),
            }
        }
    }

    /// Like [`next_non_whitespace`](Self::next_non_whitespace) but treats
    /// the end of the document as an error
    fn require_non_whitespace(&mut self, context: &'static str) -> Result<u8, ReaderError> {
        match self.next_non_whitespace()? {
            Some(byte) => Ok(byte),
            None => Err(self.truncated(context)),
        }
    }

    /// Skips a `/* */` comment whose opening `/*` is already consumed
    fn skip_block_comment(&mut self) -> Result<(), ReaderError> {
        loop {
            let index = match self.find_terminator(b"*")? {
                Some(index) => index,
                None => return Err(self.truncated("comment")),
            };
            self.source.skip(index + 1);
            if !self.request(1)? {
                return Err(self.truncated("comment"));
            }
            if self.source.peek_byte(0) == b'/' {
                self.source.skip(1);
                return Ok(());
            }
        }
    }

    /// Skips a `//` or `#` comment whose marker is already consumed
    fn skip_line_comment(&mut self) -> Result<(), ReaderError> {
        match self.find_terminator(b"\n\r")? {
            Some(index) => self.source.skip(index + 1),
            None => {
                // Comment runs to the end of the document
                while self.request(1)? {
                    let available = self.source.available();
                    self.source.skip(available);
                }
            }
        }
        Ok(())
    }

    /// Whether `byte` can be part of an unquoted literal
    ///
    /// Returns an error for bytes which strict mode treats as malformed,
    /// such as `;` outside a string.
    fn is_literal_char(&self, byte: u8) -> Result<bool, ReaderError> {
        match byte {
            b'/' | b'\\' | b';' | b'#' | b'=' => {
                self.require_lenient()?;
                Ok(false)
            }
            b'{' | b'}' | b'[' | b']' | b':' | b',' | b' ' | b'\t' | b'\n' | b'\r' | 0x0C => {
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    // --- String reading ---

    /// Reads a quoted string value whose opening quote is already consumed,
    /// decoding escape sequences
    fn next_quoted_value(&mut self, quote: u8) -> Result<String, ReaderError> {
        self.value_buf.clear();
        let terminators = [quote, b'\\'];
        let mut utf8_buf = [0_u8; 4];
        loop {
            let index = match self.find_terminator(&terminators)? {
                Some(index) => index,
                None => return Err(self.truncated("string")),
            };
            let terminator = self.source.peek_byte(index);
            self.value_buf
                .extend_from_slice(self.source.read_slice(index));
            self.source.skip(1);
            if terminator == quote {
                break;
            }
            let c = match escape::read_escape_char(&mut self.source, self.settings.lenient) {
                Ok(c) => c,
                Err(e) => return Err(self.escape_error(e)),
            };
            self.value_buf
                .extend_from_slice(c.encode_utf8(&mut utf8_buf).as_bytes());
        }
        self.take_value_buf()
    }

    /// Skips a quoted string value whose opening quote is already consumed
    ///
    /// Escape sequences are still validated so that an escaped quote does
    /// not end the string early.
    fn skip_quoted_value(&mut self, quote: u8) -> Result<(), ReaderError> {
        let terminators = [quote, b'\\'];
        loop {
            let index = match self.find_terminator(&terminators)? {
                Some(index) => index,
                None => return Err(self.truncated("string")),
            };
            let terminator = self.source.peek_byte(index);
            self.source.skip(index + 1);
            if terminator == quote {
                return Ok(());
            }
            if let Err(e) = escape::read_escape_char(&mut self.source, self.settings.lenient) {
                return Err(self.escape_error(e));
            }
        }
    }

    /// Length of the unquoted literal starting at the current position
    fn unquoted_literal_length(&mut self) -> Result<usize, ReaderError> {
        let length = match self.find_terminator(UNQUOTED_TERMINALS)? {
            Some(index) => index,
            None => self.source.available(),
        };
        if length > MAX_LITERAL_LENGTH {
            return Err(self.value_too_long());
        }
        Ok(length)
    }

    fn next_unquoted_value(&mut self) -> Result<String, ReaderError> {
        let length = self.unquoted_literal_length()?;
        self.value_buf.clear();
        self.value_buf
            .extend_from_slice(self.source.read_slice(length));
        self.take_value_buf()
    }

    fn skip_unquoted_value(&mut self) -> Result<(), ReaderError> {
        let length = self.unquoted_literal_length()?;
        self.source.skip(length);
        Ok(())
    }

    /// Consumes the buffered text of a [`Peeked::Number`]
    fn take_number_literal(&mut self) -> Result<String, ReaderError> {
        let length = self.peeked_number_length;
        self.value_buf.clear();
        self.value_buf
            .extend_from_slice(self.source.read_slice(length));
        self.take_value_buf()
    }

    fn take_value_buf(&mut self) -> Result<String, ReaderError> {
        match std::str::from_utf8(&self.value_buf) {
            Ok(s) => Ok(s.to_owned()),
            Err(e) => Err(self.io_error(IoError::new(ErrorKind::InvalidData, e))),
        }
    }

    /// Reads the text of the upcoming scalar token and stashes it as a
    /// buffered token, so that a failed conversion leaves the token
    /// consumable
    fn buffer_scalar_text(
        &mut self,
        peeked: Peeked,
        expected: &'static str,
    ) -> Result<String, ReaderError> {
        let text = match peeked {
            Peeked::Number => self.take_number_literal()?,
            // Invariant: a buffered value always has its string stashed
            Peeked::Buffered => self.peeked_string.take().unwrap(),
            Peeked::DoubleQuoted => self.next_quoted_value(b'"')?,
            Peeked::SingleQuoted => self.next_quoted_value(b'\'')?,
            Peeked::Unquoted => self.next_unquoted_value()?,
            _ => return Err(self.type_mismatch(expected, token_for(peeked))),
        };
        self.peeked = Some(Peeked::Buffered);
        self.peeked_string = Some(text.clone());
        Ok(text)
    }

    /// Consumes the buffered token created by
    /// [`buffer_scalar_text`](Self::buffer_scalar_text)
    fn consume_buffered(&mut self) {
        self.peeked = None;
        self.peeked_string = None;
        self.end_value();
    }

    /// Compares `encoded` against the upcoming raw document bytes,
    /// consuming them only on a full match
    fn matches_source(&mut self, encoded: &[u8]) -> Result<bool, ReaderError> {
        if !self.request(encoded.len())? {
            return Ok(false);
        }
        self.source.mark(encoded.len());
        for &expected in encoded {
            let byte = match self.source.read_byte() {
                Ok(byte) => byte,
                Err(e) => return Err(self.io_error(e)),
            };
            if byte != expected {
                if let Err(e) = self.source.reset() {
                    return Err(self.io_error(e));
                }
                return Ok(false);
            }
        }
        Ok(true)
    }

    // --- Scope stack and path tracking ---

    fn push_scope(&mut self, scope: Scope) -> Result<(), ReaderError> {
        // The bottom document frame does not count towards the limit
        if self.scopes.len() - 1 >= self.settings.nesting_limit {
            return Err(ReaderError::NestingLimitExceeded {
                limit: self.settings.nesting_limit,
                path: self.path(),
            });
        }
        self.scopes.push(scope);
        if self.settings.track_path {
            self.path_names.push(None);
            self.path_indices.push(0);
        }
        Ok(())
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
        if self.settings.track_path {
            self.path_names.pop();
            self.path_indices.pop();
        }
    }

    /// Accounts for a consumed value by advancing the sibling index of the
    /// current path frame
    fn end_value(&mut self) {
        if self.settings.track_path {
            if let Some(index) = self.path_indices.last_mut() {
                *index += 1;
            }
        }
    }

    fn record_path_name(&mut self, name: &str) {
        if self.settings.track_path {
            if let Some(slot) = self.path_names.last_mut() {
                *slot = Some(name.to_owned());
            }
        }
    }

    // --- Error helpers ---

    fn request(&mut self, count: usize) -> Result<bool, ReaderError> {
        match self.source.request(count) {
            Ok(has) => Ok(has),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn find_terminator(&mut self, terminators: &[u8]) -> Result<Option<usize>, ReaderError> {
        match self.source.index_of_element(terminators) {
            Ok(index) => Ok(index),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn require_lenient(&self) -> Result<(), ReaderError> {
        if self.settings.lenient {
            Ok(())
        } else {
            Err(self.syntax_error(SyntaxErrorKind::StrictModeViolation))
        }
    }

    fn syntax_error(&self, kind: SyntaxErrorKind) -> ReaderError {
        JsonSyntaxError {
            kind,
            path: self.path(),
        }
        .into()
    }

    fn truncated(&self, context: &'static str) -> ReaderError {
        ReaderError::TruncatedInput {
            context,
            path: self.path(),
        }
    }

    fn type_mismatch(&self, expected: &'static str, actual: impl Display) -> ReaderError {
        ReaderError::TypeMismatch {
            expected,
            actual: actual.to_string(),
            path: self.path(),
        }
    }

    fn value_too_long(&self) -> ReaderError {
        ReaderError::ValueTooLong {
            limit: MAX_LITERAL_LENGTH,
            path: self.path(),
        }
    }

    fn io_error(&self, error: IoError) -> ReaderError {
        ReaderError::IoError {
            error,
            path: self.path(),
        }
    }

    fn escape_error(&self, error: EscapeError) -> ReaderError {
        match error {
            EscapeError::Io(error) => self.io_error(error),
            EscapeError::Truncated => self.truncated("escape sequence"),
            EscapeError::UnknownEscapeChar(_) => {
                self.syntax_error(SyntaxErrorKind::UnknownEscapeSequence)
            }
            EscapeError::MalformedUnicodeEscape => {
                self.syntax_error(SyntaxErrorKind::MalformedEscapeSequence)
            }
            EscapeError::UnpairedSurrogate => {
                self.syntax_error(SyntaxErrorKind::UnpairedSurrogateEscape)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn new_reader(json: &str) -> JsonReader<BufferedSource<&[u8]>> {
        JsonReader::new(json.as_bytes())
    }

    fn new_lenient_reader(json: &str) -> JsonReader<BufferedSource<&[u8]>> {
        JsonReader::new_custom(
            json.as_bytes(),
            ReaderSettings {
                lenient: true,
                ..Default::default()
            },
        )
    }

    fn assert_syntax_error<T: std::fmt::Debug>(
        result: Result<T, ReaderError>,
        expected_kind: SyntaxErrorKind,
        expected_path: &str,
    ) {
        match result {
            Err(ReaderError::SyntaxError(JsonSyntaxError { kind, path })) => {
                assert_eq!(expected_kind, kind);
                assert_eq!(expected_path, path);
            }
            other => panic!("expected syntax error {expected_kind} but got {other:?}"),
        }
    }

    #[test]
    fn literals() -> TestResult {
        let mut reader = new_reader("true");
        assert_eq!(true, reader.next_bool()?);
        assert_eq!(Token::EndOfDocument, reader.peek()?);

        let mut reader = new_reader("false");
        assert_eq!(false, reader.next_bool()?);

        let mut reader = new_reader("null");
        reader.next_null()?;
        Ok(())
    }

    #[test]
    fn peek_is_idempotent() -> TestResult {
        let mut reader = new_reader("[12]");
        for _ in 0..5 {
            assert_eq!(Token::BeginArray, reader.peek()?);
        }
        reader.begin_array()?;
        for _ in 0..5 {
            assert_eq!(Token::Number, reader.peek()?);
        }
        assert_eq!(12, reader.next_int()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn strings() -> TestResult {
        let mut reader = new_reader(r#""simple""#);
        assert_eq!("simple", reader.next_string()?);

        let mut reader = new_reader(r#""""#);
        assert_eq!("", reader.next_string()?);

        let mut reader = new_reader("\"non-ascii \u{00E9}\u{20AC}\u{1D11E}\"");
        assert_eq!("non-ascii \u{00E9}\u{20AC}\u{1D11E}", reader.next_string()?);
        Ok(())
    }

    #[test]
    fn string_escapes() -> TestResult {
        let mut reader = new_reader(r#""quote:\" back:\\ slash:\/ \u0041\u0042""#);
        assert_eq!("quote:\" back:\\ slash:/ AB", reader.next_string()?);

        let mut reader = new_reader(r#""\b\f\n\r\t""#);
        assert_eq!("\u{0008}\u{000C}\n\r\t", reader.next_string()?);

        let mut reader = new_reader(r#""\uD834\uDD1E""#);
        assert_eq!("\u{1D11E}", reader.next_string()?);
        Ok(())
    }

    #[test]
    fn invalid_escapes() {
        assert_syntax_error(
            new_reader(r#""\x""#).next_string(),
            SyntaxErrorKind::UnknownEscapeSequence,
            "$",
        );
        assert_syntax_error(
            new_reader(r#""\u00G0""#).next_string(),
            SyntaxErrorKind::MalformedEscapeSequence,
            "$",
        );
        assert_syntax_error(
            new_reader(r#""\uD800x""#).next_string(),
            SyntaxErrorKind::UnpairedSurrogateEscape,
            "$",
        );
    }

    #[test]
    fn numbers() -> TestResult {
        let mut reader = new_reader("[0, 12, -5, 12.5, -0.5, 1e3, 1.2E-3, 0.0]");
        reader.begin_array()?;
        assert_eq!(0, reader.next_int()?);
        assert_eq!(12, reader.next_int()?);
        assert_eq!(-5, reader.next_int()?);
        assert_eq!(12.5, reader.next_double()?);
        assert_eq!(-0.5, reader.next_double()?);
        assert_eq!(1000.0, reader.next_double()?);
        assert_eq!(1.2e-3, reader.next_double()?);
        assert_eq!(0.0, reader.next_double()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn integer_boundaries() -> TestResult {
        let mut reader = new_reader("-2147483648");
        assert_eq!(i32::MIN, reader.next_int()?);

        let mut reader = new_reader("2147483647");
        assert_eq!(i32::MAX, reader.next_int()?);

        // One beyond i32, still a valid long
        let mut reader = new_reader("2147483648");
        assert!(matches!(
            reader.next_int(),
            Err(ReaderError::TypeMismatch { expected: "an int", .. })
        ));
        let mut reader = new_reader("2147483648");
        assert_eq!(2147483648, reader.next_long()?);

        let mut reader = new_reader("-9223372036854775808");
        assert_eq!(i64::MIN, reader.next_long()?);

        let mut reader = new_reader("9223372036854775807");
        assert_eq!(i64::MAX, reader.next_long()?);

        // One beyond i64
        let mut reader = new_reader("9223372036854775808");
        assert!(matches!(
            reader.next_long(),
            Err(ReaderError::TypeMismatch { expected: "a long", .. })
        ));
        Ok(())
    }

    #[test]
    fn integral_doubles_as_int() -> TestResult {
        let mut reader = new_reader("1e2");
        assert_eq!(100, reader.next_int()?);

        let mut reader = new_reader("3.0");
        assert_eq!(3, reader.next_long()?);

        let mut reader = new_reader("1.5");
        assert!(matches!(
            reader.next_int(),
            Err(ReaderError::TypeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn number_as_string() -> TestResult {
        let mut reader = new_reader("[12, 12.5e6]");
        reader.begin_array()?;
        assert_eq!("12", reader.next_string()?);
        assert_eq!("12.5e6", reader.next_string()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn string_as_number() -> TestResult {
        let mut reader = new_reader(r#""42""#);
        assert_eq!(42, reader.next_long()?);

        let mut reader = new_reader(r#""12.5""#);
        assert_eq!(12.5, reader.next_double()?);

        let mut reader = new_reader(r#""oops""#);
        assert!(matches!(
            reader.next_double(),
            Err(ReaderError::TypeMismatch { expected: "a double", .. })
        ));
        Ok(())
    }

    #[test]
    fn failed_number_conversion_keeps_token() -> TestResult {
        let mut reader = new_reader(r#"["not a number"]"#);
        reader.begin_array()?;
        assert!(reader.next_int().is_err());
        // The value must still be readable as string
        assert_eq!("not a number", reader.next_string()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn leading_zero_rejected() {
        assert_syntax_error(
            new_reader("01").next_int(),
            SyntaxErrorKind::StrictModeViolation,
            "$",
        );
    }

    #[test]
    fn arrays() -> TestResult {
        let mut reader = new_reader("[]");
        reader.begin_array()?;
        assert_eq!(false, reader.has_next()?);
        reader.end_array()?;

        let mut reader = new_reader("[1, [2, 3], 4]");
        reader.begin_array()?;
        assert_eq!(1, reader.next_int()?);
        reader.begin_array()?;
        assert_eq!(2, reader.next_int()?);
        assert_eq!(3, reader.next_int()?);
        assert_eq!(false, reader.has_next()?);
        reader.end_array()?;
        assert_eq!(4, reader.next_int()?);
        reader.end_array()?;
        assert_eq!(Token::EndOfDocument, reader.peek()?);
        Ok(())
    }

    #[test]
    fn objects() -> TestResult {
        let mut reader = new_reader("{}");
        reader.begin_object()?;
        assert_eq!(false, reader.has_next()?);
        reader.end_object()?;

        let mut reader = new_reader(r#"{"a": 1, "b": {"c": true}}"#);
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        assert_eq!(1, reader.next_int()?);
        assert_eq!("b", reader.next_name()?);
        reader.begin_object()?;
        assert_eq!("c", reader.next_name()?);
        assert_eq!(true, reader.next_bool()?);
        reader.end_object()?;
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn error_paths() -> TestResult {
        let mut reader = new_reader(r#"{"outer": {"bad": }}"#);
        reader.begin_object()?;
        assert_eq!("outer", reader.next_name()?);
        reader.begin_object()?;
        assert_eq!("bad", reader.next_name()?);
        assert_syntax_error(
            reader.peek(),
            SyntaxErrorKind::ExpectedValue,
            "$.outer.bad",
        );

        let mut reader = new_reader("[1, x]");
        reader.begin_array()?;
        assert_eq!(1, reader.next_int()?);
        assert_syntax_error(
            reader.peek(),
            SyntaxErrorKind::StrictModeViolation,
            "$[1]",
        );
        Ok(())
    }

    #[test]
    fn path_rendering() -> TestResult {
        let mut reader = new_reader(r#"{"items": [{"name": "x"}]}"#);
        reader.begin_object()?;
        assert_eq!("items", reader.next_name()?);
        reader.begin_array()?;
        reader.begin_object()?;
        assert_eq!("name", reader.next_name()?);
        assert_eq!("$.items[0].name", reader.path());
        Ok(())
    }

    #[test]
    fn path_tracking_disabled() -> TestResult {
        let mut reader = JsonReader::new_custom(
            r#"{"a": [1]}"#.as_bytes(),
            ReaderSettings {
                track_path: false,
                ..Default::default()
            },
        );
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        reader.begin_array()?;
        assert_eq!("$", reader.path());
        Ok(())
    }

    #[test]
    fn truncated_documents() {
        let mut reader = new_reader("{");
        reader.begin_object().unwrap();
        assert!(matches!(
            reader.has_next(),
            Err(ReaderError::TruncatedInput { .. })
        ));

        let mut reader = new_reader("[1,");
        reader.begin_array().unwrap();
        reader.next_int().unwrap();
        assert!(matches!(
            reader.peek(),
            Err(ReaderError::TruncatedInput { .. })
        ));

        assert!(matches!(
            new_reader("\"unterminated").next_string(),
            Err(ReaderError::TruncatedInput { context: "string", .. })
        ));

        assert!(matches!(
            new_reader("\"trailing escape\\").next_string(),
            Err(ReaderError::TruncatedInput { context: "escape sequence", .. })
        ));

        assert!(matches!(
            new_reader("").peek(),
            Err(ReaderError::TruncatedInput { context: "value", .. })
        ));
    }

    #[test]
    fn truncated_keyword() {
        assert_syntax_error(
            new_reader("tru").next_bool(),
            SyntaxErrorKind::StrictModeViolation,
            "$",
        );

        // In lenient mode the incomplete keyword is an unquoted string
        let mut reader = new_lenient_reader("tru");
        assert!(matches!(
            reader.next_bool(),
            Err(ReaderError::TypeMismatch { expected: "a boolean", .. })
        ));
    }

    #[test]
    fn type_mismatches() -> TestResult {
        let mut reader = new_reader("{}");
        assert!(matches!(
            reader.begin_array(),
            Err(ReaderError::TypeMismatch { expected: "BeginArray", .. })
        ));
        reader.begin_object()?;
        assert!(matches!(
            reader.next_name(),
            Err(ReaderError::TypeMismatch { expected: "a name", .. })
        ));

        let mut reader = new_reader("[true]");
        reader.begin_array()?;
        assert!(matches!(
            reader.next_int(),
            Err(ReaderError::TypeMismatch { expected: "an int", .. })
        ));
        assert_eq!(true, reader.next_bool()?);

        let mut reader = new_reader("12");
        assert!(matches!(
            reader.next_bool(),
            Err(ReaderError::TypeMismatch { expected: "a boolean", .. })
        ));
        Ok(())
    }

    #[test]
    fn nesting_limit() -> TestResult {
        let settings = ReaderSettings {
            nesting_limit: 3,
            ..Default::default()
        };

        // Exactly at the limit
        let mut reader = JsonReader::new_custom("[[[]]]".as_bytes(), settings.clone());
        reader.begin_array()?;
        reader.begin_array()?;
        reader.begin_array()?;
        reader.end_array()?;
        reader.end_array()?;
        reader.end_array()?;

        // One deeper
        let mut reader = JsonReader::new_custom("[[[[]]]]".as_bytes(), settings.clone());
        reader.begin_array()?;
        reader.begin_array()?;
        reader.begin_array()?;
        assert!(matches!(
            reader.begin_array(),
            Err(ReaderError::NestingLimitExceeded { limit: 3, .. })
        ));

        // skip_value is bounded by the same limit
        let mut reader = JsonReader::new_custom("[[[[]]]]".as_bytes(), settings);
        assert!(matches!(
            reader.skip_value(),
            Err(ReaderError::NestingLimitExceeded { limit: 3, .. })
        ));
        Ok(())
    }

    #[test]
    fn default_nesting_limit() -> TestResult {
        let deep = "[".repeat(256);
        let mut reader = new_reader(&deep);
        for _ in 0..256 {
            reader.begin_array()?;
        }

        let deeper = "[".repeat(257);
        let mut reader = new_reader(&deeper);
        for _ in 0..256 {
            reader.begin_array()?;
        }
        assert!(matches!(
            reader.begin_array(),
            Err(ReaderError::NestingLimitExceeded { limit: 256, .. })
        ));
        Ok(())
    }

    #[test]
    fn skip_value_balances_depth() -> TestResult {
        let mut reader = new_reader(r#"{"skip": {"deep": [1, 2, [3, {"x": null}]]}, "keep": 7}"#);
        reader.begin_object()?;
        assert_eq!("skip", reader.next_name()?);
        reader.skip_value()?;
        // Depth is unchanged, the sibling member is readable
        assert_eq!("keep", reader.next_name()?);
        assert_eq!(7, reader.next_int()?);
        reader.end_object()?;
        assert_eq!(Token::EndOfDocument, reader.peek()?);
        Ok(())
    }

    #[test]
    fn skip_value_scalars() -> TestResult {
        let mut reader = new_reader(r#"[true, null, 12, 12.5, "s\"tring", [], {}]"#);
        reader.begin_array()?;
        while reader.has_next()? {
            reader.skip_value()?;
        }
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn skip_value_at_end() -> TestResult {
        let mut reader = new_reader("[]");
        reader.begin_array()?;
        assert!(matches!(
            reader.skip_value(),
            Err(ReaderError::TypeMismatch { expected: "a value", .. })
        ));
        reader.end_array()?;
        assert!(matches!(
            reader.skip_value(),
            Err(ReaderError::TypeMismatch { expected: "a value", .. })
        ));
        Ok(())
    }

    #[test]
    fn skip_name_and_value() -> TestResult {
        let mut reader = new_reader(r#"{"unknownA": [1, {"a": 2}], "b": 3}"#);
        reader.begin_object()?;
        reader.skip_name()?;
        reader.skip_value()?;
        assert_eq!("b", reader.next_name()?);
        assert_eq!(3, reader.next_int()?);
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn select_name() -> TestResult {
        let options = Options::new(["a", "b"]);
        let mut reader = new_reader(r#"{"b": 1, "unknown": 2, "a": 3}"#);
        reader.begin_object()?;

        assert_eq!(Some(1), reader.select_name(&options)?);
        assert_eq!(1, reader.next_int()?);

        assert_eq!(None, reader.select_name(&options)?);
        // The unmatched name is still consumable
        assert_eq!("unknown", reader.next_name()?);
        assert_eq!(2, reader.next_int()?);

        assert_eq!(Some(0), reader.select_name(&options)?);
        assert_eq!(3, reader.next_int()?);
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn select_name_with_escaped_input() -> TestResult {
        // The name is written as `\u0061` (i.e. `a`); the raw bytes don't
        // match the precompiled candidate so the decoding fallback must
        // kick in
        let options = Options::new(["a"]);
        let mut reader = new_reader(r#"{"\u0061": 1}"#);
        reader.begin_object()?;
        assert_eq!(Some(0), reader.select_name(&options)?);
        assert_eq!(1, reader.next_int()?);
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn select_name_prefix_candidates() -> TestResult {
        // `ab` must not match the candidate `a`
        let options = Options::new(["a", "ab"]);
        let mut reader = new_reader(r#"{"ab": 1, "a": 2}"#);
        reader.begin_object()?;
        assert_eq!(Some(1), reader.select_name(&options)?);
        assert_eq!(1, reader.next_int()?);
        assert_eq!(Some(0), reader.select_name(&options)?);
        assert_eq!(2, reader.next_int()?);
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn select_name_repeated_after_miss() -> TestResult {
        let first = Options::new(["x"]);
        let second = Options::new(["y", "name"]);
        let mut reader = new_reader(r#"{"name": true}"#);
        reader.begin_object()?;
        // Miss buffers the decoded name, the second select must match it
        assert_eq!(None, reader.select_name(&first)?);
        assert_eq!(Some(1), reader.select_name(&second)?);
        assert_eq!(true, reader.next_bool()?);
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn select_name_at_value_position() -> TestResult {
        let options = Options::new(["a"]);
        let mut reader = new_reader("[1]");
        reader.begin_array()?;
        assert_eq!(None, reader.select_name(&options)?);
        assert_eq!(1, reader.next_int()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn skipped_name_in_path() -> TestResult {
        let mut reader = new_reader(r#"{"a": x}"#);
        reader.begin_object()?;
        reader.skip_name()?;
        assert_syntax_error(
            reader.peek(),
            SyntaxErrorKind::StrictModeViolation,
            "$.<skipped>",
        );
        Ok(())
    }

    #[test]
    fn lenient_comments() -> TestResult {
        let mut reader =
            new_lenient_reader("/* start */ [1, // line\n 2, # hash\n 3] /* end */");
        reader.begin_array()?;
        assert_eq!(1, reader.next_int()?);
        assert_eq!(2, reader.next_int()?);
        assert_eq!(3, reader.next_int()?);
        reader.end_array()?;
        assert_eq!(Token::EndOfDocument, reader.peek()?);
        Ok(())
    }

    #[test]
    fn lenient_quotes_and_unquoted() -> TestResult {
        let mut reader = new_lenient_reader("{key: 'value', other: bare}");
        reader.begin_object()?;
        assert_eq!("key", reader.next_name()?);
        assert_eq!("value", reader.next_string()?);
        assert_eq!("other", reader.next_name()?);
        assert_eq!("bare", reader.next_string()?);
        reader.end_object()?;
        Ok(())
    }

    #[test]
    fn lenient_separators() -> TestResult {
        let mut reader = new_lenient_reader("{\"a\" = 1; \"b\" => 2}");
        reader.begin_object()?;
        assert_eq!("a", reader.next_name()?);
        assert_eq!(1, reader.next_int()?);
        assert_eq!("b", reader.next_name()?);
        assert_eq!(2, reader.next_int()?);
        reader.end_object()?;

        let mut reader = new_lenient_reader("[1; 2]");
        reader.begin_array()?;
        assert_eq!(1, reader.next_int()?);
        assert_eq!(2, reader.next_int()?);
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn lenient_missing_array_elements() -> TestResult {
        let mut reader = new_lenient_reader("[,1,]");
        reader.begin_array()?;
        reader.next_null()?;
        assert_eq!(1, reader.next_int()?);
        reader.next_null()?;
        reader.end_array()?;
        Ok(())
    }

    #[test]
    fn lenient_keywords() -> TestResult {
        let mut reader = new_lenient_reader("[TRUE, False, NULL]");
        reader.begin_array()?;
        assert_eq!(true, reader.next_bool()?);
        assert_eq!(false, reader.next_bool()?);
        reader.next_null()?;
        reader.end_array()?;

        // Strict mode requires lower case
        assert_syntax_error(
            new_reader("TRUE").next_bool(),
            SyntaxErrorKind::StrictModeViolation,
            "$",
        );
        Ok(())
    }

    #[test]
    fn lenient_non_finite_doubles() -> TestResult {
        let mut reader = new_lenient_reader("[NaN, Infinity, -Infinity]");
        reader.begin_array()?;
        assert_eq!(true, reader.next_double()?.is_nan());
        assert_eq!(f64::INFINITY, reader.next_double()?);
        assert_eq!(f64::NEG_INFINITY, reader.next_double()?);
        reader.end_array()?;

        assert_syntax_error(
            new_reader(r#""NaN""#).next_double(),
            SyntaxErrorKind::NonFiniteNumber,
            "$",
        );
        Ok(())
    }

    #[test]
    fn lenient_multiple_top_level_values() -> TestResult {
        let mut reader = new_lenient_reader("1 2");
        assert_eq!(1, reader.next_int()?);
        assert_eq!(2, reader.next_int()?);
        assert_eq!(Token::EndOfDocument, reader.peek()?);

        let mut reader = new_reader("1 2");
        assert_eq!(1, reader.next_int()?);
        assert_syntax_error(
            reader.peek(),
            SyntaxErrorKind::StrictModeViolation,
            "$",
        );
        Ok(())
    }

    #[test]
    fn strict_rejects_lenient_constructs() {
        assert_syntax_error(
            new_reader("'single'").next_string(),
            SyntaxErrorKind::StrictModeViolation,
            "$",
        );
        assert_syntax_error(
            new_reader("// comment\n1").next_int(),
            SyntaxErrorKind::StrictModeViolation,
            "$",
        );
        assert_syntax_error(
            new_reader("bare").next_string(),
            SyntaxErrorKind::StrictModeViolation,
            "$",
        );

        let mut reader = new_reader("{a: 1}");
        reader.begin_object().unwrap();
        assert_syntax_error(
            reader.next_name(),
            SyntaxErrorKind::StrictModeViolation,
            "$.",
        );
    }

    #[test]
    fn malformed_documents() {
        let mut reader = new_reader("[1 2]");
        reader.begin_array().unwrap();
        reader.next_int().unwrap();
        assert_syntax_error(reader.peek(), SyntaxErrorKind::UnterminatedArray, "$[1]");

        let mut reader = new_reader(r#"{"a": 1 "b": 2}"#);
        reader.begin_object().unwrap();
        reader.next_name().unwrap();
        reader.next_int().unwrap();
        assert_syntax_error(reader.peek(), SyntaxErrorKind::UnterminatedObject, "$.a");

        let mut reader = new_reader(r#"{"a" 1}"#);
        reader.begin_object().unwrap();
        reader.next_name().unwrap();
        assert_syntax_error(reader.peek(), SyntaxErrorKind::ExpectedColon, "$.a");

        let mut reader = new_reader(r#"{"a": 1,}"#);
        reader.begin_object().unwrap();
        reader.next_name().unwrap();
        reader.next_int().unwrap();
        assert_syntax_error(reader.peek(), SyntaxErrorKind::ExpectedName, "$.a");
    }

    #[test]
    fn value_too_long() {
        let long_literal = "x".repeat(MAX_LITERAL_LENGTH + 1);
        let mut reader = new_lenient_reader(&long_literal);
        assert!(matches!(
            reader.next_string(),
            Err(ReaderError::ValueTooLong { limit: MAX_LITERAL_LENGTH, .. })
        ));

        let long_number = "1".repeat(MAX_LITERAL_LENGTH + 1);
        let mut reader = new_reader(&long_number);
        assert!(matches!(
            reader.next_long(),
            Err(ReaderError::ValueTooLong { limit: MAX_LITERAL_LENGTH, .. })
        ));
    }

    #[test]
    fn long_strings_are_unbounded() -> TestResult {
        // The literal length cap applies to unquoted and number literals
        // only, not to strings
        let content = "y".repeat(MAX_LITERAL_LENGTH * 3);
        let json = format!("\"{content}\"");
        let mut reader = new_reader(&json);
        assert_eq!(content, reader.next_string()?);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "Incorrect reader usage")]
    fn use_after_close() {
        let mut reader = new_reader("[]");
        reader.close();
        let _ = reader.peek();
    }

    #[test]
    fn close_mid_document() {
        let mut reader = new_reader(r#"{"a": 1}"#);
        reader.begin_object().unwrap();
        reader.close();
        assert_eq!("$", reader.path());
    }
}
