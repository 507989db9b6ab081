//! Module for reading JSON documents token by token
//!
//! The entry point is [`JsonReader`], a pull-based tokenizer: the caller
//! drives the reader with `begin_*` / `next_*` / `end_*` calls and the reader
//! validates that the requested structure matches the document. [`peek`]
//! looks at the upcoming token without consuming it, and
//! [`select_name`](JsonReader::select_name) matches member names against a
//! precompiled [`Options`](crate::options::Options) set.
//!
//! Errors carry a JSONPath-style [path](JsonReader::path) (for example
//! `$.outer[2].name`) pointing at the location in the document.
//!
//! [`peek`]: JsonReader::peek

mod tokenizer;

pub use tokenizer::{JsonReader, ReaderSettings};

use thiserror::Error;

type IoError = std::io::Error;

/// Type of a JSON token, as returned by [`JsonReader::peek`]
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum Token {
    /// Start of a JSON array, `[`
    BeginArray,
    /// End of a JSON array, `]`
    EndArray,
    /// Start of a JSON object, `{`
    BeginObject,
    /// End of a JSON object, `}`
    EndObject,
    /// Name of a JSON object member
    Name,
    /// JSON string value
    String,
    /// JSON number value
    Number,
    /// JSON boolean value, `true` or `false`
    Boolean,
    /// JSON `null`
    Null,
    /// End of the JSON document
    EndOfDocument,
}

/// Describes why the JSON document is considered invalid
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
#[non_exhaustive]
pub enum SyntaxErrorKind {
    /// A value was expected but something else was found
    ExpectedValue,
    /// An object member name was expected but something else was found
    ExpectedName,
    /// The `:` separating a member name from its value is missing
    ExpectedColon,
    /// An array was not closed properly, for example a `,` or `]` is missing
    UnterminatedArray,
    /// An object was not closed properly, for example a `,` or `}` is missing
    UnterminatedObject,
    /// The document uses a construct which is only allowed in lenient mode,
    /// such as comments, single quotes or unquoted strings
    StrictModeViolation,
    /// A string contains a `\` followed by an unknown escape character
    UnknownEscapeSequence,
    /// A `\u` escape does not consist of four hex digits
    MalformedEscapeSequence,
    /// A `\u` escape encodes a UTF-16 surrogate without its counterpart
    UnpairedSurrogateEscape,
    /// A number is NaN or infinite, which strict mode forbids
    NonFiniteNumber,
}

/// JSON syntax error, wrapped in [`ReaderError::SyntaxError`]
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("JSON syntax error {kind} at path '{path}'")]
pub struct JsonSyntaxError {
    /// Kind of the error
    pub kind: SyntaxErrorKind,
    /// Path within the document where the error occurred
    pub path: String,
}

/// Error while reading a JSON document
///
/// All errors are fatal: after an error is returned the behavior of further
/// reader calls is unspecified (but safe). The caller should abandon the
/// reader and only [`close`](JsonReader::close) it.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReaderError {
    /// The document is not valid JSON
    #[error("{0}")]
    SyntaxError(#[from] JsonSyntaxError),

    /// The document ended in the middle of a token, value or container
    #[error("unexpected end of input while reading {context} at path '{path}'")]
    TruncatedInput {
        /// What was being read when the input ended
        context: &'static str,
        /// Path within the document where the error occurred
        path: String,
    },

    /// The next token does not have the requested type
    #[error("expected {expected} but was {actual} at path '{path}'")]
    TypeMismatch {
        /// Description of the requested token
        expected: &'static str,
        /// Description of the actual token
        actual: String,
        /// Path within the document where the error occurred
        path: String,
    },

    /// Arrays and objects are nested deeper than the configured limit
    #[error("nesting depth exceeds limit of {limit} at path '{path}'")]
    NestingLimitExceeded {
        /// The configured limit, see [`ReaderSettings::nesting_limit`]
        limit: usize,
        /// Path within the document where the error occurred
        path: String,
    },

    /// An unquoted or number literal exceeds the scratch buffer capacity
    #[error("value exceeds maximum length of {limit} bytes at path '{path}'")]
    ValueTooLong {
        /// Maximum supported literal length in bytes
        limit: usize,
        /// Path within the document where the error occurred
        path: String,
    },

    /// The underlying byte source failed, or the document contains
    /// malformed UTF-8 data
    #[error("IO error '{error}' at path '{path}'")]
    IoError {
        /// The underlying error
        error: IoError,
        /// Path within the document where the error occurred
        path: String,
    },
}
