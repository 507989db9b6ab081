//! Schema-driven decoding of selected fields
//!
//! A [`Schema`] names the object members a caller is interested in and how
//! to decode each of them. [`parse`] walks the document with a
//! [`JsonReader`], dispatches member names through the schema's precompiled
//! [`Options`] set, and silently skips everything the schema does not
//! mention, so decoding cost scales with the schema rather than with the
//! document.
//!
//! The decoder keeps its own stack of [`DecodeState`] values alongside the
//! reader's scope stack. Every `begin_*` is paired with a push and every
//! `end_*` with a checked pop; a mismatch means the decoder logic itself
//! lost track of the document shape and surfaces as
//! [`DecodeError::StateMismatch`] instead of silently mis-attributing
//! values.

use crate::options::Options;
use crate::reader::{JsonReader, ReaderError, ReaderSettings, Token};
use crate::source::{BufferedSource, Source};
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

/// How the value of a schema field is decoded
#[derive(Clone, Debug)]
pub enum FieldKind {
    /// `i32` number
    Int,
    /// `i64` number
    Long,
    /// `f64` number
    Double,
    /// Boolean
    Bool,
    /// String
    String,
    /// Object whose member values are all strings, decoded into a map
    /// without a schema
    StringMap,
    /// Nested object decoded with its own schema
    Record(Schema),
}

/// Describes one field of a [`Schema`]
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    kind: FieldKind,
    repeated: bool,
}

impl FieldDescriptor {
    /// An `i32` field
    pub fn int() -> Self {
        FieldDescriptor::of(FieldKind::Int)
    }

    /// An `i64` field
    pub fn long() -> Self {
        FieldDescriptor::of(FieldKind::Long)
    }

    /// An `f64` field
    pub fn double() -> Self {
        FieldDescriptor::of(FieldKind::Double)
    }

    /// A boolean field
    pub fn boolean() -> Self {
        FieldDescriptor::of(FieldKind::Bool)
    }

    /// A string field
    pub fn string() -> Self {
        FieldDescriptor::of(FieldKind::String)
    }

    /// A field holding an object with arbitrary string-valued members
    pub fn string_map() -> Self {
        FieldDescriptor::of(FieldKind::StringMap)
    }

    /// A field holding a nested object decoded with `schema`
    pub fn record(schema: Schema) -> Self {
        FieldDescriptor::of(FieldKind::Record(schema))
    }

    fn of(kind: FieldKind) -> Self {
        FieldDescriptor {
            kind,
            repeated: false,
        }
    }

    /// Marks the field as holding a JSON array of the described kind
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }
}

/// Error constructing a [`Schema`]
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[non_exhaustive]
pub enum SchemaError {
    /// The same field name was given more than once
    #[error("duplicate field name '{name}'")]
    DuplicateField {
        /// The repeated name
        name: String,
    },
}

/// The set of object members to decode, with a precompiled name matcher
#[derive(Clone, Debug)]
pub struct Schema {
    names: Vec<String>,
    fields: Vec<FieldDescriptor>,
    options: Options,
}

impl Schema {
    /// Creates a schema from `(name, descriptor)` pairs
    pub fn new<N: Into<String>>(
        fields: impl IntoIterator<Item = (N, FieldDescriptor)>,
    ) -> Result<Self, SchemaError> {
        let mut names = Vec::new();
        let mut descriptors = Vec::new();
        for (name, descriptor) in fields {
            let name = name.into();
            if names.contains(&name) {
                return Err(SchemaError::DuplicateField { name });
            }
            names.push(name);
            descriptors.push(descriptor);
        }
        let options = Options::new(names.iter().map(String::as_str));
        Ok(Schema {
            names,
            fields: descriptors,
            options,
        })
    }

    fn field(&self, index: usize) -> (&str, &FieldDescriptor) {
        (&self.names[index], &self.fields[index])
    }
}

/// A decoded field value
#[derive(PartialEq, Clone, Debug)]
pub enum FieldValue {
    /// JSON `null`
    Null,
    /// `i32` value
    Int(i32),
    /// `i64` value
    Long(i64),
    /// `f64` value
    Double(f64),
    /// Boolean value
    Bool(bool),
    /// String value
    String(String),
    /// Array of a repeated field's values
    List(Vec<FieldValue>),
    /// Nested record
    Record(Record),
    /// String-to-string map
    StringMap(HashMap<String, String>),
}

/// The decoded fields of one object, keyed by field name
///
/// Fields absent from the document are absent from the record.
pub type Record = HashMap<String, FieldValue>;

/// What the decoder believes it is currently decoding
///
/// Maintained redundantly to the reader's own scope stack; see the
/// [module documentation](self).
#[derive(PartialEq, Eq, Clone, Copy, strum::Display, Debug)]
pub enum DecodeState {
    /// The top-level document
    Document,
    /// An object decoded with a schema
    Object,
    /// A member whose value is being decoded
    Member,
    /// An array of a repeated field
    Array,
    /// A string map object
    Map,
}

/// Error while decoding a document against a schema
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    /// Reading the document failed
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// The decoder's consistency stack was out of step with the document
    #[error("decoder state mismatch: expected {expected} but was {actual}")]
    StateMismatch {
        /// The state the decoder expected to finish
        expected: DecodeState,
        /// The state actually found on the stack
        actual: DecodeState,
    },

    /// The decoder's consistency stack was empty when a state should have
    /// been finished
    #[error("decoder state mismatch: expected {expected} but stack was empty")]
    StateUnderflow {
        /// The state the decoder expected to finish
        expected: DecodeState,
    },

    /// The decoder's consistency stack was not empty after the document end
    #[error("decoder finished with {depth} unfinished states")]
    DanglingState {
        /// Number of states left on the stack
        depth: usize,
    },
}

/// Decodes the fields selected by `schema` from the JSON bytes of `reader`
///
/// The top-level value must be an object. The underlying source is closed
/// before this returns, also on error; a failure to close is logged, never
/// returned.
pub fn parse<R: Read>(reader: R, schema: &Schema) -> Result<Record, DecodeError> {
    parse_custom(reader, schema, ReaderSettings::default())
}

/// Like [`parse`] but with custom reader settings, for example lenient mode
pub fn parse_custom<R: Read>(
    reader: R,
    schema: &Schema,
    settings: ReaderSettings,
) -> Result<Record, DecodeError> {
    parse_from_source(BufferedSource::new(reader), schema, settings)
}

/// Like [`parse_custom`] but reading from a custom [`Source`]
pub fn parse_from_source<S: Source>(
    source: S,
    schema: &Schema,
    settings: ReaderSettings,
) -> Result<Record, DecodeError> {
    let mut reader = JsonReader::from_source_custom(source, settings);
    let result = decode_document(&mut reader, schema);
    // Close failures are logged by the reader and must not mask `result`
    reader.close();
    result
}

fn decode_document<S: Source>(
    reader: &mut JsonReader<S>,
    schema: &Schema,
) -> Result<Record, DecodeError> {
    let mut decoder = FieldDecoder { states: Vec::new() };
    decoder.push(DecodeState::Document);
    let record = decoder.decode_record(reader, schema)?;
    decoder.pop(DecodeState::Document)?;
    decoder.finish()?;
    Ok(record)
}

/// Decoding logic with the redundant consistency state stack
struct FieldDecoder {
    states: Vec<DecodeState>,
}

impl FieldDecoder {
    fn push(&mut self, state: DecodeState) {
        self.states.push(state);
    }

    fn pop(&mut self, expected: DecodeState) -> Result<(), DecodeError> {
        match self.states.pop() {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(DecodeError::StateMismatch { expected, actual }),
            None => Err(DecodeError::StateUnderflow { expected }),
        }
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.states.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::DanglingState {
                depth: self.states.len(),
            })
        }
    }

    fn decode_record<S: Source>(
        &mut self,
        reader: &mut JsonReader<S>,
        schema: &Schema,
    ) -> Result<Record, DecodeError> {
        reader.begin_object()?;
        self.push(DecodeState::Object);
        let mut record = Record::new();
        while reader.has_next()? {
            match reader.select_name(&schema.options)? {
                Some(index) => {
                    let (name, descriptor) = schema.field(index);
                    self.push(DecodeState::Member);
                    let value = self.decode_field(reader, descriptor)?;
                    record.insert(name.to_owned(), value);
                    self.pop(DecodeState::Member)?;
                }
                None => {
                    // Unknown member, skipped without decoding
                    reader.skip_name()?;
                    reader.skip_value()?;
                }
            }
        }
        reader.end_object()?;
        self.pop(DecodeState::Object)?;
        Ok(record)
    }

    fn decode_field<S: Source>(
        &mut self,
        reader: &mut JsonReader<S>,
        descriptor: &FieldDescriptor,
    ) -> Result<FieldValue, DecodeError> {
        if !descriptor.repeated {
            return self.decode_single(reader, &descriptor.kind);
        }
        if reader.peek()? == Token::Null {
            reader.next_null()?;
            return Ok(FieldValue::Null);
        }
        reader.begin_array()?;
        self.push(DecodeState::Array);
        let mut values = Vec::new();
        while reader.has_next()? {
            values.push(self.decode_single(reader, &descriptor.kind)?);
        }
        reader.end_array()?;
        self.pop(DecodeState::Array)?;
        Ok(FieldValue::List(values))
    }

    fn decode_single<S: Source>(
        &mut self,
        reader: &mut JsonReader<S>,
        kind: &FieldKind,
    ) -> Result<FieldValue, DecodeError> {
        if reader.peek()? == Token::Null {
            reader.next_null()?;
            return Ok(FieldValue::Null);
        }
        match kind {
            FieldKind::Int => Ok(FieldValue::Int(reader.next_int()?)),
            FieldKind::Long => Ok(FieldValue::Long(reader.next_long()?)),
            FieldKind::Double => Ok(FieldValue::Double(reader.next_double()?)),
            FieldKind::Bool => Ok(FieldValue::Bool(reader.next_bool()?)),
            FieldKind::String => Ok(FieldValue::String(reader.next_string()?)),
            FieldKind::StringMap => self.decode_string_map(reader),
            FieldKind::Record(schema) => {
                Ok(FieldValue::Record(self.decode_record(reader, schema)?))
            }
        }
    }

    fn decode_string_map<S: Source>(
        &mut self,
        reader: &mut JsonReader<S>,
    ) -> Result<FieldValue, DecodeError> {
        reader.begin_object()?;
        self.push(DecodeState::Map);
        let mut map = HashMap::new();
        while reader.has_next()? {
            let key = reader.next_name()?;
            let value = reader.next_string()?;
            map.insert(key, value);
        }
        reader.end_object()?;
        self.pop(DecodeState::Map)?;
        Ok(FieldValue::StringMap(map))
    }
}
