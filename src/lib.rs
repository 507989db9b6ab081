#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Allow needless `return` because that makes it sometimes more obvious that
// an expression is the result of the function
#![allow(clippy::needless_return)]
// Allow `assert_eq!(true, ...)` because in some cases it is used to check a bool
// value and not a 'flag' / 'state', and `assert_eq!` makes that more explicit
#![allow(clippy::bool_assert_comparison)]
// Enable 'unused' warnings for doc tests (are disabled by default)
#![doc(test(no_crate_inject))]
#![doc(test(attr(warn(unused))))]
// Fail on warnings in doc tests
#![doc(test(attr(deny(warnings))))]

//! Pulljson is a pull-based streaming JSON tokenizer with a schema-driven
//! selective-field decoder on top.
//!
//! The tokenizer reads a JSON document token by token from any [`Read`](std::io::Read)
//! source without building a document tree, tracking the location inside the
//! document as a JSONPath-style path for error messages. The decoder extracts
//! only the fields named by a [`Schema`](decode::Schema) and skips everything
//! else, which keeps decoding cheap for documents where most of the payload
//! is irrelevant.
//!
//! # Terminology
//!
//! This crate uses the same terminology as the JSON specification:
//!
//! - *object*: `{ ... }`
//!   - *member*: Entry in an object. For example the JSON object `{"a": 1}` has the member
//!     `"a": 1` where `"a"` is the member *name* and `1` is the member *value*.
//! - *array*: `[ ... ]`
//! - *literal*:
//!   - *boolean*: `true` or `false`
//!   - `null`
//! - *number*: number value, for example `123.4e+10`
//! - *string*: string value, for example `"text in \"quotes\""`
//!
//! # Usage examples
//!
//! ## Reading token by token
//!
//! ```
//! # use pulljson::reader::JsonReader;
//! // In this example JSON data comes from a string;
//! // normally it would come from a file or a network connection
//! let json = r#"{"a": [1, true]}"#;
//! let mut json_reader = JsonReader::new(json.as_bytes());
//!
//! json_reader.begin_object()?;
//! assert_eq!("a", json_reader.next_name()?);
//!
//! json_reader.begin_array()?;
//! assert_eq!(1, json_reader.next_int()?);
//! assert_eq!(true, json_reader.next_bool()?);
//! json_reader.end_array()?;
//!
//! json_reader.end_object()?;
//! json_reader.close();
//! # Ok::<(), pulljson::reader::ReaderError>(())
//! ```
//!
//! ## Decoding selected fields
//!
//! ```
//! # use pulljson::decode::{self, FieldDescriptor, FieldValue, Schema};
//! let schema = Schema::new([
//!     ("id", FieldDescriptor::long()),
//!     ("tags", FieldDescriptor::string().repeated()),
//! ])?;
//!
//! let json = r#"{"id": 42, "ignored": {"deep": [1, 2]}, "tags": ["a", "b"]}"#;
//! let record = decode::parse(json.as_bytes(), &schema)?;
//!
//! assert_eq!(Some(&FieldValue::Long(42)), record.get("id"));
//! assert_eq!(
//!     Some(&FieldValue::List(vec![
//!         FieldValue::String("a".to_owned()),
//!         FieldValue::String("b".to_owned()),
//!     ])),
//!     record.get("tags"),
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod decode;
pub mod options;
pub mod reader;
pub mod source;

mod escape;
mod number;
