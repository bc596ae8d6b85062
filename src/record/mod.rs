//! Schema-typed record values and their two wire forms.
//!
//! A [`Structure`] describes the fields of a record; a [`Record`] holds values
//! conforming to it. Records travel to the interpreter as assignment commands
//! ([`setter_commands`]) and come back as JSON ([`put_from_json`]).

mod declaration;
mod setter;
mod structure;
mod value;
mod writer;

pub use declaration::declaration_commands;
pub use setter::{
    MAX_CHUNK_WIDTH, MAX_LINE_WIDTH, format_date, format_float, quote_literal, setter_commands,
};
pub use structure::{DataType, Field, Structure, StructureBuilder};
pub use value::{Record, SharedRecord, Value};
pub use writer::put_from_json;

/// Errors raised by the record model and its marshallers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("record {record} has no field {field}")]
    UnknownField { record: String, field: String },

    #[error("field {0} is declared more than once")]
    DuplicateField(String),

    #[error("field {field} is {actual}, not {expected}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("unrecognized type tag: {0}")]
    UnknownType(String),

    #[error("expected root {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("field {field} is missing from {record}")]
    MissingField { record: String, field: String },

    #[error("list {field} holds {expected} element(s) but {actual} were supplied")]
    ListSize {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("value for {field} is {actual} characters, limit is {limit}")]
    ValueTooLong {
        field: String,
        limit: usize,
        actual: usize,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid structure: {0}")]
    InvalidStructure(String),
}
