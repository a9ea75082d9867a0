//! Error types for schema compilation

use std::path::PathBuf;

use thiserror::Error;

use crate::model::PrimitiveType;

/// Result type for compile operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Fatal compile errors. Any of these aborts the compile with no output written.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Expression error in {context}: {source}")]
    Expression {
        context: String,
        #[source]
        source: ExpressionError,
    },

    #[error("Encoding error in segment '{segment}': {source}")]
    Encoding {
        segment: String,
        #[source]
        source: EncodingError,
    },

    #[error("Unknown primitive type '{0}'")]
    UnknownType(String),

    #[error("Duplicate {kind} name '{name}' in schema {schema}")]
    DuplicateName {
        schema: String,
        kind: &'static str,
        name: String,
    },

    #[error("Imported schema '{name}' not found (searched {searched:?})")]
    ImportNotFound { name: String, searched: Vec<PathBuf> },

    #[error("Import cycle detected: {0}")]
    ImportCycle(String),

    #[error("Segment '{0}' was registered twice")]
    DuplicateSegment(String),

    #[error("Relocation target '{target}' at {target_offset} precedes its anchor '{anchor}' at {anchor_offset}")]
    AnchorAfterTarget {
        target: String,
        target_offset: usize,
        anchor: String,
        anchor_offset: usize,
    },
}

impl CompileError {
    /// Wrap an expression error with the construct it was evaluated for
    pub fn expression(context: impl Into<String>, source: ExpressionError) -> Self {
        Self::Expression {
            context: context.into(),
            source,
        }
    }

    /// Wrap an encoding error with the segment being produced
    pub fn encoding(segment: impl Into<String>, source: EncodingError) -> Self {
        Self::Encoding {
            segment: segment.into(),
            source,
        }
    }
}

/// Capacity/count expression failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedCharacter { found: char, position: usize },

    #[error("unexpected token '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("undefined constant '{0}'")]
    UndefinedConstant(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NotFinite,

    #[error("result {0} is negative")]
    Negative(i32),

    #[error("element count must be at least 1")]
    ZeroCount,
}

/// A value that cannot be represented in its declared primitive width
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("non-numeric value '{0}'")]
    NonNumeric(String),

    #[error("non-finite value {value} for {ty}")]
    NotFinite { value: f64, ty: PrimitiveType },

    #[error("value {value} out of range for {ty}")]
    OutOfRange { value: f64, ty: PrimitiveType },
}
