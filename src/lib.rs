//! Sheetpack
//!
//! Compiles a declarative schema of sheets (fixed-capacity tables), variables,
//! maps (views onto imported schemas) and constants, plus optional row data,
//! into one contiguous, pointer-free binary image that can be memory-mapped and
//! read in place.
//!
//! ## Pipeline
//!
//! ```text
//! schema.yaml ──► document ──► model::ResolvedSchema ─┬─► layout::compile ──► image.bin
//!   + imports       (serde)      (constants resolved)  ├─► codegen::c_header ──► image.h
//! records (JSON/CSV) ───────────────────────────────┘  └─► codegen::imhex ──► image.hexpat
//! ```
//!
//! ## Image format
//!
//! - little-endian, fixed-width primitives
//! - the root header starts at offset 0
//! - every reference is an unsigned offset of the schema's offset width
//! - offset 0 means "absent"
//! - map bodies use offsets relative to the map body itself

pub mod checksum;
pub mod codec;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod expr;
pub mod layout;
pub mod model;
pub mod naming;
pub mod records;

pub use checksum::Checksum;
pub use codec::WideMode;
pub use config::PackConfig;
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use document::{SchemaDocument, SchemaLoader, SchemaSet};
pub use error::{CompileError, EncodingError, ExpressionError, Result};
pub use layout::{compile, compile_files, CompileOptions, CompiledImage};
pub use model::{Composite, FieldShape, FieldSource, PrimitiveType, ResolvedSchema};
pub use records::{Cell, RecordSource, SheetRecords, Workbook};
