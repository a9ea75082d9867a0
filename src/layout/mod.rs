//! Layout and relocation
//!
//! Compiles a [`SchemaSet`] and optional record data into one contiguous,
//! pointer-free image:
//!
//! 1. the builder registers the root segment and, lazily, every body below it
//! 2. the scheduler places segments in FIFO discovery order
//! 3. the patcher writes every segment's final offset into its placeholders
//!
//! Offsets are unsigned values of the schema's offset width, measured from the
//! start of the image (or from an anchor segment inside map bodies). An offset
//! of 0 means "absent".

mod builder;
pub mod names;
pub mod relocation;
pub mod segment;

pub use relocation::Relocation;
pub use segment::{Layout, SegmentRecord};

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use tracing::{debug, info};

use crate::checksum::Checksum;
use crate::codec::WideMode;
use crate::config::{HeaderCase, PackConfig};
use crate::diagnostics::Diagnostics;
use crate::document::{SchemaLoader, SchemaSet};
use crate::error::Result;
use crate::records::{RecordSource, Workbook};

/// Knobs that change the produced bytes
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub wide_mode: WideMode,
    /// Header whose truthy cells select exported rows
    pub filter_column: String,
    pub header_case: HeaderCase,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::from_config(&PackConfig::default())
    }
}

impl CompileOptions {
    pub fn from_config(config: &PackConfig) -> Self {
        Self {
            wide_mode: WideMode::from_legacy_flag(config.encoding.legacy_wide_values),
            filter_column: config.records.filter_column.clone(),
            header_case: config.records.header_case,
        }
    }
}

/// A finished image plus everything learned while producing it
#[derive(Debug, Clone)]
pub struct CompiledImage {
    bytes: Vec<u8>,
    segments: Vec<SegmentRecord>,
    offsets: HashMap<String, usize>,
    relocations: Vec<Relocation>,
    diagnostics: Diagnostics,
}

impl CompiledImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Segments in placement order
    pub fn segments(&self) -> &[SegmentRecord] {
        &self.segments
    }

    /// Absolute offset of an emitted segment
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    /// The segment record for `name`
    pub fn segment(&self, name: &str) -> Option<&SegmentRecord> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Relocations in registration order
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn checksum(&self) -> Checksum {
        Checksum::from_bytes(&self.bytes)
    }

    /// Segment table for CLI output
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:>10}  {:>10}  segment", "offset", "bytes");
        for segment in &self.segments {
            let _ = writeln!(out, "{:>#10x}  {:>10}  {}", segment.offset, segment.len, segment.name);
        }
        let _ = writeln!(out, "\n{} bytes, {} segments, {} relocations", self.len(), self.segments.len(), self.relocations.len());
        let _ = writeln!(out, "sha256 {}", self.checksum());
        out
    }
}

/// Compile a schema set into an image
pub fn compile(
    set: &SchemaSet,
    records: Option<&dyn RecordSource>,
    options: &CompileOptions,
) -> Result<CompiledImage> {
    let mut layout = Layout::new(options.wide_mode);
    layout.enqueue(names::ROOT, move |layout| builder::build_root(layout, set, records, options))?;

    let placed = layout.drain()?;
    let mut bytes = placed.buffer;
    relocation::patch(&mut bytes, &placed.relocations, &placed.offsets, options.wide_mode)?;

    debug!(
        schema = %set.root.name,
        bytes = bytes.len(),
        segments = placed.segments.len(),
        warnings = placed.diagnostics.warning_count(),
        "compiled image"
    );

    Ok(CompiledImage {
        bytes,
        segments: placed.segments,
        offsets: placed.offsets,
        relocations: placed.relocations,
        diagnostics: placed.diagnostics,
    })
}

/// Load a schema file (with imports) and optional record data, then compile
pub fn compile_files(schema: &Path, data: Option<&Path>, config: &PackConfig) -> Result<CompiledImage> {
    let set = SchemaLoader::new(&config.imports).load(schema)?;
    info!(schema = %set.root.name, imports = set.imports.len(), "loaded schema");

    let workbook = match data {
        Some(path) => Some(Workbook::open(path, &config.records)?),
        None => None,
    };

    let options = CompileOptions::from_config(config);
    compile(&set, workbook.as_ref().map(|w| w as &dyn RecordSource), &options)
}
