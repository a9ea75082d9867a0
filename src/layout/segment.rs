//! Segment Scheduler
//!
//! [`Layout`] is the mutable state of one compile run: the output buffer, the
//! FIFO worklist of pending segments, the relocation table and the diagnostics
//! gathered along the way. Segment producers receive `&mut Layout` and may
//! append bytes, reserve placeholders and enqueue further segments.
//!
//! Segments are placed strictly in discovery order. A segment's offset is the
//! buffer length at the moment it is dequeued, so children always land after
//! every segment discovered before them (breadth-first layering).

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::codec::{self, WideMode};
use crate::diagnostics::Diagnostics;
use crate::error::{CompileError, Result};
use crate::model::PrimitiveType;

use super::relocation::Relocation;

type Produce<'p> = Box<dyn FnOnce(&mut Layout<'p>) -> Result<()> + 'p>;

/// A named region whose bytes are produced when it is dequeued
pub struct DataSegment<'p> {
    pub name: String,
    produce: Produce<'p>,
}

impl std::fmt::Debug for DataSegment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSegment").field("name", &self.name).finish()
    }
}

/// Where a segment ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRecord {
    pub name: String,
    pub offset: usize,
    pub len: usize,
}

/// Compile context threaded through every segment producer
pub struct Layout<'p> {
    buffer: Vec<u8>,
    queue: VecDeque<DataSegment<'p>>,
    registered: HashSet<String>,
    offsets: HashMap<String, usize>,
    segments: Vec<SegmentRecord>,
    relocations: Vec<Relocation>,
    current: Option<String>,
    mode: WideMode,
    pub diagnostics: Diagnostics,
}

/// Everything a drained layout produced, before patching
#[derive(Debug)]
pub struct Placed {
    pub buffer: Vec<u8>,
    pub offsets: HashMap<String, usize>,
    pub segments: Vec<SegmentRecord>,
    pub relocations: Vec<Relocation>,
    pub diagnostics: Diagnostics,
}

impl<'p> Layout<'p> {
    pub fn new(mode: WideMode) -> Self {
        Self {
            buffer: Vec::new(),
            queue: VecDeque::new(),
            registered: HashSet::new(),
            offsets: HashMap::new(),
            segments: Vec::new(),
            relocations: Vec::new(),
            current: None,
            mode,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Current buffer length
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Register a segment at the tail of the worklist
    pub fn enqueue<F>(&mut self, name: impl Into<String>, produce: F) -> Result<()>
    where
        F: FnOnce(&mut Layout<'p>) -> Result<()> + 'p,
    {
        let name = name.into();
        if !self.registered.insert(name.clone()) {
            return Err(CompileError::DuplicateSegment(name));
        }
        self.queue.push_back(DataSegment {
            name,
            produce: Box::new(produce),
        });
        Ok(())
    }

    /// Reserve one placeholder per name and register a relocation for them
    pub fn reserve(&mut self, names: Vec<String>, width: PrimitiveType, anchor: Option<&str>) {
        let offset = self.buffer.len();
        self.buffer.resize(offset + names.len() * width.width(), 0);
        self.relocations.push(Relocation {
            offset,
            names,
            width,
            anchor: anchor.map(str::to_string),
        });
    }

    /// Append `count` absent placeholders that never get patched
    pub fn write_absent(&mut self, count: usize, width: PrimitiveType) {
        let len = self.buffer.len();
        self.buffer.resize(len + count * width.width(), 0);
    }

    /// Append encoded values
    pub fn write_values(&mut self, ty: PrimitiveType, values: &[f64]) -> Result<()> {
        let mode = self.mode;
        for &value in values {
            codec::encode_into(&mut self.buffer, ty, value, mode).map_err(|e| self.encoding_error(e))?;
        }
        Ok(())
    }

    /// Append already-encoded bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Wrap an encoding error with the segment being produced
    pub fn encoding_error(&self, source: crate::error::EncodingError) -> CompileError {
        CompileError::encoding(self.current.clone().unwrap_or_default(), source)
    }

    /// Drain the worklist, placing every segment in FIFO order
    pub fn drain(mut self) -> Result<Placed> {
        while let Some(segment) = self.queue.pop_front() {
            let offset = self.buffer.len();
            self.offsets.insert(segment.name.clone(), offset);
            self.current = Some(segment.name.clone());

            (segment.produce)(&mut self)?;

            let len = self.buffer.len() - offset;
            debug!(segment = %segment.name, offset, len, "placed segment");
            self.segments.push(SegmentRecord {
                name: segment.name,
                offset,
                len,
            });
        }

        Ok(Placed {
            buffer: self.buffer,
            offsets: self.offsets,
            segments: self.segments,
            relocations: self.relocations,
            diagnostics: self.diagnostics,
        })
    }
}
