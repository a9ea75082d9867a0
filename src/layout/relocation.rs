//! Relocation Patcher
//!
//! Second pass over the buffer: once every segment has an offset, each
//! reserved placeholder is overwritten with the offset of the segment it names.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::codec::{self, WideMode};
use crate::error::{CompileError, Result};
use crate::model::PrimitiveType;

/// A deferred write of one or more segment offsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    /// Buffer offset of the first placeholder
    pub offset: usize,
    /// Segments whose offsets fill consecutive placeholders
    pub names: Vec<String>,
    pub width: PrimitiveType,
    /// Offsets are written relative to this segment
    pub anchor: Option<String>,
}

impl Relocation {
    /// Byte span covered by this relocation
    pub fn len(&self) -> usize {
        self.names.len() * self.width.width()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Resolve the value a single name patches in
///
/// Segments that were never emitted resolve to 0, the absent offset.
pub fn resolve(
    name: &str,
    anchor: Option<&str>,
    offsets: &HashMap<String, usize>,
) -> Result<usize> {
    let Some(&target) = offsets.get(name) else {
        return Ok(0);
    };
    let Some(anchor) = anchor else {
        return Ok(target);
    };

    let base = offsets.get(anchor).copied().unwrap_or(0);
    if target < base {
        return Err(CompileError::AnchorAfterTarget {
            target: name.to_string(),
            target_offset: target,
            anchor: anchor.to_string(),
            anchor_offset: base,
        });
    }
    Ok(target - base)
}

/// Patch every relocation, in registration order
pub fn patch(
    buffer: &mut [u8],
    relocations: &[Relocation],
    offsets: &HashMap<String, usize>,
    mode: WideMode,
) -> Result<()> {
    let mut absent = 0usize;

    for relocation in relocations {
        let mut at = relocation.offset;
        for name in &relocation.names {
            let value = resolve(name, relocation.anchor.as_deref(), offsets)?;
            if value == 0 {
                absent += 1;
            }

            let bytes = codec::encode(relocation.width, &[value as f64], mode)
                .map_err(|e| CompileError::encoding(name.clone(), e))?;
            buffer[at..at + bytes.len()].copy_from_slice(&bytes);
            at += bytes.len();
        }
    }

    debug!(relocations = relocations.len(), absent, "patched relocations");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodingError;

    fn offsets(entries: &[(&str, usize)]) -> HashMap<String, usize> {
        entries.iter().map(|(n, o)| (n.to_string(), *o)).collect()
    }

    #[test]
    fn test_multi_name_relocation() {
        let mut buffer = vec![0u8; 8];
        let relocations = vec![Relocation {
            offset: 2,
            names: vec!["waves#count".to_string(), "waves".to_string()],
            width: PrimitiveType::U16,
            anchor: None,
        }];
        patch(
            &mut buffer,
            &relocations,
            &offsets(&[("waves#count", 0x10), ("waves", 0x0102)]),
            WideMode::Legacy,
        )
        .unwrap();
        assert_eq!(buffer, vec![0, 0, 0x10, 0, 0x02, 0x01, 0, 0]);
    }

    #[test]
    fn test_absent_segment_resolves_to_zero() {
        let mut buffer = vec![0xaa; 4];
        let relocations = vec![Relocation {
            offset: 0,
            names: vec!["$missing".to_string()],
            width: PrimitiveType::U32,
            anchor: None,
        }];
        patch(&mut buffer, &relocations, &HashMap::new(), WideMode::Legacy).unwrap();
        assert_eq!(buffer, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_anchored_relocation() {
        let offsets = offsets(&[("@clock", 8), ("@clock:ticks", 20)]);
        assert_eq!(resolve("@clock:ticks", Some("@clock"), &offsets).unwrap(), 12);
        assert_eq!(resolve("@clock:gone", Some("@clock"), &offsets).unwrap(), 0);

        let err = resolve("@clock", Some("@clock:ticks"), &offsets).unwrap_err();
        assert!(matches!(err, CompileError::AnchorAfterTarget { target_offset: 8, anchor_offset: 20, .. }));
    }

    #[test]
    fn test_offset_overflow_is_encoding_error() {
        let mut buffer = vec![0u8; 1];
        let relocations = vec![Relocation {
            offset: 0,
            names: vec!["big".to_string()],
            width: PrimitiveType::U8,
            anchor: None,
        }];
        let err = patch(&mut buffer, &relocations, &offsets(&[("big", 300)]), WideMode::Legacy).unwrap_err();
        match err {
            CompileError::Encoding { segment, source } => {
                assert_eq!(segment, "big");
                assert!(matches!(source, EncodingError::OutOfRange { .. }));
            }
            other => panic!("expected encoding error, got {:?}", other),
        }
    }
}
