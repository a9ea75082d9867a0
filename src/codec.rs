//! Byte Encoder
//!
//! Little-endian encoding of numeric values at a fixed primitive width.
//!
//! Integer targets truncate toward zero and reject values outside their range.
//! 64-bit targets have two modes: [`WideMode::Legacy`] writes a 32-bit value in
//! the low word and zero-fills the high word (u64 modulo 2^32, i64 wrapped to
//! i32, f64 stored as the bits of an f32), [`WideMode::Full`] writes the whole
//! 8 bytes.

use crate::error::EncodingError;
use crate::model::PrimitiveType;

/// How 64-bit primitives are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WideMode {
    #[default]
    Legacy,
    Full,
}

impl WideMode {
    pub fn from_legacy_flag(legacy: bool) -> Self {
        if legacy {
            WideMode::Legacy
        } else {
            WideMode::Full
        }
    }
}

/// Encode `values` as `values.len() * ty.width()` little-endian bytes
pub fn encode(ty: PrimitiveType, values: &[f64], mode: WideMode) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(values.len() * ty.width());
    for &value in values {
        encode_into(&mut out, ty, value, mode)?;
    }
    Ok(out)
}

/// Append one encoded value to `out`
pub fn encode_into(out: &mut Vec<u8>, ty: PrimitiveType, value: f64, mode: WideMode) -> Result<(), EncodingError> {
    if ty.is_float() {
        return encode_float(out, ty, value, mode);
    }

    if !value.is_finite() {
        return Err(EncodingError::NotFinite { value, ty });
    }
    let value = value.trunc();
    if let Some((min, max)) = ty.integer_range() {
        if value < min || value > max {
            return Err(EncodingError::OutOfRange { value, ty });
        }
    }

    match ty {
        PrimitiveType::U8 => out.push(value as u8),
        PrimitiveType::I8 => out.extend_from_slice(&(value as i8).to_le_bytes()),
        PrimitiveType::U16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
        PrimitiveType::I16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
        PrimitiveType::U32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
        PrimitiveType::I32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
        PrimitiveType::U64 => match mode {
            WideMode::Legacy => {
                out.extend_from_slice(&((value as u64) as u32).to_le_bytes());
                out.extend_from_slice(&[0; 4]);
            }
            WideMode::Full => out.extend_from_slice(&(value as u64).to_le_bytes()),
        },
        PrimitiveType::I64 => match mode {
            WideMode::Legacy => {
                out.extend_from_slice(&((value as i64) as i32).to_le_bytes());
                out.extend_from_slice(&[0; 4]);
            }
            WideMode::Full => out.extend_from_slice(&(value as i64).to_le_bytes()),
        },
        PrimitiveType::F32 | PrimitiveType::F64 => return encode_float(out, ty, value, mode),
    }
    Ok(())
}

fn encode_float(out: &mut Vec<u8>, ty: PrimitiveType, value: f64, mode: WideMode) -> Result<(), EncodingError> {
    match (ty, mode) {
        (PrimitiveType::F64, WideMode::Full) => out.extend_from_slice(&value.to_le_bytes()),
        (PrimitiveType::F64, WideMode::Legacy) => {
            out.extend_from_slice(&(value as f32).to_le_bytes());
            out.extend_from_slice(&[0; 4]);
        }
        _ => {
            let narrowed = value as f32;
            if value.is_finite() && !narrowed.is_finite() {
                return Err(EncodingError::OutOfRange { value, ty });
            }
            out.extend_from_slice(&narrowed.to_le_bytes());
        }
    }
    Ok(())
}

/// Decode every complete element of `bytes`
pub fn decode(ty: PrimitiveType, bytes: &[u8], mode: WideMode) -> Vec<f64> {
    bytes
        .chunks_exact(ty.width())
        .map(|chunk| decode_one(ty, chunk, mode))
        .collect()
}

fn decode_one(ty: PrimitiveType, b: &[u8], mode: WideMode) -> f64 {
    let word = |i: usize| [b[i], b[i + 1], b[i + 2], b[i + 3]];
    match ty {
        PrimitiveType::U8 => b[0] as f64,
        PrimitiveType::I8 => b[0] as i8 as f64,
        PrimitiveType::U16 => u16::from_le_bytes([b[0], b[1]]) as f64,
        PrimitiveType::I16 => i16::from_le_bytes([b[0], b[1]]) as f64,
        PrimitiveType::U32 => u32::from_le_bytes(word(0)) as f64,
        PrimitiveType::I32 => i32::from_le_bytes(word(0)) as f64,
        PrimitiveType::F32 => f32::from_le_bytes(word(0)) as f64,
        PrimitiveType::U64 => match mode {
            WideMode::Legacy => u32::from_le_bytes(word(0)) as f64,
            WideMode::Full => u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64,
        },
        PrimitiveType::I64 => match mode {
            WideMode::Legacy => i32::from_le_bytes(word(0)) as f64,
            WideMode::Full => i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64,
        },
        PrimitiveType::F64 => match mode {
            WideMode::Legacy => f32::from_le_bytes(word(0)) as f64,
            WideMode::Full => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ty: PrimitiveType, values: &[f64]) {
        let bytes = encode(ty, values, WideMode::Legacy).unwrap();
        assert_eq!(bytes.len(), values.len() * ty.width());
        assert_eq!(decode(ty, &bytes, WideMode::Legacy), values, "{}", ty);
    }

    #[test]
    fn test_boundary_values() {
        roundtrip(PrimitiveType::U8, &[0.0, 255.0, 1.0]);
        roundtrip(PrimitiveType::I8, &[0.0, 127.0, -128.0, -1.0]);
        roundtrip(PrimitiveType::U16, &[0.0, 65535.0]);
        roundtrip(PrimitiveType::I16, &[0.0, 32767.0, -32768.0, -1.0]);
        roundtrip(PrimitiveType::U32, &[0.0, 4294967295.0]);
        roundtrip(PrimitiveType::I32, &[0.0, 2147483647.0, -2147483648.0, -1.0]);
        roundtrip(PrimitiveType::F32, &[0.0, -1.0, 1.5, f32::MAX as f64, f32::MIN as f64]);
    }

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(encode(PrimitiveType::U16, &[0x1234 as f64], WideMode::Legacy).unwrap(), vec![0x34, 0x12]);
        assert_eq!(encode(PrimitiveType::I16, &[-2.0], WideMode::Legacy).unwrap(), vec![0xfe, 0xff]);
        assert_eq!(
            encode(PrimitiveType::U32, &[0x0102_0304 as f64], WideMode::Legacy).unwrap(),
            vec![0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_truncates_toward_zero() {
        assert_eq!(encode(PrimitiveType::I8, &[-1.9, 2.7], WideMode::Legacy).unwrap(), vec![0xff, 0x02]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(
            encode(PrimitiveType::U8, &[256.0], WideMode::Legacy),
            Err(EncodingError::OutOfRange {
                value: 256.0,
                ty: PrimitiveType::U8
            })
        );
        assert!(encode(PrimitiveType::U16, &[-1.0], WideMode::Legacy).is_err());
        assert!(matches!(
            encode(PrimitiveType::I32, &[f64::NAN], WideMode::Legacy),
            Err(EncodingError::NotFinite { .. })
        ));
        assert!(encode(PrimitiveType::F32, &[1e300], WideMode::Legacy).is_err());
    }

    #[test]
    fn test_legacy_wide_values() {
        let bytes = encode(PrimitiveType::U64, &[4294967297.0], WideMode::Legacy).unwrap();
        assert_eq!(bytes, vec![1, 0, 0, 0, 0, 0, 0, 0]);

        let bytes = encode(PrimitiveType::I64, &[-1.0], WideMode::Legacy).unwrap();
        assert_eq!(bytes, vec![0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);

        let bytes = encode(PrimitiveType::F64, &[1.5], WideMode::Legacy).unwrap();
        assert_eq!(&bytes[..4], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[4..], &[0, 0, 0, 0]);
        assert_eq!(decode(PrimitiveType::F64, &bytes, WideMode::Legacy), vec![1.5]);
    }

    #[test]
    fn test_full_wide_values() {
        let bytes = encode(PrimitiveType::U64, &[4294967297.0], WideMode::Full).unwrap();
        assert_eq!(bytes, vec![1, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(decode(PrimitiveType::F64, &encode(PrimitiveType::F64, &[0.1], WideMode::Full).unwrap(), WideMode::Full), vec![0.1]);
        assert_eq!(decode(PrimitiveType::I64, &encode(PrimitiveType::I64, &[-5.0], WideMode::Full).unwrap(), WideMode::Full), vec![-5.0]);
    }
}
