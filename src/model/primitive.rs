//! Primitive element types
//!
//! The closed set of fixed-width little-endian types a field or offset can use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// A fixed-width primitive type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PrimitiveType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 10] = [
        PrimitiveType::U8,
        PrimitiveType::I8,
        PrimitiveType::U16,
        PrimitiveType::I16,
        PrimitiveType::U32,
        PrimitiveType::I32,
        PrimitiveType::U64,
        PrimitiveType::I64,
        PrimitiveType::F32,
        PrimitiveType::F64,
    ];

    /// Encoded width in bytes
    pub fn width(&self) -> usize {
        match self {
            PrimitiveType::U8 | PrimitiveType::I8 => 1,
            PrimitiveType::U16 | PrimitiveType::I16 => 2,
            PrimitiveType::U32 | PrimitiveType::I32 | PrimitiveType::F32 => 4,
            PrimitiveType::U64 | PrimitiveType::I64 | PrimitiveType::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PrimitiveType::F32 | PrimitiveType::F64)
    }

    /// Inclusive integer range, `None` for floats
    pub fn integer_range(&self) -> Option<(f64, f64)> {
        match self {
            PrimitiveType::U8 => Some((0.0, u8::MAX as f64)),
            PrimitiveType::I8 => Some((i8::MIN as f64, i8::MAX as f64)),
            PrimitiveType::U16 => Some((0.0, u16::MAX as f64)),
            PrimitiveType::I16 => Some((i16::MIN as f64, i16::MAX as f64)),
            PrimitiveType::U32 => Some((0.0, u32::MAX as f64)),
            PrimitiveType::I32 => Some((i32::MIN as f64, i32::MAX as f64)),
            PrimitiveType::U64 => Some((0.0, u64::MAX as f64)),
            PrimitiveType::I64 => Some((i64::MIN as f64, i64::MAX as f64)),
            PrimitiveType::F32 | PrimitiveType::F64 => None,
        }
    }

    /// `<stdint.h>` spelling used in schema documents and C headers
    pub fn c_name(&self) -> &'static str {
        match self {
            PrimitiveType::U8 => "uint8_t",
            PrimitiveType::I8 => "int8_t",
            PrimitiveType::U16 => "uint16_t",
            PrimitiveType::I16 => "int16_t",
            PrimitiveType::U32 => "uint32_t",
            PrimitiveType::I32 => "int32_t",
            PrimitiveType::U64 => "uint64_t",
            PrimitiveType::I64 => "int64_t",
            PrimitiveType::F32 => "float",
            PrimitiveType::F64 => "double",
        }
    }

    /// ImHex pattern language spelling
    pub fn imhex_name(&self) -> &'static str {
        match self {
            PrimitiveType::U8 => "u8",
            PrimitiveType::I8 => "s8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::I16 => "s16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::I32 => "s32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::I64 => "s64",
            PrimitiveType::F32 => "float",
            PrimitiveType::F64 => "double",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.c_name())
    }
}

impl FromStr for PrimitiveType {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim() {
            "uint8_t" | "u8" => PrimitiveType::U8,
            "int8_t" | "i8" | "s8" => PrimitiveType::I8,
            "uint16_t" | "u16" => PrimitiveType::U16,
            "int16_t" | "i16" | "s16" => PrimitiveType::I16,
            "uint32_t" | "u32" => PrimitiveType::U32,
            "int32_t" | "i32" | "s32" => PrimitiveType::I32,
            "uint64_t" | "u64" => PrimitiveType::U64,
            "int64_t" | "i64" | "s64" => PrimitiveType::I64,
            "float" | "f32" => PrimitiveType::F32,
            "double" | "f64" => PrimitiveType::F64,
            other => return Err(CompileError::UnknownType(other.to_string())),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for PrimitiveType {
    type Error = CompileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PrimitiveType> for String {
    fn from(ty: PrimitiveType) -> Self {
        ty.c_name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spellings() {
        assert_eq!("uint16_t".parse::<PrimitiveType>().unwrap(), PrimitiveType::U16);
        assert_eq!("s8".parse::<PrimitiveType>().unwrap(), PrimitiveType::I8);
        assert_eq!("double".parse::<PrimitiveType>().unwrap(), PrimitiveType::F64);
        assert!(matches!(
            "bool".parse::<PrimitiveType>(),
            Err(CompileError::UnknownType(name)) if name == "bool"
        ));
    }

    #[test]
    fn test_widths() {
        let widths: Vec<usize> = PrimitiveType::ALL.iter().map(|t| t.width()).collect();
        assert_eq!(widths, vec![1, 1, 2, 2, 4, 4, 8, 8, 4, 8]);
    }

    #[test]
    fn test_serde_uses_c_spelling() {
        let ty: PrimitiveType = serde_yaml::from_str("int32_t").unwrap();
        assert_eq!(ty, PrimitiveType::I32);
        assert_eq!(serde_json::to_string(&PrimitiveType::F32).unwrap(), "\"float\"");
    }
}
