//! Composite field shapes
//!
//! Columns, variables and map-forwarded variables are all lists of
//! [`FieldSource`]s. How such a list is presented (bare scalar, fixed array,
//! or struct) is decided here, once, and every backend and the byte encoder
//! consume the result.

use super::PrimitiveType;

/// One typed field of a column or variable, with its count already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSource {
    pub name: String,
    pub ty: PrimitiveType,
    /// Element count per row (1 for plain scalars)
    pub count: u32,
    /// Value used wherever no source data exists
    pub default: f64,
}

impl FieldSource {
    pub fn new(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Self {
            name: name.into(),
            ty,
            count: 1,
            default: 0.0,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    /// Bytes this field occupies in one row
    pub fn byte_width(&self) -> usize {
        self.ty.width() * self.count as usize
    }
}

/// The resolved presentation of a field list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldShape<'a> {
    /// No fields declared
    Empty,
    /// One field, count <= 1
    Scalar(PrimitiveType),
    /// One field, count > 1. Backends that need a symbolic name may wrap it in a struct.
    Array { ty: PrimitiveType, count: u32 },
    /// Two or more fields, laid out row-major
    Struct(&'a [FieldSource]),
}

impl FieldShape<'_> {
    pub fn is_struct(&self) -> bool {
        matches!(self, FieldShape::Struct(_))
    }
}

/// An ordered list of field sources (a column's `sources`, a variable's `types`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composite {
    pub fields: Vec<FieldSource>,
}

impl Composite {
    pub fn new(fields: Vec<FieldSource>) -> Self {
        Self { fields }
    }

    pub fn single(field: FieldSource) -> Self {
        Self { fields: vec![field] }
    }

    /// The three-way scalar/array/struct rule
    pub fn shape(&self) -> FieldShape<'_> {
        match self.fields.as_slice() {
            [] => FieldShape::Empty,
            [field] if field.count <= 1 => FieldShape::Scalar(field.ty),
            [field] => FieldShape::Array {
                ty: field.ty,
                count: field.count,
            },
            fields => FieldShape::Struct(fields),
        }
    }

    /// Bytes per row
    pub fn row_width(&self) -> usize {
        self.fields.iter().map(FieldSource::byte_width).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Element types and counts in layout order, used to compare two declarations
    pub fn layout_signature(&self) -> Vec<(PrimitiveType, u32)> {
        self.fields.iter().map(|f| (f.ty, f.count)).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSource> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_scalar() {
        let composite = Composite::single(FieldSource::new("hp", PrimitiveType::U16));
        assert_eq!(composite.shape(), FieldShape::Scalar(PrimitiveType::U16));
        assert_eq!(composite.row_width(), 2);
    }

    #[test]
    fn test_single_array() {
        let composite = Composite::single(FieldSource::new("xy", PrimitiveType::F32).with_count(2));
        assert_eq!(
            composite.shape(),
            FieldShape::Array {
                ty: PrimitiveType::F32,
                count: 2
            }
        );
        assert_eq!(composite.row_width(), 8);
    }

    #[test]
    fn test_multiple_fields_are_struct() {
        let composite = Composite::new(vec![
            FieldSource::new("x", PrimitiveType::I16),
            FieldSource::new("flags", PrimitiveType::U8).with_count(1),
        ]);
        assert!(composite.shape().is_struct());
        assert_eq!(composite.row_width(), 3);
        assert_eq!(
            composite.layout_signature(),
            vec![(PrimitiveType::I16, 1), (PrimitiveType::U8, 1)]
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(Composite::default().shape(), FieldShape::Empty);
    }
}
