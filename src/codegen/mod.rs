//! Code Generation
//!
//! Text backends that describe a compiled image's layout for other tools:
//!
//! - [`c_header`]: packed C structs plus inline accessors
//! - [`imhex`]: an ImHex pattern that decodes an image in the hex editor
//!
//! Neither backend computes layout. Both read the resolved schema and the one
//! scalar/array/struct decision made by [`Composite::shape`].

pub mod c_header;
pub mod imhex;

pub use c_header::emit_c_header;
pub use imhex::emit_imhex_pattern;

use crate::model::{Composite, FieldShape, PrimitiveType};
use crate::naming::underscore_to_pascal;

// =============================================================================
// Declarations
// =============================================================================

/// Which language spells the primitive names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    C,
    ImHex,
}

impl Syntax {
    pub fn primitive(&self, ty: PrimitiveType) -> &'static str {
        match self {
            Syntax::C => ty.c_name(),
            Syntax::ImHex => ty.imhex_name(),
        }
    }
}

/// A struct declaration: name plus field lines without the trailing `;`
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<String>,
}

impl StructDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(&mut self, field: impl Into<String>) {
        self.fields.push(field.into());
    }
}

/// How generated code refers to one row of a composite
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedType {
    pub type_name: String,
    /// Elements per row when the row is a bare array
    pub count: u32,
    /// Declaration to emit when the row is a named struct
    pub decl: Option<StructDecl>,
}

/// Resolve the generated type of a composite.
///
/// `name` is used when a struct is needed. A single array field is wrapped in a
/// struct only when `wrap_arrays` is set.
pub fn compose(name: &str, composite: &Composite, syntax: Syntax, wrap_arrays: bool) -> Option<ComposedType> {
    match composite.shape() {
        FieldShape::Empty => None,
        FieldShape::Scalar(ty) => Some(ComposedType {
            type_name: syntax.primitive(ty).to_string(),
            count: 1,
            decl: None,
        }),
        FieldShape::Array { ty, count } if !wrap_arrays => Some(ComposedType {
            type_name: syntax.primitive(ty).to_string(),
            count,
            decl: None,
        }),
        FieldShape::Array { .. } | FieldShape::Struct(_) => {
            let mut decl = StructDecl::new(name);
            for field in &composite.fields {
                let field_name = underscore_to_pascal(&field.name);
                let ty = syntax.primitive(field.ty);
                if field.count > 1 {
                    decl.field(format!("{} {}[{}]", ty, field_name, field.count));
                } else {
                    decl.field(format!("{} {}", ty, field_name));
                }
            }
            Some(ComposedType {
                type_name: name.to_string(),
                count: 1,
                decl: Some(decl),
            })
        }
    }
}

/// Push a declaration unless one with the same name is already present
pub(crate) fn push_unique(structs: &mut Vec<StructDecl>, decl: StructDecl) {
    if !structs.iter().any(|s| s.name == decl.name) {
        structs.push(decl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldSource;

    #[test]
    fn test_compose_scalar_and_array() {
        let scalar = Composite::single(FieldSource::new("hp", PrimitiveType::I16));
        let composed = compose("GameHp", &scalar, Syntax::ImHex, true).unwrap();
        assert_eq!(composed.type_name, "s16");
        assert!(composed.decl.is_none());

        let array = Composite::single(FieldSource::new("path", PrimitiveType::U8).with_count(4));
        let bare = compose("GamePath", &array, Syntax::C, false).unwrap();
        assert_eq!((bare.type_name.as_str(), bare.count), ("uint8_t", 4));

        let wrapped = compose("GamePath", &array, Syntax::C, true).unwrap();
        assert_eq!(wrapped.type_name, "GamePath");
        assert_eq!(wrapped.decl.unwrap().fields, vec!["uint8_t Path[4]"]);
    }

    #[test]
    fn test_compose_struct() {
        let composite = Composite::new(vec![
            FieldSource::new("spawn_x", PrimitiveType::F32),
            FieldSource::new("spawn_y", PrimitiveType::F32),
        ]);
        let composed = compose("BulletsSpawn", &composite, Syntax::C, false).unwrap();
        assert_eq!(
            composed.decl.unwrap().fields,
            vec!["float SpawnX".to_string(), "float SpawnY".to_string()]
        );
        assert!(compose("Empty", &Composite::default(), Syntax::C, false).is_none());
    }
}
