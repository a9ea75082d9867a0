//! Schema Model
//!
//! The immutable, resolved form of a schema document. Every capacity and count
//! expression is evaluated exactly once here, against the owning schema's own
//! [`ConstantScope`]. Imported schemas are resolved independently, so a map
//! always sees the imported schema's values rather than re-evaluating them in
//! the importer's scope.

pub mod binding;
pub mod primitive;
pub mod shape;

pub use binding::{
    bind_map, BoundColumn, BoundMap, BoundSheet, BoundVariable, ColumnBinding, SheetBinding,
    VariableBinding,
};
pub use primitive::PrimitiveType;
pub use shape::{Composite, FieldShape, FieldSource};

use std::collections::HashSet;

use crate::document::{FieldSourceDocument, MapDocument, SchemaDocument};
use crate::error::{CompileError, ExpressionError, Result};
use crate::expr::ConstantScope;

/// A table of rows with typed columns
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    /// Evaluated capacity expression, if one was declared
    pub declared_capacity: Option<u32>,
    pub columns: Vec<Column>,
}

impl Sheet {
    /// `max(declared, observed)`; 0 when neither exists
    pub fn capacity(&self, observed: usize) -> usize {
        (self.declared_capacity.unwrap_or(0) as usize).max(observed)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub composite: Composite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub composite: Composite,
}

/// A binding of an imported schema into this schema's blob
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    /// Imported schema name
    pub type_name: String,
    /// Local name, defaults to the type name
    pub name: String,
    pub sheets: Vec<MapSheet>,
    pub variables: Vec<MapVariable>,
}

impl Map {
    pub fn sheet(&self, target: &str) -> Option<&MapSheet> {
        self.sheets.iter().find(|s| s.target == target)
    }

    pub fn variable(&self, target: &str) -> Option<&MapVariable> {
        self.variables.iter().find(|v| v.target == target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapSheet {
    pub target: String,
    pub source: Option<String>,
    pub columns: Vec<MapColumn>,
}

impl MapSheet {
    pub fn column(&self, target: &str) -> Option<&MapColumn> {
        self.columns.iter().find(|c| c.target == target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapColumn {
    pub target: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapVariable {
    pub target: String,
    pub source: Option<String>,
}

/// A named reference to another schema's root, used by the C header context struct
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRef {
    pub name: String,
    pub type_name: String,
}

/// A fully resolved schema
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub name: String,
    /// Width of every offset placeholder in this schema's blob
    pub offset_type: PrimitiveType,
    pub imports: Vec<String>,
    /// Constants in declaration order
    pub constants: Vec<(String, f64)>,
    pub scope: ConstantScope,
    pub sheets: Vec<Sheet>,
    pub variables: Vec<Variable>,
    pub maps: Vec<Map>,
    pub context: Vec<ContextRef>,
}

impl ResolvedSchema {
    /// Resolve a parsed document against its own constants
    pub fn resolve(document: &SchemaDocument) -> Result<Self> {
        let name = document.meta.name.clone();
        let offset_type: PrimitiveType = document.meta.offset_type.parse()?;

        let mut constants = Vec::with_capacity(document.constants.len());
        let mut scope = ConstantScope::new();
        let mut seen = HashSet::new();
        for constant in &document.constants {
            check_unique(&mut seen, &name, "constant", &constant.name)?;
            scope.define(constant.name.clone(), constant.value);
            constants.push((constant.name.clone(), constant.value));
        }

        let mut sheets = Vec::with_capacity(document.sheets.len());
        let mut seen = HashSet::new();
        for sheet in &document.sheets {
            check_unique(&mut seen, &name, "sheet", &sheet.name)?;

            let declared_capacity = match &sheet.capacity {
                Some(expr) => Some(
                    expr.resolve_count(&scope)
                        .map_err(|e| CompileError::expression(format!("{}.{} capacity", name, sheet.name), e))?,
                ),
                None => None,
            };

            let mut columns = Vec::with_capacity(sheet.columns.len());
            let mut seen_columns = HashSet::new();
            for column in &sheet.columns {
                check_unique(&mut seen_columns, &name, "column", &column.name)?;
                let context = format!("{}.{}.{}", name, sheet.name, column.name);
                columns.push(Column {
                    name: column.name.clone(),
                    composite: resolve_fields(&column.sources, &scope, &context)?,
                });
            }

            sheets.push(Sheet {
                name: sheet.name.clone(),
                declared_capacity,
                columns,
            });
        }

        let mut variables = Vec::with_capacity(document.variables.len());
        let mut seen = HashSet::new();
        for variable in &document.variables {
            check_unique(&mut seen, &name, "variable", &variable.name)?;
            let context = format!("{}.{}", name, variable.name);
            variables.push(Variable {
                name: variable.name.clone(),
                composite: resolve_fields(&variable.types, &scope, &context)?,
            });
        }

        let mut maps = Vec::with_capacity(document.maps.len());
        let mut seen = HashSet::new();
        for map in &document.maps {
            let resolved = resolve_map(map);
            check_unique(&mut seen, &name, "map", &resolved.name)?;
            maps.push(resolved);
        }

        let context = document
            .context
            .iter()
            .map(|c| ContextRef {
                name: c.name.clone(),
                type_name: c.type_name.clone(),
            })
            .collect();

        Ok(Self {
            name,
            offset_type,
            imports: document.meta.imports.clone(),
            constants,
            scope,
            sheets,
            variables,
            maps,
            context,
        })
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn map(&self, name: &str) -> Option<&Map> {
        self.maps.iter().find(|m| m.name == name)
    }
}

fn check_unique(
    seen: &mut HashSet<String>,
    schema: &str,
    kind: &'static str,
    name: &str,
) -> Result<()> {
    if !seen.insert(name.to_string()) {
        return Err(CompileError::DuplicateName {
            schema: schema.to_string(),
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn resolve_fields(
    sources: &[FieldSourceDocument],
    scope: &ConstantScope,
    context: &str,
) -> Result<Composite> {
    let mut fields = Vec::with_capacity(sources.len());
    for source in sources {
        let ty: PrimitiveType = source.ty.parse()?;
        let count = match &source.count {
            Some(expr) => expr
                .resolve_count(scope)
                .and_then(|count| match count {
                    0 => Err(ExpressionError::ZeroCount),
                    count => Ok(count),
                })
                .map_err(|e| CompileError::expression(format!("{}.{} count", context, source.name), e))?,
            None => 1,
        };
        fields.push(
            FieldSource::new(source.name.clone(), ty)
                .with_count(count)
                .with_default(source.default.unwrap_or(0.0)),
        );
    }
    Ok(Composite::new(fields))
}

fn resolve_map(map: &MapDocument) -> Map {
    Map {
        type_name: map.type_name.clone(),
        name: map.name.clone().unwrap_or_else(|| map.type_name.clone()),
        sheets: map
            .sheets
            .iter()
            .map(|s| MapSheet {
                target: s.target.clone(),
                source: s.source.clone(),
                columns: s
                    .columns
                    .iter()
                    .map(|c| MapColumn {
                        target: c.target.clone(),
                        source: c.source.clone(),
                    })
                    .collect(),
            })
            .collect(),
        variables: map
            .variables
            .iter()
            .map(|v| MapVariable {
                target: v.target.clone(),
                source: v.source.clone(),
            })
            .collect(),
    }
}
