//! ImHex pattern backend
//!
//! Emits a pattern-language script that decodes a compiled image in the ImHex
//! editor. Every offset field is followed by a placement at that offset; data
//! placements are skipped when the offset is 0 (absent). Map bodies are
//! described from the same binding the binary builder uses, with every
//! placement relative to the map body.

use crate::diagnostics::Diagnostics;
use crate::document::SchemaSet;
use crate::model::{
    bind_map, BoundMap, BoundSheet, ColumnBinding, Composite, ResolvedSchema, SheetBinding, VariableBinding,
};
use crate::naming::{lower_first, underscore_to_pascal};

use super::{compose, push_unique, StructDecl, Syntax};

struct PatternBuilder<'a, 'd> {
    schema: &'a ResolvedSchema,
    set: &'a SchemaSet,
    root: String,
    size: &'static str,
    structs: Vec<StructDecl>,
    diagnostics: &'d mut Diagnostics,
}

/// Generate the ImHex pattern for the root schema of `set`
///
/// Map binding problems are reported into `diagnostics`.
pub fn emit_imhex_pattern(set: &SchemaSet, diagnostics: &mut Diagnostics) -> String {
    let schema = &set.root;
    let mut builder = PatternBuilder {
        schema,
        set,
        root: underscore_to_pascal(&schema.name),
        size: schema.offset_type.imhex_name(),
        structs: Vec::new(),
        diagnostics,
    };
    builder.collect();
    builder.render()
}

/// `if (offset != 0) { placement; }`
fn guarded(offset: &str, placement: String) -> String {
    format!("if ({} != 0) {{\n    {};\n  }}", offset, placement)
}

/// `Type Name` or `Type Name[count]`
fn declarator(type_name: &str, name: &str, count: u32) -> String {
    if count > 1 {
        format!("{} {}[{}]", type_name, name, count)
    } else {
        format!("{} {}", type_name, name)
    }
}

impl PatternBuilder<'_, '_> {
    fn collect(&mut self) {
        let schema = self.schema;
        let mut root = StructDecl::new(self.root.clone());

        for map in &schema.maps {
            let imported = self.set.import(&map.type_name);
            let bound = bind_map(map, schema, imported, self.diagnostics);

            let map_name = underscore_to_pascal(&map.name);
            let offset = format!("{}MapOffset", map_name);
            root.field(format!("{} {}", self.size, offset));
            if bound.is_empty() {
                continue;
            }

            let map_type = format!("{}{}Map", self.root, map_name);
            root.field(guarded(&offset, format!("{} {}Map @ {}", map_type, map_name, offset)));
            self.collect_map(&map_type, bound);
        }

        for sheet in &schema.sheets {
            let sheet_name = underscore_to_pascal(&sheet.name);
            let sheet_type = format!("{}{}", self.root, sheet_name);

            root.field(format!("{} {}CountOffset", self.size, sheet_name));
            root.field(format!("{} {}Count @ {}CountOffset", self.size, sheet_name, sheet_name));
            root.field(format!("{} {}Offset", self.size, sheet_name));
            if sheet.columns.is_empty() {
                continue;
            }
            root.field(guarded(
                &format!("{}Offset", sheet_name),
                format!("{} {} @ {}Offset", sheet_type, sheet_name, sheet_name),
            ));

            let mut table = StructDecl::new(sheet_type.clone());
            for column in &sheet.columns {
                let column_name = underscore_to_pascal(&column.name);
                let offset = format!("{}Offset", column_name);
                table.field(format!("{} {}", self.size, offset));

                let capacity = format!(
                    "GetCapacity({}, parent.{}Count)",
                    sheet.declared_capacity.unwrap_or(0),
                    sheet_name
                );
                if let Some(type_name) = self.row_type(&format!("{}{}", sheet_type, column_name), &column.composite) {
                    table.field(guarded(
                        &offset,
                        format!("{} {}[{}] @ {}", type_name, column_name, capacity, offset),
                    ));
                }
            }
            push_unique(&mut self.structs, table);
        }

        for variable in &schema.variables {
            let variable_name = underscore_to_pascal(&variable.name);
            let offset = format!("{}Offset", variable_name);
            root.field(format!("{} {}", self.size, offset));

            let name = format!("{}{}", self.root, variable_name);
            if let Some(composed) = compose(&name, &variable.composite, Syntax::ImHex, false) {
                root.field(guarded(
                    &offset,
                    format!("{} @ {}", declarator(&composed.type_name, &variable_name, composed.count), offset),
                ));
                if let Some(decl) = composed.decl {
                    push_unique(&mut self.structs, decl);
                }
            }
        }

        self.structs.push(root);
    }

    /// Struct for one map body, mirroring the imported root header
    fn collect_map(&mut self, map_type: &str, bound: BoundMap<'_>) {
        let size = bound.imported.map_or(self.size, |imported| imported.offset_type.imhex_name());
        let imported_prefix = bound.imported.map(|imported| underscore_to_pascal(&imported.name));
        let mut body = StructDecl::new(map_type);

        if let Some(imported) = bound.imported {
            for map in &imported.maps {
                body.field(format!("{} {}MapOffset", size, underscore_to_pascal(&map.name)));
            }
        }

        for bound_sheet in &bound.sheets {
            let target = underscore_to_pascal(bound_sheet.target);
            body.field(format!("{} {}CountOffset", size, target));

            let has_count = !matches!(bound_sheet.binding, SheetBinding::Unresolved);
            if has_count {
                body.field(format!(
                    "{} {}Count @ addressof(this) + {}CountOffset",
                    size, target, target
                ));
            }

            body.field(format!("{} {}Offset", size, target));
            if bound_sheet.columns.is_empty() {
                continue;
            }
            let table_type = format!("{}{}", map_type, target);
            body.field(guarded(
                &format!("{}Offset", target),
                format!("{} {} @ addressof(this) + {}Offset", table_type, target, target),
            ));

            let count = if has_count {
                format!("parent.{}Count", target)
            } else {
                "0".to_string()
            };
            self.collect_map_table(&table_type, bound_sheet, size, &count, imported_prefix.as_deref());
        }

        for bound_variable in &bound.variables {
            let target = underscore_to_pascal(bound_variable.target);
            let offset = format!("{}Offset", target);
            body.field(format!("{} {}", size, offset));

            let (name, composite) = match bound_variable.binding {
                VariableBinding::Source(source) => (
                    format!("{}{}", self.root, underscore_to_pascal(&source.name)),
                    &source.composite,
                ),
                VariableBinding::Default(declared) => (
                    format!("{}{}", imported_prefix.as_deref().unwrap_or_default(), target),
                    &declared.composite,
                ),
                VariableBinding::Unresolved => continue,
            };
            if let Some(composed) = compose(&name, composite, Syntax::ImHex, false) {
                body.field(guarded(
                    &offset,
                    format!(
                        "{} @ addressof(this) + {}",
                        declarator(&composed.type_name, &target, composed.count),
                        offset
                    ),
                ));
                if let Some(decl) = composed.decl {
                    push_unique(&mut self.structs, decl);
                }
            }
        }

        push_unique(&mut self.structs, body);
    }

    fn collect_map_table(
        &mut self,
        table_type: &str,
        bound_sheet: &BoundSheet<'_>,
        size: &str,
        count: &str,
        imported_prefix: Option<&str>,
    ) {
        let target = underscore_to_pascal(bound_sheet.target);
        let mut table = StructDecl::new(table_type);

        for bound_column in &bound_sheet.columns {
            let column_name = underscore_to_pascal(bound_column.target);
            let offset = format!("{}Offset", column_name);
            table.field(format!("{} {}", size, offset));

            let (name, sheet, column) = match bound_column.binding {
                ColumnBinding::Source { sheet, column } => (
                    format!(
                        "{}{}{}",
                        self.root,
                        underscore_to_pascal(&sheet.name),
                        underscore_to_pascal(&column.name)
                    ),
                    sheet,
                    column,
                ),
                ColumnBinding::Default { sheet, column } => (
                    format!("{}{}{}", imported_prefix.unwrap_or_default(), target, column_name),
                    sheet,
                    column,
                ),
                ColumnBinding::Unresolved => continue,
            };

            if let Some(type_name) = self.row_type(&name, &column.composite) {
                table.field(guarded(
                    &offset,
                    format!(
                        "{} {}[GetCapacity({}, {})] @ addressof(parent) + {}",
                        type_name,
                        column_name,
                        sheet.declared_capacity.unwrap_or(0),
                        count,
                        offset
                    ),
                ));
            }
        }

        push_unique(&mut self.structs, table);
    }

    /// Element type of a column array; struct-shaped and array rows are wrapped
    fn row_type(&mut self, name: &str, composite: &Composite) -> Option<String> {
        let composed = compose(name, composite, Syntax::ImHex, true)?;
        if let Some(decl) = composed.decl {
            push_unique(&mut self.structs, decl);
        }
        Some(composed.type_name)
    }

    fn render(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "fn GetCapacity({size} capacity, {size} count)\n{{\n  {size} result = capacity;\n  if(result == 0) {{\n    result = count;\n  }}\n  return result;\n}};\n\n",
            size = self.size
        ));

        for decl in &self.structs {
            output.push_str(&format!("using {};\n", decl.name));
        }
        output.push('\n');

        for decl in &self.structs {
            output.push_str(&format!("struct {} {{\n", decl.name));
            for field in &decl.fields {
                if field.ends_with('}') {
                    output.push_str(&format!("  {}\n", field));
                } else {
                    output.push_str(&format!("  {};\n", field));
                }
            }
            output.push_str("};\n\n");
        }

        output.push_str(&format!("{} {} @ 0x00;\n", self.root, lower_first(&self.root)));
        output
    }
}
