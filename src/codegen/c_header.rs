//! C header backend
//!
//! Describes a compiled image as packed C structs. Every offset field is paired
//! with a `static inline` accessor that returns `NULL` for the absent offset, so
//! consumers never add a zero offset to the image base by accident.

use crate::model::{Composite, ResolvedSchema};
use crate::naming::underscore_to_pascal;

use super::{compose, push_unique, StructDecl, Syntax};

/// Column width used to align typedef names and constant values
const ALIGN: usize = 40;

struct Function {
    declaration: String,
    body: String,
}

/// A commented example call: `<declaration> = <call>;`
struct Call {
    declaration: String,
    call: String,
}

struct HeaderBuilder<'a> {
    schema: &'a ResolvedSchema,
    root: String,
    size: &'static str,
    pack_structs: Vec<StructDecl>,
    structs: Vec<StructDecl>,
    ref_structs: Vec<String>,
    functions: Vec<Function>,
    calls: Vec<Call>,
}

/// Generate the C header for `schema`
pub fn emit_c_header(schema: &ResolvedSchema) -> String {
    let mut builder = HeaderBuilder {
        schema,
        root: underscore_to_pascal(&schema.name),
        size: schema.offset_type.c_name(),
        pack_structs: Vec::new(),
        structs: Vec::new(),
        ref_structs: Vec::new(),
        functions: Vec::new(),
        calls: Vec::new(),
    };
    builder.collect();
    builder.render()
}

impl HeaderBuilder<'_> {
    fn has_root(&self) -> bool {
        !(self.schema.maps.is_empty() && self.schema.sheets.is_empty() && self.schema.variables.is_empty())
    }

    /// Bound `schema_bin` variable used by the commented calls
    fn bin(&self) -> String {
        format!("{}_bin", self.schema.name)
    }

    fn collect(&mut self) {
        let mut root = StructDecl::new(self.root.clone());

        self.collect_maps(&mut root);
        self.collect_sheets(&mut root);
        self.collect_variables(&mut root);

        if self.has_root() {
            self.pack_structs.push(root);
        }
        self.collect_context();
    }

    fn collect_maps(&mut self, root: &mut StructDecl) {
        let schema = self.schema;
        for map in &schema.maps {
            let map_name = underscore_to_pascal(&map.name);
            let map_type = underscore_to_pascal(&map.type_name);
            let field = format!("{}MapOffset", map_name);

            root.field(format!("{} {}", self.size, field));
            if !self.ref_structs.contains(&map_type) {
                self.ref_structs.push(map_type.clone());
            }

            self.functions.push(Function {
                declaration: format!("{} *{}{}MapPrt({} *root)", map_type, self.root, map_name, self.root),
                body: offset_body(&map_type, "root", &field),
            });
            self.calls.push(Call {
                declaration: format!("{} *{}_map_prt", map_type, map.name),
                call: format!("{}{}MapPrt({})", self.root, map_name, self.bin()),
            });
        }
    }

    fn collect_sheets(&mut self, root: &mut StructDecl) {
        let schema = self.schema;
        for sheet in &schema.sheets {
            let sheet_name = underscore_to_pascal(&sheet.name);
            let sheet_type = format!("{}{}", self.root, sheet_name);
            let sheet_var = format!("{}_{}_sheet", schema.name, sheet.name);

            root.field(format!("{} {}CountOffset", self.size, sheet_name));
            root.field(format!("{} {}Offset", self.size, sheet_name));

            self.functions.push(Function {
                declaration: format!("{} *{}CountPrt({} *root)", self.size, sheet_type, self.root),
                body: offset_body(self.size, "root", &format!("{}CountOffset", sheet_name)),
            });
            self.calls.push(Call {
                declaration: format!("{} *{}_count_prt", self.size, sheet.name),
                call: format!("{}CountPrt({})", sheet_type, self.bin()),
            });
            self.functions.push(Function {
                declaration: format!("{} *{}Prt({} *root)", sheet_type, sheet_type, self.root),
                body: offset_body(&sheet_type, "root", &format!("{}Offset", sheet_name)),
            });
            self.calls.push(Call {
                declaration: format!("{} *{}", sheet_type, sheet_var),
                call: format!("{}Prt({})", sheet_type, self.bin()),
            });

            let mut table = StructDecl::new(sheet_type.clone());
            let mut column_structs = Vec::new();
            for column in &sheet.columns {
                let column_name = underscore_to_pascal(&column.name);
                let field = format!("{}Offset", column_name);
                table.field(format!("{} {}", self.size, field));

                let ty = self.row_type(&format!("{}{}", sheet_type, column_name), &column.composite, &mut column_structs);
                self.functions.push(Function {
                    declaration: format!(
                        "{} *{}{}Prt({} *root, {} *sheet)",
                        ty, sheet_type, column_name, self.root, sheet_type
                    ),
                    body: format!(
                        "return (sheet->{field}) ? ({ty} *)((uintptr_t)root + sheet->{field}) : NULL;",
                        field = field,
                        ty = ty
                    ),
                });
                self.calls.push(Call {
                    declaration: format!("{} *{}_{}_prt", ty, sheet.name, column.name),
                    call: format!("{}{}Prt({}, {})", sheet_type, column_name, self.bin(), sheet_var),
                });
            }

            self.pack_structs.push(table);
            for decl in column_structs {
                push_unique(&mut self.pack_structs, decl);
            }
        }
    }

    fn collect_variables(&mut self, root: &mut StructDecl) {
        let schema = self.schema;
        for variable in &schema.variables {
            let variable_name = underscore_to_pascal(&variable.name);
            let field = format!("{}Offset", variable_name);
            root.field(format!("{} {}", self.size, field));

            let mut decls = Vec::new();
            let ty = self.row_type(&format!("{}{}", self.root, variable_name), &variable.composite, &mut decls);
            for decl in decls {
                push_unique(&mut self.pack_structs, decl);
            }

            self.functions.push(Function {
                declaration: format!("{} *{}{}Prt({} *root)", ty, self.root, variable_name, self.root),
                body: offset_body(&ty, "root", &field),
            });
            self.calls.push(Call {
                declaration: format!("{} *{}_prt", ty, variable.name),
                call: format!("{}{}Prt({})", self.root, variable_name, self.bin()),
            });
        }
    }

    fn collect_context(&mut self) {
        if self.schema.context.is_empty() {
            return;
        }

        let mut context = StructDecl::new(format!("{}Context", self.root));
        if self.has_root() {
            context.field(format!("{} *Root", self.root));
        }
        for entry in &self.schema.context {
            let ref_type = underscore_to_pascal(&entry.type_name);
            context.field(format!("{} *{}", ref_type, underscore_to_pascal(&entry.name)));
            if !self.ref_structs.contains(&ref_type) {
                self.ref_structs.push(ref_type);
            }
        }
        self.structs.push(context);
    }

    /// Pointer target type of one row; struct declarations land in `decls`
    fn row_type(&self, name: &str, composite: &Composite, decls: &mut Vec<StructDecl>) -> String {
        match compose(name, composite, Syntax::C, true) {
            Some(composed) => {
                if let Some(decl) = composed.decl {
                    decls.push(decl);
                }
                composed.type_name
            }
            None => "void".to_string(),
        }
    }

    fn render(&self) -> String {
        let mut output = String::new();

        output.push_str("#pragma once\n\n");
        output.push_str("#include <stddef.h>\n");
        output.push_str("#include <stdint.h>\n\n");

        let typedefs: Vec<&str> = self
            .pack_structs
            .iter()
            .chain(&self.structs)
            .map(|s| s.name.as_str())
            .chain(self.ref_structs.iter().map(String::as_str))
            .collect();
        if !typedefs.is_empty() {
            output.push_str("#ifndef __cplusplus\n");
            for name in typedefs {
                output.push_str(&format!("typedef struct {:<width$} {};\n", name, name, width = ALIGN));
            }
            output.push_str("#endif\n\n");
        }

        if !self.schema.constants.is_empty() {
            for (name, value) in &self.schema.constants {
                let key = format!("{}{}", self.root, underscore_to_pascal(name));
                output.push_str(&format!("#define k{:<width$} {}\n", key, value, width = ALIGN));
            }
            output.push('\n');
        }

        if !self.pack_structs.is_empty() {
            output.push_str("#pragma pack(push, 1)\n\n");
            for decl in &self.pack_structs {
                render_struct(&mut output, decl);
            }
            output.push_str("#pragma pack(pop)\n\n");
        }

        for decl in &self.structs {
            render_struct(&mut output, decl);
        }

        for function in &self.functions {
            output.push_str(&format!(
                "static inline\n{}\n{{\n  {}\n}}\n\n",
                function.declaration, function.body
            ));
        }

        if !self.calls.is_empty() {
            output.push_str("/* functions\n");
            for call in &self.calls {
                output.push_str(&format!("{} = {};\n", call.declaration, call.call));
            }
            output.push_str("*/\n");
        }

        if !self.schema.context.is_empty() {
            output.push_str("\n/* context\n");
            if self.has_root() {
                output.push_str(&format!("{} *{} = context->Root;\n", self.root, self.bin()));
            }
            for entry in &self.schema.context {
                output.push_str(&format!(
                    "{} *{} = context->{};\n",
                    underscore_to_pascal(&entry.type_name),
                    entry.name,
                    underscore_to_pascal(&entry.name)
                ));
            }
            output.push_str("*/\n");
        }

        output
    }
}

/// `return (base->field) ? (ty *)((uintptr_t)base + base->field) : NULL;`
fn offset_body(ty: &str, base: &str, field: &str) -> String {
    format!(
        "return ({base}->{field}) ? ({ty} *)((uintptr_t){base} + {base}->{field}) : NULL;",
        base = base,
        field = field,
        ty = ty
    )
}

fn render_struct(output: &mut String, decl: &StructDecl) {
    output.push_str(&format!("struct {} {{\n", decl.name));
    for field in &decl.fields {
        output.push_str(&format!("  {};\n", field));
    }
    output.push_str("};\n\n");
}
