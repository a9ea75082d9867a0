//! Map binding resolution
//!
//! A map body mirrors the imported schema's root header, so every entry the
//! imported schema declares needs a value: either one of the importer's own
//! segments (an explicit binding with a `source`), the imported schema's
//! defaults, or the absent offset when a named source cannot be found.
//!
//! Binding is resolved once here and consumed by the binary builder and the
//! ImHex backend alike.

use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};

use super::{Column, Map, MapSheet, ResolvedSchema, Sheet, Variable};

/// Where a map sheet's row count comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetBinding<'a> {
    /// The importer's sheet
    Source(&'a Sheet),
    /// The imported declaration; count is 0
    Default(&'a Sheet),
    Unresolved,
}

/// Where a map column's data comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnBinding<'a> {
    Source { sheet: &'a Sheet, column: &'a Column },
    /// Imported defaults over the imported declared capacity
    Default { sheet: &'a Sheet, column: &'a Column },
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableBinding<'a> {
    Source(&'a Variable),
    Default(&'a Variable),
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundColumn<'a> {
    pub target: &'a str,
    pub binding: ColumnBinding<'a>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundSheet<'a> {
    pub target: &'a str,
    pub binding: SheetBinding<'a>,
    pub columns: Vec<BoundColumn<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundVariable<'a> {
    pub target: &'a str,
    pub binding: VariableBinding<'a>,
}

/// A map with every body entry bound
#[derive(Debug, Clone, PartialEq)]
pub struct BoundMap<'a> {
    pub map: &'a Map,
    pub imported: Option<&'a ResolvedSchema>,
    /// Absent placeholders standing in for the imported schema's own maps
    pub leading_maps: usize,
    pub sheets: Vec<BoundSheet<'a>>,
    pub variables: Vec<BoundVariable<'a>>,
}

impl BoundMap<'_> {
    /// True when the body would hold no placeholders at all
    pub fn is_empty(&self) -> bool {
        self.leading_maps == 0 && self.sheets.is_empty() && self.variables.is_empty()
    }
}

/// Bind `map` (declared in `importer`) against its imported schema
pub fn bind_map<'a>(
    map: &'a Map,
    importer: &'a ResolvedSchema,
    imported: Option<&'a ResolvedSchema>,
    diagnostics: &mut Diagnostics,
) -> BoundMap<'a> {
    let mut binder = Binder {
        map,
        importer,
        diagnostics,
    };

    match imported {
        Some(imported) => binder.bind_imported(imported),
        None => binder.bind_declared(),
    }
}

struct Binder<'a, 'd> {
    map: &'a Map,
    importer: &'a ResolvedSchema,
    diagnostics: &'d mut Diagnostics,
}

impl<'a> Binder<'a, '_> {
    fn diagnostic(&self, code: DiagnosticCode, message: String) -> DiagnosticItem {
        DiagnosticItem::new(self.importer.name.clone(), code, message)
    }

    fn bind_imported(&mut self, imported: &'a ResolvedSchema) -> BoundMap<'a> {
        let map = self.map;

        for entry in &map.sheets {
            if imported.sheet(&entry.target).is_none() {
                let item = self
                    .diagnostic(
                        DiagnosticCode::UnresolvedBinding,
                        format!("map '{}': sheet '{}' is not declared by '{}', ignored", map.name, entry.target, imported.name),
                    )
                    .with_suggestion(&entry.target, imported.sheets.iter().map(|s| s.name.as_str()));
                self.diagnostics.push(item);
            }
        }
        for entry in &map.variables {
            if imported.variable(&entry.target).is_none() {
                let item = self
                    .diagnostic(
                        DiagnosticCode::UnresolvedBinding,
                        format!("map '{}': variable '{}' is not declared by '{}', ignored", map.name, entry.target, imported.name),
                    )
                    .with_suggestion(&entry.target, imported.variables.iter().map(|v| v.name.as_str()));
                self.diagnostics.push(item);
            }
        }

        let sheets = imported
            .sheets
            .iter()
            .map(|sheet| self.bind_imported_sheet(sheet, map.sheet(&sheet.name)))
            .collect();

        let variables = imported
            .variables
            .iter()
            .map(|variable| {
                let entry = map.variable(&variable.name);
                let binding = match entry.and_then(|v| v.source.as_deref()) {
                    Some(source) => self.importer_variable(source, Some(variable)),
                    None => {
                        self.note_default(&variable.name);
                        VariableBinding::Default(variable)
                    }
                };
                BoundVariable {
                    target: variable.name.as_str(),
                    binding,
                }
            })
            .collect();

        BoundMap {
            map,
            imported: Some(imported),
            leading_maps: imported.maps.len(),
            sheets,
            variables,
        }
    }

    fn bind_imported_sheet(&mut self, sheet: &'a Sheet, entry: Option<&'a MapSheet>) -> BoundSheet<'a> {
        let source_sheet = entry
            .and_then(|e| e.source.as_deref())
            .map(|source| (source, self.importer_sheet(source)));

        let binding = match source_sheet {
            Some((_, Some(found))) => SheetBinding::Source(found),
            Some((_, None)) => SheetBinding::Unresolved,
            None => {
                self.note_default(&sheet.name);
                SheetBinding::Default(sheet)
            }
        };

        if let Some(entry) = entry {
            for column in &entry.columns {
                if sheet.column(&column.target).is_none() {
                    let item = self
                        .diagnostic(
                            DiagnosticCode::UnresolvedBinding,
                            format!(
                                "map '{}': column '{}.{}' is not declared by the imported schema, ignored",
                                self.map.name, sheet.name, column.target
                            ),
                        )
                        .with_suggestion(&column.target, sheet.columns.iter().map(|c| c.name.as_str()));
                    self.diagnostics.push(item);
                }
            }
        }

        let columns = sheet
            .columns
            .iter()
            .map(|column| {
                let column_source = entry
                    .and_then(|e| e.column(&column.name))
                    .and_then(|c| c.source.as_deref());

                let binding = match (column_source, source_sheet) {
                    (None, _) => ColumnBinding::Default { sheet, column },
                    (Some(source), Some((_, Some(importer_sheet)))) => {
                        self.importer_column(importer_sheet, source, Some(column))
                    }
                    // source sheet already reported
                    (Some(_), Some((_, None))) => ColumnBinding::Unresolved,
                    (Some(source), None) => {
                        self.diagnostics.warning(
                            self.importer.name.clone(),
                            DiagnosticCode::UnresolvedBinding,
                            format!(
                                "map '{}': column '{}.{}' binds source '{}' but the sheet has no source",
                                self.map.name, sheet.name, column.name, source
                            ),
                        );
                        ColumnBinding::Unresolved
                    }
                };

                BoundColumn {
                    target: column.name.as_str(),
                    binding,
                }
            })
            .collect();

        BoundSheet {
            target: sheet.name.as_str(),
            binding,
            columns,
        }
    }

    fn bind_declared(&mut self) -> BoundMap<'a> {
        let map = self.map;
        self.diagnostics.warning(
            self.importer.name.clone(),
            DiagnosticCode::MissingImport,
            format!(
                "map '{}': schema '{}' is not loaded, entries without a source are left absent",
                map.name, map.type_name
            ),
        );

        let sheets = map
            .sheets
            .iter()
            .map(|entry| {
                let importer_sheet = entry.source.as_deref().and_then(|s| self.importer_sheet(s));
                let binding = importer_sheet.map_or(SheetBinding::Unresolved, SheetBinding::Source);

                let columns = entry
                    .columns
                    .iter()
                    .map(|column| {
                        let binding = match (column.source.as_deref(), importer_sheet) {
                            (Some(source), Some(sheet)) => self.importer_column(sheet, source, None),
                            _ => ColumnBinding::Unresolved,
                        };
                        BoundColumn {
                            target: column.target.as_str(),
                            binding,
                        }
                    })
                    .collect();

                BoundSheet {
                    target: entry.target.as_str(),
                    binding,
                    columns,
                }
            })
            .collect();

        let variables = map
            .variables
            .iter()
            .map(|entry| BoundVariable {
                target: entry.target.as_str(),
                binding: match entry.source.as_deref() {
                    Some(source) => self.importer_variable(source, None),
                    None => VariableBinding::Unresolved,
                },
            })
            .collect();

        BoundMap {
            map,
            imported: None,
            leading_maps: 0,
            sheets,
            variables,
        }
    }

    fn importer_sheet(&mut self, source: &str) -> Option<&'a Sheet> {
        let importer = self.importer;
        let found = importer.sheet(source);
        if found.is_none() {
            let item = self
                .diagnostic(
                    DiagnosticCode::UnresolvedBinding,
                    format!("map '{}': source sheet '{}' not found", self.map.name, source),
                )
                .with_suggestion(source, importer.sheets.iter().map(|s| s.name.as_str()));
            self.diagnostics.push(item);
        }
        found
    }

    fn importer_column(
        &mut self,
        sheet: &'a Sheet,
        source: &str,
        declared: Option<&Column>,
    ) -> ColumnBinding<'a> {
        match sheet.column(source) {
            Some(column) => {
                if let Some(declared) = declared {
                    if declared.composite.layout_signature() != column.composite.layout_signature() {
                        self.diagnostics.warning(
                            self.importer.name.clone(),
                            DiagnosticCode::BindingShapeMismatch,
                            format!(
                                "map '{}': column '{}.{}' does not match the layout of '{}'",
                                self.map.name, sheet.name, column.name, declared.name
                            ),
                        );
                    }
                }
                ColumnBinding::Source { sheet, column }
            }
            None => {
                let item = self
                    .diagnostic(
                        DiagnosticCode::UnresolvedBinding,
                        format!("map '{}': source column '{}.{}' not found", self.map.name, sheet.name, source),
                    )
                    .with_suggestion(source, sheet.columns.iter().map(|c| c.name.as_str()));
                self.diagnostics.push(item);
                ColumnBinding::Unresolved
            }
        }
    }

    fn importer_variable(&mut self, source: &str, declared: Option<&Variable>) -> VariableBinding<'a> {
        let importer = self.importer;
        match importer.variable(source) {
            Some(variable) => {
                if let Some(declared) = declared {
                    if declared.composite.layout_signature() != variable.composite.layout_signature() {
                        self.diagnostics.warning(
                            importer.name.clone(),
                            DiagnosticCode::BindingShapeMismatch,
                            format!(
                                "map '{}': variable '{}' does not match the layout of '{}'",
                                self.map.name, variable.name, declared.name
                            ),
                        );
                    }
                }
                VariableBinding::Source(variable)
            }
            None => {
                let item = self
                    .diagnostic(
                        DiagnosticCode::UnresolvedBinding,
                        format!("map '{}': source variable '{}' not found", self.map.name, source),
                    )
                    .with_suggestion(source, importer.variables.iter().map(|v| v.name.as_str()));
                self.diagnostics.push(item);
                VariableBinding::Unresolved
            }
        }
    }

    fn note_default(&mut self, target: &str) {
        let item = self.diagnostic(
            DiagnosticCode::ImportedDefaults,
            format!("map '{}': '{}' uses the defaults of '{}'", self.map.name, target, self.map.type_name),
        );
        self.diagnostics.push(item);
    }
}
