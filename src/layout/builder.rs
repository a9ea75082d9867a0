//! Segment Graph Builder
//!
//! Walks a resolved schema and turns it into segments. The root segment writes
//! the root header (maps, then sheets, then variables) and enqueues each
//! construct's body; bodies enqueue their own children when they are produced,
//! so the graph unfolds one level per pass over the worklist.
//!
//! Root header: per map one placeholder, per sheet `[count, table]`, per
//! variable one placeholder. A sheet table holds one placeholder per column.
//! A map body mirrors the imported schema's root header and every relocation
//! inside it is anchored on the map body.

use tracing::debug;

use crate::diagnostics::{DiagnosticCode, DiagnosticItem};
use crate::document::SchemaSet;
use crate::error::{CompileError, Result};
use crate::model::{
    bind_map, BoundMap, BoundSheet, ColumnBinding, Composite, PrimitiveType, ResolvedSchema, Sheet,
    SheetBinding, VariableBinding,
};
use crate::records::{lookup_name, RecordSource, RowSelection};

use super::names;
use super::segment::Layout;
use super::CompileOptions;

/// Row data and sizing for one root sheet
struct SheetPlan<'p> {
    schema: &'p ResolvedSchema,
    sheet: &'p Sheet,
    selection: Option<RowSelection<'p>>,
    row_count: usize,
    capacity: usize,
}

/// Produce the root header and register every top-level body
pub(crate) fn build_root<'p>(
    layout: &mut Layout<'p>,
    set: &'p SchemaSet,
    records: Option<&'p dyn RecordSource>,
    options: &'p CompileOptions,
) -> Result<()> {
    let schema = &set.root;
    let width = schema.offset_type;

    for map in &schema.maps {
        let imported = set.import(&map.type_name);
        let bound = bind_map(map, schema, imported, &mut layout.diagnostics);
        if imported.map_or(false, |imported| imported.offset_type != width) {
            layout.diagnostics.warning(
                schema.name.clone(),
                DiagnosticCode::BindingShapeMismatch,
                format!(
                    "map '{}': '{}' uses a different offset width, forwarded counts are read at the imported width",
                    map.name, map.type_name
                ),
            );
        }

        let body = names::map(&map.name);
        layout.reserve(vec![body.clone()], width, None);
        if bound.is_empty() {
            debug!(map = %map.name, "map has nothing to bind, body omitted");
            continue;
        }
        layout.enqueue(body, move |layout| map_body(layout, bound, width))?;
    }

    for sheet in &schema.sheets {
        let plan = plan_sheet(layout, schema, sheet, records, options);
        let count_name = names::sheet_count(&sheet.name);
        let table_name = names::sheet(&sheet.name);
        layout.reserve(vec![count_name.clone(), table_name.clone()], width, None);

        let row_count = plan.row_count;
        layout.enqueue(count_name, move |layout| layout.write_values(width, &[row_count as f64]))?;
        if !sheet.columns.is_empty() {
            layout.enqueue(table_name, move |layout| sheet_table(layout, plan, width, options))?;
        }
    }

    for variable in &schema.variables {
        let name = names::variable(&variable.name);
        layout.reserve(vec![name.clone()], width, None);
        enqueue_defaults(layout, name, &variable.composite, 1)?;
    }

    Ok(())
}

fn plan_sheet<'p>(
    layout: &mut Layout<'p>,
    schema: &'p ResolvedSchema,
    sheet: &'p Sheet,
    records: Option<&'p dyn RecordSource>,
    options: &CompileOptions,
) -> SheetPlan<'p> {
    let selection = records.and_then(|records| {
        let worksheet = lookup_name(&sheet.name, options.header_case);
        match records.sheet(&worksheet) {
            Some(found) => Some(found.select(&options.filter_column)),
            None => {
                let item = DiagnosticItem::new(
                    schema.name.clone(),
                    DiagnosticCode::MissingSourceSheet,
                    format!("worksheet '{}' not found for sheet '{}'", worksheet, sheet.name),
                )
                .with_suggestion(&worksheet, records.sheet_names());
                layout.diagnostics.push(item);
                None
            }
        }
    });

    let row_count = selection.as_ref().map_or(0, RowSelection::row_count);
    let capacity = sheet.capacity(row_count);
    debug!(sheet = %sheet.name, row_count, capacity, "planned sheet");

    SheetPlan {
        schema,
        sheet,
        selection,
        row_count,
        capacity,
    }
}

/// Column table: one placeholder per column, column data registered as children
fn sheet_table<'p>(
    layout: &mut Layout<'p>,
    plan: SheetPlan<'p>,
    width: PrimitiveType,
    options: &'p CompileOptions,
) -> Result<()> {
    let sheet = plan.sheet;
    for column in &sheet.columns {
        let name = names::column(&sheet.name, &column.name);
        layout.reserve(vec![name.clone()], width, None);

        let composite = &column.composite;
        if plan.capacity == 0 || composite.row_width() == 0 {
            continue;
        }

        let values = column_values(layout, &plan, composite, options, &name)?;
        let capacity = plan.capacity;
        layout.enqueue(name, move |layout| write_rows(layout, composite, &values, capacity))?;
    }
    Ok(())
}

/// Values per field source, `capacity * count` each
fn column_values(
    layout: &mut Layout<'_>,
    plan: &SheetPlan<'_>,
    composite: &Composite,
    options: &CompileOptions,
    segment: &str,
) -> Result<Vec<Vec<f64>>> {
    let mut per_field = Vec::with_capacity(composite.fields.len());

    for field in &composite.fields {
        let Some(selection) = &plan.selection else {
            per_field.push(vec![field.default; plan.capacity * field.count as usize]);
            continue;
        };

        let header = lookup_name(&field.name, options.header_case);
        match selection.column_index(&header) {
            Some(index) => {
                let values = selection
                    .field_values(index, field, plan.capacity)
                    .map_err(|e| CompileError::encoding(segment, e))?;
                per_field.push(values);
            }
            None => {
                let item = DiagnosticItem::new(
                    plan.schema.name.clone(),
                    DiagnosticCode::MissingSourceColumn,
                    format!(
                        "column '{}' not found in worksheet for sheet '{}', filled with {}",
                        header, plan.sheet.name, field.default
                    ),
                )
                .with_suggestion(&header, selection.header().iter().map(String::as_str));
                layout.diagnostics.push(item);
                per_field.push(vec![field.default; plan.capacity * field.count as usize]);
            }
        }
    }

    Ok(per_field)
}

/// Row-major write: every field of row 0, then every field of row 1, ...
///
/// A single-field composite degenerates to a flat array.
fn write_rows(layout: &mut Layout<'_>, composite: &Composite, per_field: &[Vec<f64>], rows: usize) -> Result<()> {
    for row in 0..rows {
        for (field, values) in composite.fields.iter().zip(per_field) {
            let count = field.count as usize;
            layout.write_values(field.ty, &values[row * count..(row + 1) * count])?;
        }
    }
    Ok(())
}

/// Register a segment holding `rows` rows of default values, unless it would be empty
fn enqueue_defaults<'p>(
    layout: &mut Layout<'p>,
    name: String,
    composite: &'p Composite,
    rows: usize,
) -> Result<()> {
    if rows == 0 || composite.row_width() == 0 {
        return Ok(());
    }
    let values: Vec<Vec<f64>> = composite
        .fields
        .iter()
        .map(|field| vec![field.default; rows * field.count as usize])
        .collect();
    layout.enqueue(name, move |layout| write_rows(layout, composite, &values, rows))
}

// =============================================================================
// Maps
// =============================================================================

fn map_body<'p>(layout: &mut Layout<'p>, bound: BoundMap<'p>, importer_width: PrimitiveType) -> Result<()> {
    let map_name: &'p str = &bound.map.name;
    let anchor = names::map(map_name);
    let width = bound.imported.map_or(importer_width, |imported| imported.offset_type);

    layout.write_absent(bound.leading_maps, width);

    for bound_sheet in bound.sheets {
        let count_name = match bound_sheet.binding {
            SheetBinding::Source(source) => names::sheet_count(&source.name),
            SheetBinding::Default(_) | SheetBinding::Unresolved => {
                names::map_sheet_count(map_name, bound_sheet.target)
            }
        };
        let table_name = names::map_sheet(map_name, bound_sheet.target);
        layout.reserve(vec![count_name.clone(), table_name.clone()], width, Some(&anchor));

        if let SheetBinding::Default(_) = bound_sheet.binding {
            layout.enqueue(count_name, move |layout| layout.write_values(width, &[0.0]))?;
        }
        if !bound_sheet.columns.is_empty() {
            let anchor = anchor.clone();
            layout.enqueue(table_name, move |layout| {
                map_table(layout, map_name, bound_sheet, width, &anchor)
            })?;
        }
    }

    for bound_variable in bound.variables {
        let name = match bound_variable.binding {
            VariableBinding::Source(source) => names::variable(&source.name),
            VariableBinding::Default(_) | VariableBinding::Unresolved => {
                names::map_variable(map_name, bound_variable.target)
            }
        };
        layout.reserve(vec![name.clone()], width, Some(&anchor));

        if let VariableBinding::Default(declared) = bound_variable.binding {
            enqueue_defaults(layout, name, &declared.composite, 1)?;
        }
    }

    Ok(())
}

fn map_table<'p>(
    layout: &mut Layout<'p>,
    map_name: &'p str,
    bound_sheet: BoundSheet<'p>,
    width: PrimitiveType,
    anchor: &str,
) -> Result<()> {
    for bound_column in &bound_sheet.columns {
        let name = match bound_column.binding {
            ColumnBinding::Source { sheet, column } => names::column(&sheet.name, &column.name),
            ColumnBinding::Default { .. } | ColumnBinding::Unresolved => {
                names::map_column(map_name, bound_sheet.target, bound_column.target)
            }
        };
        layout.reserve(vec![name.clone()], width, Some(anchor));

        if let ColumnBinding::Default { sheet, column } = bound_column.binding {
            // imported defaults fill the imported declared capacity
            let capacity = sheet.declared_capacity.unwrap_or(0) as usize;
            enqueue_defaults(layout, name, &column.composite, capacity)?;
        }
    }
    Ok(())
}
