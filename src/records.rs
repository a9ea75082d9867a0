//! Record Sources
//!
//! Row data that populates sheets. A source is a set of worksheets, each with a
//! header row naming its columns followed by data rows. Two on-disk forms are
//! supported:
//!
//! - a JSON workbook, `{ "BulletTypes": [["SpawnX", "ExportFilter"], [1.5, true]] }`
//! - a directory of CSV files, one `<Worksheet>.csv` per sheet
//!
//! A worksheet with a filter column (`ExportFilter` by default) exports only
//! rows whose filter cell is truthy, keeping their relative order.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{HeaderCase, RecordConfig};
use crate::error::{EncodingError, Result};
use crate::model::FieldSource;
use crate::naming::underscore_to_pascal;

// =============================================================================
// Cells
// =============================================================================

/// One worksheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Array cell (JSON array, or a CSV cell split on the list separator)
    List(Vec<Cell>),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Truthiness used by the filter column
    pub fn is_truthy(&self) -> bool {
        match self {
            Cell::Empty => false,
            Cell::Bool(b) => *b,
            Cell::Number(n) => *n != 0.0 && !n.is_nan(),
            Cell::Text(s) => !s.is_empty(),
            Cell::List(_) => true,
        }
    }

    /// Numeric value of a scalar cell; empty cells take `default`
    pub fn as_number(&self, default: f64) -> std::result::Result<f64, EncodingError> {
        match self {
            Cell::Empty => Ok(default),
            Cell::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Cell::Number(n) => Ok(*n),
            // numeric strings from JSON workbooks
            Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| EncodingError::NonNumeric(s.clone())),
            Cell::List(items) => Err(EncodingError::NonNumeric(format!("list of {} values", items.len()))),
        }
    }

    /// Parse CSV text into a cell
    pub fn parse(text: &str, list_separator: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Cell::Empty;
        }
        if !list_separator.is_empty() && text.contains(list_separator) {
            return Cell::List(
                text.split(list_separator)
                    .map(|part| Cell::parse(part, ""))
                    .collect(),
            );
        }
        if text.eq_ignore_ascii_case("true") {
            return Cell::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Cell::Bool(false);
        }
        match text.parse::<f64>() {
            Ok(n) => Cell::Number(n),
            Err(_) => Cell::Text(text.to_string()),
        }
    }
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Cell::Empty, Cell::Number),
            Value::String(s) if s.is_empty() => Cell::Empty,
            Value::String(s) => Cell::Text(s.clone()),
            Value::Array(items) => Cell::List(items.iter().map(Cell::from).collect()),
            Value::Object(_) => Cell::Text(value.to_string()),
        }
    }
}

// =============================================================================
// Worksheets
// =============================================================================

/// A worksheet: header plus data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRecords {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SheetRecords {
    pub fn new(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        // blank rows never count toward the observed row count
        let rows = rows
            .into_iter()
            .filter(|row| !row.iter().all(Cell::is_empty))
            .collect();
        Self { header, rows }
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.header.iter().position(|h| h == header)
    }

    /// Rows selected by the filter column, or every row when there is none
    pub fn select(&self, filter_column: &str) -> RowSelection<'_> {
        let rows = match self.column_index(filter_column) {
            Some(filter) => self
                .rows
                .iter()
                .filter(|row| row.get(filter).map_or(false, Cell::is_truthy))
                .map(Vec::as_slice)
                .collect(),
            None => self.rows.iter().map(Vec::as_slice).collect(),
        };
        RowSelection { records: self, rows }
    }
}

/// The exported rows of one worksheet
#[derive(Debug, Clone)]
pub struct RowSelection<'r> {
    records: &'r SheetRecords,
    rows: Vec<&'r [Cell]>,
}

impl<'r> RowSelection<'r> {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.records.column_index(header)
    }

    pub fn header(&self) -> &'r [String] {
        &self.records.header
    }

    /// `capacity * field.count` values for one field, in row order.
    ///
    /// Rows past the selection, empty cells and missing array elements take the
    /// field's default.
    pub fn field_values(
        &self,
        index: usize,
        field: &FieldSource,
        capacity: usize,
    ) -> std::result::Result<Vec<f64>, EncodingError> {
        let count = field.count as usize;
        let mut values = vec![field.default; capacity * count];

        for (row_index, row) in self.rows.iter().take(capacity).enumerate() {
            let cell = row.get(index).unwrap_or(&Cell::Empty);
            let slot = &mut values[row_index * count..(row_index + 1) * count];
            match cell {
                Cell::List(items) if count > 1 => {
                    for (value, item) in slot.iter_mut().zip(items) {
                        *value = item.as_number(field.default)?;
                    }
                }
                Cell::List(items) if count == 1 => {
                    if let Some(first) = items.first() {
                        slot[0] = first.as_number(field.default)?;
                    }
                }
                _ if count > 0 => slot[0] = cell.as_number(field.default)?,
                _ => {}
            }
        }

        Ok(values)
    }
}

// =============================================================================
// Record Source
// =============================================================================

/// Supplies worksheets by name
pub trait RecordSource {
    fn sheet(&self, name: &str) -> Option<&SheetRecords>;

    /// Worksheet names, used for suggestions
    fn sheet_names(&self) -> Vec<&str>;
}

/// How a schema name is spelled in worksheet names and headers
pub fn lookup_name(name: &str, case: HeaderCase) -> String {
    match case {
        HeaderCase::Pascal => underscore_to_pascal(name),
        HeaderCase::Exact => name.to_string(),
    }
}

/// Worksheets held in memory, keyed by worksheet name
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: BTreeMap<String, SheetRecords>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, records: SheetRecords) {
        self.sheets.insert(name.into(), records);
    }

    /// Parse a JSON workbook: worksheet name -> array of rows, first row is the header
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<Vec<Value>>> = serde_json::from_str(content)?;
        let mut workbook = Self::new();
        for (name, mut rows) in raw {
            if rows.is_empty() {
                workbook.insert(name, SheetRecords::default());
                continue;
            }
            let header = rows
                .remove(0)
                .iter()
                .map(|h| match h {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            let rows = rows
                .iter()
                .map(|row| row.iter().map(Cell::from).collect())
                .collect();
            workbook.insert(name, SheetRecords::new(header, rows));
        }
        Ok(workbook)
    }

    pub fn from_json_path(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Read one CSV file as a worksheet named after the file stem
    pub fn add_csv(&mut self, path: &Path, list_separator: &str) -> Result<()> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_path(path)?;

        let header = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|text| Cell::parse(text, list_separator)).collect());
        }

        debug!(worksheet = %name, rows = rows.len(), "read CSV worksheet");
        self.insert(name, SheetRecords::new(header, rows));
        Ok(())
    }

    /// Read every `*.csv` directly inside `dir`
    pub fn from_csv_dir(dir: &Path, list_separator: &str) -> Result<Self> {
        let mut workbook = Self::new();
        for entry in WalkDir::new(dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().map(|e| e != "csv").unwrap_or(true) {
                continue;
            }
            workbook.add_csv(path, list_separator)?;
        }
        Ok(workbook)
    }

    /// Open a JSON workbook, a single CSV file, or a directory of CSV files
    pub fn open(path: &Path, config: &RecordConfig) -> Result<Self> {
        if path.is_dir() {
            return Self::from_csv_dir(path, &config.list_separator);
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => {
                let mut workbook = Self::new();
                workbook.add_csv(path, &config.list_separator)?;
                Ok(workbook)
            }
            _ => Self::from_json_path(path),
        }
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl RecordSource for Workbook {
    fn sheet(&self, name: &str) -> Option<&SheetRecords> {
        self.sheets.get(name)
    }

    fn sheet_names(&self) -> Vec<&str> {
        self.sheets.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrimitiveType;

    #[test]
    fn test_filter_column_selects_truthy_rows() {
        let workbook = Workbook::from_json(
            r#"{ "Waves": [["Id", "ExportFilter"], [1, true], [2, false], [3, 1], [4, ""], [], [5, "yes"]] }"#,
        )
        .unwrap();
        let waves = workbook.sheet("Waves").unwrap();
        assert_eq!(waves.rows.len(), 5);

        let selection = waves.select("ExportFilter");
        assert_eq!(selection.row_count(), 3);
        let ids = selection
            .field_values(0, &FieldSource::new("id", PrimitiveType::U8), 3)
            .unwrap();
        assert_eq!(ids, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_field_values_pad_with_default() {
        let records = SheetRecords::new(
            vec!["Path".to_string()],
            vec![
                vec![Cell::List(vec![Cell::Number(1.0), Cell::Number(2.0)])],
                vec![Cell::Empty],
            ],
        );
        let field = FieldSource::new("path", PrimitiveType::I16).with_count(3).with_default(-1.0);
        let values = records.select("ExportFilter").field_values(0, &field, 3).unwrap();
        assert_eq!(values, vec![1.0, 2.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_text_cell_is_non_numeric() {
        let records = SheetRecords::new(vec!["Hp".to_string()], vec![vec![Cell::Text("lots".to_string())]]);
        let err = records
            .select("ExportFilter")
            .field_values(0, &FieldSource::new("hp", PrimitiveType::U16), 1)
            .unwrap_err();
        assert_eq!(err, EncodingError::NonNumeric("lots".to_string()));
    }

    #[test]
    fn test_numeric_text_cell_is_coerced() {
        let workbook = Workbook::from_json(r#"{ "Waves": [["Hp"], ["5"], [" 12 "], [7]] }"#).unwrap();
        let waves = workbook.sheet("Waves").unwrap();
        assert_eq!(waves.rows[0][0], Cell::Text("5".to_string()));

        let values = waves
            .select("ExportFilter")
            .field_values(0, &FieldSource::new("hp", PrimitiveType::U16), 3)
            .unwrap();
        assert_eq!(values, vec![5.0, 12.0, 7.0]);
    }

    #[test]
    fn test_parse_csv_cells() {
        assert_eq!(Cell::parse(" 12.5 ", ";"), Cell::Number(12.5));
        assert_eq!(Cell::parse("TRUE", ";"), Cell::Bool(true));
        assert_eq!(Cell::parse("", ";"), Cell::Empty);
        assert_eq!(Cell::parse("1;2", ";"), Cell::List(vec![Cell::Number(1.0), Cell::Number(2.0)]));
        assert_eq!(Cell::parse("goblin", ";"), Cell::Text("goblin".to_string()));
    }

    #[test]
    fn test_csv_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("EnemyTypes.csv"), "Hp,Path,ExportFilter\n10,1;2,1\n20,,0\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let workbook = Workbook::from_csv_dir(dir.path(), ";").unwrap();
        assert_eq!(workbook.sheet_names(), vec!["EnemyTypes"]);
        let enemies = workbook.sheet("EnemyTypes").unwrap();
        assert_eq!(enemies.header, vec!["Hp", "Path", "ExportFilter"]);
        assert_eq!(enemies.select("ExportFilter").row_count(), 1);
    }

    #[test]
    fn test_lookup_name() {
        assert_eq!(lookup_name("enemy_types", HeaderCase::Pascal), "EnemyTypes");
        assert_eq!(lookup_name("enemy_types", HeaderCase::Exact), "enemy_types");
    }
}
