//! Diagnostics
//!
//! Collects the recoverable conditions met while binding maps and reading
//! record data. None of these stop a compile: the affected field degrades to
//! its default or to the absent offset, and the condition is recorded here and
//! logged through `tracing`.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Map binding ===
    /// Map names a source absent from the importer, or a target absent from the import
    UnresolvedBinding,
    /// Map type names a schema that was not loaded
    MissingImport,
    /// Bound importer field has a different element layout than the imported declaration
    BindingShapeMismatch,
    /// Map entry has no binding and falls back to the imported schema's defaults
    ImportedDefaults,

    // === Record data ===
    /// Record data has no worksheet for a sheet
    MissingSourceSheet,
    /// Worksheet has no column for a field source
    MissingSourceColumn,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnresolvedBinding => "W101",
            Self::MissingImport => "W102",
            Self::MissingSourceSheet => "W103",
            Self::MissingSourceColumn => "W104",
            Self::BindingShapeMismatch => "W105",
            Self::ImportedDefaults => "I101",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::ImportedDefaults => Severity::Info,

            Self::UnresolvedBinding
            | Self::MissingImport
            | Self::MissingSourceSheet
            | Self::MissingSourceColumn
            | Self::BindingShapeMismatch => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Schema the condition was found in
    pub schema: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (suggestions, search locations)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(schema: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Attach a "did you mean" hint when one of `candidates` is close to `name`
    pub fn with_suggestion<'a>(self, name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Self {
        match suggest(name, candidates) {
            Some(candidate) => self.with_context(format!("did you mean '{}'?", candidate)),
            None => self,
        }
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.schema
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

/// Best fuzzy match for `name` among `candidates`
pub fn suggest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let matcher = SkimMatcherV2::default();
    let mut best: Option<(i64, &'a str)> = None;

    for candidate in candidates {
        let score = matcher
            .fuzzy_match(candidate, name)
            .or_else(|| matcher.fuzzy_match(name, candidate));
        if let Some(score) = score {
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
    }

    best.map(|(_, candidate)| candidate)
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from one compile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a diagnostic item
    pub fn push(&mut self, item: DiagnosticItem) {
        match item.severity() {
            Severity::Warning => warn!(
                schema = %item.schema,
                code = item.code.as_str(),
                context = ?item.context,
                "{}",
                item.message
            ),
            Severity::Info => debug!(schema = %item.schema, code = item.code.as_str(), "{}", item.message),
        }
        self.items.push(item);
    }

    /// Add a warning
    pub fn warning(&mut self, schema: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(schema, code, message));
    }

    /// Get all warnings
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Items carrying a given code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    /// Get all items
    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    /// Get total count
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Count warnings
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Format all warnings for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in self.warnings() {
            output.push_str(&format!("{}\n", item));
        }

        if self.warning_count() > 0 {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(DiagnosticCode::UnresolvedBinding.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::ImportedDefaults.severity(), Severity::Info);
        assert_eq!(DiagnosticCode::MissingSourceColumn.as_str(), "W104");
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.warning("game", DiagnosticCode::UnresolvedBinding, "source sheet 'tick' not found");
        diags.push(DiagnosticItem::new("game", DiagnosticCode::ImportedDefaults, "clock.ticks uses defaults"));

        assert_eq!(diags.len(), 2);
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.with_code(DiagnosticCode::ImportedDefaults).count(), 1);
        assert!(diags.format_all().contains("[W101] warning"));
        assert!(!diags.format_all().contains("I101"));
    }

    #[test]
    fn test_suggestion() {
        let candidates = ["local_ticks", "enemy_types", "waves"];
        assert_eq!(suggest("local_tick", candidates), Some("local_ticks"));
        assert_eq!(suggest("zzz", candidates), None);

        let item = DiagnosticItem::new("game", DiagnosticCode::UnresolvedBinding, "missing")
            .with_suggestion("wave", candidates);
        assert_eq!(item.context, vec!["did you mean 'waves'?".to_string()]);
    }
}
