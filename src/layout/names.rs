//! Segment names
//!
//! Every segment is keyed by a unique string. Schema names are identifiers, so
//! the punctuation used here (`#`, `:`, `$`, `@`, `/`) never collides with them.

/// The root header
pub const ROOT: &str = "/";

/// Sheet column table
pub fn sheet(sheet: &str) -> String {
    sheet.to_string()
}

/// Sheet row count
pub fn sheet_count(sheet: &str) -> String {
    format!("{}#count", sheet)
}

/// Column data
pub fn column(sheet: &str, column: &str) -> String {
    format!("{}:{}", sheet, column)
}

/// Variable data
pub fn variable(variable: &str) -> String {
    format!("${}", variable)
}

/// Map body
pub fn map(map: &str) -> String {
    format!("@{}", map)
}

/// Column table of a sheet forwarded through a map
pub fn map_sheet(map: &str, target: &str) -> String {
    format!("@{}:{}", map, target)
}

/// Row count of a sheet forwarded through a map
pub fn map_sheet_count(map: &str, target: &str) -> String {
    format!("@{}:{}#count", map, target)
}

/// Default column data emitted for a map
pub fn map_column(map: &str, target: &str, column: &str) -> String {
    format!("@{}:{}:{}", map, target, column)
}

/// Default variable data emitted for a map
pub fn map_variable(map: &str, target: &str) -> String {
    format!("@{}:${}", map, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_distinct() {
        let names = [
            sheet("ticks"),
            sheet_count("ticks"),
            column("ticks", "time"),
            variable("ticks"),
            map("ticks"),
            map_sheet("ticks", "ticks"),
            map_sheet_count("ticks", "ticks"),
            map_column("ticks", "ticks", "time"),
            map_variable("ticks", "ticks"),
            ROOT.to_string(),
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(map_column("clock", "ticks", "time"), "@clock:ticks:time");
    }
}
