//! Identifier conversion
//!
//! Schema names are snake_case. Worksheets, record headers and generated type
//! names use PascalCase; the ImHex root placement uses a lower-cased first letter.

/// `bullet_types` -> `BulletTypes`
///
/// Each underscore-separated word gets an upper-case first letter and a
/// lower-cased remainder, so `hp_MAX` becomes `HpMax`.
pub fn underscore_to_pascal(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for word in name.split('_') {
        result.push_str(&case_word(word));
    }
    result
}

/// Lower-case the first character only
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().chain(chars).collect(),
    }
}

/// Standard PascalCase: first letter upper, rest lower
fn case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let mut result = first.to_uppercase().to_string();
            for c in chars {
                result.push(c.to_ascii_lowercase());
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underscore_to_pascal() {
        assert_eq!(underscore_to_pascal("bullet_types"), "BulletTypes");
        assert_eq!(underscore_to_pascal("hp_MAX"), "HpMax");
        assert_eq!(underscore_to_pascal("spawn_xy"), "SpawnXy");
        assert_eq!(underscore_to_pascal("_leading"), "Leading");
        assert_eq!(underscore_to_pascal("ExportFilter"), "Exportfilter");
    }

    #[test]
    fn test_lower_first() {
        assert_eq!(lower_first("PlayClock"), "playClock");
        assert_eq!(lower_first(""), "");
    }
}
