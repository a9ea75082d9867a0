//! Binary Image Tests
//!
//! Compiles the fixture schemas and checks the produced images byte for byte,
//! plus the structural properties every image must have.

use std::fs;
use std::path::{Path, PathBuf};

use sheetpack::config::ImportConfig;
use sheetpack::layout::names;
use sheetpack::{
    compile, compile_files, Cell, CompileError, CompileOptions, CompiledImage, DiagnosticCode, PackConfig,
    SchemaDocument, SchemaLoader, SchemaSet, SheetRecords, WideMode, Workbook,
};

fn fixtures_path() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").leak()
}

fn fixture(name: &str) -> PathBuf {
    fixtures_path().join(name)
}

fn u16_at(bytes: &[u8], at: usize) -> usize {
    u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize
}

fn u32_at(bytes: &[u8], at: usize) -> usize {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
}

fn compile_bullets() -> CompiledImage {
    compile_files(&fixture("bullets.yaml"), Some(&fixture("bullets.json")), &PackConfig::default()).unwrap()
}

fn play_clock() -> (String, SchemaDocument) {
    let document = SchemaDocument::from_path(&fixture("play_clock.yaml")).unwrap();
    ("play_clock".to_string(), document)
}

fn inline_set(yaml: &str) -> SchemaSet {
    SchemaSet::resolve(&SchemaDocument::from_yaml(yaml).unwrap(), &[play_clock()]).unwrap()
}

// =============================================================================
// Full Image
// =============================================================================

#[test]
fn test_bullets_image_bytes() {
    let image = compile_bullets();

    #[rustfmt::skip]
    let expected: Vec<u8> = vec![
        // root: @clock, [bullet_types#count, bullet_types], [local_ticks#count, local_ticks], $live
        0x0c, 0x00, 0x12, 0x00, 0x14, 0x00, 0x18, 0x00, 0x1a, 0x00, 0x1c, 0x00,
        // @clock (relative): [local_ticks#count, @clock:ticks], @clock:$now
        0x0c, 0x00, 0x14, 0x00, 0x16, 0x00,
        // bullet_types#count
        0x02, 0x00,
        // bullet_types: damage, spawn
        0x24, 0x00, 0x26, 0x00,
        // local_ticks#count
        0x03, 0x00,
        // local_ticks: time_q4
        0x2e, 0x00,
        // $live
        0x09, 0x00, 0x00, 0x00,
        // @clock:ticks (relative): local_ticks:time_q4
        0x22, 0x00,
        // @clock:$now
        0x05, 0x00,
        // bullet_types:damage
        0x0a, 0x1e,
        // bullet_types:spawn, row-major
        0xff, 0xff, 0x02, 0x00, 0x03, 0x00, 0x01, 0x00,
        // local_ticks:time_q4
        0x64, 0x00, 0xc8, 0x00, 0x2c, 0x01,
    ];
    assert_eq!(image.bytes(), expected.as_slice());
    assert_eq!(image.diagnostics().warning_count(), 0);
}

#[test]
fn test_segment_order_is_breadth_first() {
    let image = compile_bullets();
    let order: Vec<&str> = image.segments().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        order,
        vec![
            "/",
            "@clock",
            "bullet_types#count",
            "bullet_types",
            "local_ticks#count",
            "local_ticks",
            "$live",
            "@clock:ticks",
            "@clock:$now",
            "bullet_types:damage",
            "bullet_types:spawn",
            "local_ticks:time_q4",
        ]
    );
}

// =============================================================================
// Structural Properties
// =============================================================================

#[test]
fn test_relocations_decode_to_segment_offsets() {
    let image = compile_bullets();
    let bytes = image.bytes();

    for relocation in image.relocations() {
        let base = relocation
            .anchor
            .as_deref()
            .map_or(0, |anchor| image.offset_of(anchor).unwrap());
        for (i, name) in relocation.names.iter().enumerate() {
            let at = relocation.offset + i * relocation.width.width();
            let expected = image.offset_of(name).map_or(0, |offset| offset - base);
            assert_eq!(u16_at(bytes, at), expected, "relocation for '{}'", name);
        }
    }
}

#[test]
fn test_root_at_zero_and_segments_contiguous() {
    let image = compile_bullets();
    let segments = image.segments();

    assert_eq!(segments[0].name, names::ROOT);
    assert_eq!(segments[0].offset, 0);
    for pair in segments.windows(2) {
        assert_eq!(pair[0].offset + pair[0].len, pair[1].offset);
    }
    let last = segments.last().unwrap();
    assert_eq!(last.offset + last.len, image.len());
}

#[test]
fn test_export_filter_selects_rows_in_order() {
    let image = compile_bullets();
    let bytes = image.bytes();

    let count = image.offset_of("bullet_types#count").unwrap();
    assert_eq!(u16_at(bytes, count), 2);

    let damage = image.segment("bullet_types:damage").unwrap();
    assert_eq!(&bytes[damage.offset..damage.offset + damage.len], &[10, 30]);
}

#[test]
fn test_struct_column_is_row_major() {
    let image = compile_bullets();
    let spawn = image.segment("bullet_types:spawn").unwrap();
    let row = |i: usize| {
        let at = spawn.offset + i * 4;
        let x = i16::from_le_bytes([image.bytes()[at], image.bytes()[at + 1]]);
        let y = i16::from_le_bytes([image.bytes()[at + 2], image.bytes()[at + 3]]);
        (x, y)
    };
    assert_eq!(row(0), (-1, 2));
    // empty cell takes the declared default
    assert_eq!(row(1), (3, 1));
}

#[test]
fn test_map_relocations_are_anchored() {
    let image = compile_bullets();
    let bytes = image.bytes();
    let map = image.offset_of("@clock").unwrap();

    assert_eq!(u16_at(bytes, 0), map);
    let count = map + u16_at(bytes, map);
    assert_eq!(count, image.offset_of("local_ticks#count").unwrap());
    assert_eq!(u16_at(bytes, count), 3);

    let table = map + u16_at(bytes, map + 2);
    let time = map + u16_at(bytes, table);
    assert_eq!(time, image.offset_of("local_ticks:time_q4").unwrap());

    let now = map + u16_at(bytes, map + 4);
    assert_eq!(u16_at(bytes, now), 5);
}

#[test]
fn test_compile_is_deterministic() {
    let first = compile_bullets();
    let second = compile_bullets();
    assert_eq!(first.bytes(), second.bytes());
    assert_eq!(first.checksum(), second.checksum());
}

#[test]
fn test_csv_directory_matches_json_workbook() {
    let json = compile_bullets();
    let csv = compile_files(&fixture("bullets.yaml"), Some(&fixture("records")), &PackConfig::default()).unwrap();
    assert_eq!(json.bytes(), csv.bytes());
}

// =============================================================================
// Sizing and Absent Segments
// =============================================================================

#[test]
fn test_capacity_is_max_of_declared_and_observed() {
    let schema = |capacity: u32| {
        let yaml = format!(
            r#"
meta: {{ name: game, size: uint8_t }}
sheets:
  - name: waves
    capacity: {}
    columns:
      - name: id
        sources: [{{ name: id, type: uint8_t }}]
"#,
            capacity
        );
        SchemaSet::resolve(&SchemaDocument::from_yaml(&yaml).unwrap(), &[]).unwrap()
    };

    let mut workbook = Workbook::new();
    workbook.insert(
        "Waves",
        SheetRecords::new(
            vec!["Id".to_string()],
            vec![vec![Cell::Number(1.0)], vec![Cell::Number(2.0)], vec![Cell::Number(3.0)]],
        ),
    );
    let options = CompileOptions::default();

    let small = schema(1);
    let image = compile(&small, Some(&workbook), &options).unwrap();
    assert_eq!(u16::from(image.bytes()[image.offset_of("waves#count").unwrap()]), 3);
    let ids = image.segment("waves:id").unwrap();
    assert_eq!(&image.bytes()[ids.offset..ids.offset + ids.len], &[1, 2, 3]);

    let large = schema(5);
    let image = compile(&large, Some(&workbook), &options).unwrap();
    let ids = image.segment("waves:id").unwrap();
    assert_eq!(&image.bytes()[ids.offset..ids.offset + ids.len], &[1, 2, 3, 0, 0]);
}

#[test]
fn test_absent_segments_resolve_to_zero() {
    let image = compile_files(&fixture("standalone.yaml"), None, &PackConfig::default()).unwrap();
    let bytes = image.bytes();

    // waves#count, waves, empty_sheet#count, empty_sheet, $nothing, $seed
    let root: Vec<usize> = (0..6).map(|i| u32_at(bytes, i * 4)).collect();
    assert_eq!(root, vec![24, 28, 36, 0, 0, 40]);
    assert!(image.offset_of("$nothing").is_none());

    // declared capacity with no record data: default-filled rows, count 0
    assert_eq!(u32_at(bytes, 24), 0);
    let ids = image.segment("waves:id").unwrap();
    assert_eq!(&bytes[ids.offset..ids.offset + ids.len], &[0xff; 4]);
    assert_eq!(image.segment("waves:path").unwrap().len, 12);
    assert_eq!(image.len(), 64);
}

#[test]
fn test_wide_values_modes() {
    let path = fixture("standalone.yaml");
    let set = SchemaLoader::default().load(&path).unwrap();

    let legacy = compile(&set, None, &CompileOptions::default()).unwrap();
    let seed = legacy.segment("$seed").unwrap();
    let bytes = &legacy.bytes()[seed.offset..seed.offset + seed.len];
    assert_eq!(&bytes[..4], &0.5f32.to_le_bytes());
    assert_eq!(&bytes[4..], &[0, 0, 0, 0]);

    let options = CompileOptions {
        wide_mode: WideMode::Full,
        ..CompileOptions::default()
    };
    let full = compile(&set, None, &options).unwrap();
    let seed = full.segment("$seed").unwrap();
    assert_eq!(&full.bytes()[seed.offset..seed.offset + seed.len], &0.5f64.to_le_bytes());
}

// =============================================================================
// Recoverable Conditions
// =============================================================================

#[test]
fn test_missing_map_source_warns_and_resolves_to_zero() {
    let set = inline_set(
        r#"
meta: { name: bullets, size: uint16_t, imports: [play_clock] }
maps:
  - type: play_clock
    name: clock
    sheets:
      - target: ticks
        source: missing_ticks
"#,
    );
    let image = compile(&set, None, &CompileOptions::default()).unwrap();
    let bytes = image.bytes();
    let map = image.offset_of("@clock").unwrap();

    assert_eq!(image.diagnostics().with_code(DiagnosticCode::UnresolvedBinding).count(), 1);
    assert_eq!(u16_at(bytes, map), 0);
    assert!(image.offset_of(&names::map_sheet_count("clock", "ticks")).is_none());

    // the imported table still falls back to imported defaults
    let table = map + u16_at(bytes, map + 2);
    let time = map + u16_at(bytes, table);
    assert_eq!((u16_at(bytes, time), u16_at(bytes, time + 2)), (7, 7));
}

#[test]
fn test_missing_worksheet_warns() {
    let set = SchemaLoader::default().load(&fixture("bullets.yaml")).unwrap();
    let workbook = Workbook::new();
    let image = compile(&set, Some(&workbook), &CompileOptions::default()).unwrap();

    assert_eq!(image.diagnostics().with_code(DiagnosticCode::MissingSourceSheet).count(), 2);
    let count = image.offset_of("bullet_types#count").unwrap();
    assert_eq!(u16_at(image.bytes(), count), 0);
}

#[test]
fn test_missing_source_column_fills_defaults() {
    let set = SchemaSet::resolve(
        &SchemaDocument::from_yaml(
            r#"
meta: { name: game, size: uint16_t }
sheets:
  - name: waves
    columns:
      - name: id
        sources: [{ name: id, type: uint8_t }]
      - name: hp
        sources: [{ name: hp, type: uint8_t, default: 9 }]
"#,
        )
        .unwrap(),
        &[],
    )
    .unwrap();
    let workbook = Workbook::from_json(r#"{ "Waves": [["Id"], [1], [2]] }"#).unwrap();
    let image = compile(&set, Some(&workbook), &CompileOptions::default()).unwrap();
    let bytes = image.bytes();

    assert_eq!(image.diagnostics().with_code(DiagnosticCode::MissingSourceColumn).count(), 1);
    assert_eq!(u16_at(bytes, image.offset_of("waves#count").unwrap()), 2);
    let ids = image.segment("waves:id").unwrap();
    assert_eq!(&bytes[ids.offset..ids.offset + ids.len], &[1, 2]);
    let hp = image.segment("waves:hp").unwrap();
    assert_eq!(&bytes[hp.offset..hp.offset + hp.len], &[9, 9]);
}

#[test]
fn test_encoding_error_names_column_segment() {
    let set = SchemaSet::resolve(
        &SchemaDocument::from_yaml(
            r#"
meta: { name: game, size: uint16_t }
sheets:
  - name: waves
    columns:
      - name: id
        sources: [{ name: id, type: uint8_t }]
"#,
        )
        .unwrap(),
        &[],
    )
    .unwrap();
    let workbook = Workbook::from_json(r#"{ "Waves": [["Id"], [300]] }"#).unwrap();

    match compile(&set, Some(&workbook), &CompileOptions::default()).unwrap_err() {
        CompileError::Encoding { segment, .. } => assert_eq!(segment, "waves:id"),
        other => panic!("expected encoding error, got {:?}", other),
    }
}

// =============================================================================
// Imports
// =============================================================================

#[test]
fn test_imports_found_on_search_path() {
    let shared = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    fs::copy(fixture("play_clock.yaml"), shared.path().join("play_clock.yaml")).unwrap();
    fs::copy(fixture("bullets.yaml"), project.path().join("bullets.yaml")).unwrap();

    let schema = project.path().join("bullets.yaml");
    let err = SchemaLoader::default().load(&schema).unwrap_err();
    assert!(matches!(err, CompileError::ImportNotFound { .. }));

    let mut config = PackConfig::default();
    config.imports = ImportConfig {
        search_paths: vec![shared.path().to_path_buf()],
        ..ImportConfig::default()
    };
    let image = compile_files(&schema, Some(&fixture("bullets.json")), &config).unwrap();
    assert_eq!(image.bytes(), compile_bullets().bytes());
}

#[test]
fn test_imported_schema_uses_its_own_constants() {
    let imported = SchemaDocument::from_yaml(
        r#"
meta: { name: play_clock, size: uint16_t }
constants:
  - { name: n, value: 3 }
sheets:
  - name: ticks
    capacity: n * 2
    columns:
      - name: t
        sources: [{ name: t, type: uint8_t, count: n - 1, default: 4 }]
"#,
    )
    .unwrap();
    let root = SchemaDocument::from_yaml(
        r#"
meta: { name: bullets, size: uint16_t, imports: [play_clock] }
constants:
  - { name: n, value: 100 }
maps:
  - { type: play_clock, name: clock }
"#,
    )
    .unwrap();
    let set = SchemaSet::resolve(&root, &[("play_clock".to_string(), imported)]).unwrap();
    let image = compile(&set, None, &CompileOptions::default()).unwrap();

    // capacity 3 * 2 rows of (3 - 1) elements, never re-evaluated with n = 100
    let t = image.segment(&names::map_column("clock", "ticks", "t")).unwrap();
    assert_eq!(&image.bytes()[t.offset..t.offset + t.len], &[4; 12]);
}
