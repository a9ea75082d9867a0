//! Schema Documents
//!
//! The serde model of a YAML schema file, plus the loader that finds and
//! parses a schema together with everything it imports.
//!
//! Imports are collected into a petgraph dependency graph so that cycles are
//! rejected before anything is resolved. Every document is then resolved into
//! a [`ResolvedSchema`] against its own constant scope.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ImportConfig;
use crate::error::{CompileError, Result};
use crate::expr::Expr;
use crate::model::ResolvedSchema;

// =============================================================================
// Document types
// =============================================================================

/// A schema file as written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub meta: MetaDocument,
    #[serde(default)]
    pub constants: Vec<ConstantDocument>,
    #[serde(default)]
    pub sheets: Vec<SheetDocument>,
    #[serde(default)]
    pub variables: Vec<VariableDocument>,
    #[serde(default)]
    pub maps: Vec<MapDocument>,
    /// Context references (C header only)
    #[serde(default)]
    pub context: Vec<ContextDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaDocument {
    pub name: String,
    /// Offset width primitive
    #[serde(rename = "size")]
    pub offset_type: String,
    #[serde(default)]
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantDocument {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSourceDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDocument {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<FieldSourceDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Expr>,
    #[serde(default)]
    pub columns: Vec<ColumnDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDocument {
    pub name: String,
    #[serde(default)]
    pub types: Vec<FieldSourceDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDocument {
    /// Imported schema name
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub sheets: Vec<MapSheetDocument>,
    #[serde(default)]
    pub variables: Vec<MapVariableDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSheetDocument {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub columns: Vec<MapColumnDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapColumnDocument {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapVariableDocument {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl SchemaDocument {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

// =============================================================================
// Schema Set
// =============================================================================

/// A resolved root schema and every schema it (transitively) imports
#[derive(Debug, Clone)]
pub struct SchemaSet {
    pub root: ResolvedSchema,
    /// Imported schemas keyed by import name
    pub imports: BTreeMap<String, ResolvedSchema>,
}

impl SchemaSet {
    /// A set with no imports
    pub fn standalone(root: ResolvedSchema) -> Self {
        Self {
            root,
            imports: BTreeMap::new(),
        }
    }

    /// Resolve a root document whose imports are already parsed
    pub fn resolve(root: &SchemaDocument, imports: &[(String, SchemaDocument)]) -> Result<Self> {
        let root = ResolvedSchema::resolve(root)?;
        let mut resolved = BTreeMap::new();
        for (name, document) in imports {
            resolved.insert(name.clone(), ResolvedSchema::resolve(document)?);
        }
        Ok(Self {
            root,
            imports: resolved,
        })
    }

    pub fn import(&self, name: &str) -> Option<&ResolvedSchema> {
        self.imports.get(name)
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Locates and parses schema files and their imports
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    search_paths: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(&ImportConfig::default())
    }
}

impl SchemaLoader {
    pub fn new(config: &ImportConfig) -> Self {
        Self {
            search_paths: config.search_paths.clone(),
            extensions: config.extensions.clone(),
        }
    }

    /// Load a schema file and all of its imports
    pub fn load(&self, path: &Path) -> Result<SchemaSet> {
        let root = SchemaDocument::from_path(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let imports = self.collect_imports(&root, &base_dir)?;
        SchemaSet::resolve(&root, &imports)
    }

    /// Parse every transitive import of `root`, rejecting cycles.
    ///
    /// Returned in dependency order (an import always precedes its importers).
    fn collect_imports(
        &self,
        root: &SchemaDocument,
        base_dir: &Path,
    ) -> Result<Vec<(String, SchemaDocument)>> {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        let mut documents: HashMap<String, SchemaDocument> = HashMap::new();

        let root_idx = graph.add_node(root.meta.name.clone());
        nodes.insert(root.meta.name.clone(), root_idx);

        let mut pending: VecDeque<(NodeIndex, Vec<String>, PathBuf)> = VecDeque::new();
        pending.push_back((root_idx, root.meta.imports.clone(), base_dir.to_path_buf()));

        while let Some((from, names, dir)) = pending.pop_front() {
            for name in names {
                if let Some(&to) = nodes.get(&name) {
                    graph.add_edge(from, to, ());
                    continue;
                }

                let path = self.locate(&name, &dir)?;
                debug!(import = %name, path = %path.display(), "loading imported schema");
                let document = SchemaDocument::from_path(&path)?;

                let to = graph.add_node(name.clone());
                nodes.insert(name.clone(), to);
                graph.add_edge(from, to, ());

                let next_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
                pending.push_back((to, document.meta.imports.clone(), next_dir));
                documents.insert(name, document);
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            CompileError::ImportCycle(graph[cycle.node_id()].clone())
        })?;

        // toposort yields importers before imports
        let mut ordered = Vec::with_capacity(documents.len());
        for idx in order.into_iter().rev() {
            if let Some(document) = documents.remove(&graph[idx]) {
                ordered.push((graph[idx].clone(), document));
            }
        }
        Ok(ordered)
    }

    /// Find `<name>.<ext>` in the importer's directory, then the search paths
    fn locate(&self, name: &str, importer_dir: &Path) -> Result<PathBuf> {
        let mut searched = Vec::new();
        let dirs = std::iter::once(importer_dir.to_path_buf()).chain(self.search_paths.iter().cloned());

        for dir in dirs {
            for ext in &self.extensions {
                let candidate = dir.join(format!("{}.{}", name, ext));
                if candidate.is_file() {
                    return Ok(candidate);
                }
                searched.push(candidate);
            }
        }

        Err(CompileError::ImportNotFound {
            name: name.to_string(),
            searched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
meta:
  name: bullets
  size: uint16_t
constants:
  - { name: max_bullets, value: 8 }
sheets:
  - name: bullet_types
    capacity: max_bullets * 2
    columns:
      - name: speed
        sources:
          - { name: speed, type: float, default: 1.5 }
variables:
  - name: live
    types:
      - { name: live, type: uint64_t }
maps:
  - type: play_clock
    sheets:
      - target: ticks
        columns:
          - { target: time, source: time_q4 }
"#;

    #[test]
    fn test_parse_document() {
        let doc = SchemaDocument::from_yaml(SCHEMA).unwrap();
        assert_eq!(doc.meta.name, "bullets");
        assert_eq!(doc.meta.offset_type, "uint16_t");
        assert_eq!(doc.sheets[0].capacity, Some(Expr::Text("max_bullets * 2".to_string())));
        assert_eq!(doc.sheets[0].columns[0].sources[0].default, Some(1.5));
        assert_eq!(doc.maps[0].name, None);
        assert_eq!(doc.maps[0].sheets[0].source, None);
        assert_eq!(doc.maps[0].sheets[0].columns[0].source.as_deref(), Some("time_q4"));
        assert!(doc.context.is_empty());
    }

    #[test]
    fn test_load_with_imports() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("root.yaml"),
            "meta: { name: root, size: uint32_t, imports: [clock] }\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("clock.yml"),
            "meta: { name: clock, size: uint16_t, imports: [base] }\n",
        )
        .unwrap();
        fs::write(dir.path().join("base.yaml"), "meta: { name: base, size: uint8_t }\n").unwrap();

        let set = SchemaLoader::default().load(&dir.path().join("root.yaml")).unwrap();
        assert_eq!(set.root.name, "root");
        assert_eq!(set.imports.keys().cloned().collect::<Vec<_>>(), vec!["base", "clock"]);
    }

    #[test]
    fn test_import_cycle_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "meta: { name: a, size: u32, imports: [b] }\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "meta: { name: b, size: u32, imports: [a] }\n").unwrap();

        let err = SchemaLoader::default().load(&dir.path().join("a.yaml")).unwrap_err();
        assert!(matches!(err, CompileError::ImportCycle(_)));
    }

    #[test]
    fn test_missing_import() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "meta: { name: a, size: u32, imports: [gone] }\n").unwrap();

        let err = SchemaLoader::default().load(&dir.path().join("a.yaml")).unwrap_err();
        match err {
            CompileError::ImportNotFound { name, searched } => {
                assert_eq!(name, "gone");
                assert_eq!(searched.len(), 2);
            }
            other => panic!("expected ImportNotFound, got {:?}", other),
        }
    }
}
