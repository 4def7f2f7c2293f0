//! Tree rows and the working table they are collected into while the tree is built.
//!
//! Every row knows the codes of all its ancestors (its `path`), with its own code last. A row's
//! level is therefore the length of its path minus one, and a child is always made by copying
//! its parent's path and pushing the child's code, so path consistency holds by construction.
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, ops::Deref};

use crate::ArcStr;

/// Where a tree node came from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum NodeSource {
    #[serde(rename = "Oncotree")]
    Oncotree,
    #[serde(rename = "Depmap")]
    Depmap,
    #[serde(rename = "Data-driven genetic subtype")]
    GeneticSubtype,
    #[serde(rename = "Omics Inferred Molecular Subtype")]
    MolecularSubtype,
}

impl NodeSource {
    pub fn label(self) -> &'static str {
        use NodeSource::*;
        match self {
            Oncotree => "Oncotree",
            Depmap => "Depmap",
            GeneticSubtype => "Data-driven genetic subtype",
            MolecularSubtype => "Omics Inferred Molecular Subtype",
        }
    }
}

impl fmt::Display for NodeSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which of the two trees in the output a row belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum TreeType {
    Lineage,
    MolecularSubtype,
}

impl fmt::Display for TreeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TreeType::Lineage => f.write_str("Lineage"),
            TreeType::MolecularSubtype => f.write_str("MolecularSubtype"),
        }
    }
}

/// The column a node's own code is stored in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CodeColumn {
    DepmapModelType,
    MolecularSubtypeCode,
}

impl CodeColumn {
    pub fn code(self, code: impl Into<ArcStr>) -> NodeCode {
        match self {
            CodeColumn::DepmapModelType => NodeCode::Depmap(code.into()),
            CodeColumn::MolecularSubtypeCode => NodeCode::MolecularSubtype(code.into()),
        }
    }
}

/// A node's identity. A row has either a depmap code or a molecular subtype code, never both.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum NodeCode {
    Depmap(ArcStr),
    MolecularSubtype(ArcStr),
}

impl NodeCode {
    pub fn as_str(&self) -> &str {
        match self {
            NodeCode::Depmap(code) | NodeCode::MolecularSubtype(code) => code,
        }
    }

    pub fn depmap(&self) -> Option<&ArcStr> {
        match self {
            NodeCode::Depmap(code) => Some(code),
            NodeCode::MolecularSubtype(_) => None,
        }
    }

    pub fn molecular_subtype(&self) -> Option<&ArcStr> {
        match self {
            NodeCode::Depmap(_) => None,
            NodeCode::MolecularSubtype(code) => Some(code),
        }
    }
}

impl fmt::Display for NodeCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the subtype tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub code: NodeCode,
    /// Human readable label. Unique once the tree is complete.
    pub name: ArcStr,
    pub source: NodeSource,
    /// Codes of the ancestors of this node, root first, ending with this node's own code.
    pub path: Vec<ArcStr>,
    /// The Oncotree code, only set for rows taken directly from the ontology.
    pub oncotree_code: Option<ArcStr>,
}

impl TreeRow {
    /// A new root (level 0) node.
    pub fn root(code: NodeCode, name: impl Into<ArcStr>, source: NodeSource) -> Self {
        let path = vec![ArcStr::from(code.as_str())];
        TreeRow {
            code,
            name: name.into(),
            source,
            path,
            oncotree_code: None,
        }
    }

    /// 0-indexed depth of this node.
    pub fn level(&self) -> usize {
        self.path.len() - 1
    }

    /// The code of the level 0 ancestor (possibly this node).
    pub fn lineage(&self) -> &ArcStr {
        &self.path[0]
    }

    /// The code of the direct parent, `None` for roots.
    pub fn parent(&self) -> Option<&ArcStr> {
        self.path.len().checked_sub(2).map(|idx| &self.path[idx])
    }
}

/// Create a child of `parent_code`, which must already be in `table`.
///
/// The parent row is copied, its level incremented, the new code becomes the last entry of the
/// path, and the ontology code is cleared. Used by every stage that grafts nodes onto the tree.
pub fn construct_new_table_node(
    code: impl Into<ArcStr>,
    name: impl Into<ArcStr>,
    source: NodeSource,
    parent_code: &str,
    table: &NodeTable,
    code_column: CodeColumn,
) -> Result<TreeRow> {
    let code = code.into();
    let name = name.into();
    let parent = table
        .find_by_code(parent_code)
        .with_context(|| format!("parent \"{}\" of node \"{}\" is not in the tree", parent_code, code))?;
    let mut row = parent.clone();
    row.path.push(code.clone());
    row.code = code_column.code(code);
    row.name = name;
    row.source = source;
    row.oncotree_code = None;
    Ok(row)
}

/// The rows of a tree under construction, with a pre-built index for codes and names.
///
/// Codes are looked up regardless of which column they live in.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    els: Vec<TreeRow>,
    code_idx: BTreeMap<ArcStr, usize>,
    name_idx: BTreeMap<ArcStr, Vec<usize>>,
}

impl NodeTable {
    pub fn new(els: Vec<TreeRow>) -> Self {
        let mut this = NodeTable {
            els,
            code_idx: BTreeMap::new(),
            name_idx: BTreeMap::new(),
        };
        this.rebuild_index();
        this
    }

    pub fn push(&mut self, row: TreeRow) {
        let idx = self.els.len();
        self.index_row(idx, &row);
        self.els.push(row);
    }

    pub fn find_by_code(&self, code: &str) -> Option<&TreeRow> {
        let idx = self.code_idx.get(code)?;
        self.els.get(*idx)
    }

    /// The shallowest node with this name (the first one added wins ties).
    pub fn find_by_name(&self, name: &str) -> Option<&TreeRow> {
        self.name_idx
            .get(name)?
            .iter()
            .map(|idx| &self.els[*idx])
            .min_by_key(|row| row.level())
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.code_idx.contains_key(code)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.name_idx.contains_key(name)
    }

    pub fn into_rows(self) -> Vec<TreeRow> {
        self.els
    }

    fn rebuild_index(&mut self) {
        self.code_idx.clear();
        self.name_idx.clear();
        let els = std::mem::take(&mut self.els);
        for (idx, row) in els.iter().enumerate() {
            self.index_row(idx, row);
        }
        self.els = els;
    }

    fn index_row(&mut self, idx: usize, row: &TreeRow) {
        // keep the first row for a duplicated code, duplicates are reported at validation.
        self.code_idx
            .entry(ArcStr::from(row.code.as_str()))
            .or_insert(idx);
        self.name_idx.entry(row.name.clone()).or_default().push(idx);
    }
}

impl Deref for NodeTable {
    type Target = [TreeRow];
    fn deref(&self) -> &Self::Target {
        &self.els
    }
}
