//! The Oncotree ontology, and turning it into the first rows of the lineage tree.
//!
//! Oncotree is distributed as a list of nodes, each pointing at its parent. Tissues (the roots we
//! care about) point at the sentinel `TISSUE` node. Oncotree counts levels from 1 for tissues, the
//! tree counts from 0.
use qu::ick_use::*;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    io,
    path::Path,
};

use crate::{
    node::{NodeCode, NodeSource, NodeTable, TreeRow},
    util::{optional_string, whole_number},
    ArcStr,
};

/// A row as it appears in the Oncotree export.
#[derive(Debug, Clone, Deserialize)]
struct OntologyNodeRaw {
    code: ArcStr,
    name: ArcStr,
    #[serde(default, deserialize_with = "optional_string")]
    tissue: Option<ArcStr>,
    #[serde(rename = "mainType", default, deserialize_with = "optional_string")]
    main_type: Option<ArcStr>,
    #[serde(default, deserialize_with = "optional_string")]
    parent: Option<ArcStr>,
    #[serde(deserialize_with = "whole_number")]
    level: usize,
}

/// A node of the Oncotree ontology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyNode {
    pub oncotree_code: ArcStr,
    pub node_name: ArcStr,
    pub oncotree_lineage: Option<ArcStr>,
    pub oncotree_primary_disease: Option<ArcStr>,
    /// `None` only for the sentinel root.
    pub parent: Option<ArcStr>,
    /// 1-indexed depth, as used by Oncotree.
    pub node_level: usize,
}

impl From<OntologyNodeRaw> for OntologyNode {
    fn from(from: OntologyNodeRaw) -> Self {
        Self {
            oncotree_code: from.code,
            node_name: from.name,
            oncotree_lineage: from.tissue,
            oncotree_primary_disease: from.main_type,
            parent: from.parent,
            node_level: from.level,
        }
    }
}

impl OntologyNode {
    pub fn new(
        code: impl Into<ArcStr>,
        name: impl Into<ArcStr>,
        parent: impl Into<ArcStr>,
        level: usize,
    ) -> Self {
        OntologyNode {
            oncotree_code: code.into(),
            node_name: name.into(),
            oncotree_lineage: None,
            oncotree_primary_disease: None,
            parent: Some(parent.into()),
            node_level: level,
        }
    }
}

/// Load the ontology from an Oncotree csv export.
pub fn load_ontology(reader: impl io::Read) -> Result<Vec<OntologyNode>> {
    let raw: Vec<OntologyNodeRaw> = crate::load_csv(reader)?;
    Ok(raw.into_iter().map(Into::into).collect())
}

pub fn load_ontology_path(path: impl AsRef<Path>) -> Result<Vec<OntologyNode>> {
    let raw: Vec<OntologyNodeRaw> = crate::load_csv_path(path)?;
    Ok(raw.into_iter().map(Into::into).collect())
}

/// The ontology as tree rows.
#[derive(Debug)]
pub struct OntologyTree {
    pub table: NodeTable,
    /// How many rows had their name suffixed with their lineage to make it unique.
    pub disambiguated: usize,
}

/// Build one tree row for each ontology node below `root`, with the full ancestor path.
///
/// Names that appear more than once get the code of their level 0 ancestor appended, e.g.
/// `Carcinoma (BREAST)`. This is done once: names that still clash are left for validation to
/// reject.
pub fn tabulate(nodes: &[OntologyNode], root: &str) -> Result<OntologyTree> {
    let by_code: HashMap<&str, &OntologyNode> = nodes
        .iter()
        .map(|node| (&*node.oncotree_code, node))
        .collect();

    let mut rows = Vec::with_capacity(nodes.len());
    for node in nodes.iter().filter(|node| &*node.oncotree_code != root) {
        let path = ancestor_path(node, &by_code, root)?;
        ensure!(
            node.node_level == path.len(),
            "ontology node \"{}\" has level {} but {} ancestors (including itself)",
            node.oncotree_code,
            node.node_level,
            path.len()
        );
        rows.push(TreeRow {
            code: NodeCode::Depmap(node.oncotree_code.clone()),
            name: node.node_name.clone(),
            source: NodeSource::Oncotree,
            path,
            oncotree_code: Some(node.oncotree_code.clone()),
        });
    }

    let disambiguated = disambiguate_names(&mut rows);
    if disambiguated > 0 {
        event!(
            Level::DEBUG,
            "suffixed {} ontology node names with their lineage",
            disambiguated
        );
    }
    Ok(OntologyTree {
        table: NodeTable::new(rows),
        disambiguated,
    })
}

/// Follow parent pointers up to `root`, returning codes root first.
fn ancestor_path(
    node: &OntologyNode,
    by_code: &HashMap<&str, &OntologyNode>,
    root: &str,
) -> Result<Vec<ArcStr>> {
    let mut path = vec![node.oncotree_code.clone()];
    let mut current = node;
    loop {
        let parent = current.parent.as_ref().with_context(|| {
            format!(
                "ontology node \"{}\" has no parent but is not the root \"{}\"",
                current.oncotree_code, root
            )
        })?;
        if &**parent == root {
            break;
        }
        // a chain longer than the ontology means the parent pointers loop.
        ensure!(
            path.len() <= by_code.len(),
            "cycle in the ontology above \"{}\"",
            node.oncotree_code
        );
        current = by_code.get(&**parent).with_context(|| {
            format!(
                "parent \"{}\" of ontology node \"{}\" is not in the ontology",
                parent, current.oncotree_code
            )
        })?;
        path.push(current.oncotree_code.clone());
    }
    path.reverse();
    Ok(path)
}

fn disambiguate_names(rows: &mut [TreeRow]) -> usize {
    let mut counts: BTreeMap<ArcStr, usize> = BTreeMap::new();
    for row in rows.iter() {
        *counts.entry(row.name.clone()).or_insert(0) += 1;
    }
    let mut changed = 0;
    for row in rows.iter_mut() {
        if counts[&row.name] > 1 {
            row.name = format!("{} ({})", row.name, row.lineage()).into();
            changed += 1;
        }
    }
    changed
}
