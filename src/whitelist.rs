//! Curated genetic subtypes that are grafted onto the lineage tree.
use qu::ick_use::*;
use serde::Deserialize;
use std::{io, path::Path};

use crate::{
    node::{construct_new_table_node, CodeColumn, NodeSource, NodeTable},
    ArcStr,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WhitelistEntry {
    #[serde(rename = "MolecularSubtypeCode")]
    pub molecular_subtype_code: ArcStr,
    pub parent_code: ArcStr,
    pub parent_name: ArcStr,
    pub subtype_name: ArcStr,
}

impl WhitelistEntry {
    pub fn load(reader: impl io::Read) -> Result<Vec<Self>> {
        crate::load_csv(reader)
    }

    pub fn load_path(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        crate::load_csv_path(path)
    }

    /// e.g. `Acute Myeloid Leukemia: NPM1 mutated`
    pub fn node_name(&self) -> String {
        format!("{}: {}", self.parent_name, self.subtype_name)
    }
}

/// Attach one node per entry under the entry's parent, which must already be in the tree.
pub fn inject_whitelist(mut table: NodeTable, entries: &[WhitelistEntry]) -> Result<NodeTable> {
    for entry in entries {
        let row = construct_new_table_node(
            entry.molecular_subtype_code.clone(),
            entry.node_name(),
            NodeSource::GeneticSubtype,
            &entry.parent_code,
            &table,
            CodeColumn::MolecularSubtypeCode,
        )
        .with_context(|| format!("adding whitelisted subtype \"{}\"", entry.molecular_subtype_code))?;
        table.push(row);
    }
    Ok(table)
}
