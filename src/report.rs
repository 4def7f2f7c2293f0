//! Summary of what a tree build did.
use qu::ick_use::*;
use serde::Serialize;
use std::{collections::BTreeMap, fs, io, path::Path};

use crate::{
    custom::DroppedCandidate,
    node::{NodeSource, TreeType},
    tree::SubtypeTree,
    util,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeReport {
    /// Models skipped for a missing model type, lineage or subtype.
    pub models_skipped: usize,
    pub ontology_nodes: usize,
    pub disambiguated_names: usize,
    pub non_cancerous_nodes: usize,
    pub custom_nodes: usize,
    pub whitelist_nodes: usize,
    pub molecular_subtype_nodes: usize,
    /// Diseases from the model table that didn't get a node.
    pub dropped_candidates: Vec<DroppedCandidate>,
    pub rows_by_tree_type: BTreeMap<TreeType, usize>,
    pub rows_by_source: BTreeMap<NodeSource, usize>,
}

impl TreeReport {
    /// Fill in the row counts of the finished tree.
    pub fn count_rows(&mut self, tree: &SubtypeTree) {
        self.rows_by_tree_type.clear();
        self.rows_by_source.clear();
        for record in tree.iter() {
            *self.rows_by_tree_type.entry(record.tree_type).or_insert(0) += 1;
            *self.rows_by_source.entry(record.node_source).or_insert(0) += 1;
        }
    }

    pub fn total_rows(&self) -> usize {
        self.rows_by_tree_type.values().sum()
    }

    pub fn print(&self) {
        util::header("Tree build");
        println!("models skipped:           {}", self.models_skipped);
        println!("ontology nodes:           {}", self.ontology_nodes);
        println!("  names disambiguated:    {}", self.disambiguated_names);
        println!("non-cancerous nodes:      {}", self.non_cancerous_nodes);
        println!("custom nodes:             {}", self.custom_nodes);
        println!("whitelist nodes:          {}", self.whitelist_nodes);
        println!("molecular subtype nodes:  {}", self.molecular_subtype_nodes);

        util::header("Rows");
        for (tree_type, count) in self.rows_by_tree_type.iter() {
            println!("{:<25} {}", tree_type.to_string(), count);
        }
        println!();
        for (source, count) in self.rows_by_source.iter() {
            println!("{:<35} {}", source.label(), count);
        }
        println!("\ntotal: {}", self.total_rows());

        if !self.dropped_candidates.is_empty() {
            util::header("Dropped (ambiguous)");
            for dropped in self.dropped_candidates.iter() {
                println!("{} ({}): {:?}", dropped.name, dropped.code, dropped.reason);
            }
        }
    }

    /// Save the report as json.
    pub fn save(&self, path: impl AsRef<Path>) -> Result {
        fn inner(this: &TreeReport, path: &Path) -> Result {
            if util::path_exists(path)? {
                event!(
                    Level::WARN,
                    "overwriting existing file at \"{}\"",
                    path.display()
                );
            }
            let out = io::BufWriter::new(fs::File::create(path)?);
            serde_json::to_writer_pretty(out, this)?;
            Ok(())
        }
        let path = path.as_ref();
        inner(self, path).with_context(|| format!("unable to save report to \"{}\"", path.display()))
    }
}
