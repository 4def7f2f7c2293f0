//! Putting the lineage and molecular subtype trees together, checking the result and writing it
//! out.
use itertools::Itertools;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fs, io, ops::Deref, path::Path};

use crate::{
    node::{NodeSource, NodeTable, TreeRow, TreeType},
    util, ArcStr,
};

/// How many ancestor columns the output has.
pub const LEVEL_COLUMNS: usize = 6;

/// A row of the output csv.
///
/// The `Level` columns hold the names of the node's ancestors, root first, ending with the node
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRecord {
    #[serde(rename = "DepmapModelType")]
    pub depmap_model_type: Option<ArcStr>,
    #[serde(rename = "MolecularSubtypeCode")]
    pub molecular_subtype_code: Option<ArcStr>,
    #[serde(rename = "NodeName")]
    pub node_name: ArcStr,
    #[serde(rename = "NodeLevel")]
    pub node_level: usize,
    #[serde(rename = "NodeSource")]
    pub node_source: NodeSource,
    #[serde(rename = "TreeType")]
    pub tree_type: TreeType,
    #[serde(rename = "Level0")]
    pub level_0: Option<ArcStr>,
    #[serde(rename = "Level1")]
    pub level_1: Option<ArcStr>,
    #[serde(rename = "Level2")]
    pub level_2: Option<ArcStr>,
    #[serde(rename = "Level3")]
    pub level_3: Option<ArcStr>,
    #[serde(rename = "Level4")]
    pub level_4: Option<ArcStr>,
    #[serde(rename = "Level5")]
    pub level_5: Option<ArcStr>,
    #[serde(rename = "OncotreeCode")]
    pub oncotree_code: Option<ArcStr>,
}

impl TreeRecord {
    /// Flatten a row, replacing the ancestor codes with names.
    fn render(row: TreeRow, tree_type: TreeType, names: &BTreeMap<ArcStr, ArcStr>) -> Result<Self> {
        ensure!(
            row.path.len() <= LEVEL_COLUMNS,
            "node \"{}\" is at level {}, the tree only has levels 0 to {}",
            row.code,
            row.level(),
            LEVEL_COLUMNS - 1
        );
        let mut levels: [Option<ArcStr>; LEVEL_COLUMNS] = Default::default();
        for (level, code) in row.path.iter().enumerate() {
            let name = names.get(code).with_context(|| {
                format!("ancestor \"{}\" of node \"{}\" is not in the tree", code, row.code)
            })?;
            levels[level] = Some(name.clone());
        }
        let node_level = row.level();
        let [level_0, level_1, level_2, level_3, level_4, level_5] = levels;
        Ok(TreeRecord {
            depmap_model_type: row.code.depmap().cloned(),
            molecular_subtype_code: row.code.molecular_subtype().cloned(),
            node_name: row.name,
            node_level,
            node_source: row.source,
            tree_type,
            level_0,
            level_1,
            level_2,
            level_3,
            level_4,
            level_5,
            oncotree_code: row.oncotree_code,
        })
    }

    pub fn levels(&self) -> [&Option<ArcStr>; LEVEL_COLUMNS] {
        [
            &self.level_0,
            &self.level_1,
            &self.level_2,
            &self.level_3,
            &self.level_4,
            &self.level_5,
        ]
    }
}

/// Orders by the ancestor names, with missing levels after present ones. A parent therefore comes
/// after all its children.
fn cmp_levels(a: &TreeRecord, b: &TreeRecord) -> Ordering {
    a.levels()
        .iter()
        .zip(b.levels().iter())
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// The finished tree, one record per node, sorted by ancestry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypeTree {
    records: Vec<TreeRecord>,
}

impl SubtypeTree {
    /// Combine the lineage tree and the molecular subtype tree.
    ///
    /// Codes in the level columns are replaced with node names. Codes are looked up in both code
    /// columns, so the two sets of codes must not overlap.
    pub fn assemble(lineage: NodeTable, molecular_subtypes: NodeTable) -> Result<Self> {
        let rows: Vec<(TreeRow, TreeType)> = lineage
            .into_rows()
            .into_iter()
            .map(|row| (row, TreeType::Lineage))
            .chain(
                molecular_subtypes
                    .into_rows()
                    .into_iter()
                    .map(|row| (row, TreeType::MolecularSubtype)),
            )
            .collect();

        let names = code_names(rows.iter().map(|(row, _)| row))?;
        let mut records = rows
            .into_iter()
            .map(|(row, tree_type)| TreeRecord::render(row, tree_type, &names))
            .collect::<Result<Vec<_>>>()?;
        records.sort_by(cmp_levels);
        Ok(SubtypeTree { records })
    }

    /// Check that codes and names identify nodes.
    ///
    /// Fails if a depmap code or molecular subtype code is used twice, if a code is used as both,
    /// or if a name is used twice.
    pub fn sanity_check_results(&self) -> Result {
        let depmap_codes: Vec<&str> = self
            .iter()
            .filter_map(|r| r.depmap_model_type.as_deref())
            .collect();
        let molecular_codes: Vec<&str> = self
            .iter()
            .filter_map(|r| r.molecular_subtype_code.as_deref())
            .collect();

        let dups = duplicates(depmap_codes.iter().copied());
        ensure!(dups.is_empty(), "duplicate depmap codes: {}", dups.iter().join(", "));
        let dups = duplicates(molecular_codes.iter().copied());
        ensure!(
            dups.is_empty(),
            "duplicate molecular subtype codes: {}",
            dups.iter().join(", ")
        );
        let both = duplicates(depmap_codes.iter().chain(molecular_codes.iter()).copied());
        ensure!(
            both.is_empty(),
            "codes used as both depmap and molecular subtype codes: {}",
            both.iter().join(", ")
        );
        let dups = duplicates(self.iter().map(|r| &*r.node_name));
        ensure!(dups.is_empty(), "duplicate node names: {}", dups.iter().join(", "));
        Ok(())
    }

    /// Write the tree as csv. Missing values are empty cells.
    pub fn write_csv(&self, writer: impl io::Write) -> Result {
        let mut writer = csv::Writer::from_writer(writer);
        for record in self.iter() {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Check the tree and save it to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result {
        fn inner(this: &SubtypeTree, path: &Path) -> Result {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("could not create parent")?;
            }
            if util::path_exists(path)? {
                event!(
                    Level::WARN,
                    "overwriting existing file at \"{}\"",
                    path.display()
                );
            }
            this.write_csv(io::BufWriter::new(fs::File::create(path)?))
        }
        self.sanity_check_results()?;
        let path = path.as_ref();
        inner(self, path).with_context(|| format!("unable to save tree to \"{}\"", path.display()))
    }
}

impl Deref for SubtypeTree {
    type Target = [TreeRecord];
    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

/// Map every node code to the node's name.
fn code_names<'a>(rows: impl Iterator<Item = &'a TreeRow>) -> Result<BTreeMap<ArcStr, ArcStr>> {
    let mut depmap = BTreeMap::new();
    let mut molecular = BTreeMap::new();
    for row in rows {
        match (row.code.depmap(), row.code.molecular_subtype()) {
            (Some(code), _) => depmap.insert(code.clone(), row.name.clone()),
            (_, Some(code)) => molecular.insert(code.clone(), row.name.clone()),
            (None, None) => None,
        };
    }
    let overlap: Vec<&ArcStr> = depmap.keys().filter(|c| molecular.contains_key(*c)).collect();
    ensure!(
        overlap.is_empty(),
        "codes used as both depmap and molecular subtype codes: {}",
        overlap.iter().join(", ")
    );
    depmap.extend(molecular);
    Ok(depmap)
}

/// Values that occur more than once, each listed once, in order.
fn duplicates<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(value, _)| value)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::{construct_new_table_node, CodeColumn, NodeCode};

    fn lineage() -> NodeTable {
        let mut table = NodeTable::new(vec![TreeRow::root(
            NodeCode::Depmap("BONE".into()),
            "Bone",
            NodeSource::Oncotree,
        )]);
        for (code, name) in [("OS", "Osteosarcoma"), ("ES", "Ewing Sarcoma")] {
            let row = construct_new_table_node(
                code,
                name,
                NodeSource::Depmap,
                "BONE",
                &table,
                CodeColumn::DepmapModelType,
            )
            .unwrap();
            table.push(row);
        }
        table
    }

    fn molecular() -> NodeTable {
        let mut table = NodeTable::new(vec![TreeRow::root(
            NodeCode::MolecularSubtype("KRAS".into()),
            "KRAS",
            NodeSource::MolecularSubtype,
        )]);
        let row = construct_new_table_node(
            "KRASp.G12D",
            "KRAS p.G12D",
            NodeSource::MolecularSubtype,
            "KRAS",
            &table,
            CodeColumn::MolecularSubtypeCode,
        )
        .unwrap();
        table.push(row);
        table
    }

    #[test]
    fn levels_hold_names() {
        let tree = SubtypeTree::assemble(lineage(), molecular()).unwrap();
        tree.sanity_check_results().unwrap();
        assert_eq!(tree.len(), 5);

        let g12d = tree
            .iter()
            .find(|r| r.molecular_subtype_code.as_deref() == Some("KRASp.G12D"))
            .unwrap();
        assert_eq!(g12d.tree_type, TreeType::MolecularSubtype);
        assert_eq!(g12d.depmap_model_type, None);
        assert_eq!(g12d.node_level, 1);
        assert_eq!(g12d.level_0.as_deref(), Some("KRAS"));
        assert_eq!(g12d.level_1.as_deref(), Some("KRAS p.G12D"));
        assert_eq!(g12d.level_2, None);

        let os = tree
            .iter()
            .find(|r| r.depmap_model_type.as_deref() == Some("OS"))
            .unwrap();
        assert_eq!(os.tree_type, TreeType::Lineage);
        assert_eq!(os.level_0.as_deref(), Some("Bone"));
        assert_eq!(os.level_1.as_deref(), Some("Osteosarcoma"));
    }

    #[test]
    fn sorted_by_ancestry() {
        let tree = SubtypeTree::assemble(lineage(), molecular()).unwrap();
        let names: Vec<&str> = tree.iter().map(|r| &*r.node_name).collect();
        // children before their parent: missing levels sort last
        assert_eq!(
            names,
            ["Ewing Sarcoma", "Osteosarcoma", "Bone", "KRAS p.G12D", "KRAS"]
        );
    }

    #[test]
    fn duplicate_names_fail() {
        let mut table = lineage();
        let row = construct_new_table_node(
            "OS2",
            "Osteosarcoma",
            NodeSource::Depmap,
            "BONE",
            &table,
            CodeColumn::DepmapModelType,
        )
        .unwrap();
        table.push(row);
        let tree = SubtypeTree::assemble(table, molecular()).unwrap();
        let err = tree.sanity_check_results().unwrap_err();
        assert!(err.to_string().contains("Osteosarcoma"));
        assert!(tree.save("never-written.csv").is_err());
        assert!(!Path::new("never-written.csv").exists());
    }

    #[test]
    fn duplicate_codes_fail() {
        let mut table = lineage();
        table.push(TreeRow::root(
            NodeCode::Depmap("OS".into()),
            "Osteosarcoma Again",
            NodeSource::Depmap,
        ));
        let tree = SubtypeTree::assemble(table, molecular()).unwrap();
        assert!(tree.sanity_check_results().is_err());
    }

    #[test]
    fn shared_code_between_columns_fails() {
        let mut table = lineage();
        table.push(TreeRow::root(
            NodeCode::Depmap("KRAS".into()),
            "Kras lineage",
            NodeSource::Depmap,
        ));
        assert!(SubtypeTree::assemble(table, molecular()).is_err());
    }

    #[test]
    fn too_deep() {
        let mut table = lineage();
        let mut parent = "OS".to_string();
        for depth in 2..=LEVEL_COLUMNS {
            let code = format!("OS{}", depth);
            let row = construct_new_table_node(
                code.clone(),
                code.clone(),
                NodeSource::Depmap,
                &parent,
                &table,
                CodeColumn::DepmapModelType,
            )
            .unwrap();
            table.push(row);
            parent = code;
        }
        assert!(SubtypeTree::assemble(table, NodeTable::default()).is_err());
    }

    #[test]
    fn csv_shape() {
        let tree = SubtypeTree::assemble(lineage(), NodeTable::default()).unwrap();
        let mut out = vec![];
        tree.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(
                "DepmapModelType,MolecularSubtypeCode,NodeName,NodeLevel,NodeSource,TreeType,\
                 Level0,Level1,Level2,Level3,Level4,Level5,OncotreeCode"
            )
        );
        assert_eq!(
            lines.next(),
            Some("ES,,Ewing Sarcoma,1,Depmap,Lineage,Bone,Ewing Sarcoma,,,,,")
        );

        let back: Vec<TreeRecord> = crate::load_csv(text.as_bytes()).unwrap();
        assert_eq!(&back[..], &tree[..]);
    }
}
