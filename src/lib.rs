//! Build the DepMap subtype tree.
//!
//! The tree has two parts. The lineage tree starts from the Oncotree ontology, gets extra nodes for
//! the disease types used in the model table, and then the curated genetic subtypes. The molecular
//! subtype tree is inferred from the column names of the molecular subtype matrix. Both are
//! written to one table, with the names of each node's ancestors in the `Level` columns.
pub mod config;
pub mod custom;
pub mod node;
pub mod oncotree;
pub mod report;
pub mod subtypes;
pub mod tree;
mod util;
pub mod whitelist;

pub use anyhow::{Context, Error};
use qu::ick_use::*;
use serde::de::DeserializeOwned;
use std::{io, path::Path, sync::Arc};

pub use crate::{
    config::{Containment, TreeConfig},
    custom::{DropReason, DroppedCandidate, Model, Models},
    node::{NodeCode, NodeSource, NodeTable, TreeRow, TreeType},
    oncotree::OntologyNode,
    report::TreeReport,
    tree::{SubtypeTree, TreeRecord},
    util::header,
    whitelist::WhitelistEntry,
};

pub type ArcStr = Arc<str>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;

/// The four tables a tree is built from.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub models: Models,
    pub ontology: Vec<OntologyNode>,
    /// Names of the molecular subtype indicator columns.
    pub molecular_subtypes: Vec<ArcStr>,
    pub whitelist: Vec<WhitelistEntry>,
}

impl Inputs {
    pub fn load(
        model: impl AsRef<Path>,
        oncotree: impl AsRef<Path>,
        molecular_subtypes: impl AsRef<Path>,
        genetic_subtypes_whitelist: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Inputs {
            models: Models::load_path(model)?,
            ontology: oncotree::load_ontology_path(oncotree)?,
            molecular_subtypes: subtypes::load_subtype_columns_path(molecular_subtypes)?,
            whitelist: WhitelistEntry::load_path(genetic_subtypes_whitelist)?,
        })
    }
}

/// Run every stage of the build. The tree is checked before it is returned.
pub fn build_subtype_tree(inputs: &Inputs, config: &TreeConfig) -> Result<(SubtypeTree, TreeReport)> {
    let mut report = TreeReport {
        models_skipped: inputs.models.dropped,
        ..Default::default()
    };

    let ontology = oncotree::tabulate(&inputs.ontology, &config.ontology_root)?;
    report.ontology_nodes = ontology.table.len();
    report.disambiguated_names = ontology.disambiguated;
    event!(Level::INFO, "{} nodes from the ontology", report.ontology_nodes);

    let custom = custom::inject_custom_nodes(ontology.table, &inputs.models.models, config)?;
    report.non_cancerous_nodes = custom.non_cancerous;
    report.custom_nodes = custom.injected;
    report.dropped_candidates = custom.dropped;
    event!(
        Level::INFO,
        "{} custom nodes and {} non-cancerous nodes from the model table",
        report.custom_nodes,
        report.non_cancerous_nodes
    );

    let before = custom.table.len();
    let lineage = whitelist::inject_whitelist(custom.table, &inputs.whitelist)?;
    report.whitelist_nodes = lineage.len() - before;
    event!(Level::INFO, "{} whitelisted genetic subtypes", report.whitelist_nodes);

    let molecular =
        subtypes::build_molecular_subtype_tree(&inputs.molecular_subtypes, config.containment)?;
    report.molecular_subtype_nodes = molecular.len();
    event!(
        Level::INFO,
        "{} molecular subtype nodes",
        report.molecular_subtype_nodes
    );

    let tree = SubtypeTree::assemble(lineage, molecular)?;
    tree.sanity_check_results()?;
    report.count_rows(&tree);
    Ok((tree, report))
}

/// Deserialize every row of a csv table.
fn load_csv<T: DeserializeOwned>(reader: impl io::Read) -> Result<Vec<T>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(Into::into)
}

fn load_csv_path<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .and_then(|reader| reader.into_deserialize().collect::<Result<Vec<T>, _>>())
        .with_context(|| format!("while loading \"{}\"", path.display()))
}

#[cfg(test)]
mod test {
    use super::*;

    const MODELS: &str = "\
ModelID,OncotreeCode,DepmapModelType,OncotreeLineage,OncotreePrimaryDisease,OncotreeSubtype
ACH-000001,OS,OS,Bone,Osteosarcoma,Osteosarcoma
ACH-000002,,ZBONE,Bone,Non-Cancerous,Bone NC
ACH-000003,,BALL,Lymphoid,B-Lymphoblastic Leukemia/Lymphoma,B-Lymphoblastic Leukemia
ACH-000004,,ESX,Bone,Ewing Sarcoma,Ewing Sarcoma X
ACH-000005,,,Bone,Osteosarcoma,Osteosarcoma
";

    const ONCOTREE: &str = "\
code,name,tissue,mainType,parent,level
TISSUE,Tissue,,,,0
BONE,Bone,Bone,,TISSUE,1
OS,Osteosarcoma,Bone,Osteosarcoma,BONE,2
BRCA,Carcinoma,Bone,Carcinoma,BONE,2
LYMPH,Lymphoid,Lymphoid,,TISSUE,1
LNM,Lymphoid Neoplasm,Lymphoid,,LYMPH,2
LUNG,Lung,Lung,,TISSUE,1
LUCA,Carcinoma,Lung,Carcinoma,LUNG,2
";

    const MOLECULAR: &str = "\
ModelID,KRAS p.G12,KRAS p.G12D,KRAS p.G13D,MSI High
ACH-000001,1,1,0,0
";

    const WHITELIST: &str = "\
MolecularSubtypeCode,parent_code,parent_name,subtype_name
OSMYC,OS,Osteosarcoma,MYC amplified
";

    fn inputs() -> Inputs {
        Inputs {
            models: Models::load(MODELS.as_bytes()).unwrap(),
            ontology: oncotree::load_ontology(ONCOTREE.as_bytes()).unwrap(),
            molecular_subtypes: subtypes::load_subtype_columns(MOLECULAR.as_bytes()).unwrap(),
            whitelist: WhitelistEntry::load(WHITELIST.as_bytes()).unwrap(),
        }
    }

    fn to_csv(tree: &SubtypeTree) -> Vec<u8> {
        let mut out = vec![];
        tree.write_csv(&mut out).unwrap();
        out
    }

    #[test]
    fn full_build() {
        let (tree, report) = build_subtype_tree(&inputs(), &TreeConfig::default()).unwrap();
        assert_eq!(report.models_skipped, 1);
        assert_eq!(report.ontology_nodes, 7);
        assert_eq!(report.disambiguated_names, 2);
        assert_eq!(report.non_cancerous_nodes, 1);
        assert_eq!(report.custom_nodes, 2);
        assert_eq!(report.whitelist_nodes, 1);
        assert_eq!(report.molecular_subtype_nodes, 5);
        assert_eq!(report.total_rows(), tree.len());
        assert_eq!(report.rows_by_tree_type[&TreeType::MolecularSubtype], 5);

        let find = |code: &str| {
            tree.iter()
                .find(|r| {
                    r.depmap_model_type.as_deref() == Some(code)
                        || r.molecular_subtype_code.as_deref() == Some(code)
                })
                .unwrap()
        };

        let zbone = find("ZBONE");
        assert_eq!(&*zbone.node_name, "Bone Non-Cancerous");
        assert_eq!(zbone.node_level, 1);
        assert_eq!(zbone.level_0.as_deref(), Some("Bone"));

        let ball = find("BALL");
        assert_eq!(ball.level_1.as_deref(), Some("Lymphoid Neoplasm"));
        assert_eq!(ball.node_level, 2);

        let esx = find("ESX");
        assert_eq!(esx.level_0.as_deref(), Some("Bone"));
        assert_eq!(esx.node_source, NodeSource::Depmap);

        let osmyc = find("OSMYC");
        assert_eq!(&*osmyc.node_name, "Osteosarcoma: MYC amplified");
        assert_eq!(osmyc.tree_type, TreeType::Lineage);
        assert_eq!(osmyc.node_source, NodeSource::GeneticSubtype);
        assert_eq!(osmyc.level_2.as_deref(), Some("Osteosarcoma: MYC amplified"));

        assert_eq!(&*find("BRCA").node_name, "Carcinoma (BONE)");
        assert_eq!(find("OS").oncotree_code.as_deref(), Some("OS"));

        let g12d = find("KRASp.G12D");
        assert_eq!(g12d.level_1.as_deref(), Some("KRAS p.G12"));
        assert_eq!(g12d.level_2.as_deref(), Some("KRAS p.G12D"));
    }

    #[test]
    fn build_is_repeatable() {
        let (first, _) = build_subtype_tree(&inputs(), &TreeConfig::default()).unwrap();
        let (second, _) = build_subtype_tree(&inputs(), &TreeConfig::default()).unwrap();
        assert_eq!(to_csv(&first), to_csv(&second));
    }

    #[test]
    fn codes_and_names_are_unique() {
        let (tree, _) = build_subtype_tree(&inputs(), &TreeConfig::default()).unwrap();
        let mut names: Vec<&str> = tree.iter().map(|r| &*r.node_name).collect();
        let mut codes: Vec<&str> = tree
            .iter()
            .map(|r| {
                r.depmap_model_type
                    .as_deref()
                    .or(r.molecular_subtype_code.as_deref())
                    .unwrap()
            })
            .collect();
        let total = tree.len();
        names.sort_unstable();
        names.dedup();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(codes.len(), total);
        for r in tree.iter() {
            assert!(r.depmap_model_type.is_some() != r.molecular_subtype_code.is_some());
        }
    }

    #[test]
    fn duplicate_custom_names_are_rejected() {
        let mut inputs = inputs();
        inputs.whitelist.push(WhitelistEntry {
            molecular_subtype_code: "OSMYC2".into(),
            parent_code: "OS".into(),
            parent_name: "Osteosarcoma".into(),
            subtype_name: "MYC amplified".into(),
        });
        assert!(build_subtype_tree(&inputs, &TreeConfig::default()).is_err());
    }

    #[test]
    fn names_clashing_within_a_lineage_are_rejected() {
        let mut inputs = inputs();
        inputs
            .ontology
            .push(OntologyNode::new("BRCA2", "Carcinoma", "BONE", 2));
        let err = build_subtype_tree(&inputs, &TreeConfig::default()).unwrap_err();
        assert!(err
            .to_string()
            .contains("duplicate node names: Carcinoma (BONE)"));
    }

    #[test]
    fn regex_containment_by_default() {
        let mut inputs = inputs();
        inputs.molecular_subtypes = vec!["TP53 A.B".into(), "TP53 AXB".into()];

        let (tree, _) = build_subtype_tree(&inputs, &TreeConfig::default()).unwrap();
        let axb = tree
            .iter()
            .find(|r| r.molecular_subtype_code.as_deref() == Some("TP53AXB"))
            .unwrap();
        assert_eq!(axb.level_1.as_deref(), Some("TP53 A.B"));
        assert_eq!(axb.node_level, 2);

        let config = TreeConfig {
            containment: Containment::Literal,
            ..Default::default()
        };
        let (tree, _) = build_subtype_tree(&inputs, &config).unwrap();
        let axb = tree
            .iter()
            .find(|r| r.molecular_subtype_code.as_deref() == Some("TP53AXB"))
            .unwrap();
        assert_eq!(axb.node_level, 1);
    }
}
