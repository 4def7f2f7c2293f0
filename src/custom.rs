//! Nodes for the disease types DepMap uses that Oncotree doesn't have.
//!
//! Every `(DepmapModelType, OncotreeSubtype)` pair in the model table should end up with a node.
//! Pairs the ontology already covers are left alone, the rest are grafted under their lineage.
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    path::Path,
};

use crate::{
    config::TreeConfig,
    node::{construct_new_table_node, CodeColumn, NodeCode, NodeSource, NodeTable, TreeRow},
    util::optional_string,
    ArcStr,
};

#[derive(Debug, Clone, Deserialize)]
struct ModelRaw {
    #[serde(rename = "ModelID", default, deserialize_with = "optional_string")]
    model_id: Option<ArcStr>,
    #[serde(rename = "OncotreeCode", default, deserialize_with = "optional_string")]
    oncotree_code: Option<ArcStr>,
    #[serde(rename = "DepmapModelType", default, deserialize_with = "optional_string")]
    depmap_model_type: Option<ArcStr>,
    #[serde(rename = "OncotreeLineage", default, deserialize_with = "optional_string")]
    oncotree_lineage: Option<ArcStr>,
    #[serde(
        rename = "OncotreePrimaryDisease",
        default,
        deserialize_with = "optional_string"
    )]
    oncotree_primary_disease: Option<ArcStr>,
    #[serde(rename = "OncotreeSubtype", default, deserialize_with = "optional_string")]
    oncotree_subtype: Option<ArcStr>,
}

/// A row of the model table.
///
/// Only models with a model type, lineage and subtype are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub model_id: Option<ArcStr>,
    pub oncotree_code: Option<ArcStr>,
    pub depmap_model_type: ArcStr,
    pub oncotree_lineage: ArcStr,
    pub oncotree_primary_disease: Option<ArcStr>,
    pub oncotree_subtype: ArcStr,
}

impl Model {
    fn from_raw(raw: ModelRaw) -> Option<Self> {
        Some(Model {
            model_id: raw.model_id,
            oncotree_code: raw.oncotree_code,
            depmap_model_type: raw.depmap_model_type?,
            oncotree_lineage: raw.oncotree_lineage?,
            oncotree_primary_disease: raw.oncotree_primary_disease,
            oncotree_subtype: raw.oncotree_subtype?,
        })
    }
}

/// The usable models, and how many rows were skipped for missing fields.
#[derive(Debug, Clone, Default)]
pub struct Models {
    pub models: Vec<Model>,
    pub dropped: usize,
}

impl Models {
    pub fn load(reader: impl io::Read) -> Result<Self> {
        Ok(Self::from_raw(crate::load_csv(reader)?))
    }

    pub fn load_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_raw(crate::load_csv_path(path)?))
    }

    fn from_raw(raw: Vec<ModelRaw>) -> Self {
        let total = raw.len();
        let models: Vec<Model> = raw.into_iter().filter_map(Model::from_raw).collect();
        let dropped = total - models.len();
        if dropped > 0 {
            event!(
                Level::INFO,
                "skipped {} of {} models without a model type, lineage or subtype",
                dropped,
                total
            );
        }
        Models { models, dropped }
    }
}

/// A disease as the model table describes it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModelDisease {
    pub code: ArcStr,
    pub name: ArcStr,
    pub lineage: ArcStr,
    pub primary_disease: Option<ArcStr>,
}

impl From<&Model> for ModelDisease {
    fn from(model: &Model) -> Self {
        ModelDisease {
            code: model.depmap_model_type.clone(),
            name: model.oncotree_subtype.clone(),
            lineage: model.oncotree_lineage.clone(),
            primary_disease: model.oncotree_primary_disease.clone(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The code is used with more than one name.
    AmbiguousCode,
    /// The name is used with more than one code.
    AmbiguousName,
}

/// A disease from the model table that was left out of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedCandidate {
    pub code: ArcStr,
    pub name: ArcStr,
    pub reason: DropReason,
}

/// The lineage tree after custom nodes were added.
#[derive(Debug)]
pub struct CustomNodes {
    pub table: NodeTable,
    /// Nodes added for healthy tissue (including new lineages made for them).
    pub non_cancerous: usize,
    /// Other nodes added.
    pub injected: usize,
    pub dropped: Vec<DroppedCandidate>,
}

/// Add a node for each disease in the model table that the tree doesn't have yet.
pub fn inject_custom_nodes(
    mut table: NodeTable,
    models: &[Model],
    config: &TreeConfig,
) -> Result<CustomNodes> {
    let diseases: BTreeSet<ModelDisease> = models.iter().map(ModelDisease::from).collect();
    let (selected, dropped) = select_candidates(&diseases, &table);

    let non_cancerous = inject_non_cancerous(&mut table, &selected, config)?;

    let mut injected = 0;
    // includes healthy-tissue diseases whose own code isn't the `Z{lineage}` node made above.
    for disease in selected.iter() {
        if table.contains_code(&disease.code) || table.contains_name(&disease.name) {
            continue;
        }
        let parent_code = match config.parent_override(&disease.code) {
            Some(code) => code.clone(),
            None => table
                .find_by_name(&disease.lineage)
                .map(|row| ArcStr::from(row.code.as_str()))
                .with_context(|| {
                    format!(
                        "no node for lineage \"{}\" of \"{}\" ({})",
                        disease.lineage, disease.name, disease.code
                    )
                })?,
        };
        let row = construct_new_table_node(
            disease.code.clone(),
            disease.name.clone(),
            NodeSource::Depmap,
            &parent_code,
            &table,
            CodeColumn::DepmapModelType,
        )?;
        table.push(row);
        injected += 1;
    }

    Ok(CustomNodes {
        table,
        non_cancerous,
        injected,
        dropped,
    })
}

/// Split the diseases into those needing a node and those that are ambiguous.
///
/// A disease needs a node if neither its code nor its name is in the tree. It is ambiguous if its
/// code appears with several names, or its name with several codes.
fn select_candidates<'a>(
    diseases: &'a BTreeSet<ModelDisease>,
    table: &NodeTable,
) -> (Vec<&'a ModelDisease>, Vec<DroppedCandidate>) {
    let mut names_by_code: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut codes_by_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for disease in diseases.iter() {
        names_by_code
            .entry(&disease.code)
            .or_default()
            .insert(&disease.name);
        codes_by_name
            .entry(&disease.name)
            .or_default()
            .insert(&disease.code);
    }

    let mut selected = vec![];
    let mut dropped: Vec<DroppedCandidate> = vec![];
    for disease in diseases.iter() {
        if table.contains_code(&disease.code) || table.contains_name(&disease.name) {
            continue;
        }
        let reason = if names_by_code[&*disease.code].len() > 1 {
            DropReason::AmbiguousCode
        } else if codes_by_name[&*disease.name].len() > 1 {
            DropReason::AmbiguousName
        } else {
            selected.push(disease);
            continue;
        };
        // the same pair can appear under several lineages.
        if dropped
            .iter()
            .any(|d| d.code == disease.code && d.name == disease.name)
        {
            continue;
        }
        event!(
            Level::WARN,
            "not adding \"{}\" ({}) to the tree: {}",
            disease.name,
            disease.code,
            match reason {
                DropReason::AmbiguousCode => "code has more than one name",
                DropReason::AmbiguousName => "name has more than one code",
            }
        );
        dropped.push(DroppedCandidate {
            code: disease.code.clone(),
            name: disease.name.clone(),
            reason,
        });
    }
    (selected, dropped)
}

/// Give each lineage with healthy-tissue models a `Z{lineage}` child, creating the lineage if the
/// tree doesn't have it.
fn inject_non_cancerous(
    table: &mut NodeTable,
    selected: &[&ModelDisease],
    config: &TreeConfig,
) -> Result<usize> {
    let mut lineages: BTreeMap<&str, Vec<&ModelDisease>> = BTreeMap::new();
    for disease in selected.iter().filter(|d| {
        d.primary_disease.as_deref() == Some(&*config.non_cancerous_disease)
    }) {
        lineages.entry(&disease.lineage).or_default().push(disease);
    }

    let mut added = 0;
    for (lineage, diseases) in lineages {
        let parent_code: ArcStr = match table.find_by_name(lineage) {
            Some(row) => row.code.as_str().into(),
            None => {
                let code = diseases
                    .iter()
                    .find(|d| &*d.name == lineage)
                    .map(|d| d.code.clone())
                    .unwrap_or_else(|| lineage_code(lineage));
                event!(Level::DEBUG, "adding lineage \"{}\" ({})", lineage, code);
                table.push(TreeRow::root(
                    NodeCode::Depmap(code.clone()),
                    lineage,
                    NodeSource::Depmap,
                ));
                added += 1;
                code
            }
        };

        let code = format!("Z{}", parent_code);
        let name = format!("{} {}", lineage, config.non_cancerous_disease);
        if table.contains_code(&code) || table.contains_name(&name) {
            continue;
        }
        let row = construct_new_table_node(
            code,
            name,
            NodeSource::Depmap,
            &parent_code,
            table,
            CodeColumn::DepmapModelType,
        )?;
        table.push(row);
        added += 1;
    }
    Ok(added)
}

/// `Soft Tissue` -> `SOFT_TISSUE`
fn lineage_code(lineage: &str) -> ArcStr {
    lineage.to_uppercase().replace(' ', "_").into()
}
