//! The molecular subtype tree, inferred from the names of the subtype indicator columns.
//!
//! Columns are named `{gene} {variant}` or `{gene}-{variant}`, e.g. `KRAS p.G12D`. We group the
//! columns by gene and nest them by name:
//!
//! ```text
//!            KRAS
//!          /      \
//!   KRAS p.G12   KRAS p.G13D
//!       |
//!   KRAS p.G12D
//!```
//!
//! The algorithm for one gene is:
//!
//! 1. Sort the subtype names.
//! 2. Put every subtype at level 1, under the gene.
//! 3. For every pair `(a, b)` with `a` sorted before `b`, if `a` is contained in `b` then `b`
//!    goes one level below `a`, otherwise if `b` is contained in `a` then `a` goes below `b`.
//!    Pairs are visited in sorted order, and a later pair overwrites what an earlier one decided.
//! 4. Build nodes shallowest first, so parents exist before their children.
//!
//! Genes with a single column are just one root node named after the column.
use itertools::Itertools;
use once_cell::sync::Lazy;
use qu::ick_use::*;
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::Path,
};

use crate::{
    config::Containment,
    node::{construct_new_table_node, CodeColumn, NodeCode, NodeSource, NodeTable, TreeRow},
    util::strip_whitespace,
    ArcStr,
};

static GENE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s-]").unwrap());

/// Read the subtype names from the header of the indicator matrix.
///
/// The first column holds sample ids and is skipped, as are blank and repeated names.
pub fn load_subtype_columns(reader: impl io::Read) -> Result<Vec<ArcStr>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut seen = BTreeSet::new();
    Ok(reader
        .headers()?
        .iter()
        .skip(1)
        .filter(|name| !name.is_empty() && seen.insert(name.to_string()))
        .map(ArcStr::from)
        .collect())
}

pub fn load_subtype_columns_path(path: impl AsRef<Path>) -> Result<Vec<ArcStr>> {
    fn inner(path: &Path) -> Result<Vec<ArcStr>> {
        load_subtype_columns(io::BufReader::new(fs::File::open(path)?))
    }
    let path = path.as_ref();
    inner(path).with_context(|| format!("loading molecular subtypes from \"{}\"", path.display()))
}

/// The gene a subtype column is about: everything before the first whitespace or `-`.
pub fn gene_of(name: &str) -> Result<ArcStr> {
    let gene = GENE_SEPARATOR.split(name).next().unwrap_or(name);
    ensure!(!gene.is_empty(), "no gene in molecular subtype \"{}\"", name);
    Ok(gene.into())
}

/// Decides whether one subtype name is contained in another.
enum Matcher {
    Literal,
    /// Compiled patterns, by name.
    Regex(BTreeMap<ArcStr, Regex>),
}

impl Matcher {
    fn new<'a>(containment: Containment, names: impl Iterator<Item = &'a ArcStr>) -> Result<Self> {
        Ok(match containment {
            Containment::Literal => Matcher::Literal,
            Containment::Regex => Matcher::Regex(
                names
                    .map(|name| -> Result<(ArcStr, Regex)> {
                        let re = Regex::new(name).with_context(|| {
                            format!("molecular subtype \"{}\" is not a valid pattern", name)
                        })?;
                        Ok((name.clone(), re))
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn is_within(&self, needle: &str, haystack: &str) -> bool {
        match self {
            Matcher::Literal => haystack.contains(needle),
            Matcher::Regex(patterns) => match patterns.get(needle) {
                Some(re) => re.is_match(haystack),
                None => haystack.contains(needle),
            },
        }
    }
}

/// Where a subtype sits below its gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypePlacement {
    pub name: ArcStr,
    /// 1 for direct children of the gene.
    pub level: usize,
    /// A subtype name, or the gene.
    pub parent: ArcStr,
}

/// Nest the subtypes of `gene` by name containment. `names` must be sorted and unique.
fn infer_hierarchy(gene: &ArcStr, names: &[ArcStr], matcher: &Matcher) -> Vec<SubtypePlacement> {
    let mut nodes: Vec<SubtypePlacement> = names
        .iter()
        .map(|name| SubtypePlacement {
            name: name.clone(),
            level: 1,
            parent: gene.clone(),
        })
        .collect();

    for (i, j) in (0..nodes.len()).tuple_combinations() {
        if matcher.is_within(&nodes[i].name, &nodes[j].name) {
            nodes[j].level = nodes[i].level + 1;
            nodes[j].parent = nodes[i].name.clone();
        } else if matcher.is_within(&nodes[j].name, &nodes[i].name) {
            nodes[i].level = nodes[j].level + 1;
            nodes[i].parent = nodes[j].name.clone();
        }
    }
    nodes
}

/// Place the subtypes of one gene, in sorted name order.
pub fn place_subtypes(
    gene: &ArcStr,
    names: &BTreeSet<ArcStr>,
    containment: Containment,
) -> Result<Vec<SubtypePlacement>> {
    let names: Vec<ArcStr> = names.iter().filter(|name| *name != gene).cloned().collect();
    let matcher = Matcher::new(containment, names.iter())?;
    Ok(infer_hierarchy(gene, &names, &matcher))
}

/// Build the molecular subtype tree from the indicator column names.
pub fn build_molecular_subtype_tree(
    columns: &[ArcStr],
    containment: Containment,
) -> Result<NodeTable> {
    let mut genes: BTreeMap<ArcStr, BTreeSet<ArcStr>> = BTreeMap::new();
    for name in columns {
        genes.entry(gene_of(name)?).or_default().insert(name.clone());
    }

    let mut table = NodeTable::default();
    for (gene, names) in genes.iter() {
        if names.len() == 1 {
            let name = names.iter().next().unwrap_or(gene);
            table.push(subtype_root(name));
            continue;
        }
        table.push(subtype_root(gene));

        let mut pending = place_subtypes(gene, names, containment)?;
        // stable, so siblings stay in name order
        pending.sort_by_key(|node| node.level);
        let mut built: BTreeSet<ArcStr> = BTreeSet::from([gene.clone()]);
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = vec![];
            for node in pending {
                if !built.contains(&node.parent) {
                    deferred.push(node);
                    continue;
                }
                let parent_code = if node.parent == *gene {
                    gene.clone()
                } else {
                    strip_whitespace(&node.parent).into()
                };
                let row = construct_new_table_node(
                    strip_whitespace(&node.name),
                    node.name.clone(),
                    NodeSource::MolecularSubtype,
                    &parent_code,
                    &table,
                    CodeColumn::MolecularSubtypeCode,
                )?;
                table.push(row);
                built.insert(node.name);
            }
            ensure!(
                deferred.len() < before,
                "molecular subtypes of {} contain each other: {}",
                gene,
                deferred.iter().map(|node| &node.name).join(", ")
            );
            pending = deferred;
        }
    }
    Ok(table)
}

fn subtype_root(name: &ArcStr) -> TreeRow {
    TreeRow::root(
        NodeCode::MolecularSubtype(name.clone()),
        name.clone(),
        NodeSource::MolecularSubtype,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn columns(names: &[&str]) -> Vec<ArcStr> {
        names.iter().map(|&name| ArcStr::from(name)).collect()
    }

    fn path(table: &NodeTable, code: &str) -> Vec<String> {
        table
            .find_by_code(code)
            .unwrap()
            .path
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn gene_names() {
        assert_eq!(&*gene_of("KRAS p.G12D").unwrap(), "KRAS");
        assert_eq!(&*gene_of("EGFR-L858R").unwrap(), "EGFR");
        assert_eq!(&*gene_of("MSI").unwrap(), "MSI");
        assert!(gene_of("-X").is_err());
    }

    #[test]
    fn kras_nesting() {
        let cols = columns(&["KRAS p.G12", "KRAS p.G12D", "KRAS p.G13D"]);
        for containment in [Containment::Literal, Containment::Regex] {
            let table = build_molecular_subtype_tree(&cols, containment).unwrap();
            assert_eq!(table.len(), 4);

            let kras = table.find_by_code("KRAS").unwrap();
            assert_eq!(kras.level(), 0);
            assert_eq!(&*kras.name, "KRAS");

            let g12 = table.find_by_name("KRAS p.G12").unwrap();
            assert_eq!(g12.level(), 1);
            assert_eq!(g12.code, NodeCode::MolecularSubtype("KRASp.G12".into()));
            assert_eq!(g12.parent().map(|c| &**c), Some("KRAS"));

            let g12d = table.find_by_name("KRAS p.G12D").unwrap();
            assert_eq!(g12d.level(), 2);
            assert_eq!(path(&table, "KRASp.G12D"), ["KRAS", "KRASp.G12", "KRASp.G12D"]);

            let g13d = table.find_by_name("KRAS p.G13D").unwrap();
            assert_eq!(g13d.level(), 1);
            assert_eq!(g13d.source, NodeSource::MolecularSubtype);
        }
    }

    #[test]
    fn single_column_gene() {
        let cols = columns(&["MSI High", "KRAS p.G12", "KRAS p.G12D"]);
        let table = build_molecular_subtype_tree(&cols, Containment::Literal).unwrap();
        let msi = table.find_by_code("MSI High").unwrap();
        assert_eq!(msi.level(), 0);
        assert_eq!(&*msi.name, "MSI High");
        assert!(!table.contains_code("MSI"));
    }

    #[test]
    fn column_named_after_gene_is_the_root() {
        let cols = columns(&["TP53", "TP53 LOF", "TP53-R175H"]);
        let table = build_molecular_subtype_tree(&cols, Containment::Literal).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(path(&table, "TP53LOF"), ["TP53", "TP53LOF"]);
        assert_eq!(path(&table, "TP53-R175H"), ["TP53", "TP53-R175H"]);
    }

    #[test]
    fn regex_containment_differs_from_literal() {
        let cols = columns(&["TP53 A.B", "TP53 AXB"]);

        let literal = build_molecular_subtype_tree(&cols, Containment::Literal).unwrap();
        assert_eq!(path(&literal, "TP53AXB"), ["TP53", "TP53AXB"]);

        let regex = build_molecular_subtype_tree(&cols, Containment::Regex).unwrap();
        assert_eq!(path(&regex, "TP53AXB"), ["TP53", "TP53A.B", "TP53AXB"]);
    }

    #[test]
    fn invalid_pattern_in_regex_mode() {
        let cols = columns(&["EGFR ex19(del", "EGFR ex19(del) L858R"]);
        assert!(build_molecular_subtype_tree(&cols, Containment::Regex).is_err());
        assert!(build_molecular_subtype_tree(&cols, Containment::Literal).is_ok());
    }

    #[test]
    fn shared_prefix_is_parent_of_both() {
        // "A" is in both "A B" and "A C", which are unrelated.
        let gene = ArcStr::from("G");
        let names: BTreeSet<ArcStr> = ["G A", "G A B", "G A C"].into_iter().map(Into::into).collect();
        let placed = place_subtypes(&gene, &names, Containment::Literal).unwrap();
        let parents: Vec<(&str, &str, usize)> = placed
            .iter()
            .map(|p| (&*p.name, &*p.parent, p.level))
            .collect();
        assert_eq!(
            parents,
            [("G A", "G", 1), ("G A B", "G A", 2), ("G A C", "G A", 2)]
        );
    }

    #[test]
    fn header_only() {
        let data = "\
ModelID,KRAS p.G12,,KRAS p.G12,KRAS p.G12D
ACH-000001,1,0,1,0
";
        let cols = load_subtype_columns(data.as_bytes()).unwrap();
        assert_eq!(cols, columns(&["KRAS p.G12", "KRAS p.G12D"]));
    }
}
