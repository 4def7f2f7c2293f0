//! Build the subtype tree and write it to a csv file.
use qu::ick_use::*;
use std::path::PathBuf;
use subtype_tree::{build_subtype_tree, Inputs, TreeConfig};

#[derive(clap::Parser, Debug)]
struct Opt {
    /// The model table.
    model: PathBuf,
    /// The Oncotree export.
    oncotree: PathBuf,
    /// The molecular subtype matrix. Only the column names are used.
    molecular_subtypes: PathBuf,
    genetic_subtypes_whitelist: PathBuf,
    /// Where to write the tree.
    output: PathBuf,
    /// Build settings (toml). Without it the defaults are used.
    #[clap(long)]
    config: Option<PathBuf>,
    /// Also write a summary of the build (json).
    #[clap(long)]
    summary: Option<PathBuf>,
}

#[qu::ick]
fn main(opt: Opt) -> Result {
    let config = match opt.config.as_ref() {
        Some(path) => TreeConfig::load(path)?,
        None => TreeConfig::default(),
    };
    let inputs = Inputs::load(
        &opt.model,
        &opt.oncotree,
        &opt.molecular_subtypes,
        &opt.genetic_subtypes_whitelist,
    )?;

    let (tree, report) = build_subtype_tree(&inputs, &config)?;
    tree.save(&opt.output)?;
    event!(
        Level::INFO,
        "wrote {} nodes to \"{}\"",
        tree.len(),
        opt.output.display()
    );

    report.print();
    if let Some(path) = opt.summary.as_ref() {
        report.save(path)?;
    }
    Ok(())
}
