//! Settings for a tree build.
//!
//! The defaults are the rules the DepMap tree has always been built with, so most runs don't need
//! a config file at all. A file only has to mention the fields it changes.
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::ArcStr;

/// How the molecular subtype builder decides that one subtype name contains another.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Containment {
    /// Plain substring search.
    ///
    /// Not the default: trees built so far used `Regex`, so switching changes where names with
    /// metacharacters end up.
    Literal,
    /// Treat the shorter name as a regular expression and search for it in the longer one.
    ///
    /// Names containing metacharacters (`.`, `+`, `(`...) may then match where they shouldn't,
    /// or fail to compile.
    Regex,
}

impl Default for Containment {
    fn default() -> Self {
        Containment::Regex
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TreeConfig {
    /// Parent code used by the ontology for tissues, meaning "no parent".
    pub ontology_root: ArcStr,
    /// `OncotreePrimaryDisease` value of models from healthy tissue.
    pub non_cancerous_disease: ArcStr,
    /// Custom codes that are always attached under a fixed parent, whatever their lineage says.
    pub parent_overrides: BTreeMap<ArcStr, ArcStr>,
    pub containment: Containment,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            ontology_root: "TISSUE".into(),
            non_cancerous_disease: "Non-Cancerous".into(),
            // B- and T-cell ALL belong under "Lymphoid Neoplasm", not under their lineage.
            parent_overrides: BTreeMap::from([
                ("BALL".into(), "LNM".into()),
                ("TALL".into(), "LNM".into()),
            ]),
            containment: Containment::default(),
        }
    }
}

impl TreeConfig {
    /// Load a config from a toml file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<TreeConfig> {
            let text = fs::read_to_string(path)?;
            Ok(toml::from_str(&text)?)
        }
        let path = path.as_ref();
        inner(path).with_context(|| format!("loading config from \"{}\"", path.display()))
    }

    /// The parent a custom code is forced under, if any.
    pub fn parent_override(&self, code: &str) -> Option<&ArcStr> {
        self.parent_overrides.get(code)
    }
}
