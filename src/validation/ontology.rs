//! Ontology: the layers a requirement may live in and how they nest

use super::config::TypePair;
use crate::config::{load_yaml, parse_yaml, ConfigError, ConfigResult};
use crate::graph::RequirementType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// One layer of the requirement hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: RequirementType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default = "default_true")]
    pub can_have_children: bool,
    #[serde(default)]
    pub parent_stages: Vec<RequirementType>,
    #[serde(default)]
    pub child_stages: Vec<RequirementType>,
    #[serde(default)]
    pub requires_children: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ontology {
    pub stages: Vec<Stage>,
}

impl Ontology {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let ontology: Self = parse_yaml(text)?;
        ontology.check()?;
        Ok(ontology)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let ontology: Self = load_yaml(path)?;
        ontology.check()?;
        Ok(ontology)
    }

    /// Load an ontology file; a broken file is logged and ignored so
    /// validation falls back to the configured hierarchy pairs
    pub fn load_or_none(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(ontology) => Some(ontology),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring ontology");
                None
            }
        }
    }

    fn check(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.id) {
                return Err(ConfigError::Invalid(format!(
                    "stage '{}' is defined twice",
                    stage.id
                )));
            }
            if !stage.can_have_children && !stage.child_stages.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "stage '{}' lists child stages but cannot have children",
                    stage.id
                )));
            }
        }
        Ok(())
    }

    pub fn stage(&self, id: RequirementType) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Every (parent, child) pair the ontology permits
    pub fn allowed_pairs(&self) -> Vec<TypePair> {
        self.stages
            .iter()
            .filter(|s| s.can_have_children)
            .flat_map(|s| {
                s.child_stages.iter().map(move |child| TypePair {
                    parent: s.id,
                    child: *child,
                })
            })
            .collect()
    }

    /// Some(child types) when the stage must have at least one child
    pub fn required_children(&self, id: RequirementType) -> Option<&[RequirementType]> {
        self.stage(id)
            .filter(|s| s.requires_children)
            .map(|s| s.child_stages.as_slice())
    }
}
