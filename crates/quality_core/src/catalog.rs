//! Rule catalogs.
//!
//! A catalog is an ordered list of check groups, each targeting one dataset,
//! plus the named preprocessing transforms rules may depend on. The rules of a
//! dataset are the union of every group targeting it.

use crate::{ConfigurationError, DedupSpec, Rule};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("identifier pattern is valid")
});

/// A named latest-wins deduplication that rules can read instead of the raw dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Identifier referenced by `depends_on`
    pub id: String,

    /// Dataset the transform reads
    pub dataset: String,

    /// Deduplication parameters
    #[serde(flatten)]
    pub spec: DedupSpec,
}

/// A group of rules over a single dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckGroup {
    /// Group name (e.g. "customer_keys")
    pub name: String,

    /// Dataset every rule of the group targets
    pub dataset: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Rules in evaluation order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// An ordered collection of rules grouped by target dataset.
///
/// Catalogs loaded from configuration must be [`resolve`](Catalog::resolve)d
/// before they are executed; the parser and [`CatalogBuilder`](crate::CatalogBuilder)
/// do this for you.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog name
    pub name: String,

    /// Catalog version
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Preprocessing transforms
    #[serde(default)]
    pub transforms: Vec<Transform>,

    /// Check groups in evaluation order
    #[serde(default)]
    pub groups: Vec<CheckGroup>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: None,
            transforms: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Validates the catalog and propagates each group's dataset to its rules.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found. Nothing is partially
    /// applied on error.
    pub fn resolve(mut self) -> Result<Self, ConfigurationError> {
        let mut ids = HashSet::new();

        for transform in &self.transforms {
            check_id(&transform.id, &mut ids)?;
            if transform.dataset.trim().is_empty() {
                return Err(ConfigurationError::MissingDataset(transform.id.clone()));
            }
            transform.spec.validate(&transform.id)?;
        }

        for group in &mut self.groups {
            if group.dataset.trim().is_empty() {
                return Err(ConfigurationError::MissingDataset(group.name.clone()));
            }

            for rule in &mut group.rules {
                check_id(&rule.id, &mut ids)?;

                if rule.dataset.is_empty() {
                    rule.dataset = group.dataset.clone();
                } else if rule.dataset != group.dataset {
                    return Err(ConfigurationError::DatasetMismatch {
                        rule: rule.id.clone(),
                        rule_dataset: rule.dataset.clone(),
                        group_dataset: group.dataset.clone(),
                    });
                }

                rule.kind.validate(&rule.id)?;

                if let Some(transform_id) = &rule.depends_on {
                    let transform = self
                        .transforms
                        .iter()
                        .find(|t| &t.id == transform_id)
                        .ok_or_else(|| ConfigurationError::UnknownTransform {
                            rule: rule.id.clone(),
                            transform: transform_id.clone(),
                        })?;

                    if transform.dataset != rule.dataset {
                        return Err(ConfigurationError::TransformDatasetMismatch {
                            rule: rule.id.clone(),
                            dataset: rule.dataset.clone(),
                            transform: transform.id.clone(),
                            transform_dataset: transform.dataset.clone(),
                        });
                    }
                }
            }
        }

        Ok(self)
    }

    /// Iterates over every rule in declared order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.groups.iter().flat_map(|g| g.rules.iter())
    }

    /// Number of rules across all groups.
    pub fn rule_count(&self) -> usize {
        self.groups.iter().map(|g| g.rules.len()).sum()
    }

    /// Looks up a rule by identifier.
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules().find(|r| r.id == id)
    }

    /// Iterates over the rules targeting a dataset, in declared order.
    pub fn rules_for<'a>(&'a self, dataset: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.groups
            .iter()
            .filter(move |g| g.dataset == dataset)
            .flat_map(|g| g.rules.iter())
    }

    /// Returns the catalog of a single dataset: the union of its groups and
    /// the transforms they depend on.
    pub fn for_dataset(&self, dataset: &str) -> Catalog {
        let groups: Vec<CheckGroup> = self
            .groups
            .iter()
            .filter(|g| g.dataset == dataset)
            .cloned()
            .collect();

        let transforms = self
            .transforms
            .iter()
            .filter(|t| t.dataset == dataset)
            .cloned()
            .collect();

        Catalog {
            name: format!("{}[{}]", self.name, dataset),
            version: self.version.clone(),
            description: self.description.clone(),
            transforms,
            groups,
        }
    }

    /// Looks up a transform by identifier.
    pub fn transform(&self, id: &str) -> Option<&Transform> {
        self.transforms.iter().find(|t| t.id == id)
    }

    /// Transforms referenced by at least one rule, in declared order.
    pub fn referenced_transforms(&self) -> Vec<&Transform> {
        let referenced: HashSet<&str> = self
            .rules()
            .filter_map(|r| r.depends_on.as_deref())
            .collect();
        self.transforms
            .iter()
            .filter(|t| referenced.contains(t.id.as_str()))
            .collect()
    }

    /// Every dataset the catalog reads (targets, transforms, references),
    /// deduplicated in first-seen order.
    pub fn dataset_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let candidates = self
            .groups
            .iter()
            .map(|g| g.dataset.as_str())
            .chain(self.transforms.iter().map(|t| t.dataset.as_str()))
            .chain(self.rules().filter_map(|r| r.reference_dataset.as_deref()));

        candidates
            .filter(|id| seen.insert(*id))
            .map(String::from)
            .collect()
    }

    /// Composes two catalogs: groups and transforms of `other` are appended.
    ///
    /// # Errors
    ///
    /// Fails if the union is not a valid catalog (e.g. duplicate ids).
    pub fn merge(mut self, other: Catalog) -> Result<Catalog, ConfigurationError> {
        self.transforms.extend(other.transforms);
        self.groups.extend(other.groups);
        self.resolve()
    }
}

fn check_id(id: &str, seen: &mut HashSet<String>) -> Result<(), ConfigurationError> {
    if !ID_PATTERN.is_match(id) {
        return Err(ConfigurationError::InvalidId(id.to_string()));
    }
    if !seen.insert(id.to_string()) {
        return Err(ConfigurationError::DuplicateId(id.to_string()));
    }
    Ok(())
}
