//! Builder pattern for creating rule catalogs.
//!
//! This module provides ergonomic builders for constructing catalogs
//! and their rules with a fluent API.

use crate::{
    ArithmeticOp, Catalog, CheckGroup, ConfigurationError, DateBound, DedupSpec, EnumMapping,
    Rule, RuleKind, Severity, Transform,
};

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Builder for creating a [`Catalog`].
///
/// # Example
///
/// ```rust
/// use quality_core::{CatalogBuilder, CheckGroupBuilder, RuleBuilder};
///
/// let catalog = CatalogBuilder::new("silver_layer")
///     .description("Checks for the cleansed tier")
///     .group(
///         CheckGroupBuilder::new("customer_keys", "silver.crm_cust_info")
///             .rule(RuleBuilder::key_integrity("cst_id_unique", ["cst_id"]).build())
///             .build(),
///     )
///     .build()
///     .unwrap();
///
/// assert_eq!(catalog.rule_count(), 1);
/// ```
#[derive(Debug)]
pub struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    /// Creates a new catalog builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: Catalog::new(name),
        }
    }

    /// Sets the catalog version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.catalog.version = version.into();
        self
    }

    /// Sets the catalog description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.catalog.description = Some(description.into());
        self
    }

    /// Declares a latest-wins transform.
    pub fn transform<I, S>(
        mut self,
        id: impl Into<String>,
        dataset: impl Into<String>,
        key_columns: I,
        recency_column: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.catalog.transforms.push(Transform {
            id: id.into(),
            dataset: dataset.into(),
            spec: DedupSpec {
                key_columns: strings(key_columns),
                recency_column: recency_column.into(),
                tie_breakers: Vec::new(),
            },
        });
        self
    }

    /// Adds a check group.
    pub fn group(mut self, group: CheckGroup) -> Self {
        self.catalog.groups.push(group);
        self
    }

    /// Validates and builds the catalog.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the catalog is not valid.
    pub fn build(self) -> Result<Catalog, ConfigurationError> {
        self.catalog.resolve()
    }
}

/// Builder for creating a [`CheckGroup`].
#[derive(Debug)]
pub struct CheckGroupBuilder {
    group: CheckGroup,
}

impl CheckGroupBuilder {
    /// Creates a new group over `dataset`.
    pub fn new(name: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            group: CheckGroup {
                name: name.into(),
                dataset: dataset.into(),
                description: None,
                rules: Vec::new(),
            },
        }
    }

    /// Sets the group description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.group.description = Some(description.into());
        self
    }

    /// Adds a rule.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.group.rules.push(rule);
        self
    }

    /// Builds the group.
    pub fn build(self) -> CheckGroup {
        self.group
    }
}

/// Builder for creating a [`Rule`].
///
/// One constructor exists per rule kind. The dataset is left empty and is
/// filled in from the enclosing group when the catalog is resolved.
///
/// # Example
///
/// ```rust
/// use quality_core::{RuleBuilder, Severity};
///
/// let rule = RuleBuilder::date_order("order_before_ship", "sls_order_dt", ["sls_ship_dt"])
///     .description("Orders ship after they are placed")
///     .severity(Severity::Blocking)
///     .identify_by(["sls_ord_num"])
///     .build();
///
/// assert_eq!(rule.key_columns(), ["sls_ord_num".to_string()]);
/// ```
#[derive(Debug)]
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    /// Creates a rule builder from an explicit kind.
    pub fn new(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            rule: Rule {
                id: id.into(),
                description: None,
                dataset: String::new(),
                kind,
                severity: Severity::default(),
                depends_on: None,
                identify_by: Vec::new(),
                reference_dataset: None,
            },
        }
    }

    /// Key columns must be non-null and unique.
    pub fn key_integrity<I, S>(id: impl Into<String>, key_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            RuleKind::KeyIntegrity {
                key_columns: strings(key_columns),
            },
        )
    }

    /// Text columns must not carry leading/trailing whitespace.
    pub fn no_unwanted_whitespace<I, S>(id: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            RuleKind::NoUnwantedWhitespace {
                columns: strings(columns),
            },
        )
    }

    /// Report observed codes missing from `mapping`.
    pub fn domain_membership(
        id: impl Into<String>,
        column: impl Into<String>,
        mapping: EnumMapping,
    ) -> Self {
        Self::new(
            id,
            RuleKind::DomainMembership {
                column: column.into(),
                mapping,
                default_label: "n/a".to_string(),
            },
        )
    }

    /// `result_column` must equal `op(operands)` exactly.
    pub fn cross_field_arithmetic<I, S>(
        id: impl Into<String>,
        result_column: impl Into<String>,
        operands: I,
        op: ArithmeticOp,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            RuleKind::CrossFieldArithmetic {
                result_column: result_column.into(),
                operands: strings(operands),
                op,
                tolerance: 0.0,
                require_positive: true,
            },
        )
    }

    /// `earlier_column` must not be after any of `later_columns`.
    pub fn date_order<I, S>(
        id: impl Into<String>,
        earlier_column: impl Into<String>,
        later_columns: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            RuleKind::DateOrder {
                earlier_column: earlier_column.into(),
                later_columns: strings(later_columns),
            },
        )
    }

    /// Column must lie within `[min, max]`.
    pub fn date_range(
        id: impl Into<String>,
        column: impl Into<String>,
        min: Option<DateBound>,
        max: Option<DateBound>,
    ) -> Self {
        Self::new(
            id,
            RuleKind::DateRange {
                column: column.into(),
                min,
                max,
            },
        )
    }

    /// Report rows superseded by a more recent row with the same key.
    pub fn latest_wins_dedup<I, S>(
        id: impl Into<String>,
        key_columns: I,
        recency_column: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            RuleKind::LatestWinsDedup(DedupSpec {
                key_columns: strings(key_columns),
                recency_column: recency_column.into(),
                tie_breakers: Vec::new(),
            }),
        )
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = Some(description.into());
        self
    }

    /// Sets the target dataset explicitly.
    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        self.rule.dataset = dataset.into();
        self
    }

    /// Sets the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.rule.severity = severity;
        self
    }

    /// Shorthand for `severity(Severity::Advisory)`.
    pub fn advisory(self) -> Self {
        self.severity(Severity::Advisory)
    }

    /// Reads the output of a declared transform instead of the raw dataset.
    pub fn depends_on(mut self, transform: impl Into<String>) -> Self {
        self.rule.depends_on = Some(transform.into());
        self
    }

    /// Sets the columns reported as the key of offending rows.
    pub fn identify_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule.identify_by = strings(columns);
        self
    }

    /// Sets the arithmetic tolerance (ignored by other kinds).
    pub fn tolerance(mut self, value: f64) -> Self {
        if let RuleKind::CrossFieldArithmetic { tolerance, .. } = &mut self.rule.kind {
            *tolerance = value;
        }
        self
    }

    /// Sets the label unknown codes resolve to (ignored by other kinds).
    pub fn default_label(mut self, label: impl Into<String>) -> Self {
        if let RuleKind::DomainMembership { default_label, .. } = &mut self.rule.kind {
            *default_label = label.into();
        }
        self
    }

    /// Sets dedup tie-breaker columns (ignored by other kinds).
    pub fn tie_breakers<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let RuleKind::LatestWinsDedup(spec) = &mut self.rule.kind {
            spec.tie_breakers = strings(columns);
        }
        self
    }

    /// Builds the rule.
    pub fn build(self) -> Rule {
        self.rule
    }
}
