//! Changeset validation
//!
//! Validation rules are external to the staging engine and are reached
//! through [`ModelValidator`]. The only thing this module guarantees is what
//! they run against: a [`Projection`], i.e. the model as it will look once
//! the changeset is committed. A bare base model cannot be passed in.

use serde::Serialize;

use super::projection::Projection;
use crate::domain::{ElementId, RelationshipRegistry};
use crate::storage::ValidationConfig;

/// A single finding from a validation rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<ElementId>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        rule: impl Into<String>,
        element_id: Option<ElementId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            element_id,
            message: message.into(),
        }
    }
}

/// Errors and warnings produced by validation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no errors (warnings are allowed)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Appends another report's findings
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// An external validation rule set
///
/// Any `Fn(&Projection) -> ValidationReport` closure is a validator.
pub trait ModelValidator {
    fn validate(&self, projection: &Projection) -> ValidationReport;
}

impl<F> ModelValidator for F
where
    F: Fn(&Projection) -> ValidationReport,
{
    fn validate(&self, projection: &Projection) -> ValidationReport {
        self(projection)
    }
}

/// Runs a set of validators against a projection
#[derive(Default)]
pub struct ChangesetValidator {
    rules: Vec<Box<dyn ModelValidator>>,
}

impl ChangesetValidator {
    /// A validator with no rules; every projection passes
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rules enabled in configuration
    pub fn from_config(config: &ValidationConfig) -> Self {
        let mut validator = Self::new();
        if config.reference_integrity {
            validator.add_rule(ReferenceIntegrity);
        }
        if config.element_identity {
            validator.add_rule(ElementIdentity);
        }
        validator
    }

    /// Adds a rule (builder style)
    pub fn with_rule(mut self, rule: impl ModelValidator + 'static) -> Self {
        self.add_rule(rule);
        self
    }

    pub fn add_rule(&mut self, rule: impl ModelValidator + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule and combines the findings
    pub fn validate(&self, projection: &Projection) -> ValidationReport {
        let mut report = ValidationReport::new();
        for rule in &self.rules {
            report.merge(rule.validate(projection));
        }
        tracing::debug!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "validated projection"
        );
        report
    }
}

/// Flags references to elements that do not exist in the projection
///
/// A dangling reference is an error when the changeset caused it (the
/// referring element or the missing target was touched) and a warning when
/// it was already present in the committed model.
pub struct ReferenceIntegrity;

impl ModelValidator for ReferenceIntegrity {
    fn validate(&self, projection: &Projection) -> ValidationReport {
        let mut report = ValidationReport::new();
        let registry = RelationshipRegistry::from_model(projection.model());
        let touched = projection.touched();

        for (source, target) in registry.dangling(projection.model()) {
            let caused_here = touched.contains(&source) || touched.contains(&target);
            let issue = ValidationIssue::new(
                "reference-integrity",
                Some(source.clone()),
                format!("{} references missing element {}", source, target),
            );
            if caused_here {
                report.error(issue);
            } else {
                report.warning(issue);
            }
        }

        report
    }
}

/// Checks that each element agrees with its id and has a name
pub struct ElementIdentity;

impl ModelValidator for ElementIdentity {
    fn validate(&self, projection: &Projection) -> ValidationReport {
        let mut report = ValidationReport::new();

        for element in projection.model().elements() {
            let misplaced = element.layer != element.id.layer()
                || element.element_type != element.id.element_type();
            if misplaced {
                report.error(ValidationIssue::new(
                    "element-identity",
                    Some(element.id.clone()),
                    format!(
                        "{} declares layer '{}' and type '{}', which disagree with its id",
                        element.id, element.layer, element.element_type
                    ),
                ));
            }
            if element.name.trim().is_empty() {
                report.warning(ValidationIssue::new(
                    "element-identity",
                    Some(element.id.clone()),
                    format!("{} has an empty name", element.id),
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeKind, Changeset, Element, ElementDelta, Model};
    use crate::staging::projection::ProjectionEngine;
    use std::collections::BTreeMap;

    fn id(s: &str) -> ElementId {
        s.parse().unwrap()
    }

    fn changeset() -> Changeset {
        Changeset::new("cs".parse().unwrap(), None, None, "h", BTreeMap::new())
    }

    fn base() -> Model {
        let mut model = Model::new();
        model
            .insert(Element::new(id("business.service.users"), "Users"))
            .unwrap();
        model
            .insert(
                Element::new(id("api.operation.list-users"), "List users")
                    .with_property("realizes", "business.service.users"),
            )
            .unwrap();
        model
    }

    #[test]
    fn deleting_referenced_element_is_an_error() {
        let mut cs = changeset();
        cs.stage(id("business.service.users"), ChangeKind::Delete { before: None })
            .unwrap();
        let projection = ProjectionEngine::project(&base(), "h", &cs).unwrap();

        let report = ReferenceIntegrity.validate(&projection);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].element_id, Some(id("api.operation.list-users")));
    }

    #[test]
    fn validation_sees_staged_additions() {
        // The referenced service only exists in the projection, not in the base
        let mut cs = changeset();
        cs.stage(
            id("business.service.billing"),
            ChangeKind::Add {
                after: Element::new(id("business.service.billing"), "Billing"),
            },
        )
        .unwrap();
        cs.stage(
            id("api.operation.list-users"),
            ChangeKind::Update {
                before: None,
                after: ElementDelta::new().property("billedBy", "business.service.billing"),
            },
        )
        .unwrap();
        let projection = ProjectionEngine::project(&base(), "h", &cs).unwrap();

        let validator = ChangesetValidator::from_config(&ValidationConfig::default());
        let report = validator.validate(&projection);
        assert!(report.is_valid(), "{:?}", report);
    }

    #[test]
    fn pre_existing_dangling_reference_is_a_warning() {
        let mut model = base();
        model
            .insert(
                Element::new(id("api.operation.legacy"), "Legacy")
                    .with_property("realizes", "business.service.gone"),
            )
            .unwrap();
        let projection = ProjectionEngine::project(&model, "h", &changeset()).unwrap();

        let report = ReferenceIntegrity.validate(&projection);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn identity_mismatch_is_an_error() {
        let mut element = Element::new(id("business.service.odd"), "Odd");
        element.element_type = "process".to_string();
        let mut cs = changeset();
        cs.stage(element.id.clone(), ChangeKind::Add { after: element })
            .unwrap();
        let projection = ProjectionEngine::project(&Model::new(), "h", &cs).unwrap();

        let report = ElementIdentity.validate(&projection);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn closures_are_validators() {
        let projection = ProjectionEngine::project(&base(), "h", &changeset()).unwrap();
        let validator = ChangesetValidator::new().with_rule(|p: &Projection| {
            let mut report = ValidationReport::new();
            if p.model().len() > 1 {
                report.warning(ValidationIssue::new("size", None, "more than one element"));
            }
            report
        });

        let report = validator.validate(&projection);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].rule, "size");
    }

    #[test]
    fn empty_validator_passes() {
        let projection = ProjectionEngine::project(&base(), "h", &changeset()).unwrap();
        assert!(ChangesetValidator::new().validate(&projection).is_valid());
    }
}
