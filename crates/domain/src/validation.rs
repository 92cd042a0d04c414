use std::fmt::{Display, Formatter};

use crate::event::{ASSET_TAG_MAX_LENGTH, ASSET_TAG_RESERVED_CHARACTER, RawInfrastructureEvent};

/// Problem found on one required event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    /// Field was not sent.
    Missing,
    /// Field was sent but empty or whitespace.
    Blank,
    /// Field is longer than allowed.
    TooLong {
        /// Maximum accepted character count.
        max: usize,
    },
    /// Field contains a character the CMDB query syntax reserves.
    ReservedCharacter {
        /// The offending character.
        character: char,
    },
}

/// One required field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIssue {
    /// Wire name of the field.
    pub field: &'static str,
    /// What is wrong with it.
    pub problem: FieldProblem,
}

impl Display for FieldIssue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.problem {
            FieldProblem::Missing => write!(formatter, "{} is missing", self.field),
            FieldProblem::Blank => write!(formatter, "{} must not be blank", self.field),
            FieldProblem::TooLong { max } => {
                write!(formatter, "{} exceeds {max} characters", self.field)
            }
            FieldProblem::ReservedCharacter { character } => {
                write!(formatter, "{} must not contain '{character}'", self.field)
            }
        }
    }
}

/// Pass/fail outcome of event validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<FieldIssue>,
}

impl ValidationReport {
    /// Returns true when no field failed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns every failed field in check order.
    #[must_use]
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Returns the names of the failed fields.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.issues.iter().map(|issue| issue.field).collect()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.issues.is_empty() {
            return formatter.write_str("event is valid");
        }

        let messages = self
            .issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        write!(formatter, "invalid event: {}", messages.join("; "))
    }
}

/// Checks the required shape of an inbound event. Pure, never touches the CMDB.
#[must_use]
pub fn validate_event(raw: &RawInfrastructureEvent) -> ValidationReport {
    let mut issues = Vec::new();

    if check_required(
        "resource_id",
        raw.resource_id.as_deref(),
        Some(ASSET_TAG_MAX_LENGTH),
        &mut issues,
    ) && raw
        .resource_id
        .as_deref()
        .is_some_and(|value| value.contains(ASSET_TAG_RESERVED_CHARACTER))
    {
        issues.push(FieldIssue {
            field: "resource_id",
            problem: FieldProblem::ReservedCharacter {
                character: ASSET_TAG_RESERVED_CHARACTER,
            },
        });
    }
    check_required("resource_type", raw.resource_type.as_deref(), None, &mut issues);
    check_required("action", raw.action.as_deref(), None, &mut issues);

    ValidationReport { issues }
}

/// Returns true when the field passed every check.
fn check_required(
    field: &'static str,
    value: Option<&str>,
    max_length: Option<usize>,
    issues: &mut Vec<FieldIssue>,
) -> bool {
    let Some(value) = value else {
        issues.push(FieldIssue {
            field,
            problem: FieldProblem::Missing,
        });
        return false;
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        issues.push(FieldIssue {
            field,
            problem: FieldProblem::Blank,
        });
        return false;
    }

    if let Some(max) = max_length {
        if trimmed.chars().count() > max {
            issues.push(FieldIssue {
                field,
                problem: FieldProblem::TooLong { max },
            });
            return false;
        }
    }

    true
}
