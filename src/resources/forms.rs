//! Client-side form schemas, checked before any write reaches the network.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::types::Role;

use super::Resource;

pub const INVALID_FORM_MESSAGE: &str = "Please correct the highlighted fields";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    /// Every required field must be present
    Create,
    /// Only the fields present in the body are checked
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    Email,
    Numeric,
    Phone,
    MinLen(usize),
    Role,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub rules: &'static [Rule],
}

const fn field(name: &'static str, label: &'static str, rules: &'static [Rule]) -> FieldSpec {
    FieldSpec { name, label, rules }
}

const LEAD_FIELDS: &[FieldSpec] = &[
    field("name", "Name", &[Rule::Required, Rule::MinLen(2)]),
    field("phone", "Phone", &[Rule::Required, Rule::Phone]),
    field("email", "Email", &[Rule::Email]),
    field("loanAmount", "Loan amount", &[Rule::Numeric]),
    field("projectId", "Project", &[Rule::Numeric]),
];

const PROJECT_FIELDS: &[FieldSpec] = &[
    field("name", "Project name", &[Rule::Required, Rule::MinLen(2)]),
    field("location", "Location", &[Rule::Required]),
    field("totalUnits", "Total units", &[Rule::Numeric]),
    field("builderId", "Builder", &[Rule::Numeric]),
];

const TELECALLER_FIELDS: &[FieldSpec] = &[
    field("name", "Name", &[Rule::Required, Rule::MinLen(2)]),
    field("email", "Email", &[Rule::Required, Rule::Email]),
    field("phone", "Phone", &[Rule::Required, Rule::Phone]),
];

const BANK_FIELDS: &[FieldSpec] = &[
    field("name", "Bank name", &[Rule::Required, Rule::MinLen(2)]),
    field("interestRate", "Interest rate", &[Rule::Numeric]),
    field("contactEmail", "Contact email", &[Rule::Email]),
    field("contactPhone", "Contact phone", &[Rule::Phone]),
];

const DOCUMENT_FIELDS: &[FieldSpec] = &[
    field("leadId", "Lead", &[Rule::Required, Rule::Numeric]),
    field("documentType", "Document type", &[Rule::Required]),
    field("fileUrl", "File", &[Rule::Required]),
];

const USER_FIELDS: &[FieldSpec] = &[
    field("username", "Username", &[Rule::Required, Rule::MinLen(3)]),
    field("email", "Email", &[Rule::Required, Rule::Email]),
    field("password", "Password", &[Rule::Required, Rule::MinLen(6)]),
    field("role", "Role", &[Rule::Required, Rule::Role]),
    field("phone", "Phone", &[Rule::Phone]),
];

const NOTIFICATION_FIELDS: &[FieldSpec] = &[
    field("title", "Title", &[Rule::Required]),
    field("message", "Message", &[Rule::Required]),
    field("userId", "Recipient", &[Rule::Numeric]),
];

pub fn schema(resource: Resource) -> &'static [FieldSpec] {
    match resource {
        Resource::Leads => LEAD_FIELDS,
        Resource::Projects => PROJECT_FIELDS,
        Resource::Telecallers => TELECALLER_FIELDS,
        Resource::Banks => BANK_FIELDS,
        Resource::DocumentUploads => DOCUMENT_FIELDS,
        Resource::Users => USER_FIELDS,
        Resource::Notifications => NOTIFICATION_FIELDS,
    }
}

/// Checks `body` against the resource schema, collecting one message per field
pub fn validate(resource: Resource, body: &Value, mode: FormMode) -> Result<(), ValidationError> {
    let Some(object) = body.as_object() else {
        return Err(ValidationError::new(format!(
            "{} details must be a JSON object",
            resource.label()
        )));
    };

    let mut error = ValidationError::new(INVALID_FORM_MESSAGE);
    for spec in schema(resource) {
        if let Some(message) = check_field(spec, object, mode) {
            error = error.with_field(spec.name, message);
        }
    }

    if error.is_empty() {
        Ok(())
    } else {
        Err(error)
    }
}

fn check_field(spec: &FieldSpec, object: &Map<String, Value>, mode: FormMode) -> Option<String> {
    let value = object.get(spec.name);
    if mode == FormMode::Update && value.is_none() {
        return None;
    }

    let value = match value {
        Some(value) if !is_blank(value) => value,
        _ => {
            return spec
                .rules
                .contains(&Rule::Required)
                .then(|| format!("{} is required", spec.label));
        }
    };

    spec.rules
        .iter()
        .find_map(|rule| check_rule(*rule, spec.label, value))
}

fn check_rule(rule: Rule, label: &str, value: &Value) -> Option<String> {
    let ok = match rule {
        Rule::Required => true,
        Rule::Email => value.as_str().is_some_and(is_email),
        Rule::Numeric => is_numeric(value),
        Rule::Phone => value.as_str().is_some_and(is_phone) || value.as_u64().is_some_and(|n| is_phone(&n.to_string())),
        Rule::MinLen(min) => value.as_str().is_some_and(|s| s.trim().chars().count() >= min),
        Rule::Role => value.as_str().and_then(Role::from_code).is_some(),
    };
    if ok {
        return None;
    }

    Some(match rule {
        Rule::Required => format!("{} is required", label),
        Rule::Email => format!("{} must be a valid email address", label),
        Rule::Numeric => format!("{} must be a number", label),
        Rule::Phone => format!("{} must be a valid phone number", label),
        Rule::MinLen(min) => format!("{} must be at least {} characters", label, min),
        Rule::Role => format!("{} is not a recognised role", label),
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !value.contains(char::is_whitespace)
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

/// 10 to 15 digits once spaces, dashes, dots, parentheses and a leading `+` are removed
fn is_phone(value: &str) -> bool {
    let value = value.trim();
    let value = value.strip_prefix('+').unwrap_or(value);
    let mut digits = 0;
    for c in value.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return false,
        }
    }
    (10..=15).contains(&digits)
}
