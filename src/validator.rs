// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Contact form validator.
//!
//! Every field is checked, so a single response can list all problems:
//! - `name`: at least 2 characters after trimming
//! - `email`: must contain `@`
//! - `subject`: at least 5 characters after trimming
//! - `message`: at least 10 characters after trimming
//!
//! The e-mail rule is intentionally weak. Tightening it is a product
//! decision, and `test_email_rule_only_requires_at_sign` pins the current
//! behaviour.

use crate::config::ValidationConfig;
use crate::submission::ContactForm;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Form fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Email,
    Subject,
    Message,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Subject => "subject",
            Field::Message => "message",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Email => "Email",
            Field::Subject => "Subject",
            Field::Message => "Message",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("{} must be at least {min} characters", .field.label())]
    TooShort { field: Field, min: usize },

    #[error("Please provide a valid email address")]
    InvalidFormat { field: Field },
}

impl FieldError {
    pub fn field(&self) -> Field {
        match self {
            FieldError::TooShort { field, .. } | FieldError::InvalidFormat { field } => *field,
        }
    }
}

/// Every violation found in one form, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<Field, FieldError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: Field) -> Option<&FieldError> {
        self.errors.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.errors.keys().copied()
    }

    /// The violation shown when only one message fits.
    pub fn first(&self) -> Option<&FieldError> {
        self.errors.values().next()
    }

    fn insert(&mut self, error: FieldError) {
        self.errors.insert(error.field(), error);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in self.errors.values() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
            first = false;
        }
        Ok(())
    }
}

/// Serializes as `{ "name": "Name must be ...", ... }`.
impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.errors.len()))?;
        for (field, error) in &self.errors {
            map.serialize_entry(field.as_str(), &error.to_string())?;
        }
        map.end()
    }
}

/// Contact form validator.
#[derive(Debug, Clone, Default)]
pub struct ContactValidator {
    config: ValidationConfig,
}

impl ContactValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Check all four fields. Returns `Ok(())` when the form is acceptable.
    pub fn validate(&self, form: &ContactForm) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let checks = [
            check_min_chars(Field::Name, &form.name, self.config.name_min_chars),
            check_email(&form.email),
            check_min_chars(Field::Subject, &form.subject, self.config.subject_min_chars),
            check_min_chars(Field::Message, &form.message, self.config.message_min_chars),
        ];
        for error in checks.into_iter().flatten() {
            errors.insert(error);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            debug!(fields = ?errors.fields().collect::<Vec<_>>(), "Contact form rejected");
            Err(errors)
        }
    }
}

fn check_min_chars(field: Field, value: &str, min: usize) -> Option<FieldError> {
    (value.trim().chars().count() < min).then_some(FieldError::TooShort { field, min })
}

fn check_email(value: &str) -> Option<FieldError> {
    (!value.contains('@')).then_some(FieldError::InvalidFormat {
        field: Field::Email,
    })
}
