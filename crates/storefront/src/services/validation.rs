//! Request validation errors.
//!
//! Errors are collected per field and serialized as
//! `{"fieldErrors": {"field": ["message", ...]}, "formErrors": [...]}`, the
//! shape the storefront UI reads from `details`.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Message for a missing required field.
pub const REQUIRED: &str = "Required";

/// Validation failures collected from one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrors {
    pub field_errors: BTreeMap<String, Vec<String>>,
    pub form_errors: Vec<String>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single form-level error.
    #[must_use]
    pub fn form(message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add_form(message);
        errors
    }

    /// A single field error.
    #[must_use]
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.field_errors
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.form_errors.push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty() && self.form_errors.is_empty()
    }

    /// `Ok(value)` if nothing was collected.
    ///
    /// # Errors
    ///
    /// Returns `self` if any error was collected.
    pub fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.form_errors.clone();
        for (field, messages) in &self.field_errors {
            parts.push(format!("{field}: {}", messages.join(", ")));
        }
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Trim a required text field and check its length in characters.
pub fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    if value.chars().count() > max {
        errors.add(field, format!("Must be at most {max} characters"));
        return None;
    }
    Some(value.to_owned())
}

/// Trim an optional text field. Empty means absent.
pub fn optional_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    if value.chars().count() > max {
        errors.add(field, format!("Must be at most {max} characters"));
        return None;
    }
    Some(value.to_owned())
}

/// Check an integer quantity, defaulting to 1 when absent.
pub fn quantity(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<i64>,
    max: i64,
) -> Option<i32> {
    let value = value.unwrap_or(1);
    if !(1..=max).contains(&value) {
        errors.add(field, format!("Must be between 1 and {max}"));
        return None;
    }
    i32::try_from(value).ok()
}
