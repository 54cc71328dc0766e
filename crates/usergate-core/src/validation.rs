//! Validation error formatting.
//!
//! Validated structs declare, once, how their field identifiers are presented
//! to users. Formatting a [`ValidationErrors`] then becomes a plain lookup in
//! that table; nothing is derived from the struct at request time.
//!
//! ```ignore
//! static NAMES: LazyLock<FieldNames> =
//!     LazyLock::new(|| FieldNames::new(&[("max_size", "max_file_size")]));
//!
//! let map = format_validation_errors(&errors, &NAMES);
//! // {"max_file_size": "Value is out of range"}
//! ```

use std::collections::{BTreeMap, HashMap};

use validator::{ValidationError, ValidationErrors};

/// Static mapping from a validated field identifier to its user-facing name.
#[derive(Debug, Clone, Default)]
pub struct FieldNames {
    names: HashMap<&'static str, &'static str>,
}

impl FieldNames {
    pub fn new(pairs: &[(&'static str, &'static str)]) -> Self {
        Self {
            names: pairs.iter().copied().collect(),
        }
    }

    /// User-facing name for `field`, or the identifier itself when unmapped.
    pub fn display<'a>(&self, field: &'a str) -> &'a str {
        match self.names.get(field) {
            Some(name) => name,
            None => field,
        }
    }
}

/// Flatten field errors into `{user-facing field name: message}`.
///
/// Only the first error per field is reported.
pub fn format_validation_errors(
    errors: &ValidationErrors,
    names: &FieldNames,
) -> BTreeMap<String, String> {
    errors
        .field_errors()
        .iter()
        .filter_map(|(field, errors)| {
            let field: &str = field;
            errors
                .first()
                .map(|error| (names.display(field).to_string(), error_message(error)))
        })
        .collect()
}

/// Render a formatted map as a single line, e.g. for startup failures.
pub fn summarize(formatted: &BTreeMap<String, String>) -> String {
    formatted
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn error_message(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    match error.code.as_ref() {
        "required" => "This field is required",
        "email" => "Invalid email format",
        "length" => "Value has an invalid length",
        "range" => "Value is out of range",
        _ => "Invalid value",
    }
    .to_string()
}
