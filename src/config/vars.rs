//! Environment variable interpolation for config files.
//!
//! Supports the following syntax:
//! - `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`
//!
//! Only the braced form is recognised. A bare `$name` is left as is, since
//! path queries and templates use `$` on their own (`$.metrics`, `$schema`).
//! The `{stream_name}` style placeholders of the naming scheme have no `$`
//! and pass through untouched.

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # Escape sequence $$
        |
        \$\{                           # Opening ${
            ([A-Za-z_][A-Za-z0-9_]*)   # Variable name (group 1)
            (?:
                (:?-)                  # :- or - (group 2)
                ([^}]*)                # Default value (group 3)
            )?
        \}
        ",
    )
    .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Every problem found, so all missing variables are reported at once.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables in the given text.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();
    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| substitute(caps, &mut errors))
        .into_owned();
    InterpolationResult { text, errors }
}

fn substitute(caps: &Captures, errors: &mut Vec<String>) -> String {
    let full_match = &caps[0];
    if full_match == "$$" {
        return "$".to_string();
    }

    let var_name = caps.get(1).map_or("", |m| m.as_str());
    let colon_default = caps.get(2).is_some_and(|m| m.as_str() == ":-");
    let default_value = caps.get(3).map(|m| m.as_str());

    match env::var(var_name) {
        // Values end up inside YAML scalars; a newline could inject keys
        Ok(value) if value.contains('\n') || value.contains('\r') => {
            errors.push(format!(
                "environment variable '{var_name}' contains newlines, which is not allowed"
            ));
            full_match.to_string()
        }
        Ok(value) if value.is_empty() && colon_default => {
            default_value.unwrap_or_default().to_string()
        }
        Ok(value) => value,
        Err(_) => match default_value {
            Some(default) => default.to_string(),
            None => {
                errors.push(format!("environment variable '{var_name}' is not set"));
                full_match.to_string()
            }
        },
    }
}
