//! Identifier casing and allowlist validation
//!
//! Every synthesized table and column identifier passes through the
//! configured casing exactly once, and through [`validate_identifier`]
//! before it is interpolated into generated SQL. Values never take this
//! path - they are always bound as query parameters.

use crate::error::ProfileError;
use regex::Regex;
use std::sync::OnceLock;

/// Casing applied to every identifier the profile store emits
///
/// Fixed at construction; the same name always produces the same physical
/// identifier for the lifetime of a profiler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierCasing {
    /// Separator-word form, the default (`table_name`)
    #[default]
    Snake,

    /// Capitalized-concatenated form (`TableName`)
    Pascal,
}

impl IdentifierCasing {
    pub fn apply(&self, name: &str) -> String {
        match self {
            IdentifierCasing::Snake => name.to_string(),
            IdentifierCasing::Pascal => snake_to_pascal(name),
        }
    }
}

/// Names without separators pass through unchanged, which makes the
/// conversion idempotent.
fn snake_to_pascal(name: &str) -> String {
    if !name.contains('_') {
        return name.to_string();
    }

    name.split('_')
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect()
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

/// Validate a table or column identifier against the allowlist grammar
///
/// Accepts `ident` or dot-qualified `ident.ident` chains, where an ident is
/// `[A-Za-z_][A-Za-z0-9_]*`. Anything else is rejected before SQL is built.
pub fn validate_identifier(name: &str) -> Result<(), ProfileError> {
    let re = IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("identifier pattern is valid")
    });

    if re.is_match(name) {
        Ok(())
    } else {
        Err(ProfileError::InvalidIdentifier(name.to_string()))
    }
}
