//! SQL hardening for the queries issued by the profiler.
//!
//! Column names come straight from the source schema and target values come
//! straight from the data, so every identifier and literal spliced into a
//! query goes through [`SqlSecurity`].

use datafusion::common::TableReference;

use crate::error::{ProfileError, Result};

/// Maximum identifier length accepted in generated SQL.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Maximum literal length accepted in generated SQL.
const MAX_LITERAL_LENGTH: usize = 4096;

/// SQL identifier and literal escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and escapes a SQL identifier (a column name).
    ///
    /// The identifier is wrapped in double quotes with internal quotes doubled,
    /// so names containing spaces or punctuation stay usable while being
    /// impossible to break out of.
    ///
    /// # Examples
    /// ```rust
    /// use term_profile::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("customer_id").unwrap(), "\"customer_id\"");
    /// assert_eq!(SqlSecurity::escape_identifier("say \"hi\"").unwrap(), "\"say \"\"hi\"\"\"");
    /// assert!(SqlSecurity::escape_identifier("").is_err());
    /// assert!(SqlSecurity::escape_identifier(&"x".repeat(200)).is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;

        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Escapes a possibly qualified table reference such as `schema.table`.
    ///
    /// The reference is resolved the way DataFusion resolves registered table
    /// names: unquoted segments are lowercased, quoted ones keep their case.
    /// Each resolved segment is then escaped on its own.
    pub fn escape_table_reference(reference: &str) -> Result<String> {
        Self::validate_identifier(reference)?;
        let resolved = TableReference::from(reference);
        let parts = [resolved.catalog(), resolved.schema(), Some(resolved.table())]
            .into_iter()
            .flatten()
            .map(Self::escape_identifier)
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("."))
    }

    /// Validates a SQL identifier without escaping it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.is_empty() || identifier.trim().is_empty() {
            return Err(ProfileError::Security(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ProfileError::Security(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if identifier.chars().any(char::is_control) {
            return Err(ProfileError::Security(
                "SQL identifier cannot contain control characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Escapes a string literal, returning it wrapped in single quotes.
    ///
    /// ```rust
    /// use term_profile::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_literal("O'Brien").unwrap(), "'O''Brien'");
    /// ```
    pub fn escape_literal(value: &str) -> Result<String> {
        if value.len() > MAX_LITERAL_LENGTH {
            return Err(ProfileError::Security(format!(
                "SQL literal too long (max {MAX_LITERAL_LENGTH} characters)"
            )));
        }

        if value.contains('\0') {
            return Err(ProfileError::Security(
                "SQL literal cannot contain null bytes".to_string(),
            ));
        }

        Ok(format!("'{}'", value.replace('\'', "''")))
    }

    /// Renders a float as a SQL numeric literal, rejecting NaN and infinities.
    pub fn float_literal(value: f64) -> Result<String> {
        if !value.is_finite() {
            return Err(ProfileError::invalid_data(format!(
                "cannot render non-finite value {value} as a SQL literal"
            )));
        }
        Ok(format!("CAST({value:?} AS DOUBLE)"))
    }
}

/// Input validation utilities for configuration values.
pub struct InputValidator;

impl InputValidator {
    /// Validates that a threshold is within [0.0, 1.0].
    pub fn validate_threshold(value: f64, name: &str) -> Result<()> {
        if !(0.0..=1.0).contains(&value) || value.is_nan() {
            return Err(ProfileError::invalid_config(format!(
                "{name} must be between 0.0 and 1.0, got {value}"
            )));
        }
        Ok(())
    }

    /// Validates that a count is strictly positive.
    pub fn validate_positive(value: usize, name: &str) -> Result<()> {
        if value == 0 {
            return Err(ProfileError::invalid_config(format!(
                "{name} must be greater than zero"
            )));
        }
        Ok(())
    }
}
