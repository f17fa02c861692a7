//! Configuration validation.
//!
//! # Responsibilities
//! - Normalise the route path (leading `/`) and check it can be routed
//! - Parse human-readable byte sizes ("5mb", "100kb", "1024")
//! - Check CORS origins are usable header values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure: AppConfig → Result<(), Vec<ValidationError>>

use axum::http::HeaderValue;

use crate::config::schema::{AppConfig, CorsConfig};
use crate::http::path::{to_route_pattern, PathError};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("node url is missing")]
    MissingPath,

    #[error("node url cannot be routed: {0}")]
    InvalidPath(#[from] PathError),

    #[error("invalid size '{0}'")]
    InvalidSize(String),

    #[error("invalid CORS origin '{0}'")]
    InvalidOrigin(String),
}

/// Prefix a route path with `/` when the user left it out.
pub fn normalize_path(url: &str) -> Result<String, ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::MissingPath);
    }
    if url.starts_with('/') {
        Ok(url.to_string())
    } else {
        Ok(format!("/{url}"))
    }
}

/// Parse a byte size such as `5mb`, `1.5kb` or `1024` (binary multiples).
pub fn parse_byte_size(value: &str) -> Result<usize, ValidationError> {
    let invalid = || ValidationError::InvalidSize(value.to_string());
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let multiplier: f64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1.0,
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        "tb" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return Err(invalid()),
    };
    let number: f64 = number.parse().map_err(|_| invalid())?;

    Ok((number * multiplier).floor() as usize)
}

fn validate_cors(cors: &CorsConfig, errors: &mut Vec<ValidationError>) {
    for origin in &cors.origin {
        if origin != "*" && HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }
}

/// Validate a configuration file, collecting every problem.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match normalize_path(&config.node.url) {
        Ok(url) => {
            if let Err(e) = to_route_pattern(&url) {
                errors.push(e.into());
            }
        }
        Err(e) => errors.push(e),
    }

    let settings = &config.settings;
    let sizes = [
        Some(&settings.max_body_size),
        settings.raw_body_max_size.as_ref(),
        Some(&settings.text_body_max_size),
    ];
    for size in sizes.into_iter().flatten() {
        if let Err(e) = parse_byte_size(size) {
            errors.push(e);
        }
    }
    if let Some(cors) = &config.settings.cors {
        validate_cors(cors, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_gets_leading_slash() {
        assert_eq!(normalize_path("hook").unwrap(), "/hook");
        assert_eq!(normalize_path("/hook").unwrap(), "/hook");
        assert_eq!(normalize_path("  "), Err(ValidationError::MissingPath));
    }

    #[test]
    fn byte_sizes() {
        assert_eq!(parse_byte_size("5mb").unwrap(), 5 * 1024 * 1024);
        assert_eq!(parse_byte_size("100kb").unwrap(), 100 * 1024);
        assert_eq!(parse_byte_size("1.5KB").unwrap(), 1536);
        assert_eq!(parse_byte_size("1024").unwrap(), 1024);
        assert_eq!(parse_byte_size("12 b").unwrap(), 12);
        assert!(parse_byte_size("mb").is_err());
        assert!(parse_byte_size("5 parsecs").is_err());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = AppConfig::default();
        config.settings.max_body_size = "huge".into();
        config.settings.cors = Some(CorsConfig {
            origin: vec!["bad\norigin".into()],
            ..CorsConfig::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], ValidationError::MissingPath);
    }

    #[test]
    fn unroutable_path_and_optional_sizes() {
        let mut config = AppConfig::default();
        config.node.url = "files/:".into();
        config.settings.raw_body_max_size = Some("big".into());
        config.settings.text_body_max_size = "10kb".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidPath(PathError::EmptyParam(":".into())),
                ValidationError::InvalidSize("big".into()),
            ]
        );

        config.node.url = "files/*".into();
        config.settings.raw_body_max_size = None;
        assert!(validate_config(&config).is_ok());
    }
}
