//! Per-field value constraints from `ValidationRule`.

use crate::config::ValidationRule;
use crate::error::AppError;
use regex::Regex;
use serde_json::Value;

pub(crate) fn check_rule(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        check_format(col, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(AppError::Validation(format!("{} must be at most {} characters", col, max)));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(AppError::Validation(format!("{} must be at least {} characters", col, min)));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern)
                .map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    let Some(s) = v.as_str() else { return Ok(()) };
    match format.to_lowercase().as_str() {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                return Err(AppError::Validation(format!("{} must be a valid email", col)));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn length_and_pattern_rules() {
        let rule = ValidationRule {
            max_length: Some(4),
            pattern: Some("^[a-z]+$".into()),
            ..Default::default()
        };
        assert!(check_rule("code", &json!("abc"), &rule).is_ok());
        assert!(check_rule("code", &json!("abcde"), &rule).is_err());
        assert!(check_rule("code", &json!("AB"), &rule).is_err());
    }

    #[test]
    fn allowed_compares_numbers_by_value() {
        let rule = ValidationRule {
            allowed: Some(vec![json!(1.0), json!(2)]),
            ..Default::default()
        };
        assert!(check_rule("level", &json!(1), &rule).is_ok());
        assert!(check_rule("level", &json!(3), &rule).is_err());
    }

    #[test]
    fn null_skips_rules() {
        let rule = ValidationRule {
            format: Some("email".into()),
            ..Default::default()
        };
        assert!(check_rule("email", &Value::Null, &rule).is_ok());
        assert!(check_rule("email", &json!("nope"), &rule).is_err());
    }
}
