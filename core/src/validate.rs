//! Client-side length and presence checks for todo payloads.
//!
//! Violations are reported before any request is built, so a rejected
//! payload never reaches the network.

use crate::error::{ApiError, Field, FieldViolation};
use crate::types::{CreateTodo, UpdateTodo, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};

pub fn check_create(input: &CreateTodo) -> Result<(), ApiError> {
    let mut violations = Vec::new();
    check_title(&input.title, &mut violations);
    check_description(&input.description, &mut violations);
    finish(violations)
}

pub fn check_update(input: &UpdateTodo) -> Result<(), ApiError> {
    let mut violations = Vec::new();
    if let Some(title) = &input.title {
        check_title(title, &mut violations);
    }
    if let Some(description) = &input.description {
        check_description(description, &mut violations);
    }
    finish(violations)
}

fn check_title(title: &str, violations: &mut Vec<FieldViolation>) {
    if title.trim().is_empty() {
        violations.push(FieldViolation::new(Field::Title, "Title is required"));
    } else if title.chars().count() > MAX_TITLE_LEN {
        violations.push(FieldViolation::new(
            Field::Title,
            format!("Title must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
}

fn check_description(description: &str, violations: &mut Vec<FieldViolation>) {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        violations.push(FieldViolation::new(
            Field::Description,
            format!("Description must be at most {MAX_DESCRIPTION_LEN} characters"),
        ));
    }
}

fn finish(violations: Vec<FieldViolation>) -> Result<(), ApiError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violations(result: Result<(), ApiError>) -> Vec<FieldViolation> {
        match result {
            Err(ApiError::Validation(v)) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn title_boundary_is_200_characters() {
        assert!(check_create(&CreateTodo::new("a".repeat(200))).is_ok());
        let v = violations(check_create(&CreateTodo::new("a".repeat(201))));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].field, Field::Title);
    }

    #[test]
    fn description_boundary_is_1000_characters() {
        let ok = CreateTodo::new("t").with_description("d".repeat(1000));
        assert!(check_create(&ok).is_ok());
        let too_long = CreateTodo::new("t").with_description("d".repeat(1001));
        assert_eq!(violations(check_create(&too_long))[0].field, Field::Description);
    }

    #[test]
    fn whitespace_title_is_rejected() {
        let v = violations(check_create(&CreateTodo::new("   \t")));
        assert_eq!(v[0].message, "Title is required");
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(check_create(&CreateTodo::new("é".repeat(200))).is_ok());
    }

    #[test]
    fn update_checks_only_present_fields() {
        assert!(check_update(&UpdateTodo::completed(true)).is_ok());
        let bad = UpdateTodo {
            title: Some(String::new()),
            description: Some("d".repeat(1001)),
            completed: None,
        };
        assert_eq!(violations(check_update(&bad)).len(), 2);
    }
}
