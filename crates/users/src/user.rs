use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{RecordId, ValidationErrors};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_draft(draft: ValidatedUser, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            name: draft.name,
            email: draft.email,
            password: draft.password,
            age: draft.age,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update payload in place, bumping `updated_at`.
    pub fn apply_update(&mut self, draft: ValidatedUser, now: DateTime<Utc>) {
        self.name = draft.name;
        self.email = draft.email;
        self.password = draft.password;
        self.age = draft.age;
        self.updated_at = now;
    }
}

/// Unvalidated request body for user create/update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub age: Option<i64>,
}

/// Field-validated user payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: Option<u32>,
}

impl UserDraft {
    pub fn validate(self) -> Result<ValidatedUser, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.push("name", "Name is required");
        }
        if !looks_like_email(&self.email) {
            errors.push("email", "Invalid email address");
        }
        if self.password.len() < 6 {
            errors.push("password", "Password must be at least 6 characters long");
        }
        let age = match self.age {
            None => None,
            Some(a) if a > 0 && a <= u32::MAX as i64 => Some(a as u32),
            Some(_) => {
                errors.push("age", "Age must be a positive integer");
                None
            }
        };

        errors.finish(ValidatedUser {
            name: self.name,
            email: self.email,
            password: self.password,
            age,
        })
    }
}

fn looks_like_email(s: &str) -> bool {
    // Deliberately shallow: local@domain with a dot in the domain part.
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> UserDraft {
        UserDraft {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "hunter22".to_string(),
            age: Some(36),
        }
    }

    #[test]
    fn valid_draft_passes() {
        let v = draft().validate().unwrap();
        assert_eq!(v.age, Some(36));
    }

    #[test]
    fn short_password_and_bad_email_both_reported() {
        let mut d = draft();
        d.email = "not-an-email".to_string();
        d.password = "abc".to_string();

        let errors = d.validate().unwrap_err();
        let fields: Vec<_> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
    }

    #[test]
    fn negative_age_rejected_but_absent_age_allowed() {
        let mut d = draft();
        d.age = Some(-1);
        assert!(d.validate().is_err());

        let mut d = draft();
        d.age = None;
        assert_eq!(d.validate().unwrap().age, None);
    }
}
