//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{DomainError, DomainResult};

/// User domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    /// Server-assigned identifier
    #[cfg_attr(feature = "openapi", schema(example = 42))]
    pub id: i64,
    /// Display name (3 to 100 characters)
    #[cfg_attr(feature = "openapi", schema(example = "Jane Doe"))]
    pub name: String,
    /// Unique email address
    #[cfg_attr(feature = "openapi", schema(example = "jane@example.com"))]
    pub email: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Apply a partial update. Identity fields are never touched.
    pub fn apply(&mut self, changes: &UserChanges) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(email) = &changes.email {
            self.email = email.clone();
        }
    }
}

/// User creation data
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 100, message = "Name must be between 3 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

impl NewUser {
    /// Build creation data, normalizing whitespace and email case.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: normalize_email(&email.into()),
        }
    }

    /// Validate and return self.
    pub fn validated(self) -> DomainResult<Self> {
        check(&self)?;
        Ok(self)
    }
}

/// Partial user update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
pub struct UserChanges {
    #[validate(length(min = 3, max = 100, message = "Name must be between 3 and 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl UserChanges {
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self {
            name: name.map(|n| n.trim().to_string()),
            email: email.map(|e| normalize_email(&e)),
        }
    }

    /// Check if no field would change
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// Validate and return self.
    pub fn validated(self) -> DomainResult<Self> {
        if self.is_empty() {
            return Err(DomainError::validation("At least one of name or email must be provided"));
        }
        check(&self)?;
        Ok(self)
    }
}

/// Validate a payload, reporting the first violation by field name.
pub fn check<T: Validate>(value: &T) -> DomainResult<()> {
    value.validate().map_err(|errors| {
        let message = errors
            .field_errors()
            .into_iter()
            .min_by(|a, b| a.0.cmp(&b.0))
            .and_then(|(_, errors)| errors.first())
            .and_then(|error| error.message.as_ref())
            .map(|msg| msg.to_string())
            .unwrap_or_else(|| "Validation failed".to_string());
        DomainError::validation(message)
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
