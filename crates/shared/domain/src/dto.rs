//! Request and response bodies shared by the REST surfaces.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::pagination::{ListQuery, Pagination};
use crate::user::{NewUser, User, UserChanges};

/// Create user request
#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateUserRequest {
    /// Display name (3 to 100 characters)
    #[cfg_attr(feature = "openapi", schema(example = "Jane Doe"))]
    pub name: String,
    /// Unique email address
    #[cfg_attr(feature = "openapi", schema(example = "jane@example.com"))]
    pub email: String,
}

/// Validated after the same normalization the service applies.
impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        NewUser::new(self.name.clone(), self.email.clone()).validate()
    }
}

/// Partial update request. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateUserRequest {
    #[cfg_attr(feature = "openapi", schema(example = "Jane Smith"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "openapi", schema(example = "jane.smith@example.com"))]
    pub email: Option<String>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        UserChanges::new(self.name.clone(), self.email.clone()).validate()
    }
}

/// Query string of the list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ListUsersParams {
    /// Case-insensitive substring of name or email
    pub query: Option<String>,
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Page size, at most 100
    pub limit: Option<u64>,
}

impl From<ListUsersParams> for ListQuery {
    fn from(params: ListUsersParams) -> Self {
        ListQuery::new(params.query, params.page, params.limit)
    }
}

/// Identifier of the user affected by a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserIdResponse {
    #[cfg_attr(feature = "openapi", schema(example = 42))]
    pub id: i64,
}

/// One page of users
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListUsersResponse {
    pub users: Vec<User>,
    pub pagination: Pagination,
}
