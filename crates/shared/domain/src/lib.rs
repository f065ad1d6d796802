//! Domain layer - Core business entities and value objects.
//!
//! This crate contains pure domain logic with no infrastructure dependencies.
//! All types here are shared across the user service, its transports and the
//! gateway.

pub mod constants;
pub mod dto;
pub mod error;
pub mod pagination;
pub mod search;
pub mod user;

pub use constants::*;
pub use dto::{
    CreateUserRequest, ListUsersParams, ListUsersResponse, UpdateUserRequest, UserIdResponse,
};
pub use error::{DomainError, DomainResult};
pub use pagination::{ListQuery, PageRequest, Pagination};
pub use search::sanitize_search_query;
pub use user::{check, NewUser, User, UserChanges};
