//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// Validation
// =============================================================================

/// Minimum user name length (in characters)
pub const MIN_NAME_LENGTH: usize = 3;

/// Maximum user name length (in characters)
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum accepted length of a list search string
pub const MAX_SEARCH_LENGTH: usize = 100;

// =============================================================================
// Pagination
// =============================================================================

/// Default starting page number (1-indexed)
pub const DEFAULT_PAGE: u64 = 1;

/// Default number of items per page
pub const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Maximum allowed items per page to prevent excessive queries
pub const MAX_PAGE_LIMIT: u64 = 100;
