//! gRPC client for user-service.

use chrono::{DateTime, Utc};
use tonic::{
    metadata::MetadataValue,
    transport::{Channel, Endpoint},
    Request,
};
use tracing::debug;

use common::{AppError, AppResult, GrpcClientConfig};
use domain::{ListUsersParams, Pagination, User};
use proto::user::{
    user_service_client::UserServiceClient as ProtoUserServiceClient, CreateUserRequest,
    DeleteUserRequest, GetUserRequest, ListUsersRequest, UpdateUserRequest, UserResponse,
};

/// Metadata key carrying the original caller's address.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// gRPC client wrapper for user-service.
///
/// Every call forwards the caller's address so user-service throttles the
/// real client rather than the gateway.
pub struct UserClient {
    client: ProtoUserServiceClient<Channel>,
    endpoint: Endpoint,
}

impl UserClient {
    /// Build a client for user-service. The channel connects on first use.
    pub fn connect(config: &GrpcClientConfig) -> Result<Self, tonic::transport::Error> {
        debug!("Connecting to user-service at {}", config.endpoint);
        let endpoint = Endpoint::from_shared(config.endpoint.clone())?
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout());
        let client = ProtoUserServiceClient::new(endpoint.connect_lazy());
        Ok(Self { client, endpoint })
    }

    /// Create a user and return its id.
    pub async fn create_user(&self, name: String, email: String, caller: &str) -> AppResult<i64> {
        let request = forwarded(CreateUserRequest { name, email }, caller);

        let mut client = self.client.clone();
        let response = client.create_user(request).await.map_err(AppError::from)?;
        Ok(response.into_inner().id)
    }

    /// Get user by ID.
    pub async fn get_user(&self, id: i64, caller: &str) -> AppResult<User> {
        let request = forwarded(GetUserRequest { id }, caller);

        let mut client = self.client.clone();
        let response = client.get_user(request).await.map_err(AppError::from)?;
        proto_to_user(response.into_inner())
    }

    /// Update name and/or email.
    pub async fn update_user(
        &self,
        id: i64,
        name: Option<String>,
        email: Option<String>,
        caller: &str,
    ) -> AppResult<i64> {
        let request = forwarded(UpdateUserRequest { id, name, email }, caller);

        let mut client = self.client.clone();
        let response = client.update_user(request).await.map_err(AppError::from)?;
        Ok(response.into_inner().id)
    }

    /// Permanently delete a user.
    pub async fn delete_user(&self, id: i64, caller: &str) -> AppResult<i64> {
        let request = forwarded(DeleteUserRequest { id }, caller);

        let mut client = self.client.clone();
        let response = client.delete_user(request).await.map_err(AppError::from)?;
        Ok(response.into_inner().id)
    }

    /// Search users, one page at a time.
    pub async fn list_users(
        &self,
        params: ListUsersParams,
        caller: &str,
    ) -> AppResult<(Vec<User>, Pagination)> {
        let request = forwarded(
            ListUsersRequest {
                query: params.query,
                page: params.page,
                limit: params.limit,
            },
            caller,
        );

        let mut client = self.client.clone();
        let response = client.list_users(request).await.map_err(AppError::from)?;
        let proto = response.into_inner();

        let pagination = proto
            .pagination
            .map(|p| Pagination {
                page: p.page,
                limit: p.limit,
                total: p.total,
                total_pages: p.total_pages,
            })
            .ok_or_else(|| AppError::internal("Missing pagination from user-service"))?;
        let users = proto
            .users
            .into_iter()
            .map(proto_to_user)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((users, pagination))
    }

    /// Open a fresh connection to check that user-service is reachable.
    pub async fn ping(&self) -> AppResult<()> {
        self.endpoint
            .connect()
            .await
            .map(|_| ())
            .map_err(|e| AppError::service_unavailable(e.to_string()))
    }
}

/// Wrap a message, attaching the caller's address as metadata.
fn forwarded<T>(message: T, caller: &str) -> Request<T> {
    let mut request = Request::new(message);
    if let Ok(value) = MetadataValue::try_from(caller) {
        request.metadata_mut().insert(FORWARDED_FOR, value);
    }
    request
}

fn parse_timestamp(value: &str, field: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::internal(format!("Invalid {} from user-service", field)))
}

/// Convert proto UserResponse to domain User.
fn proto_to_user(proto: UserResponse) -> AppResult<User> {
    Ok(User {
        id: proto.id,
        created_at: parse_timestamp(&proto.created_at, "created_at")?,
        updated_at: parse_timestamp(&proto.updated_at, "updated_at")?,
        name: proto.name,
        email: proto.email,
    })
}
