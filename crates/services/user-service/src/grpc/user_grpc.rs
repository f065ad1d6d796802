//! gRPC implementation for UserService.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::service::UserService;
use domain::{ListQuery, Pagination};
use proto::user::{
    user_service_server::UserService as UserServiceProto, CreateUserRequest, CreateUserResponse,
    DeleteUserRequest, DeleteUserResponse, GetUserRequest, ListUsersRequest, ListUsersResponse,
    Pagination as PaginationProto, UpdateUserRequest, UpdateUserResponse, UserResponse,
};

/// gRPC service wrapper for UserService.
pub struct UserGrpcService {
    service: Arc<dyn UserService>,
}

impl UserGrpcService {
    /// Create a new gRPC service wrapper.
    pub fn new(service: Arc<dyn UserService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl UserServiceProto for UserGrpcService {
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<CreateUserResponse>, Status> {
        let req = request.into_inner();

        let id = self
            .service
            .create_user(req.name, req.email)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(CreateUserResponse { id }))
    }

    async fn get_user(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let req = request.into_inner();

        let user = self.service.get_user(req.id).await.map_err(Status::from)?;
        Ok(Response::new(user_to_proto(&user)))
    }

    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<UpdateUserResponse>, Status> {
        let req = request.into_inner();

        let id = self
            .service
            .update_user(req.id, req.name, req.email)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(UpdateUserResponse { id }))
    }

    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<DeleteUserResponse>, Status> {
        let req = request.into_inner();

        let id = self.service.delete_user(req.id).await.map_err(Status::from)?;
        Ok(Response::new(DeleteUserResponse { id }))
    }

    async fn list_users(
        &self,
        request: Request<ListUsersRequest>,
    ) -> Result<Response<ListUsersResponse>, Status> {
        let req = request.into_inner();
        let query = ListQuery::new(req.query, req.page, req.limit);

        let (users, pagination) = self.service.list_users(query).await.map_err(Status::from)?;
        Ok(Response::new(ListUsersResponse {
            users: users.iter().map(user_to_proto).collect(),
            pagination: Some(pagination_to_proto(pagination)),
        }))
    }
}

/// Convert domain User to proto UserResponse.
fn user_to_proto(user: &domain::User) -> UserResponse {
    UserResponse {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        created_at: user.created_at.to_rfc3339(),
        updated_at: user.updated_at.to_rfc3339(),
    }
}

fn pagination_to_proto(pagination: Pagination) -> PaginationProto {
    PaginationProto {
        page: pagination.page,
        limit: pagination.limit,
        total: pagination.total,
        total_pages: pagination.total_pages,
    }
}
