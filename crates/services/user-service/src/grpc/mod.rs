//! gRPC transport.

mod rate_limit;
mod user_grpc;

pub use rate_limit::{RateLimitLayer, RateLimitService};
pub use user_grpc::UserGrpcService;
