//! gRPC surface of the post service
//!
//! - `server`: PostService implementation, proto conversions and server startup

pub mod server;

// Generated proto code
pub mod proto {
    pub mod v1 {
        tonic::include_proto!("post_service.v1");
    }
    pub use v1::*;
}

pub use server::*;
