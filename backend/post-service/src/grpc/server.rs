// gRPC service implementation for post service
use crate::events::{format_timestamp, PostEvent};
use crate::grpc::proto;
use crate::grpc::proto::post_service_server::{
    PostService as PostServiceGrpc, PostServiceServer,
};
use crate::metrics::{RequestGuard, POST_STREAM_SUBSCRIBERS};
use crate::models::Post;
use crate::services::PostService;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

/// Per-subscriber buffer between the event bus and the gRPC stream
const STREAM_BUFFER: usize = 64;

/// PostService gRPC implementation
#[derive(Clone)]
pub struct PostServiceImpl {
    service: Arc<PostService>,
}

impl PostServiceImpl {
    pub fn new(service: Arc<PostService>) -> Self {
        Self { service }
    }
}

pub fn convert_post_to_proto(post: &Post) -> proto::Post {
    proto::Post {
        id: post.id.to_string(),
        content: post.content.clone(),
        author_id: post.author_id.clone(),
        author_name: post.author_name.clone(),
        image_url: post.image_url.clone(),
        likes: post.likes,
        created_at: format_timestamp(&post.created_at),
    }
}

/// Post-shaped notification for a stream subscriber.
///
/// Liked events only carry the id and the new count; the other fields stay empty.
pub fn convert_event_to_proto(event: &PostEvent) -> proto::Post {
    match event {
        PostEvent::Created(e) => proto::Post {
            id: e.post_id.clone(),
            content: e.content.clone(),
            author_id: e.author_id.clone(),
            author_name: e.author_name.clone(),
            image_url: e.image_url.clone(),
            likes: e.likes,
            created_at: e.timestamp.clone(),
        },
        PostEvent::Liked(e) => proto::Post {
            id: e.post_id.clone(),
            likes: e.likes,
            ..Default::default()
        },
    }
}

fn to_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or_else(|_| {
        tracing::warn!("value exceeded i32::MAX: {}", value);
        i32::MAX
    })
}

#[tonic::async_trait]
impl PostServiceGrpc for PostServiceImpl {
    /// List posts, newest first
    async fn list_posts(
        &self,
        request: Request<proto::ListPostsRequest>,
    ) -> Result<Response<proto::ListPostsResponse>, Status> {
        let guard = RequestGuard::new("ListPosts");
        let req = request.into_inner();

        tracing::debug!(limit = req.limit, offset = req.offset, "gRPC: ListPosts");

        match self
            .service
            .list_posts(Some(req.limit as i64), Some(req.offset as i64))
            .await
        {
            Ok(page) => {
                guard.complete("0");
                Ok(Response::new(proto::ListPostsResponse {
                    posts: page.posts.iter().map(convert_post_to_proto).collect(),
                    total: to_i32(page.total),
                }))
            }
            Err(e) => {
                guard.complete(e.grpc_code());
                Err(e.into())
            }
        }
    }

    /// Get a post by ID
    async fn get_post(
        &self,
        request: Request<proto::GetPostRequest>,
    ) -> Result<Response<proto::Post>, Status> {
        let guard = RequestGuard::new("GetPost");
        let req = request.into_inner();

        tracing::debug!("gRPC: Getting post with ID: {}", req.id);

        match self.service.get_post(&req.id).await {
            Ok(post) => {
                guard.complete("0");
                Ok(Response::new(convert_post_to_proto(&post)))
            }
            Err(e) => {
                guard.complete(e.grpc_code());
                Err(e.into())
            }
        }
    }

    /// Create a new post
    async fn create_post(
        &self,
        request: Request<proto::CreatePostRequest>,
    ) -> Result<Response<proto::Post>, Status> {
        let guard = RequestGuard::new("CreatePost");
        let req = request.into_inner();

        tracing::debug!("gRPC: Creating post from user: {}", req.author_id);

        match self
            .service
            .create_post(&req.content, &req.author_id, req.image_url)
            .await
        {
            Ok(post) => {
                guard.complete("0");
                Ok(Response::new(convert_post_to_proto(&post)))
            }
            Err(e) => {
                guard.complete(e.grpc_code());
                Err(e.into())
            }
        }
    }

    /// Like a post
    async fn like_post(
        &self,
        request: Request<proto::LikePostRequest>,
    ) -> Result<Response<proto::Post>, Status> {
        let guard = RequestGuard::new("LikePost");
        let req = request.into_inner();

        tracing::debug!("gRPC: User {} liking post {}", req.user_id, req.post_id);

        match self.service.like_post(&req.post_id, &req.user_id).await {
            Ok(post) => {
                guard.complete("0");
                Ok(Response::new(convert_post_to_proto(&post)))
            }
            Err(e) => {
                guard.complete(e.grpc_code());
                Err(e.into())
            }
        }
    }

    type StreamPostsStream = ReceiverStream<Result<proto::Post, Status>>;

    /// Forward post events until the client goes away
    async fn stream_posts(
        &self,
        _request: Request<proto::StreamPostsRequest>,
    ) -> Result<Response<Self::StreamPostsStream>, Status> {
        let guard = RequestGuard::new("StreamPosts");

        let mut events = match self.service.subscribe().await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Failed to subscribe to post events: {}", e);
                guard.complete("13");
                return Err(Status::internal("failed to subscribe to posts"));
            }
        };
        guard.complete("0");

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        POST_STREAM_SUBSCRIBERS.inc();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        tracing::debug!("StreamPosts client disconnected");
                        break;
                    }
                    next = events.next() => match next {
                        Some(event) => {
                            if tx.send(Ok(convert_event_to_proto(&event))).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            tracing::warn!("post event subscription ended");
                            break;
                        }
                    }
                }
            }
            // Dropping `events` here releases the bus subscription
            POST_STREAM_SUBSCRIBERS.dec();
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// Run the gRPC server until `shutdown` fires
pub async fn start_grpc_server(
    addr: std::net::SocketAddr,
    service: Arc<PostService>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tonic::transport::Server;
    use tonic_health::server::health_reporter;

    tracing::info!("Starting gRPC server at {}", addr);

    let grpc_service = PostServiceImpl::new(service);

    // Health service
    let (mut health, health_service) = health_reporter();
    health
        .set_serving::<PostServiceServer<PostServiceImpl>>()
        .await;

    // Server-side correlation-id extractor interceptor
    fn server_interceptor(
        mut req: tonic::Request<()>,
    ) -> Result<tonic::Request<()>, tonic::Status> {
        if let Some(val) = req.metadata().get("correlation-id") {
            if let Ok(s) = val.to_str() {
                let correlation_id = s.to_string();
                req.extensions_mut().insert::<String>(correlation_id);
            }
        }
        Ok(req)
    }

    Server::builder()
        .add_service(health_service)
        .add_service(PostServiceServer::with_interceptor(
            grpc_service,
            server_interceptor,
        ))
        .serve_with_shutdown(addr, async move {
            // Wait for shutdown notification; ignore errors if sender dropped.
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
