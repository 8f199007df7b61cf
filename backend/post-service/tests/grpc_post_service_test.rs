//! gRPC handler tests for PostServiceImpl
//!
//! Calls the tonic trait methods directly, without a transport.

mod common;

use common::harness;
use futures::StreamExt;
use post_service::grpc::proto;
use post_service::grpc::proto::post_service_server::PostService as _;
use post_service::grpc::PostServiceImpl;
use std::time::Duration;
use tonic::{Code, Request};

fn create_request(content: &str, author_id: &str) -> Request<proto::CreatePostRequest> {
    Request::new(proto::CreatePostRequest {
        content: content.to_string(),
        author_id: author_id.to_string(),
        image_url: None,
    })
}

#[tokio::test]
async fn create_get_and_like_over_grpc() {
    let h = harness();
    let grpc = PostServiceImpl::new(h.service.clone());

    let created = grpc
        .create_post(create_request("hello", "u1"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(created.author_name, "User u1");
    assert_eq!(created.likes, 0);
    assert!(created.created_at.ends_with('Z'));

    let fetched = grpc
        .get_post(Request::new(proto::GetPostRequest {
            id: created.id.clone(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(fetched, created);

    let like = |user: &str| {
        Request::new(proto::LikePostRequest {
            post_id: created.id.clone(),
            user_id: user.to_string(),
        })
    };

    let liked = grpc.like_post(like("u2")).await.unwrap().into_inner();
    assert_eq!(liked.likes, 1);

    let status = grpc.like_post(like("u2")).await.unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);

    let liked = grpc.like_post(like("u3")).await.unwrap().into_inner();
    assert_eq!(liked.likes, 2);
}

#[tokio::test]
async fn error_kinds_map_to_status_codes() {
    let h = harness();
    let grpc = PostServiceImpl::new(h.service.clone());

    let status = grpc
        .get_post(Request::new(proto::GetPostRequest {
            id: "missing".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    let status = grpc
        .create_post(create_request("", "u1"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn list_posts_reports_total() {
    let h = harness();
    let grpc = PostServiceImpl::new(h.service.clone());

    for i in 0..3 {
        grpc.create_post(create_request(&format!("post {}", i), "u1"))
            .await
            .unwrap();
    }

    let resp = grpc
        .list_posts(Request::new(proto::ListPostsRequest {
            limit: 2,
            offset: 0,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.total, 3);
    assert_eq!(resp.posts.len(), 2);
    assert_eq!(resp.posts[0].content, "post 2");
}

#[tokio::test]
async fn stream_posts_forwards_new_posts_and_likes() {
    let h = harness();
    let grpc = PostServiceImpl::new(h.service.clone());

    let mut stream = grpc
        .stream_posts(Request::new(proto::StreamPostsRequest {}))
        .await
        .unwrap()
        .into_inner();

    let created = grpc
        .create_post(create_request("streamed", "u1"))
        .await
        .unwrap()
        .into_inner();
    grpc.like_post(Request::new(proto::LikePostRequest {
        post_id: created.id.clone(),
        user_id: "u2".to_string(),
    }))
    .await
    .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("timed out waiting for created post")
        .unwrap()
        .unwrap();
    assert_eq!(first.id, created.id);
    assert_eq!(first.content, "streamed");
    assert_eq!(first.author_id, "u1");

    let second = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("timed out waiting for like")
        .unwrap()
        .unwrap();
    assert_eq!(second.id, created.id);
    assert_eq!(second.likes, 1);
}

#[tokio::test]
async fn dropped_stream_releases_its_subscription() {
    let h = harness();
    let grpc = PostServiceImpl::new(h.service.clone());

    let stream = grpc
        .stream_posts(Request::new(proto::StreamPostsRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(h.events.subscriber_count(), 1);

    drop(stream);

    // The forwarding task notices the closed channel on its next poll
    let released = tokio::time::timeout(Duration::from_secs(1), async {
        while h.events.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "subscription still held after client went away");

    // Later events have nowhere to go and must not fail the mutation
    grpc.create_post(create_request("after disconnect", "u1"))
        .await
        .unwrap();
    assert_eq!(h.events.published().len(), 1);
}
