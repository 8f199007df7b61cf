//! In-memory store, cache and event bus for service-level tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use futures::StreamExt;
use post_service::cache::PostCache;
use post_service::db::PostStore;
use post_service::events::{EventBus, EventSubscription, PostEvent};
use post_service::models::{Like, NewPost, Post};
use post_service::services::PostService;
use post_service::{ServiceError, ServiceResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

#[derive(Default)]
struct StoreState {
    posts: Vec<Post>,
    likes: HashMap<(Uuid, String), Like>,
}

/// Store with the same uniqueness and not-found rules as the SQL store.
///
/// Every post gets a strictly increasing `created_at` so newest-first order is
/// deterministic.
#[derive(Default)]
pub struct InMemoryStore {
    state: tokio::sync::Mutex<StoreState>,
    pub list_calls: AtomicUsize,
}

impl InMemoryStore {
    pub async fn like_records(&self, post_id: Uuid) -> usize {
        let state = self.state.lock().await;
        state.likes.keys().filter(|(id, _)| *id == post_id).count()
    }

    pub async fn total_like_records(&self) -> usize {
        self.state.lock().await.likes.len()
    }

    pub async fn stored_post(&self, post_id: Uuid) -> Option<Post> {
        let state = self.state.lock().await;
        state.posts.iter().find(|p| p.id == post_id).cloned()
    }
}

fn visible_newest_first(posts: &[Post]) -> Vec<Post> {
    let mut visible: Vec<Post> = posts
        .iter()
        .filter(|p| p.deleted_at.is_none())
        .cloned()
        .collect();
    visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    visible
}

#[async_trait]
impl PostStore for InMemoryStore {
    async fn list_posts(&self, limit: i64, offset: i64) -> ServiceResult<Vec<Post>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        Ok(visible_newest_first(&state.posts)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_posts(&self) -> ServiceResult<i64> {
        let state = self.state.lock().await;
        Ok(state.posts.iter().filter(|p| p.deleted_at.is_none()).count() as i64)
    }

    async fn find_post(&self, post_id: Uuid) -> ServiceResult<Option<Post>> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .find(|p| p.id == post_id && p.deleted_at.is_none())
            .cloned())
    }

    async fn insert_post(&self, new_post: NewPost) -> ServiceResult<Post> {
        let mut state = self.state.lock().await;
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let created_at = base + Duration::seconds(state.posts.len() as i64);
        let post = Post {
            id: Uuid::new_v4(),
            content: new_post.content,
            author_id: new_post.author_id,
            author_name: new_post.author_name,
            image_url: new_post.image_url,
            likes: 0,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn find_like(&self, post_id: Uuid, user_id: &str) -> ServiceResult<Option<Like>> {
        let state = self.state.lock().await;
        Ok(state.likes.get(&(post_id, user_id.to_string())).cloned())
    }

    async fn like_post(&self, post_id: Uuid, user_id: &str) -> ServiceResult<Post> {
        let mut state = self.state.lock().await;
        let key = (post_id, user_id.to_string());
        if state.likes.contains_key(&key) {
            return Err(ServiceError::AlreadyExists(
                "user already liked this post".to_string(),
            ));
        }

        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == post_id && p.deleted_at.is_none())
            .ok_or_else(|| ServiceError::NotFound("post not found".to_string()))?;
        post.likes += 1;
        post.updated_at = post.updated_at + Duration::milliseconds(1);
        let liked = post.clone();

        state.likes.insert(
            key,
            Like {
                id: Uuid::new_v4(),
                post_id,
                user_id: user_id.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(liked)
    }

    async fn count_likes(&self, post_id: Uuid) -> ServiceResult<i64> {
        Ok(self.like_records(post_id).await as i64)
    }
}

#[derive(Default)]
struct CacheState {
    recent: Option<Vec<Post>>,
    posts: HashMap<Uuid, Post>,
}

/// Cache that can be switched into a failing mode
#[derive(Default)]
pub struct InMemoryCache {
    state: Mutex<CacheState>,
    failing: AtomicBool,
    pub invalidations: AtomicUsize,
}

impl InMemoryCache {
    pub fn failing() -> Self {
        let cache = Self::default();
        cache.failing.store(true, Ordering::SeqCst);
        cache
    }

    pub fn recent(&self) -> Option<Vec<Post>> {
        self.state.lock().unwrap().recent.clone()
    }

    pub fn cached_post(&self, post_id: Uuid) -> Option<Post> {
        self.state.lock().unwrap().posts.get(&post_id).cloned()
    }

    fn check(&self) -> ServiceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::Cache("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PostCache for InMemoryCache {
    async fn get_recent_posts(&self) -> ServiceResult<Option<Vec<Post>>> {
        self.check()?;
        Ok(self.recent())
    }

    async fn set_recent_posts(&self, posts: &[Post]) -> ServiceResult<()> {
        self.check()?;
        self.state.lock().unwrap().recent = Some(posts.to_vec());
        Ok(())
    }

    async fn get_post(&self, post_id: Uuid) -> ServiceResult<Option<Post>> {
        self.check()?;
        Ok(self.cached_post(post_id))
    }

    async fn set_post(&self, post: &Post) -> ServiceResult<()> {
        self.check()?;
        self.state.lock().unwrap().posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn invalidate_post(&self, post_id: Uuid) -> ServiceResult<()> {
        self.check()?;
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.posts.remove(&post_id);
        state.recent = None;
        Ok(())
    }
}

/// Broadcast-backed bus that also records what was published
pub struct InMemoryEventBus {
    sender: broadcast::Sender<PostEvent>,
    published: Mutex<Vec<PostEvent>>,
    failing: AtomicBool,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sender,
            published: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }
}

impl InMemoryEventBus {
    pub fn failing() -> Self {
        let bus = Self::default();
        bus.failing.store(true, Ordering::SeqCst);
        bus
    }

    pub fn published(&self) -> Vec<PostEvent> {
        self.published.lock().unwrap().clone()
    }

    /// Live subscriptions; each one holds a broadcast receiver
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: &PostEvent) -> ServiceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::EventBus("bus unavailable".to_string()));
        }
        self.published.lock().unwrap().push(event.clone());
        // No subscribers is not an error
        let _ = self.sender.send(event.clone());
        Ok(())
    }

    async fn subscribe(&self) -> ServiceResult<EventSubscription> {
        let rx = self.sender.subscribe();
        Ok(BroadcastStream::new(rx)
            .filter_map(|event| async move { event.ok() })
            .boxed())
    }
}

pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<InMemoryCache>,
    pub events: Arc<InMemoryEventBus>,
    pub service: Arc<PostService>,
}

pub fn harness() -> TestHarness {
    harness_with(InMemoryCache::default(), InMemoryEventBus::default())
}

pub fn harness_with(cache: InMemoryCache, events: InMemoryEventBus) -> TestHarness {
    let store = Arc::new(InMemoryStore::default());
    let cache = Arc::new(cache);
    let events = Arc::new(events);
    let service = Arc::new(PostService::new(
        store.clone(),
        cache.clone(),
        events.clone(),
    ));
    TestHarness {
        store,
        cache,
        events,
        service,
    }
}
