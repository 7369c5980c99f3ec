#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use murmur::application::{
    auth::AuthService,
    comments::CommentService,
    follows::FollowService,
    listing::ListingService,
    pagination::PageWindow,
    posts::PostService,
    repos::{
        CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
        CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo, PostFilter,
        PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
    },
};
use murmur::cache::{CacheConfig, CacheState};
use murmur::domain::entities::{
    CommentRecord, CommentSummary, FollowRecord, GroupRecord, GroupRef, PostRecord, PostSummary,
    SessionRecord, UserRecord,
};
use murmur::infra::http::{HttpState, SESSION_COOKIE, build_router};
use murmur::infra::uploads::UploadStorage;
use tempfile::TempDir;
use time::{Duration as TimeDuration, OffsetDateTime, macros::datetime};
use tower::ServiceExt;
use uuid::Uuid;

pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

const MULTIPART_BOUNDARY: &str = "murmur-test-boundary";

/// In-memory stand-in for the PostgreSQL repositories.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<FollowRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
    clock: i64,
}

impl MemoryState {
    /// Strictly increasing timestamps keep listing order deterministic.
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        datetime!(2024-01-01 00:00:00 UTC) + TimeDuration::minutes(self.clock)
    }

    fn summary(&self, post: &PostRecord) -> PostSummary {
        let author_username = self
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .map(|user| user.username.clone())
            .unwrap_or_default();
        let group = post.group_id.and_then(|group_id| {
            self.groups
                .iter()
                .find(|group| group.id == group_id)
                .map(|group| GroupRef {
                    id: group.id,
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });
        PostSummary {
            id: post.id,
            text: post.text.clone(),
            created_at: post.created_at,
            author_id: post.author_id,
            author_username,
            group,
            image: post.image.clone(),
        }
    }

    fn matches(&self, post: &PostRecord, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group_id == Some(group_id),
            PostFilter::Author(author_id) => post.author_id == author_id,
            PostFilter::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|follow| follow.user_id == user_id && follow.author_id == post.author_id),
        }
    }

    fn filtered(&self, filter: PostFilter) -> Vec<&PostRecord> {
        let mut posts: Vec<_> = self
            .posts
            .iter()
            .filter(|post| self.matches(post, filter))
            .collect();
        posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        posts
    }
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock")
    }

    pub fn post(&self, id: Uuid) -> Option<PostRecord> {
        self.lock().posts.iter().find(|post| post.id == id).cloned()
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        self.lock().posts.clone()
    }

    pub fn comments(&self) -> Vec<CommentRecord> {
        self.lock().comments.clone()
    }

    pub fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Expire every session immediately.
    pub fn expire_sessions(&self) {
        let mut state = self.lock();
        let past = OffsetDateTime::now_utc() - TimeDuration::minutes(1);
        for session in state.sessions.values_mut() {
            session.expires_at = past;
        }
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.lock();
        if state.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            password_hash: params.password_hash,
            created_at: state.tick(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.lock();
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.slug.cmp(&b.slug)));
        Ok(groups)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostSummary>, RepoError> {
        let state = self.lock();
        Ok(state
            .filtered(filter)
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|post| state.summary(post))
            .collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        Ok(self.lock().filtered(filter).len() as u64)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostSummary>, RepoError> {
        let state = self.lock();
        Ok(state
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| state.summary(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        let post = PostRecord {
            id: Uuid::new_v4(),
            text: params.text,
            created_at: state.tick(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        if params.image.is_some() {
            post.image = params.image;
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.lock();
        let before = state.posts.len();
        state.posts.retain(|post| post.id != id);
        if state.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        state.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.lock();
        if !state.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::InvalidInput {
                message: "post does not exist".to_string(),
            });
        }
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: state.tick(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentSummary>, RepoError> {
        let state = self.lock();
        let mut comments: Vec<_> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| CommentSummary {
                id: comment.id,
                author_username: state
                    .users
                    .iter()
                    .find(|user| user.id == comment.author_id)
                    .map(|user| user.username.clone())
                    .unwrap_or_default(),
                text: comment.text.clone(),
                created_at: comment.created_at,
            })
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn create_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        let mut state = self.lock();
        if state
            .follows
            .iter()
            .any(|follow| follow.user_id == user_id && follow.author_id == author_id)
        {
            return Ok(false);
        }
        state.follows.push(FollowRecord {
            id: Uuid::new_v4(),
            user_id,
            author_id,
        });
        Ok(true)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut state = self.lock();
        let before = state.follows.len();
        state
            .follows
            .retain(|follow| !(follow.user_id == user_id && follow.author_id == author_id));
        Ok(state.follows.len() != before)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .any(|follow| follow.user_id == user_id && follow.author_id == author_id))
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            token_hash: params.token_hash,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        self.lock().sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self.lock().sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.lock().sessions.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// A fully wired router over a [`MemoryStore`] and a temporary media root.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
    pub cache: CacheState,
    pub auth: Arc<AuthService>,
    pub posts: Arc<PostService>,
    pub upload_storage: Arc<UploadStorage>,
    _media: TempDir,
}

impl TestApp {
    /// Response caching switched off so every request sees fresh data.
    pub fn new() -> Self {
        Self::with_cache(CacheConfig {
            enabled: false,
            ..Default::default()
        })
    }

    pub fn with_cache(config: CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        let media = tempfile::tempdir().expect("media dir");
        let upload_storage =
            Arc::new(UploadStorage::new(media.path().to_path_buf()).expect("upload storage"));

        let auth = Arc::new(AuthService::new(
            store.clone(),
            store.clone(),
            Duration::from_secs(3600),
        ));
        let cache = CacheState::new(config);
        let posts = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            upload_storage.clone(),
        ));

        let state = HttpState {
            listing: Arc::new(ListingService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
            )),
            posts: posts.clone(),
            comments: Arc::new(CommentService::new(store.clone(), store.clone())),
            follows: Arc::new(FollowService::new(store.clone(), store.clone())),
            auth: auth.clone(),
            health: store.clone(),
            upload_storage: upload_storage.clone(),
            cache: cache.clone(),
            cookie_secure: false,
            upload_limit_bytes: 10 * 1024 * 1024,
        };

        Self {
            store,
            router: build_router(state),
            cache,
            auth,
            posts,
            upload_storage,
            _media: media,
        }
    }

    /// Insert an account directly; its password hash is not a real one.
    pub async fn user(&self, username: &str) -> UserRecord {
        self.store
            .create_user(CreateUserParams {
                username: username.to_string(),
                password_hash: "unusable".to_string(),
            })
            .await
            .expect("create user")
    }

    /// Open a session for `user` and return the `Cookie` header value.
    pub async fn session_for(&self, user: &UserRecord) -> String {
        let session = self.auth.start_session(user).await.expect("session");
        format!("{SESSION_COOKIE}={}", session.token)
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        self.store
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: format!("About {title}"),
            })
            .await
            .expect("create group")
    }

    pub async fn post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        self.store
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|group| group.id),
                image: None,
            })
            .await
            .expect("create post")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).expect("request")).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        body: Vec<u8>,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body)).expect("request")).await
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

/// Builder for `multipart/form-data` bodies.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Number of rendered post cards in a listing page.
pub fn card_count(html: &str) -> usize {
    html.matches("class=\"post-card\"").count()
}
