//! In-memory backend with call counters for client tests

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use media_blob::BlobHandle;

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};
use crate::types::{
    Comment, CommentId, ModerationStatus, Post, PostId, PostPage, Principal, Profile, ReactionType,
};

const LATENCY: Duration = Duration::from_millis(10);

#[derive(Default)]
struct FakeState {
    /// Oldest first; the feed is served newest first
    posts: Vec<Post>,
    comments: Vec<Comment>,
    profile: Option<Profile>,
    usernames: HashMap<Principal, String>,
    post_reactions: HashMap<PostId, ReactionType>,
    comment_reactions: HashMap<CommentId, ReactionType>,
    flagged: Vec<(PostId, ModerationStatus)>,
    next_id: u64,
}

pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn author() -> Principal {
    Principal::new("author-principal")
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_id: 1,
                ..Default::default()
            }),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Backend pre-seeded with posts `1..=count`
    pub(crate) fn with_posts(count: u64) -> Self {
        let backend = Self::new();
        for _ in 0..count {
            backend.insert_post(None);
        }
        backend
    }

    pub(crate) fn insert_post(&self, image: Option<BlobHandle>) -> PostId {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.posts.push(Post {
            id,
            content: format!("post {id}"),
            image,
            video: None,
            author: author(),
            timestamp: id * 1_000,
            reports: 0,
        });
        id
    }

    pub(crate) fn insert_comment(&self, post_id: PostId, content: &str) -> CommentId {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.comments.push(Comment {
            id,
            post_id,
            content: content.to_string(),
            author: author(),
            timestamp: id * 1_000,
            reports: 0,
        });
        id
    }

    pub(crate) fn flag(&self, post_id: PostId, reason: &str) {
        lock(&self.state)
            .flagged
            .push((post_id, ModerationStatus::Flagged(reason.to_string())));
    }

    pub(crate) fn set_username(&self, user: &Principal, name: &str) {
        lock(&self.state)
            .usernames
            .insert(user.clone(), name.to_string());
    }

    /// Make every call to `operation` fail with `message`
    pub(crate) fn fail(&self, operation: &'static str, message: &str) {
        lock(&self.failures).insert(operation, message.to_string());
    }

    pub(crate) fn recover(&self, operation: &'static str) {
        lock(&self.failures).remove(operation);
    }

    pub(crate) fn calls(&self, operation: &str) -> usize {
        lock(&self.calls).get(operation).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    async fn enter(&self, operation: &'static str) -> BackendResult<()> {
        *lock(&self.calls).entry(operation).or_insert(0) += 1;
        tokio::time::sleep(LATENCY).await;
        match lock(&self.failures).get(operation) {
            Some(message) => Err(BackendError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn find_post(&self, post_id: PostId) -> Option<Post> {
        lock(&self.state)
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .cloned()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_caller_user_profile(&self) -> BackendResult<Option<Profile>> {
        self.enter("get_caller_user_profile").await?;
        Ok(lock(&self.state).profile.clone())
    }

    async fn save_caller_user_profile(&self, profile: Profile) -> BackendResult<()> {
        self.enter("save_caller_user_profile").await?;
        lock(&self.state).profile = Some(profile);
        Ok(())
    }

    async fn get_username_from_principal(
        &self,
        user: &Principal,
    ) -> BackendResult<Option<String>> {
        self.enter("get_username_from_principal").await?;
        Ok(lock(&self.state).usernames.get(user).cloned())
    }

    async fn get_post(&self, post_id: PostId) -> BackendResult<Option<Post>> {
        self.enter("get_post").await?;
        Ok(self.find_post(post_id))
    }

    async fn get_posts_page(&self, start: u64, page_size: u64) -> BackendResult<PostPage> {
        self.enter("get_posts_page").await?;
        let state = lock(&self.state);
        let total = state.posts.len() as u64;
        let posts = state
            .posts
            .iter()
            .rev()
            .skip(start as usize)
            .take(page_size as usize)
            .cloned()
            .collect();
        let end = start + page_size;
        Ok(PostPage {
            posts,
            next_page_start: (end < total).then_some(end),
        })
    }

    async fn create_post(
        &self,
        content: String,
        image: Option<BlobHandle>,
        video: Option<BlobHandle>,
    ) -> BackendResult<PostId> {
        self.enter("create_post").await?;
        let id = self.insert_post(image);
        let mut state = lock(&self.state);
        if let Some(post) = state.posts.last_mut() {
            post.content = content;
            post.video = video;
        }
        Ok(id)
    }

    async fn delete_post(&self, post_id: PostId) -> BackendResult<bool> {
        self.enter("delete_post").await?;
        let mut state = lock(&self.state);
        let before = state.posts.len();
        state.posts.retain(|post| post.id != post_id);
        Ok(state.posts.len() != before)
    }

    async fn report_post(&self, post_id: PostId) -> BackendResult<bool> {
        self.enter("report_post").await?;
        let mut state = lock(&self.state);
        match state.posts.iter_mut().find(|post| post.id == post_id) {
            Some(post) => {
                post.reports += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_post_reports(&self, post_id: PostId) -> BackendResult<bool> {
        self.enter("clear_post_reports").await?;
        let mut state = lock(&self.state);
        match state.posts.iter_mut().find(|post| post.id == post_id) {
            Some(post) => {
                post.reports = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_post_reaction(
        &self,
        post_id: PostId,
        reaction: ReactionType,
    ) -> BackendResult<()> {
        self.enter("set_post_reaction").await?;
        lock(&self.state).post_reactions.insert(post_id, reaction);
        Ok(())
    }

    async fn remove_post_reaction(&self, post_id: PostId) -> BackendResult<()> {
        self.enter("remove_post_reaction").await?;
        lock(&self.state).post_reactions.remove(&post_id);
        Ok(())
    }

    async fn get_post_reaction(&self, post_id: PostId) -> BackendResult<Option<ReactionType>> {
        self.enter("get_post_reaction").await?;
        Ok(lock(&self.state).post_reactions.get(&post_id).copied())
    }

    async fn get_post_comments(&self, post_id: PostId) -> BackendResult<Vec<Comment>> {
        self.enter("get_post_comments").await?;
        Ok(lock(&self.state)
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn create_comment(&self, post_id: PostId, content: String) -> BackendResult<CommentId> {
        self.enter("create_comment").await?;
        Ok(self.insert_comment(post_id, &content))
    }

    async fn delete_comment(&self, comment_id: CommentId) -> BackendResult<bool> {
        self.enter("delete_comment").await?;
        let mut state = lock(&self.state);
        let before = state.comments.len();
        state.comments.retain(|comment| comment.id != comment_id);
        Ok(state.comments.len() != before)
    }

    async fn report_comment(&self, comment_id: CommentId) -> BackendResult<bool> {
        self.enter("report_comment").await?;
        let mut state = lock(&self.state);
        match state.comments.iter_mut().find(|c| c.id == comment_id) {
            Some(comment) => {
                comment.reports += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_comment_reports(&self, comment_id: CommentId) -> BackendResult<bool> {
        self.enter("clear_comment_reports").await?;
        let mut state = lock(&self.state);
        match state.comments.iter_mut().find(|c| c.id == comment_id) {
            Some(comment) => {
                comment.reports = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_comment_reaction(
        &self,
        comment_id: CommentId,
        reaction: ReactionType,
    ) -> BackendResult<()> {
        self.enter("set_comment_reaction").await?;
        lock(&self.state)
            .comment_reactions
            .insert(comment_id, reaction);
        Ok(())
    }

    async fn remove_comment_reaction(&self, comment_id: CommentId) -> BackendResult<()> {
        self.enter("remove_comment_reaction").await?;
        lock(&self.state).comment_reactions.remove(&comment_id);
        Ok(())
    }

    async fn get_comment_reaction(
        &self,
        comment_id: CommentId,
    ) -> BackendResult<Option<ReactionType>> {
        self.enter("get_comment_reaction").await?;
        Ok(lock(&self.state).comment_reactions.get(&comment_id).copied())
    }

    async fn get_reported_posts_admin_view(&self) -> BackendResult<Vec<Post>> {
        self.enter("get_reported_posts_admin_view").await?;
        Ok(lock(&self.state)
            .posts
            .iter()
            .filter(|post| post.reports > 0)
            .cloned()
            .collect())
    }

    async fn get_reported_comments_admin_view(&self) -> BackendResult<Vec<Comment>> {
        self.enter("get_reported_comments_admin_view").await?;
        Ok(lock(&self.state)
            .comments
            .iter()
            .filter(|comment| comment.reports > 0)
            .cloned()
            .collect())
    }

    async fn get_flagged_posts(&self) -> BackendResult<Vec<(PostId, ModerationStatus)>> {
        self.enter("get_flagged_posts").await?;
        Ok(lock(&self.state).flagged.clone())
    }

    async fn clear_flagged_post(&self, post_id: PostId) -> BackendResult<bool> {
        self.enter("clear_flagged_post").await?;
        let mut state = lock(&self.state);
        let before = state.flagged.len();
        state.flagged.retain(|(id, _)| *id != post_id);
        Ok(state.flagged.len() != before)
    }

    async fn is_caller_admin(&self) -> BackendResult<bool> {
        self.enter("is_caller_admin").await?;
        Ok(true)
    }

    async fn get_content_guidelines(&self) -> BackendResult<String> {
        self.enter("get_content_guidelines").await?;
        Ok("Be kind. No hate speech.".to_string())
    }
}
