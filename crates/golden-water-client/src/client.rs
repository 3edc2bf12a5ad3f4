//! Cached reads and invalidating writes against the Golden Water backend

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use media_blob::BlobHandle;
use query_cache::{CacheStats, ConnectionGate, PagedQuery, PagesSnapshot, QueryCache, QueryState};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendResult, ClientError, Result};
use crate::keys::{Category, KeyPattern, Mutation, QueryKey};
use crate::types::{
    Comment, CommentId, FlaggedPost, Post, PostId, PostPage, Principal, Profile, ReactionType,
};

type Cached<V> = QueryCache<QueryKey, V, ClientError>;

/// Counts a mutation as pending for as long as it is alive
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client for the Golden Water backend.
///
/// Every read goes through a per-category cache and waits for the
/// connection gate; every write fails fast while disconnected and, on
/// success, invalidates exactly the reads listed by its [`Mutation`].
pub struct GoldenWaterClient<B> {
    backend: Arc<B>,
    gate: ConnectionGate,
    config: ClientConfig,
    pending: AtomicUsize,

    profile: Cached<Option<Profile>>,
    usernames: Cached<Option<String>>,
    guidelines: Cached<String>,
    posts: PagedQuery<PostPage, ClientError>,
    post: Cached<Option<Post>>,
    post_reactions: Cached<Option<ReactionType>>,
    comments: Cached<Vec<Comment>>,
    comment_reactions: Cached<Option<ReactionType>>,
    is_admin: Cached<bool>,
    reported_posts: Cached<Vec<Post>>,
    reported_comments: Cached<Vec<Comment>>,
    flagged_posts: Cached<Vec<FlaggedPost>>,
}

impl<B: Backend> GoldenWaterClient<B> {
    pub fn new(backend: Arc<B>, gate: ConnectionGate, config: ClientConfig) -> Self {
        let stale = &config.stale;
        let options = |window| config.cache_options(window);

        Self {
            profile: QueryCache::new("current_user_profile", options(stale.profile), gate.clone()),
            usernames: QueryCache::new("username", options(stale.username), gate.clone()),
            guidelines: QueryCache::new(
                "content_guidelines",
                config.permanent_options(),
                gate.clone(),
            ),
            posts: PagedQuery::new(
                "posts_paginated",
                0,
                options(stale.posts).freshness,
                gate.clone(),
            ),
            post: QueryCache::new("post", options(stale.post), gate.clone()),
            post_reactions: QueryCache::new("post_reaction", options(stale.reaction), gate.clone()),
            comments: QueryCache::new("comments", options(stale.comments), gate.clone()),
            comment_reactions: QueryCache::new(
                "comment_reaction",
                options(stale.reaction),
                gate.clone(),
            ),
            is_admin: QueryCache::new("is_admin", options(stale.role), gate.clone()),
            reported_posts: QueryCache::new("reported_posts", options(stale.admin), gate.clone()),
            reported_comments: QueryCache::new(
                "reported_comments",
                options(stale.admin),
                gate.clone(),
            ),
            flagged_posts: QueryCache::new("flagged_posts", options(stale.admin), gate.clone()),
            backend,
            gate,
            pending: AtomicUsize::new(0),
            config,
        }
    }

    pub fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Writes currently waiting on the backend
    pub fn pending_mutations(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Adapt a backend call into a cache loader
    fn loader<T, F, Fut>(&self, call: F) -> impl FnOnce() -> BoxFuture<'static, Result<T>>
    where
        T: Send + 'static,
        F: FnOnce(Arc<B>) -> Fut + Send + 'static,
        Fut: Future<Output = BackendResult<T>> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        move || async move { call(backend).await.map_err(ClientError::from) }.boxed()
    }

    fn page_loader(&self) -> impl Fn(u64) -> BoxFuture<'static, Result<PostPage>> {
        let backend = Arc::clone(&self.backend);
        let page_size = self.config.page_size;
        move |start| {
            let backend = Arc::clone(&backend);
            async move {
                debug!(start, page_size, "Loading posts page");
                backend
                    .get_posts_page(start, page_size)
                    .await
                    .map_err(ClientError::from)
            }
            .boxed()
        }
    }

    // Profile

    pub async fn current_user_profile(&self) -> Result<Option<Profile>> {
        let load = self.loader(|backend| async move { backend.get_caller_user_profile().await });
        self.profile.fetch(QueryKey::CurrentUserProfile, load).await
    }

    pub async fn current_user_profile_state(&self) -> QueryState<Option<Profile>, ClientError> {
        let load = self.loader(|backend| async move { backend.get_caller_user_profile().await });
        self.profile.query(QueryKey::CurrentUserProfile, load).await
    }

    pub async fn username(&self, user: &Principal) -> Result<Option<String>> {
        let principal = user.clone();
        let load = self.loader(move |backend| async move {
            backend.get_username_from_principal(&principal).await
        });
        self.usernames
            .fetch(QueryKey::Username(user.clone()), load)
            .await
    }

    pub async fn content_guidelines(&self) -> Result<String> {
        let load = self.loader(|backend| async move { backend.get_content_guidelines().await });
        self.guidelines.fetch(QueryKey::ContentGuidelines, load).await
    }

    // Posts

    /// The feed's first page, or every accumulated page while they are fresh
    pub async fn posts_page(&self) -> Result<PagesSnapshot<PostPage, ClientError>> {
        self.posts.first_page(self.page_loader()).await
    }

    /// Append the next feed page
    pub async fn next_posts_page(&self) -> Result<PagesSnapshot<PostPage, ClientError>> {
        self.posts.next_page(self.page_loader()).await
    }

    /// Accumulated feed pages without loading anything
    pub fn posts_state(&self) -> PagesSnapshot<PostPage, ClientError> {
        self.posts.pages()
    }

    pub async fn post(&self, post_id: PostId) -> Result<Option<Post>> {
        let load = self.loader(move |backend| async move { backend.get_post(post_id).await });
        self.post.fetch(QueryKey::Post(post_id), load).await
    }

    pub async fn post_state(&self, post_id: PostId) -> QueryState<Option<Post>, ClientError> {
        let load = self.loader(move |backend| async move { backend.get_post(post_id).await });
        self.post.query(QueryKey::Post(post_id), load).await
    }

    /// Whatever is cached for a post, without loading
    pub async fn cached_post(&self, post_id: PostId) -> QueryState<Option<Post>, ClientError> {
        self.post.peek(&QueryKey::Post(post_id)).await
    }

    /// The caller's own reaction to a post
    pub async fn post_reaction(&self, post_id: PostId) -> Result<Option<ReactionType>> {
        let load =
            self.loader(move |backend| async move { backend.get_post_reaction(post_id).await });
        self.post_reactions
            .fetch(QueryKey::PostReaction(post_id), load)
            .await
    }

    // Comments

    pub async fn post_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let load =
            self.loader(move |backend| async move { backend.get_post_comments(post_id).await });
        self.comments.fetch(QueryKey::Comments(post_id), load).await
    }

    pub async fn post_comments_state(
        &self,
        post_id: PostId,
    ) -> QueryState<Vec<Comment>, ClientError> {
        let load =
            self.loader(move |backend| async move { backend.get_post_comments(post_id).await });
        self.comments.query(QueryKey::Comments(post_id), load).await
    }

    /// The caller's own reaction to a comment
    pub async fn comment_reaction(&self, comment_id: CommentId) -> Result<Option<ReactionType>> {
        let load = self
            .loader(move |backend| async move { backend.get_comment_reaction(comment_id).await });
        self.comment_reactions
            .fetch(QueryKey::CommentReaction(comment_id), load)
            .await
    }

    // Admin

    pub async fn is_admin(&self) -> Result<bool> {
        let load = self.loader(|backend| async move { backend.is_caller_admin().await });
        self.is_admin.fetch(QueryKey::IsAdmin, load).await
    }

    pub async fn reported_posts(&self) -> Result<Vec<Post>> {
        let load =
            self.loader(|backend| async move { backend.get_reported_posts_admin_view().await });
        self.reported_posts.fetch(QueryKey::ReportedPosts, load).await
    }

    pub async fn reported_comments(&self) -> Result<Vec<Comment>> {
        let load =
            self.loader(|backend| async move { backend.get_reported_comments_admin_view().await });
        self.reported_comments
            .fetch(QueryKey::ReportedComments, load)
            .await
    }

    /// Flagged posts joined with their content; posts that no longer
    /// exist are skipped.
    pub async fn flagged_posts(&self) -> Result<Vec<FlaggedPost>> {
        self.flagged_posts
            .fetch(QueryKey::FlaggedPosts, self.flagged_loader())
            .await
    }

    pub async fn flagged_posts_state(&self) -> QueryState<Vec<FlaggedPost>, ClientError> {
        self.flagged_posts
            .query(QueryKey::FlaggedPosts, self.flagged_loader())
            .await
    }

    fn flagged_loader(&self) -> impl FnOnce() -> BoxFuture<'static, Result<Vec<FlaggedPost>>> {
        self.loader(|backend| async move {
            let entries = backend.get_flagged_posts().await?;
            let mut flagged = Vec::with_capacity(entries.len());
            for (post_id, status) in entries {
                match backend.get_post(post_id).await? {
                    Some(post) => flagged.push(FlaggedPost {
                        post_id,
                        status,
                        post,
                    }),
                    None => debug!(post_id, "Skipping flagged post that no longer exists"),
                }
            }
            Ok::<_, BackendError>(flagged)
        })
    }

    // Writes

    pub async fn save_profile(&self, profile: Profile) -> Result<()> {
        self.mutate(Mutation::SaveProfile, |backend| async move {
            backend.save_caller_user_profile(profile).await
        })
        .await
    }

    pub async fn create_post(
        &self,
        content: impl Into<String>,
        image: Option<BlobHandle>,
        video: Option<BlobHandle>,
    ) -> Result<PostId> {
        let content = content.into();
        self.mutate(Mutation::CreatePost, |backend| async move {
            backend.create_post(content, image, video).await
        })
        .await
    }

    pub async fn delete_post(&self, post_id: PostId) -> Result<bool> {
        self.mutate(Mutation::DeletePost { post_id }, |backend| async move {
            backend.delete_post(post_id).await
        })
        .await
    }

    pub async fn report_post(&self, post_id: PostId) -> Result<bool> {
        self.mutate(Mutation::ReportPost { post_id }, |backend| async move {
            backend.report_post(post_id).await
        })
        .await
    }

    pub async fn set_post_reaction(&self, post_id: PostId, reaction: ReactionType) -> Result<()> {
        self.mutate(Mutation::SetPostReaction { post_id }, |backend| async move {
            backend.set_post_reaction(post_id, reaction).await
        })
        .await
    }

    pub async fn remove_post_reaction(&self, post_id: PostId) -> Result<()> {
        self.mutate(Mutation::RemovePostReaction { post_id }, |backend| async move {
            backend.remove_post_reaction(post_id).await
        })
        .await
    }

    pub async fn create_comment(
        &self,
        post_id: PostId,
        content: impl Into<String>,
    ) -> Result<CommentId> {
        let content = content.into();
        self.mutate(Mutation::CreateComment { post_id }, |backend| async move {
            backend.create_comment(post_id, content).await
        })
        .await
    }

    pub async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<bool> {
        let mutation = Mutation::DeleteComment {
            post_id,
            comment_id,
        };
        self.mutate(mutation, |backend| async move {
            backend.delete_comment(comment_id).await
        })
        .await
    }

    pub async fn report_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<bool> {
        let mutation = Mutation::ReportComment {
            post_id,
            comment_id,
        };
        self.mutate(mutation, |backend| async move {
            backend.report_comment(comment_id).await
        })
        .await
    }

    pub async fn set_comment_reaction(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        reaction: ReactionType,
    ) -> Result<()> {
        let mutation = Mutation::SetCommentReaction {
            post_id,
            comment_id,
        };
        self.mutate(mutation, |backend| async move {
            backend.set_comment_reaction(comment_id, reaction).await
        })
        .await
    }

    pub async fn remove_comment_reaction(
        &self,
        post_id: PostId,
        comment_id: CommentId,
    ) -> Result<()> {
        let mutation = Mutation::RemoveCommentReaction {
            post_id,
            comment_id,
        };
        self.mutate(mutation, |backend| async move {
            backend.remove_comment_reaction(comment_id).await
        })
        .await
    }

    pub async fn clear_post_reports(&self, post_id: PostId) -> Result<bool> {
        self.mutate(Mutation::ClearPostReports { post_id }, |backend| async move {
            backend.clear_post_reports(post_id).await
        })
        .await
    }

    pub async fn clear_comment_reports(&self, comment_id: CommentId) -> Result<bool> {
        self.mutate(Mutation::ClearCommentReports { comment_id }, |backend| async move {
            backend.clear_comment_reports(comment_id).await
        })
        .await
    }

    pub async fn clear_flagged_post(&self, post_id: PostId) -> Result<bool> {
        self.mutate(Mutation::ClearFlaggedPost { post_id }, |backend| async move {
            backend.clear_flagged_post(post_id).await
        })
        .await
    }

    /// Run one write against the backend.
    ///
    /// Rejected with [`ClientError::NotConnected`] while the gate is closed.
    /// Never retried. Invalidations are applied only after success.
    async fn mutate<T, F, Fut>(&self, mutation: Mutation, call: F) -> Result<T>
    where
        F: FnOnce(Arc<B>) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        if !self.gate.is_ready() {
            warn!(mutation = mutation.name(), "Rejecting mutation before backend is connected");
            return Err(ClientError::NotConnected);
        }

        let _pending = PendingGuard::new(&self.pending);
        match call(Arc::clone(&self.backend)).await {
            Ok(value) => {
                for pattern in mutation.invalidations() {
                    self.invalidate(&pattern);
                }
                info!(mutation = mutation.name(), "Mutation succeeded");
                Ok(value)
            }
            Err(err) => {
                warn!(mutation = mutation.name(), error = %err, "Mutation failed");
                Err(err.into())
            }
        }
    }

    // Invalidation

    /// Mark every cached read matching `pattern` stale
    pub fn invalidate(&self, pattern: &KeyPattern) {
        let matches = |key: &QueryKey| pattern.matches(key);
        let marked = match pattern.category() {
            Category::Posts => {
                self.posts.invalidate();
                1
            }
            Category::CurrentUserProfile => self.profile.invalidate_if(matches),
            Category::Username => self.usernames.invalidate_if(matches),
            Category::ContentGuidelines => self.guidelines.invalidate_if(matches),
            Category::Post => self.post.invalidate_if(matches),
            Category::PostReaction => self.post_reactions.invalidate_if(matches),
            Category::Comments => self.comments.invalidate_if(matches),
            Category::CommentReaction => self.comment_reactions.invalidate_if(matches),
            Category::IsAdmin => self.is_admin.invalidate_if(matches),
            Category::ReportedPosts => self.reported_posts.invalidate_if(matches),
            Category::ReportedComments => self.reported_comments.invalidate_if(matches),
            Category::FlaggedPosts => self.flagged_posts.invalidate_if(matches),
        };
        debug!(pattern = %pattern, marked, "Invalidated queries");
    }

    /// Mark everything stale, e.g. after the signed-in identity changes
    pub fn invalidate_all(&self) {
        for category in Category::ALL {
            self.invalidate(&KeyPattern::Category(category));
        }
    }

    /// Cache statistics for a category; the paginated feed has none
    pub async fn cache_stats(&self, category: Category) -> Option<CacheStats> {
        let stats = match category {
            Category::Posts => return None,
            Category::CurrentUserProfile => self.profile.stats().await,
            Category::Username => self.usernames.stats().await,
            Category::ContentGuidelines => self.guidelines.stats().await,
            Category::Post => self.post.stats().await,
            Category::PostReaction => self.post_reactions.stats().await,
            Category::Comments => self.comments.stats().await,
            Category::CommentReaction => self.comment_reactions.stats().await,
            Category::IsAdmin => self.is_admin.stats().await,
            Category::ReportedPosts => self.reported_posts.stats().await,
            Category::ReportedComments => self.reported_comments.stats().await,
            Category::FlaggedPosts => self.flagged_posts.stats().await,
        };
        Some(stats)
    }
}
