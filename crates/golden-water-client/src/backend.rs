//! The remote Golden Water backend as seen by the client

use async_trait::async_trait;
use media_blob::BlobHandle;

use crate::error::BackendResult;
use crate::types::{
    Comment, CommentId, ModerationStatus, Post, PostId, PostPage, Principal, Profile, ReactionType,
};

/// Remote calls the client makes.
///
/// Every call may fail with a textual [`BackendError`](crate::BackendError)
/// that is shown to the user as-is. Authorization is enforced remotely;
/// admin calls fail for non-admin callers.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    // Profile
    async fn get_caller_user_profile(&self) -> BackendResult<Option<Profile>>;
    async fn save_caller_user_profile(&self, profile: Profile) -> BackendResult<()>;
    async fn get_username_from_principal(&self, user: &Principal)
        -> BackendResult<Option<String>>;

    // Posts
    async fn get_post(&self, post_id: PostId) -> BackendResult<Option<Post>>;
    async fn get_posts_page(&self, start: u64, page_size: u64) -> BackendResult<PostPage>;
    async fn create_post(
        &self,
        content: String,
        image: Option<BlobHandle>,
        video: Option<BlobHandle>,
    ) -> BackendResult<PostId>;
    async fn delete_post(&self, post_id: PostId) -> BackendResult<bool>;
    async fn report_post(&self, post_id: PostId) -> BackendResult<bool>;
    async fn clear_post_reports(&self, post_id: PostId) -> BackendResult<bool>;
    async fn set_post_reaction(&self, post_id: PostId, reaction: ReactionType)
        -> BackendResult<()>;
    async fn remove_post_reaction(&self, post_id: PostId) -> BackendResult<()>;
    /// The caller's own reaction to a post
    async fn get_post_reaction(&self, post_id: PostId) -> BackendResult<Option<ReactionType>>;

    // Comments
    async fn get_post_comments(&self, post_id: PostId) -> BackendResult<Vec<Comment>>;
    async fn create_comment(&self, post_id: PostId, content: String) -> BackendResult<CommentId>;
    async fn delete_comment(&self, comment_id: CommentId) -> BackendResult<bool>;
    async fn report_comment(&self, comment_id: CommentId) -> BackendResult<bool>;
    async fn clear_comment_reports(&self, comment_id: CommentId) -> BackendResult<bool>;
    async fn set_comment_reaction(
        &self,
        comment_id: CommentId,
        reaction: ReactionType,
    ) -> BackendResult<()>;
    async fn remove_comment_reaction(&self, comment_id: CommentId) -> BackendResult<()>;
    /// The caller's own reaction to a comment
    async fn get_comment_reaction(
        &self,
        comment_id: CommentId,
    ) -> BackendResult<Option<ReactionType>>;

    // Moderation and admin
    async fn get_reported_posts_admin_view(&self) -> BackendResult<Vec<Post>>;
    async fn get_reported_comments_admin_view(&self) -> BackendResult<Vec<Comment>>;
    async fn get_flagged_posts(&self) -> BackendResult<Vec<(PostId, ModerationStatus)>>;
    async fn clear_flagged_post(&self, post_id: PostId) -> BackendResult<bool>;
    async fn is_caller_admin(&self) -> BackendResult<bool>;
    async fn get_content_guidelines(&self) -> BackendResult<String>;
}
