//! Query keys and which writes make which reads stale

use std::fmt;

use crate::types::{CommentId, PostId, Principal};

/// Cached read categories, one cache each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    CurrentUserProfile,
    Username,
    ContentGuidelines,
    Posts,
    Post,
    PostReaction,
    Comments,
    CommentReaction,
    IsAdmin,
    ReportedPosts,
    ReportedComments,
    FlaggedPosts,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::CurrentUserProfile,
        Category::Username,
        Category::ContentGuidelines,
        Category::Posts,
        Category::Post,
        Category::PostReaction,
        Category::Comments,
        Category::CommentReaction,
        Category::IsAdmin,
        Category::ReportedPosts,
        Category::ReportedComments,
        Category::FlaggedPosts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::CurrentUserProfile => "currentUserProfile",
            Category::Username => "username",
            Category::ContentGuidelines => "contentGuidelines",
            Category::Posts => "posts",
            Category::Post => "post",
            Category::PostReaction => "postReaction",
            Category::Comments => "comments",
            Category::CommentReaction => "commentReaction",
            Category::IsAdmin => "isAdmin",
            Category::ReportedPosts => "reportedPosts",
            Category::ReportedComments => "reportedComments",
            Category::FlaggedPosts => "flaggedPosts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one cached read, including all of its parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    CurrentUserProfile,
    Username(Principal),
    ContentGuidelines,
    PostsPaginated,
    Post(PostId),
    PostReaction(PostId),
    Comments(PostId),
    CommentReaction(CommentId),
    IsAdmin,
    ReportedPosts,
    ReportedComments,
    FlaggedPosts,
}

impl QueryKey {
    pub fn category(&self) -> Category {
        match self {
            QueryKey::CurrentUserProfile => Category::CurrentUserProfile,
            QueryKey::Username(_) => Category::Username,
            QueryKey::ContentGuidelines => Category::ContentGuidelines,
            QueryKey::PostsPaginated => Category::Posts,
            QueryKey::Post(_) => Category::Post,
            QueryKey::PostReaction(_) => Category::PostReaction,
            QueryKey::Comments(_) => Category::Comments,
            QueryKey::CommentReaction(_) => Category::CommentReaction,
            QueryKey::IsAdmin => Category::IsAdmin,
            QueryKey::ReportedPosts => Category::ReportedPosts,
            QueryKey::ReportedComments => Category::ReportedComments,
            QueryKey::FlaggedPosts => Category::FlaggedPosts,
        }
    }

    /// Key as a tuple of segments, e.g. `["post", "42"]`
    pub fn segments(&self) -> Vec<String> {
        let head = self.category().as_str().to_string();
        match self {
            QueryKey::Username(principal) => vec![head, principal.to_string()],
            QueryKey::PostsPaginated => vec![head, "paginated".to_string()],
            QueryKey::Post(id)
            | QueryKey::PostReaction(id)
            | QueryKey::Comments(id)
            | QueryKey::CommentReaction(id) => vec![head, id.to_string()],
            _ => vec![head],
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join("/"))
    }
}

/// Which cached reads an invalidation targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Exactly one key
    Exact(QueryKey),
    /// Every key of a category, whatever its parameters
    Category(Category),
}

impl KeyPattern {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeyPattern::Exact(exact) => exact == key,
            KeyPattern::Category(category) => key.category() == *category,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            KeyPattern::Exact(key) => key.category(),
            KeyPattern::Category(category) => *category,
        }
    }
}

impl From<QueryKey> for KeyPattern {
    fn from(key: QueryKey) -> Self {
        KeyPattern::Exact(key)
    }
}

impl From<Category> for KeyPattern {
    fn from(category: Category) -> Self {
        KeyPattern::Category(category)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Exact(key) => write!(f, "{key}"),
            KeyPattern::Category(category) => write!(f, "{category}/*"),
        }
    }
}

/// A write and the ids needed to work out what it makes stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    SaveProfile,
    CreatePost,
    DeletePost { post_id: PostId },
    ReportPost { post_id: PostId },
    SetPostReaction { post_id: PostId },
    RemovePostReaction { post_id: PostId },
    CreateComment { post_id: PostId },
    DeleteComment { post_id: PostId, comment_id: CommentId },
    ReportComment { post_id: PostId, comment_id: CommentId },
    SetCommentReaction { post_id: PostId, comment_id: CommentId },
    RemoveCommentReaction { post_id: PostId, comment_id: CommentId },
    ClearPostReports { post_id: PostId },
    ClearCommentReports { comment_id: CommentId },
    ClearFlaggedPost { post_id: PostId },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::SaveProfile => "save_profile",
            Mutation::CreatePost => "create_post",
            Mutation::DeletePost { .. } => "delete_post",
            Mutation::ReportPost { .. } => "report_post",
            Mutation::SetPostReaction { .. } => "set_post_reaction",
            Mutation::RemovePostReaction { .. } => "remove_post_reaction",
            Mutation::CreateComment { .. } => "create_comment",
            Mutation::DeleteComment { .. } => "delete_comment",
            Mutation::ReportComment { .. } => "report_comment",
            Mutation::SetCommentReaction { .. } => "set_comment_reaction",
            Mutation::RemoveCommentReaction { .. } => "remove_comment_reaction",
            Mutation::ClearPostReports { .. } => "clear_post_reports",
            Mutation::ClearCommentReports { .. } => "clear_comment_reports",
            Mutation::ClearFlaggedPost { .. } => "clear_flagged_post",
        }
    }

    /// Reads to mark stale once this write has succeeded
    pub fn invalidations(&self) -> Vec<KeyPattern> {
        use QueryKey as K;

        let keys = match *self {
            Mutation::SaveProfile => vec![K::CurrentUserProfile],
            Mutation::CreatePost => vec![K::PostsPaginated],
            Mutation::DeletePost { post_id } => vec![K::PostsPaginated, K::Post(post_id)],
            Mutation::ReportPost { post_id } => vec![K::Post(post_id), K::ReportedPosts],
            Mutation::SetPostReaction { post_id } | Mutation::RemovePostReaction { post_id } => {
                vec![K::Post(post_id), K::PostReaction(post_id)]
            }
            Mutation::CreateComment { post_id } => vec![K::Comments(post_id)],
            Mutation::DeleteComment { post_id, .. } | Mutation::ReportComment { post_id, .. } => {
                vec![K::Comments(post_id), K::ReportedComments]
            }
            Mutation::SetCommentReaction {
                post_id,
                comment_id,
            }
            | Mutation::RemoveCommentReaction {
                post_id,
                comment_id,
            } => vec![K::Comments(post_id), K::CommentReaction(comment_id)],
            Mutation::ClearPostReports { .. } => vec![K::ReportedPosts],
            Mutation::ClearCommentReports { .. } => vec![K::ReportedComments],
            Mutation::ClearFlaggedPost { .. } => vec![K::FlaggedPosts],
        };

        keys.into_iter().map(KeyPattern::Exact).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_segments() {
        assert_eq!(QueryKey::Post(42).segments(), vec!["post", "42"]);
        assert_eq!(QueryKey::Comments(7).segments(), vec!["comments", "7"]);
        assert_eq!(QueryKey::PostsPaginated.segments(), vec!["posts", "paginated"]);
        assert_eq!(
            QueryKey::Username(Principal::new("abc-123")).to_string(),
            "username/abc-123"
        );
        assert_eq!(QueryKey::IsAdmin.segments(), vec!["isAdmin"]);
    }

    #[test]
    fn test_keys_with_different_parameters_differ() {
        assert_ne!(QueryKey::Post(1), QueryKey::Post(2));
        assert_ne!(QueryKey::Post(1), QueryKey::PostReaction(1));
        assert_eq!(QueryKey::Comments(3), QueryKey::Comments(3));
    }

    #[test]
    fn test_pattern_matching() {
        let exact = KeyPattern::from(QueryKey::Post(1));
        assert!(exact.matches(&QueryKey::Post(1)));
        assert!(!exact.matches(&QueryKey::Post(2)));

        let category = KeyPattern::from(Category::Post);
        assert!(category.matches(&QueryKey::Post(1)));
        assert!(category.matches(&QueryKey::Post(2)));
        assert!(!category.matches(&QueryKey::PostReaction(1)));
        assert_eq!(category.to_string(), "post/*");
    }

    #[test]
    fn test_post_invalidations() {
        assert_eq!(
            Mutation::CreatePost.invalidations(),
            vec![KeyPattern::Exact(QueryKey::PostsPaginated)]
        );
        assert_eq!(
            Mutation::DeletePost { post_id: 5 }.invalidations(),
            vec![
                KeyPattern::Exact(QueryKey::PostsPaginated),
                KeyPattern::Exact(QueryKey::Post(5)),
            ]
        );
        assert_eq!(
            Mutation::ReportPost { post_id: 5 }.invalidations(),
            vec![
                KeyPattern::Exact(QueryKey::Post(5)),
                KeyPattern::Exact(QueryKey::ReportedPosts),
            ]
        );
        assert_eq!(
            Mutation::RemovePostReaction { post_id: 5 }.invalidations(),
            vec![
                KeyPattern::Exact(QueryKey::Post(5)),
                KeyPattern::Exact(QueryKey::PostReaction(5)),
            ]
        );
    }

    #[test]
    fn test_comment_invalidations() {
        assert_eq!(
            Mutation::CreateComment { post_id: 2 }.invalidations(),
            vec![KeyPattern::Exact(QueryKey::Comments(2))]
        );
        let expected = vec![
            KeyPattern::Exact(QueryKey::Comments(2)),
            KeyPattern::Exact(QueryKey::ReportedComments),
        ];
        assert_eq!(
            Mutation::DeleteComment {
                post_id: 2,
                comment_id: 9
            }
            .invalidations(),
            expected
        );
        assert_eq!(
            Mutation::ReportComment {
                post_id: 2,
                comment_id: 9
            }
            .invalidations(),
            expected
        );
        assert_eq!(
            Mutation::SetCommentReaction {
                post_id: 2,
                comment_id: 9
            }
            .invalidations(),
            vec![
                KeyPattern::Exact(QueryKey::Comments(2)),
                KeyPattern::Exact(QueryKey::CommentReaction(9)),
            ]
        );
    }

    #[test]
    fn test_admin_and_profile_invalidations() {
        assert_eq!(
            Mutation::SaveProfile.invalidations(),
            vec![KeyPattern::Exact(QueryKey::CurrentUserProfile)]
        );
        assert_eq!(
            Mutation::ClearPostReports { post_id: 1 }.invalidations(),
            vec![KeyPattern::Exact(QueryKey::ReportedPosts)]
        );
        assert_eq!(
            Mutation::ClearCommentReports { comment_id: 1 }.invalidations(),
            vec![KeyPattern::Exact(QueryKey::ReportedComments)]
        );
        assert_eq!(
            Mutation::ClearFlaggedPost { post_id: 1 }.invalidations(),
            vec![KeyPattern::Exact(QueryKey::FlaggedPosts)]
        );
    }

    #[test]
    fn test_every_category_listed_once() {
        for category in Category::ALL {
            assert_eq!(
                Category::ALL.iter().filter(|c| **c == category).count(),
                1,
                "{category}"
            );
        }
    }
}
