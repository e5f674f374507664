use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest content shown on a list card before it is cut
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Server-assigned post identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A blog post as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    /// Identity of the creator, filled in by the backend
    #[serde(default)]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Check whether `identity` owns this post
    pub fn is_owned_by(&self, identity: &str) -> bool {
        self.owner.as_deref() == Some(identity)
    }

    /// Content shortened for list views
    pub fn preview(&self) -> String {
        preview(&self.content)
    }

    /// Convert to summary for listings
    pub fn to_summary(&self) -> PostSummary {
        PostSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            owner: self.owner.clone(),
            created_at: self.created_at,
            preview: self.preview(),
        }
    }
}

/// Post summary for list views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub preview: String,
}

/// Shorten `content` to at most [`PREVIEW_MAX_CHARS`] characters.
///
/// Longer content keeps its first 99 characters and gains a `...` suffix.
pub fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_MAX_CHARS {
        let mut cut: String = content.chars().take(PREVIEW_MAX_CHARS - 1).collect();
        cut.push_str("...");
        cut
    } else {
        content.to_string()
    }
}

/// Input of `createBlogPost`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBlogPostInput {
    pub title: String,
    pub content: String,
}

/// Input of `updateBlogPost`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBlogPostInput {
    pub id: PostId,
    pub title: String,
    pub content: String,
}

/// Input of `deleteBlogPost`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteBlogPostInput {
    pub id: PostId,
}

/// Value returned by `deleteBlogPost`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedPost {
    pub id: PostId,
}

/// One page of `listBlogPosts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostConnection {
    pub items: Vec<Post>,
    #[serde(default)]
    pub next_token: Option<String>,
}
