use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::Credentials;
use crate::connection::Transport;
use crate::error::{BlogError, Result};
use crate::model::{DeletedPost, Post, PostConnection, PostId};
use crate::operations::{self, CREATE_BLOG_POST, DELETE_BLOG_POST, LIST_BLOG_POSTS, UPDATE_BLOG_POST};

/// Upper bound on `listBlogPosts` pages followed by one `list` call
const MAX_PAGES: usize = 1_000;

/// Mediates every read and write of posts against the backend.
///
/// Credentials are chosen by the caller for each call; the repository never
/// holds session state.
#[derive(Clone)]
pub struct PostRepository {
    transport: Arc<dyn Transport>,
    page_size: Option<u32>,
}

impl PostRepository {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            page_size: None,
        }
    }

    /// Ask the backend for pages of at most `page_size` posts
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Fetch every post, following `nextToken` until the backend runs out
    pub async fn list(&self, credentials: &Credentials) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let request = operations::list_blog_posts(self.page_size, next_token.as_deref())?;
            let page: PostConnection = self
                .transport
                .execute(request, credentials)
                .await?
                .field(LIST_BLOG_POSTS)?;

            posts.extend(page.items);
            match page.next_token {
                Some(token) if Some(&token) != next_token.as_ref() => next_token = Some(token),
                Some(_) => return Err(BlogError::api_error("listBlogPosts returned the same nextToken twice")),
                None => {
                    debug!("Fetched {} posts ({})", posts.len(), credentials.mode());
                    return Ok(posts);
                }
            }
        }

        Err(BlogError::api_error(format!(
            "listBlogPosts did not finish within {} pages",
            MAX_PAGES
        )))
    }

    /// Create a post.
    ///
    /// Empty (or whitespace-only) title or content is a no-op: nothing is
    /// sent and `None` comes back.
    pub async fn create(&self, credentials: &Credentials, title: &str, content: &str) -> Result<Option<Post>> {
        if title.trim().is_empty() || content.trim().is_empty() {
            debug!("Skipping create: title and content are both required");
            return Ok(None);
        }

        let request = operations::create_blog_post(title, content)?;
        let post: Post = self
            .transport
            .execute(request, credentials)
            .await?
            .field(CREATE_BLOG_POST)?;

        info!("📝 Created post {}", post.id);
        Ok(Some(post))
    }

    /// Overwrite the title and content of an existing post
    pub async fn update(&self, credentials: &Credentials, id: &PostId, title: &str, content: &str) -> Result<Post> {
        let request = operations::update_blog_post(id, title, content)?;
        let post: Post = self
            .transport
            .execute(request, credentials)
            .await?
            .field(UPDATE_BLOG_POST)?;

        info!("✏️ Updated post {}", post.id);
        Ok(post)
    }

    pub async fn delete(&self, credentials: &Credentials, id: &PostId) -> Result<PostId> {
        let request = operations::delete_blog_post(id)?;
        let deleted: DeletedPost = self
            .transport
            .execute(request, credentials)
            .await?
            .field(DELETE_BLOG_POST)?;

        info!("🗑️ Deleted post {}", deleted.id);
        Ok(deleted.id)
    }
}

impl std::fmt::Debug for PostRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostRepository")
            .field("transport", &self.transport.name())
            .field("page_size", &self.page_size)
            .finish()
    }
}
