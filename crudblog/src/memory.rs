//! In-process stand-in for the hosted GraphQL API.
//!
//! Serves the four blog operations from memory with the backend's
//! authorization rules: anyone holding the API key may list, only user-pool
//! callers may create, and only the owner may update or delete.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::Credentials;
use crate::connection::Transport;
use crate::error::{BlogError, Result};
use crate::message::{GraphQLError, GraphQLRequest, GraphQLResponse};
use crate::model::{
    CreateBlogPostInput, DeleteBlogPostInput, DeletedPost, Post, PostConnection, PostId, UpdateBlogPostInput,
};
use crate::operations::{CREATE_BLOG_POST, DELETE_BLOG_POST, LIST_BLOG_POSTS, UPDATE_BLOG_POST};
use crate::token;

/// Default number of posts returned per `listBlogPosts` page
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct InputVariables<T> {
    input: T,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListVariables {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    next_token: Option<String>,
}

/// A failure queued to be returned by the next call
#[derive(Debug, Clone)]
struct InjectedFailure {
    status: Option<u16>,
    error: GraphQLError,
}

pub fn generate_post_id() -> PostId {
    PostId::new(Uuid::new_v4().to_string())
}

/// In-memory blog backend implementing [`Transport`]
#[derive(Debug)]
pub struct MemoryBackend {
    api_key: String,
    page_size: usize,
    posts: RwLock<Vec<Post>>,
    failures: Mutex<VecDeque<InjectedFailure>>,
    calls: AtomicU64,
}

impl MemoryBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
            posts: RwLock::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Serve `listBlogPosts` in pages of `page_size`
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Seed a couple of posts so an offline session has something to show
    pub async fn setup_sample_posts(&self) {
        let mut posts = self.posts.write().await;
        let now = Utc::now();

        posts.push(Post {
            id: generate_post_id(),
            title: "Welcome to the blog!".to_string(),
            content: "This is the first post. Sign in to write your own.".to_string(),
            owner: Some("admin".to_string()),
            created_at: now,
            updated_at: Some(now),
        });
        posts.push(Post {
            id: generate_post_id(),
            title: "Working offline".to_string(),
            content: "Everything you write here lives in memory and is gone when the program exits.".to_string(),
            owner: Some("admin".to_string()),
            created_at: now,
            updated_at: Some(now),
        });

        info!("✅ Sample posts created");
    }

    /// Insert a post as-is, bypassing authorization
    pub async fn insert(&self, post: Post) {
        self.posts.write().await.push(post);
    }

    /// Snapshot of stored posts
    pub async fn posts(&self) -> Vec<Post> {
        self.posts.read().await.clone()
    }

    /// Number of requests served, including failed ones
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next call fail with `message`.
    ///
    /// `status` set means a transport-level rejection; `None` a GraphQL error.
    pub async fn fail_next(&self, status: Option<u16>, message: impl ToString) {
        self.failures.lock().await.push_back(InjectedFailure {
            status,
            error: GraphQLError::new(message),
        });
    }

    fn caller_identity(&self, credentials: &Credentials, field: &str) -> Result<Option<String>> {
        match credentials {
            Credentials::ApiKey(key) if *key == self.api_key => Ok(None),
            Credentials::ApiKey(_) => Err(BlogError::Api {
                status: Some(401),
                errors: vec![GraphQLError::new("You are not authorized to make this call.")
                    .with_error_type("UnauthorizedException")],
            }),
            Credentials::UserPool { id_token } => {
                let claims = token::parse_id_token(id_token).map_err(|_| unauthorized(field))?;
                if claims.expires_at().map(|exp| exp <= Utc::now()).unwrap_or(false) {
                    return Err(BlogError::Api {
                        status: Some(401),
                        errors: vec![GraphQLError::new("Token has expired.").with_error_type("UnauthorizedException")],
                    });
                }
                claims
                    .identity()
                    .map(|identity| Some(identity.to_string()))
                    .ok_or_else(|| unauthorized(field))
            }
        }
    }

    async fn list(&self, request: &GraphQLRequest) -> Result<GraphQLResponse> {
        let variables: ListVariables = if request.variables.is_null() {
            ListVariables::default()
        } else {
            request.deserialize_variables()?
        };
        let limit = variables.limit.unwrap_or(self.page_size).min(self.page_size).max(1);
        let offset = match variables.next_token.as_deref() {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| BlogError::api_error("Invalid nextToken"))?,
            None => 0,
        };

        let posts = self.posts.read().await;
        let items: Vec<Post> = posts.iter().skip(offset).take(limit).cloned().collect();
        let next = offset + items.len();
        let next_token = (next < posts.len()).then(|| next.to_string());

        debug!("Listed {} posts (offset {})", items.len(), offset);
        field_response(LIST_BLOG_POSTS, PostConnection { items, next_token })
    }

    async fn create(&self, request: &GraphQLRequest, owner: String) -> Result<GraphQLResponse> {
        let InputVariables { input } = request.deserialize_variables::<InputVariables<CreateBlogPostInput>>()?;
        let now = Utc::now();
        let post = Post {
            id: generate_post_id(),
            title: input.title,
            content: input.content,
            owner: Some(owner),
            created_at: now,
            updated_at: Some(now),
        };

        self.posts.write().await.push(post.clone());
        info!("📝 Created post {}", post.id);
        field_response(CREATE_BLOG_POST, post)
    }

    async fn update(&self, request: &GraphQLRequest, caller: &str) -> Result<GraphQLResponse> {
        let InputVariables { input } = request.deserialize_variables::<InputVariables<UpdateBlogPostInput>>()?;
        let mut posts = self.posts.write().await;

        match posts.iter_mut().find(|p| p.id == input.id) {
            Some(post) if post.is_owned_by(caller) => {
                post.title = input.title;
                post.content = input.content;
                post.updated_at = Some(Utc::now());
                info!("✏️ Updated post {}", post.id);
                field_response(UPDATE_BLOG_POST, post.clone())
            }
            _ => Ok(conditional_check_failed(UPDATE_BLOG_POST)),
        }
    }

    async fn delete(&self, request: &GraphQLRequest, caller: &str) -> Result<GraphQLResponse> {
        let InputVariables { input } = request.deserialize_variables::<InputVariables<DeleteBlogPostInput>>()?;
        let mut posts = self.posts.write().await;

        match posts.iter().position(|p| p.id == input.id && p.is_owned_by(caller)) {
            Some(index) => {
                let removed = posts.remove(index);
                info!("🗑️ Deleted post {}", removed.id);
                field_response(DELETE_BLOG_POST, DeletedPost { id: removed.id })
            }
            None => Ok(conditional_check_failed(DELETE_BLOG_POST)),
        }
    }
}

fn field_response(field: &str, value: impl serde::Serialize) -> Result<GraphQLResponse> {
    let mut data = serde_json::Map::new();
    data.insert(field.to_string(), serde_json::to_value(value)?);
    GraphQLResponse::success(serde_json::Value::Object(data))
}

fn unauthorized(field: &str) -> BlogError {
    BlogError::Api {
        status: None,
        errors: vec![GraphQLError::new(format!("Not Authorized to access {} on type Mutation", field))
            .with_error_type("Unauthorized")
            .with_path(field)],
    }
}

fn conditional_check_failed(field: &str) -> GraphQLResponse {
    let mut data = serde_json::Map::new();
    data.insert(field.to_string(), serde_json::Value::Null);
    GraphQLResponse {
        data: Some(serde_json::Value::Object(data)),
        errors: vec![GraphQLError::new("The conditional request failed")
            .with_error_type("DynamoDB:ConditionalCheckFailedException")
            .with_path(field)],
    }
}

#[async_trait]
impl Transport for MemoryBackend {
    async fn execute(&self, request: GraphQLRequest, credentials: &Credentials) -> Result<GraphQLResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = self.failures.lock().await.pop_front() {
            debug!("Returning injected failure for {}", request.name());
            return match failure.status {
                Some(status) => Err(BlogError::Api {
                    status: Some(status),
                    errors: vec![failure.error],
                }),
                None => Ok(GraphQLResponse::error(failure.error)),
            };
        }

        let field = match request.name() {
            "ListBlogPosts" => LIST_BLOG_POSTS,
            "CreateBlogPost" => CREATE_BLOG_POST,
            "UpdateBlogPost" => UPDATE_BLOG_POST,
            "DeleteBlogPost" => DELETE_BLOG_POST,
            other => {
                return Ok(GraphQLResponse::error(
                    GraphQLError::new(format!("Unknown operation '{}'", other)).with_error_type("ValidationError"),
                ))
            }
        };

        let caller = match self.caller_identity(credentials, field) {
            Ok(caller) => caller,
            Err(BlogError::Api { status: None, errors }) => return Ok(GraphQLResponse { data: None, errors }),
            Err(e) => return Err(e),
        };

        if field == LIST_BLOG_POSTS {
            return self.list(&request).await;
        }

        let Some(caller) = caller else {
            return Ok(GraphQLResponse::error(
                GraphQLError::new(format!("Not Authorized to access {} on type Mutation", field))
                    .with_error_type("Unauthorized")
                    .with_path(field),
            ));
        };

        match field {
            CREATE_BLOG_POST => self.create(&request, caller).await,
            UPDATE_BLOG_POST => self.update(&request, &caller).await,
            _ => self.delete(&request, &caller).await,
        }
    }

    fn name(&self) -> &'static str {
        "MemoryBackend"
    }
}
