//! # crudblog - GraphQL Blog Client
//!
//! crudblog lists, views, creates, updates and deletes blog posts held by a
//! hosted GraphQL backend. Anonymous visitors read with the shared API key;
//! signed-in users write with their user-pool id token, and only the owner
//! of a post may change it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crudblog::{Action, BlogController, LocalAuthenticator, MemoryBackend, PostRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(MemoryBackend::new("da2-local"));
//!     backend.setup_sample_posts().await;
//!
//!     let mut blog = BlogController::new(
//!         PostRepository::new(backend),
//!         Arc::new(LocalAuthenticator::new()),
//!         "da2-local",
//!     );
//!     blog.start().await?;
//!     blog.sign_in("alice", "").await?;
//!
//!     blog.dispatch(Action::EditTitle("Hello".into()))?;
//!     blog.dispatch(Action::EditContent("First post".into()))?;
//!     blog.submit().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cognito;
pub mod config;
pub mod connection;
pub mod error;
pub mod memory;
pub mod message;
pub mod model;
pub mod operations;
pub mod repository;
pub mod service;
pub mod state;
pub mod token;

pub use auth::{can_modify, select_credentials, AuthMode, Authenticator, Credentials, LocalAuthenticator, Session};
pub use cognito::{CognitoAuthenticator, SessionStore, UserPoolConfig};
pub use config::Settings;
pub use connection::{ConnectionConfig, HttpTransport, Transport};
pub use memory::MemoryBackend;
pub use message::{GraphQLError, GraphQLRequest, GraphQLResponse};
pub use model::{Post, PostId, PostSummary};
pub use repository::PostRepository;
pub use state::{Action, AppState, EditBuffer, EditMode};

pub use service::BlogController;
pub use error::{BlogError, Result};
