use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::{self, Authenticator, Credentials};
use crate::error::{BlogError, Result};
use crate::model::{Post, PostId};
use crate::repository::PostRepository;
use crate::state::{Action, AppState, Submission};

/// Drives the blog: owns the [`AppState`] and sequences backend calls.
///
/// Every mutation waits for the backend's acknowledgment before the full
/// list is re-fetched. Failures are recorded in the state as the last error
/// and returned to the caller.
pub struct BlogController {
    repository: PostRepository,
    authenticator: Arc<dyn Authenticator>,
    api_key: String,
    state: AppState,
}

impl BlogController {
    pub fn new(repository: PostRepository, authenticator: Arc<dyn Authenticator>, api_key: impl Into<String>) -> Self {
        Self {
            repository,
            authenticator,
            api_key: api_key.into(),
            state: AppState::default(),
        }
    }

    /// Pick up the stored session and load the first list
    pub async fn start(&mut self) -> Result<()> {
        info!("🚀 Starting blog controller ({})", self.authenticator.name());
        self.refresh().await?;
        info!("✅ Loaded {} posts", self.state.posts().len());
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Apply a local action, recording a rejection as the last error
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        let result = self.state.reduce(action);
        self.record(result)
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!("❌ {}", e);
            // Reducing RequestFailed cannot fail.
            let _ = self.state.reduce(Action::RequestFailed(e.to_string()));
        }
        result
    }

    /// Read the session and choose credentials for the next call
    async fn credentials(&mut self) -> Result<Credentials> {
        let session = self.authenticator.current_session().await;
        let session = self.record(session)?;
        if &session != self.state.session() {
            debug!("Session changed; authenticated: {}", session.is_authenticated());
            self.state.reduce(Action::SessionChanged(session.clone()))?;
        }
        Ok(auth::select_credentials(&session, &self.api_key))
    }

    async fn mutation_credentials(&mut self) -> Result<Credentials> {
        let credentials = self.credentials().await?;
        if !self.state.session().is_authenticated() {
            return self.record(Err(BlogError::NotAuthenticated));
        }
        Ok(credentials)
    }

    /// Re-fetch the full list from the backend
    pub async fn refresh(&mut self) -> Result<()> {
        let credentials = self.credentials().await?;
        let posts = self.repository.list(&credentials).await;
        let posts = self.record(posts)?;
        self.state.reduce(Action::PostsLoaded(posts))
    }

    /// Submit the edit buffer as a create or an update.
    ///
    /// A create with empty title or content sends nothing and returns `None`.
    /// On failure the buffer is kept so the edit can be retried.
    pub async fn submit(&mut self) -> Result<Option<Post>> {
        let credentials = self.mutation_credentials().await?;

        let result = match self.state.buffer().submission() {
            Submission::Create { title, content } => {
                let created = self.repository.create(&credentials, &title, &content).await;
                match created {
                    Ok(None) => return Ok(None),
                    other => other,
                }
            }
            Submission::Update { id, title, content } => {
                let allowed = self.state.modifiable_post(&id).map(|_| ());
                self.record(allowed)?;
                self.repository.update(&credentials, &id, &title, &content).await.map(Some)
            }
        };

        let post = self.record(result)?;
        self.state.reduce(Action::SubmitSucceeded(post.clone()))?;
        self.refresh_after_mutation().await;
        Ok(post)
    }

    /// Delete a post: hidden locally at once, restored if the backend refuses
    pub async fn delete(&mut self, id: &PostId) -> Result<()> {
        let credentials = self.mutation_credentials().await?;
        let allowed = self.state.modifiable_post(id).map(|_| ());
        self.record(allowed)?;

        self.state.reduce(Action::DeletePending(id.clone()))?;
        match self.repository.delete(&credentials, id).await {
            Ok(_) => {
                self.state.reduce(Action::DeleteConfirmed(id.clone()))?;
                self.refresh_after_mutation().await;
                Ok(())
            }
            Err(e) => {
                error!("❌ Delete of {} failed: {}", id, e);
                self.state.reduce(Action::DeleteFailed(id.clone(), e.to_string()))?;
                Err(e)
            }
        }
    }

    async fn refresh_after_mutation(&mut self) {
        // The mutation already landed; a failed re-fetch only leaves a stale list.
        if let Err(e) = self.refresh().await {
            warn!("Re-fetch after mutation failed: {}", e);
        }
    }

    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<()> {
        let session = self.authenticator.sign_in(username, password).await;
        let session = self.record(session)?;
        self.state.reduce(Action::SessionChanged(session))?;
        self.state.reduce(Action::DismissError)?;
        self.refresh().await
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        let result = self.authenticator.sign_out().await;
        self.record(result)?;
        self.state.reduce(Action::SessionChanged(auth::Session::anonymous()))?;
        self.refresh().await
    }
}

impl std::fmt::Debug for BlogController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlogController")
            .field("repository", &self.repository)
            .field("authenticator", &self.authenticator.name())
            .field("posts", &self.state.posts().len())
            .finish()
    }
}
