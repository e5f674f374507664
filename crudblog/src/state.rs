//! Application state and the reducer that owns every change to it.
//!
//! Front ends never mutate [`AppState`] directly: they dispatch an [`Action`]
//! and render the result.

use std::collections::HashMap;
use tracing::debug;

use crate::auth::{self, Session};
use crate::error::{BlogError, Result};
use crate::model::{Post, PostId};

/// Title placed in a fresh edit buffer
pub const DEFAULT_TITLE: &str = "Blog Title";
/// Content placed in a fresh edit buffer
pub const DEFAULT_CONTENT: &str = "Blog Content";

/// Whether the edit buffer creates a new post or rewrites an existing one
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Create,
    Update(PostId),
}

/// Title/content being edited plus what a submit will do with them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    pub title: String,
    pub content: String,
    pub mode: EditMode,
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            content: DEFAULT_CONTENT.to_string(),
            mode: EditMode::Create,
        }
    }
}

impl EditBuffer {
    /// Buffer pre-filled from `post`, ready to update it
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            mode: EditMode::Update(post.id.clone()),
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self.mode, EditMode::Update(_))
    }

    /// Post targeted by an update, if any
    pub fn target(&self) -> Option<&PostId> {
        match &self.mode {
            EditMode::Update(id) => Some(id),
            EditMode::Create => None,
        }
    }

    /// What a submit of this buffer sends
    pub fn submission(&self) -> Submission {
        match &self.mode {
            EditMode::Create => Submission::Create {
                title: self.title.clone(),
                content: self.content.clone(),
            },
            EditMode::Update(id) => Submission::Update {
                id: id.clone(),
                title: self.title.clone(),
                content: self.content.clone(),
            },
        }
    }
}

/// A submit captured from the edit buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Create { title: String, content: String },
    Update { id: PostId, title: String, content: String },
}

/// Everything that can change [`AppState`]
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SessionChanged(Session),
    /// Authoritative list from a full re-fetch
    PostsLoaded(Vec<Post>),
    View(PostId),
    CloseView,
    BeginUpdate(PostId),
    CancelEdit,
    EditTitle(String),
    EditContent(String),
    /// Submit acknowledged; carries the server's copy (`None` for a skipped create)
    SubmitSucceeded(Option<Post>),
    DeletePending(PostId),
    DeleteConfirmed(PostId),
    DeleteFailed(PostId, String),
    RequestFailed(String),
    DismissError,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingDelete {
    index: usize,
    post: Post,
}

/// Local UI state: post list, edit buffer, view pane, session snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    posts: Vec<Post>,
    buffer: EditBuffer,
    viewed: Option<Post>,
    pending_deletes: HashMap<PostId, PendingDelete>,
    session: Session,
    last_error: Option<String>,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| &p.id == id)
    }

    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    pub fn viewed(&self) -> Option<&Post> {
        self.viewed.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_delete_pending(&self, id: &PostId) -> bool {
        self.pending_deletes.contains_key(id)
    }

    /// Whether the current session may update or delete `post`
    pub fn can_modify(&self, post: &Post) -> bool {
        auth::can_modify(&self.session, post)
    }

    fn require_authenticated(&self) -> Result<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(BlogError::NotAuthenticated)
        }
    }

    /// Look up a post the session is allowed to modify
    pub fn modifiable_post(&self, id: &PostId) -> Result<&Post> {
        self.require_authenticated()?;
        let post = self.post(id).ok_or_else(|| BlogError::NotFound {
            post_id: id.to_string(),
        })?;
        if !self.can_modify(post) {
            return Err(BlogError::Forbidden {
                post_id: id.to_string(),
            });
        }
        Ok(post)
    }

    /// Apply `action`. A rejected action leaves the state untouched.
    pub fn reduce(&mut self, action: Action) -> Result<()> {
        debug!("Reducing {:?}", ActionName(&action));

        match action {
            Action::SessionChanged(session) => {
                if !session.is_authenticated() {
                    self.buffer = EditBuffer::default();
                }
                self.session = session;
            }
            Action::PostsLoaded(posts) => {
                self.posts = posts
                    .into_iter()
                    .filter(|p| !self.pending_deletes.contains_key(&p.id))
                    .collect();
                let refreshed = self.viewed.as_ref().and_then(|v| self.post(&v.id).cloned());
                self.viewed = refreshed;
            }
            Action::View(id) => {
                let post = self.post(&id).cloned().ok_or_else(|| BlogError::NotFound {
                    post_id: id.to_string(),
                })?;
                self.viewed = Some(post);
            }
            Action::CloseView => self.viewed = None,
            Action::BeginUpdate(id) => {
                self.buffer = EditBuffer::from_post(self.modifiable_post(&id)?);
            }
            Action::CancelEdit => self.buffer = EditBuffer::default(),
            Action::EditTitle(title) => {
                self.require_authenticated()?;
                self.buffer.title = title;
            }
            Action::EditContent(content) => {
                self.require_authenticated()?;
                self.buffer.content = content;
            }
            Action::SubmitSucceeded(post) => {
                self.buffer = EditBuffer::default();
                self.last_error = None;
                if let Some(post) = post {
                    if self.viewed.as_ref().map(|v| v.id == post.id).unwrap_or(false) {
                        self.viewed = Some(post.clone());
                    }
                    match self.posts.iter_mut().find(|p| p.id == post.id) {
                        Some(existing) => *existing = post,
                        None => self.posts.push(post),
                    }
                }
            }
            Action::DeletePending(id) => {
                let index = self.posts.iter().position(|p| p.id == id).ok_or_else(|| BlogError::NotFound {
                    post_id: id.to_string(),
                })?;
                let post = self.posts.remove(index);
                self.pending_deletes.insert(id, PendingDelete { index, post });
            }
            Action::DeleteConfirmed(id) => {
                self.pending_deletes.remove(&id);
                self.posts.retain(|p| p.id != id);
                if self.viewed.as_ref().map(|v| v.id == id).unwrap_or(false) {
                    self.viewed = None;
                }
                if self.buffer.target() == Some(&id) {
                    self.buffer = EditBuffer::default();
                }
            }
            Action::DeleteFailed(id, error) => {
                if let Some(pending) = self.pending_deletes.remove(&id) {
                    let index = pending.index.min(self.posts.len());
                    self.posts.insert(index, pending.post);
                }
                self.last_error = Some(error);
            }
            Action::RequestFailed(error) => self.last_error = Some(error),
            Action::DismissError => self.last_error = None,
        }

        Ok(())
    }
}

/// Action variant name without its payload, for logs
struct ActionName<'a>(&'a Action);

impl std::fmt::Debug for ActionName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.0 {
            Action::SessionChanged(_) => "SessionChanged",
            Action::PostsLoaded(_) => "PostsLoaded",
            Action::View(_) => "View",
            Action::CloseView => "CloseView",
            Action::BeginUpdate(_) => "BeginUpdate",
            Action::CancelEdit => "CancelEdit",
            Action::EditTitle(_) => "EditTitle",
            Action::EditContent(_) => "EditContent",
            Action::SubmitSucceeded(_) => "SubmitSucceeded",
            Action::DeletePending(_) => "DeletePending",
            Action::DeleteConfirmed(_) => "DeleteConfirmed",
            Action::DeleteFailed(..) => "DeleteFailed",
            Action::RequestFailed(_) => "RequestFailed",
            Action::DismissError => "DismissError",
        };
        f.write_str(name)
    }
}
