use std::sync::Arc;

use chrono::Duration;
use crudblog::{
    select_credentials, Action, AuthMode, Authenticator, BlogController, BlogError, Credentials,
    LocalAuthenticator, MemoryBackend, PostRepository, Session,
};

const API_KEY: &str = "da2-integration";

async fn blog(backend: &Arc<MemoryBackend>, authenticator: LocalAuthenticator) -> BlogController {
    let mut controller = BlogController::new(
        PostRepository::new(backend.clone()).with_page_size(2),
        Arc::new(authenticator),
        API_KEY,
    );
    controller.start().await.unwrap();
    controller
}

async fn credentials_for(user: &str) -> Credentials {
    let session = LocalAuthenticator::new().sign_in(user, "").await.unwrap();
    select_credentials(&session, API_KEY)
}

#[tokio::test]
async fn test_full_post_lifecycle() {
    let backend = Arc::new(MemoryBackend::new(API_KEY).with_page_size(2));
    backend.setup_sample_posts().await;
    let mut controller = blog(&backend, LocalAuthenticator::new()).await;
    assert_eq!(controller.state().posts().len(), 2);

    controller.sign_in("writer", "secret").await.unwrap();
    controller.dispatch(Action::EditTitle("Lifecycle".into())).unwrap();
    controller.dispatch(Action::EditContent("x".repeat(150))).unwrap();
    let created = controller.submit().await.unwrap().unwrap();

    let listed = controller.state().post(&created.id).unwrap();
    assert_eq!(listed.owner.as_deref(), Some("writer"));
    assert_eq!(listed.preview().chars().count(), 102);
    assert!(listed.preview().ends_with("..."));

    controller.dispatch(Action::BeginUpdate(created.id.clone())).unwrap();
    controller.dispatch(Action::EditTitle("Lifecycle, revised".into())).unwrap();
    controller.submit().await.unwrap();
    assert_eq!(
        controller.state().post(&created.id).unwrap().title,
        "Lifecycle, revised"
    );

    controller.delete(&created.id).await.unwrap();
    assert!(controller.state().post(&created.id).is_none());
    assert_eq!(backend.posts().await.len(), 2);
}

#[tokio::test]
async fn test_anonymous_reads_use_api_key() {
    let anonymous = select_credentials(&Session::anonymous(), API_KEY);
    assert_eq!(anonymous.mode(), AuthMode::ApiKey);
    assert_eq!(credentials_for("reader").await.mode(), AuthMode::UserPool);

    let backend = Arc::new(MemoryBackend::new(API_KEY));
    backend.setup_sample_posts().await;
    let repository = PostRepository::new(backend.clone());
    assert_eq!(repository.list(&anonymous).await.unwrap().len(), 2);

    let wrong_key = Credentials::ApiKey("da2-wrong".into());
    let err = repository.list(&wrong_key).await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_backend_enforces_ownership() {
    let backend = Arc::new(MemoryBackend::new(API_KEY));
    let repository = PostRepository::new(backend.clone());
    let alice = credentials_for("alice").await;
    let mallory = credentials_for("mallory").await;

    let post = repository.create(&alice, "Mine", "Hands off").await.unwrap().unwrap();

    let update = repository.update(&mallory, &post.id, "Yours", "now").await;
    assert!(matches!(update, Err(BlogError::Api { .. })));
    let delete = repository.delete(&mallory, &post.id).await;
    assert!(matches!(delete, Err(BlogError::Api { .. })));

    let stored = backend.posts().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Mine");
}

#[tokio::test]
async fn test_expired_session_falls_back_to_reading() {
    let backend = Arc::new(MemoryBackend::new(API_KEY));
    backend.setup_sample_posts().await;
    let mut controller = blog(&backend, LocalAuthenticator::new().with_token_lifetime(Duration::zero())).await;

    controller.sign_in("brief", "").await.unwrap();
    assert!(!controller.state().session().is_authenticated());
    assert_eq!(controller.state().posts().len(), 2);

    assert!(matches!(controller.submit().await, Err(BlogError::NotAuthenticated)));
    assert_eq!(backend.posts().await.len(), 2);
}

#[tokio::test]
async fn test_transport_failure_leaves_list_unchanged() {
    let backend = Arc::new(MemoryBackend::new(API_KEY));
    backend.setup_sample_posts().await;
    let mut controller = blog(&backend, LocalAuthenticator::new()).await;
    controller.sign_in("writer", "").await.unwrap();
    let before = controller.state().posts().to_vec();

    backend.fail_next(Some(502), "Bad Gateway").await;
    controller.dispatch(Action::EditTitle("Lost".into())).unwrap();
    let err = controller.submit().await.unwrap_err();

    assert!(err.is_recoverable());
    assert_eq!(controller.state().posts(), before.as_slice());
    assert_eq!(controller.state().buffer().title, "Lost");
    assert!(controller.state().last_error().unwrap().contains("Bad Gateway"));
}
