mod cli;
mod render;
mod shell;

use anyhow::Context;
use clap::Parser;
use crudblog::{
    Action, Authenticator, BlogController, CognitoAuthenticator, HttpTransport, LocalAuthenticator, MemoryBackend,
    PostRepository, SessionStore, Settings,
};
use std::sync::Arc;
use time::macros::format_description;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use shell::{resolve_id, Shell};

const OFFLINE_API_KEY: &str = "da2-offline";

fn init_tracing(verbose: bool) {
    let time_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let timer = UtcTime::new(time_format);
    let default_filter = if verbose { "crudblog=debug" } else { "crudblog=warn" };

    tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Wire the controller to the hosted API, or to an in-memory backend offline
async fn build_controller(cli: &Cli) -> anyhow::Result<BlogController> {
    if cli.offline {
        let backend = Arc::new(MemoryBackend::new(OFFLINE_API_KEY));
        backend.setup_sample_posts().await;
        info!("📦 Offline mode: posts live in memory until exit");
        return Ok(BlogController::new(
            PostRepository::new(backend),
            Arc::new(LocalAuthenticator::new()),
            OFFLINE_API_KEY,
        ));
    }

    let settings = Settings::load(cli.config.as_deref(), cli.amplify_config.as_deref())
        .context("Failed to load configuration")?;
    settings.require_remote()?;

    let transport = Arc::new(HttpTransport::with_config(settings.connection_config())?);
    let mut repository = PostRepository::new(transport);
    if let Some(page_size) = settings.api.page_size {
        repository = repository.with_page_size(page_size);
    }

    let pool = settings
        .user_pool_config()
        .context("auth.client_id is not set; the user pool is required to sign in")?;
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(CognitoAuthenticator::new(pool, SessionStore::new(&settings.session.path))?);

    info!("🔗 Using GraphQL endpoint {}", settings.api.endpoint);
    Ok(BlogController::new(repository, authenticator, settings.api.api_key.clone()))
}

async fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    lines
        .next_line()
        .await?
        .context("No password given on stdin")
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut blog = build_controller(&cli).await?;

    match cli.command {
        Command::List => {
            blog.start().await?;
            println!("{}", render::post_list(blog.state()));
        }
        Command::View { id } => {
            blog.start().await?;
            let id = resolve_id(blog.state(), &id);
            blog.dispatch(Action::View(id))?;
            if let Some(post) = blog.state().viewed() {
                println!("{}", render::post_view(post));
            }
        }
        Command::Create { title, content } => {
            blog.start().await?;
            blog.dispatch(Action::EditTitle(title))?;
            blog.dispatch(Action::EditContent(content))?;
            match blog.submit().await? {
                Some(post) => println!("Created {}", post.id),
                None => warn!("Nothing to create: title and content are both required"),
            }
        }
        Command::Update { id, title, content } => {
            blog.start().await?;
            let id = resolve_id(blog.state(), &id);
            blog.dispatch(Action::BeginUpdate(id))?;
            if let Some(title) = title {
                blog.dispatch(Action::EditTitle(title))?;
            }
            if let Some(content) = content {
                blog.dispatch(Action::EditContent(content))?;
            }
            if let Some(post) = blog.submit().await? {
                println!("Updated {}", post.id);
            }
        }
        Command::Delete { id } => {
            blog.start().await?;
            let id = resolve_id(blog.state(), &id);
            blog.delete(&id).await?;
            println!("Deleted {}", id);
        }
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password().await?,
            };
            blog.sign_in(&username, &password).await?;
            println!("{}", render::header(blog.state()));
        }
        Command::Logout => {
            blog.sign_out().await?;
            println!("Signed out");
        }
        Command::Whoami => {
            blog.start().await?;
            match blog.state().session().identity() {
                Some(identity) => println!("{}", identity),
                None => println!("Not signed in"),
            }
        }
        Command::Shell => {
            blog.start().await?;
            Shell::new(blog).run().await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    info!("🚀 Starting crudblog");
    run(cli).await
}
