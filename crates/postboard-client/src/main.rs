//! postboard-client: browse and write posts against a Postboard server.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use postboard_api_types::{CreatePostRequest, LoginRequest, PostsQueryParams};
use postboard_client::{ClientError, PostsClient, PostsQuery, QueryCache};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "postboard-client", version, about = "Postboard JSON API client", long_about = None)]
struct Cli {
    /// Server base URL, e.g. <http://127.0.0.1:3000>
    #[arg(long, env = "POSTBOARD_SITE_URL")]
    site: Option<String>,

    /// Session token from env (no CLI flag to keep it out of shell history)
    #[arg(hide = true, env = "POSTBOARD_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk the published feed page by page
    Feed(FeedArgs),
    /// Create a draft
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    /// Publish a draft you wrote
    Publish { id: Uuid },
    /// Sign in and print the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "POSTBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the signed-in user
    Whoami,
}

#[derive(Parser, Debug)]
struct FeedArgs {
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long)]
    limit: Option<u64>,
    #[arg(long = "search")]
    search_term: Option<String>,
    #[arg(long)]
    username: Option<String>,
    /// Number of consecutive pages to print
    #[arg(long, default_value_t = 1)]
    pages: u64,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("site URL is required (use --site or POSTBOARD_SITE_URL)")]
    MissingSite,
    #[error("session token is required (set POSTBOARD_TOKEN)")]
    MissingToken,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{0}")]
    Query(String),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("POSTBOARD_CLIENT_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let site = cli.site.ok_or(CliError::MissingSite)?;
    let client = PostsClient::new(&site)?;
    let client = match cli.token {
        Some(token) => client.with_token(token),
        None => client,
    };

    match cli.command {
        Commands::Feed(args) => feed(client, args).await,
        Commands::Create { title, content } => {
            require_token(&client)?;
            let post = client
                .create_post(&CreatePostRequest { title, content })
                .await?;
            print_json(&post)
        }
        Commands::Publish { id } => {
            require_token(&client)?;
            print_json(&client.publish_post(id).await?)
        }
        Commands::Login { email, password } => {
            let session = client.login(&LoginRequest { email, password }).await?;
            print_json(&session.user)?;
            if let Some(token) = session.token {
                println!("export POSTBOARD_TOKEN={token}");
            }
            Ok(())
        }
        Commands::Whoami => print_json(&client.current_user().await?),
    }
}

async fn feed(client: PostsClient, args: FeedArgs) -> Result<(), CliError> {
    let cache = Arc::new(QueryCache::default());
    let query = PostsQuery::new(Arc::new(client), cache.clone());
    let mut params = PostsQueryParams {
        page: Some(args.page),
        limit: args.limit,
        search_term: args.search_term,
        username: args.username,
    };

    for _ in 0..args.pages.max(1) {
        let state = query.set_params(params.clone()).await;
        if let Some(error) = state.error {
            return Err(CliError::Query(error.message));
        }
        let Some(page) = state.data else {
            break;
        };

        let meta = &page.pagination;
        println!(
            "page {}/{} (posts {}-{} of {})",
            meta.current_page, meta.pages_count, meta.from, meta.to, meta.total
        );
        for item in &page.items {
            println!(
                "  {}  {}  by @{}",
                item.post.id, item.post.title, item.author.username
            );
        }

        if !meta.has_more {
            break;
        }
        params.page = Some(meta.current_page + 1);
    }
    debug!(
        target = "postboard_client::feed",
        cached_pages = cache.len(),
        "feed finished"
    );
    Ok(())
}

fn require_token(client: &PostsClient) -> Result<(), CliError> {
    if client.has_token() {
        Ok(())
    } else {
        Err(CliError::MissingToken)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
