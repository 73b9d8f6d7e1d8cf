use anyhow::Result;
use chirp::client::{FeedBackend, FeedClient};
use chirp::feed::{FeedService, DEFAULT_PAGE_LIMIT};
use chirp::server::{self, seed, session::SessionMap, AppState};
use chirp::storage::MemoryStorage;
use chirp::store::Store;
use chirp::ui::UI;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the feed server.
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
        /// JSON seed file provisioning users, follows, sessions and tweets.
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Browse feeds in the terminal.
    Browse {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
    /// Post a new tweet.
    Post {
        content: String,
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },
}

fn server_url(flag: Option<String>) -> String {
    flag.or_else(|| env::var("CHIRP_SERVER").ok())
        .unwrap_or_else(|| "http://127.0.0.1:3000".to_string())
}

fn session_token(flag: Option<String>) -> Option<String> {
    flag.or_else(|| env::var("CHIRP_SESSION").ok())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    match args.command {
        Command::Serve { addr, seed: seed_path } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            let storage = Arc::new(MemoryStorage::new());
            let sessions = match seed_path {
                Some(path) => seed::load(&path, &storage)?,
                None => SessionMap::default(),
            };
            let state = AppState {
                feed: FeedService::new(storage),
                sessions,
            };
            server::serve(addr, state).await
        }
        Command::Browse { server, session } => {
            let client = FeedClient::new(&server_url(server), session_token(session))?;
            let store = Arc::new(Store::new(Box::new(client), DEFAULT_PAGE_LIMIT));
            let mut ui = UI::new(store);
            ui.initialize()?;
            ui.event_loop().await
        }
        Command::Post {
            content,
            server,
            session,
        } => {
            let client = FeedClient::new(&server_url(server), session_token(session))?;
            let tweet = client.create_tweet(&content).await?;
            println!("posted {} at {}", tweet.id, tweet.created_at);
            Ok(())
        }
    }
}
