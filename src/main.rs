mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use session_request::state::{FileStorage, StateStorage};
use session_request::{ApiClient, ClientConfig, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "session-request", version, about = "Call the backend API with the stored session")]
struct Args {
    /// API base URL (overrides SESSION_API_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Directory the session is persisted in (defaults to the platform data dir)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Keep the session in the OS keychain instead of a file
    #[cfg(feature = "keyring-storage")]
    #[arg(long, conflicts_with = "store_dir")]
    keychain: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GET a path; parameters go in the query string
    Get {
        path: String,
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
    },
    /// DELETE a path; parameters go in the query string
    Delete {
        path: String,
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
    },
    /// POST a JSON body
    Post {
        path: String,
        #[arg(long)]
        body: Option<String>,
    },
    /// PUT a JSON body
    Put {
        path: String,
        #[arg(long)]
        body: Option<String>,
    },
    /// POST and save the binary response to a file
    Download {
        path: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        body: Option<String>,
    },
    /// Store an auth token
    Login {
        #[arg(long)]
        token: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Show the stored user info
    Whoami,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), String> {
    let mut config = ClientConfig::from_env().map_err(|e| e.to_string())?;
    if let Some(ref url) = args.base_url {
        config = config.with_base_url(url);
    }
    log::debug!("Using API base URL {}", config.base_url);

    let storage = open_storage(&args)?;
    let session = Arc::new(SessionStore::open(&config.store_id, storage));

    let api = ApiClient::builder(config)
        .session(session)
        .notifier(Arc::new(commands::ConsoleNotifier))
        .navigator(Arc::new(commands::ConsoleNavigator))
        .build()
        .map_err(|e| e.to_string())?;

    match args.command {
        Command::Get { path, query } => commands::get(&api, &path, &query).await,
        Command::Delete { path, query } => commands::delete(&api, &path, &query).await,
        Command::Post { path, body } => commands::post(&api, &path, body.as_deref()).await,
        Command::Put { path, body } => commands::put(&api, &path, body.as_deref()).await,
        Command::Download { path, out, body } => {
            commands::download(&api, &path, body.as_deref(), &out).await
        }
        Command::Login { token, name } => commands::login(&api, token, name).await,
        Command::Logout => commands::logout(&api).await,
        Command::Whoami => commands::whoami(&api).await,
    }
}

fn open_storage(args: &Args) -> Result<Arc<dyn StateStorage>, String> {
    if let Some(storage) = keychain_storage(args) {
        return Ok(storage);
    }

    let storage = match args.store_dir {
        Some(ref dir) => FileStorage::new(dir),
        None => FileStorage::default_location().map_err(|e| e.to_string())?,
    };
    log::debug!("Session storage: {}", storage.dir().display());
    Ok(Arc::new(storage))
}

#[cfg(feature = "keyring-storage")]
fn keychain_storage(args: &Args) -> Option<Arc<dyn StateStorage>> {
    args.keychain
        .then(|| Arc::new(session_request::state::KeyringStorage::default()) as Arc<dyn StateStorage>)
}

#[cfg(not(feature = "keyring-storage"))]
fn keychain_storage(_args: &Args) -> Option<Arc<dyn StateStorage>> {
    None
}
