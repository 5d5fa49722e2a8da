//! `tally-server`: serve the sales dataset API over HTTP.
//!
//! Settings come from a TOML file (`--config`, default `config.toml`, may be
//! absent) overlaid with `TALLY_*` environment variables, e.g.
//! `TALLY_PORT=9000`. Each `[[users]]` entry needs an argon2 hash; run the
//! binary with `--hash-password` and type the password to get one.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, anyhow};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tally_server::{AppState, ServerConfig};
use tally_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, signal};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Merge, summarise and export sales spreadsheets")]
struct Args {
  /// TOML settings file. Missing files are skipped.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Hash a password read from stdin, print the PHC string, then exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let args = Args::parse();
  init_tracing();

  if args.hash_password {
    return print_password_hash();
  }

  let settings = load_settings(&args.config)?;
  serve(settings).await
}

fn init_tracing() {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(file: &Path) -> anyhow::Result<ServerConfig> {
  let mut settings: ServerConfig = config::Config::builder()
    .add_source(config::File::from(file).required(false))
    .add_source(config::Environment::with_prefix("TALLY"))
    .build()
    .and_then(|c| c.try_deserialize())
    .with_context(|| format!("invalid settings in {} or TALLY_* env", file.display()))?;

  settings.store_path = home_relative(&settings.store_path);
  settings.upload_dir = home_relative(&settings.upload_dir);
  if settings.users.is_empty() {
    warn!("no [[users]] configured, all requests will get 401");
  }
  Ok(settings)
}

async fn serve(settings: ServerConfig) -> anyhow::Result<()> {
  std::fs::create_dir_all(&settings.upload_dir)
    .with_context(|| format!("cannot create upload dir {}", settings.upload_dir.display()))?;
  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("cannot open record store {}", settings.store_path.display()))?;

  let bind = (settings.host.clone(), settings.port);
  let listener = TcpListener::bind(&bind)
    .await
    .with_context(|| format!("cannot listen on {}:{}", bind.0, bind.1))?;
  info!(address = %listener.local_addr()?, "tally-server ready");

  let app = tally_server::router(AppState::new(store, settings));
  axum::serve(listener, app)
    .with_graceful_shutdown(ctrl_c())
    .await
    .context("http server failed")
}

async fn ctrl_c() {
  match signal::ctrl_c().await {
    Ok(()) => info!("shutting down"),
    Err(e) => warn!(error = %e, "cannot listen for ctrl-c, shutdown only by kill"),
  }
}

fn print_password_hash() -> anyhow::Result<()> {
  use std::io::{BufRead as _, Write as _};

  eprint!("password: ");
  std::io::stderr().flush()?;
  let mut line = String::new();
  std::io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\r', '\n']);

  let salt = SaltString::generate(&mut OsRng);
  let phc = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow!("hashing failed: {e}"))?;
  println!("{phc}");
  Ok(())
}

/// `~/x` becomes `$HOME/x`; anything else is returned unchanged.
fn home_relative(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
