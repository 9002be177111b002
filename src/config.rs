use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rustc_hash::FxHashSet;

/// Paths never served, whatever the configuration adds. Directories cover
/// everything beneath them.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "courier",
    "Cargo.toml",
    "Cargo.lock",
    "src",
    "tests",
    "target",
];

/// Files SQLite keeps next to the database.
const DATABASE_SIDECARS: &[&str] = &["-journal", "-wal", "-shm"];

#[derive(Parser, Debug, Clone)]
#[command(name = "courier")]
#[command(about = "Static files and a `messages` REST resource over hand-rolled HTTP/1.1", long_about = None)]
pub struct Config {
    #[arg(long, env = "COURIER_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(short, long, env = "COURIER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Document root for static files
    #[arg(long, env = "COURIER_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// SQLite database holding messages
    #[arg(long, env = "COURIER_DATABASE", default_value = "messages.db")]
    pub database: PathBuf,

    /// Extra paths to refuse, comma separated
    #[arg(long = "deny", env = "COURIER_DENY", value_delimiter = ',')]
    pub deny: Vec<String>,

    #[arg(long, env = "COURIER_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(long, env = "COURIER_MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
    pub max_body_bytes: usize,
}

impl Config {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Built-in entries, the database and its sidecar files, and anything
    /// passed with `--deny`.
    ///
    /// `--database` is relative to the working directory, not to `--root`,
    /// so it goes in as an absolute path.
    pub fn denylist(&self) -> FxHashSet<String> {
        let mut deny: FxHashSet<String> = DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect();
        let database = std::path::absolute(&self.database)
            .unwrap_or_else(|_| self.database.clone())
            .to_string_lossy()
            .into_owned();
        deny.extend(DATABASE_SIDECARS.iter().map(|suffix| format!("{database}{suffix}")));
        deny.insert(database);
        deny.extend(self.deny.iter().filter(|s| !s.is_empty()).cloned());
        deny
    }
}
