use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while bringing the process up; none of these occur per request.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured; set `database.url` or pass --database-url")]
    MissingDatabaseUrl,
    #[error("could not connect to the database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("upload directory `{}` is unusable: {source}", path.display())]
    UploadRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
