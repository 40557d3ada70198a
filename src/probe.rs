//! The probe itself: connect, run `SELECT version();`, report, disconnect.

use crate::config::Config;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Errors the probe can surface.
///
/// Two broad categories (database-layer vs. anything else), plus the
/// zero-rows case, which the client library would otherwise turn into an
/// opaque decoding failure. The caller decides exit-code and logging policy.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Error: query returned no rows")]
    EmptyResult,
    #[error("Error: {0}")]
    Other(#[source] anyhow::Error),
}

/// One successful probe: the first column of the first row of the fixed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub version: String,
}

impl ProbeReport {
    /// The two-line success payload: the fixed label followed by the server
    /// version string.
    pub fn render(&self) -> String {
        format!("PostgreSQL version:\n{}", self.version)
    }
}

/// Seam between the probe's sequencing and the database client, so release
/// behavior is assertable without a live server.
#[async_trait]
pub trait VersionSource {
    /// Execute `SELECT version();` and fetch at most one row.
    async fn fetch_version(&mut self) -> Result<Option<String>, ProbeError>;

    /// Release the session.
    async fn close(&mut self);
}

/// Production source backed by a single-connection sqlx pool.
pub struct PgVersionSource {
    pool: PgPool,
}

impl PgVersionSource {
    /// Open a session from the connection descriptor. The pool holds at most
    /// one connection, and the acquire timeout bounds the connection attempt.
    pub async fn connect(config: &Config) -> Result<Self, ProbeError> {
        let connect_options = PgConnectOptions::from_str(&config.database_url)?;

        let pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(connect_options)
            .await?;

        debug!(
            acquire_timeout_secs = config.connect_timeout_secs,
            "database session established"
        );
        Ok(Self { pool })
    }
}

#[async_trait]
impl VersionSource for PgVersionSource {
    async fn fetch_version(&mut self) -> Result<Option<String>, ProbeError> {
        let row = sqlx::query_scalar::<_, String>("SELECT version();")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn close(&mut self) {
        self.pool.close().await;
    }
}

/// Run the probe against an open source.
///
/// The source is closed on every exit path, success or failure, before the
/// result is surfaced. Zero rows from the version query is reported as its
/// own error rather than being treated as success.
pub async fn run<S: VersionSource + Send>(source: &mut S) -> Result<ProbeReport, ProbeError> {
    let fetched = source.fetch_version().await;
    source.close().await;

    match fetched? {
        Some(version) => Ok(ProbeReport { version }),
        None => Err(ProbeError::EmptyResult),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test double that serves one scripted fetch result and counts closes.
    struct ScriptedSource {
        result: Option<Result<Option<String>, ProbeError>>,
        close_calls: usize,
    }

    impl ScriptedSource {
        fn new(result: Result<Option<String>, ProbeError>) -> Self {
            Self {
                result: Some(result),
                close_calls: 0,
            }
        }
    }

    #[async_trait]
    impl VersionSource for ScriptedSource {
        async fn fetch_version(&mut self) -> Result<Option<String>, ProbeError> {
            self.result.take().expect("fetch_version called more than once")
        }

        async fn close(&mut self) {
            self.close_calls += 1;
        }
    }

    #[tokio::test]
    async fn reports_first_column_of_first_row() {
        let mut source = ScriptedSource::new(Ok(Some(
            "PostgreSQL 16.2 on x86_64-pc-linux-gnu".to_owned(),
        )));

        let report = run(&mut source).await.expect("probe should succeed");

        assert_eq!(report.version, "PostgreSQL 16.2 on x86_64-pc-linux-gnu");
        assert_eq!(source.close_calls, 1);
    }

    #[tokio::test]
    async fn closes_exactly_once_on_fetch_failure() {
        let mut source =
            ScriptedSource::new(Err(ProbeError::Other(anyhow::anyhow!("network dropped"))));

        let err = run(&mut source).await.expect_err("probe should fail");

        assert!(matches!(err, ProbeError::Other(_)));
        assert_eq!(source.close_calls, 1);
    }

    #[tokio::test]
    async fn empty_result_is_reported_after_close() {
        let mut source = ScriptedSource::new(Ok(None));

        let err = run(&mut source).await.expect_err("probe should fail");

        assert!(matches!(err, ProbeError::EmptyResult));
        assert_eq!(source.close_calls, 1);
    }

    #[tokio::test]
    async fn repeated_runs_carry_no_state() {
        for _ in 0..3 {
            let mut source = ScriptedSource::new(Ok(Some("PostgreSQL 16.2".to_owned())));
            let report = run(&mut source).await.expect("probe should succeed");
            assert_eq!(report.version, "PostgreSQL 16.2");
            assert_eq!(source.close_calls, 1);
        }
    }

    #[test]
    fn report_renders_label_and_version_lines() {
        let report = ProbeReport {
            version: "PostgreSQL 16.2 on x86_64-pc-linux-gnu".to_owned(),
        };

        let rendered = report.render();

        assert_eq!(
            rendered,
            "PostgreSQL version:\nPostgreSQL 16.2 on x86_64-pc-linux-gnu"
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "PostgreSQL version:");
    }

    #[test]
    fn error_messages_keep_their_prefixes() {
        let database = ProbeError::Database(sqlx::Error::PoolTimedOut);
        assert!(database.to_string().starts_with("Database error: "));

        let other = ProbeError::Other(anyhow::anyhow!("unexpected"));
        assert_eq!(other.to_string(), "Error: unexpected");

        let empty = ProbeError::EmptyResult;
        assert_eq!(empty.to_string(), "Error: query returned no rows");
    }
}
