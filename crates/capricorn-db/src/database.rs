//! Connection handle.

use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

use crate::error::Result;
use crate::schema;

/// Main database handle. Cheap to share behind an `Arc`; the client
/// pipelines concurrent queries over one connection.
pub struct Database {
    client: Client,
}

impl Database {
    /// Connect and drive the connection on a background task.
    pub async fn connect(url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Postgres connection closed with error");
            }
        });
        info!("Connected to Postgres");
        Ok(Self { client })
    }

    /// Get the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Round-trip check run once at startup.
    pub async fn ping(&self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Create the extension and tables if they don't exist.
    pub async fn initialize(&self, articles_table: &str, journal_table: &str) -> Result<()> {
        self.client
            .batch_execute(&schema::create_statements(articles_table, journal_table))
            .await?;
        info!(articles_table, journal_table, "Schema ready");
        Ok(())
    }
}
