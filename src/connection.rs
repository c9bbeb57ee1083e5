use std::fmt;

use bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::commands::{self, Command};
use crate::core::errors::GatewayError;

/// A live client plus the database every command on it runs against.
pub struct ConnectionHandle {
    client: Client,
    database: Database,
}

impl fmt::Debug for ConnectionHandle {
    // The connection string may carry credentials, so only the database is shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("database", &self.database.name())
            .finish()
    }
}

impl ConnectionHandle {
    /// Builds a client for `connection_string` and selects `database_name`.
    ///
    /// The driver connects lazily, so a malformed string fails here but an
    /// unreachable server only shows up on the first operation (or [`ping`]).
    ///
    /// [`ping`]: ConnectionHandle::ping
    pub async fn open(connection_string: &str, database_name: &str) -> Result<Self, GatewayError> {
        let options = ClientOptions::parse(connection_string)
            .await
            .map_err(GatewayError::Connection)?;
        let client = Client::with_options(options).map_err(GatewayError::Connection)?;
        let database = client.database(database_name);
        Ok(Self { client, database })
    }

    pub async fn ping(&self) -> Result<(), GatewayError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(GatewayError::Connection)?;
        Ok(())
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// Shuts the client down once its in-flight operations have finished.
    pub async fn close(self) {
        self.client.shutdown().await;
    }
}

/// Opens a handle for a single command and closes it afterwards, whether the
/// command succeeded or not.
pub async fn run_once(
    connection_string: &str,
    database_name: &str,
    command: Command,
) -> Result<Value, GatewayError> {
    let handle = ConnectionHandle::open(connection_string, database_name).await?;
    let outcome = commands::execute(handle.database(), command).await;
    handle.close().await;
    outcome
}

/// Owns at most one configured handle, shared by every request.
///
/// Commands hold the read lock for as long as they run and `configure` takes
/// the write lock, so a reconfiguration never pulls the client out from under
/// an in-flight command.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    slot: RwLock<Option<ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current handle with a fresh one for `database_name`.
    ///
    /// The new handle is opened and pinged without holding the lock, so
    /// commands are not stalled behind a slow or unreachable server. The lock
    /// is only taken to swap the handle in; the previous handle is closed
    /// after the swap. If the new handle fails, the previous one stays in place.
    pub async fn configure(
        &self,
        connection_string: &str,
        database_name: &str,
    ) -> Result<(), GatewayError> {
        let handle = ConnectionHandle::open(connection_string, database_name).await?;
        if let Err(e) = handle.ping().await {
            handle.close().await;
            return Err(e);
        }

        // Taking the write lock waits for commands still running on the
        // previous handle, so nothing uses it once it is swapped out.
        let previous = self.slot.write().await.replace(handle);
        tracing::info!(database = database_name, "database connection configured");

        if let Some(previous) = previous {
            tracing::info!(database = previous.database_name(), "closing previous connection");
            previous.close().await;
        }
        Ok(())
    }

    pub async fn is_configured(&self) -> bool {
        self.slot.read().await.is_some()
    }

    pub async fn execute(&self, command: Command) -> Result<Value, GatewayError> {
        let slot = self.slot.read().await;
        let handle = slot.as_ref().ok_or(GatewayError::NotConfigured)?;
        commands::execute(handle.database(), command).await
    }

    /// Closes the configured handle, if any.
    pub async fn shutdown(&self) {
        let handle = self.slot.write().await.take();
        if let Some(handle) = handle {
            tracing::info!(database = handle.database_name(), "closing database connection");
            handle.close().await;
        }
    }
}
