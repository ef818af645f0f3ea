//! Request-scoped database connections.
//!
//! A [`ConnectionScope`] is created per request. It opens a connection the
//! first time [`ConnectionScope::acquire`] is called, hands back the same
//! connection on later calls, and closes it in [`ConnectionScope::release`].
//! If the scope is dropped without being released (early return, panic,
//! cancelled future) the `Drop` impl releases the connection instead, so
//! every opened connection is released exactly once.

use async_trait::async_trait;
use common::errors::AppResult;
use common::middleware::RequestId;
use common::models::ResultSet;

/// An open database connection owned by a single request.
#[async_trait]
pub trait DbConnection: Send {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Executes a stored procedure with positional string parameters and
    /// buffers its first result set.
    async fn call_procedure(&mut self, procedure: &str, params: &[&str]) -> AppResult<ResultSet>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> AppResult<()>;
}

/// Opens new database connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection. Failures are reported as `AppError::DatabaseConnection`.
    async fn connect(&self) -> AppResult<Box<dyn DbConnection>>;
}

/// Owns at most one connection for the lifetime of a request.
pub struct ConnectionScope<'a> {
    connector: &'a dyn Connector,
    connection: Option<Box<dyn DbConnection>>,
    request_id: Option<RequestId>,
}

impl<'a> ConnectionScope<'a> {
    /// Creates an empty scope; nothing is opened until `acquire`.
    pub fn new(connector: &'a dyn Connector, request_id: Option<RequestId>) -> Self {
        Self {
            connector,
            connection: None,
            request_id,
        }
    }

    fn request_id(&self) -> &str {
        self.request_id.as_ref().map_or("-", RequestId::as_str)
    }

    /// Whether a connection is currently held.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns the scope's connection, opening it on first use.
    pub async fn acquire(&mut self) -> AppResult<&mut Box<dyn DbConnection>> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => match self.connector.connect().await {
                Ok(connection) => {
                    tracing::debug!(
                        request_id = %self.request_id(),
                        connection_id = %connection.id(),
                        "Database connection opened"
                    );
                    connection
                }
                Err(e) => {
                    tracing::error!(
                        request_id = %self.request_id(),
                        error = %e,
                        "Failed to open database connection"
                    );
                    return Err(e);
                }
            },
        };

        Ok(self.connection.insert(connection))
    }

    /// Closes the connection if one was opened. Close failures are logged only.
    pub async fn release(mut self) {
        if let Some(connection) = self.connection.take() {
            let connection_id = connection.id().to_string();
            match connection.close().await {
                Ok(()) => tracing::debug!(
                    request_id = %self.request_id(),
                    connection_id = %connection_id,
                    "Database connection closed"
                ),
                Err(e) => tracing::warn!(
                    request_id = %self.request_id(),
                    connection_id = %connection_id,
                    error = %e,
                    "Error while closing database connection"
                ),
            }
        }
    }
}

impl Drop for ConnectionScope<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::warn!(
                request_id = %self.request_id(),
                connection_id = %connection.id(),
                "Database connection dropped without explicit release"
            );
        }
    }
}
