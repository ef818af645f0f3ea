//! In-memory connector used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::ResultSet;
use tokio::sync::Barrier;

use crate::connection::{Connector, DbConnection};

/// Counters shared between a connector and every connection it opened.
#[derive(Default)]
pub struct ConnectionStats {
    opened: AtomicUsize,
    released: AtomicUsize,
    closed_explicitly: AtomicUsize,
    open_handles: AtomicUsize,
    calls: Mutex<Vec<(String, String)>>,
}

impl ConnectionStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn closed_explicitly(&self) -> usize {
        self.closed_explicitly.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// `(connection_id, first parameter)` for every procedure call.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

/// What a mock connection does when a procedure is called.
#[derive(Clone)]
enum Behavior {
    Rows(HashMap<String, ResultSet>),
    QueryError(String),
    Unexpected(String),
    Panic,
}

pub struct MockConnector {
    stats: Arc<ConnectionStats>,
    connect_error: Option<String>,
    behavior: Behavior,
    fail_close: bool,
    barrier: Option<Arc<Barrier>>,
}

impl MockConnector {
    /// Connector whose procedure returns no rows for every account.
    pub fn new() -> Self {
        Self {
            stats: Arc::new(ConnectionStats::default()),
            connect_error: None,
            behavior: Behavior::Rows(HashMap::new()),
            fail_close: false,
            barrier: None,
        }
    }

    pub fn failing_connect(message: &str) -> Self {
        Self {
            connect_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Registers the result returned for one account number.
    pub fn with_result(mut self, account_number: &str, result: ResultSet) -> Self {
        if let Behavior::Rows(ref mut results) = self.behavior {
            results.insert(account_number.to_string(), result);
        }
        self
    }

    pub fn with_query_error(mut self, message: &str) -> Self {
        self.behavior = Behavior::QueryError(message.to_string());
        self
    }

    pub fn with_unexpected_error(mut self, message: &str) -> Self {
        self.behavior = Behavior::Unexpected(message.to_string());
        self
    }

    pub fn with_panic(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Makes every procedure call wait until `parties` calls are in flight.
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> AppResult<Box<dyn DbConnection>> {
        if let Some(message) = &self.connect_error {
            return Err(AppError::DatabaseConnection(message.clone()));
        }

        let serial = self.stats.opened.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.open_handles.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockConnection {
            id: format!("mock-{}", serial),
            stats: self.stats.clone(),
            behavior: self.behavior.clone(),
            fail_close: self.fail_close,
            barrier: self.barrier.clone(),
        }))
    }
}

struct MockConnection {
    id: String,
    stats: Arc<ConnectionStats>,
    behavior: Behavior,
    fail_close: bool,
    barrier: Option<Arc<Barrier>>,
}

#[async_trait]
impl DbConnection for MockConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call_procedure(&mut self, _procedure: &str, params: &[&str]) -> AppResult<ResultSet> {
        let account = params.first().copied().unwrap_or_default().to_string();
        self.stats
            .calls
            .lock()
            .unwrap()
            .push((self.id.clone(), account.clone()));

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        match &self.behavior {
            Behavior::Rows(results) => Ok(results.get(&account).cloned().unwrap_or_default()),
            Behavior::QueryError(message) => Err(AppError::DatabaseQuery(message.clone())),
            Behavior::Unexpected(message) => Err(AppError::Internal(message.clone())),
            Behavior::Panic => panic!("driver returned malformed packet"),
        }
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.stats.closed_explicitly.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(AppError::DatabaseConnection("connection reset".into()));
        }
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.stats.open_handles.fetch_sub(1, Ordering::SeqCst);
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}
