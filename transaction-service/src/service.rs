//! 交易明细查询服务模块

use common::errors::AppResult;
use common::models::TransactionRecord;

use crate::connection::ConnectionScope;

/// Stored procedure returning the transactions of one account.
pub const TRANSACTION_PROCEDURE: &str = "GetTransDetail";

/// 交易明细查询服务
pub struct TransactionService;

impl TransactionService {
    /// Runs `GetTransDetail` for a non-empty account number on the request's
    /// connection and returns one record per row, in database order.
    pub async fn execute_transaction_query(
        scope: &mut ConnectionScope<'_>,
        account_number: &str,
    ) -> AppResult<Vec<TransactionRecord>> {
        let connection = scope.acquire().await?;
        let result = connection
            .call_procedure(TRANSACTION_PROCEDURE, &[account_number])
            .await?;

        tracing::info!(
            connection_id = %connection.id(),
            rows = result.len(),
            columns = result.columns.len(),
            "Transaction query executed"
        );

        Ok(result.into_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnector;
    use common::errors::AppError;
    use common::models::ResultSet;
    use serde_json::json;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec!["TransID".into(), "Date".into(), "Amount".into()],
            vec![
                vec![json!(1), json!("2024-01-01"), json!(100.0)],
                vec![json!(2), json!("2024-01-02"), json!(-50.0)],
            ],
        )
    }

    #[tokio::test]
    async fn test_rows_are_mapped_in_order() {
        let connector = MockConnector::new().with_result("12345", sample());
        let mut scope = ConnectionScope::new(&connector, None);

        let records = TransactionService::execute_transaction_query(&mut scope, "12345")
            .await
            .unwrap();
        scope.release().await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["TransID"], json!(1));
        assert_eq!(records[1]["Amount"], json!(-50.0));
        assert_eq!(connector.stats().calls(), vec![("mock-1".to_string(), "12345".to_string())]);
    }

    #[tokio::test]
    async fn test_repeated_queries_share_one_connection() {
        let connector = MockConnector::new().with_result("1", sample());
        let mut scope = ConnectionScope::new(&connector, None);

        TransactionService::execute_transaction_query(&mut scope, "1").await.unwrap();
        TransactionService::execute_transaction_query(&mut scope, "2").await.unwrap();
        scope.release().await;

        assert_eq!(connector.stats().opened(), 1);
        assert_eq!(connector.stats().calls().len(), 2);
        assert_eq!(connector.stats().released(), 1);
    }

    #[tokio::test]
    async fn test_query_failure_is_query_error() {
        let connector = MockConnector::new().with_query_error("Could not find stored procedure");
        let mut scope = ConnectionScope::new(&connector, None);

        let err = TransactionService::execute_transaction_query(&mut scope, "1")
            .await
            .unwrap_err();
        scope.release().await;

        assert!(matches!(err, AppError::DatabaseQuery(ref m) if m.contains("stored procedure")));
        assert_eq!(connector.stats().open_handles(), 0);
    }
}
