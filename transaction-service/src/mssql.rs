//! SQL Server connections over TDS.
//!
//! Connections are opened with SQL authentication, optional certificate
//! trust and a bounded establishment time. No transaction is ever started,
//! so every statement runs in autocommit mode.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use tiberius::{
    numeric::Numeric, AuthMethod, Client, ColumnData, Config, FromSql, Query, SqlBrowser,
};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use common::config::DatabaseSettings;
use common::errors::{AppError, AppResult};
use common::models::ResultSet;
use common::utils::IdGenerator;

use crate::connection::{Connector, DbConnection};

const APPLICATION_NAME: &str = "transaction-service";

type TdsClient = Client<Compat<TcpStream>>;

/// Parsed form of the `SERVER` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: Option<u16>,
    pub instance: Option<String>,
}

impl ServerAddress {
    /// Accepts `host`, `host,port`, `tcp:host,port` and `host\instance`.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        let raw = match raw.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("tcp:") => &raw[4..],
            _ => raw,
        };

        let (host_part, port) = match raw.split_once(',') {
            Some((host, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    AppError::DatabaseConnection(format!("invalid port in SERVER: {:?}", port))
                })?;
                (host.trim(), Some(port))
            }
            None => (raw, None),
        };

        let (host, instance) = match host_part.split_once('\\') {
            Some((host, instance)) if !instance.trim().is_empty() => {
                (host.trim(), Some(instance.trim().to_string()))
            }
            Some((host, _)) => (host.trim(), None),
            None => (host_part, None),
        };

        let host = match host {
            "" => return Err(AppError::DatabaseConnection("SERVER has no host".into())),
            "." | "(local)" => "localhost",
            other => other,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            instance,
        })
    }
}

/// Opens SQL Server connections from the configured settings.
pub struct MssqlConnector {
    settings: DatabaseSettings,
}

impl MssqlConnector {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    fn build_config(&self) -> AppResult<Config> {
        let (Some(server), Some(database), Some(username), Some(password)) = (
            self.settings.server.as_deref(),
            self.settings.database.as_deref(),
            self.settings.username.as_deref(),
            self.settings.password.as_deref(),
        ) else {
            return Err(AppError::DatabaseConnection(format!(
                "missing configuration: {}",
                self.settings.missing().join(", ")
            )));
        };

        let address = ServerAddress::parse(server)?;

        let mut config = Config::new();
        config.host(&address.host);
        if let Some(port) = address.port {
            config.port(port);
        }
        if let Some(instance) = &address.instance {
            config.instance_name(instance);
        }
        config.database(database);
        config.authentication(AuthMethod::sql_server(username, password));
        config.application_name(APPLICATION_NAME);
        if self.settings.trust_server_certificate {
            config.trust_cert();
        }

        Ok(config)
    }
}

#[async_trait]
impl Connector for MssqlConnector {
    async fn connect(&self) -> AppResult<Box<dyn DbConnection>> {
        let config = self.build_config()?;
        let timeout = self.settings.connect_timeout;

        let client = tokio::time::timeout(timeout, open_client(config))
            .await
            .map_err(|_| {
                AppError::DatabaseConnection(format!(
                    "connection not established within {}s",
                    timeout.as_secs()
                ))
            })??;

        Ok(Box::new(MssqlConnection {
            id: IdGenerator::connection_id(),
            client,
        }))
    }
}

async fn open_client(config: Config) -> AppResult<TdsClient> {
    let tcp = TcpStream::connect_named(&config)
        .await
        .map_err(connection_error)?;
    tcp.set_nodelay(true)
        .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        // Azure SQL gateways redirect the login to the node hosting the database.
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!(host = %host, port, "Following SQL Server routing redirect");
            let mut config = config;
            config.host(&host);
            config.port(port);

            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
            tcp.set_nodelay(true)
                .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(connection_error)
        }
        Err(e) => Err(connection_error(e)),
    }
}

fn connection_error(err: tiberius::error::Error) -> AppError {
    AppError::DatabaseConnection(err.to_string())
}

fn query_error(err: tiberius::error::Error) -> AppError {
    AppError::DatabaseQuery(err.to_string())
}

fn conversion_error(err: tiberius::error::Error) -> AppError {
    AppError::Internal(format!("column conversion failed: {}", err))
}

/// A single SQL Server session.
pub struct MssqlConnection {
    id: String,
    client: TdsClient,
}

#[async_trait]
impl DbConnection for MssqlConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call_procedure(&mut self, procedure: &str, params: &[&str]) -> AppResult<ResultSet> {
        let mut query = Query::new(procedure_call_sql(procedure, params.len()));
        for param in params {
            query.bind(param.to_string());
        }

        let mut stream = query.query(&mut self.client).await.map_err(query_error)?;

        let columns: Vec<String> = stream
            .columns()
            .await
            .map_err(query_error)?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = stream
            .into_first_result()
            .await
            .map_err(query_error)?
            .into_iter()
            .map(|row| row.into_iter().map(column_value).collect::<AppResult<Vec<_>>>())
            .collect::<AppResult<Vec<_>>>()?;

        Ok(ResultSet::new(columns, rows))
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.client.close().await.map_err(connection_error)
    }
}

/// `EXEC proc @P1, @P2, ...` with one placeholder per parameter.
fn procedure_call_sql(procedure: &str, param_count: usize) -> String {
    let placeholders: Vec<String> = (1..=param_count).map(|i| format!("@P{}", i)).collect();
    if placeholders.is_empty() {
        format!("EXEC {}", procedure)
    } else {
        format!("EXEC {} {}", procedure, placeholders.join(", "))
    }
}

/// Exact decimal text of a numeric, e.g. `-50.25` for value `-5025` at scale 2.
fn numeric_value(n: Numeric) -> Value {
    let scale = usize::from(n.scale());
    let sign = if n.value() < 0 { "-" } else { "" };
    let digits = n.value().unsigned_abs().to_string();
    if scale == 0 {
        return Value::from(format!("{}{}", sign, digits));
    }

    let padded = format!("{:0>width$}", digits, width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    Value::from(format!("{}{}.{}", sign, int_part, frac_part))
}

/// Converts one SQL Server cell into a JSON scalar.
fn column_value(data: ColumnData<'static>) -> AppResult<Value> {
    let value = match &data {
        ColumnData::U8(v) => v.map(Value::from),
        ColumnData::I16(v) => v.map(Value::from),
        ColumnData::I32(v) => v.map(Value::from),
        ColumnData::I64(v) => v.map(Value::from),
        ColumnData::F32(v) => v.map(Value::from),
        ColumnData::F64(v) => v.map(Value::from),
        ColumnData::Bit(v) => v.map(Value::from),
        ColumnData::Numeric(v) => v.map(numeric_value),
        ColumnData::Guid(v) => v.map(|g| Value::from(g.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| Value::from(STANDARD.encode(b))),
        ColumnData::Xml(v) => v.as_ref().map(|x| Value::from(x.to_string())),
        ColumnData::String(_) => <&str as FromSql>::from_sql(&data)
            .map_err(conversion_error)?
            .map(Value::from),
        ColumnData::Date(_) => NaiveDate::from_sql(&data)
            .map_err(conversion_error)?
            .map(|d| Value::from(d.format("%Y-%m-%d").to_string())),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)
            .map_err(conversion_error)?
            .map(|t| Value::from(t.format("%H:%M:%S%.f").to_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)
                .map_err(conversion_error)?
                .map(|d| Value::from(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
        }
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(&data)
            .map_err(conversion_error)?
            .map(|d| Value::from(d.to_rfc3339())),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(AppError::Internal(format!(
                "unsupported column type: {:?}",
                data
            )))
        }
    };

    Ok(value.unwrap_or(Value::Null))
}
