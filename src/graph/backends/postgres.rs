//! PostgreSQL + Apache AGE backend implementation.
//!
//! Cypher statements are wrapped in AGE's `cypher()` SQL function and run over
//! a deadpool-managed connection pool.
//!
//! ```ignore
//! use distributor::graph::backends::postgres::PostgresClient;
//! use distributor::graph::QueryExt;
//!
//! let client = PostgresClient::connect(&config.postgres).await?;
//! let row = client.query("MATCH (b:BusinessEntity) RETURN b.id AS id LIMIT 1").fetch_one().await?;
//! ```

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::{
    Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::NoTls;

use crate::config::PostgresConfig;
use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::{CypherExecutor, GraphClient, Transaction};
use crate::store::vocab;

// ----------------------------------------------------------------------------
// Agtype wrapper for AGE parameter binding
// ----------------------------------------------------------------------------

/// AGE parameter map in agtype binary form: one version byte, then JSON text.
///
/// Parameters travel as typed binary data and are never interpolated into the
/// Cypher text.
#[derive(Debug, Clone)]
struct Agtype(String);

impl ToSql for Agtype {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        out.extend_from_slice(&[1]);
        out.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        // agtype OID varies per installation
        ty.name() == "agtype"
    }

    to_sql_checked!();
}

/// Reads an agtype result column back into JSON.
#[derive(Debug)]
struct AgtypeValue(JsonValue);

impl<'a> tokio_postgres::types::FromSql<'a> for AgtypeValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if raw.is_empty() {
            return Ok(AgtypeValue(JsonValue::Null));
        }

        let json_bytes = if raw[0] == 1 { &raw[1..] } else { raw };
        let json_str = std::str::from_utf8(json_bytes)?;
        let clean_json = json_str
            .trim_end_matches("::vertex")
            .trim_end_matches("::edge")
            .trim_end_matches("::path");

        Ok(AgtypeValue(serde_json::from_str(clean_json)?))
    }

    fn accepts(ty: &Type) -> bool {
        ty.name() == "agtype"
    }
}

// ----------------------------------------------------------------------------
// Error classification
// ----------------------------------------------------------------------------

/// Maps a driver error onto the store failure taxonomy.
fn classify_pg_error(err: &tokio_postgres::Error, cypher: &str) -> AppError {
    match err.as_db_error() {
        Some(db_err) if db_err.code() == &SqlState::QUERY_CANCELED => {
            AppError::StoreTimeout(db_err.message().to_string())
        }
        Some(db_err) => AppError::StoreQueryFailed {
            message: format!(
                "{}: {} ({})",
                db_err.severity(),
                db_err.message(),
                db_err.code().code()
            ),
            query: cypher.to_string(),
        },
        None => AppError::StoreUnavailable(err.to_string()),
    }
}

fn classify_pool_error(err: PoolError) -> AppError {
    match err {
        PoolError::Timeout(kind) => {
            AppError::StoreTimeout(format!("waiting for connection ({:?})", kind))
        }
        other => AppError::StoreUnavailable(format!("failed to get connection: {}", other)),
    }
}

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

/// PostgreSQL + Apache AGE graph client.
///
/// Cheap to clone; the pool is `Arc`-based.
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
    graph_name: Arc<str>,
    session_setup: Arc<str>,
}

impl PostgresClient {
    /// Creates a pooled client. No connection is opened until first use.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, AppError> {
        let pg_config: tokio_postgres::Config = config.uri.parse().map_err(|e| {
            AppError::StoreUnavailable(format!("invalid PostgreSQL connection string: {}", e))
        })?;

        let mgr = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(mgr)
            .max_size(config.pool_size)
            .timeouts(Timeouts {
                wait: Some(config.pool_timeout()),
                create: Some(config.pool_timeout()),
                recycle: Some(config.pool_timeout()),
            })
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to create connection pool: {}", e)))?;

        Ok(Self {
            pool,
            graph_name: Arc::from(config.graph.as_str()),
            session_setup: Arc::from(session_setup_sql(config.statement_timeout())),
        })
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    /// Gets a pooled connection with the AGE session prepared.
    async fn get_connection(&self) -> Result<Object, AppError> {
        let conn = self.pool.get().await.map_err(classify_pool_error)?;
        conn.batch_execute(&self.session_setup)
            .await
            .map_err(|e| classify_pg_error(&e, "session setup"))?;
        Ok(conn)
    }

    /// Creates the AGE graph if it does not exist yet.
    pub async fn ensure_graph_exists(&self) -> Result<(), AppError> {
        let conn = self.get_connection().await?;
        let sql = format!(
            r#"
            DO $$
            BEGIN
                IF NOT EXISTS (
                    SELECT 1 FROM ag_catalog.ag_graph WHERE name = '{graph}'
                ) THEN
                    PERFORM ag_catalog.create_graph('{graph}');
                END IF;
            END $$;
            "#,
            graph = self.graph_name
        );
        conn.batch_execute(&sql)
            .await
            .map_err(|e| classify_pg_error(&e, "create_graph"))
    }

    /// Creates every vertex and edge label of the catalog vocabulary.
    ///
    /// AGE rejects MATCH on a label it has never seen in some versions, so
    /// labels are created up front. Returns the labels that were created.
    pub async fn ensure_labels(&self) -> Result<Vec<&'static str>, AppError> {
        let conn = self.get_connection().await?;
        let mut created = Vec::new();

        let labels = vocab::NODE_LABELS
            .iter()
            .map(|l| (*l, "create_vlabel"))
            .chain(vocab::EDGE_TYPES.iter().map(|l| (*l, "create_elabel")));

        for (label, function) in labels {
            let sql = format!(
                r#"
                DO $$
                BEGIN
                    IF NOT EXISTS (
                        SELECT 1 FROM ag_catalog.ag_label l
                        JOIN ag_catalog.ag_graph g ON l.graph = g.graphid
                        WHERE g.name = '{graph}' AND l.name = '{label}'
                    ) THEN
                        PERFORM ag_catalog.{function}('{graph}', '{label}');
                    END IF;
                END $$;
                "#,
                graph = self.graph_name,
            );
            let before = self.label_exists(&conn, label).await?;
            conn.batch_execute(&sql)
                .await
                .map_err(|e| classify_pg_error(&e, function))?;
            if !before {
                tracing::debug!(label, "Created label");
                created.push(label);
            }
        }

        Ok(created)
    }

    async fn label_exists(&self, conn: &Object, label: &str) -> Result<bool, AppError> {
        let row = conn
            .query_one(
                "SELECT EXISTS (
                     SELECT 1 FROM ag_catalog.ag_label l
                     JOIN ag_catalog.ag_graph g ON l.graph = g.graphid
                     WHERE g.name = $1 AND l.name = $2
                 )",
                &[&self.graph_name.as_ref(), &label],
            )
            .await
            .map_err(|e| classify_pg_error(&e, "ag_label lookup"))?;
        Ok(row.get(0))
    }
}

fn session_setup_sql(statement_timeout: Option<Duration>) -> String {
    let timeout_ms = statement_timeout.map(|t| t.as_millis()).unwrap_or(0);
    format!(
        "LOAD 'age'; SET search_path = ag_catalog, public; SET statement_timeout = {};",
        timeout_ms
    )
}

#[async_trait]
impl CypherExecutor for PostgresClient {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let conn = self.get_connection().await?;
        execute_pg_cypher_owned(conn, self.graph_name.clone(), cypher.to_string(), params)
    }
}

#[async_trait]
impl GraphClient for PostgresClient {
    type Tx<'a> = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx<'_>, AppError> {
        let conn = self.get_connection().await?;
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| classify_pg_error(&e, "BEGIN"))?;

        Ok(PostgresTransaction {
            conn: Some(conn),
            graph_name: self.graph_name.clone(),
            finished: false,
        })
    }
}

// ----------------------------------------------------------------------------
// Transaction
// ----------------------------------------------------------------------------

/// Pooled connection with an open transaction.
///
/// Must be committed or rolled back. Dropping it unfinished (for example when
/// the owning future is cancelled) detaches the connection from the pool, so
/// the open transaction dies with it instead of leaking into the next caller.
pub struct PostgresTransaction {
    conn: Option<Object>,
    graph_name: Arc<str>,
    finished: bool,
}

impl PostgresTransaction {
    fn conn(&self) -> Result<&Object, AppError> {
        self.conn
            .as_ref()
            .ok_or_else(|| AppError::Internal("transaction connection already released".into()))
    }

    /// Sends COMMIT/ROLLBACK; only a completed one returns the connection
    /// to the pool.
    async fn finish(mut self, statement: &'static str) -> Result<(), AppError> {
        self.conn()?
            .batch_execute(statement)
            .await
            .map_err(|e| classify_pg_error(&e, statement))?;
        self.finished = true;
        Ok(())
    }
}

#[async_trait]
impl CypherExecutor for PostgresTransaction {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        execute_pg_cypher(self.conn()?, &self.graph_name, cypher, params).await
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<(), AppError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(conn) = self.conn.take() {
            tracing::warn!("Transaction dropped unfinished; closing its connection");
            // Closing the client ends the session, which rolls the transaction back
            drop(Object::take(conn));
        }
    }
}

// ----------------------------------------------------------------------------
// Statement execution
// ----------------------------------------------------------------------------

/// Runs a statement on a borrowed connection (transactions).
async fn execute_pg_cypher<'a>(
    conn: &'a Object,
    graph_name: &str,
    cypher: &str,
    params: Params,
) -> Result<RowStream<'a>, AppError> {
    let (sql, agtype_param) = build_age_query(graph_name, cypher, &params)?;

    let stream = match &agtype_param {
        None => {
            conn.query_raw::<_, &Agtype, _>(&sql, std::iter::empty())
                .await
        }
        Some(param) => conn.query_raw(&sql, std::iter::once(param)).await,
    }
    .map_err(|e| classify_pg_error(&e, cypher))?;

    let cypher = cypher.to_string();
    Ok(Box::pin(
        stream
            .map_ok(|row| parse_pg_row(&row))
            .map_err(move |e| classify_pg_error(&e, &cypher)),
    ))
}

/// Runs a statement on an owned connection (auto-commit).
///
/// The generator owns the connection, keeping it alive for the stream's
/// lifetime.
fn execute_pg_cypher_owned(
    conn: Object,
    graph_name: Arc<str>,
    cypher: String,
    params: Params,
) -> Result<RowStream<'static>, AppError> {
    use async_stream::try_stream;

    let (sql, agtype_param) = build_age_query(&graph_name, &cypher, &params)?;

    Ok(Box::pin(try_stream! {
        let stream = match &agtype_param {
            None => conn.query_raw::<_, &Agtype, _>(&sql, std::iter::empty()).await,
            Some(param) => conn.query_raw(&sql, std::iter::once(param)).await,
        }
        .map_err(|e| classify_pg_error(&e, &cypher))?;

        futures::pin_mut!(stream);
        while let Some(pg_row) = stream
            .try_next()
            .await
            .map_err(|e| classify_pg_error(&e, &cypher))?
        {
            yield parse_pg_row(&pg_row);
        }
    }))
}

/// Wraps a Cypher statement in AGE's `cypher()` call.
///
/// The SQL column list mirrors the statement's RETURN clause; write-only
/// statements get a single placeholder column.
fn build_age_query(
    graph_name: &str,
    cypher: &str,
    params: &Params,
) -> Result<(String, Option<Agtype>), AppError> {
    use crate::graph::cypher::{extract_return_columns, ParseError};

    let columns_sql = match extract_return_columns(cypher) {
        Ok(columns) => columns
            .iter()
            // Always quoted: "count" and friends are reserved in PostgreSQL
            .map(|name| format!("\"{}\" agtype", name.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(", "),
        Err(ParseError::NoReturnClause) => "result agtype".to_string(),
        Err(e) => {
            return Err(AppError::StoreQueryFailed {
                message: e.to_string(),
                query: cypher.to_string(),
            })
        }
    };

    if params.is_empty() {
        let sql = format!(
            "SELECT * FROM cypher('{}', $$ {} $$) as ({})",
            graph_name, cypher, columns_sql
        );
        Ok((sql, None))
    } else {
        let sql = format!(
            "SELECT * FROM cypher('{}', $$ {} $$, $1) as ({})",
            graph_name, cypher, columns_sql
        );
        let params_json = serde_json::to_string(params)
            .map_err(|e| AppError::Internal(format!("failed to serialize parameters: {}", e)))?;
        Ok((sql, Some(Agtype(params_json))))
    }
}

/// Converts an AGE result row (all columns agtype) into a [`Row`].
fn parse_pg_row(pg_row: &tokio_postgres::Row) -> Row {
    let data: HashMap<String, JsonValue> = pg_row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = pg_row
                .try_get::<_, AgtypeValue>(idx)
                .map(|v| v.0)
                .unwrap_or(JsonValue::Null);
            (column.name().to_string(), value)
        })
        .collect();
    Row::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_age_query_existence_probe() {
        let (sql, param) = build_age_query(
            "catalog",
            "MATCH (b:BusinessEntity) RETURN 1 AS hit LIMIT 1",
            &Params::new(),
        )
        .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM cypher('catalog', $$ MATCH (b:BusinessEntity) RETURN 1 AS hit LIMIT 1 $$) as (\"hit\" agtype)"
        );
        assert!(param.is_none());
    }

    #[test]
    fn test_build_age_query_with_params() {
        let mut params = Params::new();
        params.insert("id".to_string(), JsonValue::String("shop-1".to_string()));

        let (sql, param) = build_age_query(
            "catalog",
            "MATCH (b:BusinessEntity {id: $id}) RETURN b.id AS id",
            &params,
        )
        .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM cypher('catalog', $$ MATCH (b:BusinessEntity {id: $id}) RETURN b.id AS id $$, $1) as (\"id\" agtype)"
        );
        assert!(param.expect("agtype param").0.contains("shop-1"));
    }

    #[test]
    fn test_build_age_query_write_only() {
        let (sql, _) = build_age_query(
            "catalog",
            "MATCH (o)-[r:AVAILABLE_AT_OR_FROM]->(b) DELETE r",
            &Params::new(),
        )
        .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM cypher('catalog', $$ MATCH (o)-[r:AVAILABLE_AT_OR_FROM]->(b) DELETE r $$) as (result agtype)"
        );
    }

    #[test]
    fn test_build_age_query_rejects_return_star() {
        let result = build_age_query("catalog", "MATCH (n) RETURN *", &Params::new());
        assert!(matches!(result, Err(AppError::StoreQueryFailed { .. })));
    }

    #[test]
    fn test_session_setup_statement_timeout() {
        assert_eq!(
            session_setup_sql(Some(Duration::from_secs(5))),
            "LOAD 'age'; SET search_path = ag_catalog, public; SET statement_timeout = 5000;"
        );
        assert!(session_setup_sql(None).ends_with("SET statement_timeout = 0;"));
    }

    #[test]
    fn test_pool_timeout_is_store_timeout() {
        let err = classify_pool_error(PoolError::Timeout(deadpool_postgres::TimeoutType::Wait));
        assert!(matches!(err, AppError::StoreTimeout(_)));
    }

    #[test]
    fn test_pool_closed_is_unavailable() {
        let err = classify_pool_error(PoolError::Closed);
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }
}
