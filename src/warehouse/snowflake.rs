use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Warehouse;
use super::decode::{RawRow, decode_chunk, decode_table};
use super::protocol::{
    Binding, Envelope, LoginData, LoginRequest, LoginResponseData, QueryRequest,
    QueryResponseData,
};
use crate::config::WarehouseConfig;
use crate::fetch::auth::SessionToken;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::query::Statement;
use crate::table::Table;

const CLIENT_APP_ID: &str = env!("CARGO_PKG_NAME");
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const SNOWFLAKE_MEDIA_TYPE: &str = "application/snowflake";
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// An authenticated Snowflake session.
///
/// Statements run one at a time; result chunks are downloaded in order with
/// the unauthenticated inner client.
pub struct SnowflakeSession<C> {
    http: SessionToken<C>,
    base_url: String,
    sequence: AtomicU64,
    query_timeout: Duration,
    poll_interval: Duration,
}

impl<C: HttpClient> SnowflakeSession<C> {
    /// Logs in with username and password and opens a session on the
    /// configured database, schema, warehouse and role.
    #[tracing::instrument(skip(http, config), fields(account = %config.account, user = %config.user))]
    pub async fn connect(http: C, config: &WarehouseConfig) -> Result<Self> {
        let base_url = config.base_url();

        let mut params = vec![("request_id", Uuid::new_v4().to_string())];
        let optional = [
            ("databaseName", Some(&config.database)),
            ("schemaName", Some(&config.schema)),
            ("warehouse", config.warehouse.as_ref()),
            ("roleName", config.role.as_ref()),
        ];
        params.extend(
            optional
                .into_iter()
                .filter_map(|(k, v)| v.map(|v| (k, v.clone()))),
        );
        let url = Url::parse_with_params(&format!("{base_url}/session/v1/login-request"), &params)?;

        let body = LoginRequest {
            data: LoginData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: CLIENT_APP_VERSION,
                account_name: config.account_name(),
                login_name: &config.user,
                password: &config.password,
                session_parameters: HashMap::from([("QUERY_RESULT_FORMAT", "JSON".into())]),
            },
        };

        let req = json_request(Method::POST, url, Some(&body), config.request_timeout)?;
        let resp = http.execute(req).await.context("Login request failed")?;
        // A rejected login still carries a `data` object, just without a token.
        let data = read_envelope::<serde_json::Value>(resp, "Login")
            .await?
            .into_data("Login")?;
        let login: LoginResponseData =
            serde_json::from_value(data).context("Login response carries no session token")?;

        info!(database = %config.database, schema = %config.schema, "Snowflake session opened");

        Ok(Self {
            http: SessionToken::new(http, &login.token)?,
            base_url,
            sequence: AtomicU64::new(0),
            query_timeout: config.query_timeout,
            poll_interval: POLL_INTERVAL,
        })
    }

    /// Ends the session on the server.
    pub async fn close(self) -> Result<()> {
        let url = Url::parse_with_params(
            &format!("{}/session", self.base_url),
            &[
                ("delete", "true".to_string()),
                ("requestId", Uuid::new_v4().to_string()),
            ],
        )?;
        let req = json_request::<()>(Method::POST, url, None, self.query_timeout)?;
        let resp = self.http.execute(req).await?;
        read_envelope::<serde_json::Value>(resp, "Logout")
            .await?
            .check("Logout")?;
        debug!("Snowflake session closed");
        Ok(())
    }

    async fn submit(&self, statement: &Statement) -> Result<QueryResponseData> {
        let sequence_id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let bindings = statement
            .binds
            .iter()
            .enumerate()
            .map(|(i, value)| {
                (
                    (i + 1).to_string(),
                    Binding {
                        kind: "TEXT",
                        value,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        let body = QueryRequest {
            sql_text: &statement.sql,
            async_exec: false,
            sequence_id,
            query_submission_time: Utc::now().timestamp_millis(),
            bindings,
        };

        let url = Url::parse_with_params(
            &format!("{}/queries/v1/query-request", self.base_url),
            &[("requestId", Uuid::new_v4().to_string())],
        )?;
        let req = json_request(Method::POST, url, Some(&body), self.query_timeout)?;
        let mut envelope: Envelope<QueryResponseData> =
            read_envelope(self.http.execute(req).await?, "Query").await?;

        let started = Instant::now();
        while envelope.in_progress() {
            let result_url = envelope
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.as_deref())
                .context("Query still running but no result URL was returned")?;
            if started.elapsed() > self.query_timeout {
                bail!(
                    "Query did not finish within {}s",
                    self.query_timeout.as_secs()
                );
            }

            debug!(result_url, "Query still running");
            tokio::time::sleep(self.poll_interval).await;

            let url = Url::parse(&format!("{}{}", self.base_url, result_url))?;
            let req = json_request::<()>(Method::GET, url, None, self.query_timeout)?;
            envelope = read_envelope(self.http.execute(req).await?, "Query result").await?;
        }

        envelope.into_data("Query")
    }

    /// Gathers the inline rowset plus every result chunk, in order.
    async fn collect_rows(&self, data: &mut QueryResponseData) -> Result<Vec<RawRow>> {
        if let Some(format) = &data.query_result_format {
            if !format.eq_ignore_ascii_case("json") {
                bail!("Unsupported result format '{format}', expected json");
            }
        }

        let mut rows = std::mem::take(&mut data.rowset);
        if data.chunks.is_empty() {
            return Ok(rows);
        }

        let headers = chunk_headers(data)?;
        for (i, chunk) in data.chunks.iter().enumerate() {
            let bytes = fetch_bytes(&self.http.inner, &chunk.url, &headers)
                .await
                .with_context(|| format!("Cannot download result chunk {}", i + 1))?;
            let chunk_rows = decode_chunk(&bytes)
                .with_context(|| format!("Cannot read result chunk {}", i + 1))?;
            if chunk.row_count != 0 && chunk_rows.len() as u64 != chunk.row_count {
                warn!(
                    chunk = i + 1,
                    expected = chunk.row_count,
                    received = chunk_rows.len(),
                    "Result chunk row count mismatch"
                );
            }
            debug!(chunk = i + 1, rows = chunk_rows.len(), "Result chunk downloaded");
            rows.extend(chunk_rows);
        }
        Ok(rows)
    }
}

#[async_trait]
impl<C: HttpClient> Warehouse for SnowflakeSession<C> {
    #[tracing::instrument(skip(self, statement), fields(binds = ?statement.binds))]
    async fn query(&self, statement: &Statement) -> Result<Table> {
        let started = Instant::now();
        let mut data = self.submit(statement).await?;
        let rows = self.collect_rows(&mut data).await?;

        if let Some(total) = data.total {
            if total != rows.len() as u64 {
                warn!(total, received = rows.len(), "Row count differs from reported total");
            }
        }
        info!(
            query_id = data.query_id.as_deref().unwrap_or_default(),
            rows = rows.len(),
            chunks = data.chunks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query complete"
        );

        decode_table(&data.rowtype, rows)
    }
}

/// Headers required to fetch result chunks from cloud storage.
fn chunk_headers(data: &QueryResponseData) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    match (&data.chunk_headers, &data.qrmk) {
        (Some(given), _) => {
            for (name, value) in given {
                headers.insert(
                    HeaderName::from_bytes(name.as_bytes())?,
                    HeaderValue::from_str(value)?,
                );
            }
        }
        (None, Some(qrmk)) => {
            headers.insert(
                "x-amz-server-side-encryption-customer-algorithm",
                HeaderValue::from_static("AES256"),
            );
            let mut key = HeaderValue::from_str(qrmk)?;
            key.set_sensitive(true);
            headers.insert("x-amz-server-side-encryption-customer-key", key);
        }
        (None, None) => {}
    }
    Ok(headers)
}

fn json_request<T: Serialize>(
    method: Method,
    url: Url,
    body: Option<&T>,
    timeout: Duration,
) -> Result<Request> {
    let mut req = Request::new(method, url);
    *req.timeout_mut() = Some(timeout);

    let headers = req.headers_mut();
    headers.insert(ACCEPT, HeaderValue::from_static(SNOWFLAKE_MEDIA_TYPE));
    if let Some(body) = body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(serde_json::to_vec(body)?.into());
    }
    Ok(req)
}

async fn read_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
) -> Result<Envelope<T>> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("{} returned status {}: {}", what, status, body);
    }
    resp.json()
        .await
        .with_context(|| format!("Cannot parse {what} response"))
}
