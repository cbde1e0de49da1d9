//! Request and response bodies of Snowflake's REST endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Response codes meaning the statement is still running.
pub(crate) const QUERY_IN_PROGRESS: [&str; 2] = ["333333", "333334"];

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub(crate) data: LoginData<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) struct LoginData<'a> {
    pub(crate) client_app_id: &'a str,
    pub(crate) client_app_version: &'a str,
    pub(crate) account_name: &'a str,
    pub(crate) login_name: &'a str,
    pub(crate) password: &'a str,
    pub(crate) session_parameters: HashMap<&'a str, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponseData {
    pub(crate) token: String,
}

/// The `{data, code, message, success}` wrapper around every response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) data: Option<T>,
    pub(crate) code: Option<String>,
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) success: bool,
}

impl<T> Envelope<T> {
    pub(crate) fn in_progress(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|c| QUERY_IN_PROGRESS.contains(&c))
    }

    /// Turns an unsuccessful envelope into an error carrying its code and
    /// message.
    pub(crate) fn check(self, what: &str) -> anyhow::Result<Option<T>> {
        if !self.success {
            anyhow::bail!(
                "{} failed ({}): {}",
                what,
                self.code.as_deref().unwrap_or("no code"),
                self.message.as_deref().unwrap_or("no message")
            );
        }
        Ok(self.data)
    }

    /// Like [`Envelope::check`], but a missing `data` payload is an error too.
    pub(crate) fn into_data(self, what: &str) -> anyhow::Result<T> {
        self.check(what)?
            .ok_or_else(|| anyhow::anyhow!("{what} succeeded without a data payload"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequest<'a> {
    pub(crate) sql_text: &'a str,
    pub(crate) async_exec: bool,
    pub(crate) sequence_id: u64,
    pub(crate) query_submission_time: i64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) bindings: BTreeMap<String, Binding<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Binding<'a> {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) value: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct QueryResponseData {
    pub(crate) query_id: Option<String>,
    pub(crate) get_result_url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) rowtype: Vec<RowType>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) rowset: Vec<Vec<Option<String>>>,
    pub(crate) total: Option<u64>,
    pub(crate) query_result_format: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub(crate) chunks: Vec<ChunkInfo>,
    pub(crate) chunk_headers: Option<HashMap<String, String>>,
    pub(crate) qrmk: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Column metadata of a result set.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RowType {
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChunkInfo {
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) row_count: u64,
}
