//! Warehouse access.
//!
//! [`Warehouse`] is the seam the export runs against. [`SnowflakeSession`]
//! implements it over Snowflake's REST endpoints.

mod decode;
mod protocol;
mod snowflake;

pub use snowflake::SnowflakeSession;

use anyhow::Result;

use crate::query::Statement;
use crate::table::Table;

/// Runs read-only statements and returns fully materialized results.
#[async_trait::async_trait]
pub trait Warehouse: Send + Sync {
    async fn query(&self, statement: &Statement) -> Result<Table>;
}
