// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Column store token driver.
//!
//! One row per token, keyed by the token id, with secondary indexes on the
//! validity flag, the user and the tenant so the listings avoid full scans.
//! Live rows carry a TTL derived from the expiration timestamp and vanish
//! on their own; the expiry check still runs on every read for rows written
//! with pathological or absent expirations. Revocation rewrites the row
//! without a TTL, so the revocation record outlives the original row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::frame::response::result::CqlValue;
use scylla::{Session, SessionBuilder};
use tokio::sync::OnceCell;

use crate::config::ColumnStoreSection;
use crate::keygate::ServiceState;
use crate::token::backend::TokenBackend;
use crate::token::error::{TokenProviderError, col_err};
use crate::token::types::{RevokedToken, Token, is_live};

pub struct ColumnStoreBackend {
    conf: ColumnStoreSection,
    // Owned by the driver, established on first use.
    session: OnceCell<Session>,
}

/// Row shape of the token column family.
type TokenRow = (
    String,
    Option<String>,
    Option<bool>,
    Option<i64>,
    Option<String>,
);

impl ColumnStoreBackend {
    pub fn new(conf: ColumnStoreSection) -> Self {
        Self {
            conf,
            session: OnceCell::new(),
        }
    }

    fn table(&self) -> String {
        format!("{}.token", self.conf.keyspace)
    }

    async fn session(&self) -> Result<&Session, TokenProviderError> {
        self.session
            .get_or_try_init(|| async {
                Ok::<_, TokenProviderError>(
                    SessionBuilder::new()
                        .known_nodes(&self.conf.nodes)
                        .build()
                        .await?,
                )
            })
            .await
    }

    /// Create the keyspace, the token column family and its secondary
    /// indexes when absent.
    pub async fn ensure_schema(&self) -> Result<(), TokenProviderError> {
        let session = self.session().await?;
        let keyspace = &self.conf.keyspace;
        let statements = [
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {keyspace}.token (token_id text PRIMARY KEY, \
                 user_id text, tenant_id text, valid boolean, expires bigint, extra text)"
            ),
            format!("CREATE INDEX IF NOT EXISTS token_valid ON {keyspace}.token (valid)"),
            format!("CREATE INDEX IF NOT EXISTS token_user_id ON {keyspace}.token (user_id)"),
            format!("CREATE INDEX IF NOT EXISTS token_tenant_id ON {keyspace}.token (tenant_id)"),
        ];
        for statement in statements {
            session
                .query(statement, ())
                .await
                .map_err(|e| col_err(e, "preparing the token schema"))?;
        }
        Ok(())
    }

    async fn read_row(&self, token_id: &str) -> Result<Option<Token>, TokenProviderError> {
        let session = self.session().await?;
        let result = session
            .query(
                format!(
                    "SELECT user_id, tenant_id, valid, expires, extra FROM {} WHERE token_id = ?",
                    self.table()
                ),
                (token_id,),
            )
            .await
            .map_err(|e| col_err(e, "fetching the token"))?;
        let row = result
            .maybe_first_row_typed::<TokenRow>()
            .map_err(|e| TokenProviderError::ColumnStoreDecode {
                message: e.to_string(),
                context: "fetching the token".into(),
            })?;
        Ok(row.map(|(user_id, tenant_id, valid, expires, extra)| Token {
            id: token_id.to_string(),
            user_id,
            tenant_id,
            expires_at: ms_to_expiry(expires),
            extra: extra
                .as_deref()
                .and_then(|extra| serde_json::from_str(extra).ok())
                .unwrap_or_default(),
            valid: valid.unwrap_or(true),
        }))
    }

    async fn write_row(&self, token: &Token, ttl: Option<i32>) -> Result<bool, TokenProviderError> {
        let session = self.session().await?;
        let extra = serde_json::to_string(&token.extra)?;
        let values = (
            token.id.clone(),
            token.user_id.clone(),
            token.tenant_id.clone(),
            token.valid,
            expiry_to_ms(token.expires_at),
            extra,
        );
        let table = self.table();
        let columns = "(token_id, user_id, tenant_id, valid, expires, extra)";
        let result = match ttl {
            // Only the initial write is conditional; the revocation rewrite
            // must always win.
            Some(ttl) => session
                .query(
                    format!(
                        "INSERT INTO {table} {columns} VALUES (?, ?, ?, ?, ?, ?) \
                         IF NOT EXISTS USING TTL {ttl}"
                    ),
                    values,
                )
                .await
                .map_err(|e| col_err(e, "persisting the token"))?,
            None if token.valid => session
                .query(
                    format!("INSERT INTO {table} {columns} VALUES (?, ?, ?, ?, ?, ?) IF NOT EXISTS"),
                    values,
                )
                .await
                .map_err(|e| col_err(e, "persisting the token"))?,
            None => session
                .query(
                    format!("INSERT INTO {table} {columns} VALUES (?, ?, ?, ?, ?, ?)"),
                    values,
                )
                .await
                .map_err(|e| col_err(e, "rewriting the token"))?,
        };
        Ok(lwt_applied(result.rows().unwrap_or_default()))
    }

    async fn list_rows(
        &self,
        statement: String,
        values: impl scylla::serialize::row::SerializeRow + Send,
        context: &str,
    ) -> Result<Vec<(String, Option<i64>)>, TokenProviderError> {
        let session = self.session().await?;
        let result = session
            .query(statement, values)
            .await
            .map_err(|e| col_err(e, context))?;
        let rows = result
            .rows_typed::<(String, Option<i64>)>()
            .map_err(|e| TokenProviderError::ColumnStoreDecode {
                message: e.to_string(),
                context: context.into(),
            })?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| TokenProviderError::ColumnStoreDecode {
                message: e.to_string(),
                context: context.into(),
            })
    }
}

#[async_trait]
impl TokenBackend for ColumnStoreBackend {
    #[tracing::instrument(level = "debug", skip(self, _state, token))]
    async fn create_token(
        &self,
        _state: &ServiceState,
        token: Token,
    ) -> Result<Token, TokenProviderError> {
        let ttl = ttl_seconds(token.expires_at, Utc::now());
        if !self.write_row(&token, ttl).await? {
            return Err(TokenProviderError::Conflict {
                message: format!("token {} already exists", token.id),
                context: "persisting the token".into(),
            });
        }
        Ok(token)
    }

    #[tracing::instrument(level = "debug", skip(self, _state))]
    async fn get_token(
        &self,
        _state: &ServiceState,
        token_id: &str,
    ) -> Result<Token, TokenProviderError> {
        let token = self
            .read_row(token_id)
            .await?
            .ok_or_else(|| TokenProviderError::TokenNotFound(token_id.into()))?;
        if !is_live(token.valid, token.expires_at, Utc::now()) {
            return Err(TokenProviderError::TokenNotFound(token_id.into()));
        }
        Ok(token)
    }

    #[tracing::instrument(level = "debug", skip(self, _state))]
    async fn delete_token(
        &self,
        _state: &ServiceState,
        token_id: &str,
    ) -> Result<(), TokenProviderError> {
        let mut token = self
            .read_row(token_id)
            .await?
            .ok_or_else(|| TokenProviderError::TokenNotFound(token_id.into()))?;
        if !token.valid {
            return Err(TokenProviderError::TokenNotFound(token_id.into()));
        }
        token.valid = false;
        self.write_row(&token, None).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, _state))]
    async fn list_tokens<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<Vec<String>, TokenProviderError> {
        let table = self.table();
        let rows = match tenant_id {
            Some(tenant_id) => {
                self.list_rows(
                    format!(
                        "SELECT token_id, expires FROM {table} WHERE user_id = ? \
                         AND tenant_id = ? AND valid = true ALLOW FILTERING"
                    ),
                    (user_id, tenant_id),
                    "listing user tokens",
                )
                .await?
            }
            None => {
                self.list_rows(
                    format!(
                        "SELECT token_id, expires FROM {table} WHERE user_id = ? \
                         AND valid = true ALLOW FILTERING"
                    ),
                    (user_id,),
                    "listing user tokens",
                )
                .await?
            }
        };
        let now = Utc::now();
        Ok(rows
            .into_iter()
            .filter(|(_, expires)| is_live(true, ms_to_expiry(*expires), now))
            .map(|(token_id, _)| token_id)
            .collect())
    }

    #[tracing::instrument(level = "debug", skip(self, _state))]
    async fn list_revoked_tokens(
        &self,
        _state: &ServiceState,
    ) -> Result<Vec<RevokedToken>, TokenProviderError> {
        let rows = self
            .list_rows(
                format!(
                    "SELECT token_id, expires FROM {} WHERE valid = false ALLOW FILTERING",
                    self.table()
                ),
                (),
                "listing revoked tokens",
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, expires)| RevokedToken {
                id,
                expires_at: ms_to_expiry(expires),
            })
            .collect())
    }
}

/// TTL for the initial row: the positive number of whole seconds until the
/// expiry. Absent or non-future expirations produce no TTL.
fn ttl_seconds(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i32> {
    expires_at.and_then(|expires_at| {
        let seconds = (expires_at - now).num_seconds();
        (seconds > 0).then(|| seconds.min(i64::from(i32::MAX)) as i32)
    })
}

fn expiry_to_ms(expires_at: Option<DateTime<Utc>>) -> Option<i64> {
    expires_at.map(|expires_at| expires_at.timestamp_millis())
}

fn ms_to_expiry(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

/// Outcome of a conditional write: the first column of the first returned
/// row. Unconditional writes return no rows and count as applied.
fn lwt_applied(rows: Vec<scylla::frame::response::result::Row>) -> bool {
    match rows
        .into_iter()
        .next()
        .and_then(|row| row.columns.into_iter().next().flatten())
    {
        Some(CqlValue::Boolean(applied)) => applied,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn test_ttl_seconds() {
        let now = Utc::now();
        assert_eq!(ttl_seconds(Some(now + TimeDelta::seconds(90)), now), Some(90));
        assert_eq!(ttl_seconds(Some(now - TimeDelta::seconds(1)), now), None);
        assert_eq!(ttl_seconds(Some(now), now), None);
        assert_eq!(ttl_seconds(None, now), None);
    }

    #[test]
    fn test_expiry_ms_roundtrip() {
        let expiry = ms_to_expiry(Some(1_700_000_000_000)).unwrap();
        assert_eq!(expiry_to_ms(Some(expiry)), Some(1_700_000_000_000));
        assert_eq!(expiry_to_ms(None), None);
        assert_eq!(ms_to_expiry(None), None);
    }

    #[test]
    fn test_lwt_applied() {
        use scylla::frame::response::result::Row;
        assert!(lwt_applied(vec![]));
        assert!(lwt_applied(vec![Row {
            columns: vec![Some(CqlValue::Boolean(true))]
        }]));
        assert!(!lwt_applied(vec![Row {
            columns: vec![
                Some(CqlValue::Boolean(false)),
                Some(CqlValue::Text("tok1".into()))
            ]
        }]));
    }
}
