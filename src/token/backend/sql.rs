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

//! Relational token driver.
//!
//! Expiration and validity are ordinary filtered columns; the tenant
//! reference travels inside the opaque claim blob, so the table stays at
//! `(id, expires, extra, valid, user_id)`. Revocation is an in-place update
//! inside a transaction committed before the call returns, so a subsequent
//! read in the same process observes it.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::*;
use sea_orm::query::*;
use sea_orm::{Condition, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};

use crate::db::entity::{prelude::Token as DbToken, token as db_token};
use crate::keygate::ServiceState;
use crate::token::backend::TokenBackend;
use crate::token::error::{TokenProviderError, db_err};
use crate::token::types::{RevokedToken, Token, is_live};

#[derive(Clone, Debug, Default)]
pub struct SqlBackend {}

#[async_trait]
impl TokenBackend for SqlBackend {
    #[tracing::instrument(level = "debug", skip(self, state, token))]
    async fn create_token(
        &self,
        state: &ServiceState,
        token: Token,
    ) -> Result<Token, TokenProviderError> {
        create_token(&state.db, token).await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_token(
        &self,
        state: &ServiceState,
        token_id: &str,
    ) -> Result<Token, TokenProviderError> {
        get_token(&state.db, token_id).await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn delete_token(
        &self,
        state: &ServiceState,
        token_id: &str,
    ) -> Result<(), TokenProviderError> {
        delete_token(&state.db, token_id).await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn list_tokens<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<Vec<String>, TokenProviderError> {
        list_tokens(&state.db, user_id, tenant_id).await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn list_revoked_tokens(
        &self,
        state: &ServiceState,
    ) -> Result<Vec<RevokedToken>, TokenProviderError> {
        list_revoked_tokens(&state.db).await
    }
}

/// The shape of the opaque claim blob: the tenant reference rides along
/// with the caller's claims.
#[derive(Debug, Default, Deserialize, Serialize)]
struct ExtraPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
    #[serde(default)]
    extra: serde_json::Value,
}

fn to_entry(token: &Token) -> Result<db_token::ActiveModel, TokenProviderError> {
    let payload = ExtraPayload {
        tenant_id: token.tenant_id.clone(),
        extra: token.extra.clone(),
    };
    Ok(db_token::ActiveModel {
        id: Set(token.id.clone()),
        expires: Set(token.expires_at),
        extra: Set(Some(serde_json::to_value(payload)?)),
        valid: Set(token.valid),
        user_id: Set(token.user_id.clone()),
    })
}

fn from_entry(entry: db_token::Model) -> Result<Token, TokenProviderError> {
    let payload: ExtraPayload = entry
        .extra
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();
    Ok(Token {
        id: entry.id,
        user_id: entry.user_id,
        tenant_id: payload.tenant_id,
        expires_at: entry.expires,
        extra: payload.extra,
        valid: entry.valid,
    })
}

pub async fn create_token(
    db: &DatabaseConnection,
    token: Token,
) -> Result<Token, TokenProviderError> {
    let entry = to_entry(&token)?;
    entry
        .insert(db)
        .await
        .map_err(|e| db_err(e, "persisting the token"))?;
    Ok(token)
}

pub async fn get_token(
    db: &DatabaseConnection,
    token_id: &str,
) -> Result<Token, TokenProviderError> {
    let entry: Option<db_token::Model> = DbToken::find_by_id(token_id)
        .filter(db_token::Column::Valid.eq(true))
        .one(db)
        .await
        .map_err(|e| db_err(e, "fetching the token"))?;
    let Some(entry) = entry else {
        return Err(TokenProviderError::TokenNotFound(token_id.into()));
    };
    let token = from_entry(entry)?;
    if !is_live(token.valid, token.expires_at, Utc::now()) {
        return Err(TokenProviderError::TokenNotFound(token_id.into()));
    }
    Ok(token)
}

pub async fn delete_token(
    db: &DatabaseConnection,
    token_id: &str,
) -> Result<(), TokenProviderError> {
    let txn = db
        .begin()
        .await
        .map_err(|e| db_err(e, "starting the transaction"))?;
    let entry: Option<db_token::Model> = DbToken::find_by_id(token_id)
        .filter(db_token::Column::Valid.eq(true))
        .one(&txn)
        .await
        .map_err(|e| db_err(e, "fetching the token"))?;
    let Some(entry) = entry else {
        return Err(TokenProviderError::TokenNotFound(token_id.into()));
    };
    let mut entry: db_token::ActiveModel = entry.into();
    entry.valid = Set(false);
    entry
        .update(&txn)
        .await
        .map_err(|e| db_err(e, "revoking the token"))?;
    txn.commit()
        .await
        .map_err(|e| db_err(e, "committing the transaction"))?;
    Ok(())
}

pub async fn list_tokens(
    db: &DatabaseConnection,
    user_id: &str,
    tenant_id: Option<&str>,
) -> Result<Vec<String>, TokenProviderError> {
    let now = Utc::now();
    let entries = DbToken::find()
        .filter(db_token::Column::UserId.eq(user_id))
        .filter(db_token::Column::Valid.eq(true))
        .filter(
            Condition::any()
                .add(db_token::Column::Expires.gt(now))
                .add(db_token::Column::Expires.is_null()),
        )
        .all(db)
        .await
        .map_err(|e| db_err(e, "listing user tokens"))?;

    let mut tokens = Vec::new();
    for entry in entries {
        let token = from_entry(entry)?;
        if tenant_id.is_none_or(|tenant_id| token.tenant_id.as_deref() == Some(tenant_id)) {
            tokens.push(token.id);
        }
    }
    Ok(tokens)
}

pub async fn list_revoked_tokens(
    db: &DatabaseConnection,
) -> Result<Vec<RevokedToken>, TokenProviderError> {
    let entries = DbToken::find()
        .filter(db_token::Column::Valid.eq(false))
        .all(db)
        .await
        .map_err(|e| db_err(e, "listing revoked tokens"))?;
    Ok(entries
        .into_iter()
        .map(|entry| RevokedToken {
            id: entry.id,
            expires_at: entry.expires,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    use super::*;

    fn token_entry(
        id: &str,
        valid: bool,
        expires_in: Option<TimeDelta>,
        tenant_id: Option<&str>,
    ) -> db_token::Model {
        db_token::Model {
            id: id.into(),
            expires: expires_in.map(|delta| Utc::now() + delta),
            extra: Some(json!({"tenant_id": tenant_id, "extra": {"trace": "x"}})),
            valid,
            user_id: "u1".into(),
        }
    }

    #[tokio::test]
    async fn test_get_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![token_entry(
                "tok1",
                true,
                Some(TimeDelta::hours(1)),
                Some("t1"),
            )]])
            .into_connection();

        let token = get_token(&db, "tok1").await.unwrap();
        assert_eq!(token.id, "tok1");
        assert_eq!(token.user_id, "u1");
        assert_eq!(token.tenant_id, Some("t1".into()));
        assert_eq!(token.extra, json!({"trace": "x"}));
        assert!(token.valid);
    }

    #[tokio::test]
    async fn test_get_token_absent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<db_token::Model>::new()])
            .into_connection();

        match get_token(&db, "missing").await {
            Err(TokenProviderError::TokenNotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("absent token must not be found: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_token_expired() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![token_entry(
                "tok1",
                true,
                Some(TimeDelta::hours(-1)),
                None,
            )]])
            .into_connection();

        assert!(matches!(
            get_token(&db, "tok1").await,
            Err(TokenProviderError::TokenNotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_get_token_without_expiry_is_live() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![token_entry("tok1", true, None, None)]])
            .into_connection();

        let token = get_token(&db, "tok1").await.unwrap();
        assert!(token.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_create_token_roundtrips_record() {
        let stored = token_entry("tok1", true, Some(TimeDelta::hours(1)), Some("t1"));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored.clone()]])
            .append_exec_results([MockExecResult {
                rows_affected: 1,
                ..Default::default()
            }])
            .into_connection();

        let token = Token {
            id: "tok1".into(),
            user_id: "u1".into(),
            tenant_id: Some("t1".into()),
            expires_at: stored.expires,
            extra: json!({"trace": "x"}),
            valid: true,
        };
        let created = create_token(&db, token.clone()).await.unwrap();
        assert_eq!(created, token);
    }

    #[tokio::test]
    async fn test_delete_token_revokes() {
        let entry = token_entry("tok1", true, Some(TimeDelta::hours(1)), None);
        let mut revoked = entry.clone();
        revoked.valid = false;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![entry]])
            .append_query_results([vec![revoked]])
            .append_exec_results([MockExecResult {
                rows_affected: 1,
                ..Default::default()
            }])
            .into_connection();

        delete_token(&db, "tok1").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_token_absent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<db_token::Model>::new()])
            .into_connection();

        assert!(matches!(
            delete_token(&db, "missing").await,
            Err(TokenProviderError::TokenNotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_list_tokens_filters_tenant_from_blob() {
        let entries = vec![
            token_entry("tok1", true, Some(TimeDelta::hours(1)), Some("t1")),
            token_entry("tok2", true, Some(TimeDelta::hours(1)), Some("t2")),
            token_entry("tok3", true, Some(TimeDelta::hours(1)), None),
        ];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([entries.clone()])
            .append_query_results([entries])
            .into_connection();

        assert_eq!(
            list_tokens(&db, "u1", Some("t1")).await.unwrap(),
            vec!["tok1"]
        );
        assert_eq!(
            list_tokens(&db, "u1", None).await.unwrap(),
            vec!["tok1", "tok2", "tok3"]
        );
    }

    #[tokio::test]
    async fn test_list_revoked_tokens() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                token_entry("tok1", false, Some(TimeDelta::hours(-1)), None),
                token_entry("tok2", false, None, None),
            ]])
            .into_connection();

        let revoked = list_revoked_tokens(&db).await.unwrap();
        assert_eq!(revoked.len(), 2, "expired revocations stay listed");
        assert_eq!(revoked[0].id, "tok1");
        assert_eq!(revoked[1].id, "tok2");
    }
}
