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

//! In-process key-value token driver.
//!
//! Each token is one key in a process-wide concurrent map, namespaced by
//! prefix. Revocation removes the primary key and writes a shadow key under
//! the revoked prefix, so the revocation history survives the removal of
//! the live record.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::keygate::ServiceState;
use crate::token::backend::TokenBackend;
use crate::token::error::TokenProviderError;
use crate::token::types::{RevokedToken, Token, is_live};

const TOKEN_PREFIX: &str = "token-";
const REVOKED_TOKEN_PREFIX: &str = "revoked-token-";

#[derive(Debug, Default)]
pub struct KvsBackend {
    db: DashMap<String, Token>,
}

fn token_key(token_id: &str) -> String {
    format!("{TOKEN_PREFIX}{token_id}")
}

fn revoked_key(token_id: &str) -> String {
    format!("{REVOKED_TOKEN_PREFIX}{token_id}")
}

#[async_trait]
impl TokenBackend for KvsBackend {
    #[tracing::instrument(level = "debug", skip(self, _state, token))]
    async fn create_token(
        &self,
        _state: &ServiceState,
        token: Token,
    ) -> Result<Token, TokenProviderError> {
        let key = token_key(&token.id);
        if self.db.contains_key(&key) {
            return Err(TokenProviderError::Conflict {
                message: format!("token {} already exists", token.id),
                context: "persisting the token".into(),
            });
        }
        self.db.insert(key, token.clone());
        Ok(token)
    }

    #[tracing::instrument(level = "debug", skip(self, _state))]
    async fn get_token(
        &self,
        _state: &ServiceState,
        token_id: &str,
    ) -> Result<Token, TokenProviderError> {
        let not_found = || TokenProviderError::TokenNotFound(token_id.into());
        let token = self
            .db
            .get(&token_key(token_id))
            .map(|entry| entry.value().clone())
            .ok_or_else(not_found)?;
        if !is_live(token.valid, token.expires_at, Utc::now()) {
            return Err(not_found());
        }
        Ok(token)
    }

    /// Revocation moves the record under the shadow key. An expired but
    /// still valid token can be revoked; an absent or already revoked one
    /// cannot.
    #[tracing::instrument(level = "debug", skip(self, _state))]
    async fn delete_token(
        &self,
        _state: &ServiceState,
        token_id: &str,
    ) -> Result<(), TokenProviderError> {
        let Some((_, mut token)) = self.db.remove(&token_key(token_id)) else {
            return Err(TokenProviderError::TokenNotFound(token_id.into()));
        };
        token.valid = false;
        self.db.insert(revoked_key(token_id), token);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, _state))]
    async fn list_tokens<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<Vec<String>, TokenProviderError> {
        let now = Utc::now();
        let mut tokens: Vec<String> = self
            .db
            .iter()
            .filter(|entry| entry.key().starts_with(TOKEN_PREFIX))
            .filter(|entry| {
                let token = entry.value();
                is_live(token.valid, token.expires_at, now)
                    && token.user_id == user_id
                    && tenant_id
                        .is_none_or(|tenant_id| token.tenant_id.as_deref() == Some(tenant_id))
            })
            .map(|entry| entry.value().id.clone())
            .collect();
        tokens.sort();
        Ok(tokens)
    }

    #[tracing::instrument(level = "debug", skip(self, _state))]
    async fn list_revoked_tokens(
        &self,
        _state: &ServiceState,
    ) -> Result<Vec<RevokedToken>, TokenProviderError> {
        let mut tokens: Vec<RevokedToken> = self
            .db
            .iter()
            .filter(|entry| entry.key().starts_with(REVOKED_TOKEN_PREFIX))
            .map(|entry| RevokedToken {
                id: entry.value().id.clone(),
                expires_at: entry.value().expires_at,
            })
            .collect();
        tokens.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use serde_json::json;
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::keygate::Service;
    use crate::provider::Provider;

    fn state() -> ServiceState {
        let config = Config::default();
        let provider = Provider::new(config.clone()).unwrap();
        Arc::new(
            Service::new(
                config,
                sea_orm::DatabaseConnection::Disconnected,
                provider,
            )
            .unwrap(),
        )
    }

    fn token(id: &str, user_id: &str, tenant_id: Option<&str>, expires_in: i64) -> Token {
        Token {
            id: id.into(),
            user_id: user_id.into(),
            tenant_id: tenant_id.map(Into::into),
            expires_at: Some(Utc::now() + TimeDelta::seconds(expires_in)),
            extra: json!({}),
            valid: true,
        }
    }

    #[tokio::test]
    async fn test_create_get_roundtrip() {
        let state = state();
        let backend = KvsBackend::default();
        let tok = token("tok1", "u1", Some("t1"), 3600);
        backend.create_token(&state, tok.clone()).await.unwrap();
        assert_eq!(backend.get_token(&state, "tok1").await.unwrap(), tok);
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let state = state();
        let backend = KvsBackend::default();
        backend
            .create_token(&state, token("tok1", "u1", None, 3600))
            .await
            .unwrap();
        assert!(matches!(
            backend
                .create_token(&state, token("tok1", "u1", None, 3600))
                .await,
            Err(TokenProviderError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_token_reads_as_absent() {
        let state = state();
        let backend = KvsBackend::default();
        backend
            .create_token(&state, token("tok1", "u1", None, -1))
            .await
            .unwrap();
        assert!(matches!(
            backend.get_token(&state, "tok1").await,
            Err(TokenProviderError::TokenNotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_token_without_expiry_never_expires() {
        let state = state();
        let backend = KvsBackend::default();
        let mut tok = token("tok1", "u1", None, 0);
        tok.expires_at = None;
        backend.create_token(&state, tok.clone()).await.unwrap();
        assert_eq!(backend.get_token(&state, "tok1").await.unwrap(), tok);
    }

    #[tokio::test]
    async fn test_revocation_is_permanent_and_audited() {
        let state = state();
        let backend = KvsBackend::default();
        let tok = token("tok1", "u1", None, 3600);
        backend.create_token(&state, tok.clone()).await.unwrap();

        backend.delete_token(&state, "tok1").await.unwrap();

        // Reads fail exactly like for a token that never existed.
        assert!(matches!(
            backend.get_token(&state, "tok1").await,
            Err(TokenProviderError::TokenNotFound(..))
        ));
        // Revoking twice is not found as well.
        assert!(matches!(
            backend.delete_token(&state, "tok1").await,
            Err(TokenProviderError::TokenNotFound(..))
        ));

        // The shadow record keeps the audit trail, also across unrelated
        // operations.
        backend
            .create_token(&state, token("tok2", "u2", None, 3600))
            .await
            .unwrap();
        backend.delete_token(&state, "tok2").await.unwrap();
        let revoked = backend.list_revoked_tokens(&state).await.unwrap();
        assert_eq!(
            revoked.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            ["tok1", "tok2"]
        );
        assert_eq!(revoked[0].expires_at, tok.expires_at);
    }

    #[tokio::test]
    async fn test_list_tokens_filters() {
        let state = state();
        let backend = KvsBackend::default();
        backend
            .create_token(&state, token("tok1", "u1", Some("t1"), 3600))
            .await
            .unwrap();
        backend
            .create_token(&state, token("tok2", "u1", Some("t2"), 3600))
            .await
            .unwrap();
        backend
            .create_token(&state, token("tok3", "u1", None, -1))
            .await
            .unwrap();
        backend
            .create_token(&state, token("tok4", "u2", Some("t1"), 3600))
            .await
            .unwrap();

        assert_eq!(
            backend.list_tokens(&state, "u1", None).await.unwrap(),
            ["tok1", "tok2"],
            "expired tokens are not listed"
        );
        assert_eq!(
            backend.list_tokens(&state, "u1", Some("t1")).await.unwrap(),
            ["tok1"]
        );
        assert!(
            backend
                .list_tokens(&state, "u3", None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_revoked_tokens_are_not_listed_as_live() {
        let state = state();
        let backend = KvsBackend::default();
        backend
            .create_token(&state, token("tok1", "u1", None, 3600))
            .await
            .unwrap();
        backend.delete_token(&state, "tok1").await.unwrap();
        assert!(
            backend
                .list_tokens(&state, "u1", None)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
