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
//! # Token provider.
//!
//! Tokens enable access on behalf of a user, optionally scoped to a tenant,
//! for a finite duration, and may be revoked at any time. The provider
//! normalizes every record before handing it to the configured storage
//! driver: the caller-supplied id is applied, the validity flag is set and
//! an absent expiration receives the configured default duration. The three
//! drivers translate the same record into their native expiration and
//! revocation mechanics, so callers stay backend-agnostic.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

pub mod backend;
pub mod error;
pub mod types;

use crate::config::{Config, TokenBackendDriver};
use crate::keygate::ServiceState;
use crate::token::backend::TokenBackend;
use crate::token::backend::column::ColumnStoreBackend;
use crate::token::backend::kvs::KvsBackend;
use crate::token::backend::sql::SqlBackend;

pub use crate::token::error::TokenProviderError;
pub use crate::token::types::*;

#[derive(Clone)]
pub struct TokenProvider {
    config: Config,
    backend_driver: Arc<dyn TokenBackend>,
}

impl TokenProvider {
    pub fn new(config: &Config) -> Result<Self, TokenProviderError> {
        let backend_driver: Arc<dyn TokenBackend> = match config.token.driver {
            TokenBackendDriver::Sql => Arc::new(SqlBackend::default()),
            TokenBackendDriver::Kvs => Arc::new(KvsBackend::default()),
            TokenBackendDriver::Column => {
                Arc::new(ColumnStoreBackend::new(config.column_store.clone()))
            }
        };
        Ok(Self {
            config: config.clone(),
            backend_driver,
        })
    }

    fn get_new_token_expiry(&self) -> Result<DateTime<Utc>, TokenProviderError> {
        Utc::now()
            .checked_add_signed(TimeDelta::seconds(self.config.token.expiration as i64))
            .ok_or(TokenProviderError::ExpiryCalculation)
    }
}

#[async_trait]
impl TokenApi for TokenProvider {
    /// Create the token under the caller-supplied ID.
    #[tracing::instrument(level = "info", skip(self, state, token))]
    async fn create_token<'a>(
        &self,
        state: &ServiceState,
        token_id: &'a str,
        token: TokenCreate,
    ) -> Result<Token, TokenProviderError> {
        let expires_at = match token.expires_at {
            Some(expires_at) => expires_at,
            None => self.get_new_token_expiry()?,
        };
        let record = Token {
            id: token_id.to_string(),
            user_id: token.user_id,
            tenant_id: token.tenant_id,
            expires_at: Some(expires_at),
            extra: token.extra,
            valid: true,
        };
        self.backend_driver.create_token(state, record).await
    }

    /// Get the token by ID.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_token<'a>(
        &self,
        state: &ServiceState,
        token_id: &'a str,
    ) -> Result<Token, TokenProviderError> {
        self.backend_driver.get_token(state, token_id).await
    }

    /// Revoke the token.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn delete_token<'a>(
        &self,
        state: &ServiceState,
        token_id: &'a str,
    ) -> Result<(), TokenProviderError> {
        self.backend_driver.delete_token(state, token_id).await
    }

    /// List live tokens of the user.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_tokens<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<Vec<String>, TokenProviderError> {
        self.backend_driver
            .list_tokens(state, user_id, tenant_id)
            .await
    }

    /// List revoked tokens.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_revoked_tokens(
        &self,
        state: &ServiceState,
    ) -> Result<Vec<RevokedToken>, TokenProviderError> {
        self.backend_driver.list_revoked_tokens(state).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use sea_orm::DatabaseConnection;
    use serde_json::json;
    use std::sync::Arc;
    use tracing_test::traced_test;

    use super::*;
    use crate::keygate::Service;
    use crate::provider::Provider;
    use crate::token::backend::MockTokenBackend;

    fn state() -> ServiceState {
        let config = Config::default();
        let provider = Provider::new(config.clone()).unwrap();
        Arc::new(Service::new(config, DatabaseConnection::Disconnected, provider).unwrap())
    }

    fn mocked_provider(mock: MockTokenBackend, config: Config) -> TokenProvider {
        TokenProvider {
            config,
            backend_driver: Arc::new(mock),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_create_token_applies_default_expiry() {
        let mut config = Config::default();
        config.token.expiration = 3600;

        let mut mock = MockTokenBackend::default();
        mock.expect_create_token()
            .withf(|_, token| {
                let expires_at = token.expires_at.expect("default expiry must be set");
                let expected = Utc::now() + TimeDelta::seconds(3600);
                token.valid
                    && (expected - expires_at).abs() < TimeDelta::seconds(5)
            })
            .returning(|_, token| Ok(token));

        let provider = mocked_provider(mock, config);
        let token = provider
            .create_token(
                &state(),
                "tok1",
                TokenCreate {
                    user_id: "u1".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(token.id, "tok1");
        assert!(token.valid);
    }

    #[tokio::test]
    async fn test_create_token_keeps_explicit_expiry() {
        let explicit = Utc::now() + TimeDelta::minutes(5);

        let mut mock = MockTokenBackend::default();
        mock.expect_create_token()
            .withf(move |_, token| token.expires_at == Some(explicit))
            .returning(|_, token| Ok(token));

        let provider = mocked_provider(mock, Config::default());
        let token = provider
            .create_token(
                &state(),
                "tok1",
                TokenCreate {
                    user_id: "u1".into(),
                    tenant_id: Some("t1".into()),
                    expires_at: Some(explicit),
                    extra: json!({"audit": 1}),
                },
            )
            .await
            .unwrap();
        assert_eq!(token.tenant_id, Some("t1".into()));
        assert_eq!(token.extra, json!({"audit": 1}));
    }
}
