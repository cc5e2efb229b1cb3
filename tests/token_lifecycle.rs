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

//! Token lifecycle over the in-process key-value driver, exercised through
//! the provider contract the way a front end consumes it.

use chrono::{TimeDelta, Utc};
use eyre::Result;
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;

use keygate::config::{Config, TokenBackendDriver};
use keygate::keygate::{Service, ServiceState};
use keygate::provider::Provider;
use keygate::token::{TokenApi, TokenCreate, TokenProviderError};

fn kvs_state() -> ServiceState {
    let mut config = Config::default();
    config.token.driver = TokenBackendDriver::Kvs;
    config.token.expiration = 3600;
    let provider = Provider::new(config.clone()).unwrap();
    Arc::new(Service::new(config, DatabaseConnection::Disconnected, provider).unwrap())
}

#[tokio::test]
async fn test_token_lifecycle() -> Result<()> {
    let state = kvs_state();
    let tokens = state.provider.get_token_provider();

    // Creation without an expiration applies the configured default.
    let created = tokens
        .create_token(
            &state,
            "tok1",
            TokenCreate {
                user_id: "u1".into(),
                tenant_id: Some("t1".into()),
                extra: json!({"audit_id": "abc"}),
                ..Default::default()
            },
        )
        .await?;
    let expires_at = created.expires_at.expect("default expiry applied");
    let expected = Utc::now() + TimeDelta::seconds(3600);
    assert!((expected - expires_at).abs() < TimeDelta::seconds(5));

    // Live read returns the normalized record.
    let fetched = tokens.get_token(&state, "tok1").await?;
    assert_eq!(fetched, created);

    // Same id again conflicts.
    assert!(matches!(
        tokens
            .create_token(
                &state,
                "tok1",
                TokenCreate {
                    user_id: "u1".into(),
                    ..Default::default()
                },
            )
            .await,
        Err(TokenProviderError::Conflict { .. })
    ));

    // Listing sees the live token, in and out of the tenant scope.
    assert_eq!(
        tokens.list_tokens(&state, "u1", None).await.unwrap(),
        ["tok1"]
    );
    assert_eq!(
        tokens.list_tokens(&state, "u1", Some("t1")).await.unwrap(),
        ["tok1"]
    );
    assert!(
        tokens
            .list_tokens(&state, "u1", Some("t2"))
            .await
            .unwrap()
            .is_empty()
    );

    // Revocation is permanent: reads and repeated revocations fail like
    // the token never existed, while the audit listing keeps it.
    tokens.delete_token(&state, "tok1").await?;
    assert!(matches!(
        tokens.get_token(&state, "tok1").await,
        Err(TokenProviderError::TokenNotFound(..))
    ));
    assert!(matches!(
        tokens.delete_token(&state, "tok1").await,
        Err(TokenProviderError::TokenNotFound(..))
    ));

    // Unrelated operations do not disturb the audit trail.
    tokens
        .create_token(
            &state,
            "tok2",
            TokenCreate {
                user_id: "u2".into(),
                ..Default::default()
            },
        )
        .await?;
    let revoked = tokens.list_revoked_tokens(&state).await?;
    assert_eq!(revoked.len(), 1);
    assert_eq!(revoked[0].id, "tok1");
    assert_eq!(revoked[0].expires_at, created.expires_at);
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_not_found() -> Result<()> {
    let state = kvs_state();
    let tokens = state.provider.get_token_provider();

    tokens
        .create_token(
            &state,
            "tok-past",
            TokenCreate {
                user_id: "u1".into(),
                expires_at: Some(Utc::now() - TimeDelta::seconds(1)),
                ..Default::default()
            },
        )
        .await?;

    assert!(matches!(
        tokens.get_token(&state, "tok-past").await,
        Err(TokenProviderError::TokenNotFound(..))
    ));
    assert!(
        tokens
            .list_tokens(&state, "u1", None)
            .await
            .unwrap()
            .is_empty()
    );

    // A token that is still inside its validity window reads fine up to
    // the expiry.
    tokens
        .create_token(
            &state,
            "tok-future",
            TokenCreate {
                user_id: "u1".into(),
                expires_at: Some(Utc::now() + TimeDelta::hours(1)),
                ..Default::default()
            },
        )
        .await?;
    assert!(tokens.get_token(&state, "tok-future").await.is_ok());
    Ok(())
}
