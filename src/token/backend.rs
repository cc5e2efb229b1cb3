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
//! Token provider backends.

use async_trait::async_trait;

use crate::keygate::ServiceState;
use crate::token::error::TokenProviderError;
use crate::token::types::{RevokedToken, Token};

pub mod column;
pub mod kvs;
pub mod sql;

/// The storage driver contract of the token provider. The provider hands
/// over fully normalized records (id assigned, default expiration applied,
/// validity set); the drivers translate the record into backend-native
/// expiration and revocation mechanics. Every driver owns its connection
/// lifecycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenBackend: Send + Sync {
    /// Persist the normalized record.
    async fn create_token(
        &self,
        state: &ServiceState,
        token: Token,
    ) -> Result<Token, TokenProviderError>;

    /// Read the record; revoked, expired and absent are uniformly not
    /// found.
    async fn get_token(
        &self,
        state: &ServiceState,
        token_id: &str,
    ) -> Result<Token, TokenProviderError>;

    /// Clear the validity flag, keeping the record for revocation audits.
    async fn delete_token(
        &self,
        state: &ServiceState,
        token_id: &str,
    ) -> Result<(), TokenProviderError>;

    /// IDs of the live tokens of the user, optionally tenant-scoped.
    async fn list_tokens<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<Vec<String>, TokenProviderError>;

    /// Every revoked token, regardless of expiration.
    async fn list_revoked_tokens(
        &self,
        state: &ServiceState,
    ) -> Result<Vec<RevokedToken>, TokenProviderError>;
}
