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

use async_trait::async_trait;

use crate::keygate::ServiceState;
use crate::token::error::TokenProviderError;
use crate::token::types::{RevokedToken, Token, TokenCreate};

/// The token lifecycle contract exposed to callers, identical across the
/// interchangeable storage drivers.
#[async_trait]
pub trait TokenApi: Send + Sync {
    /// Persist a token under the caller-supplied ID. An absent expiration
    /// receives the configured default validity duration.
    async fn create_token<'a>(
        &self,
        state: &ServiceState,
        token_id: &'a str,
        token: TokenCreate,
    ) -> Result<Token, TokenProviderError>;

    /// Retrieve the token. Revoked, expired and absent tokens are uniformly
    /// not found.
    async fn get_token<'a>(
        &self,
        state: &ServiceState,
        token_id: &'a str,
    ) -> Result<Token, TokenProviderError>;

    /// Revoke the token: the validity flag is cleared, the record is kept
    /// for revocation audits. Not found when the token is absent or already
    /// revoked.
    async fn delete_token<'a>(
        &self,
        state: &ServiceState,
        token_id: &'a str,
    ) -> Result<(), TokenProviderError>;

    /// IDs of the live tokens of the user, optionally narrowed to a tenant
    /// scope.
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
