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
//! # Provider manager
//!
//! Provider manager provides access to the individual service providers. This
//! gives an easy interface for passing the overall manager down to the
//! individual providers that might need to call other providers.

use crate::config::Config;
use crate::error::KeygateError;
use crate::identity::{IdentityApi, IdentityProvider};
use crate::token::{TokenApi, TokenProvider};

/// Global provider manager.
#[derive(Clone)]
pub struct Provider {
    /// Configuration.
    pub config: Config,
    /// Identity provider.
    identity: IdentityProvider,
    /// Token provider.
    token: TokenProvider,
}

impl Provider {
    pub fn new(cfg: Config) -> Result<Self, KeygateError> {
        let identity_provider = IdentityProvider::new(&cfg)?;
        let token_provider = TokenProvider::new(&cfg)?;

        Ok(Self {
            config: cfg,
            identity: identity_provider,
            token: token_provider,
        })
    }

    /// Get the identity provider.
    pub fn get_identity_provider(&self) -> &impl IdentityApi {
        &self.identity
    }

    /// Get the token provider.
    pub fn get_token_provider(&self) -> &impl TokenApi {
        &self.token
    }
}
