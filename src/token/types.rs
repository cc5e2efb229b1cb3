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
//! Token provider types.

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::BuilderError;

pub mod provider_api;

pub use provider_api::TokenApi;

/// The normalized token record, identical across storage drivers.
///
/// A token is in exactly one of four states: active, expired (wall clock
/// past `expires_at`), revoked (`valid` false) or absent. Expired and
/// revoked are terminal, and both read as not-found.
#[derive(Builder, Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct Token {
    /// The token ID, globally unique, supplied by the caller.
    #[validate(length(max = 64))]
    pub id: String,

    /// The user the token was issued to.
    #[validate(length(max = 64))]
    pub user_id: String,

    /// The tenant scope of the token; unscoped tokens carry none.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub tenant_id: Option<String>,

    /// Expiration timestamp. `None` never expires.
    #[builder(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Additional claims, serialized opaquely.
    #[builder(default)]
    pub extra: Value,

    /// Soft-delete marker. Once false it never reverts.
    pub valid: bool,
}

/// Token creation data.
#[derive(Builder, Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct TokenCreate {
    /// The user the token is issued to.
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,

    /// The tenant scope of the token.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub tenant_id: Option<String>,

    /// Expiration timestamp. When unset the configured default validity
    /// duration applies.
    #[builder(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Additional claims.
    #[builder(default)]
    pub extra: Value,
}

/// A revoked token as surfaced by the revocation-audit listing.
#[derive(Builder, Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct RevokedToken {
    /// The token ID.
    pub id: String,

    /// Expiration timestamp the token carried.
    #[builder(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Whether a record in the given state is visible to retrieval at `now`.
pub fn is_live(valid: bool, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    valid && expires_at.is_none_or(|expires_at| now < expires_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_is_live() {
        let now = Utc::now();
        let later = now + TimeDelta::hours(1);
        let earlier = now - TimeDelta::hours(1);

        assert!(is_live(true, Some(later), now));
        assert!(is_live(true, None, now), "no expiration never expires");
        assert!(!is_live(true, Some(earlier), now));
        assert!(!is_live(true, Some(now), now), "expiry instant is expired");
        assert!(!is_live(false, Some(later), now));
        assert!(!is_live(false, None, now));
    }
}
