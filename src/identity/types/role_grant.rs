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
//! Role grant and its synthetic identifier.
//!
//! A role grant is a ternary relation (role, tenant, user), while the
//! backing stores address records by a single string. The grant reference
//! packs the three components into one reversible identifier:
//!
//! ```text
//! {role_len}-{tenant_len}-{role_id}{tenant_id}{user_id}
//! ```
//!
//! An absent tenant encodes with length zero and decodes back to `None`.
//! Empty strings are not legal component values; they are rejected at encode
//! time so a grant for the "empty-named" tenant can never be confused with a
//! global grant.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BuilderError;

/// An assignment of a role to a user, optionally scoped to a tenant.
///
/// A grant has no independent lifecycle: it is created and destroyed as a
/// side effect of the role assignment operations, and its identity is
/// derived from the three components.
#[derive(Builder, Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct RoleGrant {
    /// Synthetic grant reference.
    pub id: String,

    /// The granted role.
    pub role_id: String,

    /// The tenant scope of the grant. `None` denotes a global grant.
    #[builder(default)]
    pub tenant_id: Option<String>,

    /// The user holding the grant.
    pub user_id: String,
}

impl RoleGrant {
    /// Assemble a grant from its components, deriving the reference.
    pub fn new(
        role_id: impl Into<String>,
        tenant_id: Option<impl Into<String>>,
        user_id: impl Into<String>,
    ) -> Result<Self, GrantRefError> {
        let role_id = role_id.into();
        let tenant_id = tenant_id.map(Into::into);
        let user_id = user_id.into();
        Ok(Self {
            id: encode_grant_ref(&role_id, tenant_id.as_deref(), &user_id)?,
            role_id,
            tenant_id,
            user_id,
        })
    }
}

/// Grant reference codec errors.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum GrantRefError {
    /// A component is the empty string and would be indistinguishable from
    /// an absent one.
    #[error("grant {0} must not be empty")]
    EmptyComponent(&'static str),

    /// The reference does not decode back into three components.
    #[error("malformed grant reference: {0}")]
    Malformed(String),
}

/// Pack `(role_id, tenant_id, user_id)` into a single grant reference.
pub fn encode_grant_ref(
    role_id: &str,
    tenant_id: Option<&str>,
    user_id: &str,
) -> Result<String, GrantRefError> {
    if role_id.is_empty() {
        return Err(GrantRefError::EmptyComponent("role_id"));
    }
    if user_id.is_empty() {
        return Err(GrantRefError::EmptyComponent("user_id"));
    }
    if tenant_id.is_some_and(str::is_empty) {
        return Err(GrantRefError::EmptyComponent("tenant_id"));
    }
    let tenant = tenant_id.unwrap_or("");
    Ok(format!(
        "{}-{}-{}{}{}",
        role_id.len(),
        tenant.len(),
        role_id,
        tenant,
        user_id
    ))
}

/// Unpack a grant reference into `(role_id, tenant_id, user_id)`.
pub fn decode_grant_ref(grant_ref: &str) -> Result<(String, Option<String>, String), GrantRefError> {
    let malformed = || GrantRefError::Malformed(grant_ref.into());

    let mut parts = grant_ref.splitn(3, '-');
    let role_len: usize = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)?;
    let tenant_len: usize = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)?;
    let tail = parts.next().ok_or_else(malformed)?;

    let role_id = tail.get(..role_len).ok_or_else(malformed)?;
    let tenant_id = tail
        .get(role_len..role_len + tenant_len)
        .ok_or_else(malformed)?;
    let user_id = &tail[role_len + tenant_len..];

    if role_id.is_empty() || user_id.is_empty() {
        return Err(malformed());
    }

    Ok((
        role_id.to_string(),
        (!tenant_id.is_empty()).then(|| tenant_id.to_string()),
        user_id.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_tenant_scoped() {
        let grant_ref = encode_grant_ref("admin", Some("t1"), "u1").unwrap();
        assert_eq!(grant_ref, "5-2-admint1u1");
        assert_eq!(
            decode_grant_ref(&grant_ref).unwrap(),
            ("admin".into(), Some("t1".into()), "u1".into())
        );
    }

    #[test]
    fn test_roundtrip_global() {
        let grant_ref = encode_grant_ref("admin", None, "u1").unwrap();
        assert_eq!(grant_ref, "5-0-adminu1");
        assert_eq!(
            decode_grant_ref(&grant_ref).unwrap(),
            ("admin".into(), None, "u1".into())
        );
    }

    #[test]
    fn test_roundtrip_ids_with_separator() {
        // The separator only delimits the two length prefixes; ids are free
        // to contain it.
        let grant_ref = encode_grant_ref("role-a", Some("tenant-b"), "user-c").unwrap();
        assert_eq!(
            decode_grant_ref(&grant_ref).unwrap(),
            ("role-a".into(), Some("tenant-b".into()), "user-c".into())
        );
    }

    #[test]
    fn test_empty_components_rejected() {
        assert_eq!(
            encode_grant_ref("", Some("t1"), "u1"),
            Err(GrantRefError::EmptyComponent("role_id"))
        );
        assert_eq!(
            encode_grant_ref("admin", Some(""), "u1"),
            Err(GrantRefError::EmptyComponent("tenant_id"))
        );
        assert_eq!(
            encode_grant_ref("admin", None, ""),
            Err(GrantRefError::EmptyComponent("user_id"))
        );
    }

    #[test]
    fn test_malformed_refs() {
        for bad in ["", "x", "1-2", "a-2-foo", "1-a-foo", "9-9-short", "0-0-"] {
            assert!(decode_grant_ref(bad).is_err(), "{bad:?} must not decode");
        }
    }

    #[test]
    fn test_grant_new_derives_reference() {
        let grant = RoleGrant::new("admin", Some("t1"), "u1").unwrap();
        assert_eq!(grant.id, "5-2-admint1u1");
        let (role_id, tenant_id, user_id) = decode_grant_ref(&grant.id).unwrap();
        assert_eq!(role_id, grant.role_id);
        assert_eq!(tenant_id, grant.tenant_id);
        assert_eq!(user_id, grant.user_id);
    }
}
