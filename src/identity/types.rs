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
//! Identity provider types.

use serde::{Deserialize, Serialize};

pub mod provider_api;
pub mod role;
pub mod role_grant;
pub mod tenant;
pub mod user;

pub use provider_api::IdentityApi;
pub use role::{Role, RoleCreate, RoleCreateBuilder, RoleListParameters};
pub use role_grant::{GrantRefError, RoleGrant, decode_grant_ref, encode_grant_ref};
pub use tenant::{
    Tenant, TenantBuilder, TenantCreate, TenantCreateBuilder, TenantListParameters, TenantUpdate,
    TenantUpdateBuilder,
};
pub use user::*;

/// Pagination markers surrounding a page.
///
/// Both markers are sort-key values of the paged collection: `prev` starts
/// the preceding page, `next` the following one. They are computed against
/// the full candidate list independently of the page contents so the two
/// calls agree on ordering.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PageMarkers {
    /// Marker of the preceding page, when one exists.
    pub prev: Option<String>,

    /// Marker of the following page, when one exists.
    pub next: Option<String>,
}
