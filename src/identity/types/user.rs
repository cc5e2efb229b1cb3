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

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::BuilderError;

/// User as returned by the identity backend. The password never leaves the
/// backend.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct UserResponse {
    /// The user ID.
    #[validate(length(max = 64))]
    pub id: String,

    /// The user name. Must be unique within the backend.
    #[validate(length(max = 255))]
    pub name: String,

    /// If the user is enabled, this value is true. The directory schema has
    /// no portable way to express the flag, so entries read back from the
    /// directory report the creation-time default.
    pub enabled: bool,

    /// The ID of the default tenant for the user. Setting this attribute
    /// does not grant any actual authorization on the tenant, it is merely
    /// provided for convenience.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub tenant_id: Option<String>,

    /// IDs of the tenants the user is a member of. Populated on single-user
    /// reads only.
    #[builder(default)]
    pub tenants: Option<Vec<String>>,

    /// Additional user properties.
    #[builder(default)]
    pub extra: Option<Value>,
}

/// User creation data.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct UserCreate {
    /// The ID of the user. When unset a new UUID would be assigned.
    #[builder(default)]
    #[validate(length(min = 1, max = 64))]
    pub id: Option<String>,

    /// The user name. Must be unique within the backend.
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// User password.
    #[builder(default)]
    #[validate(length(max = 4096))]
    pub password: Option<String>,

    /// The ID of the default tenant for the user. The user is added to the
    /// tenant membership on creation.
    #[builder(default)]
    #[validate(length(min = 1, max = 64))]
    pub tenant_id: Option<String>,

    /// If the user is enabled, this value is true.
    #[builder(default)]
    pub enabled: Option<bool>,

    /// Additional user properties.
    #[builder(default)]
    pub extra: Option<Value>,
}

/// User update data. Unset fields are left unchanged.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(into))]
pub struct UserUpdate {
    /// The user name. The name of an existing user cannot be changed;
    /// supplying a different value is rejected.
    #[builder(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,

    /// New user password.
    #[builder(default)]
    #[validate(length(max = 4096))]
    pub password: Option<String>,

    /// The ID of the default tenant. `Some(None)` clears the reference.
    #[builder(default)]
    pub tenant_id: Option<Option<String>>,

    /// If the user is enabled, this value is true.
    #[builder(default)]
    pub enabled: Option<bool>,

    /// Additional user properties.
    #[builder(default)]
    pub extra: Option<Value>,
}

/// User listing parameters.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
pub struct UserListParameters {
    /// Filter users by the name attribute.
    #[builder(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,
}

/// User password authentication request.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct UserPasswordAuthRequest {
    /// User ID.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub id: Option<String>,

    /// User name.
    #[builder(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,

    /// User password.
    #[validate(length(max = 4096))]
    pub password: String,

    /// Tenant scope requested for the authentication.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub tenant_id: Option<String>,
}

/// The product of a successful authentication: the user, the optionally
/// requested tenant scope and the role metadata derived for the pair.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct AuthenticatedInfo {
    /// The authenticated user.
    pub user: UserResponse,

    /// The tenant the authentication was scoped to.
    #[builder(default)]
    pub tenant: Option<super::tenant::Tenant>,

    /// IDs of the roles the user holds on the tenant scope.
    #[builder(default)]
    pub roles: Vec<String>,
}
