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
use validator::Validate;

use crate::error::BuilderError;

/// Tenant (project). The membership list lives in the backing store and is
/// surfaced through the membership operations rather than a record field.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct Tenant {
    /// The tenant ID.
    #[validate(length(max = 64))]
    pub id: String,

    /// The tenant name. Must be unique within the backend.
    #[validate(length(max = 255))]
    pub name: String,

    /// The tenant description.
    #[builder(default)]
    pub description: Option<String>,

    /// If the tenant is enabled, this value is true.
    pub enabled: bool,
}

/// Tenant creation data.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct TenantCreate {
    /// The ID of the tenant. When unset a new UUID would be assigned.
    #[builder(default)]
    #[validate(length(min = 1, max = 64))]
    pub id: Option<String>,

    /// The tenant name. Must be unique within the backend.
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// The tenant description.
    #[builder(default)]
    pub description: Option<String>,

    /// If the tenant is enabled, this value is true.
    #[builder(default)]
    pub enabled: Option<bool>,
}

/// Tenant update data. Unset fields are left unchanged.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(into))]
pub struct TenantUpdate {
    /// The tenant name. The name of an existing tenant cannot be changed;
    /// supplying a different value is rejected.
    #[builder(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,

    /// The tenant description. `Some(None)` clears it.
    #[builder(default)]
    pub description: Option<Option<String>>,

    /// If the tenant is enabled, this value is true.
    #[builder(default)]
    pub enabled: Option<bool>,
}

/// Tenant listing parameters.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
pub struct TenantListParameters {
    /// Filter tenants by the name attribute.
    #[builder(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,
}
