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

/// Role.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct Role {
    /// The role ID.
    #[validate(length(max = 64))]
    pub id: String,

    /// The role name.
    #[validate(length(max = 255))]
    pub name: String,

    /// The service the role is scoped to.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub service_id: Option<String>,
}

/// Role creation data.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct RoleCreate {
    /// The ID of the role. When unset a new UUID would be assigned.
    #[builder(default)]
    #[validate(length(min = 1, max = 64))]
    pub id: Option<String>,

    /// The role name.
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// The service the role is scoped to.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub service_id: Option<String>,
}

/// Role listing parameters.
#[derive(Builder, Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
pub struct RoleListParameters {
    /// Filter roles by the name attribute.
    #[builder(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,

    /// Filter roles by the service scope.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub service_id: Option<String>,
}
