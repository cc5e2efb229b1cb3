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

use thiserror::Error;

use crate::error::BuilderError;
use crate::identity::backends::error::DirectoryError;
use crate::identity::types::GrantRefError;

#[derive(Error, Debug)]
pub enum IdentityProviderError {
    /// Unsupported driver
    #[error("unsupported driver {0}")]
    UnsupportedDriver(String),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("tenant {0} not found")]
    TenantNotFound(String),

    #[error("role {0} not found")]
    RoleNotFound(String),

    #[error("role grant {0} not found")]
    GrantNotFound(String),

    /// Conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid credentials or tenant scope during authentication.
    #[error("invalid user / password")]
    Unauthorized,

    /// The caller does not own the addressed entity.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Inconsistent update.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Either user id or name must be supplied for authentication.
    #[error("either user id or user name must be given")]
    UserIdOrName,

    #[error(transparent)]
    GrantRef {
        #[from]
        source: GrantRefError,
    },

    #[error("password hashing error")]
    PasswordHash {
        #[from]
        source: IdentityProviderPasswordHashError,
    },

    /// Identity provider error
    #[error("data serialization error")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Builder {
        #[from]
        source: BuilderError,
    },

    #[error(transparent)]
    Validation {
        #[from]
        source: validator::ValidationErrors,
    },

    /// Directory backend error.
    #[error(transparent)]
    Directory { source: DirectoryError },
}

impl IdentityProviderError {
    /// Map a directory fault to the user-entity taxonomy.
    pub(crate) fn for_user(err: DirectoryError, user_id: &str) -> Self {
        match err {
            DirectoryError::NotFound(..) => Self::UserNotFound(user_id.into()),
            other => other.into(),
        }
    }

    /// Map a directory fault to the tenant-entity taxonomy.
    pub(crate) fn for_tenant(err: DirectoryError, tenant_id: &str) -> Self {
        match err {
            DirectoryError::NotFound(..) => Self::TenantNotFound(tenant_id.into()),
            other => other.into(),
        }
    }

    /// Map a directory fault to the role-entity taxonomy.
    pub(crate) fn for_role(err: DirectoryError, role_id: &str) -> Self {
        match err {
            DirectoryError::NotFound(..) => Self::RoleNotFound(role_id.into()),
            other => other.into(),
        }
    }
}

impl From<DirectoryError> for IdentityProviderError {
    fn from(source: DirectoryError) -> Self {
        match source {
            DirectoryError::Conflict { message, .. } => Self::Conflict(message),
            DirectoryError::Unauthorized => Self::Unauthorized,
            DirectoryError::GrantNotFound(x) => Self::GrantNotFound(x),
            DirectoryError::InvalidUpdate(x) => Self::InvalidState(x),
            DirectoryError::PasswordHash { source } => Self::PasswordHash { source },
            DirectoryError::GrantRef { source } => Self::GrantRef { source },
            _ => Self::Directory { source },
        }
    }
}

/// Password hashing related errors.
#[derive(Error, Debug)]
pub enum IdentityProviderPasswordHashError {
    /// Bcrypt error.
    #[error(transparent)]
    BCrypt {
        #[from]
        source: bcrypt::BcryptError,
    },

    /// Async task join error.
    #[error(transparent)]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
}
