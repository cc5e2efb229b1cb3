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

use ldap3::LdapError;
use thiserror::Error;

use crate::identity::error::IdentityProviderPasswordHashError;
use crate::identity::types::GrantRefError;

/// Result codes of the directory protocol the backend reacts to.
pub const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
pub const RC_TYPE_OR_VALUE_EXISTS: u32 = 20;
pub const RC_NO_SUCH_OBJECT: u32 = 32;
pub const RC_INVALID_CREDENTIALS: u32 = 49;

#[derive(Error, Debug)]
pub enum DirectoryError {
    /// The addressed entry does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The membership value addressed by a grant operation does not exist.
    #[error("role grant {0} not found")]
    GrantNotFound(String),

    /// Conflict.
    #[error("{message}")]
    Conflict { message: String, context: String },

    /// The bind was rejected.
    #[error("invalid credentials")]
    Unauthorized,

    /// Inconsistent update request.
    #[error("{0}")]
    InvalidUpdate(String),

    /// An entry misses attributes the entity model requires.
    #[error("malformed directory entry: {0}")]
    MalformedEntry(String),

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

    /// Any other directory fault, propagated uninterpreted.
    #[error("directory error while {context}")]
    Directory {
        source: LdapError,
        context: String,
    },
}

/// Wrap a raw directory error with context, promoting the result codes that
/// have a dedicated meaning in the taxonomy.
pub fn dir_err(e: LdapError, context: &str) -> DirectoryError {
    match result_code(&e) {
        Some(RC_INVALID_CREDENTIALS) => DirectoryError::Unauthorized,
        Some(RC_TYPE_OR_VALUE_EXISTS) => DirectoryError::Conflict {
            message: "value already present".into(),
            context: context.to_string(),
        },
        _ => DirectoryError::Directory {
            source: e,
            context: context.to_string(),
        },
    }
}

/// The protocol result code of the error, when the server returned one.
pub fn result_code(e: &LdapError) -> Option<u32> {
    match e {
        LdapError::LdapResult { result } => Some(result.rc),
        _ => None,
    }
}

/// Whether the error denotes an absent entry or subtree.
pub fn is_no_such_object(e: &LdapError) -> bool {
    result_code(e) == Some(RC_NO_SUCH_OBJECT)
}

/// Whether the error denotes an absent attribute value.
pub fn is_no_such_attribute(e: &LdapError) -> bool {
    result_code(e) == Some(RC_NO_SUCH_ATTRIBUTE)
}

/// Whether the error denotes an already present attribute value.
pub fn is_type_or_value_exists(e: &LdapError) -> bool {
    result_code(e) == Some(RC_TYPE_OR_VALUE_EXISTS)
}
