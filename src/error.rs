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
//! # Error
//!
//! Errors that can occur during Keygate processing.

use thiserror::Error;

use crate::identity::error::IdentityProviderError;
use crate::token::error::TokenProviderError;

/// Keygate error.
#[derive(Debug, Error)]
pub enum KeygateError {
    #[error(transparent)]
    IdentityError {
        #[from]
        source: IdentityProviderError,
    },

    #[error(transparent)]
    TokenProvider {
        #[from]
        source: TokenProviderError,
    },

    #[error(transparent)]
    IO {
        #[from]
        source: std::io::Error,
    },

    /// Json serialization error.
    #[error("json serde error: {}", source)]
    JsonError {
        /// The source of the error.
        #[from]
        source: serde_json::Error,
    },

    /// Configuration error.
    #[error(transparent)]
    Config {
        #[from]
        source: config::ConfigError,
    },
}

/// Error type to be used for the builders.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Uninitialized field
    #[error("field {0} is not initialized")]
    UninitializedField(&'static str),

    /// Validation error
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl From<derive_builder::UninitializedFieldError> for BuilderError {
    fn from(value: derive_builder::UninitializedFieldError) -> Self {
        Self::UninitializedField(value.field_name())
    }
}

impl From<String> for BuilderError {
    fn from(value: String) -> Self {
        Self::ValidationError(value)
    }
}
