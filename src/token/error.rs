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
//! Token provider errors.

use sea_orm::SqlErr;
use thiserror::Error;

use crate::error::BuilderError;

/// Token provider error.
#[derive(Error, Debug)]
pub enum TokenProviderError {
    /// The token is revoked, expired or was never created; the cases are
    /// deliberately indistinguishable.
    #[error("token {0} not found")]
    TokenNotFound(String),

    /// Conflict.
    #[error("{message}")]
    Conflict { message: String, context: String },

    /// Token expiry computation overflowed.
    #[error("token expiry calculation failed")]
    ExpiryCalculation,

    #[error(transparent)]
    Builder {
        #[from]
        source: BuilderError,
    },

    #[error("data serialization error")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    /// Relational fault other than a constraint violation.
    #[error("{message}")]
    Sql { message: String, context: String },

    /// Database error.
    #[error("database error while {context}")]
    Database {
        source: sea_orm::DbErr,
        context: String,
    },

    /// Column store session establishment failure.
    #[error("column store connection error")]
    ColumnStoreConnect {
        #[from]
        source: scylla::transport::errors::NewSessionError,
    },

    /// Column store fault, propagated uninterpreted.
    #[error("column store error while {context}")]
    ColumnStore {
        source: scylla::transport::errors::QueryError,
        context: String,
    },

    /// The column store returned rows the record model cannot read.
    #[error("column store decode error while {context}: {message}")]
    ColumnStoreDecode { message: String, context: String },
}

/// Convert the DB error with the context information, mapping constraint
/// violations to Conflict.
pub fn db_err(e: sea_orm::DbErr, context: &str) -> TokenProviderError {
    e.sql_err().map_or_else(
        || TokenProviderError::Database {
            source: e,
            context: context.to_string(),
        },
        |err| match err {
            SqlErr::UniqueConstraintViolation(descr) => TokenProviderError::Conflict {
                message: descr.to_string(),
                context: context.to_string(),
            },
            other => TokenProviderError::Sql {
                message: other.to_string(),
                context: context.to_string(),
            },
        },
    )
}

/// Wrap a column store fault with context.
pub fn col_err(
    e: scylla::transport::errors::QueryError,
    context: &str,
) -> TokenProviderError {
    TokenProviderError::ColumnStore {
        source: e,
        context: context.to_string(),
    }
}
