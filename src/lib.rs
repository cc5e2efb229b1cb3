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

//! # Keygate
//!
//! Keygate is an identity and credential backend: it stores users, tenants,
//! roles, role grants and authentication tokens behind a uniform driver
//! contract, so that the same logical operations can run against storage
//! engines with very different native capabilities.
//!
//! Identity data (users, tenants, roles and the ternary role-grant relation)
//! is served by a hierarchical directory driver which projects the relational
//! entity model onto an LDAP tree: one subtree per entity type, distinguished
//! names derived from entity ids, role grants addressed through a synthetic
//! composite identifier. Because the directory exposes no server-side
//! cursors, listings are paged client-side with marker-based pagination.
//!
//! Tokens are served by one of three interchangeable drivers selected at
//! startup: a relational driver where expiry and validity are indexed
//! columns, an in-process key-value driver backed by a concurrent map, and a
//! column-store driver that leans on the store's native per-row time-to-live.
//! All three satisfy the same contract: expired and revoked tokens are
//! indistinguishable from absent ones, and a revocation, once applied, is
//! permanent and auditable.
//!
//! The HTTP surface, configuration bootstrapping and schema migrations are
//! intentionally out of scope; callers consume the [`provider::Provider`]
//! directly.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod keygate;
pub mod provider;
pub mod token;
