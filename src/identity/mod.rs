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

//! # Identity provider
//!
//! The identity provider serves users, tenants, roles and role grants
//! through a uniform driver contract. The driver is selected at startup by
//! configuration; calls are delegated after the provider has filled in
//! generated identifiers and validated the inputs.
//!
//! ## Tenant
//!
//! A tenant (project) is an organizational scope users can be members of
//! and role grants can be bound to. A tenant with no members beyond the
//! structural placeholder and no grants referencing it is considered empty.
//!
//! ## Role grant
//!
//! Grants assign a role to a user, either globally or on one tenant. They
//! have no lifecycle of their own: deleting a user or a tenant destroys the
//! grants referencing it.

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

pub mod backends;
pub mod error;
pub mod password_hashing;
pub mod types;

use crate::config::Config;
use crate::identity::backends::{IdentityBackend, ldap::LdapBackend};
use crate::identity::types::*;
use crate::keygate::ServiceState;

pub use error::IdentityProviderError;
pub use types::IdentityApi;

#[derive(Clone, Debug)]
pub struct IdentityProvider {
    backend_driver: Box<dyn IdentityBackend>,
}

impl IdentityProvider {
    pub fn new(config: &Config) -> Result<Self, IdentityProviderError> {
        let mut backend_driver: Box<dyn IdentityBackend> = match config.identity.driver.as_str() {
            "ldap" => Box::new(LdapBackend::default()),
            _ => {
                return Err(IdentityProviderError::UnsupportedDriver(
                    config.identity.driver.clone(),
                ));
            }
        };
        backend_driver.set_config(config.clone());
        Ok(Self { backend_driver })
    }
}

#[async_trait]
impl IdentityApi for IdentityProvider {
    /// Authenticate user with the password auth method.
    #[tracing::instrument(level = "info", skip(self, state, auth))]
    async fn authenticate(
        &self,
        state: &ServiceState,
        auth: &UserPasswordAuthRequest,
    ) -> Result<AuthenticatedInfo, IdentityProviderError> {
        if auth.id.is_none() && auth.name.is_none() {
            return Err(IdentityProviderError::UserIdOrName);
        }
        auth.validate()?;
        self.backend_driver.authenticate(state, auth).await
    }

    /// List users.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_users(
        &self,
        state: &ServiceState,
        params: &UserListParameters,
    ) -> Result<Vec<UserResponse>, IdentityProviderError> {
        self.backend_driver.list_users(state, params).await
    }

    /// Get single user.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Option<UserResponse>, IdentityProviderError> {
        self.backend_driver.get_user(state, user_id).await
    }

    /// Get single user by name.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_user_by_name<'a>(
        &self,
        state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<UserResponse>, IdentityProviderError> {
        self.backend_driver.get_user_by_name(state, name).await
    }

    /// Create user.
    #[tracing::instrument(level = "info", skip(self, state, user))]
    async fn create_user(
        &self,
        state: &ServiceState,
        user: UserCreate,
    ) -> Result<UserResponse, IdentityProviderError> {
        let mut mod_user = user;
        if mod_user.id.is_none() {
            mod_user.id = Some(Uuid::new_v4().simple().to_string());
        }
        if mod_user.enabled.is_none() {
            mod_user.enabled = Some(true);
        }
        mod_user.validate()?;
        self.backend_driver.create_user(state, mod_user).await
    }

    /// Update user.
    #[tracing::instrument(level = "info", skip(self, state, user))]
    async fn update_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        user: UserUpdate,
    ) -> Result<UserResponse, IdentityProviderError> {
        user.validate()?;
        self.backend_driver.update_user(state, user_id, user).await
    }

    /// Delete user.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn delete_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        self.backend_driver.delete_user(state, user_id).await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_user_page<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<UserResponse>, IdentityProviderError> {
        self.backend_driver.get_user_page(state, marker, limit).await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_user_page_markers<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        self.backend_driver
            .get_user_page_markers(state, marker, limit)
            .await
    }

    /// List tenants.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_tenants(
        &self,
        state: &ServiceState,
        params: &TenantListParameters,
    ) -> Result<Vec<Tenant>, IdentityProviderError> {
        self.backend_driver.list_tenants(state, params).await
    }

    /// Get single tenant.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<Option<Tenant>, IdentityProviderError> {
        self.backend_driver.get_tenant(state, tenant_id).await
    }

    /// Get single tenant by name.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_tenant_by_name<'a>(
        &self,
        state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<Tenant>, IdentityProviderError> {
        self.backend_driver.get_tenant_by_name(state, name).await
    }

    /// Create tenant.
    #[tracing::instrument(level = "info", skip(self, state, tenant))]
    async fn create_tenant(
        &self,
        state: &ServiceState,
        tenant: TenantCreate,
    ) -> Result<Tenant, IdentityProviderError> {
        let mut mod_tenant = tenant;
        if mod_tenant.id.is_none() {
            mod_tenant.id = Some(Uuid::new_v4().simple().to_string());
        }
        if mod_tenant.enabled.is_none() {
            mod_tenant.enabled = Some(true);
        }
        mod_tenant.validate()?;
        self.backend_driver.create_tenant(state, mod_tenant).await
    }

    /// Update tenant.
    #[tracing::instrument(level = "info", skip(self, state, tenant))]
    async fn update_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
        tenant: TenantUpdate,
    ) -> Result<Tenant, IdentityProviderError> {
        tenant.validate()?;
        self.backend_driver
            .update_tenant(state, tenant_id, tenant)
            .await
    }

    /// Delete tenant.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn delete_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        self.backend_driver.delete_tenant(state, tenant_id).await
    }

    #[tracing::instrument(level = "info", skip(self, state))]
    async fn add_user_to_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        self.backend_driver
            .add_user_to_tenant(state, tenant_id, user_id)
            .await
    }

    #[tracing::instrument(level = "info", skip(self, state))]
    async fn remove_user_from_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        self.backend_driver
            .remove_user_from_tenant(state, tenant_id, user_id)
            .await
    }

    /// List tenants the user is a member of.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_tenants_for_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Vec<Tenant>, IdentityProviderError> {
        self.backend_driver
            .list_tenants_for_user(state, user_id)
            .await
    }

    /// List users of the tenant.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_users_for_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
        role_id: Option<&'a str>,
    ) -> Result<Vec<UserResponse>, IdentityProviderError> {
        self.backend_driver
            .list_users_for_tenant(state, tenant_id, role_id)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_tenant_page<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Tenant>, IdentityProviderError> {
        self.backend_driver
            .get_tenant_page(state, marker, limit)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_tenant_page_markers<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        self.backend_driver
            .get_tenant_page_markers(state, marker, limit)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn list_tenants_for_user_page<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Tenant>, IdentityProviderError> {
        self.backend_driver
            .list_tenants_for_user_page(state, user_id, marker, limit)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn list_tenants_for_user_page_markers<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        self.backend_driver
            .list_tenants_for_user_page_markers(state, user_id, marker, limit)
            .await
    }

    /// List roles.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_roles(
        &self,
        state: &ServiceState,
        params: &RoleListParameters,
    ) -> Result<Vec<Role>, IdentityProviderError> {
        self.backend_driver.list_roles(state, params).await
    }

    /// Get single role.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_role<'a>(
        &self,
        state: &ServiceState,
        role_id: &'a str,
    ) -> Result<Option<Role>, IdentityProviderError> {
        self.backend_driver.get_role(state, role_id).await
    }

    /// Get single role by name.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_role_by_name<'a>(
        &self,
        state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<Role>, IdentityProviderError> {
        self.backend_driver.get_role_by_name(state, name).await
    }

    /// Create role.
    #[tracing::instrument(level = "info", skip(self, state, role))]
    async fn create_role(
        &self,
        state: &ServiceState,
        role: RoleCreate,
    ) -> Result<Role, IdentityProviderError> {
        let mut mod_role = role;
        if mod_role.id.is_none() {
            mod_role.id = Some(Uuid::new_v4().simple().to_string());
        }
        mod_role.validate()?;
        self.backend_driver.create_role(state, mod_role).await
    }

    /// Delete role.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn delete_role<'a>(
        &self,
        state: &ServiceState,
        role_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        self.backend_driver.delete_role(state, role_id).await
    }

    /// List roles scoped to the service.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_roles_by_service<'a>(
        &self,
        state: &ServiceState,
        service_id: &'a str,
    ) -> Result<Vec<Role>, IdentityProviderError> {
        self.backend_driver
            .list_roles_by_service(state, service_id)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_role_page<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Role>, IdentityProviderError> {
        self.backend_driver.get_role_page(state, marker, limit).await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_role_page_markers<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        self.backend_driver
            .get_role_page_markers(state, marker, limit)
            .await
    }

    /// Grant the role to the user.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn add_role_to_user_and_tenant<'a>(
        &self,
        state: &ServiceState,
        role_id: &'a str,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<RoleGrant, IdentityProviderError> {
        self.backend_driver
            .add_role_to_user_and_tenant(state, role_id, user_id, tenant_id)
            .await
    }

    /// Revoke the role from the user.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn remove_role_from_user_and_tenant<'a>(
        &self,
        state: &ServiceState,
        role_id: &'a str,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<(), IdentityProviderError> {
        self.backend_driver
            .remove_role_from_user_and_tenant(state, role_id, user_id, tenant_id)
            .await
    }

    /// Roles of the user on the tenant.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_roles_for_user_and_tenant<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: &'a str,
    ) -> Result<Vec<String>, IdentityProviderError> {
        self.backend_driver
            .get_roles_for_user_and_tenant(state, user_id, tenant_id)
            .await
    }

    /// List role grants on the tenant.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_role_assignments<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError> {
        self.backend_driver
            .list_role_assignments(state, tenant_id)
            .await
    }

    /// List global grants of the user.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_global_roles_for_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError> {
        self.backend_driver
            .list_global_roles_for_user(state, user_id)
            .await
    }

    /// List tenant-scoped grants of the user.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn list_tenant_roles_for_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError> {
        self.backend_driver
            .list_tenant_roles_for_user(state, user_id, tenant_id)
            .await
    }

    /// Look a grant up by its reference.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_role_grant<'a>(
        &self,
        state: &ServiceState,
        grant_ref: &'a str,
    ) -> Result<Option<RoleGrant>, IdentityProviderError> {
        self.backend_driver.get_role_grant(state, grant_ref).await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_role_grant_page<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_scoped: bool,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError> {
        self.backend_driver
            .get_role_grant_page(state, user_id, tenant_scoped, marker, limit)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, state))]
    async fn get_role_grant_page_markers<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_scoped: bool,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        self.backend_driver
            .get_role_grant_page_markers(state, user_id, tenant_scoped, marker, limit)
            .await
    }

    /// Derive the role metadata for the user/tenant pair.
    #[tracing::instrument(level = "info", skip(self, state))]
    async fn get_metadata<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: &'a str,
    ) -> Result<Vec<String>, IdentityProviderError> {
        self.backend_driver
            .get_metadata(state, user_id, tenant_id)
            .await
    }
}

