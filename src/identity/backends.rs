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

use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::config::Config;
use crate::identity::IdentityProviderError;
use crate::identity::types::*;
use crate::keygate::ServiceState;

pub mod error;
pub mod ldap;

/// The storage driver contract of the identity provider. One driver is
/// selected at startup; all drivers provide the same semantics regardless of
/// the backing store.
#[async_trait]
pub trait IdentityBackend: DynClone + Send + Sync + std::fmt::Debug {
    /// Set config.
    fn set_config(&mut self, config: Config);

    /// Authenticate the user by the password.
    async fn authenticate(
        &self,
        state: &ServiceState,
        auth: &UserPasswordAuthRequest,
    ) -> Result<AuthenticatedInfo, IdentityProviderError>;

    /// List users.
    async fn list_users(
        &self,
        state: &ServiceState,
        params: &UserListParameters,
    ) -> Result<Vec<UserResponse>, IdentityProviderError>;

    /// Get single user by ID.
    async fn get_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Option<UserResponse>, IdentityProviderError>;

    /// Get single user by name.
    async fn get_user_by_name<'a>(
        &self,
        state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<UserResponse>, IdentityProviderError>;

    /// Create user.
    async fn create_user(
        &self,
        state: &ServiceState,
        user: UserCreate,
    ) -> Result<UserResponse, IdentityProviderError>;

    /// Update user.
    async fn update_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        user: UserUpdate,
    ) -> Result<UserResponse, IdentityProviderError>;

    /// Delete user, cascading over the role grants referencing it.
    async fn delete_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError>;

    /// Get a page of users.
    async fn get_user_page<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<UserResponse>, IdentityProviderError>;

    /// Get user page markers.
    async fn get_user_page_markers<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError>;

    /// List tenants.
    async fn list_tenants(
        &self,
        state: &ServiceState,
        params: &TenantListParameters,
    ) -> Result<Vec<Tenant>, IdentityProviderError>;

    /// Get single tenant by ID.
    async fn get_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<Option<Tenant>, IdentityProviderError>;

    /// Get single tenant by name.
    async fn get_tenant_by_name<'a>(
        &self,
        state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<Tenant>, IdentityProviderError>;

    /// Create tenant.
    async fn create_tenant(
        &self,
        state: &ServiceState,
        tenant: TenantCreate,
    ) -> Result<Tenant, IdentityProviderError>;

    /// Update tenant.
    async fn update_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
        tenant: TenantUpdate,
    ) -> Result<Tenant, IdentityProviderError>;

    /// Delete tenant, cascading over the role grants referencing it.
    async fn delete_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<(), IdentityProviderError>;

    /// Add the user to the tenant membership.
    async fn add_user_to_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError>;

    /// Remove the user from the tenant membership.
    async fn remove_user_from_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError>;

    /// List tenants of the user.
    async fn list_tenants_for_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Vec<Tenant>, IdentityProviderError>;

    /// List users of the tenant.
    async fn list_users_for_tenant<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
        role_id: Option<&'a str>,
    ) -> Result<Vec<UserResponse>, IdentityProviderError>;

    /// Get a page of tenants.
    async fn get_tenant_page<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Tenant>, IdentityProviderError>;

    /// Get tenant page markers.
    async fn get_tenant_page_markers<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError>;

    /// Get a page of the user's tenants.
    async fn list_tenants_for_user_page<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Tenant>, IdentityProviderError>;

    /// Get page markers of the user's tenants.
    async fn list_tenants_for_user_page_markers<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError>;

    /// List roles.
    async fn list_roles(
        &self,
        state: &ServiceState,
        params: &RoleListParameters,
    ) -> Result<Vec<Role>, IdentityProviderError>;

    /// Get single role by ID.
    async fn get_role<'a>(
        &self,
        state: &ServiceState,
        role_id: &'a str,
    ) -> Result<Option<Role>, IdentityProviderError>;

    /// Get single role by name.
    async fn get_role_by_name<'a>(
        &self,
        state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<Role>, IdentityProviderError>;

    /// Create role.
    async fn create_role(
        &self,
        state: &ServiceState,
        role: RoleCreate,
    ) -> Result<Role, IdentityProviderError>;

    /// Delete role.
    async fn delete_role<'a>(
        &self,
        state: &ServiceState,
        role_id: &'a str,
    ) -> Result<(), IdentityProviderError>;

    /// List roles scoped to a service.
    async fn list_roles_by_service<'a>(
        &self,
        state: &ServiceState,
        service_id: &'a str,
    ) -> Result<Vec<Role>, IdentityProviderError>;

    /// Get a page of roles.
    async fn get_role_page<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Role>, IdentityProviderError>;

    /// Get role page markers.
    async fn get_role_page_markers<'a>(
        &self,
        state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError>;

    /// Grant the role to the user, optionally scoped to the tenant.
    async fn add_role_to_user_and_tenant<'a>(
        &self,
        state: &ServiceState,
        role_id: &'a str,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<RoleGrant, IdentityProviderError>;

    /// Revoke the role from the user on the given tenant scope.
    async fn remove_role_from_user_and_tenant<'a>(
        &self,
        state: &ServiceState,
        role_id: &'a str,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<(), IdentityProviderError>;

    /// IDs of the roles the user holds on the tenant.
    async fn get_roles_for_user_and_tenant<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: &'a str,
    ) -> Result<Vec<String>, IdentityProviderError>;

    /// List all role grants on the tenant.
    async fn list_role_assignments<'a>(
        &self,
        state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError>;

    /// List the user's global grants.
    async fn list_global_roles_for_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError>;

    /// List the user's tenant-scoped grants.
    async fn list_tenant_roles_for_user<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError>;

    /// Look a grant up by its reference.
    async fn get_role_grant<'a>(
        &self,
        state: &ServiceState,
        grant_ref: &'a str,
    ) -> Result<Option<RoleGrant>, IdentityProviderError>;

    /// Get a page of the user grants.
    async fn get_role_grant_page<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_scoped: bool,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError>;

    /// Get page markers of the user grants.
    async fn get_role_grant_page_markers<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_scoped: bool,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError>;

    /// Derive the role metadata for the user/tenant pair.
    async fn get_metadata<'a>(
        &self,
        state: &ServiceState,
        user_id: &'a str,
        tenant_id: &'a str,
    ) -> Result<Vec<String>, IdentityProviderError>;
}

dyn_clone::clone_trait_object!(IdentityBackend);
