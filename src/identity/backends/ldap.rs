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

//! Directory identity backend.
//!
//! Composes the three per-entity directory drivers into the identity driver
//! contract: entity CRUD, tenant membership, role grants with their cascade
//! rules, and bind-based authentication.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod connection;
pub mod mapping;
pub mod pagination;
pub mod role;
pub mod tenant;
pub mod user;

use crate::config::Config;
use crate::identity::IdentityProviderError;
use crate::identity::backends::IdentityBackend;
use crate::identity::backends::error::DirectoryError;
use crate::identity::backends::ldap::connection::DirectoryConnection;
use crate::identity::backends::ldap::role::RoleApi;
use crate::identity::backends::ldap::tenant::TenantApi;
use crate::identity::backends::ldap::user::UserApi;
use crate::identity::password_hashing;
use crate::identity::types::*;
use crate::keygate::ServiceState;

/// LDAP identity backend.
#[derive(Clone, Debug, Default)]
pub struct LdapBackend {
    pub config: Config,
    // Create serialization locks, one per entity type, shared by every
    // driver instance of this backend.
    user_lock: Arc<Mutex<()>>,
    tenant_lock: Arc<Mutex<()>>,
    role_lock: Arc<Mutex<()>>,
}

impl LdapBackend {
    fn users(&self) -> UserApi {
        UserApi::new(&self.config.ldap, self.user_lock.clone())
    }

    fn tenants(&self) -> TenantApi {
        TenantApi::new(
            &self.config.ldap,
            self.tenant_lock.clone(),
            self.user_lock.clone(),
        )
    }

    fn roles(&self) -> RoleApi {
        RoleApi::new(
            &self.config.ldap,
            self.role_lock.clone(),
            self.user_lock.clone(),
            self.tenant_lock.clone(),
        )
    }

    async fn hash_password(
        &self,
        password: Option<&str>,
    ) -> Result<Option<String>, IdentityProviderError> {
        match password {
            Some(password) => Ok(Some(
                password_hashing::hash_password(&self.config, password).await?,
            )),
            None => Ok(None),
        }
    }

    async fn roles_for_user_and_tenant(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Vec<String>, IdentityProviderError> {
        Ok(self
            .roles()
            .get_role_assignments(tenant_id)
            .await?
            .into_iter()
            .filter(|grant| grant.user_id == user_id)
            .map(|grant| grant.role_id)
            .collect())
    }
}

#[async_trait]
impl IdentityBackend for LdapBackend {
    fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Resolve the user, verify the credentials by binding as the user and
    /// derive the role metadata for the requested tenant scope.
    async fn authenticate(
        &self,
        _state: &ServiceState,
        auth: &UserPasswordAuthRequest,
    ) -> Result<AuthenticatedInfo, IdentityProviderError> {
        let users = self.users();
        let user = match (&auth.id, &auth.name) {
            (Some(id), _) => users.get(id).await?,
            (None, Some(name)) => users.get_by_name(name).await?,
            (None, None) => return Err(IdentityProviderError::UserIdOrName),
        }
        .ok_or(IdentityProviderError::Unauthorized)?;

        // The directory verifies the credentials through the bind itself.
        let user_dn = users.user_dn(&user.id);
        DirectoryConnection::connect(&self.config.ldap, Some(&user_dn), Some(&auth.password))
            .await
            .map_err(|e| match e {
                DirectoryError::Unauthorized => IdentityProviderError::Unauthorized,
                other => other.into(),
            })?
            .unbind()
            .await;

        let tenants = self.tenants().get_user_tenants(&user.id).await?;
        let tenant_ids: Vec<String> = tenants.iter().map(|t| t.id.clone()).collect();

        let mut user = user;
        let (tenant, roles) = match &auth.tenant_id {
            Some(tenant_id) => {
                if !tenant_ids.iter().any(|id| id == tenant_id) {
                    return Err(IdentityProviderError::Unauthorized);
                }
                let tenant = tenants.into_iter().find(|t| &t.id == tenant_id);
                let roles = self.roles_for_user_and_tenant(&user.id, tenant_id).await?;
                (tenant, roles)
            }
            None => (None, Vec::new()),
        };
        user.tenants = Some(tenant_ids);

        Ok(AuthenticatedInfo {
            user,
            tenant,
            roles,
        })
    }

    async fn list_users(
        &self,
        _state: &ServiceState,
        params: &UserListParameters,
    ) -> Result<Vec<UserResponse>, IdentityProviderError> {
        Ok(self.users().list(params).await?)
    }

    async fn get_user<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Option<UserResponse>, IdentityProviderError> {
        let Some(mut user) = self.users().get(user_id).await? else {
            return Ok(None);
        };
        user.tenants = Some(
            self.tenants()
                .get_user_tenants(user_id)
                .await?
                .into_iter()
                .map(|t| t.id)
                .collect(),
        );
        Ok(Some(user))
    }

    async fn get_user_by_name<'a>(
        &self,
        _state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<UserResponse>, IdentityProviderError> {
        Ok(self.users().get_by_name(name).await?)
    }

    async fn create_user(
        &self,
        _state: &ServiceState,
        user: UserCreate,
    ) -> Result<UserResponse, IdentityProviderError> {
        let user_id = user
            .id
            .clone()
            .ok_or_else(|| IdentityProviderError::InvalidState("user id is not set".into()))?;
        let password_hash = self.hash_password(user.password.as_deref()).await?;
        let response = self.users().create(&user_id, &user, password_hash).await?;
        if let Some(tenant_id) = &user.tenant_id {
            self.tenants()
                .add_user(tenant_id, &user_id)
                .await
                .map_err(|e| IdentityProviderError::for_tenant(e, tenant_id))?;
        }
        Ok(response)
    }

    async fn update_user<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        user: UserUpdate,
    ) -> Result<UserResponse, IdentityProviderError> {
        let password_hash = self.hash_password(user.password.as_deref()).await?;
        let response = self
            .users()
            .update(user_id, &user, password_hash)
            .await
            .map_err(|e| IdentityProviderError::for_user(e, user_id))?;
        // The previous default tenant is not recorded in the directory;
        // membership is only ever added here.
        if let Some(Some(tenant_id)) = &user.tenant_id {
            match self.tenants().add_user(tenant_id, user_id).await {
                Ok(()) | Err(DirectoryError::Conflict { .. }) => {}
                Err(e) => return Err(IdentityProviderError::for_tenant(e, tenant_id)),
            }
        }
        Ok(response)
    }

    /// Delete the user: drop its tenant memberships, remove the entry and
    /// cascade over every grant referencing the user.
    async fn delete_user<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        let users = self.users();
        let tenants = self.tenants();
        let roles = self.roles();

        users
            .get(user_id)
            .await?
            .ok_or_else(|| IdentityProviderError::UserNotFound(user_id.into()))?;

        for tenant in tenants.get_user_tenants(user_id).await? {
            match tenants.remove_user(&tenant.id, user_id).await {
                Ok(()) | Err(DirectoryError::GrantNotFound(..)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        users
            .delete(user_id)
            .await
            .map_err(|e| IdentityProviderError::for_user(e, user_id))?;

        let mut grants = roles.list_global_roles_for_user(user_id).await?;
        grants.extend(roles.list_tenant_roles_for_user(user_id, None).await?);
        for grant in grants {
            match roles.rolegrant_delete(&grant.id).await {
                Ok(()) | Err(DirectoryError::GrantNotFound(..)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn get_user_page<'a>(
        &self,
        _state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<UserResponse>, IdentityProviderError> {
        Ok(self.users().get_page(marker, limit).await?)
    }

    async fn get_user_page_markers<'a>(
        &self,
        _state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        Ok(self.users().get_page_markers(marker, limit).await?)
    }

    async fn list_tenants(
        &self,
        _state: &ServiceState,
        params: &TenantListParameters,
    ) -> Result<Vec<Tenant>, IdentityProviderError> {
        Ok(self.tenants().list(params).await?)
    }

    async fn get_tenant<'a>(
        &self,
        _state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<Option<Tenant>, IdentityProviderError> {
        Ok(self.tenants().get(tenant_id).await?)
    }

    async fn get_tenant_by_name<'a>(
        &self,
        _state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<Tenant>, IdentityProviderError> {
        Ok(self.tenants().get_by_name(name).await?)
    }

    async fn create_tenant(
        &self,
        _state: &ServiceState,
        tenant: TenantCreate,
    ) -> Result<Tenant, IdentityProviderError> {
        let tenant_id = tenant
            .id
            .clone()
            .ok_or_else(|| IdentityProviderError::InvalidState("tenant id is not set".into()))?;
        Ok(self.tenants().create(&tenant_id, &tenant).await?)
    }

    async fn update_tenant<'a>(
        &self,
        _state: &ServiceState,
        tenant_id: &'a str,
        tenant: TenantUpdate,
    ) -> Result<Tenant, IdentityProviderError> {
        self.tenants()
            .update(tenant_id, &tenant)
            .await
            .map_err(|e| IdentityProviderError::for_tenant(e, tenant_id))
    }

    /// Delete the tenant: cascade over the grants held on it (including the
    /// role subentries carrying them), then remove the entry.
    async fn delete_tenant<'a>(
        &self,
        _state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        let tenants = self.tenants();
        tenants
            .get(tenant_id)
            .await?
            .ok_or_else(|| IdentityProviderError::TenantNotFound(tenant_id.into()))?;

        self.roles().purge_tenant_role_entries(tenant_id).await?;

        tenants
            .delete(tenant_id)
            .await
            .map_err(|e| IdentityProviderError::for_tenant(e, tenant_id))
    }

    async fn add_user_to_tenant<'a>(
        &self,
        _state: &ServiceState,
        tenant_id: &'a str,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        self.users()
            .get(user_id)
            .await?
            .ok_or_else(|| IdentityProviderError::UserNotFound(user_id.into()))?;
        self.tenants()
            .add_user(tenant_id, user_id)
            .await
            .map_err(|e| IdentityProviderError::for_tenant(e, tenant_id))
    }

    async fn remove_user_from_tenant<'a>(
        &self,
        _state: &ServiceState,
        tenant_id: &'a str,
        user_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        self.tenants()
            .remove_user(tenant_id, user_id)
            .await
            .map_err(|e| IdentityProviderError::for_tenant(e, tenant_id))
    }

    async fn list_tenants_for_user<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Vec<Tenant>, IdentityProviderError> {
        Ok(self.tenants().get_user_tenants(user_id).await?)
    }

    /// Users of the tenant: the direct members plus every user reaching the
    /// tenant through a role grant.
    async fn list_users_for_tenant<'a>(
        &self,
        _state: &ServiceState,
        tenant_id: &'a str,
        role_id: Option<&'a str>,
    ) -> Result<Vec<UserResponse>, IdentityProviderError> {
        let users = self.users();
        let mut result = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        if role_id.is_none() {
            let member_ids = self
                .tenants()
                .member_ids(tenant_id)
                .await
                .map_err(|e| IdentityProviderError::for_tenant(e, tenant_id))?;
            for member_id in member_ids {
                if seen.insert(member_id.clone())
                    && let Some(user) = users.get(&member_id).await?
                {
                    result.push(user);
                }
            }
        }

        for grant in self.roles().get_role_assignments(tenant_id).await? {
            if role_id.is_none_or(|role_id| role_id == grant.role_id)
                && seen.insert(grant.user_id.clone())
                && let Some(user) = users.get(&grant.user_id).await?
            {
                result.push(user);
            }
        }
        Ok(result)
    }

    async fn get_tenant_page<'a>(
        &self,
        _state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Tenant>, IdentityProviderError> {
        Ok(self.tenants().get_page(marker, limit).await?)
    }

    async fn get_tenant_page_markers<'a>(
        &self,
        _state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        Ok(self.tenants().get_page_markers(marker, limit).await?)
    }

    async fn list_tenants_for_user_page<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Tenant>, IdentityProviderError> {
        Ok(self
            .tenants()
            .list_for_user_page(user_id, marker, limit)
            .await?)
    }

    async fn list_tenants_for_user_page_markers<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        Ok(self
            .tenants()
            .list_for_user_page_markers(user_id, marker, limit)
            .await?)
    }

    async fn list_roles(
        &self,
        _state: &ServiceState,
        params: &RoleListParameters,
    ) -> Result<Vec<Role>, IdentityProviderError> {
        Ok(self.roles().list(params).await?)
    }

    async fn get_role<'a>(
        &self,
        _state: &ServiceState,
        role_id: &'a str,
    ) -> Result<Option<Role>, IdentityProviderError> {
        Ok(self.roles().get(role_id).await?)
    }

    async fn get_role_by_name<'a>(
        &self,
        _state: &ServiceState,
        name: &'a str,
    ) -> Result<Option<Role>, IdentityProviderError> {
        Ok(self.roles().get_by_name(name).await?)
    }

    async fn create_role(
        &self,
        _state: &ServiceState,
        role: RoleCreate,
    ) -> Result<Role, IdentityProviderError> {
        let role_id = role
            .id
            .clone()
            .ok_or_else(|| IdentityProviderError::InvalidState("role id is not set".into()))?;
        Ok(self.roles().create(&role_id, &role).await?)
    }

    async fn delete_role<'a>(
        &self,
        _state: &ServiceState,
        role_id: &'a str,
    ) -> Result<(), IdentityProviderError> {
        self.roles()
            .delete(role_id)
            .await
            .map_err(|e| IdentityProviderError::for_role(e, role_id))
    }

    async fn list_roles_by_service<'a>(
        &self,
        _state: &ServiceState,
        service_id: &'a str,
    ) -> Result<Vec<Role>, IdentityProviderError> {
        Ok(self.roles().get_by_service(service_id).await?)
    }

    async fn get_role_page<'a>(
        &self,
        _state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Role>, IdentityProviderError> {
        Ok(self.roles().get_page(marker, limit).await?)
    }

    async fn get_role_page_markers<'a>(
        &self,
        _state: &ServiceState,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        Ok(self.roles().get_page_markers(marker, limit).await?)
    }

    async fn add_role_to_user_and_tenant<'a>(
        &self,
        _state: &ServiceState,
        role_id: &'a str,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<RoleGrant, IdentityProviderError> {
        self.users()
            .get(user_id)
            .await?
            .ok_or_else(|| IdentityProviderError::UserNotFound(user_id.into()))?;
        self.roles()
            .add_user(role_id, user_id, tenant_id)
            .await
            .map_err(|e| match e {
                DirectoryError::NotFound(id) if Some(id.as_str()) == tenant_id => {
                    IdentityProviderError::TenantNotFound(id)
                }
                DirectoryError::NotFound(id) => IdentityProviderError::RoleNotFound(id),
                other => other.into(),
            })
    }

    async fn remove_role_from_user_and_tenant<'a>(
        &self,
        _state: &ServiceState,
        role_id: &'a str,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<(), IdentityProviderError> {
        let grant_ref = encode_grant_ref(role_id, tenant_id, user_id)?;
        Ok(self.roles().rolegrant_delete(&grant_ref).await?)
    }

    async fn get_roles_for_user_and_tenant<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        tenant_id: &'a str,
    ) -> Result<Vec<String>, IdentityProviderError> {
        self.roles_for_user_and_tenant(user_id, tenant_id).await
    }

    async fn list_role_assignments<'a>(
        &self,
        _state: &ServiceState,
        tenant_id: &'a str,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError> {
        Ok(self.roles().get_role_assignments(tenant_id).await?)
    }

    async fn list_global_roles_for_user<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError> {
        Ok(self.roles().list_global_roles_for_user(user_id).await?)
    }

    async fn list_tenant_roles_for_user<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        tenant_id: Option<&'a str>,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError> {
        Ok(self
            .roles()
            .list_tenant_roles_for_user(user_id, tenant_id)
            .await?)
    }

    async fn get_role_grant<'a>(
        &self,
        _state: &ServiceState,
        grant_ref: &'a str,
    ) -> Result<Option<RoleGrant>, IdentityProviderError> {
        Ok(self.roles().rolegrant_get(grant_ref).await?)
    }

    async fn get_role_grant_page<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        tenant_scoped: bool,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<RoleGrant>, IdentityProviderError> {
        Ok(self
            .roles()
            .rolegrant_page(user_id, tenant_scoped, marker, limit)
            .await?)
    }

    async fn get_role_grant_page_markers<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        tenant_scoped: bool,
        marker: Option<&'a str>,
        limit: usize,
    ) -> Result<PageMarkers, IdentityProviderError> {
        Ok(self
            .roles()
            .rolegrant_page_markers(user_id, tenant_scoped, marker, limit)
            .await?)
    }

    /// Role metadata for the pair: empty unless both the user and the
    /// tenant exist.
    async fn get_metadata<'a>(
        &self,
        _state: &ServiceState,
        user_id: &'a str,
        tenant_id: &'a str,
    ) -> Result<Vec<String>, IdentityProviderError> {
        self.tenants()
            .get(tenant_id)
            .await?
            .ok_or_else(|| IdentityProviderError::TenantNotFound(tenant_id.into()))?;
        self.users()
            .get(user_id)
            .await?
            .ok_or_else(|| IdentityProviderError::UserNotFound(user_id.into()))?;
        self.roles_for_user_and_tenant(user_id, tenant_id).await
    }
}
