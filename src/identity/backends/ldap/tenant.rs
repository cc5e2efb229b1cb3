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

//! Directory tenant operations.
//!
//! Tenants are membership-capable group entries; the user membership is the
//! group member attribute holding user DNs. An otherwise empty group keeps
//! the placeholder member, which every membership read skips.

use ldap3::ldap_escape;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::LdapSection;
use crate::identity::backends::error::{
    DirectoryError, dir_err, is_no_such_attribute, is_no_such_object, is_type_or_value_exists,
};
use crate::identity::backends::ldap::connection::{DirEntry, DirMod, DirValue};
use crate::identity::backends::ldap::mapping::{AttrValues, EntityMapper};
use crate::identity::backends::ldap::pagination;
use crate::identity::types::{
    PageMarkers, Tenant, TenantCreate, TenantListParameters, TenantUpdate,
};

#[derive(Clone, Debug)]
pub struct TenantApi {
    pub mapper: EntityMapper,
    user_mapper: EntityMapper,
}

impl TenantApi {
    pub fn new(
        conf: &LdapSection,
        create_lock: Arc<Mutex<()>>,
        user_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            mapper: EntityMapper::for_tenants(conf, create_lock),
            user_mapper: EntityMapper::for_users(conf, user_lock),
        }
    }

    pub fn tenant_dn(&self, tenant_id: &str) -> String {
        self.mapper.id_to_dn(tenant_id)
    }

    fn member_attribute(&self) -> String {
        self.mapper.conf.tenant_member_attribute.clone()
    }

    fn to_model(&self, entry: &DirEntry) -> Result<Tenant, DirectoryError> {
        let id = entry
            .first_text(&self.mapper.id_attribute)
            .or_else(|| EntityMapper::dn_to_id(&entry.dn))
            .ok_or_else(|| DirectoryError::MalformedEntry(entry.dn.clone()))?;
        let name = entry
            .first_text(&self.mapper.name_attribute())
            .ok_or_else(|| DirectoryError::MalformedEntry(entry.dn.clone()))?;
        Ok(Tenant {
            id,
            name,
            description: entry.first_text(&self.mapper.attr_for("description")),
            enabled: entry.first_bool("enabled").unwrap_or(true),
        })
    }

    pub async fn list(
        &self,
        params: &TenantListParameters,
    ) -> Result<Vec<Tenant>, DirectoryError> {
        let filter = params
            .name
            .as_ref()
            .map(|name| format!("({}={})", self.mapper.name_attribute(), ldap_escape(name)));
        self.mapper
            .get_all(filter.as_deref())
            .await?
            .iter()
            .map(|entry| self.to_model(entry))
            .collect()
    }

    pub async fn get(&self, tenant_id: &str) -> Result<Option<Tenant>, DirectoryError> {
        self.mapper
            .get(tenant_id, None)
            .await?
            .map(|entry| self.to_model(&entry))
            .transpose()
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Tenant>, DirectoryError> {
        self.mapper
            .get_by_attr(&self.mapper.name_attribute(), name)
            .await?
            .map(|entry| self.to_model(&entry))
            .transpose()
    }

    pub async fn create(
        &self,
        tenant_id: &str,
        tenant: &TenantCreate,
    ) -> Result<Tenant, DirectoryError> {
        let mut values = AttrValues::from([(
            "name".to_string(),
            Some(DirValue::Text(tenant.name.clone())),
        )]);
        if let Some(description) = &tenant.description {
            values.insert(
                "description".into(),
                Some(DirValue::Text(description.clone())),
            );
        }
        values.insert(
            "enabled".into(),
            Some(DirValue::Bool(tenant.enabled.unwrap_or(true))),
        );
        self.mapper
            .create_checked(tenant_id, Some(&tenant.name), values)
            .await?;
        Ok(Tenant {
            id: tenant_id.to_string(),
            name: tenant.name.clone(),
            description: tenant.description.clone(),
            enabled: tenant.enabled.unwrap_or(true),
        })
    }

    /// Update tenant attributes. The unique name is immutable.
    pub async fn update(
        &self,
        tenant_id: &str,
        tenant: &TenantUpdate,
    ) -> Result<Tenant, DirectoryError> {
        let old = self
            .mapper
            .get(tenant_id, None)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(tenant_id.into()))?;

        let current_name = old.first_text(&self.mapper.name_attribute());
        if let Some(name) = &tenant.name
            && current_name.as_deref() != Some(name.as_str())
        {
            return Err(DirectoryError::InvalidUpdate(
                "changing the tenant name is not permitted".into(),
            ));
        }

        let mut values = AttrValues::new();
        if let Some(description) = &tenant.description {
            values.insert(
                "description".into(),
                description.clone().map(DirValue::Text),
            );
        }
        if let Some(enabled) = tenant.enabled {
            values.insert("enabled".into(), Some(DirValue::Bool(enabled)));
        }
        self.mapper.update(tenant_id, values, Some(&old)).await?;

        self.get(tenant_id)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(tenant_id.into()))
    }

    pub async fn delete(&self, tenant_id: &str) -> Result<(), DirectoryError> {
        self.mapper.delete(tenant_id).await
    }

    /// Tenants the user is a member of.
    pub async fn get_user_tenants(&self, user_id: &str) -> Result<Vec<Tenant>, DirectoryError> {
        let user_dn = self.user_mapper.id_to_dn(user_id);
        let filter = format!("({}={})", self.member_attribute(), ldap_escape(&user_dn));
        self.mapper
            .get_all(Some(&filter))
            .await?
            .iter()
            .map(|entry| self.to_model(entry))
            .collect()
    }

    /// Add the user to the tenant membership.
    pub async fn add_user(&self, tenant_id: &str, user_id: &str) -> Result<(), DirectoryError> {
        let user_dn = self.user_mapper.id_to_dn(user_id);
        let mut conn = self.mapper.connect().await?;
        let res = conn
            .modify(
                &self.tenant_dn(tenant_id),
                vec![DirMod::Add(
                    self.member_attribute(),
                    vec![DirValue::Text(user_dn)],
                )],
            )
            .await;
        conn.unbind().await;
        match res {
            Ok(()) => Ok(()),
            Err(e) if is_type_or_value_exists(&e) => Err(DirectoryError::Conflict {
                message: format!("user {user_id} is already a member of tenant {tenant_id}"),
                context: "adding the tenant member".into(),
            }),
            Err(e) if is_no_such_object(&e) => Err(DirectoryError::NotFound(tenant_id.into())),
            Err(e) => Err(dir_err(e, "adding the tenant member")),
        }
    }

    /// Remove the user from the tenant membership.
    pub async fn remove_user(&self, tenant_id: &str, user_id: &str) -> Result<(), DirectoryError> {
        let user_dn = self.user_mapper.id_to_dn(user_id);
        let mut conn = self.mapper.connect().await?;
        let res = conn
            .modify(
                &self.tenant_dn(tenant_id),
                vec![DirMod::Delete(
                    self.member_attribute(),
                    vec![DirValue::Text(user_dn)],
                )],
            )
            .await;
        conn.unbind().await;
        match res {
            Ok(()) => Ok(()),
            Err(e) if is_no_such_attribute(&e) => Err(DirectoryError::GrantNotFound(format!(
                "user {user_id} is not a member of tenant {tenant_id}"
            ))),
            Err(e) if is_no_such_object(&e) => Err(DirectoryError::NotFound(tenant_id.into())),
            Err(e) => Err(dir_err(e, "removing the tenant member")),
        }
    }

    /// IDs of the direct members, the placeholder member excluded.
    pub async fn member_ids(&self, tenant_id: &str) -> Result<Vec<String>, DirectoryError> {
        let entry = self
            .mapper
            .get(tenant_id, None)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(tenant_id.into()))?;
        Ok(entry
            .texts(&self.member_attribute())
            .into_iter()
            .filter(|dn| {
                !(self.mapper.conf.use_dumb_member && dn == &self.mapper.conf.dumb_member_dn)
            })
            .filter_map(|dn| EntityMapper::dn_to_id(&dn))
            .collect())
    }

    pub async fn list_for_user_page(
        &self,
        user_id: &str,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Tenant>, DirectoryError> {
        let tenants = self.get_user_tenants(user_id).await?;
        Ok(pagination::get_page(marker, limit, tenants, |t| &t.id))
    }

    pub async fn list_for_user_page_markers(
        &self,
        user_id: &str,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<PageMarkers, DirectoryError> {
        let tenants = self.get_user_tenants(user_id).await?;
        Ok(pagination::get_page_markers(marker, limit, tenants, |t| {
            &t.id
        }))
    }

    pub async fn get_page(
        &self,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Tenant>, DirectoryError> {
        let tenants = self.list(&TenantListParameters::default()).await?;
        Ok(pagination::get_page(marker, limit, tenants, |t| &t.id))
    }

    pub async fn get_page_markers(
        &self,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<PageMarkers, DirectoryError> {
        let tenants = self.list(&TenantListParameters::default()).await?;
        Ok(pagination::get_page_markers(marker, limit, tenants, |t| {
            &t.id
        }))
    }
}
