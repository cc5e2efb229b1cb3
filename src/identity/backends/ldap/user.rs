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

//! Directory user operations.

use ldap3::ldap_escape;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::LdapSection;
use crate::identity::backends::error::DirectoryError;
use crate::identity::backends::ldap::connection::{DirEntry, DirValue};
use crate::identity::backends::ldap::mapping::{AttrValues, EntityMapper};
use crate::identity::backends::ldap::pagination;
use crate::identity::types::{
    PageMarkers, UserCreate, UserListParameters, UserResponse, UserUpdate,
};

#[derive(Clone, Debug)]
pub struct UserApi {
    pub mapper: EntityMapper,
}

impl UserApi {
    pub fn new(conf: &LdapSection, create_lock: Arc<Mutex<()>>) -> Self {
        Self {
            mapper: EntityMapper::for_users(conf, create_lock),
        }
    }

    pub fn user_dn(&self, user_id: &str) -> String {
        self.mapper.id_to_dn(user_id)
    }

    fn to_model(&self, entry: &DirEntry) -> Result<UserResponse, DirectoryError> {
        let id = entry
            .first_text(&self.mapper.id_attribute)
            .or_else(|| EntityMapper::dn_to_id(&entry.dn))
            .ok_or_else(|| DirectoryError::MalformedEntry(entry.dn.clone()))?;
        let name = entry
            .first_text(&self.mapper.name_attribute())
            .ok_or_else(|| DirectoryError::MalformedEntry(entry.dn.clone()))?;
        Ok(UserResponse {
            id,
            name,
            // The schema has no portable enabled flag; the attribute is
            // ignored on write and entries read back as enabled.
            enabled: true,
            tenant_id: None,
            tenants: None,
            extra: None,
        })
    }

    pub async fn list(
        &self,
        params: &UserListParameters,
    ) -> Result<Vec<UserResponse>, DirectoryError> {
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

    pub async fn get(&self, user_id: &str) -> Result<Option<UserResponse>, DirectoryError> {
        self.mapper
            .get(user_id, None)
            .await?
            .map(|entry| self.to_model(&entry))
            .transpose()
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<UserResponse>, DirectoryError> {
        self.mapper
            .get_by_attr(&self.mapper.name_attribute(), name)
            .await?
            .map(|entry| self.to_model(&entry))
            .transpose()
    }

    /// Create the user entry. The password arrives already hashed.
    pub async fn create(
        &self,
        user_id: &str,
        user: &UserCreate,
        password_hash: Option<String>,
    ) -> Result<UserResponse, DirectoryError> {
        let mut values = AttrValues::from([(
            "name".to_string(),
            Some(DirValue::Text(user.name.clone())),
        )]);
        if let Some(hash) = password_hash {
            values.insert("password".into(), Some(DirValue::Text(hash)));
        }
        if let Some(serde_json::Value::Object(extra)) = &user.extra {
            for (attr, value) in extra {
                values.insert(attr.clone(), DirValue::from_json(value));
            }
        }
        self.mapper
            .create_checked(user_id, Some(&user.name), values)
            .await?;
        Ok(UserResponse {
            id: user_id.to_string(),
            name: user.name.clone(),
            enabled: user.enabled.unwrap_or(true),
            tenant_id: user.tenant_id.clone(),
            tenants: None,
            extra: user.extra.clone(),
        })
    }

    /// Update user attributes with a minimal diff. The unique name is
    /// immutable.
    pub async fn update(
        &self,
        user_id: &str,
        user: &UserUpdate,
        password_hash: Option<String>,
    ) -> Result<UserResponse, DirectoryError> {
        let old = self
            .mapper
            .get(user_id, None)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(user_id.into()))?;

        let current_name = old.first_text(&self.mapper.name_attribute());
        if let Some(name) = &user.name
            && current_name.as_deref() != Some(name.as_str())
        {
            return Err(DirectoryError::InvalidUpdate(
                "changing the user name is not permitted".into(),
            ));
        }

        let mut values = AttrValues::new();
        if let Some(hash) = password_hash {
            values.insert("password".into(), Some(DirValue::Text(hash)));
        }
        if let Some(serde_json::Value::Object(extra)) = &user.extra {
            for (attr, value) in extra {
                values.insert(attr.clone(), DirValue::from_json(value));
            }
        }
        self.mapper.update(user_id, values, Some(&old)).await?;

        self.get(user_id)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(user_id.into()))
    }

    pub async fn delete(&self, user_id: &str) -> Result<(), DirectoryError> {
        self.mapper.delete(user_id).await
    }

    pub async fn get_page(
        &self,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<UserResponse>, DirectoryError> {
        let users = self.list(&UserListParameters::default()).await?;
        Ok(pagination::get_page(marker, limit, users, |u| &u.id))
    }

    pub async fn get_page_markers(
        &self,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<PageMarkers, DirectoryError> {
        let users = self.list(&UserListParameters::default()).await?;
        Ok(pagination::get_page_markers(marker, limit, users, |u| &u.id))
    }
}
