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

//! Directory role operations and role grants.
//!
//! A global grant is a member value on the role entry under the role
//! subtree. A tenant-scoped grant lives on a role subentry beneath the
//! tenant entry (`cn={role},{tenant_dn}`); the subentry is created on first
//! use. In both cases the member value is the user DN, so the grant triple
//! is fully recoverable from the entry location and the member value.

use ldap3::{dn_escape, ldap_escape};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::LdapSection;
use crate::identity::backends::error::{
    DirectoryError, dir_err, is_no_such_attribute, is_no_such_object, is_type_or_value_exists,
};
use crate::identity::backends::ldap::connection::{DirEntry, DirMod, DirValue, Scope};
use crate::identity::backends::ldap::mapping::{AttrValues, EntityMapper};
use crate::identity::backends::ldap::pagination;
use crate::identity::types::{
    PageMarkers, Role, RoleCreate, RoleGrant, RoleListParameters, decode_grant_ref,
};

#[derive(Clone, Debug)]
pub struct RoleApi {
    pub mapper: EntityMapper,
    user_mapper: EntityMapper,
    tenant_mapper: EntityMapper,
}

impl RoleApi {
    pub fn new(
        conf: &LdapSection,
        create_lock: Arc<Mutex<()>>,
        user_lock: Arc<Mutex<()>>,
        tenant_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            mapper: EntityMapper::for_roles(conf, create_lock),
            user_mapper: EntityMapper::for_users(conf, user_lock),
            tenant_mapper: EntityMapper::for_tenants(conf, tenant_lock),
        }
    }

    fn member_attribute(&self) -> String {
        self.mapper.conf.role_member_attribute.clone()
    }

    /// DN of the grant-holding entry: the role entry itself for global
    /// grants, the role subentry beneath the tenant for scoped ones.
    fn subrole_dn(&self, role_id: &str, tenant_id: Option<&str>) -> String {
        match tenant_id {
            None => self.mapper.id_to_dn(role_id),
            Some(tenant_id) => format!(
                "cn={},{}",
                dn_escape(role_id),
                self.tenant_mapper.id_to_dn(tenant_id)
            ),
        }
    }

    fn to_model(&self, entry: &DirEntry) -> Result<Role, DirectoryError> {
        let id = entry
            .first_text(&self.mapper.id_attribute)
            .or_else(|| EntityMapper::dn_to_id(&entry.dn))
            .ok_or_else(|| DirectoryError::MalformedEntry(entry.dn.clone()))?;
        let name = entry
            .first_text(&self.mapper.name_attribute())
            .unwrap_or_else(|| id.clone());
        Ok(Role {
            id,
            name,
            service_id: entry.first_text(&self.mapper.attr_for("service_id")),
        })
    }

    pub async fn list(&self, params: &RoleListParameters) -> Result<Vec<Role>, DirectoryError> {
        let mut clauses = String::new();
        if let Some(name) = &params.name {
            clauses.push_str(&format!(
                "({}={})",
                self.mapper.name_attribute(),
                ldap_escape(name)
            ));
        }
        if let Some(service_id) = &params.service_id {
            clauses.push_str(&format!(
                "({}={})",
                self.mapper.attr_for("service_id"),
                ldap_escape(service_id)
            ));
        }
        let filter = (!clauses.is_empty()).then(|| format!("(&{clauses})"));
        self.mapper
            .get_all(filter.as_deref())
            .await?
            .iter()
            .map(|entry| self.to_model(entry))
            .collect()
    }

    pub async fn get(&self, role_id: &str) -> Result<Option<Role>, DirectoryError> {
        self.mapper
            .get(role_id, None)
            .await?
            .map(|entry| self.to_model(&entry))
            .transpose()
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>, DirectoryError> {
        self.mapper
            .get_by_attr(&self.mapper.name_attribute(), name)
            .await?
            .map(|entry| self.to_model(&entry))
            .transpose()
    }

    pub async fn create(&self, role_id: &str, role: &RoleCreate) -> Result<Role, DirectoryError> {
        let mut values = AttrValues::from([(
            "name".to_string(),
            Some(DirValue::Text(role.name.clone())),
        )]);
        if let Some(service_id) = &role.service_id {
            values.insert("service_id".into(), Some(DirValue::Text(service_id.clone())));
        }
        self.mapper
            .create_checked(role_id, Some(&role.name), values)
            .await?;
        Ok(Role {
            id: role_id.to_string(),
            name: role.name.clone(),
            service_id: role.service_id.clone(),
        })
    }

    pub async fn delete(&self, role_id: &str) -> Result<(), DirectoryError> {
        self.mapper.delete(role_id).await
    }

    pub async fn get_by_service(&self, service_id: &str) -> Result<Vec<Role>, DirectoryError> {
        let filter = format!(
            "({}={})",
            self.mapper.attr_for("service_id"),
            ldap_escape(service_id)
        );
        self.mapper
            .get_all(Some(&filter))
            .await?
            .iter()
            .map(|entry| self.to_model(entry))
            .collect()
    }

    /// Grant the role to the user. With a tenant scope the grant lives on a
    /// role subentry beneath the tenant, created on demand.
    pub async fn add_user(
        &self,
        role_id: &str,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<RoleGrant, DirectoryError> {
        let role_dn = self.subrole_dn(role_id, tenant_id);
        let user_dn = self.user_mapper.id_to_dn(user_id);
        let member_attribute = self.member_attribute();

        let mut conn = self.mapper.connect().await?;
        let res = conn
            .modify(
                &role_dn,
                vec![DirMod::Add(
                    member_attribute.clone(),
                    vec![DirValue::Text(user_dn.clone())],
                )],
            )
            .await;

        let grant_result = match res {
            Ok(()) => Ok(()),
            Err(e) if is_type_or_value_exists(&e) => Err(DirectoryError::Conflict {
                message: format!(
                    "user {user_id} already has role {role_id} on tenant {tenant_id:?}"
                ),
                context: "granting the role".into(),
            }),
            Err(e) if is_no_such_object(&e) => {
                if tenant_id.is_none() || self.get(role_id).await?.is_none() {
                    Err(DirectoryError::NotFound(role_id.into()))
                } else {
                    // First grant of this role on the tenant: materialize
                    // the subentry.
                    let mut members = vec![DirValue::Text(user_dn.clone())];
                    if self.mapper.conf.use_dumb_member {
                        members.push(DirValue::Text(self.mapper.conf.dumb_member_dn.clone()));
                    }
                    let attrs = vec![
                        (
                            "objectClass".to_string(),
                            vec![DirValue::Text(self.mapper.object_class.clone())],
                        ),
                        (
                            self.mapper.id_attribute.clone(),
                            vec![DirValue::Text(role_id.into())],
                        ),
                        (member_attribute.clone(), members),
                    ];
                    match conn.add(&role_dn, attrs).await {
                        Ok(()) => Ok(()),
                        Err(e) if is_no_such_object(&e) => Err(DirectoryError::NotFound(
                            tenant_id.unwrap_or(role_id).to_string(),
                        )),
                        Err(e) => Err(dir_err(e, "creating the tenant role subentry")),
                    }
                }
            }
            Err(e) => Err(dir_err(e, "granting the role")),
        };
        conn.unbind().await;
        grant_result?;

        Ok(RoleGrant::new(role_id, tenant_id, user_id)?)
    }

    /// Destroy the grant addressed by the reference.
    pub async fn rolegrant_delete(&self, grant_ref: &str) -> Result<(), DirectoryError> {
        let (role_id, tenant_id, user_id) = decode_grant_ref(grant_ref)?;
        let role_dn = self.subrole_dn(&role_id, tenant_id.as_deref());
        let user_dn = self.user_mapper.id_to_dn(&user_id);

        let mut conn = self.mapper.connect().await?;
        let res = conn
            .modify(
                &role_dn,
                vec![DirMod::Delete(
                    self.member_attribute(),
                    vec![DirValue::Text(user_dn)],
                )],
            )
            .await;
        conn.unbind().await;
        match res {
            Ok(()) => Ok(()),
            Err(e) if is_no_such_attribute(&e) || is_no_such_object(&e) => {
                Err(DirectoryError::GrantNotFound(grant_ref.into()))
            }
            Err(e) => Err(dir_err(e, "revoking the role")),
        }
    }

    /// All grants on the tenant: one-level scan of the role subentries.
    pub async fn get_role_assignments(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<RoleGrant>, DirectoryError> {
        let tenant_dn = self.tenant_mapper.id_to_dn(tenant_id);
        let filter = format!("(objectClass={})", self.mapper.object_class);

        let mut conn = self.mapper.connect().await?;
        let res = conn.search(&tenant_dn, Scope::OneLevel, &filter).await;
        conn.unbind().await;
        let entries = match res {
            Ok(entries) => entries,
            Err(e) if is_no_such_object(&e) => return Ok(Vec::new()),
            Err(e) => return Err(dir_err(e, "listing tenant role assignments")),
        };

        let mut grants = Vec::new();
        for entry in entries {
            let Some(role_id) = EntityMapper::dn_to_id(&entry.dn) else {
                continue;
            };
            for user_dn in entry.texts(&self.member_attribute()) {
                if self.is_dumb_member(&user_dn) {
                    continue;
                }
                if let Some(user_id) = EntityMapper::dn_to_id(&user_dn) {
                    grants.push(RoleGrant::new(role_id.clone(), Some(tenant_id), user_id)?);
                }
            }
        }
        Ok(grants)
    }

    /// Remove every role subentry beneath the tenant, grants included.
    /// Leaves the tenant entry itself alone so it can be deleted as a leaf.
    pub async fn purge_tenant_role_entries(&self, tenant_id: &str) -> Result<(), DirectoryError> {
        let tenant_dn = self.tenant_mapper.id_to_dn(tenant_id);
        let filter = format!("(objectClass={})", self.mapper.object_class);

        let mut conn = self.mapper.connect().await?;
        let res = conn.search(&tenant_dn, Scope::OneLevel, &filter).await;
        let entries = match res {
            Ok(entries) => entries,
            Err(e) if is_no_such_object(&e) => {
                conn.unbind().await;
                return Ok(());
            }
            Err(e) => {
                conn.unbind().await;
                return Err(dir_err(e, "listing tenant role subentries"));
            }
        };
        for entry in entries {
            match conn.delete(&entry.dn).await {
                Ok(()) => {}
                Err(e) if is_no_such_object(&e) => {}
                Err(e) => {
                    conn.unbind().await;
                    return Err(dir_err(e, "deleting the tenant role subentry"));
                }
            }
        }
        conn.unbind().await;
        Ok(())
    }

    /// Grants of the user that are not bound to any tenant.
    pub async fn list_global_roles_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<RoleGrant>, DirectoryError> {
        let user_dn = self.user_mapper.id_to_dn(user_id);
        let filter = format!("({}={})", self.member_attribute(), ldap_escape(&user_dn));
        self.mapper
            .get_all(Some(&filter))
            .await?
            .iter()
            .filter_map(|entry| EntityMapper::dn_to_id(&entry.dn))
            .map(|role_id| Ok(RoleGrant::new(role_id, None::<&str>, user_id)?))
            .collect()
    }

    /// Tenant-bound grants of the user: on one tenant, or across the whole
    /// tenant subtree with the tenant recovered from the entry location.
    pub async fn list_tenant_roles_for_user(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Vec<RoleGrant>, DirectoryError> {
        let user_dn = self.user_mapper.id_to_dn(user_id);
        let filter = format!(
            "(&(objectClass={})({}={}))",
            self.mapper.object_class,
            self.member_attribute(),
            ldap_escape(&user_dn)
        );

        let (base, scope) = match tenant_id {
            Some(tenant_id) => (self.tenant_mapper.id_to_dn(tenant_id), Scope::OneLevel),
            None => (self.tenant_mapper.tree_dn.clone(), Scope::Subtree),
        };

        let mut conn = self.mapper.connect().await?;
        let res = conn.search(&base, scope, &filter).await;
        conn.unbind().await;
        let entries = match res {
            Ok(entries) => entries,
            Err(e) if is_no_such_object(&e) => return Ok(Vec::new()),
            Err(e) => return Err(dir_err(e, "listing tenant roles of the user")),
        };

        let mut grants = Vec::new();
        for entry in entries {
            let Some(role_id) = EntityMapper::dn_to_id(&entry.dn) else {
                continue;
            };
            let tenant_of_entry = match tenant_id {
                Some(tenant_id) => Some(tenant_id.to_string()),
                // The grant entry sits directly beneath its tenant: the
                // second RDN names it.
                None => second_rdn_value(&entry.dn),
            };
            let Some(tenant_of_entry) = tenant_of_entry else {
                continue;
            };
            grants.push(RoleGrant::new(role_id, Some(tenant_of_entry), user_id)?);
        }
        Ok(grants)
    }

    /// Look the grant up by its reference.
    pub async fn rolegrant_get(
        &self,
        grant_ref: &str,
    ) -> Result<Option<RoleGrant>, DirectoryError> {
        let (role_id, tenant_id, user_id) = decode_grant_ref(grant_ref)?;
        let role_dn = self.subrole_dn(&role_id, tenant_id.as_deref());
        let user_dn = self.user_mapper.id_to_dn(&user_id);
        let filter = format!(
            "(&(objectClass={})({}={}))",
            self.mapper.object_class,
            self.member_attribute(),
            ldap_escape(&user_dn)
        );

        let mut conn = self.mapper.connect().await?;
        let res = conn.search(&role_dn, Scope::Base, &filter).await;
        conn.unbind().await;
        match res {
            Ok(entries) if entries.is_empty() => Ok(None),
            Ok(_) => Ok(Some(RoleGrant {
                id: grant_ref.to_string(),
                role_id,
                tenant_id,
                user_id,
            })),
            Err(e) if is_no_such_object(&e) => Ok(None),
            Err(e) => Err(dir_err(e, "reading the role grant")),
        }
    }

    /// Page through the user grants: the global ones, or the tenant-bound
    /// ones across all tenants.
    pub async fn rolegrant_page(
        &self,
        user_id: &str,
        tenant_scoped: bool,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RoleGrant>, DirectoryError> {
        let grants = self.all_grants_for_user(user_id, tenant_scoped).await?;
        Ok(pagination::get_page(marker, limit, grants, |g| &g.id))
    }

    pub async fn rolegrant_page_markers(
        &self,
        user_id: &str,
        tenant_scoped: bool,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<PageMarkers, DirectoryError> {
        let grants = self.all_grants_for_user(user_id, tenant_scoped).await?;
        Ok(pagination::get_page_markers(marker, limit, grants, |g| {
            &g.id
        }))
    }

    pub async fn get_page(
        &self,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Role>, DirectoryError> {
        let roles = self.list(&RoleListParameters::default()).await?;
        Ok(pagination::get_page(marker, limit, roles, |r| &r.id))
    }

    pub async fn get_page_markers(
        &self,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<PageMarkers, DirectoryError> {
        let roles = self.list(&RoleListParameters::default()).await?;
        Ok(pagination::get_page_markers(marker, limit, roles, |r| &r.id))
    }

    async fn all_grants_for_user(
        &self,
        user_id: &str,
        tenant_scoped: bool,
    ) -> Result<Vec<RoleGrant>, DirectoryError> {
        if tenant_scoped {
            self.list_tenant_roles_for_user(user_id, None).await
        } else {
            self.list_global_roles_for_user(user_id).await
        }
    }

    fn is_dumb_member(&self, dn: &str) -> bool {
        self.mapper.conf.use_dumb_member && dn == self.mapper.conf.dumb_member_dn
    }
}

/// Value of the second RDN of a DN, e.g. the tenant of
/// `cn=admin,cn=t1,ou=Groups,…`.
fn second_rdn_value(dn: &str) -> Option<String> {
    dn.split(',')
        .nth(1)
        .and_then(|rdn| rdn.split_once('='))
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_rdn_value() {
        assert_eq!(
            second_rdn_value("cn=admin,cn=t1,ou=Groups,dc=example,dc=com"),
            Some("t1".into())
        );
        assert_eq!(second_rdn_value("cn=admin"), None);
    }

    #[test]
    fn test_subrole_dn() {
        let conf = LdapSection::default();
        let api = RoleApi::new(
            &conf,
            Arc::default(),
            Arc::default(),
            Arc::default(),
        );
        assert_eq!(
            api.subrole_dn("admin", None),
            "cn=admin,ou=Roles,dc=example,dc=com"
        );
        assert_eq!(
            api.subrole_dn("admin", Some("t1")),
            "cn=admin,cn=t1,ou=Groups,dc=example,dc=com"
        );
    }
}
