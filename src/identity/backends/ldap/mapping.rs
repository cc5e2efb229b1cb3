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

//! Generic entity-to-directory mapping.
//!
//! Each entity type occupies one subtree of the directory. The mapper
//! builds distinguished names as `{id_attribute}={id},{tree_dn}`, renames
//! logical attributes to their directory counterparts and provides CRUD over
//! the subtree. Entity semantics (membership, cascades, uniqueness rules
//! beyond id/name) live in the per-entity drivers.

use ldap3::{dn_escape, ldap_escape};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::LdapSection;
use crate::identity::backends::error::{DirectoryError, dir_err, is_no_such_object};
use crate::identity::backends::ldap::connection::{
    DirEntry, DirMod, DirValue, DirectoryConnection, Scope,
};

/// Logical attribute values for a write. `None` requests attribute removal
/// on update and is skipped on create.
pub type AttrValues = BTreeMap<String, Option<DirValue>>;

#[derive(Clone, Debug)]
pub struct EntityMapper {
    /// Entity kind, used in conflict messages.
    pub options_name: &'static str,
    pub conf: LdapSection,
    pub tree_dn: String,
    pub id_attribute: String,
    pub object_class: String,
    pub structural_classes: Vec<String>,
    /// Logical name to directory attribute renames; everything else passes
    /// through unchanged.
    pub attribute_mapping: HashMap<String, String>,
    /// Logical attributes that never reach the directory.
    pub attribute_ignore: HashSet<String>,
    /// Membership attribute for membership-capable entities.
    pub member_attribute: Option<String>,
    /// Extra filter ANDed into every search.
    pub entity_filter: Option<String>,
    /// Serializes the check-then-write sequence of unique creates within
    /// this process. The window against other writers remains open; the
    /// directory offers no conditional create.
    create_lock: Arc<Mutex<()>>,
}

impl EntityMapper {
    pub fn for_users(conf: &LdapSection, create_lock: Arc<Mutex<()>>) -> Self {
        Self {
            options_name: "user",
            tree_dn: conf
                .user_tree_dn
                .clone()
                .unwrap_or_else(|| format!("ou=Users,{}", conf.suffix)),
            id_attribute: conf.user_id_attribute.clone(),
            object_class: conf.user_objectclass.clone(),
            structural_classes: vec!["person".into()],
            attribute_mapping: HashMap::from([
                ("name".to_string(), conf.user_name_attribute.clone()),
                ("password".to_string(), "userPassword".to_string()),
            ]),
            attribute_ignore: HashSet::from([
                "id".to_string(),
                "tenant_id".to_string(),
                "enabled".to_string(),
                "tenants".to_string(),
            ]),
            member_attribute: None,
            entity_filter: conf.user_filter.clone(),
            conf: conf.clone(),
            create_lock,
        }
    }

    pub fn for_tenants(conf: &LdapSection, create_lock: Arc<Mutex<()>>) -> Self {
        Self {
            options_name: "tenant",
            tree_dn: conf
                .tenant_tree_dn
                .clone()
                .unwrap_or_else(|| format!("ou=Groups,{}", conf.suffix)),
            id_attribute: conf.tenant_id_attribute.clone(),
            object_class: conf.tenant_objectclass.clone(),
            structural_classes: vec![],
            attribute_mapping: HashMap::from([
                ("name".to_string(), conf.tenant_name_attribute.clone()),
                ("description".to_string(), conf.tenant_desc_attribute.clone()),
            ]),
            attribute_ignore: HashSet::from(["id".to_string()]),
            member_attribute: Some(conf.tenant_member_attribute.clone()),
            entity_filter: conf.tenant_filter.clone(),
            conf: conf.clone(),
            create_lock,
        }
    }

    pub fn for_roles(conf: &LdapSection, create_lock: Arc<Mutex<()>>) -> Self {
        Self {
            options_name: "role",
            tree_dn: conf
                .role_tree_dn
                .clone()
                .unwrap_or_else(|| format!("ou=Roles,{}", conf.suffix)),
            id_attribute: conf.role_id_attribute.clone(),
            object_class: conf.role_objectclass.clone(),
            structural_classes: vec![],
            attribute_mapping: HashMap::from([
                ("name".to_string(), conf.role_name_attribute.clone()),
                ("service_id".to_string(), "serviceId".to_string()),
            ]),
            attribute_ignore: HashSet::from(["id".to_string()]),
            member_attribute: None,
            entity_filter: conf.role_filter.clone(),
            conf: conf.clone(),
            create_lock,
        }
    }

    /// The DN addressing the entity with the given id.
    pub fn id_to_dn(&self, id: &str) -> String {
        format!("{}={},{}", self.id_attribute, dn_escape(id), self.tree_dn)
    }

    /// Recover the entity id from a DN: the value of the first RDN.
    pub fn dn_to_id(dn: &str) -> Option<String> {
        dn.split(',')
            .next()
            .and_then(|rdn| rdn.split_once('='))
            .map(|(_, value)| value.to_string())
    }

    /// The directory attribute holding the logical attribute.
    pub fn attr_for(&self, logical: &str) -> String {
        self.attribute_mapping
            .get(logical)
            .cloned()
            .unwrap_or_else(|| logical.to_string())
    }

    /// The directory attribute holding the unique entity name.
    pub fn name_attribute(&self) -> String {
        self.attr_for("name")
    }

    /// Compose the search filter: the entity object class ANDed with the
    /// caller filter and the configured entity filter.
    pub fn search_filter(&self, caller: Option<&str>) -> String {
        let base = format!("(objectClass={})", self.object_class);
        let mut clauses = String::new();
        if let Some(extra) = caller {
            clauses.push_str(extra);
        }
        if let Some(extra) = &self.entity_filter {
            clauses.push_str(extra);
        }
        if clauses.is_empty() {
            base
        } else {
            format!("(&{base}{clauses})")
        }
    }

    pub async fn connect(&self) -> Result<DirectoryConnection, DirectoryError> {
        DirectoryConnection::connect(&self.conf, None, None).await
    }

    /// Assemble the attribute list of a new entry: object classes, the id
    /// attribute, the mapped values. A membership-capable entry with no
    /// explicit members receives the placeholder member so it stays
    /// structurally valid while empty.
    pub fn create_attrs(&self, id: &str, values: &AttrValues) -> Vec<(String, Vec<DirValue>)> {
        let mut attrs: Vec<(String, Vec<DirValue>)> = Vec::new();

        let mut object_classes: Vec<DirValue> = self
            .structural_classes
            .iter()
            .cloned()
            .map(DirValue::Text)
            .collect();
        object_classes.push(DirValue::Text(self.object_class.clone()));
        attrs.push(("objectClass".into(), object_classes));
        attrs.push((self.id_attribute.clone(), vec![DirValue::Text(id.into())]));

        for (logical, value) in values {
            if logical == "id" || self.attribute_ignore.contains(logical) {
                continue;
            }
            if let Some(value) = value {
                attrs.push((self.attr_for(logical), vec![value.clone()]));
            }
        }

        if let Some(member_attribute) = &self.member_attribute
            && self.conf.use_dumb_member
            && !attrs.iter().any(|(attr, _)| attr == member_attribute)
        {
            attrs.push((
                member_attribute.clone(),
                vec![DirValue::Text(self.conf.dumb_member_dn.clone())],
            ));
        }
        attrs
    }

    /// Create the entry.
    pub async fn create(&self, id: &str, values: AttrValues) -> Result<(), DirectoryError> {
        let attrs = self.create_attrs(id, &values);
        let mut conn = self.connect().await?;
        let res = conn
            .add(&self.id_to_dn(id), attrs)
            .await
            .map_err(|e| dir_err(e, "creating the directory entry"));
        conn.unbind().await;
        res
    }

    /// Probe for id and unique-name collisions before a create.
    pub async fn affirm_unique(
        &self,
        id: &str,
        name: Option<&str>,
    ) -> Result<(), DirectoryError> {
        if let Some(name) = name
            && self.get_by_attr(&self.name_attribute(), name).await?.is_some()
        {
            return Err(DirectoryError::Conflict {
                message: format!("{} with name {} already exists", self.options_name, name),
                context: "creating the directory entry".into(),
            });
        }
        if self.get(id, None).await?.is_some() {
            return Err(DirectoryError::Conflict {
                message: format!("{} with id {} already exists", self.options_name, id),
                context: "creating the directory entry".into(),
            });
        }
        Ok(())
    }

    /// Create after probing for duplicates, serialized within the process.
    pub async fn create_checked(
        &self,
        id: &str,
        name: Option<&str>,
        values: AttrValues,
    ) -> Result<(), DirectoryError> {
        let _guard = self.create_lock.lock().await;
        self.affirm_unique(id, name).await?;
        self.create(id, values).await
    }

    /// Read a single entry by id. Absent entries and absent subtrees both
    /// read as `None`.
    pub async fn get(
        &self,
        id: &str,
        filter: Option<&str>,
    ) -> Result<Option<DirEntry>, DirectoryError> {
        let mut conn = self.connect().await?;
        let res = conn
            .search(&self.id_to_dn(id), Scope::Base, &self.search_filter(filter))
            .await;
        conn.unbind().await;
        match res {
            Ok(entries) => Ok(entries.into_iter().next()),
            Err(e) if is_no_such_object(&e) => Ok(None),
            Err(e) => Err(dir_err(e, "reading the directory entry")),
        }
    }

    /// Read all entries of the subtree matching the optional caller filter.
    /// An absent subtree reads as an empty result, not an error.
    pub async fn get_all(&self, filter: Option<&str>) -> Result<Vec<DirEntry>, DirectoryError> {
        let mut conn = self.connect().await?;
        let res = conn
            .search(&self.tree_dn, Scope::OneLevel, &self.search_filter(filter))
            .await;
        conn.unbind().await;
        match res {
            Ok(entries) => Ok(entries),
            Err(e) if is_no_such_object(&e) => Ok(Vec::new()),
            Err(e) => Err(dir_err(e, "searching the directory subtree")),
        }
    }

    /// Find the first entry whose attribute equals the value.
    pub async fn get_by_attr(
        &self,
        attr: &str,
        value: &str,
    ) -> Result<Option<DirEntry>, DirectoryError> {
        let filter = format!("({}={})", attr, ldap_escape(value));
        Ok(self.get_all(Some(&filter)).await?.into_iter().next())
    }

    /// Compute the minimal modification list turning `old` into the
    /// requested values: add what was absent, replace what changed, delete
    /// what is now unset.
    pub fn diff(&self, values: &AttrValues, old: &DirEntry) -> Vec<DirMod> {
        let mut mods = Vec::new();
        for (logical, value) in values {
            if logical == "id" || self.attribute_ignore.contains(logical) {
                continue;
            }
            let attr = self.attr_for(logical);
            let old_value = old.first(&attr);
            match (value, old_value) {
                (None, Some(_)) => mods.push(DirMod::Delete(attr, vec![])),
                (None, None) => {}
                (Some(new), None) => mods.push(DirMod::Add(attr, vec![new.clone()])),
                (Some(new), Some(old)) if new != old => {
                    mods.push(DirMod::Replace(attr, vec![new.clone()]))
                }
                (Some(_), Some(_)) => {}
            }
        }
        mods
    }

    /// Apply a minimal diff against the current (or caller-supplied) state
    /// as a single modify call.
    pub async fn update(
        &self,
        id: &str,
        values: AttrValues,
        old: Option<&DirEntry>,
    ) -> Result<(), DirectoryError> {
        let current;
        let old = match old {
            Some(old) => old,
            None => {
                current = self
                    .get(id, None)
                    .await?
                    .ok_or_else(|| DirectoryError::NotFound(id.into()))?;
                &current
            }
        };
        let mods = self.diff(&values, old);
        if mods.is_empty() {
            return Ok(());
        }
        let mut conn = self.connect().await?;
        let res = conn.modify(&self.id_to_dn(id), mods).await;
        conn.unbind().await;
        match res {
            Ok(()) => Ok(()),
            Err(e) if is_no_such_object(&e) => Err(DirectoryError::NotFound(id.into())),
            Err(e) => Err(dir_err(e, "updating the directory entry")),
        }
    }

    /// Remove the entry outright.
    pub async fn delete(&self, id: &str) -> Result<(), DirectoryError> {
        let mut conn = self.connect().await?;
        let res = conn.delete(&self.id_to_dn(id)).await;
        conn.unbind().await;
        match res {
            Ok(()) => Ok(()),
            Err(e) if is_no_such_object(&e) => Err(DirectoryError::NotFound(id.into())),
            Err(e) => Err(dir_err(e, "deleting the directory entry")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant_mapper() -> EntityMapper {
        EntityMapper::for_tenants(&LdapSection::default(), Arc::default())
    }

    fn entry(attrs: &[(&str, DirValue)]) -> DirEntry {
        DirEntry {
            dn: "cn=t1,ou=Groups,dc=example,dc=com".into(),
            attrs: attrs
                .iter()
                .map(|(attr, value)| (attr.to_string(), vec![value.clone()]))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_id_to_dn_escapes() {
        let mapper = tenant_mapper();
        assert_eq!(mapper.id_to_dn("t1"), "cn=t1,ou=Groups,dc=example,dc=com");
        assert_eq!(
            mapper.id_to_dn("a,b"),
            "cn=a\\,b,ou=Groups,dc=example,dc=com"
        );
    }

    #[test]
    fn test_dn_to_id() {
        assert_eq!(
            EntityMapper::dn_to_id("cn=u1,ou=Users,dc=example,dc=com"),
            Some("u1".into())
        );
        assert_eq!(EntityMapper::dn_to_id("garbage"), None);
    }

    #[test]
    fn test_search_filter() {
        let mapper = tenant_mapper();
        assert_eq!(mapper.search_filter(None), "(objectClass=groupOfNames)");
        assert_eq!(
            mapper.search_filter(Some("(ou=acme)")),
            "(&(objectClass=groupOfNames)(ou=acme))"
        );
    }

    #[test]
    fn test_diff_add_replace_delete() {
        let mapper = tenant_mapper();
        let old = entry(&[
            ("ou", DirValue::Text("acme".into())),
            ("description", DirValue::Text("old".into())),
            ("enabled", DirValue::Bool(true)),
        ]);

        let values = AttrValues::from([
            // unchanged value produces no modification
            ("name".to_string(), Some(DirValue::Text("acme".into()))),
            // changed value is replaced
            ("enabled".to_string(), Some(DirValue::Bool(false))),
            // now-unset value is deleted
            ("description".to_string(), None),
            // newly set value is added
            ("owner".to_string(), Some(DirValue::Text("root".into()))),
        ]);

        let mods = mapper.diff(&values, &old);
        assert_eq!(mods.len(), 3);
        assert!(mods.iter().any(
            |m| matches!(m, DirMod::Delete(attr, values) if attr == "description" && values.is_empty())
        ));
        assert!(mods.iter().any(
            |m| matches!(m, DirMod::Replace(attr, values) if attr == "enabled" && values == &[DirValue::Bool(false)])
        ));
        assert!(mods.iter().any(|m| matches!(m, DirMod::Add(attr, _) if attr == "owner")));
    }

    #[test]
    fn test_create_attrs_inserts_placeholder_member() {
        let mapper = tenant_mapper();
        let values = AttrValues::from([(
            "name".to_string(),
            Some(DirValue::Text("acme".into())),
        )]);
        let attrs = mapper.create_attrs("t1", &values);

        assert!(attrs.contains(&(
            "objectClass".to_string(),
            vec![DirValue::Text("groupOfNames".into())]
        )));
        assert!(attrs.contains(&("cn".to_string(), vec![DirValue::Text("t1".into())])));
        assert!(attrs.contains(&("ou".to_string(), vec![DirValue::Text("acme".into())])));
        // No members supplied: the placeholder keeps the group valid.
        assert!(attrs.contains(&(
            "member".to_string(),
            vec![DirValue::Text("cn=dumb,dc=nonexistent".into())]
        )));
    }

    #[test]
    fn test_create_attrs_keeps_explicit_members() {
        let mapper = tenant_mapper();
        let values = AttrValues::from([
            ("name".to_string(), Some(DirValue::Text("acme".into()))),
            (
                "member".to_string(),
                Some(DirValue::Text("cn=u1,ou=Users,dc=example,dc=com".into())),
            ),
        ]);
        let attrs = mapper.create_attrs("t1", &values);
        let members: Vec<_> = attrs.iter().filter(|(attr, _)| attr == "member").collect();
        assert_eq!(members.len(), 1);
        assert_eq!(
            members[0].1,
            vec![DirValue::Text("cn=u1,ou=Users,dc=example,dc=com".into())]
        );
    }

    #[test]
    fn test_create_attrs_no_placeholder_for_plain_entities() {
        let mapper = EntityMapper::for_roles(&LdapSection::default(), Arc::default());
        let values = AttrValues::from([(
            "name".to_string(),
            Some(DirValue::Text("admin".into())),
        )]);
        let attrs = mapper.create_attrs("admin", &values);
        assert!(!attrs.iter().any(|(attr, _)| attr == "member"));
        assert!(
            !attrs
                .iter()
                .any(|(_, values)| values.contains(&DirValue::Text("cn=dumb,dc=nonexistent".into())))
        );
    }

    #[test]
    fn test_diff_skips_ignored() {
        let mapper = tenant_mapper();
        let old = entry(&[("ou", DirValue::Text("acme".into()))]);
        let values = AttrValues::from([(
            "id".to_string(),
            Some(DirValue::Text("other".into())),
        )]);
        assert!(mapper.diff(&values, &old).is_empty());
    }
}
