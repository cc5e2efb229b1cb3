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

use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Global configuration options
    #[serde(rename = "DEFAULT")]
    pub default: Option<DefaultSection>,

    /// Column store (token driver `column`) configuration.
    #[serde(default)]
    pub column_store: ColumnStoreSection,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseSection,

    /// Identity provider related configuration.
    #[serde(default)]
    pub identity: IdentitySection,

    /// Directory (LDAP) backend configuration.
    #[serde(default)]
    pub ldap: LdapSection,

    /// Token provider configuration.
    #[serde(default)]
    pub token: TokenSection,
}

impl Config {
    /// Load the configuration from an INI file.
    pub fn new(path: PathBuf) -> Result<Self, config::ConfigError> {
        Self::try_from(
            config::Config::builder().add_source(File::from(path).format(FileFormat::Ini)),
        )
    }
}

impl TryFrom<ConfigBuilder<DefaultState>> for Config {
    type Error = config::ConfigError;

    fn try_from(builder: ConfigBuilder<DefaultState>) -> Result<Self, Self::Error> {
        builder.build()?.try_deserialize()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DefaultSection {
    /// Debug logging
    pub debug: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DatabaseSection {
    /// Database URL. The connection itself is established by the process
    /// bootstrap; the library only receives the ready connection handle.
    pub connection: Option<SecretString>,
}

/// Identity provider configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct IdentitySection {
    /// Identity backend driver.
    #[serde(default = "default_ldap_driver")]
    pub driver: String,

    /// The password hashing algorithm to use for passwords stored within
    /// keygate.
    #[serde(default)]
    pub password_hashing_algorithm: PasswordHashingAlgo,

    /// Number of rounds to use for the password hashing.
    #[serde(default)]
    pub password_hash_rounds: Option<u32>,

    /// Maximum allowed length of the user password.
    #[serde(default = "default_max_password_length")]
    pub max_password_length: usize,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            driver: default_ldap_driver(),
            password_hashing_algorithm: PasswordHashingAlgo::default(),
            password_hash_rounds: None,
            max_password_length: default_max_password_length(),
        }
    }
}

/// Supported password hashing algorithms.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PasswordHashingAlgo {
    /// Bcrypt
    #[default]
    Bcrypt,
}

/// Token provider configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenSection {
    /// Token storage driver.
    #[serde(default)]
    pub driver: TokenBackendDriver,

    /// Default validity duration of the issued token (seconds). Applied when
    /// the caller did not supply an explicit expiration.
    #[serde(default = "default_token_expiration")]
    pub expiration: u64,
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            driver: TokenBackendDriver::default(),
            expiration: default_token_expiration(),
        }
    }
}

/// Supported token storage drivers.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackendDriver {
    /// Relational driver.
    #[default]
    Sql,
    /// In-process key-value driver.
    Kvs,
    /// Column store driver with native row TTL.
    Column,
}

/// Column store configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ColumnStoreSection {
    /// Contact points of the cluster.
    #[serde(default = "default_column_store_nodes")]
    pub nodes: Vec<String>,

    /// Keyspace holding the token column family.
    #[serde(default = "default_column_store_keyspace")]
    pub keyspace: String,
}

impl Default for ColumnStoreSection {
    fn default() -> Self {
        Self {
            nodes: default_column_store_nodes(),
            keyspace: default_column_store_keyspace(),
        }
    }
}

/// Directory backend configuration.
///
/// Per entity type the subtree DN, the id attribute (the RDN attribute),
/// the leaf object class and the attribute holding the entity name can be
/// overridden; unset subtree DNs default to a well-known organizational unit
/// under the configured suffix.
#[derive(Clone, Debug, Deserialize)]
pub struct LdapSection {
    /// Directory server URL.
    #[serde(default = "default_ldap_url")]
    pub url: String,

    /// DN to bind with for administrative operations. Anonymous bind when
    /// unset.
    #[serde(default)]
    pub user: Option<String>,

    /// Password for the administrative bind.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Root suffix of the directory tree.
    #[serde(default = "default_ldap_suffix")]
    pub suffix: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_ldap_timeout")]
    pub timeout: u64,

    /// Issue StartTLS on the connection.
    #[serde(default)]
    pub use_tls: bool,

    /// Insert a placeholder member into membership-capable entries so they
    /// stay structurally valid when otherwise empty.
    #[serde(default = "default_true")]
    pub use_dumb_member: bool,

    /// DN of the placeholder member.
    #[serde(default = "default_dumb_member_dn")]
    pub dumb_member_dn: String,

    #[serde(default)]
    pub user_tree_dn: Option<String>,
    #[serde(default = "default_id_attribute")]
    pub user_id_attribute: String,
    #[serde(default = "default_user_objectclass")]
    pub user_objectclass: String,
    #[serde(default = "default_user_name_attribute")]
    pub user_name_attribute: String,
    #[serde(default)]
    pub user_filter: Option<String>,

    #[serde(default)]
    pub tenant_tree_dn: Option<String>,
    #[serde(default = "default_id_attribute")]
    pub tenant_id_attribute: String,
    #[serde(default = "default_tenant_objectclass")]
    pub tenant_objectclass: String,
    #[serde(default = "default_tenant_name_attribute")]
    pub tenant_name_attribute: String,
    #[serde(default = "default_tenant_desc_attribute")]
    pub tenant_desc_attribute: String,
    #[serde(default = "default_tenant_member_attribute")]
    pub tenant_member_attribute: String,
    #[serde(default)]
    pub tenant_filter: Option<String>,

    #[serde(default)]
    pub role_tree_dn: Option<String>,
    #[serde(default = "default_id_attribute")]
    pub role_id_attribute: String,
    #[serde(default = "default_role_objectclass")]
    pub role_objectclass: String,
    #[serde(default = "default_id_attribute")]
    pub role_name_attribute: String,
    #[serde(default = "default_role_member_attribute")]
    pub role_member_attribute: String,
    #[serde(default)]
    pub role_filter: Option<String>,
}

impl Default for LdapSection {
    fn default() -> Self {
        Self {
            url: default_ldap_url(),
            user: None,
            password: None,
            suffix: default_ldap_suffix(),
            timeout: default_ldap_timeout(),
            use_tls: false,
            use_dumb_member: true,
            dumb_member_dn: default_dumb_member_dn(),
            user_tree_dn: None,
            user_id_attribute: default_id_attribute(),
            user_objectclass: default_user_objectclass(),
            user_name_attribute: default_user_name_attribute(),
            user_filter: None,
            tenant_tree_dn: None,
            tenant_id_attribute: default_id_attribute(),
            tenant_objectclass: default_tenant_objectclass(),
            tenant_name_attribute: default_tenant_name_attribute(),
            tenant_desc_attribute: default_tenant_desc_attribute(),
            tenant_member_attribute: default_tenant_member_attribute(),
            tenant_filter: None,
            role_tree_dn: None,
            role_id_attribute: default_id_attribute(),
            role_objectclass: default_role_objectclass(),
            role_name_attribute: default_id_attribute(),
            role_member_attribute: default_role_member_attribute(),
            role_filter: None,
        }
    }
}

fn default_ldap_driver() -> String {
    "ldap".into()
}

fn default_max_password_length() -> usize {
    4096
}

fn default_token_expiration() -> u64 {
    86400
}

fn default_column_store_nodes() -> Vec<String> {
    vec!["127.0.0.1:9042".into()]
}

fn default_column_store_keyspace() -> String {
    "keygate".into()
}

fn default_ldap_url() -> String {
    "ldap://localhost".into()
}

fn default_ldap_suffix() -> String {
    "dc=example,dc=com".into()
}

fn default_ldap_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_dumb_member_dn() -> String {
    "cn=dumb,dc=nonexistent".into()
}

fn default_id_attribute() -> String {
    "cn".into()
}

fn default_user_objectclass() -> String {
    "inetOrgPerson".into()
}

fn default_user_name_attribute() -> String {
    "sn".into()
}

fn default_tenant_objectclass() -> String {
    "groupOfNames".into()
}

fn default_tenant_name_attribute() -> String {
    "ou".into()
}

fn default_tenant_desc_attribute() -> String {
    "description".into()
}

fn default_tenant_member_attribute() -> String {
    "member".into()
}

fn default_role_objectclass() -> String {
    "organizationalRole".into()
}

fn default_role_member_attribute() -> String {
    "roleOccupant".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.identity.driver, "ldap");
        assert_eq!(config.token.driver, TokenBackendDriver::Sql);
        assert_eq!(config.token.expiration, 86400);
        assert_eq!(config.ldap.suffix, "dc=example,dc=com");
        assert!(config.ldap.use_dumb_member);
    }

    #[test]
    fn test_overrides() {
        let builder = config::Config::builder()
            .set_override("token.driver", "kvs")
            .unwrap()
            .set_override("token.expiration", "3600")
            .unwrap()
            .set_override("ldap.url", "ldap://directory.example.com")
            .unwrap();
        let config = Config::try_from(builder).expect("can build a valid config");
        assert_eq!(config.token.driver, TokenBackendDriver::Kvs);
        assert_eq!(config.token.expiration, 3600);
        assert_eq!(config.ldap.url, "ldap://directory.example.com");
    }
}
