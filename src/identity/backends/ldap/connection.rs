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

//! Directory connection adapter.
//!
//! One logical connection per logical call. The adapter owns the value
//! encoding between entity attribute values and the directory's native
//! string representation (`TRUE`/`FALSE` booleans, decimal integers) and
//! redacts password-bearing attributes before any diagnostic logging.

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, SearchEntry};
use secrecy::ExposeSecret;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

pub use ldap3::Scope;

use crate::config::LdapSection;
use crate::identity::backends::error::{DirectoryError, dir_err};

/// Attributes whose values never reach the logs.
const SECRET_ATTRIBUTES: [&str; 1] = ["userPassword"];

/// A directory attribute value in its decoded form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DirValue {
    Text(String),
    Bool(bool),
    Int(i64),
}

impl DirValue {
    /// Encode the value into the directory's native string representation.
    pub fn to_directory(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bool(true) => "TRUE".into(),
            Self::Bool(false) => "FALSE".into(),
            Self::Int(i) => i.to_string(),
        }
    }

    /// Decode a raw directory string: the boolean literals and decimal
    /// integers are recognized, everything else passes through as text.
    pub fn from_directory(raw: &str) -> Self {
        match raw {
            "TRUE" => Self::Bool(true),
            "FALSE" => Self::Bool(false),
            _ => raw
                .parse::<i64>()
                .map_or_else(|_| Self::Text(raw.to_string()), Self::Int),
        }
    }

    /// Build a value from an opaque JSON claim, when it is representable.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => Some(
                n.as_i64()
                    .map_or_else(|| Self::Text(n.to_string()), Self::Int),
            ),
            other => Some(Self::Text(other.to_string())),
        }
    }

    /// Render the value for an entity text field.
    pub fn to_text(&self) -> String {
        self.to_directory()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// A decoded directory entry.
#[derive(Clone, Debug)]
pub struct DirEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<DirValue>>,
}

impl DirEntry {
    pub fn first(&self, attr: &str) -> Option<&DirValue> {
        self.attrs.get(attr).and_then(|values| values.first())
    }

    pub fn first_text(&self, attr: &str) -> Option<String> {
        self.first(attr).map(DirValue::to_text)
    }

    pub fn first_bool(&self, attr: &str) -> Option<bool> {
        self.first(attr).and_then(DirValue::as_bool)
    }

    /// All values of the attribute rendered as text.
    pub fn texts(&self, attr: &str) -> Vec<String> {
        self.attrs
            .get(attr)
            .map(|values| values.iter().map(DirValue::to_text).collect())
            .unwrap_or_default()
    }
}

/// A single attribute modification.
#[derive(Clone, Debug)]
pub enum DirMod {
    Add(String, Vec<DirValue>),
    Replace(String, Vec<DirValue>),
    /// An empty value list removes the attribute entirely.
    Delete(String, Vec<DirValue>),
}

impl DirMod {
    fn attr(&self) -> &str {
        match self {
            Self::Add(attr, _) | Self::Replace(attr, _) | Self::Delete(attr, _) => attr,
        }
    }
}

/// A bound connection to the directory server.
pub struct DirectoryConnection {
    ldap: Ldap,
}

impl DirectoryConnection {
    /// Connect and bind with the given credentials, falling back to the
    /// configured administrative identity, or to an anonymous bind.
    pub async fn connect(
        conf: &LdapSection,
        bind_dn: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(conf.timeout))
            .set_starttls(conf.use_tls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &conf.url)
            .await
            .map_err(|e| dir_err(e, "connecting to the directory"))?;

        // Drive the connection until it is unbound or dropped.
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!("directory connection terminated: {}", e);
            }
        });

        let configured_password = conf.password.as_ref().map(|p| p.expose_secret().to_string());
        let dn = bind_dn.or(conf.user.as_deref()).unwrap_or("");
        let pw = password.or(configured_password.as_deref()).unwrap_or("");

        debug!("directory bind: dn={}", dn);
        ldap.simple_bind(dn, pw)
            .await
            .map_err(|e| dir_err(e, "binding to the directory"))?
            .success()
            .map_err(|e| dir_err(e, "binding to the directory"))?;

        Ok(Self { ldap })
    }

    /// Add an entry. Values are encoded; the operation is logged with
    /// secrets redacted.
    pub async fn add(
        &mut self,
        dn: &str,
        attrs: Vec<(String, Vec<DirValue>)>,
    ) -> Result<(), LdapError> {
        debug!("directory add: dn={}, attrs={}", dn, sanitized(&attrs));
        let encoded: Vec<(String, HashSet<String>)> = attrs
            .into_iter()
            .map(|(attr, values)| {
                (
                    attr,
                    values.iter().map(DirValue::to_directory).collect(),
                )
            })
            .collect();
        self.ldap.add(dn, encoded).await?.success()?;
        Ok(())
    }

    /// Search under `base` and decode the resulting entries.
    pub async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
    ) -> Result<Vec<DirEntry>, LdapError> {
        debug!("directory search: base={}, filter={}", base, filter);
        let (entries, _res) = self
            .ldap
            .search(base, scope, filter, vec!["*"])
            .await?
            .success()?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                DirEntry {
                    dn: entry.dn,
                    attrs: entry
                        .attrs
                        .into_iter()
                        .map(|(attr, values)| {
                            (
                                attr,
                                values
                                    .iter()
                                    .map(|v| DirValue::from_directory(v))
                                    .collect(),
                            )
                        })
                        .collect(),
                }
            })
            .collect())
    }

    /// Apply attribute modifications to an entry.
    pub async fn modify(&mut self, dn: &str, mods: Vec<DirMod>) -> Result<(), LdapError> {
        debug!("directory modify: dn={}, mods={}", dn, sanitized_mods(&mods));
        let encoded: Vec<Mod<String>> = mods
            .into_iter()
            .map(|m| match m {
                DirMod::Add(attr, values) => {
                    Mod::Add(attr, values.iter().map(DirValue::to_directory).collect())
                }
                DirMod::Replace(attr, values) => {
                    Mod::Replace(attr, values.iter().map(DirValue::to_directory).collect())
                }
                DirMod::Delete(attr, values) => {
                    Mod::Delete(attr, values.iter().map(DirValue::to_directory).collect())
                }
            })
            .collect();
        self.ldap.modify(dn, encoded).await?.success()?;
        Ok(())
    }

    /// Delete an entry.
    pub async fn delete(&mut self, dn: &str) -> Result<(), LdapError> {
        debug!("directory delete: dn={}", dn);
        self.ldap.delete(dn).await?.success()?;
        Ok(())
    }

    pub async fn unbind(mut self) {
        let _ = self.ldap.unbind().await;
    }
}

fn is_secret(attr: &str) -> bool {
    SECRET_ATTRIBUTES
        .iter()
        .any(|secret| secret.eq_ignore_ascii_case(attr))
}

fn sanitized(attrs: &[(String, Vec<DirValue>)]) -> String {
    attrs
        .iter()
        .map(|(attr, values)| {
            if is_secret(attr) {
                format!("{}=****", attr)
            } else {
                format!(
                    "{}={:?}",
                    attr,
                    values.iter().map(DirValue::to_directory).collect::<Vec<_>>()
                )
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn sanitized_mods(mods: &[DirMod]) -> String {
    mods.iter()
        .map(|m| {
            let attr = m.attr();
            if is_secret(attr) {
                format!("{}=****", attr)
            } else {
                format!("{:?}", m)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_encoding() {
        assert_eq!(DirValue::Bool(true).to_directory(), "TRUE");
        assert_eq!(DirValue::Bool(false).to_directory(), "FALSE");
        assert_eq!(DirValue::Int(42).to_directory(), "42");
        assert_eq!(DirValue::Text("foo".into()).to_directory(), "foo");
    }

    #[test]
    fn test_value_decoding() {
        assert_eq!(DirValue::from_directory("TRUE"), DirValue::Bool(true));
        assert_eq!(DirValue::from_directory("FALSE"), DirValue::Bool(false));
        assert_eq!(DirValue::from_directory("42"), DirValue::Int(42));
        assert_eq!(
            DirValue::from_directory("true"),
            DirValue::Text("true".into()),
            "only the uppercase literals are booleans"
        );
        assert_eq!(
            DirValue::from_directory("cn=admin"),
            DirValue::Text("cn=admin".into())
        );
    }

    #[test]
    fn test_value_roundtrip() {
        for value in [
            DirValue::Bool(true),
            DirValue::Bool(false),
            DirValue::Int(-17),
            DirValue::Text("ou=Users".into()),
        ] {
            assert_eq!(DirValue::from_directory(&value.to_directory()), value);
        }
    }

    #[test]
    fn test_json_values() {
        use serde_json::json;
        assert_eq!(
            DirValue::from_json(&json!("x")),
            Some(DirValue::Text("x".into()))
        );
        assert_eq!(DirValue::from_json(&json!(true)), Some(DirValue::Bool(true)));
        assert_eq!(DirValue::from_json(&json!(7)), Some(DirValue::Int(7)));
        assert_eq!(DirValue::from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_secret_redaction() {
        let attrs = vec![
            ("cn".to_string(), vec![DirValue::Text("admin".into())]),
            (
                "userPassword".to_string(),
                vec![DirValue::Text("hunter2".into())],
            ),
        ];
        let rendered = sanitized(&attrs);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("userPassword=****"));
    }
}
