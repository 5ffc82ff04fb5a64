use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry};
use tracing::{debug, info, warn};

use crate::attributes::AttributeStore;
use crate::changes::{ModifyKind, ModifyOperation};
use crate::config::ConnectionConfig;
use crate::directory::{Directory, DirectoryEntry, SearchScope};
use crate::error::{result_code, DirectoryError};
use crate::filter::Filter;


const ALL_USER_ATTRIBUTES: &str = "*";


#[derive(Debug)]
pub struct LdapConnection {
    ldap: ldap3::Ldap,
    default_base: String,
    last_error: Option<DirectoryError>,
}
impl LdapConnection {
    pub fn new(ldap: ldap3::Ldap, default_base: String) -> Self {
        Self {
            ldap,
            default_base,
            last_error: None,
        }
    }

    fn record<T>(&mut self, result: Result<T, DirectoryError>) -> Result<T, DirectoryError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => self.last_error = Some(e.clone()),
        }
        result
    }
}

fn check_result(result: ldap3::LdapResult) -> Result<(), DirectoryError> {
    if result.rc == result_code::SUCCESS {
        Ok(())
    } else {
        Err(DirectoryError::new(result.rc, result.text))
    }
}

/// Reads `defaultNamingContext` from the RootDSE.
pub async fn get_default_naming_context(ldap: &mut ldap3::Ldap) -> Result<String, DirectoryError> {
    let (rootdse_entries, _) = ldap.search(
        "",
        Scope::Base,
        "(objectClass=*)",
        vec!["defaultNamingContext"],
    )
        .await?
        .success()?;
    for rootdse_raw_entry in rootdse_entries {
        let rootdse_entry = SearchEntry::construct(rootdse_raw_entry);
        let naming_context = rootdse_entry.attrs
            .get("defaultNamingContext")
            .and_then(|values| values.first());
        if let Some(nc) = naming_context {
            return Ok(nc.clone());
        }
    }
    Err(DirectoryError::new(result_code::NO_SUCH_OBJECT, "RootDSE is missing defaultNamingContext"))
}

/// Connects and binds according to `config`.
///
/// Without a configured base, the server's default naming context is used.
pub async fn establish_connection(config: &ConnectionConfig) -> Result<LdapConnection, DirectoryError> {
    let settings = LdapConnSettings::new()
        .set_starttls(config.starttls);
    debug!(uri = %config.ldap_uri, starttls = config.starttls, "connecting to LDAP server");
    let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &config.ldap_uri)
        .await?;
    ldap3::drive!(conn);

    debug!(bind_dn = %config.bind_dn, "binding");
    let password = config.password.as_deref().unwrap_or("");
    let bind_result = ldap.simple_bind(&config.bind_dn, password).await?;
    check_result(bind_result)?;

    let default_base = match &config.base {
        Some(base) => base.clone(),
        None => get_default_naming_context(&mut ldap).await?,
    };
    info!(uri = %config.ldap_uri, base = %default_base, "connected to LDAP server");
    Ok(LdapConnection::new(ldap, default_base))
}

fn to_ldap_values(values: &[crate::attributes::AttributeValue]) -> HashSet<Vec<u8>> {
    values.iter()
        .map(|v| v.as_bytes().to_vec())
        .collect()
}

#[async_trait]
impl Directory for LdapConnection {
    fn default_base(&self) -> &str {
        &self.default_base
    }

    async fn search(&mut self, base: &str, scope: SearchScope, filter: &Filter) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let filter_string = filter.to_string();
        debug!(base = %base, ?scope, filter = %filter_string, "searching");
        let ldap_result = self.ldap.search(
            base,
            scope.into(),
            &filter_string,
            vec![ALL_USER_ATTRIBUTES],
        ).await;
        let ldap_response = match ldap_result {
            Ok(lr) => lr,
            Err(e) => {
                warn!(base = %base, filter = %filter_string, error = %e, "search failed");
                return self.record(Err(e.into()));
            },
        };
        let (ldap_entries, _) = match ldap_response.success() {
            Ok(lrs) => lrs,
            Err(e) => {
                warn!(base = %base, filter = %filter_string, error = %e, "search was rejected");
                return self.record(Err(e.into()));
            },
        };
        let mut entries = Vec::with_capacity(ldap_entries.len());
        for ldap_entry in ldap_entries {
            let search_entry = SearchEntry::construct(ldap_entry);
            let mut attributes = AttributeStore::new();
            for (key, string_values) in search_entry.attrs {
                let all_values = attributes.materialize(&key);
                for string_value in string_values {
                    all_values.push(string_value.into());
                }
            }
            for (key, bytes_values) in search_entry.bin_attrs {
                let all_values = attributes.materialize(&key);
                for bytes_value in bytes_values {
                    all_values.push(bytes_value.into());
                }
            }
            entries.push(DirectoryEntry::new(search_entry.dn, attributes));
        }
        debug!(count = entries.len(), "search returned");
        self.record(Ok(entries))
    }

    async fn add(&mut self, dn: &str, attributes: &AttributeStore) -> Result<(), DirectoryError> {
        let ldap_attributes: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attributes.iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| (name.as_bytes().to_vec(), to_ldap_values(values)))
            .collect();
        debug!(dn = %dn, count = ldap_attributes.len(), "adding entry");
        let result = match self.ldap.add(dn, ldap_attributes).await {
            Ok(r) => check_result(r),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            warn!(dn = %dn, code = e.code, message = %e.message, "add failed");
        }
        self.record(result)
    }

    async fn modify(&mut self, dn: &str, operations: &[ModifyOperation]) -> Result<(), DirectoryError> {
        let mods: Vec<Mod<Vec<u8>>> = operations.iter()
            .map(|operation| {
                let attribute = operation.attribute.as_bytes().to_vec();
                let values = to_ldap_values(&operation.values);
                match operation.kind {
                    ModifyKind::Add => Mod::Add(attribute, values),
                    ModifyKind::Replace => Mod::Replace(attribute, values),
                    ModifyKind::Delete => Mod::Delete(attribute, values),
                }
            })
            .collect();
        debug!(dn = %dn, count = mods.len(), "modifying entry");
        let result = match self.ldap.modify(dn, mods).await {
            Ok(r) => check_result(r),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            warn!(dn = %dn, code = e.code, message = %e.message, "modify failed");
        }
        self.record(result)
    }

    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        debug!(dn = %dn, "deleting entry");
        let result = match self.ldap.delete(dn).await {
            Ok(r) => check_result(r),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            warn!(dn = %dn, code = e.code, message = %e.message, "delete failed");
        }
        self.record(result)
    }

    fn last_operation_error(&self) -> Option<&DirectoryError> {
        self.last_error.as_ref()
    }
}
