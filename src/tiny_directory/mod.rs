//! An in-memory directory service.
//!
//! Behaves like a small Active Directory for the operations the entry layer
//! uses, including the server-maintained attributes (`objectCategory`,
//! `whenCreated`, `whenChanged`, `memberOf`).

pub mod dn;


use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::attributes::{AttributeStore, AttributeValue};
use crate::changes::{ModifyKind, ModifyOperation};
use crate::directory::{Directory, DirectoryEntry, SearchScope};
use crate::error::{result_code, DirectoryError};
use crate::filter::Filter;
use crate::ldif::parse_ldif;
use crate::tiny_directory::dn::{dn_to_rdns, first_rdn_value, is_within, normalize_dn, Rdn};


const GENERALIZED_TIME_FORMAT: &str = "%Y%m%d%H%M%S.0Z";

/// Accepted on writes, never stored or returned.
const WRITE_ONLY_ATTRIBUTES: [&str; 1] = ["unicodePwd"];

/// Maintained by the directory; client writes are ignored.
const SYSTEM_ATTRIBUTES: [&str; 4] = ["distinguishedName", "memberOf", "whenCreated", "whenChanged"];


#[derive(Clone, Debug, Default)]
pub struct TinyDirectory {
    default_base: String,
    entries: IndexMap<String, DirectoryEntry>,
    last_error: Option<DirectoryError>,
}
impl TinyDirectory {
    pub fn new<S: Into<String>>(default_base: S) -> Self {
        Self {
            default_base: default_base.into(),
            entries: IndexMap::new(),
            last_error: None,
        }
    }

    /// A directory holding the records of `ldif`.
    pub fn from_ldif<S: Into<String>>(default_base: S, ldif: &str) -> Self {
        let mut directory = Self::new(default_base);
        for entry in parse_ldif(ldif) {
            directory.store(entry);
        }
        directory.sync_member_of();
        directory
    }

    /// Stores `entry` as given, bypassing the checks of [`Directory::add`].
    ///
    /// Returns `false` if the DN cannot be parsed.
    pub fn insert(&mut self, entry: DirectoryEntry) -> bool {
        let stored = self.store(entry);
        self.sync_member_of();
        stored
    }

    pub fn get(&self, dn: &str) -> Option<&DirectoryEntry> {
        let key = normalize_dn(dn)?;
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn store(&mut self, entry: DirectoryEntry) -> bool {
        let Some(key) = normalize_dn(entry.dn()) else {
            warn!(dn = entry.dn(), "not storing entry with invalid DN");
            return false;
        };
        self.entries.insert(key, entry);
        true
    }

    fn record<T>(&mut self, result: Result<T, DirectoryError>) -> Result<T, DirectoryError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                debug!(code = e.code, message = %e.message, "operation failed");
                self.last_error = Some(e.clone());
            },
        }
        result
    }

    /// Whether an entry exists at or below `rdns`.
    fn exists_or_glue(&self, rdns: &[Rdn]) -> bool {
        self.entries.values()
            .filter_map(|entry| dn_to_rdns(entry.dn()))
            .any(|entry_rdns| is_within(&entry_rdns, rdns))
    }

    fn parent_exists(&self, parent_rdns: &[Rdn]) -> bool {
        if parent_rdns.is_empty() || self.exists_or_glue(parent_rdns) {
            return true;
        }
        // the naming context itself need not be stored
        dn_to_rdns(&self.default_base)
            .is_some_and(|base_rdns| is_within(&base_rdns, parent_rdns))
    }

    fn default_object_category(&self, object_classes: &[AttributeValue]) -> String {
        let has_class = |name: &str| object_classes.iter()
            .any(|class| class.as_str().is_some_and(|c| c.eq_ignore_ascii_case(name)));
        let category = if has_class("group") {
            "Group".to_owned()
        } else if has_class("user") || has_class("person") {
            "Person".to_owned()
        } else {
            object_classes.last()
                .map(|class| class.to_string_lossy())
                .unwrap_or_else(|| "Top".to_owned())
        };
        format!("CN={},CN=Schema,CN=Configuration,{}", category, self.default_base)
    }

    /// Recomputes every `memberOf` from the `member` values of all groups.
    fn sync_member_of(&mut self) {
        let mut backlinks: HashMap<String, Vec<AttributeValue>> = HashMap::new();
        for group in self.entries.values() {
            for member in group.values_for("member") {
                let Some(member_key) = dn_key(member) else { continue };
                backlinks.entry(member_key)
                    .or_default()
                    .push(AttributeValue::from(group.dn()));
            }
        }
        for (key, entry) in self.entries.iter_mut() {
            match backlinks.remove(key) {
                Some(groups) => entry.attributes.set("memberOf", groups),
                None => {
                    entry.attributes.remove("memberOf");
                },
            }
        }
    }

    fn search_entries(&self, base: &str, scope: SearchScope, filter: &Filter) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let resolved = filter.resolve()
            .map_err(|e| DirectoryError::new(result_code::FILTER_ERROR, e.to_string()))?;
        let base_rdns = dn_to_rdns(base)
            .ok_or_else(|| invalid_dn(base))?;
        let base_found = match scope {
            SearchScope::Base => normalize_dn(base).is_some_and(|key| self.entries.contains_key(&key)),
            SearchScope::OneLevel | SearchScope::Subtree => base_rdns.is_empty() || self.exists_or_glue(&base_rdns),
        };
        if !base_found {
            return Err(no_such_object(base));
        }

        let mut found = Vec::new();
        for entry in self.entries.values() {
            let Some(rdns) = dn_to_rdns(entry.dn()) else { continue };
            let depth_ok = match scope {
                SearchScope::Base => rdns.len() == base_rdns.len(),
                SearchScope::OneLevel => rdns.len() == base_rdns.len() + 1,
                SearchScope::Subtree => true,
            };
            if depth_ok && is_within(&rdns, &base_rdns) && matches_filter(entry, &resolved) {
                found.push(entry.clone());
            }
        }
        Ok(found)
    }

    fn add_entry(&mut self, dn: &str, attributes: &AttributeStore) -> Result<(), DirectoryError> {
        let rdns = dn_to_rdns(dn)
            .filter(|rdns| !rdns.is_empty())
            .ok_or_else(|| invalid_dn(dn))?;
        let key = normalize_dn(dn)
            .ok_or_else(|| invalid_dn(dn))?;
        if self.entries.contains_key(&key) {
            return Err(DirectoryError::new(
                result_code::ENTRY_ALREADY_EXISTS,
                format!("entryAlreadyExists: the entry {} already exists", dn),
            ));
        }
        if !self.parent_exists(&rdns[1..]) {
            return Err(DirectoryError::new(
                result_code::NO_SUCH_OBJECT,
                format!("noSuchObject: the parent of {} does not exist", dn),
            ));
        }
        let object_classes = attributes.get("objectClass");
        if object_classes.is_empty() {
            return Err(DirectoryError::new(
                result_code::OBJECT_CLASS_VIOLATION,
                "objectClassViolation: objectClass is required",
            ));
        }

        let mut stored = AttributeStore::new();
        for (name, values) in attributes.iter() {
            if values.is_empty() || is_write_only(name) || is_system(name) {
                continue;
            }
            stored.set(name, values);
        }
        if !stored.contains("objectCategory") {
            stored.set("objectCategory", self.default_object_category(object_classes));
        }
        let now = Utc::now().format(GENERALIZED_TIME_FORMAT).to_string();
        stored.set("whenCreated", now.as_str());
        stored.set("whenChanged", now);

        self.entries.insert(key, DirectoryEntry::new(dn, stored));
        self.sync_member_of();
        Ok(())
    }

    fn modify_entry(&mut self, dn: &str, operations: &[ModifyOperation]) -> Result<(), DirectoryError> {
        let key = normalize_dn(dn)
            .ok_or_else(|| invalid_dn(dn))?;
        let Some(existing) = self.entries.get(&key) else {
            return Err(no_such_object(dn));
        };

        // applied to a copy so a failing operation leaves the entry untouched
        let mut attributes = existing.attributes.clone();
        for operation in operations {
            let name = operation.attribute.as_str();
            if is_write_only(name) || is_system(name) {
                continue;
            }
            match operation.kind {
                ModifyKind::Add => {
                    let values = attributes.materialize(name);
                    for value in &operation.values {
                        if values.iter().any(|v| values_equal(v.as_bytes(), value.as_bytes())) {
                            return Err(DirectoryError::new(
                                result_code::ATTRIBUTE_OR_VALUE_EXISTS,
                                format!("attributeOrValueExists: {} already contains {}", name, value),
                            ));
                        }
                        values.push(value.clone());
                    }
                },
                ModifyKind::Replace => {
                    if operation.values.is_empty() {
                        attributes.remove(name);
                    } else {
                        attributes.set(name, operation.values.as_slice());
                    }
                },
                ModifyKind::Delete => {
                    if operation.values.is_empty() {
                        if attributes.remove(name).is_none() {
                            return Err(no_such_attribute(name));
                        }
                    } else {
                        let values = attributes.materialize(name);
                        for value in &operation.values {
                            let Some(position) = values.iter().position(|v| values_equal(v.as_bytes(), value.as_bytes())) else {
                                return Err(no_such_attribute(name));
                            };
                            values.remove(position);
                        }
                    }
                },
            }
        }

        let emptied: Vec<String> = attributes.iter()
            .filter(|(_, values)| values.is_empty())
            .map(|(name, _)| name.to_owned())
            .collect();
        for name in emptied {
            attributes.remove(&name);
        }
        if attributes.get("objectClass").is_empty() {
            return Err(DirectoryError::new(
                result_code::OBJECT_CLASS_VIOLATION,
                "objectClassViolation: objectClass cannot be removed",
            ));
        }
        attributes.set("whenChanged", Utc::now().format(GENERALIZED_TIME_FORMAT).to_string());

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.attributes = attributes;
        }
        self.sync_member_of();
        Ok(())
    }

    fn delete_entry(&mut self, dn: &str) -> Result<(), DirectoryError> {
        let rdns = dn_to_rdns(dn)
            .ok_or_else(|| invalid_dn(dn))?;
        let key = normalize_dn(dn)
            .ok_or_else(|| invalid_dn(dn))?;
        if !self.entries.contains_key(&key) {
            return Err(no_such_object(dn));
        }
        let has_children = self.entries.iter()
            .filter(|(other_key, _)| **other_key != key)
            .filter_map(|(_, entry)| dn_to_rdns(entry.dn()))
            .any(|entry_rdns| is_within(&entry_rdns, &rdns));
        if has_children {
            return Err(DirectoryError::new(
                result_code::NOT_ALLOWED_ON_NON_LEAF,
                format!("notAllowedOnNonLeaf: {} has subordinate entries", dn),
            ));
        }

        self.entries.shift_remove(&key);

        // drop the deleted entry from every group it belonged to
        for entry in self.entries.values_mut() {
            let members = entry.attributes.get("member");
            if !members.iter().any(|m| dn_key(m).as_deref() == Some(key.as_str())) {
                continue;
            }
            let remaining: Vec<AttributeValue> = members.iter()
                .filter(|m| dn_key(m).as_deref() != Some(key.as_str()))
                .cloned()
                .collect();
            if remaining.is_empty() {
                entry.attributes.remove("member");
            } else {
                entry.attributes.set("member", remaining);
            }
        }
        self.sync_member_of();
        Ok(())
    }
}

#[async_trait]
impl Directory for TinyDirectory {
    fn default_base(&self) -> &str {
        &self.default_base
    }

    async fn search(&mut self, base: &str, scope: SearchScope, filter: &Filter) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        debug!(base = %base, ?scope, filter = %filter, "searching");
        let result = self.search_entries(base, scope, filter);
        self.record(result)
    }

    async fn add(&mut self, dn: &str, attributes: &AttributeStore) -> Result<(), DirectoryError> {
        debug!(dn = %dn, "adding entry");
        let result = self.add_entry(dn, attributes);
        self.record(result)
    }

    async fn modify(&mut self, dn: &str, operations: &[ModifyOperation]) -> Result<(), DirectoryError> {
        debug!(dn = %dn, count = operations.len(), "modifying entry");
        let result = self.modify_entry(dn, operations);
        self.record(result)
    }

    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        debug!(dn = %dn, "deleting entry");
        let result = self.delete_entry(dn);
        self.record(result)
    }

    fn last_operation_error(&self) -> Option<&DirectoryError> {
        self.last_error.as_ref()
    }
}


fn invalid_dn(dn: &str) -> DirectoryError {
    DirectoryError::new(result_code::INVALID_DN_SYNTAX, format!("invalidDNSyntax: {:?}", dn))
}

fn no_such_object(dn: &str) -> DirectoryError {
    DirectoryError::new(result_code::NO_SUCH_OBJECT, format!("noSuchObject: {} does not exist", dn))
}

fn no_such_attribute(name: &str) -> DirectoryError {
    DirectoryError::new(result_code::NO_SUCH_ATTRIBUTE, format!("noSuchAttribute: {}", name))
}

fn is_write_only(name: &str) -> bool {
    WRITE_ONLY_ATTRIBUTES.iter().any(|a| a.eq_ignore_ascii_case(name))
}

fn is_system(name: &str) -> bool {
    SYSTEM_ATTRIBUTES.iter().any(|a| a.eq_ignore_ascii_case(name))
}

fn dn_key(value: &AttributeValue) -> Option<String> {
    value.as_str().and_then(normalize_dn)
}

fn lowercase(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_lowercase()
}

/// Text compares case-insensitively, binary values byte for byte.
fn values_equal(a: &[u8], b: &[u8]) -> bool {
    match (std::str::from_utf8(a), std::str::from_utf8(b)) {
        (Ok(a_text), Ok(b_text)) => {
            if a_text.to_lowercase() == b_text.to_lowercase() {
                return true;
            }
            // DNs that differ only in spacing or escaping
            if a_text.contains('=') && b_text.contains('=') {
                if let (Some(a_dn), Some(b_dn)) = (normalize_dn(a_text), normalize_dn(b_text)) {
                    return a_dn == b_dn;
                }
            }
            false
        },
        _ => a == b,
    }
}

fn compare_values(a: &[u8], b: &[u8]) -> Ordering {
    let as_number = |bytes: &[u8]| std::str::from_utf8(bytes).ok()
        .and_then(|text| text.trim().parse::<i64>().ok());
    match (as_number(a), as_number(b)) {
        (Some(a_number), Some(b_number)) => a_number.cmp(&b_number),
        _ => lowercase(a).cmp(&lowercase(b)),
    }
}

fn substrings_match(value: &[u8], initial: Option<&[u8]>, any: &[Vec<u8>], last: Option<&[u8]>) -> bool {
    let Ok(text) = std::str::from_utf8(value) else { return false };
    let text = text.to_lowercase();
    let mut rest = text.as_str();
    if let Some(initial) = initial {
        match rest.strip_prefix(lowercase(initial).as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for piece in any {
        let piece = lowercase(piece);
        match rest.find(piece.as_str()) {
            Some(position) => rest = &rest[position + piece.len()..],
            None => return false,
        }
    }
    match last {
        Some(last) => rest.ends_with(lowercase(last).as_str()),
        None => true,
    }
}

fn candidate_values<'a>(entry: &'a DirectoryEntry, attribute: &str) -> Cow<'a, [AttributeValue]> {
    if attribute.eq_ignore_ascii_case("distinguishedName") {
        Cow::Owned(vec![AttributeValue::from(entry.dn())])
    } else {
        Cow::Borrowed(entry.values_for(attribute))
    }
}

fn equality_matches(attribute: &str, stored: &AttributeValue, wanted: &[u8]) -> bool {
    if values_equal(stored.as_bytes(), wanted) {
        return true;
    }
    // `(objectCategory=person)` matches the full category DN
    attribute.eq_ignore_ascii_case("objectCategory")
        && stored.as_str()
            .and_then(first_rdn_value)
            .is_some_and(|name| values_equal(name.as_bytes(), wanted))
}

fn matches_filter(entry: &DirectoryEntry, filter: &Filter) -> bool {
    match filter {
        Filter::And(inner) => inner.iter().all(|f| matches_filter(entry, f)),
        Filter::Or(inner) => inner.iter().any(|f| matches_filter(entry, f)),
        Filter::Not(inner) => !matches_filter(entry, inner),
        Filter::Equality { attribute, value } => candidate_values(entry, attribute).iter()
            .any(|stored| equality_matches(attribute, stored, value)),
        Filter::Substrings { attribute, initial, any, last } => candidate_values(entry, attribute).iter()
            .any(|stored| substrings_match(stored.as_bytes(), initial.as_deref(), any, last.as_deref())),
        Filter::GreaterOrEqual { attribute, value } => candidate_values(entry, attribute).iter()
            .any(|stored| compare_values(stored.as_bytes(), value) != Ordering::Less),
        Filter::LessOrEqual { attribute, value } => candidate_values(entry, attribute).iter()
            .any(|stored| compare_values(stored.as_bytes(), value) != Ordering::Greater),
        Filter::Present { attribute } => !candidate_values(entry, attribute).is_empty(),
        // resolved before matching
        Filter::Raw(_) => false,
    }
}
