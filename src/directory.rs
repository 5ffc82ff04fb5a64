use async_trait::async_trait;
use unicase::UniCase;

use crate::attributes::{AttributeStore, AttributeValue};
use crate::changes::ModifyOperation;
use crate::error::DirectoryError;
use crate::filter::Filter;


/// A raw record returned by a directory search.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirectoryEntry {
    pub dn: UniCase<String>,
    pub attributes: AttributeStore,
}
impl DirectoryEntry {
    pub fn new<S: Into<String>>(dn: S, attributes: AttributeStore) -> Self {
        Self {
            dn: UniCase::new(dn.into()),
            attributes,
        }
    }

    pub fn dn(&self) -> &str {
        self.dn.as_ref()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.names()
    }

    pub fn values_for(&self, name: &str) -> &[AttributeValue] {
        self.attributes.get(name)
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SearchScope {
    /// Only the base object itself.
    Base,
    /// Immediate children of the base object.
    OneLevel,
    /// The base object and everything below it.
    #[default]
    Subtree,
}
impl From<SearchScope> for ldap3::Scope {
    fn from(value: SearchScope) -> Self {
        match value {
            SearchScope::Base => ldap3::Scope::Base,
            SearchScope::OneLevel => ldap3::Scope::OneLevel,
            SearchScope::Subtree => ldap3::Scope::Subtree,
        }
    }
}


/// The directory service the entry layer talks to.
///
/// Every call is exactly one round-trip; implementations neither cache nor
/// retry. A failed call is also remembered until the next call, see
/// [`last_operation_error`](Directory::last_operation_error).
#[async_trait]
pub trait Directory: Send {
    /// The base DN used when an entry class does not configure a tree base.
    fn default_base(&self) -> &str;

    async fn search(&mut self, base: &str, scope: SearchScope, filter: &Filter) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    async fn add(&mut self, dn: &str, attributes: &AttributeStore) -> Result<(), DirectoryError>;

    async fn modify(&mut self, dn: &str, operations: &[ModifyOperation]) -> Result<(), DirectoryError>;

    async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError>;

    /// The error of the most recent call, or `None` if it succeeded.
    fn last_operation_error(&self) -> Option<&DirectoryError>;
}
