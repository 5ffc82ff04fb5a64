//! ActiveRecord-style access to Active Directory users and groups.
//!
//! Entries are found through an [`EntryClass`] (or the typed [`UserClass`]
//! and [`GroupClass`]), changed in memory and written back with
//! [`Entry::save`], which sends only the attributes that changed. All
//! directory access goes through the [`Directory`] trait, implemented for a
//! live server by [`LdapConnection`] and in memory by [`TinyDirectory`].

pub mod attributes;
pub mod changes;
pub mod codec;
pub mod config;
mod derived;
pub mod directory;
pub mod entry;
pub mod error;
pub mod filter;
pub mod group;
pub mod ldap;
pub mod ldif;
pub mod tiny_directory;
pub mod user;

#[cfg(test)]
mod test_fixtures;


pub use crate::attributes::{AttributeStore, AttributeValue, Unwrapped};
pub use crate::changes::{Change, Changes, ModifyKind, ModifyOperation};
pub use crate::config::Config;
pub use crate::directory::{Directory, DirectoryEntry, SearchScope};
pub use crate::entry::{Criteria, Entry, EntryClass, FinderResult};
pub use crate::error::{DirectoryError, Error, Result};
pub use crate::filter::Filter;
pub use crate::group::{Group, GroupClass};
pub use crate::ldap::{establish_connection, LdapConnection};
pub use crate::tiny_directory::TinyDirectory;
pub use crate::user::{paired_classes, User, UserClass};
