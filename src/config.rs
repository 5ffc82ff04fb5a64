use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entry::EntryClass;
use crate::error::Result;
use crate::group::GroupClass;
use crate::user::{paired_classes, UserClass};


#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub user: ClassConfig,
    #[serde(default)]
    pub group: ClassConfig,
}
impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn user_class(&self) -> UserClass {
        self.classes().0
    }

    pub fn group_class(&self) -> GroupClass {
        self.classes().1
    }

    fn classes(&self) -> (UserClass, GroupClass) {
        paired_classes(
            self.user.apply(EntryClass::user()),
            self.group.apply(EntryClass::group()),
        )
    }
}


#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConnectionConfig {
    pub ldap_uri: String,
    /// Search base; the server's default naming context if unset.
    #[serde(default)]
    pub base: Option<String>,
    pub bind_dn: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub starttls: bool,
}


/// Overrides of a built-in class descriptor.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ClassConfig {
    #[serde(default)]
    pub tree_base: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub object_category: Option<String>,
}
impl ClassConfig {
    pub fn apply(&self, mut class: EntryClass) -> EntryClass {
        if let Some(tree_base) = &self.tree_base {
            class = class.with_tree_base(tree_base.clone());
        }
        if let Some(primary_key) = &self.primary_key {
            class = class.with_primary_key(primary_key.clone());
        }
        if let Some(object_category) = &self.object_category {
            class = class.with_object_category(object_category.clone());
        }
        class
    }
}
