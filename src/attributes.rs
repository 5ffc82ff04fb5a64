//! An entry's attribute map: case-insensitive names, multi-valued, ordered.

use std::fmt;

use base64::Engine;
use indexmap::IndexMap;
use unicase::UniCase;


/// A single attribute value.
///
/// Directory values are octet strings; most are UTF-8 text, some (such as
/// `objectSid`) are binary.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AttributeValue(Vec<u8>);
impl AttributeValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The value as text, or `None` if it is binary.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    pub fn is_binary(&self) -> bool {
        self.as_str().is_none()
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }
}
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "{}", self.to_base64()),
        }
    }
}
impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(text) => write!(f, "{:?}", text),
            None => write!(f, "b64:{}", self.to_base64()),
        }
    }
}
impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self { Self(value.as_bytes().to_vec()) }
}
impl From<String> for AttributeValue {
    fn from(value: String) -> Self { Self(value.into_bytes()) }
}
impl From<&String> for AttributeValue {
    fn from(value: &String) -> Self { Self(value.as_bytes().to_vec()) }
}
impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self { Self(value) }
}
impl From<&[u8]> for AttributeValue {
    fn from(value: &[u8]) -> Self { Self(value.to_vec()) }
}
impl AsRef<[u8]> for AttributeValue {
    fn as_ref(&self) -> &[u8] { &self.0 }
}
impl PartialEq<str> for AttributeValue {
    fn eq(&self, other: &str) -> bool { self.0 == other.as_bytes() }
}
impl PartialEq<&str> for AttributeValue {
    fn eq(&self, other: &&str) -> bool { self.0 == other.as_bytes() }
}


/// The values handed to [`AttributeStore::set`]. A single value becomes a
/// one-element list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValueList(pub Vec<AttributeValue>);
impl From<&str> for ValueList {
    fn from(value: &str) -> Self { Self(vec![value.into()]) }
}
impl From<String> for ValueList {
    fn from(value: String) -> Self { Self(vec![value.into()]) }
}
impl From<AttributeValue> for ValueList {
    fn from(value: AttributeValue) -> Self { Self(vec![value]) }
}
impl From<Vec<AttributeValue>> for ValueList {
    fn from(value: Vec<AttributeValue>) -> Self { Self(value) }
}
impl From<&[AttributeValue]> for ValueList {
    fn from(value: &[AttributeValue]) -> Self { Self(value.to_vec()) }
}
impl From<Vec<&str>> for ValueList {
    fn from(value: Vec<&str>) -> Self { Self(value.into_iter().map(AttributeValue::from).collect()) }
}
impl From<Vec<String>> for ValueList {
    fn from(value: Vec<String>) -> Self { Self(value.into_iter().map(AttributeValue::from).collect()) }
}
impl From<&[&str]> for ValueList {
    fn from(value: &[&str]) -> Self { Self(value.iter().copied().map(AttributeValue::from).collect()) }
}
impl<const N: usize> From<[&str; N]> for ValueList {
    fn from(value: [&str; N]) -> Self { Self(value.into_iter().map(AttributeValue::from).collect()) }
}


/// What [`AttributeStore::get_single`] returns: the lone value if there is
/// exactly one, otherwise the (empty or multi-valued) list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Unwrapped<'a> {
    Empty,
    One(&'a AttributeValue),
    Many(&'a [AttributeValue]),
}
impl<'a> Unwrapped<'a> {
    pub fn from_values(values: &'a [AttributeValue]) -> Self {
        match values {
            [] => Self::Empty,
            [one] => Self::One(one),
            many => Self::Many(many),
        }
    }

    /// The single value as text; `None` for empty lists, lists of several
    /// values and binary values.
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Self::One(value) => value.as_str(),
            _ => None,
        }
    }

    pub fn single(&self) -> Option<&'a AttributeValue> {
        match *self {
            Self::One(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}


static NO_VALUES: &[AttributeValue] = &[];

fn key(name: &str) -> UniCase<String> {
    UniCase::new(name.to_owned())
}


/// A bag of named, multi-valued attributes.
///
/// Names compare case-insensitively but keep the spelling they were first
/// stored with; iteration follows insertion order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributeStore {
    attributes: IndexMap<UniCase<String>, Vec<AttributeValue>>,
}
impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All values of `name`; empty if the attribute is absent.
    pub fn get(&self, name: &str) -> &[AttributeValue] {
        self.attributes.get(&key(name))
            .map(|values| values.as_slice())
            .unwrap_or(NO_VALUES)
    }

    /// Like [`get`](Self::get), but distinguishes "absent" from "present and empty".
    pub fn get_present(&self, name: &str) -> Option<&[AttributeValue]> {
        self.attributes.get(&key(name))
            .map(|values| values.as_slice())
    }

    pub fn get_single(&self, name: &str) -> Unwrapped<'_> {
        Unwrapped::from_values(self.get(name))
    }

    /// Replaces all values of `name`.
    pub fn set<V: Into<ValueList>>(&mut self, name: &str, values: V) {
        let ValueList(values) = values.into();
        self.attributes.insert(key(name), values);
    }

    /// Appends a value to `name`, creating the attribute if needed.
    pub fn push<V: Into<AttributeValue>>(&mut self, name: &str, value: V) {
        self.materialize(name).push(value.into());
    }

    /// Returns the values of `name` for modification, inserting an empty
    /// list first if the attribute is absent.
    ///
    /// The inserted key shows up in [`names`](Self::names) from then on.
    pub fn materialize(&mut self, name: &str) -> &mut Vec<AttributeValue> {
        self.attributes.entry(key(name))
            .or_default()
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<AttributeValue>> {
        self.attributes.shift_remove(&key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(&key(name))
    }

    /// Names of all attributes currently present, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys()
            .map(|name| name.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AttributeValue])> {
        self.attributes.iter()
            .map(|(name, values)| (name.as_ref(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
impl<N: AsRef<str>, V: Into<ValueList>> FromIterator<(N, V)> for AttributeStore {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut store = Self::new();
        for (name, values) in iter {
            store.set(name.as_ref(), values);
        }
        store
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AttributeStore {
        AttributeStore::from_iter([
            ("givenName", ValueList::from("John")),
            ("objectClass", ValueList::from(["top", "person", "user"])),
            ("description", ValueList::default()),
        ])
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let store = sample();
        assert_eq!(store.get("givenname"), [AttributeValue::from("John")]);
        assert_eq!(store.get("GIVENNAME"), store.get("givenName"));
        assert!(store.contains("OBJECTCLASS"));
    }

    #[test]
    fn test_absent_is_empty() {
        let store = sample();
        assert!(store.get("sn").is_empty());
        assert_eq!(store.get_present("sn"), None);
        assert!(!store.contains("sn"));
        assert_eq!(store.names().count(), 3);
    }

    #[test]
    fn test_get_single() {
        let store = sample();
        assert_eq!(store.get_single("givenname").as_str(), Some("John"));
        assert_eq!(store.get_single("description"), Unwrapped::Empty);
        assert_eq!(store.get_single("sn"), Unwrapped::Empty);
        match store.get_single("objectclass") {
            Unwrapped::Many(values) => assert_eq!(values.len(), 3),
            other => panic!("expected several values, got {:?}", other),
        }
    }

    #[test]
    fn test_set_replaces_and_keeps_spelling() {
        let mut store = sample();
        store.set("GIVENNAME", "Jane");
        assert_eq!(store.get("givenName"), [AttributeValue::from("Jane")]);
        assert_eq!(store.names().next(), Some("givenName"));

        store.set("sn", vec!["Doe", "Roe"]);
        assert_eq!(store.get("sn").len(), 2);
    }

    #[test]
    fn test_materialize() {
        let mut store = sample();
        assert!(store.materialize("member").is_empty());
        assert!(store.contains("member"));
        assert_eq!(store.names().last(), Some("member"));

        store.push("member", "cn=x,dc=example,dc=com");
        assert_eq!(store.get("member").len(), 1);
    }

    #[test]
    fn test_binary_values() {
        let value = AttributeValue::from(vec![0xFFu8, 0x00, 0x10]);
        assert!(value.is_binary());
        assert_eq!(value.to_string(), "/wAQ");
        assert_eq!(AttributeValue::from("plain").to_string(), "plain");
        assert!(AttributeValue::from("plain") == "plain");
    }
}
