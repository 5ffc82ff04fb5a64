use std::io;

use thiserror::Error;

use crate::codec::DecodeError;


/// Result codes (RFC 4511 §4.1.9) that the crate inspects or produces.
pub mod result_code {
    pub const SUCCESS: u32 = 0;
    pub const NO_SUCH_ATTRIBUTE: u32 = 16;
    pub const ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
    pub const NO_SUCH_OBJECT: u32 = 32;
    pub const INVALID_DN_SYNTAX: u32 = 34;
    pub const OBJECT_CLASS_VIOLATION: u32 = 65;
    pub const NOT_ALLOWED_ON_NON_LEAF: u32 = 66;
    pub const ENTRY_ALREADY_EXISTS: u32 = 68;
    pub const OTHER: u32 = 80;
    pub const FILTER_ERROR: u32 = 87;
}


/// A failed directory round-trip, as reported by the directory service.
///
/// Failures that never produced a result code (connection loss, protocol
/// errors) are reported with [`result_code::OTHER`].
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
#[error("directory operation failed with code {code}: {message}")]
pub struct DirectoryError {
    pub message: String,
    pub code: u32,
}
impl DirectoryError {
    pub fn new<M: Into<String>>(code: u32, message: M) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn is_no_such_object(&self) -> bool {
        self.code == result_code::NO_SUCH_OBJECT
    }

    pub fn is_already_exists(&self) -> bool {
        self.code == result_code::ENTRY_ALREADY_EXISTS
    }
}
impl From<ldap3::LdapError> for DirectoryError {
    fn from(value: ldap3::LdapError) -> Self {
        match value {
            ldap3::LdapError::LdapResult { result } => Self::new(result.rc, result.text),
            other => Self::new(result_code::OTHER, other.to_string()),
        }
    }
}


#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to decode attribute: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("{attribute} is not set on {dn}")]
    MissingAttribute { dn: String, attribute: String },

    #[error("{0:?} is not a finder")]
    UnknownFinder(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}


pub type Result<T> = std::result::Result<T, Error>;
