use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::codec::{check_length, DecodeError, MsDecodable, MsEncodable};


const GUID_LENGTH: usize = 16;


/// A globally unique identifier (`objectGUID`).
///
/// Active Directory stores the first three groups little-endian.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Guid {
    uuid: Uuid,
}
impl Guid {
    pub fn as_uuid(&self) -> &Uuid {
        &self.uuid
    }
}
impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self { uuid }
    }
}
impl MsDecodable for Guid {
    fn try_decode(slice: &[u8]) -> Result<Self, DecodeError> {
        check_length(slice, GUID_LENGTH)?;
        let mut bytes = [0u8; GUID_LENGTH];
        bytes.copy_from_slice(slice);
        Ok(Self { uuid: Uuid::from_bytes_le(bytes) })
    }
}
impl MsEncodable for Guid {
    fn to_ms_bytes(&self) -> Vec<u8> {
        self.uuid.to_bytes_le().to_vec()
    }
}
impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid.hyphenated())
    }
}
impl FromStr for Guid {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(|uuid| Self { uuid })
            .map_err(|e| DecodeError::InvalidFormat(format!("not a GUID: {:?}: {}", s, e)))
    }
}


/// Decodes a binary `objectGUID` into the canonical lowercase text form.
pub fn decode_guid(bytes: &[u8]) -> Result<String, DecodeError> {
    Guid::try_decode(bytes)
        .map(|guid| guid.to_string())
}

/// Encodes a canonical GUID string into the binary `objectGUID` form.
pub fn encode_guid(guid: &str) -> Result<Vec<u8>, DecodeError> {
    guid.parse::<Guid>()
        .map(|guid| guid.to_ms_bytes())
}
