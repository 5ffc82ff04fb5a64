//! Conversion between Active Directory's binary attribute encodings and their
//! textual forms.
//!
//! See [MS-DTYP] for the security identifier and GUID layouts and [MS-ADTS]
//! for `userAccountControl`, `unicodePwd` and the time formats.
//!
//! [MS-DTYP]: https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-dtyp
//! [MS-ADTS]: https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-adts

pub mod account_control;
pub mod guid;
pub mod password;
pub mod sid;
pub mod timestamp;


use thiserror::Error;

pub use crate::codec::account_control::{
    decode_account_control, encode_account_control, AccountControlFlag,
};
pub use crate::codec::guid::{decode_guid, encode_guid, Guid};
pub use crate::codec::password::encode_password;
pub use crate::codec::sid::{decode_sid, encode_sid, SecurityIdentifier};
pub use crate::codec::timestamp::{decode_ticks, parse_generalized_time};


#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum DecodeError {
    #[error("value has incorrect length (expected {expected} bytes, got {actual})")]
    WrongLength { expected: usize, actual: usize },

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("value is not a valid number")]
    InvalidNumber,

    #[error("value is out of range")]
    OutOfRange,

    #[error("unknown account control flag {0:?}")]
    UnknownFlag(String),
}


/// A value that can be decoded from its Active Directory binary form.
pub trait MsDecodable {
    fn try_decode(slice: &[u8]) -> Result<Self, DecodeError>
        where Self : Sized;
}

/// A value that can be encoded into its Active Directory binary form.
pub trait MsEncodable {
    fn to_ms_bytes(&self) -> Vec<u8>;
}


fn check_length(slice: &[u8], expected: usize) -> Result<(), DecodeError> {
    if slice.len() != expected {
        Err(DecodeError::WrongLength { expected, actual: slice.len() })
    } else {
        Ok(())
    }
}
