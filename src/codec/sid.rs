use std::fmt;
use std::str::FromStr;

use crate::codec::{check_length, DecodeError, MsDecodable, MsEncodable};


const HEADER_LENGTH: usize = 8;
const SUB_AUTHORITY_LENGTH: usize = 4;
const MAX_AUTHORITY: u64 = 0xFFFF_FFFF_FFFF;


/// A security identifier (`objectSid`).
///
/// Binary layout: `[revision: u8][count: u8][authority: u48 BE][sub-authority: u32 LE; count]`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SecurityIdentifier {
    pub revision: u8,
    pub authority: u64,
    pub sub_authorities: Vec<u32>,
}
impl SecurityIdentifier {
    /// The relative identifier, i.e. the last sub-authority.
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }

    /// Returns a copy of this SID with the relative identifier replaced.
    ///
    /// Used to derive a primary group's SID from a member's SID.
    pub fn with_rid(&self, rid: u32) -> Self {
        let mut sub_authorities = self.sub_authorities.clone();
        match sub_authorities.last_mut() {
            Some(last) => *last = rid,
            None => sub_authorities.push(rid),
        }
        Self {
            revision: self.revision,
            authority: self.authority,
            sub_authorities,
        }
    }
}
impl MsDecodable for SecurityIdentifier {
    fn try_decode(slice: &[u8]) -> Result<Self, DecodeError> {
        if slice.len() < HEADER_LENGTH {
            return Err(DecodeError::WrongLength { expected: HEADER_LENGTH, actual: slice.len() });
        }
        let revision = slice[0];
        let count = usize::from(slice[1]);
        check_length(slice, HEADER_LENGTH + SUB_AUTHORITY_LENGTH * count)?;

        let mut authority_bytes = [0u8; 8];
        authority_bytes[2..].copy_from_slice(&slice[2..HEADER_LENGTH]);
        let authority = u64::from_be_bytes(authority_bytes);

        let sub_authorities = slice[HEADER_LENGTH..]
            .chunks_exact(SUB_AUTHORITY_LENGTH)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }
}
impl MsEncodable for SecurityIdentifier {
    fn to_ms_bytes(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(HEADER_LENGTH + SUB_AUTHORITY_LENGTH * self.sub_authorities.len());
        ret.push(self.revision);
        // FromStr and try_decode both cap the count at 255
        ret.push(self.sub_authorities.len() as u8);
        ret.extend_from_slice(&self.authority.to_be_bytes()[2..]);
        for sub_authority in &self.sub_authorities {
            ret.extend_from_slice(&sub_authority.to_le_bytes());
        }
        ret
    }
}
impl fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub_authority in &self.sub_authorities {
            write!(f, "-{}", sub_authority)?;
        }
        Ok(())
    }
}
impl FromStr for SecurityIdentifier {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecodeError::InvalidFormat(format!("not a security identifier: {:?}", s));

        let mut pieces = s.split('-');
        if !pieces.next().is_some_and(|p| p.eq_ignore_ascii_case("S")) {
            return Err(invalid());
        }
        let revision: u8 = pieces.next()
            .ok_or_else(invalid)?
            .parse().map_err(|_| DecodeError::InvalidNumber)?;
        let authority_str = pieces.next().ok_or_else(invalid)?;
        let authority = match authority_str.strip_prefix("0x").or_else(|| authority_str.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => authority_str.parse(),
        }.map_err(|_| DecodeError::InvalidNumber)?;
        if authority > MAX_AUTHORITY {
            return Err(DecodeError::OutOfRange);
        }

        let mut sub_authorities = Vec::new();
        for piece in pieces {
            let sub_authority: u32 = piece.parse()
                .map_err(|_| DecodeError::InvalidNumber)?;
            sub_authorities.push(sub_authority);
        }
        if sub_authorities.len() > usize::from(u8::MAX) {
            return Err(DecodeError::OutOfRange);
        }

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }
}


/// Decodes a binary `objectSid` into its `S-R-A-S1-...-Sn` string form.
pub fn decode_sid(bytes: &[u8]) -> Result<String, DecodeError> {
    SecurityIdentifier::try_decode(bytes)
        .map(|sid| sid.to_string())
}

/// Encodes a SID string into the binary `objectSid` form.
pub fn encode_sid(sid: &str) -> Result<Vec<u8>, DecodeError> {
    sid.parse::<SecurityIdentifier>()
        .map(|sid| sid.to_ms_bytes())
}
