//! Human-readable forms of binary and timestamp attributes, available on
//! every entry.

use chrono::{DateTime, Local};

use crate::attributes::AttributeValue;
use crate::codec::{decode_guid, decode_sid, parse_generalized_time, DecodeError};
use crate::entry::Entry;
use crate::error::{Error, Result};


const DERIVED_ATTRIBUTE_NAMES: [&str; 4] = [
    "objectguid_decoded",
    "objectsid_decoded",
    "created_at",
    "updated_at",
];


impl Entry {
    pub(crate) fn required_value(&self, attribute: &str) -> Result<&AttributeValue> {
        self.get(attribute)
            .first()
            .ok_or_else(|| Error::MissingAttribute {
                dn: self.dn().to_owned(),
                attribute: attribute.to_owned(),
            })
    }

    pub(crate) fn required_text(&self, attribute: &str) -> Result<&str> {
        let value = self.required_value(attribute)?;
        value.as_str()
            .ok_or_else(|| DecodeError::InvalidFormat(format!("{} is not text", attribute)).into())
    }

    /// `objectGUID` in its canonical text form.
    pub fn objectguid_decoded(&self) -> Result<String> {
        Ok(decode_guid(self.required_value("objectGUID")?.as_bytes())?)
    }

    /// `objectSid` in its `S-1-...` text form.
    pub fn objectsid_decoded(&self) -> Result<String> {
        Ok(decode_sid(self.required_value("objectSid")?.as_bytes())?)
    }

    pub fn created_at(&self) -> Result<DateTime<Local>> {
        Ok(parse_generalized_time(self.required_text("whenCreated")?)?)
    }

    pub fn updated_at(&self) -> Result<DateTime<Local>> {
        Ok(parse_generalized_time(self.required_text("whenChanged")?)?)
    }

    pub fn derived_attribute_names() -> &'static [&'static str] {
        &DERIVED_ATTRIBUTE_NAMES
    }

    /// The derived attribute called `name`, rendered as text. `None` if there
    /// is no such derived attribute.
    pub fn derived_attribute(&self, name: &str) -> Option<Result<String>> {
        let value = match name {
            "objectguid_decoded" => self.objectguid_decoded(),
            "objectsid_decoded" => self.objectsid_decoded(),
            "created_at" => self.created_at().map(|t| t.to_rfc3339()),
            "updated_at" => self.updated_at().map(|t| t.to_rfc3339()),
            _ => return None,
        };
        Some(value)
    }
}
