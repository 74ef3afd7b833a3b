//! Country records: ISO 3166-1 alpha-2 code, continent code, and name.

use crate::error::{Error, Result};
use std::cmp::Ordering;

/// A country entry. Mirrors `loc_country_get_code`/`_get_continent_code`/
/// `_get_name` from `loc/country.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    code: [u8; 2],
    continent_code: [u8; 2],
    name_offset: u32,
}

impl Country {
    /// Build a record from a two-letter code, an optional two-letter
    /// continent code, and an already-interned name offset.
    pub fn new(code: &str, continent_code: Option<&str>, name_offset: u32) -> Result<Self> {
        let code = parse_code(code)?;
        let continent_code = match continent_code {
            Some(c) => parse_code(c)?,
            None => [0, 0],
        };
        Ok(Country {
            code,
            continent_code,
            name_offset,
        })
    }

    /// Raw two-letter country code bytes.
    pub fn code(&self) -> [u8; 2] {
        self.code
    }

    /// Country code as a `&str`.
    pub fn code_str(&self) -> &str {
        std::str::from_utf8(&self.code).unwrap_or("??")
    }

    /// Raw two-letter continent code bytes, `[0, 0]` if unset.
    pub fn continent_code(&self) -> [u8; 2] {
        self.continent_code
    }

    /// Offset of this country's name within the string pool.
    pub fn name_offset(&self) -> u32 {
        self.name_offset
    }
}

fn parse_code(code: &str) -> Result<[u8; 2]> {
    let bytes = code.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
        return Err(Error::InvalidArgument(format!(
            "country/continent code must be two uppercase ASCII letters: {}",
            code
        )));
    }
    Ok([bytes[0], bytes[1]])
}

/// Orders country records by code.
pub fn cmp(a: &Country, b: &Country) -> Ordering {
    a.code.cmp(&b.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_valid_codes() {
        let c = Country::new("US", Some("NA"), 0).unwrap();
        assert_eq!(c.code_str(), "US");
        assert_eq!(c.continent_code(), *b"NA");
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(Country::new("usa", None, 0).is_err());
        assert!(Country::new("u1", None, 0).is_err());
    }

    #[test]
    fn orders_by_code() {
        let a = Country::new("AT", None, 0).unwrap();
        let b = Country::new("US", None, 0).unwrap();
        assert_eq!(cmp(&a, &b), Ordering::Less);
    }
}
