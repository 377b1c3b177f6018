// 🌍 Country Entity
//
// ISO code is IDENTITY for lookups (immutable once created), name is a VALUE.

use serde::{Deserialize, Serialize};

/// Maximum length of a country display name
pub const MAX_COUNTRY_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Store-assigned identity (0 until persisted)
    #[serde(default)]
    pub id: i64,

    /// ISO 3166-1 alpha-2, always uppercase
    pub iso_code: String,

    /// Display name
    pub name: String,
}

impl Country {
    /// Create an unsaved country
    pub fn new(iso_code: &str, name: &str) -> Self {
        Country {
            id: 0,
            iso_code: iso_code.to_uppercase(),
            name: name.to_string(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_creation() {
        let country = Country::new("pl", "POLAND");

        assert_eq!(country.iso_code, "PL");
        assert_eq!(country.name, "POLAND");
        assert!(!country.is_persisted());
    }
}
