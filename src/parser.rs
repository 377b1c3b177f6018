// 🧾 Record Normalizer
//
// Raw CSV row (8 positional fields) → validated, normalized record.
// Pure function: no store access, no logging, same input → same output.

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::entities::bank_code::{
    is_headquarters_code, MAX_ADDRESS_LEN, MAX_BANK_NAME_LEN, MAX_BRANCH_NAME_LEN, MAX_CODE_LEN,
    MIN_CODE_LEN,
};
use crate::entities::country::MAX_COUNTRY_NAME_LEN;
use crate::error::{RegistryError, Result};

/// Number of fields in one data row
pub const FIELD_COUNT: usize = 8;

// ============================================================================
// CORE TYPES
// ============================================================================

/// RawRow - one data row exactly as read from the source
///
/// Field order: country ISO2, SWIFT code, code type, bank name, address,
/// town name, country name, time zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub country_iso2: String,
    pub swift_code: String,
    pub code_type: String,
    pub bank_name: String,
    pub address: String,
    pub town_name: String,
    pub country_name: String,
    pub time_zone: String,
}

impl RawRow {
    /// Build from a CSV record by position
    ///
    /// Fewer than 8 fields is a malformed row; extra trailing fields are ignored.
    pub fn from_record(record: &StringRecord) -> Result<Self> {
        if record.len() < FIELD_COUNT {
            return Err(RegistryError::invalid_row(format!(
                "expected {} fields, found {}",
                FIELD_COUNT,
                record.len()
            )));
        }

        let field = |i: usize| record.get(i).unwrap_or_default().to_string();

        Ok(RawRow {
            country_iso2: field(0),
            swift_code: field(1),
            code_type: field(2),
            bank_name: field(3),
            address: field(4),
            town_name: field(5),
            country_name: field(6),
            time_zone: field(7),
        })
    }

    /// Convenience constructor for fixed rows (tests, fixtures)
    pub fn from_fields(fields: [&str; FIELD_COUNT]) -> Self {
        let [country_iso2, swift_code, code_type, bank_name, address, town_name, country_name, time_zone] =
            fields.map(str::to_string);

        RawRow {
            country_iso2,
            swift_code,
            code_type,
            bank_name,
            address,
            town_name,
            country_name,
            time_zone,
        }
    }
}

/// BankRecord - output of `normalize`, input of the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankRecord {
    /// Uppercase, exactly 2 chars
    pub country_iso2: String,

    /// Uppercase, 8-11 chars
    pub swift_code: String,

    /// Read but not interpreted (e.g. "BIC11")
    pub code_type: String,

    pub bank_name: String,
    pub address: Option<String>,
    pub town_name: Option<String>,

    /// Uppercase
    pub country_name: String,

    /// Read but unused by reconciliation
    pub time_zone: String,

    /// Derived: code ends with "XXX"
    pub is_headquarters: bool,
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize one raw row or reject it with `InvalidRow`
///
/// # Example:
/// ```
/// use swift_registry::parser::{normalize, RawRow};
///
/// let raw = RawRow::from_fields([
///     " pl ", "aaaaplpwxxx", "BIC11", "Bank A", "Addr1", "Warsaw", "Poland", "Europe/Warsaw",
/// ]);
/// let record = normalize(&raw).unwrap();
/// assert_eq!(record.country_iso2, "PL");
/// assert_eq!(record.swift_code, "AAAAPLPWXXX");
/// assert_eq!(record.country_name, "POLAND");
/// assert!(record.is_headquarters);
/// ```
pub fn normalize(raw: &RawRow) -> Result<BankRecord> {
    let country_iso2 = raw.country_iso2.trim().to_uppercase();
    let swift_code = raw.swift_code.trim().to_uppercase();
    let country_name = raw.country_name.trim().to_uppercase();

    if char_len(&country_iso2) != 2 {
        return Err(RegistryError::invalid_row(format!(
            "invalid ISO code [{}] for country [{}]",
            country_iso2, country_name
        )));
    }

    let code_len = char_len(&swift_code);
    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code_len) {
        return Err(RegistryError::invalid_row(format!(
            "SWIFT code [{}] must be {}-{} characters",
            swift_code, MIN_CODE_LEN, MAX_CODE_LEN
        )));
    }

    let bank_name = raw.bank_name.trim().to_string();
    if bank_name.is_empty() {
        return Err(RegistryError::invalid_row(format!(
            "missing bank name for [{}]",
            swift_code
        )));
    }

    let address = non_empty(&raw.address);
    let town_name = non_empty(&raw.town_name);

    check_max_len("bank name", &bank_name, MAX_BANK_NAME_LEN)?;
    check_max_len("country name", &country_name, MAX_COUNTRY_NAME_LEN)?;
    if let Some(address) = &address {
        check_max_len("address", address, MAX_ADDRESS_LEN)?;
    }
    if let Some(town_name) = &town_name {
        check_max_len("town name", town_name, MAX_BRANCH_NAME_LEN)?;
    }

    let is_headquarters = is_headquarters_code(&swift_code);

    Ok(BankRecord {
        country_iso2,
        swift_code,
        code_type: raw.code_type.trim().to_string(),
        bank_name,
        address,
        town_name,
        country_name,
        time_zone: raw.time_zone.trim().to_string(),
        is_headquarters,
    })
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn check_max_len(field: &str, value: &str, max: usize) -> Result<()> {
    if char_len(value) > max {
        return Err(RegistryError::invalid_row(format!(
            "{} longer than {} characters",
            field, max
        )));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(iso: &str, code: &str) -> RawRow {
        RawRow::from_fields([
            iso,
            code,
            "BIC11",
            "  ALBANIAN AMERICAN BANK  ",
            " TIRANA, ALBANIA ",
            "TIRANA",
            "albania",
            "Europe/Tirane",
        ])
    }

    #[test]
    fn test_normalize_trims_and_uppercases() {
        let record = normalize(&raw(" al ", " aaisaltrxxx ")).unwrap();

        assert_eq!(record.country_iso2, "AL");
        assert_eq!(record.swift_code, "AAISALTRXXX");
        assert_eq!(record.bank_name, "ALBANIAN AMERICAN BANK");
        assert_eq!(record.address.as_deref(), Some("TIRANA, ALBANIA"));
        assert_eq!(record.town_name.as_deref(), Some("TIRANA"));
        assert_eq!(record.country_name, "ALBANIA");
        assert_eq!(record.code_type, "BIC11");
        assert_eq!(record.time_zone, "Europe/Tirane");
        assert!(record.is_headquarters);
    }

    #[test]
    fn test_branch_flag() {
        let record = normalize(&raw("AL", "AAISALTR1XX")).unwrap();
        assert!(!record.is_headquarters);
    }

    #[test]
    fn test_invalid_iso_rejected() {
        for iso in ["XX9", "A", "", "   "] {
            let result = normalize(&raw(iso, "AAISALTRXXX"));
            assert!(
                matches!(result, Err(RegistryError::InvalidRow { .. })),
                "ISO [{}] should be rejected",
                iso
            );
        }
    }

    #[test]
    fn test_invalid_code_length_rejected() {
        assert!(normalize(&raw("AL", "BADCODE")).is_err());
        assert!(normalize(&raw("AL", "AAISALTR1XXX")).is_err());
        assert!(normalize(&raw("AL", "AAISALTR")).is_ok());
    }

    #[test]
    fn test_empty_optional_fields_become_none() {
        let mut row = raw("AL", "AAISALTR1XX");
        row.address = "   ".to_string();
        row.town_name = String::new();

        let record = normalize(&row).unwrap();
        assert_eq!(record.address, None);
        assert_eq!(record.town_name, None);
    }

    #[test]
    fn test_missing_bank_name_rejected() {
        let mut row = raw("AL", "AAISALTR1XX");
        row.bank_name = "  ".to_string();
        assert!(normalize(&row).is_err());
    }

    #[test]
    fn test_overlong_bank_name_rejected() {
        let mut row = raw("AL", "AAISALTR1XX");
        row.bank_name = "B".repeat(151);
        assert!(normalize(&row).is_err());
    }

    #[test]
    fn test_from_record_requires_eight_fields() {
        let short = StringRecord::from(vec!["PL", "AAAAPLPWXXX", "BIC11"]);
        assert!(RawRow::from_record(&short).is_err());

        let long = StringRecord::from(vec![
            "PL", "AAAAPLPWXXX", "BIC11", "Bank A", "Addr1", "Warsaw", "POLAND", "Europe/Warsaw",
            "extra",
        ]);
        let row = RawRow::from_record(&long).unwrap();
        assert_eq!(row.time_zone, "Europe/Warsaw");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let row = raw("al", "aaisaltr1xx");
        assert_eq!(normalize(&row).unwrap(), normalize(&row).unwrap());
    }
}
