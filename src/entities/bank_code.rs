// 🏦 Bank Code Entity - SWIFT/BIC code of a head office or branch
//
// Convention: the head office of any code is `first 8 chars + "XXX"`.
// A code ending in "XXX" is itself a head office.
//
// Branch → headquarters is stored as an optional identity (`headquarters_id`)
// resolved fresh from the store, never as a live object graph.

use serde::{Deserialize, Serialize};

/// Suffix that marks a head-office code
pub const HEADQUARTERS_SUFFIX: &str = "XXX";

/// Length of the bank + country + location prefix shared by a head office
/// and all its branches
pub const CODE_PREFIX_LEN: usize = 8;

pub const MIN_CODE_LEN: usize = 8;
pub const MAX_CODE_LEN: usize = 11;
pub const MAX_BANK_NAME_LEN: usize = 150;
pub const MAX_BRANCH_NAME_LEN: usize = 150;
pub const MAX_ADDRESS_LEN: usize = 255;

/// True iff `code` ends with the head-office suffix
pub fn is_headquarters_code(code: &str) -> bool {
    code.ends_with(HEADQUARTERS_SUFFIX)
}

/// Derive the head-office code for `code`
///
/// Returns `None` when the code is too short to carry the 8-character prefix.
///
/// # Examples:
/// ```
/// use swift_registry::entities::headquarters_code_for;
///
/// assert_eq!(headquarters_code_for("AAISALTR1XX").as_deref(), Some("AAISALTRXXX"));
/// assert_eq!(headquarters_code_for("AAISALTRXXX").as_deref(), Some("AAISALTRXXX"));
/// assert_eq!(headquarters_code_for("SHORT"), None);
/// ```
pub fn headquarters_code_for(code: &str) -> Option<String> {
    if code.chars().count() < CODE_PREFIX_LEN {
        return None;
    }

    let prefix: String = code.chars().take(CODE_PREFIX_LEN).collect();
    Some(format!("{}{}", prefix, HEADQUARTERS_SUFFIX))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCode {
    /// Store-assigned identity (0 until persisted)
    #[serde(default)]
    pub id: i64,

    /// SWIFT/BIC code, 8-11 chars, uppercase (natural key)
    pub code: String,

    pub bank_name: String,

    /// Branch / town name
    pub branch_name: Option<String>,

    pub address: Option<String>,

    pub headquarters: bool,

    /// Owning country identity
    pub country_id: i64,

    /// Head-office identity; always `None` for head offices
    pub headquarters_id: Option<i64>,
}

impl BankCode {
    /// Create an unsaved record with only its natural key set
    ///
    /// Every other field is assigned by the caller before saving.
    pub fn new(code: &str) -> Self {
        BankCode {
            id: 0,
            code: code.to_string(),
            bank_name: String::new(),
            branch_name: None,
            address: None,
            headquarters: is_headquarters_code(code),
            country_id: 0,
            headquarters_id: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// Code of the head office this record belongs to
    pub fn headquarters_code(&self) -> Option<String> {
        headquarters_code_for(&self.code)
    }

    pub fn is_branch(&self) -> bool {
        !self.headquarters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headquarters_detection() {
        assert!(is_headquarters_code("AAISALTRXXX"));
        assert!(!is_headquarters_code("AAISALTR1XX"));
        assert!(!is_headquarters_code("AAISALTR"));
    }

    #[test]
    fn test_headquarters_code_derivation() {
        assert_eq!(
            headquarters_code_for("AAAAPLPW001"),
            Some("AAAAPLPWXXX".to_string())
        );
        // 8-char codes map onto their 11-char head office
        assert_eq!(
            headquarters_code_for("AAAAPLPW"),
            Some("AAAAPLPWXXX".to_string())
        );
        assert_eq!(headquarters_code_for("AAAAPLP"), None);
    }

    #[test]
    fn test_new_bank_code() {
        let hq = BankCode::new("AAAAPLPWXXX");
        assert!(hq.headquarters);
        assert!(!hq.is_persisted());
        assert_eq!(hq.headquarters_code().as_deref(), Some("AAAAPLPWXXX"));

        let branch = BankCode::new("AAAAPLPW001");
        assert!(branch.is_branch());
        assert_eq!(branch.headquarters_id, None);
    }
}
