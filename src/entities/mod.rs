// Entity Models
//
// Each entity has:
// - Natural key (ISO code / SWIFT code) used for every lookup
// - Store-assigned identity (integer id) used for references between records

pub mod bank_code;
pub mod country;

pub use bank_code::{headquarters_code_for, is_headquarters_code, BankCode, HEADQUARTERS_SUFFIX};
pub use country::Country;
