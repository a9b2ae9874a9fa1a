//! Signer address checks
//!
//! Validates the `0x`-prefixed 20-byte account addresses users type into the
//! form. Mixed-case input must carry a valid EIP-55 checksum; all-lowercase and
//! all-uppercase input is accepted as-is.

use alloy::primitives::Address;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Hex digits in an address (20 bytes)
const ADDRESS_HEX_LEN: usize = 40;

/// Why a raw value is not a usable signer address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressIssue {
    /// Nothing entered
    Empty,
    /// Missing the `0x` prefix
    MissingPrefix,
    /// Wrong number of hex digits after the prefix
    WrongLength { len: usize },
    /// Contains characters outside `[0-9a-fA-F]`
    NonHex,
    /// Mixed-case value whose EIP-55 checksum does not match
    BadChecksum,
    /// The zero address cannot sign
    ZeroAddress,
}

impl fmt::Display for AddressIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressIssue::Empty => write!(f, "address is empty"),
            AddressIssue::MissingPrefix => write!(f, "address must start with 0x"),
            AddressIssue::WrongLength { len } => {
                write!(f, "address must have {} hex digits, got {}", ADDRESS_HEX_LEN, len)
            }
            AddressIssue::NonHex => write!(f, "address contains non-hex characters"),
            AddressIssue::BadChecksum => write!(f, "address checksum does not match"),
            AddressIssue::ZeroAddress => write!(f, "the zero address cannot be a signer"),
        }
    }
}

/// Parse a raw signer value into an address.
///
/// Checks run in a fixed order so each value reports its most basic problem:
/// empty, prefix, length, hex digits, checksum, zero address.
pub fn check_address(raw: &str) -> Result<Address, AddressIssue> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AddressIssue::Empty);
    }

    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or(AddressIssue::MissingPrefix)?;

    if digits.chars().count() != ADDRESS_HEX_LEN {
        return Err(AddressIssue::WrongLength {
            len: digits.chars().count(),
        });
    }

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressIssue::NonHex);
    }

    let address = Address::from_str(digits).map_err(|_| AddressIssue::NonHex)?;

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None)[2..] != *digits {
        return Err(AddressIssue::BadChecksum);
    }

    if address.is_zero() {
        return Err(AddressIssue::ZeroAddress);
    }

    Ok(address)
}

/// EIP-55 checksummed form of an address (0x prefixed)
pub fn normalize(address: &Address) -> String {
    address.to_checksum(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Checksummed vector from EIP-55
    const CHECKSUMMED: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    #[test]
    fn test_accepts_checksummed() {
        let address = check_address(CHECKSUMMED).unwrap();
        assert_eq!(normalize(&address), CHECKSUMMED);
    }

    #[test]
    fn test_accepts_single_case() {
        let lower = CHECKSUMMED.to_lowercase();
        let upper = format!("0x{}", CHECKSUMMED[2..].to_uppercase());
        assert_eq!(check_address(&lower).unwrap(), check_address(&upper).unwrap());
        assert_eq!(normalize(&check_address(&lower).unwrap()), CHECKSUMMED);
    }

    #[test]
    fn test_trims_whitespace() {
        assert!(check_address(&format!("  {}\n", CHECKSUMMED)).is_ok());
    }

    #[test]
    fn test_empty() {
        assert_eq!(check_address(""), Err(AddressIssue::Empty));
        assert_eq!(check_address("   "), Err(AddressIssue::Empty));
    }

    #[test]
    fn test_missing_prefix() {
        assert_eq!(
            check_address(&CHECKSUMMED[2..]),
            Err(AddressIssue::MissingPrefix)
        );
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(
            check_address("0xABC"),
            Err(AddressIssue::WrongLength { len: 3 })
        );
    }

    #[test]
    fn test_non_hex() {
        let value = format!("0x{}zz", &CHECKSUMMED[2..40]);
        assert_eq!(check_address(&value), Err(AddressIssue::NonHex));
    }

    #[test]
    fn test_bad_checksum() {
        // Flip the case of one letter in a checksummed address
        let value = CHECKSUMMED.replacen("aA", "Aa", 1);
        assert_eq!(check_address(&value), Err(AddressIssue::BadChecksum));
    }

    #[test]
    fn test_zero_address() {
        assert_eq!(
            check_address("0x0000000000000000000000000000000000000000"),
            Err(AddressIssue::ZeroAddress)
        );
    }
}
