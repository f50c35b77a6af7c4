//! Device serial (UDID) validation
//!
//! Every per-device operation takes a [`DeviceSerial`] so that a malformed
//! identifier is rejected before any external tool is launched.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Classic 40-character UDID (SHA-1 hex digest)
static LEGACY_UDID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("Invalid legacy UDID regex"));

/// `XXXXXXXX-XXXXXXXXXXXXXXXX` UDID used from iPhone XS/XR onwards
static CHIP_UDID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9]{8}-[A-Z0-9]{16}$").expect("Invalid chip UDID regex")
});

/// Returns `true` if `s` has one of the two accepted UDID shapes.
pub fn is_valid_serial(s: &str) -> bool {
    LEGACY_UDID.is_match(s) || CHIP_UDID.is_match(s)
}

/// A validated device identifier.
///
/// Can only be constructed through [`DeviceSerial::parse`] (or `FromStr` /
/// `TryFrom`), so holding one proves the shape check already passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceSerial(String);

impl DeviceSerial {
    pub fn parse(s: impl AsRef<str>) -> Result<Self> {
        let s = s.as_ref();
        if is_valid_serial(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::invalid_serial(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceSerial {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceSerial {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceSerial {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        if is_valid_serial(&s) {
            Ok(Self(s))
        } else {
            Err(Error::InvalidSerial { serial: s })
        }
    }
}

impl From<DeviceSerial> for String {
    fn from(serial: DeviceSerial) -> Self {
        serial.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_udid_accepted() {
        assert!(is_valid_serial(&"a".repeat(40)));
        assert!(is_valid_serial("0123456789abcdef0123456789abcdef01234567"));
    }

    #[test]
    fn test_chip_udid_accepted() {
        assert!(is_valid_serial("1234ABCD-1234567890ABCDEF"));
        assert!(is_valid_serial("00008030-001A35E11234802E"));
    }

    #[test]
    fn test_rejected_shapes() {
        assert!(!is_valid_serial("bogus"));
        assert!(!is_valid_serial(""));
        // Wrong length
        assert!(!is_valid_serial(&"a".repeat(39)));
        assert!(!is_valid_serial(&"a".repeat(41)));
        // Uppercase hex is not a legacy UDID
        assert!(!is_valid_serial(&"A".repeat(40)));
        // Non-hex lowercase
        assert!(!is_valid_serial(&"z".repeat(40)));
        // Lowercase chip UDID
        assert!(!is_valid_serial("1234abcd-1234567890abcdef"));
        // Surrounding whitespace is not trimmed here
        assert!(!is_valid_serial(" 1234ABCD-1234567890ABCDEF"));
        assert!(!is_valid_serial("1234ABCD-1234567890ABCDEF\n"));
    }

    #[test]
    fn test_parse_returns_invalid_serial_error() {
        let err = DeviceSerial::parse("bogus").unwrap_err();
        assert!(matches!(err, Error::InvalidSerial { ref serial } if serial == "bogus"));
    }

    #[test]
    fn test_parse_roundtrip_display() {
        let serial: DeviceSerial = "1234ABCD-1234567890ABCDEF".parse().unwrap();
        assert_eq!(serial.to_string(), "1234ABCD-1234567890ABCDEF");
        assert_eq!(serial.as_str(), serial.as_ref());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: std::result::Result<DeviceSerial, _> =
            serde_json::from_str("\"1234ABCD-1234567890ABCDEF\"");
        assert!(ok.is_ok());

        let bad: std::result::Result<DeviceSerial, _> = serde_json::from_str("\"bogus\"");
        assert!(bad.is_err());
    }
}
