//! Nigerian network and phone number validation.
//!
//! Phone numbers are normalized to the standard 11-digit local format
//! (leading zero) and checked against per-network prefix tables. A number
//! whose prefix belongs to a different network than the one selected is
//! rejected before a transaction is ever created.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// The four Nigerian mobile networks supported by the storefront.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mtn,
    Airtel,
    Glo,
    #[serde(rename = "9mobile")]
    NineMobile,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mtn => "mtn",
            Network::Airtel => "airtel",
            Network::Glo => "glo",
            Network::NineMobile => "9mobile",
        }
    }

    pub const ALL: [Network; 4] = [
        Network::Mtn,
        Network::Airtel,
        Network::Glo,
        Network::NineMobile,
    ];

    /// Prefixes owned by this network (11-digit local format).
    pub fn prefixes(&self) -> &'static [&'static str] {
        match self {
            Network::Mtn => &[
                "0803", "0806", "0813", "0816", "0903", "0906", "0913", "0916",
            ],
            Network::Airtel => &[
                "0701", "0708", "0802", "0808", "0812", "0901", "0902", "0907", "0912",
            ],
            Network::Glo => &["0705", "0805", "0807", "0811", "0815", "0905", "0915"],
            Network::NineMobile => &["0809", "0817", "0818", "0909", "0908"],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Mtn => "MTN",
            Network::Airtel => "Airtel",
            Network::Glo => "Glo",
            Network::NineMobile => "9mobile",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Network {
    type Err = PhoneValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mtn" => Ok(Network::Mtn),
            "airtel" => Ok(Network::Airtel),
            "glo" => Ok(Network::Glo),
            "9mobile" | "etisalat" => Ok(Network::NineMobile),
            _ => Err(PhoneValidationError::UnknownNetwork {
                network: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PhoneValidationError {
    #[error("phone number is required")]
    Empty,

    #[error("invalid phone number format; expected 11 digits like 08012345678")]
    BadFormat,

    #[error("unrecognized network prefix '{prefix}'")]
    UnknownPrefix { prefix: String },

    #[error("unsupported network: {network}")]
    UnknownNetwork { network: String },

    #[error(
        "this number belongs to {detected}, but {selected} was selected"
    )]
    NetworkMismatch {
        detected: &'static str,
        selected: &'static str,
    },
}

/// A phone number that passed validation, plus the network its prefix maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPhone {
    pub normalized: String,
    pub network: Network,
}

fn local_format_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^0\d{10}$").expect("static regex"))
}

/// Normalize a phone number to the standard 11-digit local format.
///
/// Accepts `+234…`, `234…`, `0…` and bare 10-digit inputs; anything else is
/// rejected.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let normalized = if let Some(local) = digits.strip_prefix("234") {
        if local.len() == 10 {
            format!("0{}", local)
        } else {
            return None;
        }
    } else if digits.starts_with('0') {
        digits
    } else if digits.len() == 10 {
        format!("0{}", digits)
    } else {
        return None;
    };

    if local_format_re().is_match(&normalized) {
        Some(normalized)
    } else {
        None
    }
}

/// Detect the network owning a normalized number's prefix.
pub fn detect_network(normalized: &str) -> Option<Network> {
    if normalized.len() < 4 {
        return None;
    }
    let prefix = &normalized[..4];
    Network::ALL
        .iter()
        .copied()
        .find(|network| network.prefixes().contains(&prefix))
}

/// Validate a phone number against a selected network.
pub fn validate_phone(raw: &str, selected: Network) -> Result<ValidatedPhone, PhoneValidationError> {
    if raw.trim().is_empty() {
        return Err(PhoneValidationError::Empty);
    }

    let normalized = normalize_phone(raw.trim()).ok_or(PhoneValidationError::BadFormat)?;

    let detected = detect_network(&normalized).ok_or_else(|| PhoneValidationError::UnknownPrefix {
        prefix: normalized[..4].to_string(),
    })?;

    if detected != selected {
        return Err(PhoneValidationError::NetworkMismatch {
            detected: detected.display_name(),
            selected: selected.display_name(),
        });
    }

    Ok(ValidatedPhone {
        normalized,
        network: detected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_input_formats() {
        assert_eq!(normalize_phone("08031234567").as_deref(), Some("08031234567"));
        assert_eq!(normalize_phone("+2348031234567").as_deref(), Some("08031234567"));
        assert_eq!(normalize_phone("2348031234567").as_deref(), Some("08031234567"));
        assert_eq!(normalize_phone("8031234567").as_deref(), Some("08031234567"));
        assert_eq!(normalize_phone("0803 123 4567").as_deref(), Some("08031234567"));
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert_eq!(normalize_phone("0803123456"), None); // 10 digits with leading 0
        assert_eq!(normalize_phone("080312345678"), None); // 12 digits
        assert_eq!(normalize_phone("23480312345"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn detects_network_from_prefix() {
        assert_eq!(detect_network("08031234567"), Some(Network::Mtn));
        assert_eq!(detect_network("07011234567"), Some(Network::Airtel));
        assert_eq!(detect_network("08051234567"), Some(Network::Glo));
        assert_eq!(detect_network("08091234567"), Some(Network::NineMobile));
        assert_eq!(detect_network("07001234567"), None);
    }

    #[test]
    fn accepts_matching_network() {
        let validated = validate_phone("08031234567", Network::Mtn).expect("mtn number");
        assert_eq!(validated.normalized, "08031234567");
        assert_eq!(validated.network, Network::Mtn);
    }

    #[test]
    fn rejects_network_mismatch_naming_detected_network() {
        let err = validate_phone("08031234567", Network::Airtel).unwrap_err();
        match err {
            PhoneValidationError::NetworkMismatch { detected, selected } => {
                assert_eq!(detected, "MTN");
                assert_eq!(selected, "Airtel");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn network_parses_from_string() {
        assert_eq!("mtn".parse::<Network>().unwrap(), Network::Mtn);
        assert_eq!("9mobile".parse::<Network>().unwrap(), Network::NineMobile);
        assert_eq!("MTN".parse::<Network>().unwrap(), Network::Mtn);
        assert!("vodafone".parse::<Network>().is_err());
    }

    #[test]
    fn prefix_sets_are_disjoint() {
        let mut seen = std::collections::HashSet::new();
        for network in Network::ALL {
            for prefix in network.prefixes() {
                assert!(seen.insert(*prefix), "duplicate prefix {prefix}");
            }
        }
    }
}
