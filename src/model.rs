// Raw data-model DTOs as read from the rule store (repository). These mirror
// the store's row shapes; the compiler turns them into the immutable snapshot
// types in `compiler.rs`.

use serde::{Deserialize, Serialize};

/// A downstream payment gateway and its availability flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub id: i64,
    pub name: String,
    pub is_enabled: bool,
    pub in_maintenance: bool,
}

impl GatewayConfig {
    /// A gateway is available iff enabled and not under maintenance.
    pub fn is_available(&self) -> bool {
        self.is_enabled && !self.in_maintenance
    }
}

/// The authoring unit: a versioned, named collection of rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub sticky_salt: Option<String>,
    pub default_gateway: Option<String>,
    pub version: i64,
}

/// The condition shorthand a raw rule is authored with. `Advanced` carries a
/// full predicate tree in `condition_json`; the other three are shorthands
/// the compiler expands into a `VALUE_IN` predicate (see `compiler.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    Advanced,
    User,
    PixKey,
    PixKeyType,
}

/// A raw rule record as delivered by the repository, ordered by priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub rule_set_id: i64,
    pub priority: u32,
    pub name: Option<String>,
    pub enabled: bool,
    pub condition_type: ConditionType,
    pub condition_value: Option<String>,
    pub condition_json: Option<serde_json::Value>,
    pub action: serde_json::Value,
}

/// The eight recognized PIX key types. `PIX_KEY_TYPE` shorthand rules and the
/// `PixKeyType` matcher coercion validate against this set (uppercased).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixKeyType {
    Qrcode,
    QrcodeStatic,
    QrcodeDynamic,
    Email,
    Phone,
    Cpf,
    Cnpj,
    Evp,
}

impl PixKeyType {
    pub const ALL: [PixKeyType; 8] = [
        PixKeyType::Qrcode,
        PixKeyType::QrcodeStatic,
        PixKeyType::QrcodeDynamic,
        PixKeyType::Email,
        PixKeyType::Phone,
        PixKeyType::Cpf,
        PixKeyType::Cnpj,
        PixKeyType::Evp,
    ];

    /// Case-insensitive lookup, used to validate the `PIX_KEY_TYPE` shorthand.
    pub fn parse_uppercase(s: &str) -> Option<&'static str> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .find(|&canonical| canonical == upper)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PixKeyType::Qrcode => "QRCODE",
            PixKeyType::QrcodeStatic => "QRCODE_STATIC",
            PixKeyType::QrcodeDynamic => "QRCODE_DYNAMIC",
            PixKeyType::Email => "EMAIL",
            PixKeyType::Phone => "PHONE",
            PixKeyType::Cpf => "CPF",
            PixKeyType::Cnpj => "CNPJ",
            PixKeyType::Evp => "EVP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_availability() {
        let gw = GatewayConfig { id: 1, name: "A".into(), is_enabled: true, in_maintenance: false };
        assert!(gw.is_available());
        let gw = GatewayConfig { id: 1, name: "A".into(), is_enabled: true, in_maintenance: true };
        assert!(!gw.is_available());
        let gw = GatewayConfig { id: 1, name: "A".into(), is_enabled: false, in_maintenance: false };
        assert!(!gw.is_available());
    }

    #[test]
    fn pix_key_type_case_insensitive_lookup() {
        assert_eq!(PixKeyType::parse_uppercase("cpf"), Some("CPF"));
        assert_eq!(PixKeyType::parse_uppercase("Qrcode_Static"), Some("QRCODE_STATIC"));
        assert_eq!(PixKeyType::parse_uppercase("bogus"), None);
    }
}
