use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Header consulted when mutual TLS is not configured
    #[serde(default = "default_role_header")]
    pub role_header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            role_header: default_role_header(),
        }
    }
}

fn default_role_header() -> String {
    "X-Egress-Role".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_role_header() {
        assert_eq!(IdentityConfig::default().role_header, "X-Egress-Role");
    }

    #[test]
    fn test_missing_field_uses_default() {
        let config: IdentityConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, IdentityConfig::default());
    }
}
