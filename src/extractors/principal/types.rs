/*
 * Responsibility
 * - The authenticated principal as handlers see it
 * - Built from a verified JWT payload by the authentication middleware and stored
 *   in request extensions for the rest of the request
 *
 * Notes
 * - `permissions` is the only claim the scaffold itself interprets
 * - every other claim stays available through `claims` / `claims_as`
 */
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Principal {
    pub permissions: Vec<String>,
    pub claims: Map<String, Value>,
}

impl Principal {
    /// Non-string entries in `permissions` are ignored; a payload that is not a
    /// JSON object yields an empty principal.
    pub fn from_claims(payload: Value) -> Self {
        let claims = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let permissions = claims
            .get("permissions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            permissions,
            claims,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Deserialize the whole payload into an application specific claims type.
    pub fn claims_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.claims.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_permissions_from_payload() {
        let principal = Principal::from_claims(json!({
            "sub": "user-1",
            "permissions": ["orders:read", 42, "orders:write"],
        }));

        assert_eq!(principal.permissions, vec!["orders:read", "orders:write"]);
        assert!(principal.has_permission("orders:write"));
        assert!(!principal.has_permission("orders:*"));
        assert_eq!(principal.subject(), Some("user-1"));
    }

    #[test]
    fn missing_permissions_claim_means_none() {
        let principal = Principal::from_claims(json!({ "sub": "user-1" }));
        assert!(principal.permissions.is_empty());

        let principal = Principal::from_claims(json!("not an object"));
        assert!(principal.claims.is_empty());
    }

    #[test]
    fn claims_deserialize_into_custom_types() {
        #[derive(Deserialize)]
        struct Claims {
            sub: String,
            tenant: String,
        }

        let principal = Principal::from_claims(json!({ "sub": "u", "tenant": "acme" }));
        let claims: Claims = principal.claims_as().unwrap();
        assert_eq!(claims.sub, "u");
        assert_eq!(claims.tenant, "acme");
    }
}
