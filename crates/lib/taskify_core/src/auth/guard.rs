//! Request guard checks: bearer authentication and claim-based authorization.
//!
//! Authorization never touches storage; it trusts the claims snapshot embedded
//! in the access token for the token's whole lifetime.

use super::AuthError;
use super::jwt::{JwtKeys, verify_access_token};
use crate::models::auth::AccessClaims;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticate an `Authorization` header value.
///
/// A missing header, a non-Bearer scheme, an empty token and a bad signature
/// or expiry all yield `InvalidToken`.
pub fn authenticate(header: Option<&str>, keys: &JwtKeys) -> Result<AccessClaims, AuthError> {
    let token = header
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidToken)?;
    verify_access_token(token, keys)
}

/// Require `resource:action` in the claims' permission map.
pub fn authorize_permission(
    claims: &AccessClaims,
    resource: &str,
    action: &str,
) -> Result<(), AuthError> {
    if claims.allows(resource, action) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(format!(
            "missing permission {resource}:{action}"
        )))
    }
}

/// Require the admin flag.
pub fn authorize_admin(claims: &AccessClaims) -> Result<(), AuthError> {
    if claims.is_admin {
        Ok(())
    } else {
        Err(AuthError::Forbidden("admin access required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{build_claims, sign_access_token};
    use crate::models::auth::PermissionMap;
    use uuid::Uuid;

    fn keys() -> JwtKeys {
        JwtKeys::from_secret(b"guard-secret").unwrap()
    }

    fn claims(is_admin: bool) -> AccessClaims {
        let mut permissions = PermissionMap::new();
        permissions.insert(
            "task".into(),
            ["read".to_string(), "create".to_string()].into_iter().collect(),
        );
        build_claims(Uuid::new_v4(), "bob", vec!["user".into()], is_admin, permissions)
    }

    #[test]
    fn missing_or_malformed_header_is_unauthenticated() {
        for header in [None, Some(""), Some("Basic abc"), Some("Bearer "), Some("bearer x")] {
            assert!(matches!(
                authenticate(header, &keys()),
                Err(AuthError::InvalidToken)
            ));
        }
    }

    #[test]
    fn valid_bearer_yields_claims() {
        let c = claims(false);
        let token = sign_access_token(&c, &keys()).unwrap();
        let header = format!("Bearer {token}");
        assert_eq!(authenticate(Some(&header), &keys()).unwrap(), c);
    }

    #[test]
    fn permission_check_uses_embedded_map() {
        let c = claims(false);
        assert!(authorize_permission(&c, "task", "read").is_ok());
        assert!(matches!(
            authorize_permission(&c, "task", "delete"),
            Err(AuthError::Forbidden(_))
        ));
        assert!(authorize_permission(&c, "user", "read").is_err());
    }

    #[test]
    fn admin_check() {
        assert!(authorize_admin(&claims(true)).is_ok());
        assert!(matches!(
            authorize_admin(&claims(false)),
            Err(AuthError::Forbidden(_))
        ));
    }
}
