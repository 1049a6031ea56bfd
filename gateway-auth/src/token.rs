use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use gateway_core::clock::Clock;
use gateway_core::ids::{SessionId, TokenId, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::rbac::Role;

/// Access tokens live 24h, refresh tokens 7 days (§4.3, matching the
/// original service's `ACCESS_TOKEN_EXPIRE_HOURS`/`REFRESH_TOKEN_EXPIRE_DAYS`).
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(24 * 3600);
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims. `jti` is the token id used for revocation lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<Role>,
    pub session_id: String,
    pub token_type: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates HS256 JWTs, tracking revoked token ids in a
/// concurrent blacklist keyed by jti with an expiry no longer than the
/// token's own remaining lifetime.
pub struct TokenService<C: Clock> {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<C>,
    blacklist: DashMap<String, i64>,
}

impl<C: Clock> TokenService<C> {
    pub fn new(secret: &[u8], clock: Arc<C>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            clock,
            blacklist: DashMap::new(),
        }
    }

    fn issue(
        &self,
        user_id: &UserId,
        roles: &[Role],
        session_id: &SessionId,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<(String, TokenId), AuthError> {
        let now = self.clock.now().timestamp();
        let jti = TokenId::generate();
        let claims = Claims {
            sub: user_id.as_str().to_string(),
            roles: roles.to_vec(),
            session_id: session_id.as_str().to_string(),
            token_type,
            jti: jti.as_str().to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidCredentials)?;
        Ok((token, jti))
    }

    pub fn create_access_token(
        &self,
        user_id: &UserId,
        roles: &[Role],
        session_id: &SessionId,
    ) -> Result<(String, TokenId), AuthError> {
        self.issue(user_id, roles, session_id, TokenType::Access, ACCESS_TOKEN_TTL)
    }

    pub fn create_refresh_token(
        &self,
        user_id: &UserId,
        roles: &[Role],
        session_id: &SessionId,
    ) -> Result<(String, TokenId), AuthError> {
        self.issue(user_id, roles, session_id, TokenType::Refresh, REFRESH_TOKEN_TTL)
    }

    /// Decodes and validates a token: signature, expiry, and blacklist
    /// membership all collapse to the same generic `Unauthorized` error so
    /// callers can't distinguish revocation from forgery.
    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::Unauthorized)?;

        if self.blacklist.contains_key(&data.claims.jti) {
            return Err(AuthError::Unauthorized);
        }
        Ok(data.claims)
    }

    /// Revokes a token by jti until its own expiry passes, after which the
    /// blacklist entry is redundant (the token would fail exp validation
    /// anyway) but harmless to keep until swept.
    pub fn revoke_token(&self, claims: &Claims) {
        self.blacklist.insert(claims.jti.clone(), claims.exp);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.blacklist.contains_key(jti)
    }

    /// Drops blacklist entries whose underlying token has already expired.
    pub fn sweep_expired_blacklist(&self) {
        let now = self.clock.now().timestamp();
        self.blacklist.retain(|_, exp| *exp > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::clock::FrozenClock;

    fn frozen_clock() -> Arc<FrozenClock> {
        Arc::new(FrozenClock::at(chrono::DateTime::from_timestamp(0, 0).unwrap()))
    }

    fn service() -> TokenService<FrozenClock> {
        TokenService::new(b"test-secret-key-material", frozen_clock())
    }

    #[test]
    fn access_token_round_trips() {
        let svc = service();
        let user_id = UserId::generate();
        let session_id = SessionId::generate();
        let (token, _jti) = svc
            .create_access_token(&user_id, &[Role::Analyst], &session_id)
            .unwrap();
        let claims = svc.decode_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.as_str());
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn revoked_token_is_rejected() {
        let svc = service();
        let user_id = UserId::generate();
        let session_id = SessionId::generate();
        let (token, _jti) = svc
            .create_access_token(&user_id, &[Role::Viewer], &session_id)
            .unwrap();
        let claims = svc.decode_token(&token).unwrap();
        svc.revoke_token(&claims);
        assert!(matches!(svc.decode_token(&token), Err(AuthError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let clock = frozen_clock();
        let svc = TokenService::new(b"test-secret-key-material", clock.clone());
        let user_id = UserId::generate();
        let session_id = SessionId::generate();
        let (token, _jti) = svc
            .create_access_token(&user_id, &[Role::Viewer], &session_id)
            .unwrap();
        clock.advance(chrono::Duration::seconds(ACCESS_TOKEN_TTL.as_secs() as i64 + 1));
        assert!(matches!(svc.decode_token(&token), Err(AuthError::Unauthorized)));
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let clock = frozen_clock();
        let svc = TokenService::new(b"test-secret-key-material", clock.clone());
        let user_id = UserId::generate();
        let session_id = SessionId::generate();
        let (token, _) = svc
            .create_access_token(&user_id, &[Role::Viewer], &session_id)
            .unwrap();
        let claims = svc.decode_token(&token).unwrap();
        svc.revoke_token(&claims);
        clock.advance(chrono::Duration::seconds(ACCESS_TOKEN_TTL.as_secs() as i64 + 1));
        svc.sweep_expired_blacklist();
        assert!(!svc.is_revoked(&claims.jti));
    }
}
