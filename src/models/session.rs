use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A server-side session, keyed by an opaque 256-bit token.
///
/// Lets a client that lost its local storage (aggressive browser clearing)
/// re-fetch its encrypted blob without re-entering the username. The password
/// is still required to decrypt; the session alone reveals nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    /// Fixed TTL: validation never extends this.
    pub expires_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl Session {
    /// A session is valid iff it has not yet expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session_expiring_at(expires_at: DateTime<Utc>) -> Session {
        Session {
            token: "t".into(),
            username: "alice_99".into(),
            created_at: Utc::now() - Duration::days(1),
            expires_at,
            last_accessed: Utc::now(),
            user_agent: None,
            ip_address: None,
        }
    }

    #[test]
    fn expired_session_is_never_valid() {
        let now = Utc::now();
        let session = session_expiring_at(now - Duration::seconds(1));
        assert!(!session.is_valid_at(now));
    }

    #[test]
    fn unexpired_session_is_valid() {
        let now = Utc::now();
        let session = session_expiring_at(now + Duration::days(30));
        assert!(session.is_valid_at(now));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let session = session_expiring_at(now);
        assert!(!session.is_valid_at(now));
    }
}
