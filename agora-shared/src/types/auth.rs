use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account privilege level. Stored as the lowercase variant name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Identity attached to a request by the session layer once its session
/// cookie has been validated.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: Option<String>,
    pub role: UserRole,
    pub session_expires_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    GitHub,
    Facebook,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 3] = [OAuthProvider::Google, OAuthProvider::GitHub, OAuthProvider::Facebook];

    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::GitHub => "github",
            OAuthProvider::Facebook => "facebook",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::GitHub),
            "facebook" => Ok(OAuthProvider::Facebook),
            _ => Err(format!("unknown oauth provider: {s}")),
        }
    }
}

/// What a federated sign-in should do once the provider vouches for the
/// e-mail: open a session for an existing account, or create a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthIntent {
    Login,
    Register,
}

impl OAuthIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthIntent::Login => "login",
            OAuthIntent::Register => "register",
        }
    }
}

impl std::fmt::Display for OAuthIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OAuthIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(OAuthIntent::Login),
            "register" => Ok(OAuthIntent::Register),
            _ => Err(format!("unknown oauth intent: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_its_column_value() {
        for role in [UserRole::User, UserRole::Admin] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
    }

    #[test]
    fn role_parsing_is_strict() {
        assert!("Admin".parse::<UserRole>().is_err());
        assert!("moderator".parse::<UserRole>().is_err());
        assert!("".parse::<UserRole>().is_err());
    }

    #[test]
    fn provider_serializes_lowercase() {
        let json = serde_json::to_string(&OAuthProvider::GitHub).unwrap();
        assert_eq!(json, "\"github\"");
        let parsed: OAuthProvider = serde_json::from_str("\"facebook\"").unwrap();
        assert_eq!(parsed, OAuthProvider::Facebook);
    }

    #[test]
    fn intent_parses_known_values_only() {
        assert_eq!("register".parse::<OAuthIntent>().unwrap(), OAuthIntent::Register);
        assert!("signup".parse::<OAuthIntent>().is_err());
    }
}
