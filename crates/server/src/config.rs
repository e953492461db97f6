use std::env;

/// Longest accepted token lifetime: one year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// First admin account, created at startup when no admin with this email exists.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let bootstrap_admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin {
                    email,
                    name: get("ADMIN_NAME").unwrap_or_else(|| "Admin User".to_string()),
                    password,
                })
            }
            _ => None,
        };

        Self {
            port: get("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:./data/kitboard.db?mode=rwc".to_string()),
            jwt_secret: get("JWT_SECRET")
                .unwrap_or_else(|| "development-secret-change-in-production".to_string()),
            token_ttl_hours: get("TOKEN_TTL_HOURS")
                .and_then(|h| h.parse().ok())
                .filter(|h| (1..=MAX_TOKEN_TTL_HOURS).contains(h))
                .unwrap_or(24),
            bootstrap_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, "sqlite:./data/kitboard.db?mode=rwc");
        assert_eq!(config.token_ttl_hours, 24);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = config_from(&[("PORT", "not-a-port"), ("TOKEN_TTL_HOURS", "-4")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.token_ttl_hours, 24);

        let config = config_from(&[("TOKEN_TTL_HOURS", "9223372036854775807")]);
        assert_eq!(config.token_ttl_hours, 24);
        let config = config_from(&[("TOKEN_TTL_HOURS", "72")]);
        assert_eq!(config.token_ttl_hours, 72);
    }

    #[test]
    fn bootstrap_admin_needs_email_and_password() {
        let config = config_from(&[("ADMIN_EMAIL", "ops@example.com")]);
        assert!(config.bootstrap_admin.is_none());

        let config = config_from(&[
            ("ADMIN_EMAIL", "ops@example.com"),
            ("ADMIN_PASSWORD", "hunter2hunter2"),
        ]);
        let admin = config.bootstrap_admin.expect("bootstrap admin");
        assert_eq!(admin.email, "ops@example.com");
        assert_eq!(admin.name, "Admin User");
    }
}
