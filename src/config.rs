use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub session_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub dir: PathBuf,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceSearchConfig {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub smtp: Option<SmtpConfig>,
    pub places: Option<PlaceSearchConfig>,
    pub admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let dir = PathBuf::from(std::env::var("DATABASE_DIR").unwrap_or_else(|_| "./data".into()));
        let path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dir.join("stores.db"));

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| {
                tracing::warn!("JWT_SECRET is not set; using an insecure development secret");
                "change-this-secret-in-production".into()
            }),
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "storemap".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "storemap-users".into()),
            session_ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };

        // Password-recovery mail stays disabled unless credentials are present.
        let smtp = match (std::env::var("EMAIL_USER"), std::env::var("EMAIL_PASS")) {
            (Ok(user), Ok(pass)) if !user.trim().is_empty() && !pass.trim().is_empty() => {
                let user = user.trim().to_string();
                Some(SmtpConfig {
                    host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into()),
                    port: std::env::var("SMTP_PORT")
                        .ok()
                        .and_then(|v| v.parse::<u16>().ok())
                        .unwrap_or(587),
                    from: std::env::var("EMAIL_FROM").unwrap_or_else(|_| user.clone()),
                    username: user,
                    password: pass.trim().to_string(),
                })
            }
            _ => None,
        };

        let places = match (
            std::env::var("PLACE_API_CLIENT_ID"),
            std::env::var("PLACE_API_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(PlaceSearchConfig {
                endpoint: std::env::var("PLACE_API_ENDPOINT")
                    .unwrap_or_else(|_| "https://openapi.naver.com/v1/search/local.json".into()),
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let admin_password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "123456".into());

        Ok(Self {
            database: DatabaseConfig { dir, path },
            jwt,
            smtp,
            places,
            admin_password,
        })
    }
}
