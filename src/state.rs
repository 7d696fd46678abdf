use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::geocode::{HttpPlaceSearch, PlaceSearch};
use crate::mailer::{Mailer, SmtpMailer};
use crate::schema;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub places: Option<Arc<dyn PlaceSearch>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = schema::initialize(&config.database).await?;

        let mailer = match &config.smtp {
            Some(smtp) => Some(Arc::new(SmtpMailer::new(smtp)?) as Arc<dyn Mailer>),
            None => {
                tracing::info!("SMTP not configured; password recovery mail disabled");
                None
            }
        };

        let places = match &config.places {
            Some(cfg) => Some(Arc::new(HttpPlaceSearch::new(cfg)?) as Arc<dyn PlaceSearch>),
            None => {
                tracing::info!("place search not configured; search proxy returns empty results");
                None
            }
        };

        Ok(Self {
            db,
            config,
            mailer,
            places,
        })
    }

    /// State over an existing pool with external services stubbed out.
    pub fn fake(db: SqlitePool) -> Self {
        use crate::config::{DatabaseConfig, JwtConfig};

        let config = Arc::new(AppConfig {
            database: DatabaseConfig {
                dir: "./data".into(),
                path: "./data/stores.db".into(),
            },
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                session_ttl_minutes: 60,
            },
            smtp: None,
            places: None,
            admin_password: "123456".into(),
        });

        Self {
            db,
            config,
            mailer: None,
            places: None,
        }
    }
}
