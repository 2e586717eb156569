use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    /// Base URL durable attachment links are rooted at, e.g. a CDN origin.
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub storage: Option<StorageConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.trim().is_empty() {
            return Err(crate::error::AppError::Config("JWT_SECRET empty".into()));
        }

        let storage = match env::var("ATTACHMENT_BUCKET") {
            Ok(bucket) if !bucket.trim().is_empty() => {
                let public_base_url = env::var("ATTACHMENT_PUBLIC_BASE_URL").map_err(|_| {
                    crate::error::AppError::Config("ATTACHMENT_PUBLIC_BASE_URL missing".into())
                })?;
                Some(StorageConfig {
                    bucket,
                    public_base_url: public_base_url.trim_end_matches('/').to_string(),
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            redis_url,
            port,
            jwt_secret,
            storage,
        })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            port: 3000,
            jwt_secret: "test-secret".into(),
            storage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_storage() {
        let cfg = Config::test_defaults();
        assert!(cfg.storage.is_none());
        assert_eq!(cfg.port, 3000);
    }
}
