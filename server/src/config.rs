use anyhow::{Context, Result};
use platform_db::DatabaseSettings;
use products_crm::board::DEFAULT_NOTICE_CAPACITY;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub cors_allowed_origins: Vec<String>,
    pub notice_capacity: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let database = DatabaseSettings::from_env();

        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let notice_capacity = match std::env::var("NOTICE_CAPACITY") {
            Ok(raw) => parse_capacity(&raw)
                .with_context(|| format!("invalid NOTICE_CAPACITY `{raw}`"))?,
            Err(_) => DEFAULT_NOTICE_CAPACITY,
        };

        Ok(Self {
            database,
            cors_allowed_origins,
            notice_capacity,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn parse_capacity(raw: &str) -> Result<usize> {
    let capacity: usize = raw.trim().parse()?;
    anyhow::ensure!(capacity > 0, "capacity must be positive");
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_skip_blanks() {
        assert_eq!(
            parse_origins("http://a.test, ,http://b.test,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn capacity_must_be_positive_integer() {
        assert_eq!(parse_capacity(" 128 ").unwrap(), 128);
        assert!(parse_capacity("0").is_err());
        assert!(parse_capacity("lots").is_err());
    }
}
