use std::env;

/// Runtime configuration. The digest salt keys the one-way response-tracking
/// hash; changing it invalidates all existing dedup records, so it must stay
/// stable for the lifetime of the stored data.
#[derive(Clone)]
pub struct Config {
    pub digest_salt: String,
}

impl Config {
    pub fn new(digest_salt: impl Into<String>) -> Self {
        Self { digest_salt: digest_salt.into() }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let digest_salt = env::var("PULSECHECK_DIGEST_SALT")
            .map_err(|_| anyhow::Error::msg("expected PULSECHECK_DIGEST_SALT"))?;

        Ok(Self { digest_salt })
    }
}
