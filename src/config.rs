use crate::error::{IngestError, Result};
use std::env;
use std::time::Duration;

/// Tunables recognized by the ingestion core (§6 of the specification).
///
/// Everything here has a documented default and can be overridden by the
/// matching environment variable. Construction validates eagerly: a missing or
/// empty `YOUTUBE_API_KEY` fails at `from_env()` time rather than on first use,
/// the way the teacher crate's plugin configuration validates up front.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub youtube_api_key: String,
    pub max_videos_per_request: usize,
    pub metadata_batch_size: usize,
    pub min_duration_seconds: u32,
    pub transcript_concurrency: usize,
    pub engine_concurrency: usize,
    pub request_deadline: Duration,
    pub cache_capacity_default: usize,
    pub memory_high_water_fraction: f64,
    pub memory_soft_cap_bytes: u64,
    pub preferred_transcript_languages: Vec<String>,
}

impl IngestConfig {
    /// Build a configuration from environment variables, applying the defaults
    /// documented in the specification for anything unset.
    pub fn from_env() -> Result<Self> {
        let youtube_api_key = env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                IngestError::ApiConfigError("YOUTUBE_API_KEY is not set".to_string())
            })?;

        let max_videos_per_request = env_usize("MAX_VIDEOS_PER_REQUEST", 200)?;
        let metadata_batch_size = env_usize("METADATA_BATCH_SIZE", 50)?.min(50);
        let min_duration_seconds = env_usize("MIN_DURATION_SECONDS", 0)? as u32;
        let transcript_concurrency = env_usize("TRANSCRIPT_CONCURRENCY", 4)?;
        let engine_concurrency = env_usize("ENGINE_CONCURRENCY", 8)?;
        let request_deadline_seconds = env_usize("REQUEST_DEADLINE_SECONDS", 120)?;
        let cache_capacity_default = env_usize("CACHE_CAPACITY_DEFAULT", 1024)?;
        let memory_high_water_fraction = env_f64("MEMORY_HIGH_WATER_FRACTION", 0.75)?;
        let memory_soft_cap_bytes = env_u64("MEMORY_SOFT_CAP_BYTES", 1_073_741_824)?;

        let preferred_transcript_languages = env::var("PREFERRED_TRANSCRIPT_LANGUAGES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec!["en".to_string()]);

        Ok(Self {
            youtube_api_key,
            max_videos_per_request,
            metadata_batch_size,
            min_duration_seconds,
            transcript_concurrency,
            engine_concurrency,
            request_deadline: Duration::from_secs(request_deadline_seconds as u64),
            cache_capacity_default,
            memory_high_water_fraction,
            memory_soft_cap_bytes,
            preferred_transcript_languages,
        })
    }

    /// Build a configuration directly, bypassing the environment. Used by tests
    /// and by callers that source configuration from elsewhere.
    pub fn with_api_key(youtube_api_key: impl Into<String>) -> Self {
        Self {
            youtube_api_key: youtube_api_key.into(),
            max_videos_per_request: 200,
            metadata_batch_size: 50,
            min_duration_seconds: 0,
            transcript_concurrency: 4,
            engine_concurrency: 8,
            request_deadline: Duration::from_secs(120),
            cache_capacity_default: 1024,
            memory_high_water_fraction: 0.75,
            memory_soft_cap_bytes: 1_073_741_824,
            preferred_transcript_languages: vec!["en".to_string()],
        }
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|_| IngestError::ApiConfigError(format!("{name} must be an integer"))),
        Err(_) => Ok(default),
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| IngestError::ApiConfigError(format!("{name} must be an integer"))),
        Err(_) => Ok(default),
    }
}

fn env_f64(name: &str, default: f64) -> Result<f64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<f64>()
            .map_err(|_| IngestError::ApiConfigError(format!("{name} must be a number"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specification() {
        let config = IngestConfig::with_api_key("test-key");
        assert_eq!(config.max_videos_per_request, 200);
        assert_eq!(config.metadata_batch_size, 50);
        assert_eq!(config.transcript_concurrency, 4);
        assert_eq!(config.engine_concurrency, 8);
        assert_eq!(config.request_deadline, Duration::from_secs(120));
        assert_eq!(config.preferred_transcript_languages, vec!["en".to_string()]);
    }
}
