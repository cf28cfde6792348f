use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

static VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

/// One of the four shapes the ingestion core resolves an input into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Video,
    Playlist,
    Channel,
    Search,
}

/// A validated, trimmed ingest request (the core's sole entry argument).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub url_or_query: String,
    pub include_transcript: bool,
    pub include_description: bool,
    pub transcript_interval_seconds: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl IngestRequest {
    pub fn new(url_or_query: impl Into<String>) -> Self {
        Self {
            url_or_query: url_or_query.into(),
            include_transcript: true,
            include_description: true,
            transcript_interval_seconds: 10,
            start_date: None,
            end_date: None,
        }
    }

    /// Validate the request per §3/§7. Does not touch the network.
    pub fn validate(&self) -> Result<()> {
        let trimmed = self.url_or_query.trim();
        if trimmed.is_empty() {
            return Err(IngestError::InvalidInput("url_or_query is empty".into()));
        }
        if self.url_or_query.chars().count() > 2000 {
            return Err(IngestError::InvalidInput(
                "url_or_query exceeds 2000 characters".into(),
            ));
        }
        if ![0, 10, 20, 30, 60].contains(&self.transcript_interval_seconds) {
            return Err(IngestError::InvalidInput(
                "transcript_interval_seconds must be one of 0, 10, 20, 30, 60".into(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(IngestError::InvalidInput(
                    "start_date is after end_date".into(),
                ));
            }
        }
        Ok(())
    }

    /// A deterministic fingerprint of the parts of the request that affect the
    /// result, used for in-flight deduplication (§4.5) and cache keys.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.url_or_query.trim(),
            self.include_transcript,
            self.include_description,
            self.transcript_interval_seconds,
            self.start_date.map(|d| d.to_string()).unwrap_or_default(),
            self.end_date.map(|d| d.to_string()).unwrap_or_default(),
        )
    }
}

/// The entity named by a request, after classification and resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub kind: SourceKind,
    pub canonical_id: String,
    pub display_name: String,
    pub high_quota_cost: bool,
}

/// A formatted transcript attached to a `VideoRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub language: String,
    pub formatted_text: String,
}

/// A single ingested video, as it will appear in the digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub description_raw: String,
    pub description_clean: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub duration: u32,
    pub tags: Vec<String>,
    pub transcript: Option<Transcript>,
    pub origin_index: usize,
}

impl VideoRecord {
    pub fn is_valid_id(id: &str) -> bool {
        VIDEO_ID_RE.is_match(id)
    }
}

/// The product of one `ingest()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub source_name: String,
    pub video_count: usize,
    pub digest_text: String,
    pub token_count: usize,
    pub videos: Vec<VideoRecord>,
    pub processing_time_ms: u64,
    pub api_call_count: u64,
    pub api_quota_used: u64,
    pub high_quota_cost: bool,
}
