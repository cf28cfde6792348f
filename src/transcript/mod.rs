pub mod cues;
pub mod format;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};

use crate::cache::{BoundedLru, CacheRegistry};
use crate::error::{IngestError, Result};
use crate::http::JsonHttpClient;
use crate::types::Transcript;

use self::cues::{parse_json3, parse_timedtext_xml};
use self::format::format_cues;

/// Why a video has no usable transcript, distinguished so the engine and its
/// caller can tell "genuinely has none" from "YouTube blocked us here" (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    NoTranscripts,
    DisabledOrRegionBlocked,
}

#[derive(Debug, Clone)]
pub enum TranscriptOutcome {
    Found(Transcript),
    Missing(MissingReason),
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrackJson {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

/// Fetches and formats transcripts for a single video (§4.4). Grounded in the
/// reference `VideoDataFetcher`'s approach of fetching the watch page once
/// and extracting what it needs from the embedded player response, adapted
/// from that crate's HTML/JS-variable extractors to a single regex-bounded
/// JSON scan since this core only needs caption tracks, not full player data.
/// The production watch-page host. Overridable via
/// [`TranscriptSource::with_watch_base_url`] so integration tests can point
/// the source at a local mock server instead.
pub const DEFAULT_WATCH_BASE_URL: &str = "https://www.youtube.com";

pub struct TranscriptSource {
    http: Arc<JsonHttpClient>,
    watch_base_url: String,
    semaphore: Arc<Semaphore>,
    min_inter_request_delay: Duration,
    last_dispatch: Mutex<Option<std::time::Instant>>,
    positive_cache: BoundedLru<String, Transcript>,
    negative_cache: BoundedLru<String, MissingReason>,
}

impl TranscriptSource {
    pub fn new(
        http: Arc<JsonHttpClient>,
        concurrency: usize,
        cache_capacity: usize,
        registry: &CacheRegistry,
    ) -> Self {
        Self::with_watch_base_url(http, DEFAULT_WATCH_BASE_URL, concurrency, cache_capacity, registry)
    }

    /// Builds a transcript source fetching watch pages from an arbitrary
    /// base URL, bypassing [`DEFAULT_WATCH_BASE_URL`].
    pub fn with_watch_base_url(
        http: Arc<JsonHttpClient>,
        watch_base_url: impl Into<String>,
        concurrency: usize,
        cache_capacity: usize,
        registry: &CacheRegistry,
    ) -> Self {
        let positive_cache = BoundedLru::new(cache_capacity, Some(Duration::from_secs(30 * 60)));
        let negative_cache = BoundedLru::new(cache_capacity, Some(Duration::from_secs(6 * 60 * 60)));
        registry.register("transcript.positive", positive_cache.handle());
        registry.register("transcript.negative", negative_cache.handle());

        Self {
            http,
            watch_base_url: watch_base_url.into(),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            min_inter_request_delay: Duration::from_millis(250),
            last_dispatch: Mutex::new(None),
            positive_cache,
            negative_cache,
        }
    }

    pub async fn fetch(
        &self,
        video_id: &str,
        interval_seconds: u32,
        preferred_languages: &[String],
    ) -> Result<TranscriptOutcome> {
        let cache_key = format!(
            "{video_id}|{interval_seconds}|{}",
            preferred_languages.join(",")
        );
        if let Some(cached) = self.positive_cache.get(&cache_key) {
            return Ok(TranscriptOutcome::Found(cached));
        }
        if let Some(reason) = self.negative_cache.get(&video_id.to_string()) {
            return Ok(TranscriptOutcome::Missing(reason));
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| IngestError::Internal("transcript semaphore closed".into()))?;
        self.wait_for_throttle().await;

        let outcome = self
            .fetch_uncached(video_id, interval_seconds, preferred_languages)
            .await?;

        match &outcome {
            TranscriptOutcome::Found(transcript) => {
                self.positive_cache.put(cache_key, transcript.clone());
            }
            TranscriptOutcome::Missing(reason) => {
                self.negative_cache.put(video_id.to_string(), *reason);
            }
        }

        Ok(outcome)
    }

    async fn wait_for_throttle(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_inter_request_delay {
                tokio::time::sleep(self.min_inter_request_delay - elapsed).await;
            }
        }
        *last = Some(std::time::Instant::now());
    }

    async fn fetch_uncached(
        &self,
        video_id: &str,
        interval_seconds: u32,
        preferred_languages: &[String],
    ) -> Result<TranscriptOutcome> {
        let watch_url = format!("{}/watch?v={video_id}&hl=en", self.watch_base_url);
        let html = match self.get_text_retrying_transport_errors_once(&watch_url).await {
            Ok(html) => html,
            Err(IngestError::ResourceNotFound(_)) => {
                return Ok(TranscriptOutcome::Missing(MissingReason::NoTranscripts));
            }
            Err(_) => return Ok(TranscriptOutcome::Missing(MissingReason::NoTranscripts)),
        };

        let tracks = extract_caption_tracks(&html);
        if tracks.is_empty() {
            return Ok(TranscriptOutcome::Missing(classify_empty_tracks(&html)));
        }

        let Some(track) = select_track(&tracks, preferred_languages) else {
            return Ok(TranscriptOutcome::Missing(MissingReason::NoTranscripts));
        };

        let body = match self.get_text_retrying_transport_errors_once(&track.base_url).await {
            Ok(body) => body,
            Err(_) => return Ok(TranscriptOutcome::Missing(MissingReason::NoTranscripts)),
        };
        let cues = if track.base_url.contains("fmt=json3") {
            parse_json3(&body)
        } else {
            parse_timedtext_xml(&body)
        };

        if cues.is_empty() {
            return Ok(TranscriptOutcome::Missing(MissingReason::NoTranscripts));
        }

        Ok(TranscriptOutcome::Found(Transcript {
            language: track.language_code.clone(),
            formatted_text: format_cues(&cues, interval_seconds),
        }))
    }

    /// A transport-level failure (network timeout, connection reset) fetching
    /// a transcript resource is retried exactly once before the caller falls
    /// back to `TranscriptMissing`; this is distinct from `JsonHttpClient`'s
    /// own per-request retry loop, which only covers a single HTTP attempt.
    async fn get_text_retrying_transport_errors_once(&self, url: &str) -> Result<String> {
        match self.http.get_text(url).await {
            Ok(body) => Ok(body),
            Err(IngestError::ResourceNotFound(reason)) => {
                Err(IngestError::ResourceNotFound(reason))
            }
            Err(_) => self.http.get_text(url).await,
        }
    }
}

struct CaptionTrack {
    base_url: String,
    language_code: String,
    is_auto_generated: bool,
}

fn classify_empty_tracks(html: &str) -> MissingReason {
    if html.contains("\"status\":\"LOGIN_REQUIRED\"") || html.contains("\"reason\":\"Private video\"")
    {
        MissingReason::DisabledOrRegionBlocked
    } else {
        MissingReason::NoTranscripts
    }
}

/// Extracts `captions.playerCaptionsTracklistRenderer.captionTracks` from
/// the `ytInitialPlayerResponse` assignment embedded in a watch-page
/// response, without parsing the entire (much larger) player response.
fn extract_caption_tracks(html: &str) -> Vec<CaptionTrack> {
    let Some(json) = extract_balanced_json(html, "ytInitialPlayerResponse") else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<Value>(&json) else {
        return Vec::new();
    };

    let Some(raw_tracks) = value
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    raw_tracks
        .iter()
        .filter_map(|raw| {
            let track: CaptionTrackJson = serde_json::from_value(raw.clone()).ok()?;
            Some(CaptionTrack {
                is_auto_generated: track.kind.as_deref() == Some("asr"),
                base_url: track.base_url,
                language_code: track.language_code,
            })
        })
        .collect()
}

fn extract_balanced_json(html: &str, variable_name: &str) -> Option<String> {
    let marker = format!("{variable_name} = ");
    let start = html.find(&marker)? + marker.len();
    let rest = &html[start..];
    let bytes = rest.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(rest[..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Picks the track matching the first language in `preferred_languages`,
/// preferring an exact manual-caption match over an exact auto-generated
/// match for that same language before moving to the next preferred
/// language (the resolved tie-break for ties between manual and
/// auto-generated tracks of equal preference rank).
fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    preferred_languages: &[String],
) -> Option<&'a CaptionTrack> {
    for lang in preferred_languages {
        if let Some(track) = tracks
            .iter()
            .find(|t| !t.is_auto_generated && t.language_code == *lang)
        {
            return Some(track);
        }
    }
    for lang in preferred_languages {
        if let Some(track) = tracks.iter().find(|t| t.language_code == *lang) {
            return Some(track);
        }
    }
    tracks
        .iter()
        .find(|t| !t.is_auto_generated)
        .or_else(|| tracks.first())
}
