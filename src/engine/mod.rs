pub mod classify;
pub mod dedup;
pub mod digest;
pub mod normalize;

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::api::client::{RawVideo, YoutubeApiClient};
use crate::cache::CacheRegistry;
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::http::JsonHttpClient;
use crate::memory::MemoryMonitor;
use crate::token::TokenCounter;
use crate::transcript::{TranscriptOutcome, TranscriptSource};
use crate::types::{IngestRequest, IngestResult, SourceKind, VideoRecord};

use self::classify::{classify, Classification};
use self::dedup::InFlightRegistry;

/// The ingestion core's sole public operation (§4.5). Owns every shared
/// component — API client, transcript source, caches, token counter — and
/// exposes `ingest()` as the one entry point, the way the teacher crate's
/// manager owned its clients and exposed load/search as its surface.
pub struct IngestionEngine {
    config: IngestConfig,
    api: YoutubeApiClient,
    transcripts: TranscriptSource,
    tokens: TokenCounter,
    in_flight: InFlightRegistry,
    engine_semaphore: Arc<tokio::sync::Semaphore>,
    cache_registry: Arc<CacheRegistry>,
    #[allow(dead_code)]
    memory_monitor: MemoryMonitor,
}

impl IngestionEngine {
    pub fn new(config: IngestConfig) -> Result<Self> {
        Self::with_endpoints(
            config,
            crate::api::client::DEFAULT_BASE_URL,
            crate::transcript::DEFAULT_WATCH_BASE_URL,
        )
    }

    /// Builds an engine whose API client and transcript source point at
    /// arbitrary base URLs instead of the public YouTube surfaces. Used by
    /// integration tests to drive the full pipeline against a local mock
    /// server.
    pub fn with_endpoints(
        config: IngestConfig,
        api_base_url: impl Into<String>,
        watch_base_url: impl Into<String>,
    ) -> Result<Self> {
        let cache_registry = Arc::new(CacheRegistry::new());
        let http = Arc::new(JsonHttpClient::new(config.request_deadline)?);

        let api = YoutubeApiClient::with_base_url(
            config.youtube_api_key.clone(),
            api_base_url,
            config.request_deadline,
            config.cache_capacity_default,
            config.metadata_batch_size,
            &cache_registry,
        )?;
        let transcripts = TranscriptSource::with_watch_base_url(
            http,
            watch_base_url,
            config.transcript_concurrency,
            config.cache_capacity_default,
            &cache_registry,
        );
        let tokens = TokenCounter::new(config.cache_capacity_default, &cache_registry)?;
        let memory_monitor = MemoryMonitor::spawn(
            cache_registry.clone(),
            config.memory_soft_cap_bytes,
            config.memory_high_water_fraction,
        );

        Ok(Self {
            engine_semaphore: Arc::new(tokio::sync::Semaphore::new(config.engine_concurrency)),
            config,
            api,
            transcripts,
            tokens,
            in_flight: InFlightRegistry::new(),
            cache_registry,
            memory_monitor,
        })
    }

    pub fn cache_registry(&self) -> &Arc<CacheRegistry> {
        &self.cache_registry
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResult> {
        request.validate()?;
        let fingerprint = request.fingerprint();

        self.in_flight
            .run_or_join(fingerprint, || self.run_with_deadline(request))
            .await
    }

    async fn run_with_deadline(&self, request: IngestRequest) -> Result<IngestResult> {
        tokio::time::timeout(self.config.request_deadline, self.run_pipeline(request))
            .await
            .map_err(|_| IngestError::Timeout)?
    }

    async fn run_pipeline(&self, request: IngestRequest) -> Result<IngestResult> {
        let started_at = Instant::now();
        let (calls_before, units_before) =
            (self.api.quota().call_count(), self.api.quota().units_used());

        let classification = classify(&request.url_or_query);
        let resolved = self
            .resolve(
                classification,
                request.start_date,
                request.end_date,
                self.config.max_videos_per_request,
            )
            .await?;

        let mut videos = self.fetch_metadata(&resolved.video_ids).await?;
        self.filter(&mut videos, request.start_date, request.end_date);

        if request.include_transcript {
            self.fetch_transcripts(&mut videos, request.transcript_interval_seconds)
                .await;
        }

        order_videos(&mut videos, resolved.kind);

        for video in &mut videos {
            video.title = normalize::normalize_title(&video.title);
            video.description_clean = if request.include_description {
                normalize::normalize_text(&video.description_raw)
            } else {
                String::new()
            };
        }

        let source_name = finalize_source_name(&resolved, &videos);
        let digest_text = digest::assemble_digest(
            &source_name,
            &videos,
            request.include_description,
            request.include_transcript,
        );
        let token_count = self.tokens.count(&digest_text);

        let (calls_after, units_after) =
            (self.api.quota().call_count(), self.api.quota().units_used());

        Ok(IngestResult {
            source_name,
            video_count: videos.len(),
            digest_text,
            token_count,
            videos,
            processing_time_ms: started_at.elapsed().as_millis() as u64,
            api_call_count: calls_after.saturating_sub(calls_before),
            api_quota_used: units_after.saturating_sub(units_before),
            high_quota_cost: resolved.high_quota_cost,
        })
    }

    async fn resolve(
        &self,
        classification: Classification,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        max_items: usize,
    ) -> Result<ResolvedCandidate> {
        match classification {
            Classification::Video { video_id } => {
                if !VideoRecord::is_valid_id(&video_id) {
                    return Err(IngestError::InvalidInput(format!(
                        "'{video_id}' is not a valid video id"
                    )));
                }
                Ok(ResolvedCandidate {
                    kind: SourceKind::Video,
                    display_name: None,
                    video_ids: vec![video_id],
                    high_quota_cost: false,
                })
            }
            Classification::Playlist { playlist_id } => {
                let metadata = self.api.get_playlist_metadata(&playlist_id).await?;
                let video_ids = self
                    .api
                    .list_playlist_video_ids(&playlist_id, start_date, end_date, max_items)
                    .await?;
                Ok(ResolvedCandidate {
                    kind: SourceKind::Playlist,
                    display_name: Some(metadata.title),
                    video_ids,
                    high_quota_cost: false,
                })
            }
            Classification::Channel { reference } => {
                let channel = self.api.resolve_channel(&reference).await?;
                let video_ids = self
                    .api
                    .list_playlist_video_ids(
                        &channel.uploads_playlist_id,
                        start_date,
                        end_date,
                        max_items,
                    )
                    .await?;
                Ok(ResolvedCandidate {
                    kind: SourceKind::Channel,
                    display_name: Some(channel.title),
                    video_ids,
                    high_quota_cost: false,
                })
            }
            Classification::Search { query } => {
                let video_ids = self
                    .api
                    .search_video_ids(&query, start_date, end_date, max_items)
                    .await?;
                Ok(ResolvedCandidate {
                    kind: SourceKind::Search,
                    display_name: Some(query),
                    video_ids,
                    high_quota_cost: true,
                })
            }
            Classification::Invalid => Err(IngestError::InvalidInput(
                "input looks like a URL but does not match a known YouTube resource".to_string(),
            )),
        }
    }

    async fn fetch_metadata(&self, video_ids: &[String]) -> Result<Vec<VideoRecord>> {
        let mut seen = std::collections::HashSet::new();
        let mut deduped_ids = Vec::with_capacity(video_ids.len());
        for id in video_ids {
            if seen.insert(id.clone()) {
                deduped_ids.push(id.clone());
            }
        }

        let raw_videos = self.api.get_videos(&deduped_ids).await?;
        let raw_by_id: std::collections::HashMap<String, RawVideo> =
            raw_videos.into_iter().map(|v| (v.id.clone(), v)).collect();

        Ok(deduped_ids
            .into_iter()
            .enumerate()
            .filter_map(|(origin_index, id)| {
                let raw = raw_by_id.get(&id)?;
                if raw.live_broadcast_content == "live" || raw.live_broadcast_content == "upcoming"
                {
                    return None;
                }
                Some(VideoRecord {
                    id: raw.id.clone(),
                    title: raw.title.clone(),
                    description_raw: raw.description.clone(),
                    description_clean: String::new(),
                    channel_id: raw.channel_id.clone(),
                    channel_title: raw.channel_title.clone(),
                    published_at: raw.published_at,
                    duration: raw.duration_seconds,
                    tags: raw.tags.clone(),
                    transcript: None,
                    origin_index,
                })
            })
            .collect())
    }

    fn filter(
        &self,
        videos: &mut Vec<VideoRecord>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) {
        filter_videos(
            videos,
            start_date,
            end_date,
            self.config.min_duration_seconds,
        );
    }

    async fn fetch_transcripts(&self, videos: &mut [VideoRecord], interval_seconds: u32) {
        let preferred_languages = self.config.preferred_transcript_languages.clone();
        let mut tasks = FuturesUnordered::new();

        for (position, video) in videos.iter().enumerate() {
            let video_id = video.id.clone();
            let preferred_languages = preferred_languages.clone();
            let semaphore = self.engine_semaphore.clone();
            let transcripts = &self.transcripts;
            tasks.push(async move {
                let _permit = semaphore.acquire().await;
                let outcome = transcripts
                    .fetch(&video_id, interval_seconds, &preferred_languages)
                    .await;
                (position, outcome)
            });
        }

        while let Some((position, outcome)) = tasks.next().await {
            if let Ok(TranscriptOutcome::Found(transcript)) = outcome {
                videos[position].transcript = Some(transcript);
            }
        }
    }
}

/// The resolve stage's output: the fields of the public `ResolvedSource`
/// value (§3) needed downstream, plus the video IDs it yielded — the IDs
/// are internal to the pipeline and not part of the public data model.
struct ResolvedCandidate {
    kind: SourceKind,
    display_name: Option<String>,
    video_ids: Vec<String>,
    high_quota_cost: bool,
}

fn filter_videos(
    videos: &mut Vec<VideoRecord>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    min_duration_seconds: u32,
) {
    videos.retain(|video| {
        let date = video.published_at.date_naive();
        if start_date.is_some_and(|start| date < start) {
            return false;
        }
        if end_date.is_some_and(|end| date > end) {
            return false;
        }
        if video.duration < min_duration_seconds {
            return false;
        }
        true
    });
}

fn order_videos(videos: &mut [VideoRecord], kind: SourceKind) {
    match kind {
        SourceKind::Playlist | SourceKind::Video => {
            videos.sort_by_key(|v| v.origin_index);
        }
        SourceKind::Channel | SourceKind::Search => {
            videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        }
    }
}

fn finalize_source_name(resolved: &ResolvedCandidate, videos: &[VideoRecord]) -> String {
    match resolved.kind {
        SourceKind::Video => videos
            .first()
            .map(|v| v.title.clone())
            .unwrap_or_else(|| resolved.video_ids.first().cloned().unwrap_or_default()),
        SourceKind::Search => {
            let query = resolved.display_name.clone().unwrap_or_default();
            format!("{query} ({} videos)", videos.len())
        }
        SourceKind::Playlist | SourceKind::Channel => {
            resolved.display_name.clone().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn video(id: &str, origin_index: usize, published_at_day: u32) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            title: format!("Title {id}"),
            description_raw: String::new(),
            description_clean: String::new(),
            channel_id: "UC1".to_string(),
            channel_title: "Channel".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 1, published_at_day, 0, 0, 0).unwrap(),
            duration: 120,
            tags: vec![],
            transcript: None,
            origin_index,
        }
    }

    #[test]
    fn playlist_kind_keeps_origin_order() {
        let mut videos = vec![video("c", 2, 3), video("a", 0, 1), video("b", 1, 2)];
        order_videos(&mut videos, SourceKind::Playlist);
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn channel_kind_sorts_by_published_at_descending() {
        let mut videos = vec![video("old", 0, 1), video("new", 1, 20)];
        order_videos(&mut videos, SourceKind::Channel);
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn search_kind_sorts_by_published_at_descending() {
        let mut videos = vec![video("old", 0, 1), video("new", 1, 20)];
        order_videos(&mut videos, SourceKind::Search);
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn search_source_name_annotates_video_count() {
        let resolved = ResolvedCandidate {
            kind: SourceKind::Search,
            display_name: Some("LLM Explained".to_string()),
            video_ids: vec![],
            high_quota_cost: true,
        };
        let videos = vec![video("a", 0, 1), video("b", 1, 2)];
        assert_eq!(
            finalize_source_name(&resolved, &videos),
            "LLM Explained (2 videos)"
        );
    }

    #[test]
    fn filter_drops_videos_outside_date_range() {
        let mut videos = vec![video("a", 0, 1), video("b", 1, 15), video("c", 2, 31)];
        filter_videos(
            &mut videos,
            NaiveDate::from_ymd_opt(2024, 1, 10),
            NaiveDate::from_ymd_opt(2024, 1, 20),
            0,
        );
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn filter_admits_videos_on_exact_boundary_day() {
        let mut videos = vec![video("a", 0, 10)];
        let day = NaiveDate::from_ymd_opt(2024, 1, 10);
        filter_videos(&mut videos, day, day, 0);
        assert_eq!(videos.len(), 1);
    }

    #[test]
    fn filter_drops_videos_shorter_than_minimum_duration() {
        let mut short = video("short", 0, 1);
        short.duration = 30;
        let mut videos = vec![short];
        filter_videos(&mut videos, None, None, 60);
        assert!(videos.is_empty());
    }

    #[test]
    fn video_source_name_falls_back_to_id_when_video_missing() {
        let resolved = ResolvedCandidate {
            kind: SourceKind::Video,
            display_name: None,
            video_ids: vec!["dQw4w9WgXcQ".to_string()],
            high_quota_cost: false,
        };
        assert_eq!(finalize_source_name(&resolved, &[]), "dQw4w9WgXcQ");
    }
}
