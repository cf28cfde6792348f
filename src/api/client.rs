use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::api::circuit::CircuitBreaker;
use crate::api::quota::{QuotaCost, QuotaTracker};
use crate::api::responses::{
    ChannelItem, PlaylistItem, PlaylistItemItem, SearchResultItem, VideoItem, YtList,
};
use crate::cache::{BoundedLru, CacheRegistry};
use crate::error::{IngestError, Result};
use crate::http::JsonHttpClient;
use crate::utils::parse_iso8601_duration;

/// The production Data API v3 base URL. Overridable via
/// [`YoutubeApiClient::with_base_url`] so integration tests can point the
/// client at a local mock server instead.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// A resolved video, as returned by `videos.list`, before engine-side
/// filtering and normalization (§4.3/§4.5 stage 3).
#[derive(Debug, Clone)]
pub struct RawVideo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: chrono::DateTime<Utc>,
    pub duration_seconds: u32,
    pub tags: Vec<String>,
    pub live_broadcast_content: String,
}

/// The channel resolved by `resolve_channel`.
#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    pub channel_id: String,
    pub title: String,
    pub uploads_playlist_id: String,
}

/// A channel reference tagged with the URL shape it was extracted from
/// (§4.5 stage 1's classifier). Carrying the origin lets `resolve_channel`
/// dispatch directly onto the probe the "Channel resolution algorithm"
/// (§4.3) names for that shape, rather than re-deriving it from the string
/// itself — a bare extracted name has no slash left in it regardless of
/// whether it came from a `/c/` or `/user/` URL, so guessing from shape
/// alone cannot tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelReference {
    /// A `UC…` channel ID extracted from a `/channel/UC…` URL.
    Id(String),
    /// An `@handle`, with the leading `@` retained.
    Handle(String),
    /// A legacy custom URL name extracted from a `/c/NAME` URL.
    Custom(String),
    /// A legacy username extracted from a `/user/NAME` URL.
    User(String),
}

impl ChannelReference {
    fn cache_key(&self) -> String {
        match self {
            ChannelReference::Id(v) => format!("id:{v}"),
            ChannelReference::Handle(v) => format!("handle:{v}"),
            ChannelReference::Custom(v) => format!("custom:{v}"),
            ChannelReference::User(v) => format!("user:{v}"),
        }
    }
}

/// Title metadata for a playlist, independent of its items.
#[derive(Debug, Clone)]
pub struct PlaylistMetadata {
    pub title: String,
}

/// A memoized lookup outcome: either the resolved value, or a record that the
/// lookup came back definitively empty. Caching `NotFound` is what lets a
/// repeated lookup of a channel/playlist that doesn't exist hit the cache
/// instead of re-issuing the upstream call and burning quota again (spec.md
/// §4.3: "the client records a negative cache entry on definitive not-found
/// to avoid re-querying").
#[derive(Debug, Clone)]
enum Cached<T> {
    Found(T),
    NotFound,
}

/// Negative entries expire sooner than positive ones: a channel or playlist
/// that doesn't exist yet may be created shortly after, so the absence isn't
/// worth remembering as long as a resolved title/ID is.
const NEGATIVE_LOOKUP_TTL: Duration = Duration::from_secs(5 * 60);

/// Client for the public YouTube Data API v3, implementing the operations of
/// §4.3: channel resolution, metadata lookups, paginated ID listing, and
/// batched video hydration, with quota accounting, a bounded LRU cache per
/// memoized surface, and a circuit breaker shared across all of them.
///
/// Grounded in the reference `YtApiClient` (search/get_video/get_playlist),
/// generalized from three ad-hoc GET calls into the six operations the
/// ingestion engine actually needs and adapted from `time`/`reqwest::Client`
/// raw calls to this crate's `chrono`/`JsonHttpClient` stack.
pub struct YoutubeApiClient {
    http: JsonHttpClient,
    base_url: String,
    api_key: String,
    quota: Arc<QuotaTracker>,
    circuit: CircuitBreaker,
    metadata_batch_size: usize,
    channel_cache: BoundedLru<String, Cached<ResolvedChannel>>,
    playlist_meta_cache: BoundedLru<String, Cached<PlaylistMetadata>>,
    video_cache: BoundedLru<String, RawVideo>,
    playlist_items_cache: BoundedLru<String, YtList<PlaylistItemItem>>,
    search_page_cache: BoundedLru<String, YtList<SearchResultItem>>,
}

impl YoutubeApiClient {
    pub fn new(
        api_key: impl Into<String>,
        timeout: Duration,
        cache_capacity: usize,
        metadata_batch_size: usize,
        registry: &CacheRegistry,
    ) -> Result<Self> {
        Self::with_base_url(
            api_key,
            DEFAULT_BASE_URL,
            timeout,
            cache_capacity,
            metadata_batch_size,
            registry,
        )
    }

    /// Builds a client against an arbitrary base URL, bypassing
    /// [`DEFAULT_BASE_URL`]. Used by integration tests to target a local mock
    /// server instead of the public Data API v3.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        cache_capacity: usize,
        metadata_batch_size: usize,
        registry: &CacheRegistry,
    ) -> Result<Self> {
        let channel_cache = BoundedLru::new(cache_capacity, Some(Duration::from_secs(30 * 60)));
        let playlist_meta_cache =
            BoundedLru::new(cache_capacity, Some(Duration::from_secs(30 * 60)));
        let video_cache = BoundedLru::new(cache_capacity, Some(Duration::from_secs(10 * 60)));
        // Pagination pages churn as channels/searches publish new videos, so
        // these get a much shorter TTL than the metadata caches above — just
        // enough to absorb retries and overlapping requests for the same page.
        let playlist_items_cache =
            BoundedLru::new(cache_capacity, Some(Duration::from_secs(60)));
        let search_page_cache = BoundedLru::new(cache_capacity, Some(Duration::from_secs(60)));
        registry.register("api.channel", channel_cache.handle());
        registry.register("api.playlist_meta", playlist_meta_cache.handle());
        registry.register("api.video", video_cache.handle());
        registry.register("api.playlist_items", playlist_items_cache.handle());
        registry.register("api.search_page", search_page_cache.handle());

        Ok(Self {
            http: JsonHttpClient::new(timeout)?,
            base_url: base_url.into(),
            api_key: api_key.into(),
            quota: Arc::new(QuotaTracker::new()),
            circuit: CircuitBreaker::new(),
            metadata_batch_size: metadata_batch_size.clamp(1, 50),
            channel_cache,
            playlist_meta_cache,
            video_cache,
            playlist_items_cache,
            search_page_cache,
        })
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    fn guard_circuit(&self) -> Result<()> {
        if self.circuit.is_open() {
            return Err(IngestError::QuotaExceeded);
        }
        Ok(())
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cost: QuotaCost,
    ) -> Result<T> {
        self.guard_circuit()?;
        let url = format!("{}/{path}", self.base_url);
        let mut full_query: Vec<(&str, &str)> = query.to_vec();
        full_query.push(("key", &self.api_key));
        self.quota.record(cost);

        match self.http.get_json::<T>(&url, &full_query).await {
            Ok(value) => {
                self.circuit.record_success();
                Ok(value)
            }
            Err(IngestError::QuotaExceeded) => {
                self.circuit.record_quota_exceeded();
                Err(IngestError::QuotaExceeded)
            }
            Err(err @ IngestError::ServiceUnavailable(_)) => {
                self.circuit.record_failure();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolves a channel ID, `@handle`, `/c/` custom name, or `/user/` name
    /// to its canonical ID and uploads-playlist ID, dispatching directly on
    /// the origin the classifier tagged the reference with — the probe
    /// order of §4.3's "Channel resolution algorithm" is a property of
    /// *where the reference came from*, not of what it looks like once
    /// extracted, so `ChannelReference` carries that origin instead of
    /// making this method re-derive it from string shape.
    pub async fn resolve_channel(&self, reference: &ChannelReference) -> Result<ResolvedChannel> {
        let cache_key = reference.cache_key();
        match self.channel_cache.get(&cache_key) {
            Some(Cached::Found(cached)) => return Ok(cached),
            Some(Cached::NotFound) => {
                return Err(IngestError::ResourceNotFound(format!(
                    "no channel matches {cache_key}"
                )))
            }
            None => {}
        }

        let result = match reference {
            ChannelReference::Id(id) => {
                self.get_channel_metadata(id).await.map(|meta| ResolvedChannel {
                    channel_id: id.clone(),
                    title: meta.title,
                    uploads_playlist_id: meta.uploads_playlist_id,
                })
            }
            ChannelReference::Handle(handle) => self.channel_by_param("forHandle", handle).await,
            // The Data API has no `forCustomUrl` probe; a `/c/` custom name
            // is, in practice, most often also usable as a handle, so it
            // takes the same `forHandle` probe as a bare handle before
            // falling through to the search probe inside `channel_by_param`.
            ChannelReference::Custom(name) => {
                self.channel_by_param("forHandle", &format!("@{name}")).await
            }
            ChannelReference::User(name) => self.channel_by_param("forUsername", name).await,
        };

        match &result {
            Ok(resolved) => {
                self.channel_cache.put(cache_key, Cached::Found(resolved.clone()));
            }
            Err(IngestError::ResourceNotFound(_)) => {
                self.channel_cache.put_with_ttl(
                    cache_key,
                    Cached::NotFound,
                    Some(NEGATIVE_LOOKUP_TTL),
                );
            }
            Err(_) => {}
        }

        result
    }

    async fn channel_by_param(&self, param: &str, value: &str) -> Result<ResolvedChannel> {
        let response: YtList<ChannelItem> = self
            .call(
                "channels",
                &[("part", "snippet,contentDetails"), (param, value)],
                QuotaCost::List,
            )
            .await?;

        if let Some(item) = response.items.into_iter().next() {
            return Ok(ResolvedChannel {
                channel_id: item.id,
                title: item.snippet.title,
                uploads_playlist_id: item.content_details.related_playlists.uploads,
            });
        }

        // forUsername/forHandle found nothing definitive; fall back to search,
        // the last probe in the declared order.
        let search: YtList<SearchResultItem> = self
            .call(
                "search",
                &[("part", "snippet"), ("type", "channel"), ("q", value), ("maxResults", "1")],
                QuotaCost::Search,
            )
            .await?;
        let Some(top) = search.items.into_iter().next() else {
            return Err(IngestError::ResourceNotFound(format!(
                "no channel matches {value}"
            )));
        };
        self.get_channel_metadata(&top.snippet.channel_id)
            .await
            .map(|meta| ResolvedChannel {
                channel_id: top.snippet.channel_id,
                title: meta.title,
                uploads_playlist_id: meta.uploads_playlist_id,
            })
    }

    pub async fn get_channel_metadata(&self, channel_id: &str) -> Result<ResolvedChannel> {
        let response: YtList<ChannelItem> = self
            .call(
                "channels",
                &[("part", "snippet,contentDetails"), ("id", channel_id)],
                QuotaCost::List,
            )
            .await?;
        response
            .items
            .into_iter()
            .next()
            .map(|item| ResolvedChannel {
                channel_id: item.id,
                title: item.snippet.title,
                uploads_playlist_id: item.content_details.related_playlists.uploads,
            })
            .ok_or_else(|| IngestError::ResourceNotFound(format!("channel {channel_id}")))
    }

    pub async fn get_playlist_metadata(&self, playlist_id: &str) -> Result<PlaylistMetadata> {
        match self.playlist_meta_cache.get(&playlist_id.to_string()) {
            Some(Cached::Found(cached)) => return Ok(cached),
            Some(Cached::NotFound) => {
                return Err(IngestError::ResourceNotFound(format!(
                    "playlist {playlist_id}"
                )))
            }
            None => {}
        }
        let response: YtList<PlaylistItem> = self
            .call(
                "playlists",
                &[("part", "snippet"), ("id", playlist_id)],
                QuotaCost::List,
            )
            .await?;
        let Some(item) = response.items.into_iter().next() else {
            self.playlist_meta_cache.put_with_ttl(
                playlist_id.to_string(),
                Cached::NotFound,
                Some(NEGATIVE_LOOKUP_TTL),
            );
            return Err(IngestError::ResourceNotFound(format!(
                "playlist {playlist_id}"
            )));
        };
        let metadata = PlaylistMetadata {
            title: item.snippet.title,
        };
        self.playlist_meta_cache
            .put(playlist_id.to_string(), Cached::Found(metadata.clone()));
        Ok(metadata)
    }

    /// Lists video IDs from a playlist in playlist order, applying the
    /// in-memory date filter described in §4.3 since `playlistItems.list`
    /// accepts no date parameters, and stopping at `max_items`.
    pub async fn list_playlist_video_ids(
        &self,
        playlist_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        max_items: usize,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        let mut previous_published_at: Option<chrono::DateTime<Utc>> = None;
        let mut reverse_chronological = true;

        loop {
            let page_cache_key = format!(
                "{playlist_id}|{}",
                page_token.as_deref().unwrap_or("")
            );
            let response = match self.playlist_items_cache.get(&page_cache_key) {
                Some(cached) => cached,
                None => {
                    let mut query: Vec<(&str, &str)> = vec![
                        ("part", "contentDetails"),
                        ("playlistId", playlist_id),
                        ("maxResults", "50"),
                    ];
                    if let Some(token) = page_token.as_deref() {
                        query.push(("pageToken", token));
                    }
                    let fetched: YtList<PlaylistItemItem> =
                        self.call("playlistItems", &query, QuotaCost::List).await?;
                    self.playlist_items_cache
                        .put(page_cache_key, fetched.clone());
                    fetched
                }
            };
            let next_page_token = response.next_page_token;

            for item in response.items {
                let published_at = item.content_details.video_published_at;

                if let (Some(prev), Some(current)) = (previous_published_at, published_at) {
                    if current > prev {
                        reverse_chronological = false;
                    }
                }
                previous_published_at = published_at.or(previous_published_at);

                if let Some(published_at) = published_at {
                    let date = published_at.date_naive();
                    let too_old = start_date.is_some_and(|start| date < start);
                    let too_new = end_date.is_some_and(|end| date > end);
                    if too_old && reverse_chronological {
                        return Ok(ids);
                    }
                    if too_old || too_new {
                        continue;
                    }
                }

                ids.push(item.content_details.video_id);
                if ids.len() >= max_items {
                    return Ok(ids);
                }
            }

            match next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    /// Searches for video IDs using `search.list`, applying `publishedAfter`/
    /// `publishedBefore` when dates are given.
    pub async fn search_video_ids(
        &self,
        query_text: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        max_items: usize,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        let published_after = start_date.map(|d| format!("{}T00:00:00Z", d));
        let published_before = end_date.map(|d| format!("{}T23:59:59Z", d));

        loop {
            let page_cache_key = format!(
                "{query_text}|{}|{}|{}",
                published_after.as_deref().unwrap_or(""),
                published_before.as_deref().unwrap_or(""),
                page_token.as_deref().unwrap_or("")
            );
            let response = match self.search_page_cache.get(&page_cache_key) {
                Some(cached) => cached,
                None => {
                    let mut query: Vec<(&str, &str)> = vec![
                        ("part", "snippet"),
                        ("type", "video"),
                        ("q", query_text),
                        ("maxResults", "50"),
                        ("order", "relevance"),
                    ];
                    if let Some(after) = published_after.as_deref() {
                        query.push(("publishedAfter", after));
                    }
                    if let Some(before) = published_before.as_deref() {
                        query.push(("publishedBefore", before));
                    }
                    if let Some(token) = page_token.as_deref() {
                        query.push(("pageToken", token));
                    }
                    let fetched: YtList<SearchResultItem> =
                        self.call("search", &query, QuotaCost::Search).await?;
                    self.search_page_cache.put(page_cache_key, fetched.clone());
                    fetched
                }
            };

            for item in response.items {
                if let Some(video_id) = item.id.video_id {
                    ids.push(video_id);
                    if ids.len() >= max_items {
                        return Ok(ids);
                    }
                }
            }

            match response.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    /// Hydrates video IDs into full records, batching requests in groups of
    /// at most 50 per `videos.list` call and preserving input order. Videos
    /// absent from the response (private/deleted) are silently dropped.
    pub async fn get_videos(&self, video_ids: &[String]) -> Result<Vec<RawVideo>> {
        let mut by_id = std::collections::HashMap::new();
        let mut to_fetch = Vec::new();

        for id in video_ids {
            if let Some(cached) = self.video_cache.get(id) {
                by_id.insert(id.clone(), cached);
            } else {
                to_fetch.push(id.clone());
            }
        }

        for batch in to_fetch.chunks(self.metadata_batch_size) {
            let ids_param = batch.join(",");
            let response: YtList<VideoItem> = self
                .call(
                    "videos",
                    &[("part", "snippet,contentDetails"), ("id", &ids_param)],
                    QuotaCost::List,
                )
                .await?;

            for item in response.items {
                let video = RawVideo {
                    id: item.id.clone(),
                    title: item.snippet.title,
                    description: item.snippet.description,
                    channel_id: item.snippet.channel_id,
                    channel_title: item.snippet.channel_title,
                    published_at: item.snippet.published_at,
                    duration_seconds: parse_iso8601_duration(&item.content_details.duration),
                    tags: item.snippet.tags,
                    live_broadcast_content: item.snippet.live_broadcast_content,
                };
                self.video_cache.put(item.id.clone(), video.clone());
                by_id.insert(item.id, video);
            }
        }

        Ok(video_ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }
}
