//! End-to-end tests driving `IngestionEngine::ingest` against a mock YouTube
//! Data API v3 and a mock watch-page/transcript backend, covering the
//! literal scenarios and cross-cutting invariants as specified.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use youtubingest::{IngestConfig, IngestError, IngestRequest, IngestionEngine};

fn config() -> IngestConfig {
    let mut config = IngestConfig::with_api_key("test-key");
    config.request_deadline = Duration::from_secs(10);
    config
}

async fn engine_against(mock: &MockServer) -> IngestionEngine {
    let api_base_url = format!("{}/youtube/v3", mock.uri());
    IngestionEngine::with_endpoints(config(), api_base_url, mock.uri()).unwrap()
}

fn video_item(
    id: &str,
    title: &str,
    channel_title: &str,
    published_at: &str,
    duration: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "snippet": {
            "publishedAt": published_at,
            "channelId": "UC0000000000000000000001",
            "title": title,
            "description": "A plain description with no promo trailers.",
            "channelTitle": channel_title,
            "tags": [],
            "liveBroadcastContent": "none",
        },
        "contentDetails": { "duration": duration },
    })
}

async fn mount_videos(mock: &MockServer, id_param: &str, items: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .and(query_param("id", id_param))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(mock)
        .await;
}

/// Mounts a watch page with no embedded player response at all, the shape
/// that makes caption-track extraction come up empty (§4.4 "no transcripts").
async fn mount_watch_page_without_captions(mock: &MockServer, video_id: &str) {
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", video_id))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no player data here</html>"))
        .mount(mock)
        .await;
}

/// Mounts a watch page whose embedded player response advertises one manual
/// English caption track, plus the timedtext XML body for that track.
async fn mount_watch_page_with_transcript(mock: &MockServer, video_id: &str) {
    let track_url = format!("{}/timedtext/{video_id}", mock.uri());
    let player_response = json!({
        "captions": {
            "playerCaptionsTracklistRenderer": {
                "captionTracks": [
                    { "baseUrl": track_url, "languageCode": "en" }
                ]
            }
        }
    });
    let html = format!(
        "<html><script>var ytInitialPlayerResponse = {player_response}; var ytcfg = {{}};</script></html>"
    );
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", video_id))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(mock)
        .await;

    let xml = r#"<transcript><text start="0.0" dur="5.0">Hello world</text><text start="12.0" dur="5.0">More text follows</text></transcript>"#;
    Mock::given(method("GET"))
        .and(path(format!("/timedtext/{video_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml))
        .mount(mock)
        .await;
}

// ---- Scenario 1: single video, default flags, interval=0 ----

#[tokio::test]
async fn single_video_produces_one_record_with_expected_digest_shape() {
    let mock = MockServer::start().await;
    let video_id = "dQw4w9WgXcQ";

    mount_videos(
        &mock,
        video_id,
        vec![video_item(
            video_id,
            "Intro to LLMs",
            "Test Channel",
            "2024-05-01T00:00:00Z",
            "PT10M0S",
        )],
    )
    .await;
    mount_watch_page_without_captions(&mock, video_id).await;

    let engine = engine_against(&mock).await;
    let mut request = IngestRequest::new(format!("https://www.youtube.com/watch?v={video_id}"));
    request.transcript_interval_seconds = 0;

    let result = engine.ingest(request).await.unwrap();

    assert_eq!(result.video_count, 1);
    assert!(result.digest_text.starts_with("# Source: Intro to LLMs"));
    assert!(result
        .digest_text
        .contains(&format!("URL: https://youtu.be/{video_id}")));
    assert!(result.api_call_count >= 1);
    assert!(result.api_quota_used >= 1);
    assert!(!result.high_quota_cost);
}

// ---- Scenario 2: search query, interval=10 ----

#[tokio::test]
async fn search_query_is_high_quota_cost_and_orders_by_published_at_descending() {
    let mock = MockServer::start().await;
    let older_id = "AAAAAAAAAAA";
    let newer_id = "BBBBBBBBBBB";

    Mock::given(method("GET"))
        .and(path("/youtube/v3/search"))
        .and(query_param("q", "LLM Explained"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": { "kind": "youtube#video", "videoId": older_id },
                    "snippet": {
                        "publishedAt": "2023-01-01T00:00:00Z",
                        "channelId": "UC0000000000000000000002",
                        "title": "LLMs Part 1",
                        "description": "desc",
                        "channelTitle": "Channel A",
                    },
                },
                {
                    "id": { "kind": "youtube#video", "videoId": newer_id },
                    "snippet": {
                        "publishedAt": "2024-06-01T00:00:00Z",
                        "channelId": "UC0000000000000000000002",
                        "title": "LLMs Part 2",
                        "description": "desc",
                        "channelTitle": "Channel A",
                    },
                },
            ],
        })))
        .mount(&mock)
        .await;

    mount_videos(
        &mock,
        &format!("{older_id},{newer_id}"),
        vec![
            video_item(older_id, "LLMs Part 1", "Channel A", "2023-01-01T00:00:00Z", "PT5M0S"),
            video_item(newer_id, "LLMs Part 2", "Channel A", "2024-06-01T00:00:00Z", "PT6M0S"),
        ],
    )
    .await;
    mount_watch_page_with_transcript(&mock, older_id).await;
    mount_watch_page_with_transcript(&mock, newer_id).await;

    let engine = engine_against(&mock).await;
    let mut request = IngestRequest::new("LLM Explained");
    request.transcript_interval_seconds = 10;

    let result = engine.ingest(request).await.unwrap();

    assert!(result.high_quota_cost);
    assert!(result.api_quota_used >= 100);
    let ids: Vec<&str> = result.videos.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec![newer_id, older_id]);

    for video in &result.videos {
        let transcript = video.transcript.as_ref().expect("transcript present");
        for line in transcript.formatted_text.lines() {
            assert!(
                regex_timestamp_prefix(line),
                "line does not start with a bucket timestamp: {line}"
            );
        }
    }
}

fn regex_timestamp_prefix(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 11
        && bytes[0] == b'['
        && bytes[1..3].iter().all(u8::is_ascii_digit)
        && bytes[3] == b':'
        && bytes[4..6].iter().all(u8::is_ascii_digit)
        && bytes[6] == b':'
        && bytes[7..9].iter().all(u8::is_ascii_digit)
        && bytes[9] == b']'
        && bytes[10] == b' '
}

// ---- Scenario 3: channel handle with a date range ----

#[tokio::test]
async fn channel_handle_filters_to_date_range_and_names_source_after_channel_title() {
    let mock = MockServer::start().await;
    let uploads_playlist_id = "UUuploadsplaylist0001";
    let in_range_id = "CCCCCCCCCCC";
    let out_of_range_id = "DDDDDDDDDDD";

    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .and(query_param("forHandle", "@NeuralNine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "UC0000000000000000000003",
                "snippet": { "title": "NeuralNine" },
                "contentDetails": {
                    "relatedPlaylists": { "uploads": uploads_playlist_id },
                },
            }],
        })))
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("playlistId", uploads_playlist_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "contentDetails": {
                        "videoId": in_range_id,
                        "videoPublishedAt": "2024-01-15T00:00:00Z",
                    },
                },
                {
                    "contentDetails": {
                        "videoId": out_of_range_id,
                        "videoPublishedAt": "2023-12-01T00:00:00Z",
                    },
                },
            ],
        })))
        .mount(&mock)
        .await;

    mount_videos(
        &mock,
        in_range_id,
        vec![video_item(
            in_range_id,
            "January Upload",
            "NeuralNine",
            "2024-01-15T00:00:00Z",
            "PT8M0S",
        )],
    )
    .await;
    mount_watch_page_without_captions(&mock, in_range_id).await;

    let engine = engine_against(&mock).await;
    let mut request = IngestRequest::new("https://www.youtube.com/@NeuralNine");
    request.start_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1);
    request.end_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 31);

    let result = engine.ingest(request).await.unwrap();

    assert_eq!(result.source_name, "NeuralNine");
    assert_eq!(result.video_count, 1);
    for video in &result.videos {
        let date = video.published_at.date_naive();
        assert!(date >= chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(date <= chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }
}

// ---- Scenario 4: playlist with include_description=false ----

#[tokio::test]
async fn playlist_with_description_disabled_has_no_description_sections() {
    let mock = MockServer::start().await;
    let playlist_id = "PLsomeplaylist00001";
    let video_id = "EEEEEEEEEEE";

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlists"))
        .and(query_param("id", playlist_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": playlist_id,
                "snippet": {
                    "channelId": "UC0000000000000000000004",
                    "title": "My Playlist",
                    "channelTitle": "Channel B",
                },
            }],
        })))
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("playlistId", playlist_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "contentDetails": {
                    "videoId": video_id,
                    "videoPublishedAt": "2024-02-01T00:00:00Z",
                },
            }],
        })))
        .mount(&mock)
        .await;

    mount_videos(
        &mock,
        video_id,
        vec![video_item(
            video_id,
            "Playlist Video",
            "Channel B",
            "2024-02-01T00:00:00Z",
            "PT3M0S",
        )],
    )
    .await;
    mount_watch_page_without_captions(&mock, video_id).await;

    let engine = engine_against(&mock).await;
    let mut request =
        IngestRequest::new(format!("https://www.youtube.com/playlist?list={playlist_id}"));
    request.include_description = false;

    let result = engine.ingest(request).await.unwrap();

    assert_eq!(result.video_count, 1);
    for video in &result.videos {
        assert_eq!(video.description_clean, "");
    }
    assert!(!result.digest_text.contains("Description:"));
}

// ---- Scenario 5: empty input ----

#[tokio::test]
async fn empty_input_is_rejected_without_any_upstream_call() {
    let mock = MockServer::start().await;
    let engine = engine_against(&mock).await;

    let request = IngestRequest::new("");
    let err = engine.ingest(request).await.unwrap_err();

    assert!(matches!(err, IngestError::InvalidInput(_)));
}

// ---- Scenario 6: video with no usable transcript ----

#[tokio::test]
async fn video_with_no_captions_has_null_transcript_and_no_transcript_section() {
    let mock = MockServer::start().await;
    let video_id = "FFFFFFFFFFF";

    mount_videos(
        &mock,
        video_id,
        vec![video_item(
            video_id,
            "Captionless Video",
            "Channel C",
            "2024-03-01T00:00:00Z",
            "PT2M0S",
        )],
    )
    .await;
    mount_watch_page_without_captions(&mock, video_id).await;

    let engine = engine_against(&mock).await;
    let request = IngestRequest::new(video_id.to_string());

    let result = engine.ingest(request).await.unwrap();

    assert_eq!(result.video_count, 1);
    assert!(result.videos[0].transcript.is_none());
    assert!(!result.digest_text.contains("Transcript ("));
}

// ---- Cross-cutting invariants ----

#[tokio::test]
async fn result_has_unique_ids_matching_the_video_id_pattern() {
    let mock = MockServer::start().await;
    let video_id = "dQw4w9WgXcQ";

    mount_videos(
        &mock,
        video_id,
        vec![video_item(
            video_id,
            "A Video",
            "A Channel",
            "2024-01-01T00:00:00Z",
            "PT1M0S",
        )],
    )
    .await;
    mount_watch_page_without_captions(&mock, video_id).await;

    let engine = engine_against(&mock).await;
    let request = IngestRequest::new(video_id.to_string());
    let result = engine.ingest(request).await.unwrap();

    let mut seen = std::collections::HashSet::new();
    for video in &result.videos {
        assert!(youtubingest::types::VideoRecord::is_valid_id(&video.id));
        assert!(seen.insert(video.id.clone()), "duplicate id {}", video.id);
    }
    assert_eq!(result.video_count, result.videos.len());
}
