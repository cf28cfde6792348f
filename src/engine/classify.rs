use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::client::ChannelReference;
use crate::types::SourceKind;

static VIDEO_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_-]{11}").unwrap());
static WATCH_V_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]v=([A-Za-z0-9_-]{11})").unwrap());
static YOUTU_BE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtu\.be/([A-Za-z0-9_-]{11})").unwrap());
static SHORTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/shorts/([A-Za-z0-9_-]{11})").unwrap());
static EMBED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/embed/([A-Za-z0-9_-]{11})").unwrap());
static LIST_PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]list=([A-Za-z0-9_-]+)").unwrap());
static CHANNEL_ID_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/channel/(UC[0-9A-Za-z_-]{22})").unwrap());
static HANDLE_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/@([A-Za-z0-9_.-]+)").unwrap());
static CUSTOM_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/c/([A-Za-z0-9_.-]+)").unwrap());
static USER_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/user/([A-Za-z0-9_.-]+)").unwrap());
static URL_LIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.-]*://|^www\.|\.[a-z]{2,}/").unwrap());

/// The result of classifying `url_or_query` (§4.5 stage 1): the kind, plus
/// enough of the matched substring for the resolve stage to act on.
pub enum Classification {
    Video { video_id: String },
    Playlist { playlist_id: String },
    Channel { reference: ChannelReference },
    Search { query: String },
    Invalid,
}

impl Classification {
    pub fn kind(&self) -> Option<SourceKind> {
        match self {
            Classification::Video { .. } => Some(SourceKind::Video),
            Classification::Playlist { .. } => Some(SourceKind::Playlist),
            Classification::Channel { .. } => Some(SourceKind::Channel),
            Classification::Search { .. } => Some(SourceKind::Search),
            Classification::Invalid => None,
        }
    }
}

/// Applies the ordered pattern tests from §4.5 stage 1 to a trimmed input
/// string, in the declared priority: video, then playlist, then channel,
/// then reject-as-invalid if URL-like but unrecognized, else free-text
/// search.
pub fn classify(input: &str) -> Classification {
    let trimmed = input.trim();

    if let Some(video_id) = extract_video_id(trimmed) {
        return Classification::Video { video_id };
    }
    if let Some(captures) = LIST_PARAM_RE.captures(trimmed) {
        return Classification::Playlist {
            playlist_id: captures[1].to_string(),
        };
    }
    if let Some(reference) = extract_channel_reference(trimmed) {
        return Classification::Channel { reference };
    }
    if URL_LIKE_RE.is_match(trimmed) {
        return Classification::Invalid;
    }
    Classification::Search {
        query: trimmed.to_string(),
    }
}

fn extract_video_id(input: &str) -> Option<String> {
    WATCH_V_RE
        .captures(input)
        .or_else(|| YOUTU_BE_RE.captures(input))
        .or_else(|| SHORTS_RE.captures(input))
        .or_else(|| EMBED_RE.captures(input))
        .map(|c| c[1].to_string())
        .or_else(|| {
            // A bare 11-character ID with nothing else around it.
            if VIDEO_ID_PATTERN.is_match(input) && input.len() == 11 {
                Some(input.to_string())
            } else {
                None
            }
        })
}

/// Extracts a channel reference tagged with the URL shape it came from, so
/// `resolve_channel` can pick the matching Data API probe (§4.3) directly
/// instead of re-deriving it from the bare extracted string, which has lost
/// the distinction between e.g. a `/c/` custom name and a `/user/` name by
/// the time any slashes are stripped.
fn extract_channel_reference(input: &str) -> Option<ChannelReference> {
    if let Some(captures) = CHANNEL_ID_URL_RE.captures(input) {
        return Some(ChannelReference::Id(captures[1].to_string()));
    }
    if let Some(captures) = HANDLE_URL_RE.captures(input) {
        return Some(ChannelReference::Handle(format!("@{}", &captures[1])));
    }
    if let Some(captures) = CUSTOM_URL_RE.captures(input) {
        return Some(ChannelReference::Custom(captures[1].to_string()));
    }
    if let Some(captures) = USER_URL_RE.captures(input) {
        return Some(ChannelReference::User(captures[1].to_string()));
    }
    if input.starts_with('@') && !input.contains(' ') && !input.contains('/') {
        return Some(ChannelReference::Handle(input.to_string()));
    }
    None
}
