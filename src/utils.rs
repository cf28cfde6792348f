use once_cell::sync::Lazy;
use regex::Regex;

static ISO8601_DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").unwrap()
});

/// Parse a `videos.list` `contentDetails.duration` value (ISO 8601, e.g.
/// `PT4M13S`) into whole seconds. Returns 0 for anything unparseable, matching
/// the "0 if unparseable or a live stream without duration" rule in §3.
pub fn parse_iso8601_duration(raw: &str) -> u32 {
    let Some(captures) = ISO8601_DURATION_RE.captures(raw) else {
        return 0;
    };
    let hours: u32 = captures.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let minutes: u32 = captures.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let seconds: u32 = captures.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    hours.saturating_mul(3600)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds)
}

/// Format a duration in seconds as `H:MM:SS` or `M:SS`, per §4.6.
pub fn format_duration(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Format a duration in seconds as a bucket timestamp `[HH:MM:SS]`, per §4.4.
pub fn format_bucket_timestamp(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("[{hours:02}:{minutes:02}:{seconds:02}]")
}
