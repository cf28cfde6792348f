use std::collections::BTreeMap;

use crate::transcript::cues::Cue;
use crate::utils::format_bucket_timestamp;

/// Formats cues per §4.4: a flat concatenation when `interval_seconds == 0`,
/// or timestamped buckets otherwise.
pub fn format_cues(cues: &[Cue], interval_seconds: u32) -> String {
    if interval_seconds == 0 {
        return format_flat(cues);
    }
    format_bucketed(cues, interval_seconds)
}

fn format_flat(cues: &[Cue]) -> String {
    let joined = cues
        .iter()
        .map(|cue| cue.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&joined)
}

fn format_bucketed(cues: &[Cue], interval_seconds: u32) -> String {
    let interval = interval_seconds as f64;
    let mut buckets: BTreeMap<u32, Vec<String>> = BTreeMap::new();

    for cue in cues {
        let bucket = ((cue.start_seconds / interval).floor() * interval) as u32;
        let seen = buckets.entry(bucket).or_default();
        if !seen.iter().any(|existing| existing == &cue.text) {
            seen.push(cue.text.clone());
        }
    }

    let mut lines = Vec::with_capacity(buckets.len());
    for (bucket, texts) in buckets {
        if texts.is_empty() {
            continue;
        }
        let line = format!("{} {}", format_bucket_timestamp(bucket), texts.join(" "));
        lines.push(collapse_whitespace(&line));
    }
    lines.join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
