use crate::types::VideoRecord;
use crate::utils::format_duration;

/// Assembles the line-based digest document described in §4.6. A pure
/// function of its arguments: the same `videos` slice and flags always
/// produce the same text, which is what lets `IngestResult::digest_text` be
/// derived rather than accumulated incrementally during the pipeline.
pub fn assemble_digest(
    source_display_name: &str,
    videos: &[VideoRecord],
    include_description: bool,
    include_transcript: bool,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Source: {source_display_name}\n"));
    out.push_str(&format!("# Videos: {}\n", videos.len()));

    for (i, video) in videos.iter().enumerate() {
        out.push('\n');
        out.push_str(&format!(
            "=== [{}] {} ({}) ===\n",
            i + 1,
            video.title,
            video.id
        ));
        out.push_str(&format!("URL: https://youtu.be/{}\n", video.id));
        out.push_str(&format!("Channel: {}\n", video.channel_title));
        out.push_str(&format!(
            "Published: {}\n",
            video.published_at.to_rfc3339()
        ));
        out.push_str(&format!("Duration: {}\n", format_duration(video.duration)));
        let tags = if video.tags.is_empty() {
            "None".to_string()
        } else {
            video.tags.join(", ")
        };
        out.push_str(&format!("Tags: {tags}\n"));

        if include_description && !video.description_clean.is_empty() {
            out.push_str("\nDescription:\n");
            out.push_str(&video.description_clean);
            out.push('\n');
        }

        if include_transcript {
            if let Some(transcript) = &video.transcript {
                out.push_str(&format!("\nTranscript ({}):\n", transcript.language));
                out.push_str(&transcript.formatted_text);
                out.push('\n');
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transcript;
    use chrono::{TimeZone, Utc};

    fn sample_video(origin_index: usize) -> VideoRecord {
        VideoRecord {
            id: "dQw4w9WgXcQ".to_string(),
            title: "Sample Title".to_string(),
            description_raw: "raw".to_string(),
            description_clean: "clean description".to_string(),
            channel_id: "UC1".to_string(),
            channel_title: "Channel One".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            duration: 125,
            tags: vec!["rust".to_string(), "tutorial".to_string()],
            transcript: Some(Transcript {
                language: "en".to_string(),
                formatted_text: "[00:00:00] hello".to_string(),
            }),
            origin_index,
        }
    }

    #[test]
    fn assembles_single_video_digest() {
        let videos = vec![sample_video(0)];
        let digest = assemble_digest("My Source", &videos, true, true);
        assert!(digest.starts_with("# Source: My Source\n# Videos: 1\n"));
        assert!(digest.contains("=== [1] Sample Title (dQw4w9WgXcQ) ==="));
        assert!(digest.contains("URL: https://youtu.be/dQw4w9WgXcQ"));
        assert!(digest.contains("Duration: 2:05"));
        assert!(digest.contains("Tags: rust, tutorial"));
        assert!(digest.contains("Description:\nclean description"));
        assert!(digest.contains("Transcript (en):\n[00:00:00] hello"));
    }

    #[test]
    fn omits_description_when_flag_false() {
        let videos = vec![sample_video(0)];
        let digest = assemble_digest("My Source", &videos, false, true);
        assert!(!digest.contains("Description:"));
    }

    #[test]
    fn omits_transcript_when_flag_false() {
        let videos = vec![sample_video(0)];
        let digest = assemble_digest("My Source", &videos, true, false);
        assert!(!digest.contains("Transcript"));
    }

    #[test]
    fn is_deterministic() {
        let videos = vec![sample_video(0), sample_video(1)];
        let a = assemble_digest("Source", &videos, true, true);
        let b = assemble_digest("Source", &videos, true, true);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_video_list_has_header_only() {
        let digest = assemble_digest("Empty Source", &[], true, true);
        assert_eq!(digest, "# Source: Empty Source\n# Videos: 0\n");
    }
}
