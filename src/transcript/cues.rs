use serde::Deserialize;

/// One caption cue: start time, duration, and text, both in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub text: String,
}

/// Parses the legacy `timedtext` XML cue format (`<text start="1.2"
/// dur="3.4">...</text>`), the most common transport for auto-generated and
/// manual captions alike.
pub fn parse_timedtext_xml(xml: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    for segment in xml.split("<text ").skip(1) {
        let Some(tag_end) = segment.find('>') else {
            continue;
        };
        let (attrs, rest) = segment.split_at(tag_end);
        let Some(text_end) = rest.find("</text>") else {
            continue;
        };
        let raw_text = &rest[1..text_end];

        let start = extract_attr(attrs, "start").and_then(|v| v.parse::<f64>().ok());
        let dur = extract_attr(attrs, "dur").and_then(|v| v.parse::<f64>().ok());

        let (Some(start), Some(dur)) = (start, dur) else {
            continue;
        };

        let text = decode_xml_entities(raw_text);
        if !text.trim().is_empty() {
            cues.push(Cue {
                start_seconds: start,
                duration_seconds: dur,
                text,
            });
        }
    }
    cues
}

fn extract_attr<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let start = attrs.find(&needle)? + needle.len();
    let rest = &attrs[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn decode_xml_entities(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace('\n', " ")
}

// ======== json3 cue format ========

#[derive(Debug, Deserialize)]
struct Json3Document {
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs")]
    t_start_ms: i64,
    #[serde(rename = "dDurationMs", default)]
    d_duration_ms: i64,
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// Parses YouTube's alternate `fmt=json3` cue format, used by some auto
/// caption tracks.
pub fn parse_json3(raw: &str) -> Vec<Cue> {
    let Ok(doc) = serde_json::from_str::<Json3Document>(raw) else {
        return Vec::new();
    };

    doc.events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            if text.trim().is_empty() {
                return None;
            }
            Some(Cue {
                start_seconds: event.t_start_ms as f64 / 1000.0,
                duration_seconds: event.d_duration_ms as f64 / 1000.0,
                text: text.replace('\n', " "),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timedtext_xml() {
        let xml = r#"<transcript><text start="0.5" dur="2.1">Hello &amp; welcome</text><text start="2.6" dur="1.0">back</text></transcript>"#;
        let cues = parse_timedtext_xml(xml);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello & welcome");
        assert_eq!(cues[0].start_seconds, 0.5);
        assert_eq!(cues[1].duration_seconds, 1.0);
    }

    #[test]
    fn skips_blank_cues() {
        let xml = r#"<text start="0.0" dur="1.0">   </text>"#;
        assert!(parse_timedtext_xml(xml).is_empty());
    }

    #[test]
    fn parses_json3() {
        let raw = r#"{"events":[{"tStartMs":500,"dDurationMs":1500,"segs":[{"utf8":"Hello"},{"utf8":" world"}]}]}"#;
        let cues = parse_json3(raw);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Hello world");
        assert_eq!(cues[0].start_seconds, 0.5);
    }
}
