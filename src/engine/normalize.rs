use once_cell::sync::Lazy;
use regex::Regex;

static CONTROL_CHARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\u{0}-\u{8}\u{B}\u{C}\u{E}-\u{1F}\u{7F}\u{200B}-\u{200F}\u{FEFF}]").unwrap()
});
static WHITESPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static PROMO_TRAILER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?im)^.*subscribe (to|for).*$").unwrap(),
        Regex::new(r"(?im)^.*(follow|find) (me|us) on (instagram|twitter|tiktok|facebook|x)\b.*$")
            .unwrap(),
        Regex::new(r"(?im)^.*\buse code\b.*\bfor\b.*\bdiscount\b.*$").unwrap(),
        Regex::new(r"(?im)^.*as an amazon associate.*$").unwrap(),
    ]
});

static TRAILING_HASHTAGS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\s*#\S+)+\s*$").unwrap());
static PIPE_CHANNEL_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\|[^|]*$").unwrap());
static QUOTE_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^["'“‘](.*)["'”’]$"#).unwrap()
});

/// Cleans free text (title or description) per §4.7: strips control
/// characters, promotional trailers, and standalone emoji lines, then
/// collapses whitespace. URLs are left untouched by design — none of these
/// rules match on `http(s)://` spans.
pub fn normalize_text(raw: &str) -> String {
    let no_control = CONTROL_CHARS_RE.replace_all(raw, "");

    let mut stripped = no_control.into_owned();
    for pattern in PROMO_TRAILER_PATTERNS.iter() {
        stripped = pattern.replace_all(&stripped, "").into_owned();
    }

    let kept_lines: Vec<&str> = stripped
        .lines()
        .filter(|line| !is_standalone_emoji_line(line))
        .collect();
    let rejoined = kept_lines.join("\n");

    let collapsed_spaces = WHITESPACE_RUN_RE.replace_all(&rejoined, " ");
    let per_line_trimmed: Vec<String> = collapsed_spaces
        .lines()
        .map(|line| line.trim().to_string())
        .collect();
    let rejoined = per_line_trimmed.join("\n");
    let collapsed_blank_lines = BLANK_LINES_RE.replace_all(&rejoined, "\n\n");

    collapsed_blank_lines.trim().to_string()
}

/// `true` if `line` consists only of emoji and whitespace, per §4.7's "remove
/// standalone emoji runs when they constitute the entire line". Checked by
/// Unicode code point range rather than a regex Unicode-property class,
/// since the `regex` crate's built-in property tables don't cover
/// `Emoji_Presentation`/`Extended_Pictographic`.
fn is_standalone_emoji_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_whitespace() || is_emoji(c))
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF
        | 0x2600..=0x27BF
        | 0x2190..=0x21FF
        | 0x2B00..=0x2BFF
        | 0xFE0F
        | 0x200D
    )
}

/// Cleans a video title per §4.7: the general text rules, plus stripping
/// trailing hashtags, a trailing `| Channel Name` suffix, and a single pair
/// of enclosing quote marks.
pub fn normalize_title(raw: &str) -> String {
    let base = normalize_text(raw);
    let no_hashtags = TRAILING_HASHTAGS_RE.replace(&base, "").trim().to_string();
    let no_channel_suffix = PIPE_CHANNEL_SUFFIX_RE
        .replace(&no_hashtags, "")
        .trim()
        .to_string();
    match QUOTE_PAIR_RE.captures(&no_channel_suffix) {
        Some(captures) => captures[1].trim().to_string(),
        None => no_channel_suffix,
    }
}
