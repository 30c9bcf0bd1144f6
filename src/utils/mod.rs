use std::time::Duration;
use tokio::time::{sleep, Instant};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};
use url::Url;

/// Hosts that serve watch pages
const VIDEO_HOSTS: &[&str] = &[
    "www.youtube.com",
    "youtube.com",
    "youtu.be",
    "m.youtube.com",
    "music.youtube.com",
];

/// Format a caption offset in seconds as `M:SS`, or `HH:MM:SS` past the first hour
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Format a caption offset given in milliseconds
pub fn format_timestamp_ms(millis: f64) -> String {
    format_timestamp(millis / 1000.0)
}

/// Collapse every whitespace run into a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Undo the `&` escaping found in request params lifted out of inline scripts
pub fn decode_param(param: &str) -> String {
    param.replace("\\u0026", "&")
}

/// Strip diacritics and lowercase, for matching UI labels across languages
pub fn normalize_label(label: &str) -> String {
    label
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Turn a title into a dash-separated, ASCII-only filename stem
pub fn sanitize_filename(name: &str) -> String {
    let folded: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let mut out = String::with_capacity(folded.len());
    let mut pending_dash = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if out.is_empty() {
        "youtube-transcript".to_string()
    } else {
        out
    }
}

/// Extract the video identifier from a watch, share, embed, shorts or live URL
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let lower = input.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?;
    if !VIDEO_HOSTS.contains(&host) {
        return None;
    }

    let path = url.path();
    if host == "youtu.be" {
        let id = path.trim_start_matches('/');
        return non_empty(id.split('/').next().unwrap_or_default());
    }

    if path == "/watch" {
        return url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .and_then(|(_, value)| non_empty(&value));
    }

    let prefixed = ["/embed/", "/v/", "/shorts/", "/live/"];
    if prefixed.iter().any(|prefix| path.starts_with(prefix)) {
        return path.split('/').nth(2).and_then(non_empty);
    }

    None
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Re-run `check` every `interval` until it yields a value or `timeout` elapses.
///
/// Returns `None` on timeout instead of failing, so callers can treat an absent
/// element or token as "not found".
pub async fn poll_until<T, F>(interval: Duration, timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "0:00");
        assert_eq!(format_timestamp(65.0), "1:05");
        assert_eq!(format_timestamp(599.9), "9:59");
        assert_eq!(format_timestamp(3661.0), "01:01:01");
        assert_eq!(format_timestamp(-3.0), "0:00");
        assert_eq!(format_timestamp_ms(125_400.0), "2:05");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  hello \n\t world  "), "hello world");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_decode_param() {
        assert_eq!(decode_param("CgtB\\u0026x=1"), "CgtB&x=1");
        assert_eq!(decode_param("plain"), "plain");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Transcrição"), "transcricao");
        assert_eq!(normalize_label("Capítulos"), "capitulos");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Héllo, World!"), "hello-world");
        assert_eq!(sanitize_filename("--Rust  2024--"), "rust-2024");
        assert_eq!(sanitize_filename("???"), "youtube-transcript");
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=abc123&t=4"), Some("abc123".to_string()));
        assert_eq!(extract_video_id("youtu.be/xyz"), Some("xyz".to_string()));
        assert_eq!(extract_video_id("https://m.youtube.com/shorts/s1"), Some("s1".to_string()));
        assert_eq!(extract_video_id("https://youtube.com/embed/e1?rel=0"), Some("e1".to_string()));
        assert_eq!(extract_video_id("https://www.youtube.com/feed/library"), None);
        assert_eq!(extract_video_id("https://vimeo.com/123"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch"), None);
    }

    #[tokio::test]
    async fn test_poll_until_times_out_with_none() {
        let mut calls = 0;
        let found: Option<u32> = poll_until(Duration::from_millis(1), Duration::from_millis(5), || {
            calls += 1;
            None
        })
        .await;
        assert!(found.is_none());
        assert!(calls >= 2);
    }

    #[tokio::test]
    async fn test_poll_until_returns_first_hit() {
        let mut calls = 0;
        let found = poll_until(Duration::from_millis(1), Duration::from_millis(500), || {
            calls += 1;
            (calls == 3).then_some(calls)
        })
        .await;
        assert_eq!(found, Some(3));
    }
}
