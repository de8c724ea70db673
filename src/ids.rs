use regex::Regex;
use std::sync::LazyLock;

/// Length of a catalog entity identifier (base62).
pub const ID_LEN: usize = 22;

// Playlist reference inside a URL or URI:
// https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=...
// spotify:playlist:37i9dQZF1DXcBWIGoYBM5M
static PLAYLIST_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:playlist/|:playlist:)(?P<id>[A-Za-z0-9]{22})(?:[^A-Za-z0-9]|$)").unwrap()
});

static ENTITY_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]{22}$").unwrap()
});

/// Extract a playlist id from a raw id, a `.../playlist/<id>` URL, or a
/// `scheme:playlist:<id>` URI.
///
/// Returns the trimmed input unchanged when nothing matches; callers treat
/// that as a possibly invalid reference.
pub fn normalize_playlist_id(input: &str) -> String {
    let s = input.trim();
    if let Some(caps) = PLAYLIST_REF_RE.captures(s) {
        return caps["id"].to_string();
    }
    s.to_string()
}

/// True iff `id` is exactly 22 base62 characters.
pub fn is_valid_track_id(id: &str) -> bool {
    id.len() == ID_LEN && ENTITY_ID_RE.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_raw_id() {
        assert_eq!(normalize_playlist_id("37i9dQZF1DXcBWIGoYBM5M"), "37i9dQZF1DXcBWIGoYBM5M");
        assert_eq!(normalize_playlist_id("  37i9dQZF1DXcBWIGoYBM5M \n"), "37i9dQZF1DXcBWIGoYBM5M");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_playlist_id("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc123"),
            "37i9dQZF1DXcBWIGoYBM5M"
        );
        assert_eq!(
            normalize_playlist_id("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            "37i9dQZF1DXcBWIGoYBM5M"
        );
    }

    #[test]
    fn test_normalize_uri() {
        assert_eq!(
            normalize_playlist_id("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"),
            "37i9dQZF1DXcBWIGoYBM5M"
        );
    }

    #[test]
    fn test_normalize_no_match_passthrough() {
        assert_eq!(normalize_playlist_id("  not-a-playlist "), "not-a-playlist");
        assert_eq!(normalize_playlist_id(""), "");
        // 23 characters after the prefix is not a playlist id
        assert_eq!(
            normalize_playlist_id("playlist/37i9dQZF1DXcBWIGoYBM5MX"),
            "playlist/37i9dQZF1DXcBWIGoYBM5MX"
        );
    }

    #[test]
    fn test_valid_track_id() {
        assert!(is_valid_track_id("4uLU6hMCjMI75M1A2tKUQC"));
        assert!(!is_valid_track_id("4uLU6hMCjMI75M1A2tKUQ"));
        assert!(!is_valid_track_id("4uLU6hMCjMI75M1A2tKUQCx"));
        assert!(!is_valid_track_id("4uLU6hMCjMI75M1A2tKU-C"));
        assert!(!is_valid_track_id(""));
        // Multibyte chars never count as base62
        assert!(!is_valid_track_id("4uLU6hMCjMI75M1A2tKUé"));
    }
}
