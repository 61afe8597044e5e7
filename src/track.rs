//! Finding Spotify track links in chat messages and deduplicating them against a playlist.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::spotify_rs::types::PlaylistItemPage;

const TRACK_URL_MARKER: &str = "open.spotify.com/track";

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid url regex"));

/// Everything after `/track/` up to the query string.
static TRACK_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"open\.spotify\.com/track/([^?]+)").expect("valid track id regex")
});

/// Returns every Spotify track URL in `content`, in source order, duplicates included.
/// The flag is true when at least one was found.
pub fn extract_track_urls(content: &str) -> (Vec<String>, bool) {
    let urls: Vec<String> = URL_REGEX
        .find_iter(content)
        .map(|m| m.as_str())
        .filter(|url| url.contains(TRACK_URL_MARKER))
        .map(String::from)
        .collect();
    let found = !urls.is_empty();
    (urls, found)
}

/// Extracts the track ID from a track URL, or an empty string if it isn't one.
pub fn extract_track_id(url: &str) -> String {
    TRACK_ID_REGEX
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

pub fn to_track_ids<S: AsRef<str>>(urls: &[S]) -> Vec<String> {
    urls.iter()
        .map(|url| extract_track_id(url.as_ref()))
        .filter(|id| !id.is_empty())
        .collect()
}

/// Returns the candidates that are not already in the playlist page, keeping input order.
///
/// Candidates are not deduplicated against each other.
pub fn filter_tracks(page: Option<&PlaylistItemPage>, candidates: Vec<String>) -> Vec<String> {
    let Some(page) = page.filter(|page| !page.items.is_empty()) else {
        return candidates;
    };

    let existing: HashSet<&str> = page.items.iter().filter_map(|item| item.track_id()).collect();

    candidates
        .into_iter()
        .filter(|id| !existing.contains(id.as_str()))
        .collect()
}
