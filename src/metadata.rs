//! Now-playing metadata supplied by an external window-title watcher.
//!
//! The watcher itself lives outside this crate; it periodically parses the
//! player's window title and stores the result in a [`MetadataCell`]. The
//! pipeline reads the latest value exactly once per rotation, so the core
//! never depends on the polling mechanism.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub title: String,
    pub artists: Vec<String>,
}

impl SongMetadata {
    /// File stem used for the finalized song: "Artist1,Artist2-Title", or
    /// just the title when no artist is known.
    pub fn file_stem(&self) -> String {
        if self.artists.is_empty() {
            self.title.clone()
        } else {
            format!("{}-{}", self.artists.join(","), self.title)
        }
    }
}

/// Split a player window title into song and artist list.
///
/// The title is split on `" - "` into song and artist halves, and the artist
/// half on `" / "` into individual artists. This mirrors the naming
/// convention of the players being recorded and must not change:
/// `"Song - A / B"` → title "Song", artists ["A", "B"]; a title without the
/// separator has no artists.
pub fn parse_title(title: &str) -> SongMetadata {
    let mut parts = title.split(" - ");
    let song = parts.next().unwrap_or("").trim().to_string();
    let artist_part = parts.next().map(str::trim).unwrap_or("");

    let artists = if artist_part.is_empty() {
        Vec::new()
    } else {
        artist_part
            .split(" / ")
            .map(|artist| artist.trim().to_string())
            .collect()
    };
    SongMetadata {
        title: song,
        artists,
    }
}

/// Single-slot cell holding the most recent parsed metadata.
///
/// Writers overwrite, readers clone; there is no history. Shared between the
/// watcher (or CLI stand-in) and the capture thread.
#[derive(Debug, Clone, Default)]
pub struct MetadataCell {
    inner: Arc<Mutex<Option<SongMetadata>>>,
}

impl MetadataCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, metadata: SongMetadata) {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(metadata);
    }

    pub fn clear(&self) {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub fn snapshot(&self) -> Option<SongMetadata> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_title_splits_song_and_artists() {
        let meta = parse_title("Song - Artist A / Artist B");
        assert_eq!(meta.title, "Song");
        assert_eq!(meta.artists, vec!["Artist A", "Artist B"]);
    }

    #[test]
    fn parse_title_without_separator_has_no_artists() {
        let meta = parse_title("OnlySong");
        assert_eq!(meta.title, "OnlySong");
        assert!(meta.artists.is_empty());
    }

    #[test]
    fn parse_title_single_artist() {
        let meta = parse_title("Tune - Someone");
        assert_eq!(meta.title, "Tune");
        assert_eq!(meta.artists, vec!["Someone"]);
    }

    #[test]
    fn parse_title_ignores_trailing_separator_sections() {
        // Only the first two " - " sections carry meaning.
        let meta = parse_title("Song - Artist - Live");
        assert_eq!(meta.title, "Song");
        assert_eq!(meta.artists, vec!["Artist"]);
    }

    #[test]
    fn parse_title_trims_whitespace() {
        let meta = parse_title("  Song  -  A  /  B ");
        assert_eq!(meta.title, "Song");
        assert_eq!(meta.artists, vec!["A", "B"]);
    }

    #[test]
    fn file_stem_joins_artists_with_commas() {
        let meta = parse_title("Song - A / B");
        assert_eq!(meta.file_stem(), "A,B-Song");
    }

    #[test]
    fn file_stem_without_artists_is_title() {
        let meta = parse_title("Song");
        assert_eq!(meta.file_stem(), "Song");
    }

    #[test]
    fn metadata_cell_keeps_latest_value() {
        let cell = MetadataCell::new();
        assert!(cell.snapshot().is_none());
        cell.store(parse_title("One - A"));
        cell.store(parse_title("Two - B"));
        let latest = cell.snapshot().expect("metadata present");
        assert_eq!(latest.title, "Two");
        cell.clear();
        assert!(cell.snapshot().is_none());
    }
}
