//! Playable media selection within a swarm's file set

use super::MediaEntry;

/// Container extensions the proxy will attempt to deliver.
pub const PLAYABLE_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "mpg", "mpeg",
];

/// The file chosen for delivery from a swarm, cached per descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMedia {
    /// Index into the session's file set
    pub entry_index: usize,
    pub name: String,
    pub length: u64,
    /// Lowercased container extension
    pub extension: String,
}

/// Picks the playable file to deliver from a swarm's file set.
///
/// Filters to the playable-extension allow list and takes the largest match,
/// on the assumption that the main feature is the biggest media file in the
/// swarm. That heuristic has no ground truth to validate against: a bundled
/// extras file larger than a poorly-encoded feature will be picked instead.
/// Earliest entry wins a length tie so the choice stays deterministic.
pub fn select_playable(entries: &[MediaEntry]) -> Option<SelectedMedia> {
    let mut best: Option<SelectedMedia> = None;

    for (index, entry) in entries.iter().enumerate() {
        let Some(extension) = entry.extension() else {
            continue;
        };
        if !PLAYABLE_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }
        if best.as_ref().is_none_or(|b| entry.length > b.length) {
            best = Some(SelectedMedia {
                entry_index: index,
                name: entry.name.clone(),
                length: entry.length,
                extension,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_largest_playable_file() {
        let entries = vec![
            MediaEntry::new("sample.mkv", 50_000_000),
            MediaEntry::new("Feature.2024.1080p.mkv", 1_500_000_000),
            MediaEntry::new("Feature.2024.1080p.srt", 80_000),
            MediaEntry::new("cover.jpg", 500_000),
        ];

        let selected = select_playable(&entries).unwrap();
        assert_eq!(selected.entry_index, 1);
        assert_eq!(selected.extension, "mkv");
        assert_eq!(selected.length, 1_500_000_000);
    }

    #[test]
    fn test_ignores_non_playable_extensions() {
        let entries = vec![
            MediaEntry::new("notes.txt", 10_000_000_000),
            MediaEntry::new("subs.srt", 90_000),
        ];
        assert_eq!(select_playable(&entries), None);
    }

    #[test]
    fn test_empty_file_set() {
        assert_eq!(select_playable(&[]), None);
    }

    #[test]
    fn test_length_tie_takes_first_entry() {
        let entries = vec![
            MediaEntry::new("a.mp4", 1_000),
            MediaEntry::new("b.mp4", 1_000),
        ];
        assert_eq!(select_playable(&entries).unwrap().entry_index, 0);
    }
}
