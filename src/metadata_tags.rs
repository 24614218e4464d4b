//! Tag and cover-art readers backed by `lofty`.

use std::path::Path;

use lofty::file::TaggedFileExt;
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::Tag;

/// Display values shown for a playable list row.
#[derive(Debug, Clone, Default)]
pub struct DisplayMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
}

fn first_non_empty_value<F>(primary_tag: Option<&Tag>, tags: &[Tag], mut extractor: F) -> String
where
    F: FnMut(&Tag) -> Option<String>,
{
    if let Some(tag) = primary_tag {
        if let Some(value) = extractor(tag) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    for tag in tags {
        if let Some(value) = extractor(tag) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    String::new()
}

/// Reads the display title/artist/album from a media file's tags.
pub fn read_display_metadata(path: &Path) -> Option<DisplayMetadata> {
    let tagged_file = read_from_path(path).ok()?;
    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();

    let title = first_non_empty_value(primary_tag, tags, |tag| {
        tag.title().map(|value| value.into_owned())
    });
    let artist = first_non_empty_value(primary_tag, tags, |tag| {
        tag.artist().map(|value| value.into_owned())
    });
    let album = first_non_empty_value(primary_tag, tags, |tag| {
        tag.album().map(|value| value.into_owned())
    });

    Some(DisplayMetadata {
        title,
        artist,
        album,
    })
}

/// Formats the secondary display line for a playable row.
pub fn format_subtitle(metadata: &DisplayMetadata) -> String {
    match (metadata.artist.is_empty(), metadata.album.is_empty()) {
        (false, false) => format!("{} / {}", metadata.artist, metadata.album),
        (false, true) => metadata.artist.clone(),
        (true, false) => metadata.album.clone(),
        (true, true) => String::new(),
    }
}

/// Reads embedded cover-art bytes from a media file, if present.
pub fn read_embedded_cover_art(path: &Path) -> Option<Vec<u8>> {
    let tagged_file = read_from_path(path).ok()?;
    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();

    if let Some(tag) = primary_tag {
        if let Some(picture) = tag.pictures().first() {
            return Some(picture.data().to_vec());
        }
    }

    for tag in tags {
        if let Some(picture) = tag.pictures().first() {
            return Some(picture.data().to_vec());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{format_subtitle, DisplayMetadata};

    #[test]
    fn test_format_subtitle_with_artist_and_album() {
        let metadata = DisplayMetadata {
            title: "Song".to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
        };
        assert_eq!(format_subtitle(&metadata), "Artist / Album");
    }

    #[test]
    fn test_format_subtitle_with_partial_tags() {
        let artist_only = DisplayMetadata {
            artist: "Artist".to_string(),
            ..Default::default()
        };
        assert_eq!(format_subtitle(&artist_only), "Artist");

        let album_only = DisplayMetadata {
            album: "Album".to_string(),
            ..Default::default()
        };
        assert_eq!(format_subtitle(&album_only), "Album");

        assert_eq!(format_subtitle(&DisplayMetadata::default()), "");
    }
}
