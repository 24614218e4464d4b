//! Asynchronous thumbnail resolution for browse rows.
//!
//! Every fetch request runs on its own worker thread and publishes its result
//! back onto the bus tagged with the `(generation, position)` it was issued
//! for; the browse manager applies or discards it on its own loop. Requests
//! are independent: one failing or slow fetch never blocks the others, and no
//! retry is attempted for failures.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use log::{debug, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};
use zune_jpeg::JpegDecoder;

use crate::metadata_tags;
use crate::protocol::{BrowseMessage, Message, Thumbnail, ThumbnailMessage};

const ART_FILE_STEMS: [&str; 5] = ["cover", "front", "folder", "album", "art"];
const ART_FILE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailFetchError {
    #[error("no artwork found for {}", .0.display())]
    NoArtwork(PathBuf),
    #[error("artwork for {} could not be decoded", .0.display())]
    Undecodable(PathBuf),
}

/// Serves thumbnail fetch requests arriving on the bus.
pub struct ThumbnailManager {
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
    max_edge_px: u32,
}

impl ThumbnailManager {
    pub fn new(
        bus_receiver: Receiver<Message>,
        bus_sender: Sender<Message>,
        max_edge_px: u32,
    ) -> Self {
        Self {
            bus_receiver,
            bus_sender,
            max_edge_px,
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_receiver.blocking_recv() {
                Ok(Message::Thumbnail(ThumbnailMessage::Fetch {
                    generation,
                    position,
                    locator,
                })) => {
                    let bus_sender = self.bus_sender.clone();
                    let max_edge_px = self.max_edge_px;
                    thread::spawn(move || {
                        let result = fetch_thumbnail(&locator, max_edge_px);
                        let message = match result {
                            Ok(thumbnail) => ThumbnailMessage::Fetched {
                                generation,
                                position,
                                thumbnail,
                            },
                            Err(err) => {
                                debug!(
                                    "Thumbnail fetch failed for position {} (generation {}): {}",
                                    position, generation, err
                                );
                                ThumbnailMessage::FetchFailed {
                                    generation,
                                    position,
                                    reason: err.to_string(),
                                }
                            }
                        };
                        let _ = bus_sender.send(Message::Thumbnail(message));
                    });
                }
                Ok(Message::Browse(BrowseMessage::Shutdown)) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Thumbnail manager lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Resolves, decodes, and downscales the artwork for one locator.
pub fn fetch_thumbnail(
    locator: &Path,
    max_edge_px: u32,
) -> Result<Thumbnail, ThumbnailFetchError> {
    let bytes = resolve_art_bytes(locator)
        .ok_or_else(|| ThumbnailFetchError::NoArtwork(locator.to_path_buf()))?;
    let decoded = decode_art_bytes(&bytes)
        .ok_or_else(|| ThumbnailFetchError::Undecodable(locator.to_path_buf()))?;
    Ok(downscale_to_thumbnail(decoded, max_edge_px))
}

/// Finds raw artwork bytes for a locator.
///
/// Directories use an art file found inside them. Tracks prefer an art file
/// next to them and fall back to embedded cover art from their tags.
fn resolve_art_bytes(locator: &Path) -> Option<Vec<u8>> {
    if locator.is_dir() {
        return find_art_file_in(locator).and_then(|path| fs::read(path).ok());
    }
    if let Some(art_path) = locator.parent().and_then(find_art_file_in) {
        if let Ok(bytes) = fs::read(art_path) {
            return Some(bytes);
        }
    }
    metadata_tags::read_embedded_cover_art(locator)
}

fn find_art_file_in(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let stem_matches = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| {
                let lowered = stem.to_lowercase();
                ART_FILE_STEMS.iter().any(|known| *known == lowered)
            })
            .unwrap_or(false);
        let extension_matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let lowered = ext.to_lowercase();
                ART_FILE_EXTENSIONS.iter().any(|known| *known == lowered)
            })
            .unwrap_or(false);
        if stem_matches && extension_matches {
            found.push(path);
        }
    }
    // Deterministic pick when several candidates exist.
    found.sort();
    found.into_iter().next()
}

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xff && bytes[1] == 0xd8
}

fn decode_jpeg_non_strict(bytes: &[u8]) -> Option<DynamicImage> {
    if !looks_like_jpeg(bytes) {
        return None;
    }

    let options = DecoderOptions::new_cmd()
        .set_strict_mode(false)
        .jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);
    let pixels = decoder.decode().ok()?;
    let (width, height) = decoder.dimensions()?;
    let image = image::RgbaImage::from_raw(width as u32, height as u32, pixels)?;
    Some(DynamicImage::ImageRgba8(image))
}

/// Decodes artwork bytes, tolerating malformed JPEGs via a non-strict
/// fallback when the primary decoder rejects them.
fn decode_art_bytes(bytes: &[u8]) -> Option<DynamicImage> {
    image::load_from_memory(bytes)
        .ok()
        .or_else(|| decode_jpeg_non_strict(bytes))
}

fn fit_to_max_edge(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }
    let clamped = max_edge.max(1);
    if width.max(height) <= clamped {
        return (width, height);
    }
    if width >= height {
        let scaled_height =
            ((u64::from(height) * u64::from(clamped)) + (u64::from(width) / 2)) / u64::from(width);
        (clamped, scaled_height.max(1) as u32)
    } else {
        let scaled_width =
            ((u64::from(width) * u64::from(clamped)) + (u64::from(height) / 2)) / u64::from(height);
        (scaled_width.max(1) as u32, clamped)
    }
}

fn downscale_to_thumbnail(decoded: DynamicImage, max_edge_px: u32) -> Thumbnail {
    let (source_width, source_height) = decoded.dimensions();
    let (target_width, target_height) = fit_to_max_edge(source_width, source_height, max_edge_px);
    let resized = if target_width == source_width && target_height == source_height {
        decoded
    } else {
        decoded.resize(target_width, target_height, FilterType::Lanczos3)
    };
    let rgba = resized.to_rgba8();
    let (width, height) = rgba.dimensions();
    Thumbnail {
        width,
        height,
        pixels: Arc::from(rgba.into_raw()),
    }
}
