use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use tokio::select;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::Configuration;
use crate::events::{PhotoEvent, PreparedPhotoCpu};

/// Concurrent decode cap; photos queue behind it in arrival order.
const MAX_IN_FLIGHT: usize = 4;
/// How often the debounce table is swept for entries whose quiet period
/// has elapsed.
const DEBOUNCE_SWEEP: Duration = Duration::from_millis(100);

/// Watches the photo library directory and streams decoded photos to the
/// viewer. Runs until `cancel` fires: a recursive startup scan seeds the
/// queue, then filesystem notifications keep it current. Additions are
/// debounced so a file still being copied settles before it is read;
/// removals pass through immediately.
#[instrument(
    skip(cfg, to_viewer, cancel),
    fields(root = %cfg.photo_library_path.display())
)]
pub async fn run(
    cfg: Configuration,
    to_viewer: Sender<PhotoEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut initial: Vec<PathBuf> = WalkDir::new(&cfg.photo_library_path)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| is_image(path))
        .collect();
    initial.sort();
    info!(discovered = initial.len(), "startup recursive scan complete");

    // Bridge the notify callback into the async world.
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(&cfg.photo_library_path, RecursiveMode::Recursive)
        .with_context(|| {
            format!(
                "failed to watch photo library {}",
                cfg.photo_library_path.display()
            )
        })?;
    match cfg.photo_library_path.canonicalize() {
        Ok(abs) => info!(watching = %abs.display(), "notify watcher initialized (recursive)"),
        Err(_) => {
            info!(watching = %cfg.photo_library_path.display(), "notify watcher initialized (recursive)")
        }
    }

    let debounce = cfg.photo_debounce;
    let max_dimension = cfg.max_photo_dimension;

    // Paths waiting out their quiet period, keyed by last write burst.
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
    let mut ready: VecDeque<PathBuf> = initial.into();
    let mut in_flight: HashSet<PathBuf> = HashSet::new();
    let mut decodes: JoinSet<(PathBuf, Result<PreparedPhotoCpu>)> = JoinSet::new();
    let mut sweep = time::interval(DEBOUNCE_SWEEP);

    loop {
        while in_flight.len() < MAX_IN_FLIGHT {
            let Some(path) = ready.pop_front() else {
                break;
            };
            if !in_flight.insert(path.clone()) {
                continue;
            }
            decodes.spawn({
                let path = path.clone();
                async move {
                    let result = tokio::task::spawn_blocking({
                        let path = path.clone();
                        move || prepare_photo(&path, max_dimension)
                    })
                    .await
                    .map_err(anyhow::Error::from)
                    .and_then(|inner| inner);
                    (path, result)
                }
            });
        }

        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting library task");
                break;
            }

            Some(res) = watch_rx.recv() => match res {
                Ok(event) => {
                    handle_fs_event(event, &mut pending, &to_viewer).await;
                }
                Err(err) => warn!(error = %err, "watch error"),
            },

            _ = sweep.tick() => {
                let now = Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, seen)| now.duration_since(**seen) >= debounce)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    pending.remove(&path);
                    // The file may have vanished during the quiet period.
                    if path.exists() {
                        debug!(path = %path.display(), "debounce elapsed; queueing decode");
                        ready.push_back(path);
                    }
                }
            }

            Some(joined) = decodes.join_next() => {
                let Ok((path, result)) = joined else {
                    continue;
                };
                in_flight.remove(&path);
                match result {
                    Ok(photo) => {
                        debug!(
                            path = %photo.path.display(),
                            width = photo.width,
                            height = photo.height,
                            "photo decoded",
                        );
                        let _ = to_viewer.send(PhotoEvent::Added(photo)).await;
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = ?err, "failed to decode photo; skipping");
                    }
                }
            }
        }
    }
    Ok(())
}

async fn handle_fs_event(
    event: Event,
    pending: &mut HashMap<PathBuf, Instant>,
    to_viewer: &Sender<PhotoEvent>,
) {
    debug!(kind = ?event.kind, paths = ?event.paths, "notify event");
    match &event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Modify(ModifyKind::Data(_)) => {
            for path in event.paths.into_iter().filter(|p| is_image(p)) {
                pending.insert(path, Instant::now());
            }
        }
        EventKind::Remove(RemoveKind::File) => {
            for path in event.paths.into_iter().filter(|p| is_image(p)) {
                pending.remove(&path);
                info!(path = %path.display(), "fs: remove");
                let _ = to_viewer.send(PhotoEvent::Removed(path)).await;
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Moves are often reported as bare renames. Decide per path
            // by existence.
            for path in event.paths.into_iter().filter(|p| is_image(p)) {
                if path.exists() {
                    pending.insert(path, Instant::now());
                } else {
                    pending.remove(&path);
                    info!(path = %path.display(), "fs: remove (rename)");
                    let _ = to_viewer.send(PhotoEvent::Removed(path)).await;
                }
            }
        }
        _ => {
            debug!(kind = ?event.kind, "fs: ignored");
        }
    }
}

#[inline]
fn is_image(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.to_ascii_lowercase()),
        Some(ref ext) if ["jpg", "jpeg", "png", "gif", "webp"].contains(&ext.as_str())
    )
}

/// Full CPU-side pipeline for one photo: decode, EXIF-correct, downscale.
fn prepare_photo(path: &Path, max_dimension: u32) -> Result<PreparedPhotoCpu> {
    let image = decode_rgba8_apply_exif(path)?;
    let image = downscale_to_fit(image, max_dimension)?;
    let (width, height) = image.dimensions();
    Ok(PreparedPhotoCpu {
        path: path.to_path_buf(),
        width,
        height,
        pixels: image.into_raw(),
    })
}

// Decodes to RGBA8 and bakes in the EXIF orientation if present, so the
// rest of the pipeline never thinks about rotation again.
fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage> {
    let decoded = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    let mut image = decoded.to_rgba8();

    let orientation = read_orientation(path).unwrap_or(1);
    match orientation {
        1 => {}
        2 => {
            image = image::imageops::flip_horizontal(&image);
        }
        3 => {
            image = image::imageops::rotate180(&image);
        }
        4 => {
            image = image::imageops::flip_vertical(&image);
        }
        5 => {
            image = image::imageops::rotate90(&image);
            image = image::imageops::flip_horizontal(&image);
        }
        6 => {
            image = image::imageops::rotate90(&image);
        }
        7 => {
            image = image::imageops::rotate270(&image);
            image = image::imageops::flip_horizontal(&image);
        }
        8 => {
            image = image::imageops::rotate270(&image);
        }
        _ => {}
    }
    Ok(image)
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    debug!("exif orientation {} for {}", value, path.display());
    Some(value as u16)
}

/// Shrinks the image so its long edge fits `max_dimension`, preserving
/// aspect. Images already within the limit pass through untouched.
fn downscale_to_fit(source: RgbaImage, max_dimension: u32) -> Result<RgbaImage> {
    let (width, height) = source.dimensions();
    let long_edge = width.max(height);
    if long_edge <= max_dimension {
        return Ok(source);
    }
    let scale = max_dimension as f32 / long_edge as f32;
    let target_w = ((width as f32 * scale).round() as u32).max(1);
    let target_h = ((height as f32 * scale).round() as u32).max(1);
    resize_rgba(&source, target_w, target_h)
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for photo resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("photo resize failed")?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use image::Rgba;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        let img = decode_rgba8_apply_exif(&path).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn downscale_caps_the_long_edge_and_keeps_aspect() {
        let source = RgbaImage::from_pixel(40, 20, Rgba([10, 20, 30, 255]));
        let shrunk = downscale_to_fit(source, 10).unwrap();
        assert_eq!(shrunk.dimensions(), (10, 5));
    }

    #[test]
    fn downscale_passes_small_images_through_untouched() {
        let source = RgbaImage::from_pixel(8, 6, Rgba([1, 2, 3, 255]));
        let same = downscale_to_fit(source.clone(), 16).unwrap();
        assert_eq!(same, source);
    }

    #[test]
    fn prepare_photo_reports_final_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::from_pixel(64, 16, Rgba([200, 100, 50, 255]))
            .save(&path)
            .unwrap();
        let photo = prepare_photo(&path, 32).unwrap();
        assert_eq!((photo.width, photo.height), (32, 8));
        assert_eq!(photo.pixels.len(), 32 * 8 * 4);
        assert!((photo.aspect() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn image_extension_filter_is_case_insensitive() {
        assert!(is_image(Path::new("/lib/a.JPG")));
        assert!(is_image(Path::new("/lib/b.webp")));
        assert!(!is_image(Path::new("/lib/notes.txt")));
        assert!(!is_image(Path::new("/lib/no_extension")));
    }
}
