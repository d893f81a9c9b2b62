use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use reqwest::blocking::Client;
use rfd::FileDialog;
use thiserror::Error;

use crate::assets::AppSettings;
use crate::canvas::SurfaceAccess;
use crate::ops::canvas_ops::ExportError;

// ============================================================================
// IMAGE REFERENCES
// ============================================================================

/// Where a background picture comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRef {
    /// Remote image, fetched anonymously.
    Url(String),
    /// Encoded image bytes already in memory (API payload or `data:` URL).
    Inline { mime_type: String, data: Vec<u8> },
    /// Image file on the local disk.
    File(PathBuf),
}

impl ImageRef {
    /// Interpret a user/CLI supplied reference: `data:` URLs are decoded,
    /// `http(s)://` stays remote, anything else is treated as a file path.
    pub fn parse(s: &str) -> Result<Self, LoadError> {
        let s = s.trim();
        if s.starts_with("data:") {
            let (mime_type, data) = decode_data_url(s)?;
            Ok(ImageRef::Inline { mime_type, data })
        } else if s.starts_with("http://") || s.starts_with("https://") {
            Ok(ImageRef::Url(s.to_string()))
        } else {
            Ok(ImageRef::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Url(url) => write!(f, "{}", url),
            ImageRef::Inline { mime_type, data } => write!(f, "inline {} ({} bytes)", mime_type, data.len()),
            ImageRef::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Split a base64 `data:` URL into its MIME type and decoded bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), LoadError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| LoadError::BadDataUrl("missing data: prefix".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadError::BadDataUrl("missing ',' separator".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| LoadError::BadDataUrl("only base64 data URLs are supported".to_string()))?;
    let data = BASE64
        .decode(payload.trim())
        .map_err(|e| LoadError::BadDataUrl(e.to_string()))?;
    let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
    Ok((mime.to_string(), data))
}

// ============================================================================
// LOADING
// ============================================================================

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not fetch image: {0}")]
    Fetch(String),

    #[error("image server answered HTTP {0}")]
    Status(u16),

    #[error("malformed data URL: {0}")]
    BadDataUrl(String),

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("could not read image file: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded background, plus whether its pixels may be exported.
pub struct LoadedImage {
    pub pixels: RgbaImage,
    pub access: SurfaceAccess,
}

/// Fetches and decodes background images. Shared across worker threads.
pub struct ImageLoader {
    client: Client,
    timeout: Duration,
    strict_cross_origin: bool,
}

impl ImageLoader {
    pub fn new(settings: &AppSettings) -> Result<Self, LoadError> {
        // Anonymous mode: no cookie store, no credentials
        let timeout = settings.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Fetch(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            timeout,
            strict_cross_origin: settings.strict_cross_origin,
        })
    }

    pub fn load(&self, image_ref: &ImageRef) -> Result<LoadedImage, LoadError> {
        let (bytes, access) = match image_ref {
            ImageRef::Url(url) => self.fetch_remote(url)?,
            ImageRef::Inline { data, .. } => (data.clone(), SurfaceAccess::Readable),
            ImageRef::File(path) => (std::fs::read(path)?, SurfaceAccess::Readable),
        };
        let pixels = image::load_from_memory(&bytes)?.into_rgba8();
        Ok(LoadedImage { pixels, access })
    }

    fn fetch_remote(&self, url: &str) -> Result<(Vec<u8>, SurfaceAccess), LoadError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LoadError::Fetch(format!("no answer within {}s", self.timeout.as_secs()))
                } else {
                    LoadError::Fetch(e.to_string())
                }
            })?;
        if !resp.status().is_success() {
            return Err(LoadError::Status(resp.status().as_u16()));
        }
        let granted = resp
            .headers()
            .get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "*");
        let access = if granted || !self.strict_cross_origin {
            SurfaceAccess::Readable
        } else {
            SurfaceAccess::Tainted
        };
        let bytes = resp.bytes().map_err(|e| LoadError::Fetch(e.to_string()))?;
        Ok((bytes.to_vec(), access))
    }
}

/// Outcome of one background load, tagged with the request's token.
pub struct BackgroundResult {
    pub token: u64,
    pub image_ref: ImageRef,
    pub result: Result<LoadedImage, LoadError>,
}

/// Load `image_ref` on a worker thread and post the result to `sender`.
pub fn spawn_background_load(
    loader: Arc<ImageLoader>,
    image_ref: ImageRef,
    token: u64,
    sender: mpsc::Sender<BackgroundResult>,
) {
    std::thread::spawn(move || {
        let result = loader.load(&image_ref);
        // Receiver gone means the app is shutting down
        let _ = sender.send(BackgroundResult { token, image_ref, result });
    });
}

// ============================================================================
// EXPORT
// ============================================================================

/// Encode an RGBA buffer as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf.into_inner())
}

pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    let bytes = encode_png(image)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Ask the user where to save, prefilled with `default_name`.
pub fn pick_save_path(default_name: &str) -> Option<PathBuf> {
    FileDialog::new()
        .set_file_name(default_name)
        .add_filter("PNG Image", &["png"])
        .save_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn tiny_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        encode_png(&img).expect("encode")
    }

    #[test]
    fn parse_distinguishes_reference_kinds() {
        assert_eq!(
            ImageRef::parse("https://example.com/a.png").expect("url"),
            ImageRef::Url("https://example.com/a.png".to_string())
        );
        assert_eq!(
            ImageRef::parse("pages/dino.png").expect("file"),
            ImageRef::File(PathBuf::from("pages/dino.png"))
        );
        let data_url = format!("data:image/png;base64,{}", BASE64.encode(tiny_png()));
        match ImageRef::parse(&data_url).expect("data url") {
            ImageRef::Inline { mime_type, data } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(data, tiny_png());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(matches!(decode_data_url("data:image/png,abc"), Err(LoadError::BadDataUrl(_))));
        assert!(matches!(decode_data_url("data:image/png;base64"), Err(LoadError::BadDataUrl(_))));
        assert!(matches!(decode_data_url("data:image/png;base64,@@@"), Err(LoadError::BadDataUrl(_))));
    }

    #[test]
    fn inline_and_file_images_decode_as_readable() {
        let loader = ImageLoader::new(&AppSettings::default()).expect("loader");
        let inline = ImageRef::Inline { mime_type: "image/png".to_string(), data: tiny_png() };
        let loaded = loader.load(&inline).expect("inline load");
        assert_eq!(loaded.pixels.dimensions(), (3, 2));
        assert_eq!(loaded.access, SurfaceAccess::Readable);

        let path = std::env::temp_dir().join(format!("colormagic-io-{}.png", std::process::id()));
        std::fs::write(&path, tiny_png()).expect("write temp");
        let loaded = loader.load(&ImageRef::File(path.clone())).expect("file load");
        assert_eq!(*loaded.pixels.get_pixel(2, 1), Rgba([10, 20, 30, 255]));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn undecodable_bytes_and_missing_files_fail() {
        let loader = ImageLoader::new(&AppSettings::default()).expect("loader");
        let junk = ImageRef::Inline { mime_type: "image/png".to_string(), data: b"not a png".to_vec() };
        assert!(matches!(loader.load(&junk), Err(LoadError::Decode(_))));
        let missing = ImageRef::File(PathBuf::from("/definitely/not/here.png"));
        assert!(matches!(loader.load(&missing), Err(LoadError::Io(_))));
    }

    #[test]
    fn loader_uses_the_configured_timeout() {
        let settings = AppSettings { request_timeout_secs: 7, ..Default::default() };
        let loader = ImageLoader::new(&settings).expect("loader");
        assert_eq!(loader.timeout, Duration::from_secs(7));
    }

    #[test]
    fn png_bytes_decode_back_to_the_same_pixels() {
        let img = RgbaImage::from_fn(5, 4, |x, y| Rgba([x as u8 * 40, y as u8 * 60, 7, 128 + x as u8]));
        let bytes = encode_png(&img).expect("encode");
        let back = image::load_from_memory(&bytes).expect("decode").into_rgba8();
        assert_eq!(back, img);
    }
}
