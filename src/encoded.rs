//! Encoded images and the conversions in and out of them.
//!
//! An [`EncodedImage`] is a data URL (`data:<media-type>;base64,<payload>`):
//! it carries its own media type and can be sent to the model or written
//! back to disk without any other context.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageFormat;

use crate::error::{Error, Result};

/// Largest file accepted for upload.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Media type of every processed image.
pub const OUTPUT_MEDIA_TYPE: &str = "image/png";

/// Prefix of generated download filenames.
pub const DOWNLOAD_PREFIX: &str = "clearview-cleaned";

/// An immutable image snapshot in data-URL form.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    url: String,
    payload_start: usize,
}

impl EncodedImage {
    /// Encode raw bytes under the given media type.
    #[must_use]
    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Self {
        Self::from_base64(media_type, &STANDARD.encode(bytes))
    }

    /// Wrap an already base64-encoded payload.
    #[must_use]
    pub fn from_base64(media_type: &str, payload: &str) -> Self {
        let url = format!("data:{media_type};base64,{payload}");
        let payload_start = url.len() - payload.len();
        Self { url, payload_start }
    }

    /// Parse a `data:<media-type>;base64,<payload>` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDataUrl`] if the string is not a base64 data URL.
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || Error::InvalidDataUrl(truncate(url, 48));

        let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
        let (header, _) = rest.split_once(',').ok_or_else(invalid)?;
        let media_type = header.strip_suffix(";base64").ok_or_else(invalid)?;
        if media_type.is_empty() || !media_type.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            url: url.to_string(),
            payload_start: "data:".len() + header.len() + 1,
        })
    }

    /// The full data URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// The media type embedded in the URL, e.g. `image/png`.
    #[must_use]
    pub fn media_type(&self) -> &str {
        let header = &self.url["data:".len()..self.payload_start - 1];
        header.strip_suffix(";base64").unwrap_or(header)
    }

    /// The base64 payload with the data-URL prefix stripped.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.url[self.payload_start..]
    }

    /// Decode the payload back to raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Base64`] if the payload is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(self.payload())?)
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("media_type", &self.media_type())
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Strip a leading `data:image/<word>;base64,` prefix, if present.
///
/// Anything else is returned unchanged.
#[must_use]
pub fn strip_data_url_prefix(data: &str) -> &str {
    let Some(rest) = data.strip_prefix("data:image/") else {
        return data;
    };
    let word_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if word_len == 0 {
        return data;
    }
    rest[word_len..].strip_prefix(";base64,").unwrap_or(data)
}

/// Check if a file has an extension accepted for upload.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp"
        ),
        None => false,
    }
}

/// Encode image bytes, detecting the media type from content first and the
/// path's extension second.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] unless the image is PNG, JPEG or WebP.
pub fn encode_bytes(bytes: &[u8], path: &Path) -> Result<EncodedImage> {
    let format = image::guess_format(bytes)
        .or_else(|_| ImageFormat::from_path(path))
        .map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP => {
            Ok(EncodedImage::from_bytes(format.to_mime_type(), bytes))
        }
        other => Err(Error::UnsupportedFormat(format!("{other:?}"))),
    }
}

/// Read a file and encode it.
///
/// The size limit is the caller's concern; see [`MAX_UPLOAD_BYTES`].
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, or
/// [`Error::UnsupportedFormat`] for formats other than PNG, JPEG and WebP.
pub async fn encode_file(path: &Path) -> Result<EncodedImage> {
    let bytes = tokio::fs::read(path).await?;
    log::debug!("read {} bytes from {}", bytes.len(), path.display());
    encode_bytes(&bytes, path)
}

/// A processed image ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Suggested filename, `clearview-cleaned-<unix-millis>.png`.
    pub filename: String,
    /// Decoded image bytes.
    pub bytes: Vec<u8>,
}

impl Download {
    /// Prepare an encoded image for saving, naming it after `timestamp_millis`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Base64`] if the payload cannot be decoded.
    pub fn from_image(image: &EncodedImage, timestamp_millis: i64) -> Result<Self> {
        Ok(Self {
            filename: download_filename(timestamp_millis),
            bytes: image.decode()?,
        })
    }

    /// Write the image. A directory target receives the suggested filename;
    /// any other target is used as the file path.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or file cannot be written.
    pub fn save_to(&self, target: &Path) -> Result<PathBuf> {
        let path = if target.is_dir() {
            target.join(&self.filename)
        } else {
            target.to_path_buf()
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Filename for a download made at `timestamp_millis`.
#[must_use]
pub fn download_filename(timestamp_millis: i64) -> String {
    format!("{DOWNLOAD_PREFIX}-{timestamp_millis}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn from_bytes_builds_data_url() {
        let img = EncodedImage::from_bytes("image/png", b"hello");
        assert_eq!(img.as_str(), "data:image/png;base64,aGVsbG8=");
        assert_eq!(img.media_type(), "image/png");
        assert_eq!(img.payload(), "aGVsbG8=");
        assert_eq!(img.decode().unwrap(), b"hello");
    }

    #[test]
    fn parse_accepts_data_urls() {
        let img = EncodedImage::parse("data:image/jpeg;base64,AAAA").unwrap();
        assert_eq!(img.media_type(), "image/jpeg");
        assert_eq!(img.payload(), "AAAA");
    }

    #[test]
    fn parse_rejects_other_strings() {
        assert!(EncodedImage::parse("AAAA").is_err());
        assert!(EncodedImage::parse("data:image/png,AAAA").is_err());
        assert!(EncodedImage::parse("data:;base64,AAAA").is_err());
        assert!(EncodedImage::parse("data:image/png;base64").is_err());
    }

    #[test]
    fn strip_prefix_only_touches_image_data_urls() {
        assert_eq!(strip_data_url_prefix("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url_prefix("data:image/webp;base64,BBBB"), "BBBB");
        assert_eq!(strip_data_url_prefix("AAAA"), "AAAA");
        assert_eq!(
            strip_data_url_prefix("data:text/plain;base64,AAAA"),
            "data:text/plain;base64,AAAA"
        );
        assert_eq!(
            strip_data_url_prefix("data:image/;base64,AAAA"),
            "data:image/;base64,AAAA"
        );
    }

    #[test]
    fn encode_bytes_sniffs_content() {
        let img = encode_bytes(PNG_MAGIC, Path::new("photo.jpg")).unwrap();
        assert_eq!(img.media_type(), "image/png");
    }

    #[test]
    fn encode_bytes_falls_back_to_extension() {
        let img = encode_bytes(b"not really an image", Path::new("photo.webp")).unwrap();
        assert_eq!(img.media_type(), "image/webp");
    }

    #[test]
    fn encode_bytes_rejects_unsupported_formats() {
        assert!(matches!(
            encode_bytes(b"GIF89a....", Path::new("anim.gif")),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            encode_bytes(b"???", Path::new("notes.txt")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn is_supported_image_accepts_upload_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(!is_supported_image(Path::new("photo.bmp")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn download_filename_embeds_timestamp() {
        assert_eq!(
            download_filename(1_700_000_000_123),
            "clearview-cleaned-1700000000123.png"
        );
    }

    #[test]
    fn download_saves_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let img = EncodedImage::from_bytes(OUTPUT_MEDIA_TYPE, b"pixels");
        let download = Download::from_image(&img, 42).unwrap();

        let path = download.save_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("clearview-cleaned-42.png"));
        assert_eq!(std::fs::read(path).unwrap(), b"pixels");
    }

    #[test]
    fn download_saves_to_explicit_file_creating_parents() {
        let dir = tempfile::tempdir().unwrap();
        let img = EncodedImage::from_bytes(OUTPUT_MEDIA_TYPE, b"pixels");
        let download = Download::from_image(&img, 42).unwrap();

        let target = dir.path().join("nested").join("out.png");
        let path = download.save_to(&target).unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
    }

    #[tokio::test]
    async fn encode_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let img = encode_file(&path).await.unwrap();
        assert_eq!(img.media_type(), "image/png");
        assert_eq!(img.decode().unwrap(), PNG_MAGIC);
    }

    #[tokio::test]
    async fn encode_file_reports_missing_files() {
        let result = encode_file(Path::new("/definitely/not/here.png")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
