//! Still images handed to face recognition
//!
//! Uploads and camera snapshots both end up as a `CapturedImage`: the encoded
//! bytes plus where they came from. Uploads are validated here before the
//! flow accepts them, and a small preview is rendered for the confirm screen.

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Raster formats accepted for upload
pub const ACCEPTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

/// File extensions offered by the file chooser
pub const ACCEPTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// Where a captured image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Upload,
    Selfie,
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Upload => f.write_str("upload"),
            ImageSource::Selfie => f.write_str("selfie"),
        }
    }
}

/// Raw bytes from the file chooser, a dropped file or the camera
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    pub source: ImageSource,
    /// File name when the bytes came from disk
    pub name: Option<String>,
    pub bytes: Arc<[u8]>,
}

impl ImageInput {
    pub fn upload(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        ImageInput {
            source: ImageSource::Upload,
            name: Some(name.into()),
            bytes: bytes.into(),
        }
    }

    pub fn snapshot(bytes: impl Into<Arc<[u8]>>) -> Self {
        ImageInput {
            source: ImageSource::Selfie,
            name: None,
            bytes: bytes.into(),
        }
    }
}

/// Why an image could not be accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("The selected file is empty. Please choose a photo of your face.")]
    Empty,

    #[error("This image is too large. The maximum size is {}; please choose a smaller photo.", format_size(*limit))]
    TooLarge { size: u64, limit: u64 },

    #[error("This file type is not supported. Please use a JPG, PNG, WebP, GIF or BMP image.")]
    UnsupportedFormat,

    #[error("The image could not be read ({0}). The file may be damaged; please choose another.")]
    Corrupt(String),

    #[error("The file could not be opened ({0}).")]
    Unreadable(String),
}

/// An encoded still image ready for recognition
///
/// Not `Clone`: it is moved into the recognition call and consumed there.
#[derive(PartialEq)]
pub struct CapturedImage {
    source: ImageSource,
    format: ImageFormat,
    width: u32,
    height: u32,
    bytes: Arc<[u8]>,
}

impl CapturedImage {
    pub fn source(&self) -> ImageSource {
        self.source
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("source", &self.source)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Downscaled RGBA copy of the image shown before confirming
#[derive(Clone, PartialEq, Eq)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preview({}x{})", self.width, self.height)
    }
}

/// Size and format rules for accepted images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRules {
    pub max_bytes: u64,
    /// Longest edge of the generated preview
    pub preview_size: u32,
}

impl Default for ImageRules {
    fn default() -> Self {
        ImageRules {
            max_bytes: 10 * 1024 * 1024,
            preview_size: 384,
        }
    }
}

/// Validate and decode `input`, producing the image and its preview
pub fn decode(input: ImageInput, rules: &ImageRules) -> Result<(CapturedImage, Preview), DecodeError> {
    let size = input.bytes.len() as u64;
    if size == 0 {
        return Err(DecodeError::Empty);
    }
    if size > rules.max_bytes {
        return Err(DecodeError::TooLarge { size, limit: rules.max_bytes });
    }

    let format = image::guess_format(&input.bytes).map_err(|_| DecodeError::UnsupportedFormat)?;
    if !ACCEPTED_FORMATS.contains(&format) {
        return Err(DecodeError::UnsupportedFormat);
    }

    let decoded = image::load_from_memory_with_format(&input.bytes, format)
        .map_err(|e| DecodeError::Corrupt(e.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::Corrupt("image has no pixels".into()));
    }

    let preview = render_preview(&decoded, rules.preview_size);
    let image = CapturedImage {
        source: input.source,
        format,
        width,
        height,
        bytes: input.bytes,
    };
    Ok((image, preview))
}

/// Read a chosen or dropped file from disk
///
/// Files over `max_bytes` are rejected from their metadata without being
/// loaded.
pub async fn read_upload(path: PathBuf, max_bytes: u64) -> Result<ImageInput, DecodeError> {
    let unreadable = |e: std::io::Error| DecodeError::Unreadable(e.to_string());
    let size = tokio::fs::metadata(&path).await.map_err(unreadable)?.len();
    if size > max_bytes {
        return Err(DecodeError::TooLarge { size, limit: max_bytes });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = tokio::fs::read(&path).await.map_err(unreadable)?;
    Ok(ImageInput::upload(name, bytes))
}

/// Human-readable byte count for limits shown to the user
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes < MIB {
        format!("{} KB", bytes.div_ceil(KIB))
    } else if bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

/// Resize to fit a `size`×`size` box, keeping the aspect ratio
pub fn render_preview(image: &DynamicImage, size: u32) -> Preview {
    let thumbnail = image.resize(size, size, FilterType::Triangle).to_rgba8();
    Preview {
        width: thumbnail.width(),
        height: thumbnail.height(),
        rgba: thumbnail.into_raw(),
    }
}

/// Encode a camera frame as JPEG
pub fn encode_jpeg(frame: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(frame.to_rgb8()).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)?;
    Ok(bytes)
}
