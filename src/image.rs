//! Inline image payloads.
//!
//! Images travel as `data:<mime>;base64,<bytes>` strings inside the message
//! and profile JSON. Outgoing images get their MIME type from the file
//! signature, not from whatever the caller claims. Incoming ones keep the
//! `image/*` type the sender declared.

use std::borrow::Cow;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Raw-size ceiling used when the configuration does not override it.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image is empty")]
    Empty,
    #[error("image is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },
    #[error("not a supported image (png, jpeg, gif or webp)")]
    UnsupportedFormat,
    #[error("malformed data url")]
    MalformedDataUrl,
    #[error("bad base64 payload")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    mime: Cow<'static, str>,
    data: Vec<u8>,
}

impl InlineImage {
    /// Validates raw file bytes against the size bound and the format
    /// whitelist.
    pub fn from_bytes(data: Vec<u8>, max_bytes: usize) -> Result<Self, ImageError> {
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        if data.len() > max_bytes {
            return Err(ImageError::TooLarge {
                size: data.len(),
                max: max_bytes,
            });
        }
        let mime = sniff_mime(&data).ok_or(ImageError::UnsupportedFormat)?;
        Ok(Self {
            mime: Cow::Borrowed(mime),
            data,
        })
    }

    /// Decodes an image someone else sent. Any declared `image/*` type is
    /// accepted and the bytes come back unchanged.
    pub fn from_data_url(url: &str) -> Result<Self, ImageError> {
        let rest = url.strip_prefix("data:").ok_or(ImageError::MalformedDataUrl)?;
        let (declared, payload) = rest
            .split_once(";base64,")
            .ok_or(ImageError::MalformedDataUrl)?;
        if !declared.starts_with("image/") || declared.len() == "image/".len() {
            return Err(ImageError::UnsupportedFormat);
        }

        let data = STANDARD.decode(payload.trim())?;
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(Self {
            mime: Cow::Owned(declared.to_owned()),
            data,
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG: &[u8] = b"\xff\xd8\xff";

    if data.starts_with(PNG) {
        Some("image/png")
    } else if data.starts_with(JPEG) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
