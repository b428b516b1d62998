//! Image formats accepted for upload.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The declared format is not on the upload allow-list.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported image format: {0:?} (allowed: png, jpeg, jpg)")]
pub struct UnsupportedImageFormat(pub String);

/// An image format on the upload allow-list.
///
/// `jpeg` and `jpg` are kept distinct because the provider reports the
/// extension it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Jpg,
}

impl ImageFormat {
    /// Every accepted format, in the order sent to the provider.
    pub const ALLOWED: [Self; 3] = [Self::Png, Self::Jpeg, Self::Jpg];

    /// Lowercase extension.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Jpg => "jpg",
        }
    }

    /// MIME type used when forwarding the file.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg | Self::Jpg => "image/jpeg",
        }
    }

    /// Comma-separated allow-list, e.g. for the provider's `allowed_formats`.
    #[must_use]
    pub fn allow_list() -> String {
        Self::ALLOWED.map(Self::as_str).join(",")
    }

    /// Resolve a format from a MIME type such as `image/png`.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedImageFormat`] for anything but PNG or JPEG.
    pub fn from_mime(mime: &str) -> Result<Self, UnsupportedImageFormat> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Ok(Self::Png),
            "image/jpeg" | "image/pjpeg" => Ok(Self::Jpeg),
            "image/jpg" => Ok(Self::Jpg),
            _ => Err(UnsupportedImageFormat(mime.to_owned())),
        }
    }

    /// Resolve a format from a file name's extension.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedImageFormat`] if there is no extension or it is
    /// not on the allow-list.
    pub fn from_file_name(name: &str) -> Result<Self, UnsupportedImageFormat> {
        name.rsplit_once('.')
            .ok_or_else(|| UnsupportedImageFormat(name.to_owned()))
            .and_then(|(_, ext)| ext.parse())
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = UnsupportedImageFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" => Ok(Self::Jpeg),
            "jpg" => Ok(Self::Jpg),
            _ => Err(UnsupportedImageFormat(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        assert_eq!(ImageFormat::allow_list(), "png,jpeg,jpg");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("Jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpg);
    }

    #[test]
    fn test_rejects_formats_outside_allow_list() {
        for bad in ["gif", "webp", "svg", "", "png.exe"] {
            assert!(bad.parse::<ImageFormat>().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_from_mime() {
        assert_eq!(ImageFormat::from_mime("image/png").unwrap(), ImageFormat::Png);
        assert_eq!(
            ImageFormat::from_mime("image/jpeg; charset=binary").unwrap(),
            ImageFormat::Jpeg
        );
        assert!(ImageFormat::from_mime("image/gif").is_err());
    }

    #[test]
    fn test_from_file_name() {
        assert_eq!(
            ImageFormat::from_file_name("tent.site.JPG").unwrap(),
            ImageFormat::Jpg
        );
        assert!(ImageFormat::from_file_name("README").is_err());
        assert!(ImageFormat::from_file_name("map.tiff").is_err());
    }
}
