use std::fmt;

pub const IMAGE_BASE_URL: &str = "https://images.igdb.com/igdb/image/upload";

/// Image presets served by the upstream image CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    CoverSmall,
    CoverBig,
    ScreenshotMed,
    ScreenshotBig,
    Thumb,
    Hd720,
    Hd1080,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::CoverSmall => "cover_small",
            ImageSize::CoverBig => "cover_big",
            ImageSize::ScreenshotMed => "screenshot_med",
            ImageSize::ScreenshotBig => "screenshot_big",
            ImageSize::Thumb => "thumb",
            ImageSize::Hd720 => "720p",
            ImageSize::Hd1080 => "1080p",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the CDN URL for an image hash.
pub fn image_url(hash: &str, size: ImageSize) -> String {
    format!("{IMAGE_BASE_URL}/t_{size}/{hash}.jpg")
}
