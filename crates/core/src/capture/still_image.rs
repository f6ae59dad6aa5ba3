use crate::capture::CaptureError;
use crate::shared::frame::Frame;

/// An immutable PNG-encoded snapshot at camera-native resolution.
///
/// Created only by the capture gate and dropped on retake; it is never
/// persisted by the core.
#[derive(Clone, Debug, PartialEq)]
pub struct StillImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl StillImage {
    /// Rasterizes a live frame into an encoded still.
    pub fn encode(frame: &Frame) -> Result<Self, CaptureError> {
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| CaptureError::Encode("frame buffer does not match dimensions".into()))?;

        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;

        Ok(Self {
            png,
            width: frame.width(),
            height: frame.height(),
        })
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
