use ndarray::ArrayView3;

/// Bytes per pixel: every frame in the pipeline is packed RGB24.
pub const CHANNELS: usize = 3;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Pixel-format conversion happens at the camera boundary; everything
/// downstream (detector preprocessing, overlay compositing, still encoding)
/// assumes RGB24. `index` counts frames since the source was opened.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Native resolution as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `(height, width, channel)` view for tensor preprocessing.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        let shape = (self.height as usize, self.width as usize, CHANNELS);
        ArrayView3::from_shape(shape, &self.data)
            .expect("Frame data length must match dimensions")
    }
}
