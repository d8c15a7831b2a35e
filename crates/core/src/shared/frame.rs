use ndarray::{s, ArrayView3};

/// A decoded video frame: tightly packed RGB bytes in row-major order.
///
/// Pixel format conversion happens in the video adapters; everything in
/// between treats the buffer as `height x width x channels`.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps an RGB image buffer as the frame at `index`.
    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// View of the `w x h` sub-rectangle at `(x, y)`.
    ///
    /// The rectangle is clipped to the frame, so the view can be smaller
    /// than requested when it runs past an edge.
    pub fn region(&self, x: u32, y: u32, w: u32, h: u32) -> ArrayView3<'_, u8> {
        let x0 = (x as usize).min(self.width as usize);
        let y0 = (y as usize).min(self.height as usize);
        let x1 = (x as usize + w as usize).min(self.width as usize);
        let y1 = (y as usize + h as usize).min(self.height as usize);
        self.as_ndarray().slice_move(s![y0..y1, x0..x1, ..])
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
