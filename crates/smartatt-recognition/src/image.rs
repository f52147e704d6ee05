//! Minimal image primitives for the recognition pipeline.
//!
//! Frames are owned 8-bit luma images; that is all the quality gates
//! need, and the opaque embedder receives the same representation.

/// Owned 8-bit grayscale frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Create a frame from raw luma bytes. Returns `None` when the
    /// buffer does not match the dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Uniform frame, mostly useful in tests.
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; (width as usize) * (height as usize)],
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extract a sub-image. The region is clamped to the frame bounds;
    /// a region fully outside them yields `None`.
    #[must_use]
    pub fn crop(&self, region: BoundingBox) -> Option<Frame> {
        let x0 = region.x.min(self.width);
        let y0 = region.y.min(self.height);
        let x1 = region.x.saturating_add(region.width).min(self.width);
        let y1 = region.y.saturating_add(region.height).min(self.height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let w = (x1 - x0) as usize;
        let mut data = Vec::with_capacity(w * ((y1 - y0) as usize));
        for row in y0..y1 {
            let start = (row * self.width + x0) as usize;
            data.extend_from_slice(&self.data[start..start + w]);
        }
        Frame::new(x1 - x0, y1 - y0, data)
    }

    /// Sharpness estimate: variance of the 4-neighbour Laplacian.
    ///
    /// Flat or defocused crops score near zero; anything with real edge
    /// content scores well above the blur threshold.
    #[must_use]
    pub fn variance_of_laplacian(&self) -> f64 {
        if self.width < 3 || self.height < 3 {
            return 0.0;
        }
        let w = self.width as usize;
        let h = self.height as usize;
        let px = |x: usize, y: usize| f64::from(self.data[y * w + x]);

        let mut values = Vec::with_capacity((w - 2) * (h - 2));
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let lap = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1)
                    - 4.0 * px(x, y);
                values.push(lap);
            }
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
    }
}

/// Axis-aligned box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    /// Grow the box by `pad` pixels on every side, clamped at the origin.
    #[must_use]
    pub fn padded(&self, pad: u32) -> Self {
        Self {
            x: self.x.saturating_sub(pad),
            y: self.y.saturating_sub(pad),
            width: self.width.saturating_add(pad * 2),
            height: self.height.saturating_add(pad * 2),
        }
    }
}

/// One face candidate from the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Face embedding vector from the opaque scorer.
pub type Embedding = Vec<f32>;
