use std::sync::Arc;

/// Pixel formats the exporter consumes. RGBA pixels are premultiplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Rgba8888,
    Alpha8,
    Gray8,
}

impl ColorType {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            ColorType::Rgba8888 => 4,
            ColorType::Alpha8 | ColorType::Gray8 => 1,
        }
    }
}

/// Owned pixel storage with direct access; the "image pixel access" interface the PDF
/// bitmap serializer reads from.
#[derive(Clone)]
pub struct Pixmap {
    width: i32,
    height: i32,
    color_type: ColorType,
    row_bytes: usize,
    pixels: Vec<u8>,
}

impl Pixmap {
    /// Creates a zero-filled pixmap. Returns None for non-positive dimensions.
    pub fn new(width: i32, height: i32, color_type: ColorType) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        let row_bytes = width as usize * color_type.bytes_per_pixel();
        Some(Pixmap {
            width,
            height,
            color_type,
            row_bytes,
            pixels: vec![0; row_bytes * height as usize],
        })
    }

    /// Wraps existing pixels. The buffer must hold `row_bytes * height` bytes.
    pub fn from_pixels(
        width: i32, height: i32, color_type: ColorType, pixels: Vec<u8>,
    ) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        let row_bytes = width as usize * color_type.bytes_per_pixel();
        if pixels.len() < row_bytes * height as usize {
            return None;
        }
        Some(Pixmap { width, height, color_type, row_bytes, pixels })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn row(&self, y: i32) -> &[u8] {
        let start = y as usize * self.row_bytes;
        &self.pixels[start..start + self.row_bytes]
    }

    /// Reads an RGBA pixel as a packed little-endian word. Alpha-only and gray pixmaps
    /// report their single channel in every lane.
    pub fn pixel32(&self, x: i32, y: i32) -> u32 {
        match self.color_type {
            ColorType::Rgba8888 => {
                let offset = y as usize * self.row_bytes + x as usize * 4;
                u32::from_le_bytes(self.pixels[offset..offset + 4].try_into().unwrap())
            }
            ColorType::Alpha8 | ColorType::Gray8 => {
                let v = u32::from(self.pixels[y as usize * self.row_bytes + x as usize]);
                v | (v << 8) | (v << 16) | (v << 24)
            }
        }
    }

    /// True when no pixel has alpha below 255.
    pub fn is_opaque(&self) -> bool {
        match self.color_type {
            ColorType::Gray8 => true,
            ColorType::Alpha8 => self.pixels.iter().all(|a| *a == 0xFF),
            ColorType::Rgba8888 => {
                for y in 0..self.height {
                    let row = self.row(y);
                    for x in 0..self.width as usize {
                        if row[x * 4 + 3] != 0xFF {
                            return false;
                        }
                    }
                }
                true
            }
        }
    }
}

/// A read-only image the pipeline can composite and export. Implementations back the
/// handle with decoded pixels, a texture readback, or generated content.
pub trait Image: Send + Sync {
    fn width(&self) -> i32;

    fn height(&self) -> i32;

    /// True for mask-style images carrying only coverage.
    fn is_alpha_only(&self) -> bool {
        false
    }

    /// Reads the image's pixels. Returns None when the backing store is unavailable.
    fn make_pixmap(&self) -> Option<Pixmap>;
}

/// The plain in-memory image.
pub struct RasterImage {
    pixmap: Arc<Pixmap>,
}

impl RasterImage {
    pub fn new(pixmap: Pixmap) -> Arc<Self> {
        Arc::new(RasterImage { pixmap: Arc::new(pixmap) })
    }
}

impl Image for RasterImage {
    fn width(&self) -> i32 {
        self.pixmap.width()
    }

    fn height(&self) -> i32 {
        self.pixmap.height()
    }

    fn is_alpha_only(&self) -> bool {
        self.pixmap.color_type() == ColorType::Alpha8
    }

    fn make_pixmap(&self) -> Option<Pixmap> {
        Some((*self.pixmap).clone())
    }
}
