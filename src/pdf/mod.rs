//! PDF export: a from-scratch object model and document writer, a per-page draw
//! context, and encoders for gradients, images, fonts and tagged structure.

mod bitmap;
mod deflate;
mod document;
mod export;
mod font;
mod form_xobject;
mod gradient;
mod graphic_stack;
mod graphic_state;
mod metadata;
mod object;
mod resources;
mod tag;
pub(crate) mod utils;
mod xmp;

pub use deflate::{deflate_bytes, DeflateWriteStream};
pub use document::{ExportError, PdfDocument, PdfStreamCompression};
pub use export::{PageCanvas, PdfExportContext};
pub use metadata::{
    ColorSpace, CompressionLevel, DateTime, Outline, PdfAttributeList, PdfMetadata,
    PdfStructureElementNode, DEFAULT_RASTER_DPI,
};
pub use object::{
    write_byte_string, write_text_string, ObjectRef, PdfArray, PdfDictionary, PdfObject,
    PdfValue,
};
pub use xmp::Uuid;

impl PdfDocument {
    /// The canvas for the page currently being drawn, or None between pages.
    pub fn canvas(&mut self) -> Option<PageCanvas<'_>> {
        let context = self.draw_context.as_mut()?;
        Some(PageCanvas::new(context, &mut self.core))
    }
}
