//! Document assembly: object emission with offset tracking, stream serialization,
//! the page tree, and the classical cross-reference table plus trailer.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::core::Rasterizer;
use crate::geom::{ISize, Matrix, Rect};
use crate::pdf::export::PdfExportContext;
use crate::pdf::font::FontManager;
use crate::pdf::graphic_state::FillGraphicStateKey;
use crate::pdf::metadata::{CompressionLevel, PdfMetadata, DEFAULT_RASTER_DPI};
use crate::pdf::object::{ObjectRef, PdfArray, PdfDictionary, PdfObject, PdfValue};
use crate::pdf::tag::PdfTagTree;
use crate::pdf::utils::rect_to_array;
use crate::pdf::xmp::{
    self, make_document_information_dict, make_srgb_output_intents, Uuid, SRGB_ICC_PROFILE,
};
use crate::stream::WriteStream;

/// Failures surfaced at the document API boundary.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("page dimensions must be positive")]
    InvalidPageSize,
    #[error("document is closed")]
    DocumentClosed,
    #[error("write to the output stream failed")]
    Io,
}

/// Whether a particular stream may be flate-compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfStreamCompression {
    Yes,
    No,
}

/// Absolute byte offsets of every emitted indirect object, indexed by object number
/// minus one.
#[derive(Default)]
struct OffsetMap {
    offsets: Vec<i32>,
    base_offset: Option<usize>,
}

impl OffsetMap {
    fn mark_start_of_document(&mut self, stream: &dyn WriteStream) {
        self.base_offset = Some(stream.bytes_written());
    }

    fn mark_start_of_object(&mut self, reference_number: i32, stream: &dyn WriteStream) {
        debug_assert!(reference_number > 0);
        let index = (reference_number - 1) as usize;
        if index >= self.offsets.len() {
            self.offsets.resize(index + 1, 0);
        }
        let base = self.base_offset.unwrap_or(0);
        self.offsets[index] = (stream.bytes_written() - base) as i32;
    }

    /// Object count including the reserved zeroth entry.
    fn object_count(&self) -> usize {
        self.offsets.len() + 1
    }

    /// Writes the xref table and returns the table's own file offset.
    fn emit_cross_reference_table(&self, stream: &mut dyn WriteStream) -> i32 {
        let base = self.base_offset.unwrap_or(0);
        let xref_offset = (stream.bytes_written() - base) as i32;
        stream.write_text("xref\n0 ");
        stream.write_text(&self.object_count().to_string());
        stream.write_text("\n0000000000 65535 f \n");
        for offset in &self.offsets {
            debug_assert!(*offset > 0, "offset was never marked");
            stream.write_text(&format!("{offset:010}"));
            stream.write_text(" 00000 n \n");
        }
        xref_offset
    }
}

/// Low-level object emission over the document's write stream.
pub struct PdfWriter {
    stream: Box<dyn WriteStream>,
    offset_map: OffsetMap,
    next_object_number: i32,
    compression_level: CompressionLevel,
}

impl PdfWriter {
    fn new(stream: Box<dyn WriteStream>, compression_level: CompressionLevel) -> PdfWriter {
        PdfWriter {
            stream,
            offset_map: OffsetMap::default(),
            next_object_number: 1,
            compression_level,
        }
    }

    pub fn reserve_ref(&mut self) -> ObjectRef {
        let reference = ObjectRef::new(self.next_object_number);
        self.next_object_number += 1;
        reference
    }

    fn begin_object(&mut self, reference: ObjectRef) {
        self.offset_map.mark_start_of_object(reference.get(), self.stream.as_ref());
        self.stream.write_text(&reference.get().to_string());
        // Generation number is always 0.
        self.stream.write_text(" 0 obj\n");
    }

    fn end_object(&mut self) {
        self.stream.write_text("\nendobj\n");
    }

    /// Emits a body under an already-reserved reference.
    pub fn emit_with(
        &mut self, reference: ObjectRef, body: impl FnOnce(&mut dyn WriteStream),
    ) -> ObjectRef {
        self.begin_object(reference);
        body(self.stream.as_mut());
        self.end_object();
        reference
    }

    pub fn emit_object_with_ref(&mut self, object: &PdfObject, reference: ObjectRef) -> ObjectRef {
        self.emit_with(reference, |stream| object.emit(stream))
    }

    pub fn emit_dictionary_with_ref(
        &mut self, dictionary: &PdfDictionary, reference: ObjectRef,
    ) -> ObjectRef {
        self.emit_with(reference, |stream| dictionary.emit(stream))
    }

    pub fn emit_dictionary(&mut self, dictionary: &PdfDictionary) -> ObjectRef {
        let reference = self.reserve_ref();
        self.emit_dictionary_with_ref(dictionary, reference)
    }

    pub fn emit_array(&mut self, array: &PdfArray) -> ObjectRef {
        let reference = self.reserve_ref();
        self.emit_with(reference, |stream| array.emit(stream))
    }

    /// Serializes a stream object. When compression is allowed and shrinks the body
    /// by more than the cost of the filter key, the dictionary gains
    /// `/Filter /FlateDecode` and the compressed bytes are written instead.
    pub fn emit_stream_data(
        &mut self, dictionary: PdfDictionary, data: Vec<u8>, compression: PdfStreamCompression,
    ) -> ObjectRef {
        let reference = self.reserve_ref();
        self.emit_stream_data_with_ref(dictionary, data, compression, reference)
    }

    pub fn emit_stream_data_with_ref(
        &mut self, mut dictionary: PdfDictionary, data: Vec<u8>,
        compression: PdfStreamCompression, reference: ObjectRef,
    ) -> ObjectRef {
        const MINIMUM_SAVINGS: usize = "/Filter /FlateDecode ".len();
        let mut body = data;
        if self.compression_level != CompressionLevel::None
            && compression == PdfStreamCompression::Yes
            && body.len() > MINIMUM_SAVINGS
        {
            let compressed = crate::pdf::deflate::deflate_bytes(
                &body,
                self.compression_level.zlib_level(),
            );
            if body.len() > compressed.len() + MINIMUM_SAVINGS {
                dictionary.insert_name("Filter", "FlateDecode");
                body = compressed;
            }
        }
        dictionary.insert_usize("Length", body.len());
        self.begin_object(reference);
        dictionary.emit(self.stream.as_mut());
        self.stream.write_text(" stream\n");
        self.stream.write(&body);
        self.stream.write_text("\nendstream");
        self.end_object();
        reference
    }

    pub fn compression_level(&self) -> CompressionLevel {
        self.compression_level
    }
}

/// Caches shared across a whole document.
pub(crate) struct DocumentCaches {
    pub fill_graphic_states: HashMap<FillGraphicStateKey, ObjectRef>,
    pub no_smask_graphic_state: Option<ObjectRef>,
    pub shader_map: HashMap<u64, ObjectRef>,
    pub color_space_ref: Option<ObjectRef>,
    pub icc_profile_ref: Option<ObjectRef>,
    pub fonts: FontManager,
}

impl DocumentCaches {
    fn new() -> DocumentCaches {
        DocumentCaches {
            fill_graphic_states: HashMap::new(),
            no_smask_graphic_state: None,
            shader_map: HashMap::new(),
            color_space_ref: None,
            icc_profile_ref: None,
            fonts: FontManager::new(),
        }
    }
}

/// The document-wide mutable state every draw call can reach: the writer, the caches,
/// the configuration, and the tag tree.
pub(crate) struct DocumentCore {
    pub writer: PdfWriter,
    pub caches: DocumentCaches,
    pub metadata: PdfMetadata,
    pub rasterizer: Option<Arc<dyn Rasterizer>>,
    pub tag_tree: PdfTagTree,
    pub raster_scale: f32,
    pub inverse_raster_scale: f32,
    pub current_page_index: usize,
}

impl DocumentCore {
    /// Emits the document ICC color space once and returns its reference.
    pub fn color_space_ref(&mut self) -> ObjectRef {
        if let Some(reference) = self.caches.color_space_ref {
            return reference;
        }
        let mut dictionary = PdfDictionary::new();
        dictionary.insert_int("N", 3);
        dictionary.insert_name("Alternate", "DeviceRGB");
        let profile_ref = self.writer.emit_stream_data(
            dictionary,
            SRGB_ICC_PROFILE.clone(),
            PdfStreamCompression::Yes,
        );
        self.caches.icc_profile_ref = Some(profile_ref);
        let mut array = PdfArray::new();
        array.append_name("ICCBased");
        array.append_ref(profile_ref);
        let reference = self.writer.emit_array(&array);
        self.caches.color_space_ref = Some(reference);
        reference
    }

    /// The transform applied at the top of the current page's content stream.
    pub fn current_page_transform(&self, page_height_points: f32) -> Matrix {
        let mut transform =
            Matrix::make_scale(self.inverse_raster_scale, -self.inverse_raster_scale);
        transform.set_translate_y(self.inverse_raster_scale * page_height_points);
        transform
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum State {
    BetweenPages,
    InPage,
    Closed,
}

/// A PDF document under construction. Pages are begun and ended in order; `close`
/// finalizes the byte stream, after which the document is immutable.
pub struct PdfDocument {
    pub(crate) core: DocumentCore,
    state: State,
    pages: Vec<PdfDictionary>,
    page_refs: Vec<ObjectRef>,
    document_uuid: Uuid,
    info_dictionary: Option<ObjectRef>,
    document_xmp: Option<ObjectRef>,
    pub(crate) draw_context: Option<PdfExportContext>,
}

impl PdfDocument {
    /// Creates a document writing into `stream`. The rasterizer, when provided,
    /// backs layer filters and filtered images; without it those draws fall back to
    /// unfiltered output.
    pub fn new(
        stream: Box<dyn WriteStream>, mut metadata: PdfMetadata,
        rasterizer: Option<Arc<dyn Rasterizer>>,
    ) -> PdfDocument {
        if metadata.raster_dpi <= 0.0 {
            metadata.raster_dpi = DEFAULT_RASTER_DPI;
        }
        metadata.encoding_quality = metadata.encoding_quality.max(0);
        let (raster_scale, inverse_raster_scale) = if metadata.raster_dpi != DEFAULT_RASTER_DPI {
            (metadata.raster_dpi / DEFAULT_RASTER_DPI, DEFAULT_RASTER_DPI / metadata.raster_dpi)
        } else {
            (1.0, 1.0)
        };
        let mut tag_tree = PdfTagTree::new();
        if let Some(root) = metadata.structure_element_tree_root.take() {
            tag_tree.init(root, metadata.outline);
        }
        let compression_level = metadata.compression_level;
        PdfDocument {
            core: DocumentCore {
                writer: PdfWriter::new(stream, compression_level),
                caches: DocumentCaches::new(),
                metadata,
                rasterizer,
                tag_tree,
                raster_scale,
                inverse_raster_scale,
                current_page_index: 0,
            },
            state: State::BetweenPages,
            pages: Vec::new(),
            page_refs: Vec::new(),
            document_uuid: Uuid::default(),
            info_dictionary: None,
            document_xmp: None,
            draw_context: None,
        }
    }

    /// Starts a new page. Closes the previous page first if one is still open.
    /// The optional `content_rect` clips and translates the page content.
    pub fn begin_page(
        &mut self, page_width: f32, page_height: f32, content_rect: Option<Rect>,
    ) -> Result<(), ExportError> {
        if self.state == State::Closed {
            return Err(ExportError::DocumentClosed);
        }
        if page_width <= 0.0 || page_height <= 0.0 {
            return Err(ExportError::InvalidPageSize);
        }
        if self.state == State::InPage {
            self.end_page();
        }
        if self.pages.is_empty() {
            self.serialize_header();
        }
        // Scale the page so raster fallbacks happen at the configured DPI rather
        // than 72.
        let page_size = ISize::new(
            (page_width * self.core.raster_scale).round() as i32,
            (page_height * self.core.raster_scale).round() as i32,
        );
        let initial_transform =
            self.core.current_page_transform(page_size.height as f32);
        let content_rect = match content_rect {
            Some(mut rect) => {
                if !rect.intersect(&Rect::from_wh(page_width, page_height)) {
                    warn!("content rect does not intersect the page; ignoring");
                    None
                } else {
                    Some(rect)
                }
            }
            None => None,
        };
        self.core.current_page_index = self.pages.len();
        self.draw_context =
            Some(PdfExportContext::new(page_size, initial_transform, content_rect));
        self.page_refs.push(self.core.writer.reserve_ref());
        self.state = State::InPage;
        Ok(())
    }

    /// Finishes the current page, emitting its content stream and page dictionary.
    pub fn end_page(&mut self) {
        if self.state != State::InPage {
            return;
        }
        let mut context = self.draw_context.take().unwrap();
        let mut page = PdfDictionary::of_type("Page");
        let media_width =
            context.page_size().width as f32 * self.core.inverse_raster_scale;
        let media_height =
            context.page_size().height as f32 * self.core.inverse_raster_scale;
        let page_content = context.take_content();
        let mut resources = context.make_resource_dictionary();
        let color_space_ref = self.core.color_space_ref();
        let mut color_spaces = PdfDictionary::new();
        color_spaces.insert_ref("CS", color_space_ref);
        resources.insert_object("ColorSpace", color_spaces);
        page.insert_object("Resources", resources);
        page.insert_object("MediaBox", rect_to_array(&Rect::from_wh(media_width, media_height)));
        let content_ref = self.core.writer.emit_stream_data(
            PdfDictionary::new(),
            page_content,
            PdfStreamCompression::Yes,
        );
        page.insert_ref("Contents", content_ref);
        // The StructParents key for each page is its 0-based index.
        page.insert_usize("StructParents", self.pages.len());
        self.pages.push(page);
        self.state = State::BetweenPages;
    }

    /// Writes the page tree, catalog, fonts, xref table and trailer, and closes the
    /// document. Further calls are no-ops.
    pub fn close(&mut self) {
        loop {
            match self.state {
                State::BetweenPages => {
                    self.on_close();
                    self.state = State::Closed;
                    return;
                }
                State::InPage => self.end_page(),
                State::Closed => return,
            }
        }
    }

    /// Discards the in-progress content and closes the document without a footer.
    pub fn abort(&mut self) {
        if self.state != State::Closed {
            self.draw_context = None;
            self.state = State::Closed;
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_ref(&self, index: usize) -> ObjectRef {
        self.page_refs[index]
    }

    fn serialize_header(&mut self) {
        let writer = &mut self.core.writer;
        writer.offset_map.mark_start_of_document(writer.stream.as_ref());
        writer.stream.write_text("%PDF-1.4\n%");
        // Four high-bit bytes mark the file as binary for downstream tooling.
        const BINARY_MARK: [u8; 4] = [b'G' | 0x80, b'R' | 0x80, b'V' | 0x80, b'R' | 0x80];
        writer.stream.write(&BINARY_MARK);
        writer.stream.write_text("\n");

        let info = make_document_information_dict(&self.core.metadata);
        self.info_dictionary = Some(self.core.writer.emit_dictionary(&info));
        self.core.color_space_ref();
        if self.core.metadata.pdf_a {
            self.document_uuid = xmp::create_uuid(&self.core.metadata);
            // Document ID and instance ID match: this is the first revision.
            let xmp_ref = xmp::make_xmp_object(
                &self.core.metadata,
                &self.document_uuid,
                &self.document_uuid,
                &mut self.core.writer,
            );
            self.document_xmp = Some(xmp_ref);
        }
    }

    fn on_close(&mut self) {
        if self.pages.is_empty() {
            // A page-less document still gets a syntactically complete skeleton.
            self.serialize_header();
            let mut pages = PdfDictionary::of_type("Pages");
            pages.insert_int("Count", 0);
            pages.insert_object("Kids", PdfArray::new());
            let pages_ref = self.core.writer.emit_dictionary(&pages);
            let mut catalog = PdfDictionary::of_type("Catalog");
            catalog.insert_ref("Pages", pages_ref);
            let catalog_ref = self.core.writer.emit_dictionary(&catalog);
            self.serialize_footer(catalog_ref);
            return;
        }
        let mut catalog = PdfDictionary::of_type("Catalog");
        if self.core.metadata.pdf_a {
            if let Some(xmp_ref) = self.document_xmp {
                catalog.insert_ref("Metadata", xmp_ref);
            }
            self.core.color_space_ref();
            let profile_ref = self.core.caches.icc_profile_ref.unwrap();
            catalog.insert_object("OutputIntents", make_srgb_output_intents(profile_ref));
        }
        let pages = std::mem::take(&mut self.pages);
        let page_tree = generate_page_tree(&mut self.core.writer, pages, &self.page_refs);
        catalog.insert_ref("Pages", page_tree);

        // Tagged PDF: structure tree, mark info, optional outline.
        if let Some(struct_root) =
            self.core.tag_tree.make_struct_tree_root(&mut self.core.writer, &self.page_refs)
        {
            let mut mark_info = PdfDictionary::of_type("MarkInfo");
            mark_info.insert_bool("Marked", true);
            catalog.insert_object("MarkInfo", mark_info);
            catalog.insert_ref("StructTreeRoot", struct_root);
            if let Some(outline) =
                self.core.tag_tree.make_outline(&mut self.core.writer, &self.page_refs)
            {
                catalog.insert_ref("Outlines", outline);
            }
        }

        // Accessibility checks require DisplayDocTitle when a title exists.
        if !self.core.metadata.title.is_empty() {
            let mut viewer_preferences = PdfDictionary::of_type("ViewerPreferences");
            viewer_preferences.insert_bool("DisplayDocTitle", true);
            catalog.insert_object("ViewerPreferences", viewer_preferences);
        }
        let mut lang = self.core.metadata.lang.clone();
        if lang.is_empty() {
            lang = self.core.tag_tree.root_language();
        }
        if !lang.is_empty() {
            catalog.insert_text_string("Lang", lang);
        }
        let catalog_ref = self.core.writer.emit_dictionary(&catalog);

        let fonts = std::mem::take(&mut self.core.caches.fonts);
        fonts.emit_subsets(&mut self.core.writer);

        self.serialize_footer(catalog_ref);
    }

    fn serialize_footer(&mut self, catalog_ref: ObjectRef) {
        let writer = &mut self.core.writer;
        let xref_offset = writer.offset_map.emit_cross_reference_table(writer.stream.as_mut());
        let mut trailer = PdfDictionary::new();
        trailer.insert_usize("Size", writer.offset_map.object_count());
        trailer.insert_ref("Root", catalog_ref);
        if let Some(info) = self.info_dictionary {
            trailer.insert_ref("Info", info);
        }
        if !self.document_uuid.is_zero() {
            trailer.insert(
                "ID",
                PdfValue::Object(Box::new(xmp::make_pdf_id(
                    &self.document_uuid,
                    &self.document_uuid,
                ))),
            );
        }
        writer.stream.write_text("trailer\n");
        trailer.emit(writer.stream.as_mut());
        writer.stream.write_text("\nstartxref\n");
        writer.stream.write_text(&xref_offset.to_string());
        writer.stream.write_text("\n%%EOF\n");
        writer.stream.flush();
    }
}

impl Drop for PdfDocument {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builds the page tree bottom-up with a fan-out of 8, skipping internal nodes that
/// would hold a single child.
fn generate_page_tree(
    writer: &mut PdfWriter, pages: Vec<PdfDictionary>, page_refs: &[ObjectRef],
) -> ObjectRef {
    debug_assert!(!pages.is_empty());
    debug_assert_eq!(pages.len(), page_refs.len());
    const MAX_NODE_SIZE: usize = 8;

    struct PageTreeNode {
        node: PdfDictionary,
        reserved_ref: ObjectRef,
        page_descendants: i32,
    }

    fn build_layer(writer: &mut PdfWriter, nodes: Vec<PageTreeNode>) -> Vec<PageTreeNode> {
        let n = nodes.len();
        debug_assert!(n >= 1);
        let result_len = (n - 1) / MAX_NODE_SIZE + 1;
        let mut result = Vec::with_capacity(result_len);
        let mut nodes = nodes.into_iter();
        let mut remaining = n;
        for _ in 0..result_len {
            if n != 1 && remaining == 1 {
                // A lone trailing node needs no new parent.
                result.push(nodes.next().unwrap());
                remaining -= 1;
                continue;
            }
            let parent = writer.reserve_ref();
            let mut kids = PdfArray::new();
            let mut descendants = 0;
            for _ in 0..MAX_NODE_SIZE {
                let Some(mut node) = nodes.next() else {
                    break;
                };
                remaining -= 1;
                node.node.insert_ref("Parent", parent);
                kids.append_ref(
                    writer.emit_dictionary_with_ref(&node.node, node.reserved_ref),
                );
                descendants += node.page_descendants;
            }
            let mut next = PdfDictionary::of_type("Pages");
            next.insert_int("Count", descendants);
            next.insert_object("Kids", kids);
            result.push(PageTreeNode {
                node: next,
                reserved_ref: parent,
                page_descendants: descendants,
            });
        }
        result
    }

    let mut layer: Vec<PageTreeNode> = pages
        .into_iter()
        .zip(page_refs)
        .map(|(node, reference)| PageTreeNode {
            node,
            reserved_ref: *reference,
            page_descendants: 1,
        })
        .collect();
    layer = build_layer(writer, layer);
    while layer.len() > 1 {
        layer = build_layer(writer, layer);
    }
    let root = layer.pop().unwrap();
    writer.emit_dictionary_with_ref(&root.node, root.reserved_ref)
}
