//! The per-page draw context: translates draw calls into PDF content-stream
//! operators, routing through Form XObjects and soft masks when a blend mode needs
//! the existing page content as its destination.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;

use crate::core::{
    BlendMode, ColorType, Fill, GlyphRun, Image, LayerFilter, MCState, MaskFilter, Path,
    PathFillType, Picture, Pixmap, RasterImage, Shader,
};
use crate::geom::{Color, ISize, Matrix, Point, RRect, Rect, Stroke};
use crate::pdf::bitmap::serialize_image;
use crate::pdf::document::DocumentCore;
use crate::pdf::form_xobject::make_form_xobject;
use crate::pdf::gradient::{make_gradient_shader, GradientKey};
use crate::pdf::graphic_stack::{GraphicStackState, StackEntry};
use crate::pdf::graphic_state::{
    graphic_state_for_fill, no_smask_graphic_state, smask_graphic_state, SMaskMode,
};
use crate::pdf::object::{ObjectRef, PdfDictionary};
use crate::pdf::resources::{make_resource_dictionary, write_resource_name, ResourceType};
use crate::pdf::utils::{
    append_float, append_rectangle, append_transform, apply_graphic_state, blend_mode_name,
    emit_path, paint_path, populate_tiling_pattern_dict, rect_to_array,
};
use crate::stream::{MemoryWriteStream, WriteStream};

/// Which stream the active graphic stack writes into.
#[derive(Clone, Copy, PartialEq, Eq)]
enum StreamTarget {
    Content,
    Buffer,
}

/// The in-page state of one exported page.
pub struct PdfExportContext {
    page_size: ISize,
    initial_transform: Matrix,
    content_rect: Option<Rect>,
    content: MemoryWriteStream,
    content_buffer: MemoryWriteStream,
    active_stack: Option<GraphicStackState>,
    active_target: StreamTarget,
    needs_extra_save: bool,
    active_node_id: Option<i32>,
    graphic_state_resources: BTreeSet<ObjectRef>,
    shader_resources: BTreeSet<ObjectRef>,
    xobject_resources: BTreeSet<ObjectRef>,
    font_resources: BTreeSet<ObjectRef>,
}

impl PdfExportContext {
    pub fn new(
        page_size: ISize, initial_transform: Matrix, content_rect: Option<Rect>,
    ) -> PdfExportContext {
        debug_assert!(!page_size.is_empty());
        PdfExportContext {
            page_size,
            initial_transform,
            content_rect,
            content: MemoryWriteStream::new(),
            content_buffer: MemoryWriteStream::new(),
            active_stack: None,
            active_target: StreamTarget::Content,
            needs_extra_save: false,
            active_node_id: None,
            graphic_state_resources: BTreeSet::new(),
            shader_resources: BTreeSet::new(),
            xobject_resources: BTreeSet::new(),
            font_resources: BTreeSet::new(),
        }
    }

    pub fn page_size(&self) -> ISize {
        self.page_size
    }

    pub fn initial_transform(&self) -> &Matrix {
        &self.initial_transform
    }

    fn is_content_empty(&self) -> bool {
        self.content.bytes_written() == 0 && self.content_buffer.bytes_written() == 0
    }

    fn target_stream(&mut self, target: StreamTarget) -> &mut MemoryWriteStream {
        match target {
            StreamTarget::Content => &mut self.content,
            StreamTarget::Buffer => &mut self.content_buffer,
        }
    }

    fn active_stream(&mut self) -> &mut MemoryWriteStream {
        self.target_stream(self.active_target)
    }

    /// Finishes the page's content stream: the initial transform, the optional
    /// content-rect clip, and the accumulated operators.
    pub fn take_content(&mut self) -> Vec<u8> {
        if let Some(mut stack) = self.active_stack.take() {
            let target = self.active_target;
            stack.drain_stack(self.target_stream(target));
        }
        if self.content.bytes_written() == 0 {
            return Vec::new();
        }
        let mut buffer = MemoryWriteStream::new();
        if !self.initial_transform.is_identity() {
            append_transform(&self.initial_transform, &mut buffer);
        }
        if let Some(rect) = self.content_rect {
            append_rectangle(&rect, &mut buffer);
            buffer.write_text("W n\n");
            append_transform(&Matrix::make_trans(rect.left, rect.top), &mut buffer);
        }
        if self.needs_extra_save {
            buffer.write_text("q\n");
        }
        self.content.write_to_and_reset(&mut buffer);
        if self.needs_extra_save {
            buffer.write_text("Q\n");
        }
        self.needs_extra_save = false;
        buffer.read_data()
    }

    /// The `/Resources` dictionary for everything this page referenced.
    pub fn make_resource_dictionary(&self) -> PdfDictionary {
        let collect = |set: &BTreeSet<ObjectRef>| set.iter().copied().collect::<Vec<_>>();
        make_resource_dictionary(
            &collect(&self.graphic_state_resources),
            &collect(&self.shader_resources),
            &collect(&self.xobject_resources),
            &collect(&self.font_resources),
        )
    }

    fn add_graphic_state_resource(&mut self, reference: ObjectRef) -> i32 {
        self.graphic_state_resources.insert(reference);
        reference.get()
    }

    fn add_shader_resource(&mut self, reference: ObjectRef) -> i32 {
        self.shader_resources.insert(reference);
        reference.get()
    }

    fn add_xobject_resource(&mut self, reference: ObjectRef) -> i32 {
        self.xobject_resources.insert(reference);
        reference.get()
    }

    fn add_font_resource(&mut self, reference: ObjectRef) -> i32 {
        self.font_resources.insert(reference);
        reference.get()
    }

    /// Selects which structure node subsequent draws mark content for.
    pub fn set_active_structure_node(&mut self, node_id: Option<i32>) {
        self.active_node_id = node_id;
    }
}

/// A live content entry: everything `finish` needs to run the compositing protocol
/// for non-normal blend modes.
struct ContentEntry {
    blend_mode: BlendMode,
    destination: Option<ObjectRef>,
    shape: Option<Path>,
    mark_opened: bool,
}

enum BlendFastPath {
    Normal,
    SrcOver,
    SkipDrawing,
}

fn just_solid_color(fill: &Fill) -> bool {
    fill.is_opaque() && fill.color_filter.is_none() && fill.shader.is_none()
}

fn check_fast_path(fill: &Fill, dst_is_opaque: bool) -> BlendFastPath {
    match fill.blend_mode {
        BlendMode::SrcOver => BlendFastPath::SrcOver,
        BlendMode::Src if just_solid_color(fill) => BlendFastPath::SrcOver,
        BlendMode::Dst => BlendFastPath::SkipDrawing,
        BlendMode::DstOver if dst_is_opaque => BlendFastPath::SkipDrawing,
        BlendMode::SrcIn if dst_is_opaque && just_solid_color(fill) => BlendFastPath::SrcOver,
        BlendMode::DstIn if just_solid_color(fill) => BlendFastPath::SkipDrawing,
        _ => BlendFastPath::Normal,
    }
}

/// Normalizes a fill: fold reducible blend modes to SrcOver and merge color filters
/// into the shader.
fn clean_fill(source: &Fill) -> Fill {
    let mut fill = source.clone();
    if fill.blend_mode != BlendMode::SrcOver {
        if let BlendFastPath::SrcOver = check_fast_path(&fill, false) {
            fill.blend_mode = BlendMode::SrcOver;
        }
    }
    if let Some(filter) = fill.color_filter.take() {
        match fill.shader.take() {
            Some(shader) => fill.shader = Some(shader.with_color_filter(filter)),
            None => fill.color = filter.apply(fill.color),
        }
    }
    fill
}

fn treat_as_regular_pdf_blend_mode(mode: BlendMode) -> bool {
    blend_mode_name(mode).is_some()
}

/// A page being drawn: the export context plus the document-wide state its draws
/// need. Implements [`DrawContext`](crate::core::DrawContext).
pub struct PageCanvas<'a> {
    pub(crate) context: &'a mut PdfExportContext,
    pub(crate) core: &'a mut DocumentCore,
}

impl<'a> PageCanvas<'a> {
    pub(crate) fn new(
        context: &'a mut PdfExportContext, core: &'a mut DocumentCore,
    ) -> PageCanvas<'a> {
        PageCanvas { context, core }
    }

    /// Marks subsequent draws as content of the given structure node.
    pub fn set_structure_node(&mut self, node_id: Option<i32>) {
        self.context.set_active_structure_node(node_id);
    }

    // --- content entry protocol -------------------------------------------------

    /// Prepares the content stream for one draw. Returns None when the draw reduces
    /// to nothing.
    fn setup_content_entry(
        &mut self, state: &MCState, matrix: &Matrix, fill: &Fill, text_scale: f32,
    ) -> Option<ContentEntry> {
        let blend_mode = fill.blend_mode;
        if blend_mode == BlendMode::Dst {
            return None;
        }
        let mut destination = None;
        if !treat_as_regular_pdf_blend_mode(blend_mode) && blend_mode != BlendMode::DstOver {
            if !self.context.is_content_empty() {
                // The mode needs the current page content as its destination:
                // capture it into a Form XObject first.
                destination = Some(self.make_form_xobject_from_device(None, false));
                debug_assert!(self.context.is_content_empty());
            } else if blend_mode != BlendMode::Src && blend_mode != BlendMode::SrcOut {
                return None;
            }
        }

        if treat_as_regular_pdf_blend_mode(blend_mode) {
            if self.context.active_stack.is_none()
                || self.context.active_target != StreamTarget::Content
            {
                if let Some(mut stack) = self.context.active_stack.take() {
                    let target = self.context.active_target;
                    stack.drain_stack(self.context.target_stream(target));
                }
                if self.context.content.bytes_written() != 0 {
                    self.context.content.write_text("Q\nq\n");
                    self.context.needs_extra_save = true;
                }
                self.context.active_stack = Some(GraphicStackState::new());
                self.context.active_target = StreamTarget::Content;
            }
        } else {
            if let Some(mut stack) = self.context.active_stack.take() {
                let target = self.context.active_target;
                stack.drain_stack(self.context.target_stream(target));
            }
            self.context.active_stack = Some(GraphicStackState::new());
            self.context.active_target = StreamTarget::Buffer;
        }

        let entry = self.populate_graphic_state_entry(state, matrix, fill, text_scale);
        let mut stack = self.context.active_stack.take().unwrap();
        let target = self.context.active_target;
        {
            let stream = self.context.target_stream(target);
            stack.update_clip(state, stream);
            stack.update_matrix(&entry.matrix, stream);
            stack.update_drawing_state(&entry, stream);
        }
        self.context.active_stack = Some(stack);

        // Open a marked-content sequence when a structure node is active.
        let mut mark_opened = false;
        if let Some(node_id) = self.context.active_node_id {
            let page_index = self.core.current_page_index;
            let page_transform = self
                .core
                .current_page_transform(self.context.page_size.height as f32);
            let origin = page_transform.map_point(state.matrix.map_xy(0.0, 0.0));
            if let Some(mark_id) =
                self.core.tag_tree.create_mark_for_node(node_id, page_index, origin)
            {
                let stream = self.context.active_stream();
                stream.write_text("/P <</MCID ");
                stream.write_text(&mark_id.to_string());
                stream.write_text(" >> BDC\n");
                mark_opened = true;
            }
        }

        Some(ContentEntry { blend_mode, destination, shape: None, mark_opened })
    }

    fn finish_content_entry(&mut self, state: &MCState, mut entry: ContentEntry) {
        debug_assert!(entry.blend_mode != BlendMode::Dst);
        if entry.mark_opened {
            self.context.active_stream().write_text("EMC\n");
        }
        if treat_as_regular_pdf_blend_mode(entry.blend_mode) {
            debug_assert!(entry.destination.is_none());
            return;
        }
        if let Some(mut stack) = self.context.active_stack.take() {
            let target = self.context.active_target;
            stack.drain_stack(self.context.target_stream(target));
        }
        self.context.active_target = StreamTarget::Content;

        if entry.blend_mode == BlendMode::DstOver {
            debug_assert!(entry.destination.is_none());
            if self.context.content_buffer.bytes_written() != 0 {
                if self.context.content.bytes_written() != 0 {
                    self.context.content_buffer.write_text("Q\nq\n");
                    self.context.needs_extra_save = true;
                }
                let mut buffer = std::mem::take(&mut self.context.content_buffer);
                buffer.prepend_to_and_reset(&mut self.context.content);
                self.context.content_buffer = buffer;
                debug_assert_eq!(self.context.content_buffer.bytes_written(), 0);
            }
            return;
        }
        if self.context.content_buffer.bytes_written() != 0 {
            if self.context.content.bytes_written() != 0 {
                self.context.content.write_text("Q\nq\n");
                self.context.needs_extra_save = true;
            }
            let mut buffer = std::mem::take(&mut self.context.content_buffer);
            buffer.write_to_and_reset(&mut self.context.content);
            self.context.content_buffer = buffer;
        }
        let Some(destination) = entry.destination else {
            debug_assert!(matches!(entry.blend_mode, BlendMode::Src | BlendMode::SrcOut));
            return;
        };

        let mut blend_mode = entry.blend_mode;
        let stock_fill = Fill::default();
        let src_form_xobject = if self.context.is_content_empty() {
            // An empty source with most of these modes still needs dst restored; with
            // a shape, Src-family modes reduce to Clear.
            if entry.shape.is_none()
                || blend_mode == BlendMode::DstOut
                || blend_mode == BlendMode::SrcATop
            {
                if let Some(inner) =
                    self.setup_content_entry(&MCState::new(), &Matrix::identity(), &stock_fill,
                        0.0)
                {
                    self.draw_form_xobject(destination);
                    self.finish_content_entry(&MCState::new(), inner);
                }
                return;
            }
            blend_mode = BlendMode::Clear;
            None
        } else {
            Some(self.make_form_xobject_from_device(None, false))
        };

        let (xobject, smask) = if blend_mode == BlendMode::SrcATop {
            (src_form_xobject, Some(destination))
        } else if let Some(shape) = entry.shape.take() {
            // Draw the shape into a form xobject to use as the mask.
            let mut shape_fill = Fill::default();
            shape_fill.color = Color::BLACK;
            let mut shape_context = PdfExportContext::new(
                self.context.page_size,
                self.context.initial_transform,
                None,
            );
            {
                let mut shape_canvas = PageCanvas::new(&mut shape_context, self.core);
                shape_canvas.on_draw_path(state, &shape, &shape_fill, None);
            }
            let content = shape_context.take_content();
            let resources = shape_context.make_resource_dictionary();
            let reference = make_form_xobject(
                &mut self.core.writer,
                content,
                rect_to_array(&Rect::from_size(self.context.page_size)),
                resources,
                &inverse_or_identity(&self.context.initial_transform),
                None,
            );
            (Some(destination), Some(reference))
        } else {
            (Some(destination), src_form_xobject)
        };

        if let (Some(xobject), Some(smask)) = (xobject, smask) {
            self.draw_form_xobject_with_mask(xobject, smask, BlendMode::SrcOver, true);
        }
        match blend_mode {
            BlendMode::Clear => return,
            BlendMode::Src | BlendMode::DstATop => {
                if let Some(source) = src_form_xobject {
                    if let Some(inner) = self.setup_content_entry(
                        &MCState::new(),
                        &Matrix::identity(),
                        &stock_fill,
                        0.0,
                    ) {
                        self.draw_form_xobject(source);
                        self.finish_content_entry(&MCState::new(), inner);
                    }
                }
                if blend_mode == BlendMode::Src {
                    return;
                }
            }
            BlendMode::SrcATop => {
                if let Some(inner) = self.setup_content_entry(
                    &MCState::new(),
                    &Matrix::identity(),
                    &stock_fill,
                    0.0,
                ) {
                    self.draw_form_xobject(destination);
                    self.finish_content_entry(&MCState::new(), inner);
                }
            }
            _ => {}
        }

        match blend_mode {
            BlendMode::SrcIn | BlendMode::SrcOut | BlendMode::SrcATop => {
                if let Some(source) = src_form_xobject {
                    self.draw_form_xobject_with_mask(
                        source,
                        destination,
                        BlendMode::SrcOver,
                        blend_mode == BlendMode::SrcOut,
                    );
                }
            }
            BlendMode::DstIn | BlendMode::DstOut | BlendMode::DstATop | BlendMode::Modulate => {
                let mut mode = BlendMode::SrcOver;
                if blend_mode == BlendMode::Modulate {
                    if let Some(source) = src_form_xobject {
                        self.draw_form_xobject_with_mask(
                            source,
                            destination,
                            BlendMode::SrcOver,
                            false,
                        );
                    }
                    mode = BlendMode::Multiply;
                }
                if let Some(source) = src_form_xobject {
                    self.draw_form_xobject_with_mask(
                        destination,
                        source,
                        mode,
                        blend_mode == BlendMode::DstOut,
                    );
                }
            }
            _ => {}
        }
    }

    /// Captures the context's current content into a Form XObject and resets it.
    fn make_form_xobject_from_device(
        &mut self, bounds: Option<Rect>, alpha: bool,
    ) -> ObjectRef {
        let bounds =
            bounds.unwrap_or_else(|| Rect::from_size(self.context.page_size));
        let inverse = inverse_or_identity(&self.context.initial_transform);
        let color_space = alpha.then_some("DeviceGray");
        let content = self.context.take_content();
        let resources = self.context.make_resource_dictionary();
        make_form_xobject(
            &mut self.core.writer,
            content,
            rect_to_array(&bounds),
            resources,
            &inverse,
            color_space,
        )
    }

    fn draw_form_xobject(&mut self, xobject: ObjectRef) {
        let index = self.context.add_xobject_resource(xobject);
        let stream = self.context.active_stream();
        write_resource_name(stream, ResourceType::XObject, index);
        stream.write_text(" Do\n");
    }

    fn set_graphic_state(&mut self, graphic_state: ObjectRef) {
        let index = self.context.add_graphic_state_resource(graphic_state);
        apply_graphic_state(index, self.context.active_stream());
    }

    fn clear_mask_on_graphic_state(&mut self) {
        let reference = no_smask_graphic_state(self.core);
        self.set_graphic_state(reference);
    }

    fn draw_form_xobject_with_mask(
        &mut self, xobject: ObjectRef, smask: ObjectRef, mode: BlendMode, invert_clip: bool,
    ) {
        let mut fill = Fill::default();
        fill.blend_mode = mode;
        let Some(entry) =
            self.setup_content_entry(&MCState::new(), &Matrix::identity(), &fill, 0.0)
        else {
            return;
        };
        let graphic_state =
            smask_graphic_state(self.core, smask, invert_clip, SMaskMode::Alpha);
        self.set_graphic_state(graphic_state);
        self.draw_form_xobject(xobject);
        self.clear_mask_on_graphic_state();
        self.finish_content_entry(&MCState::new(), entry);
    }

    // --- fill -> graphic state --------------------------------------------------

    fn populate_graphic_state_entry(
        &mut self, state: &MCState, matrix: &Matrix, fill: &Fill, text_scale: f32,
    ) -> StackEntry {
        let mut entry = StackEntry::default();
        entry.matrix = Matrix::concat(&state.matrix, matrix);
        entry.color = Some(fill.color.with_alpha(1.0));
        entry.shader_index = -1;
        entry.text_scale_x = text_scale;

        if let Some(shader) = &fill.shader {
            if let Some(color) = shader.as_color() {
                entry.color = Some(color.with_alpha(1.0));
            } else {
                // Patterns are positioned relative to the initial transform, so the
                // draw transform folds into the shader's matrix.
                let mut transform = entry.matrix;
                transform.post_concat(&self.context.initial_transform);
                // Clamp is simulated with a pattern sized to the clip.
                let mut clip_bounds = Rect::from_size(self.context.page_size);
                clip_bounds = self.context.initial_transform.map_rect(&clip_bounds);
                clip_bounds.round_out();
                if let Some(shader_ref) =
                    self.pdf_shader(shader, transform, clip_bounds)
                {
                    entry.shader_index = self.context.add_shader_resource(shader_ref);
                }
            }
        }
        let graphic_state = graphic_state_for_fill(self.core, fill);
        entry.graphic_state_index = self.context.add_graphic_state_resource(graphic_state);
        entry
    }

    fn pdf_shader(
        &mut self, shader: &Shader, transform: Matrix, bbox: Rect,
    ) -> Option<ObjectRef> {
        match shader {
            Shader::Color(_) => None,
            Shader::Matrix { source, matrix } => {
                let mut combined = transform;
                combined.pre_concat(matrix);
                self.pdf_shader(source, combined, bbox)
            }
            Shader::ColorFilter { source, .. } => {
                // The filter would need a raster pass; emit the unfiltered source.
                debug!("color-filtered shader flattened to its source");
                self.pdf_shader(source, transform, bbox)
            }
            Shader::Gradient(gradient_type, info) => make_gradient_shader(
                self.core,
                GradientKey {
                    gradient_type: *gradient_type,
                    info: info.clone(),
                    canvas_transform: transform,
                    bbox,
                },
            ),
            Shader::Image { image, tile_x, .. } => {
                self.make_image_shader(image, *tile_x, transform, bbox)
            }
        }
    }

    /// An image shader as a tiling pattern: the image drawn once per cell. Clamp is
    /// approximated by a cell the size of the clip.
    fn make_image_shader(
        &mut self, image: &Arc<dyn Image>, tile_x: crate::core::TileMode, transform: Matrix,
        bbox: Rect,
    ) -> Option<ObjectRef> {
        let quality = self.core.metadata.encoding_quality;
        let image_ref = serialize_image(self.core, image, quality)?;
        let width = image.width() as f32;
        let height = image.height() as f32;
        // Image space is the unit square, y-up: scale and flip to pixel coordinates.
        let mut image_matrix = Matrix::make_scale(width, -height);
        image_matrix.post_translate(0.0, height);
        let mut cell = MemoryWriteStream::new();
        append_transform(&image_matrix, &mut cell);
        write_resource_name(&mut cell, ResourceType::XObject, image_ref.get());
        cell.write_text(" Do\n");

        let tile_bounds = match tile_x {
            crate::core::TileMode::Repeat | crate::core::TileMode::Mirror => {
                Rect::from_wh(width, height)
            }
            crate::core::TileMode::Clamp | crate::core::TileMode::Decal => {
                crate::pdf::utils::inverse_transform_bbox(&transform, &bbox)
                    .unwrap_or_else(|| Rect::from_wh(width, height))
            }
        };
        let mut resources = PdfDictionary::new();
        let mut xobjects = PdfDictionary::new();
        xobjects.insert_ref_owned(
            crate::pdf::resources::resource_name(ResourceType::XObject, image_ref.get()),
            image_ref,
        );
        resources.insert_object("XObject", xobjects);
        let mut pattern = PdfDictionary::new();
        populate_tiling_pattern_dict(&mut pattern, &tile_bounds, resources, &transform);
        Some(self.core.writer.emit_stream_data(
            pattern,
            cell.read_data(),
            crate::pdf::document::PdfStreamCompression::Yes,
        ))
    }

    // --- geometry draws ---------------------------------------------------------

    pub(crate) fn on_draw_path(
        &mut self, state: &MCState, path: &Path, fill: &Fill, stroke: Option<&Stroke>,
    ) {
        if fill.mask_filter.is_some() {
            self.draw_path_with_filter(state, path, &Matrix::identity(), fill);
            return;
        }
        let fill = clean_fill(fill);
        let Some(entry) = self.setup_content_entry(state, &Matrix::identity(), &fill, 0.0)
        else {
            return;
        };
        {
            let stream = self.context.active_stream();
            if let Some(stroke) = stroke {
                append_float(stroke.width.max(0.0), stream);
                stream.write_text(" w\n");
                let join = match stroke.join {
                    crate::geom::LineJoin::Miter => 0,
                    crate::geom::LineJoin::Round => 1,
                    crate::geom::LineJoin::Bevel => 2,
                };
                stream.write_text(&format!("{join} j\n"));
                emit_path(path, false, stream);
                stream.write_text("S\n");
            } else {
                emit_path(path, false, stream);
                paint_path(path.fill_type(), stream);
            }
        }
        self.finish_content_entry(state, entry);
    }

    fn on_draw_image_rect(
        &mut self, image: Arc<dyn Image>, dst: &Rect, state: &MCState, fill: &Fill,
    ) {
        let bounds = Rect::from_wh(image.width() as f32, image.height() as f32);
        if bounds.is_empty() {
            return;
        }
        let scale_x = dst.width() / bounds.width();
        let scale_y = dst.height() / bounds.height();
        let mut transform = Matrix::make_scale(scale_x, scale_y);
        transform.post_translate(dst.left, dst.top);

        let mut fill = clean_fill(fill);

        if image.is_alpha_only() {
            // Vector content cannot be masked by an Image XObject; build a Form
            // XObject holding the mask and use it as a luminosity soft mask over a
            // paint-filled rectangle.
            let mask_size = ISize::new(image.width(), image.height());
            let mut mask_context =
                PdfExportContext::new(mask_size, Matrix::identity(), None);
            {
                let mut mask_canvas = PageCanvas::new(&mut mask_context, self.core);
                let mask_fill = Fill::default();
                let mask_state = MCState::with_matrix(transform);
                mask_canvas.draw_image_impl(&image, &bounds, &mask_state, &mask_fill);
            }
            let mask_bounds = Rect::from_size(mask_size);
            let content = mask_context.take_content();
            let resources = mask_context.make_resource_dictionary();
            let mask_xobject = make_form_xobject(
                &mut self.core.writer,
                content,
                rect_to_array(&mask_bounds),
                resources,
                &Matrix::identity(),
                Some("DeviceGray"),
            );
            let Some(entry) =
                self.setup_content_entry(state, &Matrix::identity(), &fill, 0.0)
            else {
                return;
            };
            let graphic_state =
                smask_graphic_state(self.core, mask_xobject, false, SMaskMode::Luminosity);
            self.set_graphic_state(graphic_state);
            {
                let page_rect = Rect::from_size(self.context.page_size);
                let stream = self.context.active_stream();
                append_rectangle(&page_rect, stream);
                paint_path(PathFillType::Winding, stream);
            }
            self.clear_mask_on_graphic_state();
            self.finish_content_entry(state, entry);
            return;
        }

        if let Some(mask) = fill.mask_filter.take() {
            // Keep the mask but paint with the image as a shader over the dst rect.
            let image_shader = Arc::new(Shader::Image {
                image: Arc::clone(&image),
                tile_x: crate::core::TileMode::Clamp,
                tile_y: crate::core::TileMode::Clamp,
            });
            fill.shader = Some(image_shader.with_matrix(transform));
            fill.mask_filter = Some(mask);
            let mut path = Path::new();
            path.add_rect(dst);
            self.on_draw_path(state, &path, &fill, None);
            return;
        }

        if let Some(filter) = fill.color_filter.take() {
            // Filtered images re-enter as plain image draws after a raster pass.
            if let Some(filtered) = apply_color_filter_to_image(&image, &filter) {
                self.draw_image_with_transform(filtered, &bounds, transform, state, &fill);
            } else {
                debug!("dropping color-filtered image; no pixel access");
            }
            return;
        }

        self.draw_image_with_transform(image, &bounds, transform, state, &fill);
    }

    fn draw_image_with_transform(
        &mut self, image: Arc<dyn Image>, bounds: &Rect, transform: Matrix, state: &MCState,
        fill: &Fill,
    ) {
        // Image space maps the unit square; scale up and flip the origin.
        let mut scaled = Matrix::make_scale(1.0, -1.0);
        scaled.post_translate(0.0, 1.0);
        scaled.post_scale(bounds.width(), bounds.height());
        scaled.post_concat(&transform);
        let Some(mut entry) = self.setup_content_entry(state, &scaled, fill, 0.0) else {
            return;
        };
        let mut shape = Path::new();
        shape.add_rect(bounds);
        shape.transform(&transform);
        if needs_shape(entry.blend_mode) {
            entry.shape = Some(shape);
        }
        if entry.blend_mode == BlendMode::Clear {
            self.finish_content_entry(state, entry);
            return;
        }
        let quality = self.core.metadata.encoding_quality;
        if let Some(image_ref) = serialize_image(self.core, &image, quality) {
            self.draw_form_xobject(image_ref);
        }
        self.finish_content_entry(state, entry);
    }

    /// Plain image draw used when composing masks; no blend-mode protocol.
    fn draw_image_impl(
        &mut self, image: &Arc<dyn Image>, bounds: &Rect, state: &MCState, fill: &Fill,
    ) {
        self.draw_image_with_transform(
            Arc::clone(image),
            bounds,
            Matrix::identity(),
            state,
            fill,
        );
    }

    // --- mask filters -----------------------------------------------------------

    fn draw_path_with_filter(
        &mut self, state: &MCState, original_path: &Path, matrix: &Matrix, original_fill: &Fill,
    ) {
        debug_assert!(original_fill.mask_filter.is_some());
        let mut path = original_path.clone();
        path.transform(matrix);
        let mask_bounds = path.bounds();
        let mut fill = clean_fill(original_fill);
        let Some(MaskFilter { shader }) = fill.mask_filter.take() else {
            return;
        };

        // Render the mask shader into a congruent device, then use it as a
        // luminosity soft mask for the path fill.
        let mut mask_context = PdfExportContext::new(
            self.context.page_size,
            self.context.initial_transform,
            None,
        );
        {
            let mut mask_canvas = PageCanvas::new(&mut mask_context, self.core);
            let mut mask_fill = Fill::default();
            mask_fill.shader = Some(Arc::clone(&shader));
            let mut mask_path = Path::new();
            mask_path.add_rect(&mask_bounds);
            mask_canvas.on_draw_path(&MCState::new(), &mask_path, &mask_fill, None);
        }
        let content = mask_context.take_content();
        let resources = mask_context.make_resource_dictionary();
        let mask_xobject = make_form_xobject(
            &mut self.core.writer,
            content,
            rect_to_array(&mask_bounds),
            resources,
            &inverse_or_identity(&self.context.initial_transform),
            Some("DeviceGray"),
        );

        if !state.matrix.is_identity() {
            if let Some(shader) = fill.shader.take() {
                fill.shader = Some(shader.with_matrix(*matrix));
            }
        }
        let Some(entry) = self.setup_content_entry(state, &Matrix::identity(), &fill, 0.0)
        else {
            return;
        };
        let graphic_state =
            smask_graphic_state(self.core, mask_xobject, false, SMaskMode::Luminosity);
        self.set_graphic_state(graphic_state);
        {
            let stream = self.context.active_stream();
            emit_path(&path, false, stream);
            paint_path(path.fill_type(), stream);
        }
        self.clear_mask_on_graphic_state();
        self.finish_content_entry(state, entry);
    }

    // --- glyph runs -------------------------------------------------------------

    fn export_glyph_run_as_text(&mut self, run: &GlyphRun, state: &MCState, fill: &Fill) {
        if run.glyphs.is_empty() {
            return;
        }
        let typeface = &run.font.typeface;
        let text_size = run.font.size;
        let units_per_em = f32::from(typeface.units_per_em());
        let advance_scale = text_size / units_per_em;
        let clip_bounds = if state.clip.is_empty() {
            Rect::from_size(self.context.page_size)
        } else {
            state.clip.bounds()
        };

        let mut fill = clean_fill(fill);
        fill.mask_filter = None;
        let Some(entry) = self.setup_content_entry(state, &Matrix::identity(), &fill, 0.0)
        else {
            return;
        };
        let glyph_count = typeface.glyph_count();
        {
            self.context.active_stream().write_text("BT\n");
        }
        let offset = run.positions.first().copied().unwrap_or_default();
        let mut positioner = GlyphPositioner::new(offset);
        let mut font_registered = false;
        for (index, &glyph) in run.glyphs.iter().enumerate() {
            let unicode = typeface.glyph_to_unicode(glyph);
            {
                let stream = self.context.active_stream();
                positioner.flush(stream);
                // Every glyph gets an ActualText span for extraction and
                // accessibility.
                stream.write_text("/Span<</ActualText ");
                let mut text = String::new();
                if let Some(character) = char::from_u32(unicode).filter(|c| *c != '\0') {
                    text.push(character);
                }
                crate::pdf::object::write_text_string(stream, text.as_bytes());
                stream.write_text(" >> BDC\n");
            }
            if glyph >= glyph_count {
                let stream = self.context.active_stream();
                positioner.flush(stream);
                stream.write_text("EMC\n");
                continue;
            }
            let position = run.positions[index];
            // Per-glyph bounds reject against the clip.
            if let Some(bounds) = typeface.glyph_bounds(glyph) {
                let mut device_bounds = bounds;
                device_bounds.scale(advance_scale, -advance_scale);
                device_bounds.offset(position.x + offset.x, position.y + offset.y);
                let device_bounds = state.matrix.map_rect(&device_bounds);
                if !device_bounds.is_empty()
                    && !Rect::intersects(&clip_bounds, &device_bounds)
                {
                    let stream = self.context.active_stream();
                    positioner.flush(stream);
                    stream.write_text("EMC\n");
                    continue;
                }
            }
            if !font_registered {
                let DocumentCore { writer, caches, .. } = &mut *self.core;
                let strike = caches.fonts.strike_for(writer, typeface);
                let font_index = self.context.add_font_resource(strike.font_ref);
                let stream = self.context.active_stream();
                positioner.flush(stream);
                write_resource_name(stream, ResourceType::Font, font_index);
                stream.write_text(" ");
                append_float(text_size, stream);
                stream.write_text(" Tf\n");
                font_registered = true;
            }
            let encoded = {
                let DocumentCore { writer, caches, .. } = &mut *self.core;
                let strike = caches.fonts.strike_for(writer, typeface);
                strike.note_glyph_usage(glyph);
                strike.glyph_to_font_encoding(glyph)
            };
            let advance = advance_scale * f32::from(typeface.advance(glyph));
            let stream = self.context.active_stream();
            positioner.write_glyph(encoded, advance, position, stream);
            positioner.flush(stream);
            stream.write_text("EMC\n");
        }
        {
            let stream = self.context.active_stream();
            positioner.flush(stream);
            stream.write_text("ET\n");
        }
        self.finish_content_entry(state, entry);
    }

    fn export_glyph_run_as_path(
        &mut self, run: &GlyphRun, state: &MCState, fill: &Fill, stroke: Option<&Stroke>,
    ) {
        let typeface = &run.font.typeface;
        let scale = run.font.size / f32::from(typeface.units_per_em());
        let mut path = Path::new();
        for (index, &glyph) in run.glyphs.iter().enumerate() {
            let Some(mut glyph_path) = typeface.glyph_path(glyph) else {
                continue;
            };
            // Font units are y-up; text space is y-down.
            let mut glyph_matrix = Matrix::make_scale(scale, -scale);
            glyph_matrix.post_translate(run.positions[index].x, run.positions[index].y);
            glyph_path.transform(&glyph_matrix);
            path.add_path(&glyph_path);
        }
        if path.is_empty() {
            return;
        }
        self.on_draw_path(state, &path, fill, stroke);
        // Also lay down invisible text for selection and extraction.
        let mut transparent = fill.clone();
        transparent.color = Color::TRANSPARENT;
        transparent.shader = None;
        transparent.mask_filter = None;
        self.export_glyph_run_as_text(run, state, &transparent);
    }

    fn export_glyph_run_as_image(&mut self, run: &GlyphRun, state: &MCState, fill: &Fill) {
        // Color glyph rendering needs a raster backend.
        let Some(rasterizer) = self.core.rasterizer.clone() else {
            debug!("dropping color glyph run; no rasterizer configured");
            return;
        };
        let mut recorder = crate::core::PictureRecorder::new();
        crate::core::DrawContext::draw_glyph_run(
            &mut recorder,
            run,
            &MCState::new(),
            fill,
            None,
        );
        let picture = recorder.finish();
        let bounds = picture.bounds();
        if bounds.is_empty() {
            return;
        }
        let Some(pixmap) = rasterizer.rasterize(&picture, &bounds, self.core.raster_scale)
        else {
            return;
        };
        let image: Arc<dyn Image> = RasterImage::new(pixmap);
        let dst = bounds;
        self.on_draw_image_rect(image, &dst, state, fill);
        let mut transparent = fill.clone();
        transparent.color = Color::TRANSPARENT;
        transparent.shader = None;
        self.export_glyph_run_as_text(run, state, &transparent);
    }

    fn on_draw_image_rect_entry(
        &mut self, image: Arc<dyn Image>, src: &Rect, dst: &Rect, state: &MCState, fill: &Fill,
    ) {
        // Subset the image when a source rect is given.
        let full = Rect::from_wh(image.width() as f32, image.height() as f32);
        if *src != full {
            if let Some(subset) = subset_image(&image, src) {
                self.on_draw_image_rect(subset, dst, state, fill);
                return;
            }
        }
        self.on_draw_image_rect(image, dst, state, fill);
    }

    // --- layer filters ----------------------------------------------------------

    fn rasterize_picture(&self, picture: &Picture, bounds: &Rect) -> Option<Pixmap> {
        let rasterizer = self.core.rasterizer.as_ref()?;
        rasterizer.rasterize(picture, bounds, self.core.raster_scale)
    }

    fn draw_layer_impl(
        &mut self, picture: &Arc<Picture>, filter: Option<&LayerFilter>, state: &MCState,
        fill: &Fill,
    ) {
        match filter {
            None => picture.playback(self),
            Some(LayerFilter::DropShadow { dx, dy, blur_x, blur_y, color, shadow_only }) => {
                self.draw_drop_shadow(picture, *dx, *dy, *blur_x, *blur_y, *color, state, fill);
                if !shadow_only {
                    picture.playback(self);
                }
            }
            Some(LayerFilter::InnerShadow { dx, dy, blur_x, blur_y, color }) => {
                picture.playback(self);
                self.draw_inner_shadow(picture, *dx, *dy, *blur_x, *blur_y, *color, state, fill);
            }
            Some(LayerFilter::Blur { blur_x, blur_y }) => {
                let bounds = picture.bounds().make_outset(blur_x * 3.0, blur_y * 3.0);
                let Some(mut pixmap) = self.rasterize_picture(picture, &bounds) else {
                    debug!("blur layer without rasterizer; drawing unfiltered");
                    picture.playback(self);
                    return;
                };
                blur_pixmap(&mut pixmap, *blur_x, *blur_y);
                let image: Arc<dyn Image> = RasterImage::new(pixmap);
                self.on_draw_image_rect(image, &bounds, state, fill);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_drop_shadow(
        &mut self, picture: &Arc<Picture>, dx: f32, dy: f32, blur_x: f32, blur_y: f32,
        color: Color, state: &MCState, fill: &Fill,
    ) {
        let bounds = picture.bounds().make_outset(blur_x * 3.0, blur_y * 3.0);
        let Some(pixmap) = self.rasterize_picture(picture, &bounds) else {
            debug!("drop shadow without rasterizer; skipping shadow");
            return;
        };
        let mut shadow = colorize_alpha(&pixmap, color);
        blur_pixmap(&mut shadow, blur_x, blur_y);
        let image: Arc<dyn Image> = RasterImage::new(shadow);
        let mut shadow_bounds = bounds;
        shadow_bounds.offset(dx, dy);
        self.on_draw_image_rect(image, &shadow_bounds, state, fill);
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_inner_shadow(
        &mut self, picture: &Arc<Picture>, dx: f32, dy: f32, blur_x: f32, blur_y: f32,
        color: Color, state: &MCState, fill: &Fill,
    ) {
        let bounds = picture.bounds();
        let Some(pixmap) = self.rasterize_picture(picture, &bounds) else {
            debug!("inner shadow without rasterizer; skipping shadow");
            return;
        };
        let mut inverted = invert_alpha(&pixmap);
        blur_pixmap(&mut inverted, blur_x, blur_y);
        shift_pixmap(&mut inverted, dx, dy);
        let shadow = mask_and_colorize(&inverted, &pixmap, color);
        let image: Arc<dyn Image> = RasterImage::new(shadow);
        self.on_draw_image_rect(image, &bounds, state, fill);
    }
}

fn needs_shape(mode: BlendMode) -> bool {
    matches!(
        mode,
        BlendMode::Clear
            | BlendMode::Src
            | BlendMode::SrcIn
            | BlendMode::SrcOut
            | BlendMode::DstIn
            | BlendMode::DstOut
            | BlendMode::SrcATop
            | BlendMode::DstATop
            | BlendMode::Modulate
    )
}

fn inverse_or_identity(matrix: &Matrix) -> Matrix {
    if matrix.is_identity() {
        return Matrix::identity();
    }
    matrix.invert().unwrap_or_else(|| {
        log::error!("initial transform should be invertible");
        Matrix::identity()
    })
}

impl crate::core::DrawContext for PageCanvas<'_> {
    fn draw_fill(&mut self, fill: &Fill) {
        let mut path = Path::new();
        path.add_rect(&Rect::from_size(self.context.page_size));
        self.on_draw_path(&MCState::new(), &path, fill, None);
    }

    fn draw_rect(&mut self, rect: &Rect, state: &MCState, fill: &Fill, stroke: Option<&Stroke>) {
        let mut path = Path::new();
        path.add_rect(rect);
        self.on_draw_path(state, &path, fill, stroke);
    }

    fn draw_rrect(
        &mut self, rrect: &RRect, state: &MCState, fill: &Fill, stroke: Option<&Stroke>,
    ) {
        let mut path = Path::new();
        path.add_rrect(rrect);
        self.on_draw_path(state, &path, fill, stroke);
    }

    fn draw_path(&mut self, path: &Path, state: &MCState, fill: &Fill) {
        self.on_draw_path(state, path, fill, None);
    }

    fn draw_image_rect(
        &mut self, image: Arc<dyn Image>, src: &Rect, dst: &Rect, state: &MCState, fill: &Fill,
    ) {
        self.on_draw_image_rect_entry(image, src, dst, state, fill);
    }

    fn draw_glyph_run(
        &mut self, run: &GlyphRun, state: &MCState, fill: &Fill, stroke: Option<&Stroke>,
    ) {
        if run.font.has_color() {
            self.export_glyph_run_as_image(run, state, fill);
        } else if fill.mask_filter.is_some() || stroke.is_some() {
            self.export_glyph_run_as_path(run, state, fill, stroke);
        } else {
            self.export_glyph_run_as_text(run, state, fill);
        }
    }

    fn draw_picture(&mut self, picture: &Arc<Picture>, _state: &MCState) {
        picture.playback(self);
    }

    fn draw_layer(
        &mut self, picture: &Arc<Picture>, filter: Option<&LayerFilter>, state: &MCState,
        fill: &Fill,
    ) {
        self.draw_layer_impl(picture, filter, state, fill);
    }
}

/// Emits `Tm`/`Td`/`Tj` sequences, merging consecutive glyphs whose pen positions
/// agree with the accumulated advances.
struct GlyphPositioner {
    current_matrix_origin: Point,
    x_advance: f32,
    in_text: bool,
    initialized: bool,
}

impl GlyphPositioner {
    fn new(origin: Point) -> GlyphPositioner {
        GlyphPositioner {
            current_matrix_origin: origin,
            x_advance: 0.0,
            in_text: false,
            initialized: false,
        }
    }

    fn flush(&mut self, stream: &mut dyn WriteStream) {
        if self.in_text {
            stream.write_text("> Tj\n");
            self.in_text = false;
        }
    }

    fn write_glyph(
        &mut self, glyph: u16, advance: f32, position: Point, stream: &mut dyn WriteStream,
    ) {
        if !self.initialized {
            // Flip the text about the x-axis to compensate for the page's y-flip.
            stream.write_text("1 0 0 -1 ");
            append_float(self.current_matrix_origin.x, stream);
            stream.write_text(" ");
            append_float(self.current_matrix_origin.y, stream);
            stream.write_text(" Tm\n");
            self.current_matrix_origin = Point::zero();
            self.initialized = true;
        }
        let relative = position - self.current_matrix_origin;
        if relative != Point::new(self.x_advance, 0.0) {
            self.flush(stream);
            append_float(relative.x, stream);
            stream.write_text(" ");
            append_float(-relative.y, stream);
            stream.write_text(" Td ");
            self.current_matrix_origin = position;
            self.x_advance = 0.0;
        }
        self.x_advance += advance;
        if !self.in_text {
            stream.write_text("<");
            self.in_text = true;
        }
        stream.write_text(&format!("{glyph:04X}"));
    }
}

/// Copies a sub-rect of an image into a new raster image.
fn subset_image(image: &Arc<dyn Image>, src: &Rect) -> Option<Arc<dyn Image>> {
    let pixmap = image.make_pixmap()?;
    let left = src.left.max(0.0) as i32;
    let top = src.top.max(0.0) as i32;
    let right = (src.right as i32).min(pixmap.width());
    let bottom = (src.bottom as i32).min(pixmap.height());
    if left >= right || top >= bottom {
        return None;
    }
    let mut subset = Pixmap::new(right - left, bottom - top, pixmap.color_type())?;
    let bpp = pixmap.color_type().bytes_per_pixel();
    for y in 0..subset.height() {
        let source_row = pixmap.row(y + top);
        let start = left as usize * bpp;
        let end = right as usize * bpp;
        let row_bytes = subset.row_bytes();
        let target = &mut subset.pixels_mut()[y as usize * row_bytes..][..end - start];
        target.copy_from_slice(&source_row[start..end]);
    }
    Some(RasterImage::new(subset))
}

fn apply_color_filter_to_image(
    image: &Arc<dyn Image>, filter: &crate::core::ColorFilter,
) -> Option<Arc<dyn Image>> {
    let pixmap = image.make_pixmap()?;
    if pixmap.color_type() != ColorType::Rgba8888 {
        return None;
    }
    let mut filtered = pixmap.clone();
    let height = filtered.height();
    let width = filtered.width();
    let row_bytes = filtered.row_bytes();
    let pixels = filtered.pixels_mut();
    for y in 0..height {
        for x in 0..width as usize {
            let offset = y as usize * row_bytes + x * 4;
            let color = Color::from_rgba8(
                pixels[offset],
                pixels[offset + 1],
                pixels[offset + 2],
                pixels[offset + 3],
            );
            let result = filter.apply(color);
            pixels[offset] = (result.red * 255.0) as u8;
            pixels[offset + 1] = (result.green * 255.0) as u8;
            pixels[offset + 2] = (result.blue * 255.0) as u8;
            pixels[offset + 3] = (result.alpha * 255.0) as u8;
        }
    }
    Some(RasterImage::new(filtered))
}

// --- raster helpers for layer filters ------------------------------------------

/// Separable box blur run three times per axis, approximating a Gaussian.
fn blur_pixmap(pixmap: &mut Pixmap, sigma_x: f32, sigma_y: f32) {
    let radius_x = (sigma_x * 1.5).round() as i32;
    let radius_y = (sigma_y * 1.5).round() as i32;
    for _ in 0..3 {
        if radius_x > 0 {
            box_blur_axis(pixmap, radius_x, true);
        }
        if radius_y > 0 {
            box_blur_axis(pixmap, radius_y, false);
        }
    }
}

fn box_blur_axis(pixmap: &mut Pixmap, radius: i32, horizontal: bool) {
    debug_assert_eq!(pixmap.color_type(), ColorType::Rgba8888);
    let width = pixmap.width();
    let height = pixmap.height();
    let row_bytes = pixmap.row_bytes();
    let original = pixmap.pixels().to_vec();
    let pixels = pixmap.pixels_mut();
    let window = (2 * radius + 1) as u32;
    let (outer, inner) = if horizontal { (height, width) } else { (width, height) };
    for o in 0..outer {
        for i in 0..inner {
            let mut sums = [0u32; 4];
            for d in -radius..=radius {
                let s = (i + d).clamp(0, inner - 1);
                let (x, y) = if horizontal { (s, o) } else { (o, s) };
                let offset = y as usize * row_bytes + x as usize * 4;
                for c in 0..4 {
                    sums[c] += u32::from(original[offset + c]);
                }
            }
            let (x, y) = if horizontal { (i, o) } else { (o, i) };
            let offset = y as usize * row_bytes + x as usize * 4;
            for c in 0..4 {
                pixels[offset + c] = (sums[c] / window) as u8;
            }
        }
    }
}

/// A premultiplied pixmap holding `color` scaled by the source's alpha.
fn colorize_alpha(pixmap: &Pixmap, color: Color) -> Pixmap {
    let mut out = Pixmap::new(pixmap.width(), pixmap.height(), ColorType::Rgba8888).unwrap();
    let row_bytes = out.row_bytes();
    for y in 0..pixmap.height() {
        for x in 0..pixmap.width() {
            let alpha = (pixmap.pixel32(x, y) >> 24) as f32 / 255.0 * color.alpha;
            let offset = y as usize * row_bytes + x as usize * 4;
            let pixels = out.pixels_mut();
            pixels[offset] = (color.red * alpha * 255.0) as u8;
            pixels[offset + 1] = (color.green * alpha * 255.0) as u8;
            pixels[offset + 2] = (color.blue * alpha * 255.0) as u8;
            pixels[offset + 3] = (alpha * 255.0) as u8;
        }
    }
    out
}

fn invert_alpha(pixmap: &Pixmap) -> Pixmap {
    let mut out = Pixmap::new(pixmap.width(), pixmap.height(), ColorType::Rgba8888).unwrap();
    let row_bytes = out.row_bytes();
    for y in 0..pixmap.height() {
        for x in 0..pixmap.width() {
            let alpha = (pixmap.pixel32(x, y) >> 24) as u8;
            let offset = y as usize * row_bytes + x as usize * 4;
            out.pixels_mut()[offset + 3] = 255 - alpha;
        }
    }
    out
}

fn shift_pixmap(pixmap: &mut Pixmap, dx: f32, dy: f32) {
    let dx = dx.round() as i32;
    let dy = dy.round() as i32;
    if dx == 0 && dy == 0 {
        return;
    }
    let source = pixmap.clone();
    let width = pixmap.width();
    let height = pixmap.height();
    let row_bytes = pixmap.row_bytes();
    let pixels = pixmap.pixels_mut();
    for y in 0..height {
        for x in 0..width {
            let sx = x - dx;
            let sy = y - dy;
            let offset = y as usize * row_bytes + x as usize * 4;
            let value = if sx >= 0 && sx < width && sy >= 0 && sy < height {
                source.pixel32(sx, sy)
            } else {
                // Outside the layer counts as fully opaque for inner shadows.
                0xFF00_0000
            };
            pixels[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// The inner-shadow compose: the blurred inverted alpha, masked by the content's
/// alpha, tinted with the shadow color.
fn mask_and_colorize(inverted: &Pixmap, content: &Pixmap, color: Color) -> Pixmap {
    let mut out = Pixmap::new(content.width(), content.height(), ColorType::Rgba8888).unwrap();
    let row_bytes = out.row_bytes();
    for y in 0..content.height() {
        for x in 0..content.width() {
            let shadow_alpha = (inverted.pixel32(x, y) >> 24) as f32 / 255.0;
            let content_alpha = (content.pixel32(x, y) >> 24) as f32 / 255.0;
            let alpha = shadow_alpha * content_alpha * color.alpha;
            let offset = y as usize * row_bytes + x as usize * 4;
            let pixels = out.pixels_mut();
            pixels[offset] = (color.red * alpha * 255.0) as u8;
            pixels[offset + 1] = (color.green * alpha * 255.0) as u8;
            pixels[offset + 2] = (color.blue * alpha * 255.0) as u8;
            pixels[offset + 3] = (alpha * 255.0) as u8;
        }
    }
    out
}
