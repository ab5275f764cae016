//! Incremental graphic-state tracking for content streams.
//!
//! The stack holds at most two saved entries (one for the clip, one for the matrix)
//! on top of the base state; operators (`q`, `Q`, `cm`, `W n`, `scn`, `gs`, `Tz`) are
//! emitted only when the requested state differs from the current one. The stream
//! written to is chosen by the export context per draw: the page content, or the
//! deferred buffer used by non-normal blend modes.

use crate::core::{MCState, Path, PathFillType};
use crate::geom::{Color, Matrix};
use crate::pdf::utils::{
    append_color_component_f32, append_rectangle, append_transform, apply_graphic_state,
    apply_pattern, emit_path,
};
use crate::stream::WriteStream;

/// One saved level of drawing state.
#[derive(Clone)]
pub struct StackEntry {
    pub matrix: Matrix,
    pub clip: Path,
    pub clip_matrix: Matrix,
    pub color: Option<Color>,
    /// Zero means the caller does not care about the text scale.
    pub text_scale_x: f32,
    pub shader_index: i32,
    pub graphic_state_index: i32,
}

impl Default for StackEntry {
    fn default() -> Self {
        StackEntry {
            matrix: Matrix::identity(),
            clip: Path::new(),
            clip_matrix: Matrix::identity(),
            color: None,
            text_scale_x: 1.0,
            shader_index: -1,
            graphic_state_index: -1,
        }
    }
}

/// Must hold one level for the clip and one for the matrix, plus the base.
const MAX_STACK_DEPTH: usize = 2;

/// Tracks the graphic state of one content stream and appends operators to it.
pub struct GraphicStackState {
    entries: [StackEntry; MAX_STACK_DEPTH + 1],
    stack_depth: usize,
    first_color_update: bool,
}

impl Default for GraphicStackState {
    fn default() -> Self {
        GraphicStackState::new()
    }
}

impl GraphicStackState {
    pub fn new() -> GraphicStackState {
        GraphicStackState {
            entries: Default::default(),
            stack_depth: 0,
            first_color_update: true,
        }
    }

    pub fn current_entry(&self) -> &StackEntry {
        &self.entries[self.stack_depth]
    }

    fn current_entry_mut(&mut self) -> &mut StackEntry {
        &mut self.entries[self.stack_depth]
    }

    fn push(&mut self, content: &mut dyn WriteStream) {
        debug_assert!(self.stack_depth < MAX_STACK_DEPTH);
        content.write_text("q\n");
        self.stack_depth += 1;
        self.entries[self.stack_depth] = self.entries[self.stack_depth - 1].clone();
    }

    fn pop(&mut self, content: &mut dyn WriteStream) {
        debug_assert!(self.stack_depth > 0);
        content.write_text("Q\n");
        self.entries[self.stack_depth] = StackEntry::default();
        self.stack_depth -= 1;
    }

    /// Emits `Q` until no saved state remains.
    pub fn drain_stack(&mut self, content: &mut dyn WriteStream) {
        while self.stack_depth > 0 {
            self.pop(content);
        }
    }

    fn clip_matches(entry: &StackEntry, state: &MCState) -> bool {
        entry.clip.verb_count() == state.clip.verb_count()
            && entry.clip.bounds() == state.clip.bounds()
            && entry.clip_matrix == state.matrix
    }

    /// Installs the draw's clip, re-using the saved one when it already matches.
    pub fn update_clip(&mut self, state: &MCState, content: &mut dyn WriteStream) {
        if state.clip.is_empty() {
            return;
        }
        if Self::clip_matches(self.current_entry(), state) {
            return;
        }
        while self.stack_depth > 0 {
            self.pop(content);
            if Self::clip_matches(self.current_entry(), state) {
                return;
            }
        }
        self.push(content);
        let entry = self.current_entry_mut();
        entry.clip = state.clip.clone();
        entry.clip_matrix = state.matrix;
        append_clip(&state.clip, content);
    }

    /// Installs the draw matrix under the clip level.
    pub fn update_matrix(&mut self, matrix: &Matrix, content: &mut dyn WriteStream) {
        if *matrix == self.current_entry().matrix {
            return;
        }
        if !self.current_entry().matrix.is_identity() {
            debug_assert!(self.stack_depth > 0);
            self.pop(content);
            debug_assert!(self.current_entry().matrix.is_identity());
        }
        if matrix.is_identity() {
            return;
        }
        self.push(content);
        append_transform(matrix, content);
        self.current_entry_mut().matrix = *matrix;
    }

    /// Emits color / pattern / graphic-state / text-scale operators for `state`
    /// where they differ from the current entry.
    pub fn update_drawing_state(&mut self, state: &StackEntry, content: &mut dyn WriteStream) {
        // PDF treats a pattern as a color: exactly one of the two is active.
        if state.shader_index >= 0 {
            if state.shader_index != self.current_entry().shader_index {
                apply_pattern(state.shader_index, content);
                self.current_entry_mut().shader_index = state.shader_index;
            }
        } else if let Some(color) = state.color {
            if self.current_entry().color != Some(color)
                || self.current_entry().shader_index >= 0
            {
                // Select the page's ICC color space before the first color.
                if self.first_color_update {
                    content.write_text("/CS CS\n/CS cs\n");
                    self.first_color_update = false;
                }
                emit_pdf_color(color, content);
                content.write_text("SCN\n");
                emit_pdf_color(color, content);
                content.write_text("scn\n");
                let entry = self.current_entry_mut();
                entry.color = Some(color);
                entry.shader_index = -1;
            }
        }
        if state.graphic_state_index != self.current_entry().graphic_state_index {
            apply_graphic_state(state.graphic_state_index, content);
            self.current_entry_mut().graphic_state_index = state.graphic_state_index;
        }
        if state.text_scale_x != 0.0 && state.text_scale_x != self.current_entry().text_scale_x {
            let pdf_scale = state.text_scale_x * 100.0;
            crate::pdf::utils::append_float(pdf_scale, content);
            content.write_text(" Tz\n");
            self.current_entry_mut().text_scale_x = state.text_scale_x;
        }
    }
}

fn emit_pdf_color(color: Color, stream: &mut dyn WriteStream) {
    // Alpha is carried by the graphic state, never by the color operator.
    debug_assert!(color.alpha == 1.0);
    append_color_component_f32(color.red, stream);
    stream.write_text(" ");
    append_color_component_f32(color.green, stream);
    stream.write_text(" ");
    append_color_component_f32(color.blue, stream);
    stream.write_text(" ");
}

fn append_clip(clip: &Path, stream: &mut dyn WriteStream) {
    if let Some((bounds, _)) = clip.as_rect() {
        append_rectangle(&bounds, stream);
        stream.write_text("W* n\n");
        return;
    }
    emit_path(clip, false, stream);
    if clip.fill_type() == PathFillType::EvenOdd {
        stream.write_text("W* n\n");
    } else {
        stream.write_text("W n\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;
    use crate::stream::MemoryWriteStream;

    fn text_of(stream: &MemoryWriteStream) -> String {
        String::from_utf8(stream.read_data()).unwrap()
    }

    #[test]
    fn repeated_state_emits_once() {
        let mut stack = GraphicStackState::new();
        let mut content = MemoryWriteStream::new();
        let entry = StackEntry {
            color: Some(Color::new(1.0, 0.0, 0.0, 1.0)),
            graphic_state_index: 4,
            text_scale_x: 0.0,
            ..StackEntry::default()
        };
        stack.update_drawing_state(&entry, &mut content);
        stack.update_drawing_state(&entry, &mut content);
        let text = text_of(&content);
        assert_eq!(text.matches("scn").count(), 1);
        assert_eq!(text.matches("/G4 gs").count(), 1);
    }

    #[test]
    fn matrix_changes_balance_q_pairs() {
        let mut stack = GraphicStackState::new();
        let mut content = MemoryWriteStream::new();
        stack.update_matrix(&Matrix::make_trans(5.0, 5.0), &mut content);
        stack.update_matrix(&Matrix::make_scale(2.0, 2.0), &mut content);
        stack.drain_stack(&mut content);
        let text = text_of(&content);
        assert_eq!(text.matches('q').count(), text.matches('Q').count());
        assert!(text.contains("1 0 0 1 5 5 cm"));
        assert!(text.contains("2 0 0 2 0 0 cm"));
    }

    #[test]
    fn clip_uses_rect_fast_path() {
        let mut stack = GraphicStackState::new();
        let mut content = MemoryWriteStream::new();
        let mut state = MCState::new();
        state.clip.add_rect(&Rect::new(0.0, 0.0, 20.0, 10.0));
        stack.update_clip(&state, &mut content);
        let text = text_of(&content);
        assert!(text.contains("0 0 20 10 re\nW* n\n"));
        // Same clip again: nothing new.
        let before = text.len();
        stack.update_clip(&state, &mut content);
        assert_eq!(text_of(&content).len(), before);
    }
}
