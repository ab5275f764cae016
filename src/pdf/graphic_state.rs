//! Extended graphic state objects: cached fill states (alpha + blend mode) and the
//! soft-mask states used by the compositing protocol.

use crate::core::{BlendMode, Fill};
use crate::pdf::document::DocumentCore;
use crate::pdf::object::{ObjectRef, PdfDictionary};
use crate::pdf::utils::blend_mode_name;

/// Cache key for a fill graphic state. Alpha is hashed by bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FillGraphicStateKey {
    alpha_bits: u32,
    blend_mode: u8,
}

fn filter_pdf_blend_mode(mode: BlendMode) -> BlendMode {
    if blend_mode_name(mode).is_none()
        || matches!(mode, BlendMode::Xor | BlendMode::PlusLighter | BlendMode::PlusDarker)
    {
        BlendMode::SrcOver
    } else {
        mode
    }
}

/// Returns (emitting if needed) the graphic state carrying the fill's alpha and blend
/// mode.
pub fn graphic_state_for_fill(core: &mut DocumentCore, fill: &Fill) -> ObjectRef {
    let mode = filter_pdf_blend_mode(fill.blend_mode);
    let key = FillGraphicStateKey {
        alpha_bits: fill.color.alpha.to_bits(),
        blend_mode: mode as u8,
    };
    if let Some(reference) = core.caches.fill_graphic_states.get(&key) {
        return *reference;
    }
    let mut state = PdfDictionary::new();
    state.reserve(2);
    state.insert_float("ca", fill.color.alpha);
    state.insert_name("BM", blend_mode_name(mode).unwrap_or("Normal"));
    let reference = core.writer.emit_dictionary(&state);
    core.caches.fill_graphic_states.insert(key, reference);
    reference
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SMaskMode {
    Alpha,
    Luminosity,
}

/// Emits an ExtGState that installs `smask` as the soft mask. Masks are rarely
/// reused, so these are not canonicalized.
pub fn smask_graphic_state(
    core: &mut DocumentCore, smask: ObjectRef, _invert: bool, mode: SMaskMode,
) -> ObjectRef {
    let mut smask_dict = PdfDictionary::of_type("Mask");
    smask_dict.insert_name(
        "S",
        match mode {
            SMaskMode::Alpha => "Alpha",
            SMaskMode::Luminosity => "Luminosity",
        },
    );
    smask_dict.insert_ref("G", smask);
    let mut state = PdfDictionary::of_type("ExtGState");
    state.insert_object("SMask", smask_dict);
    core.writer.emit_dictionary(&state)
}

/// The shared "no soft mask" graphic state used to restore state after masked draws.
pub fn no_smask_graphic_state(core: &mut DocumentCore) -> ObjectRef {
    if let Some(reference) = core.caches.no_smask_graphic_state {
        return reference;
    }
    let mut state = PdfDictionary::of_type("ExtGState");
    state.insert_name("SMask", "None");
    let reference = core.writer.emit_dictionary(&state);
    core.caches.no_smask_graphic_state = Some(reference);
    reference
}
