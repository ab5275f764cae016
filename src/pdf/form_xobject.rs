//! Form XObjects: reusable content streams with their own resources, used as
//! compositing intermediates and soft-mask groups.

use crate::geom::Matrix;
use crate::pdf::document::{PdfStreamCompression, PdfWriter};
use crate::pdf::object::{ObjectRef, PdfArray, PdfDictionary};
use crate::pdf::utils::matrix_to_array;

/// Emits a Form XObject wrapping `content`. The group is marked as an isolated
/// transparency group, which is what the layer compositing protocol relies on.
pub fn make_form_xobject(
    writer: &mut PdfWriter, content: Vec<u8>, media_box: PdfArray,
    resources: PdfDictionary, inverse_transform: &Matrix, color_space: Option<&'static str>,
) -> ObjectRef {
    let mut dictionary = PdfDictionary::of_type("XObject");
    dictionary.insert_name("Subtype", "Form");
    if !inverse_transform.is_identity() {
        dictionary.insert_object("Matrix", matrix_to_array(inverse_transform));
    }
    dictionary.insert_object("Resources", resources);
    dictionary.insert_object("BBox", media_box);
    let mut group = PdfDictionary::of_type("Group");
    group.insert_name("S", "Transparency");
    if let Some(color_space) = color_space {
        group.insert_name("CS", color_space);
    }
    group.insert_bool("I", true); // Isolated.
    dictionary.insert_object("Group", group);
    writer.emit_stream_data(dictionary, content, PdfStreamCompression::Yes)
}
