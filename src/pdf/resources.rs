//! Resource dictionaries and the `/G1`-style names content streams use to address
//! them.

use crate::pdf::object::{ObjectRef, PdfArray, PdfDictionary};
use crate::stream::WriteStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    ExtGState,
    Pattern,
    XObject,
    Font,
}

fn prefix(resource_type: ResourceType) -> char {
    match resource_type {
        ResourceType::ExtGState => 'G',
        ResourceType::Pattern => 'P',
        ResourceType::XObject => 'X',
        ResourceType::Font => 'F',
    }
}

fn type_name(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::ExtGState => "ExtGState",
        ResourceType::Pattern => "Pattern",
        ResourceType::XObject => "XObject",
        ResourceType::Font => "Font",
    }
}

/// The resource name for an indirect object, keyed by its reference number.
pub fn resource_name(resource_type: ResourceType, index: i32) -> String {
    format!("{}{}", prefix(resource_type), index)
}

pub fn write_resource_name(stream: &mut dyn WriteStream, resource_type: ResourceType, index: i32) {
    stream.write_text("/");
    stream.write_text(&resource_name(resource_type, index));
}

fn make_proc_set() -> PdfArray {
    let mut proc_sets = PdfArray::new();
    for proc_name in ["PDF", "Text", "ImageB", "ImageC", "ImageI"] {
        proc_sets.append_name(proc_name);
    }
    proc_sets
}

fn add_sub_dictionary(
    resources: &[ObjectRef], resource_type: ResourceType, destination: &mut PdfDictionary,
) {
    if resources.is_empty() {
        return;
    }
    let mut sub = PdfDictionary::new();
    for reference in resources {
        sub.insert_ref_owned(resource_name(resource_type, reference.get()), *reference);
    }
    destination.insert_object(type_name(resource_type), sub);
}

/// Builds a `/Resources` dictionary from sorted reference lists.
pub fn make_resource_dictionary(
    graphic_states: &[ObjectRef], shaders: &[ObjectRef], xobjects: &[ObjectRef],
    fonts: &[ObjectRef],
) -> PdfDictionary {
    let mut dictionary = PdfDictionary::new();
    dictionary.insert_object("ProcSet", make_proc_set());
    add_sub_dictionary(graphic_states, ResourceType::ExtGState, &mut dictionary);
    add_sub_dictionary(shaders, ResourceType::Pattern, &mut dictionary);
    add_sub_dictionary(xobjects, ResourceType::XObject, &mut dictionary);
    add_sub_dictionary(fonts, ResourceType::Font, &mut dictionary);
    dictionary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryWriteStream;

    #[test]
    fn names_by_reference_number() {
        assert_eq!(resource_name(ResourceType::XObject, 12), "X12");
        let mut stream = MemoryWriteStream::new();
        write_resource_name(&mut stream, ResourceType::Font, 3);
        assert_eq!(stream.as_bytes(), b"/F3");
    }

    #[test]
    fn dictionary_sections() {
        let dictionary = make_resource_dictionary(
            &[ObjectRef::new(4)],
            &[],
            &[ObjectRef::new(9), ObjectRef::new(10)],
            &[],
        );
        let mut stream = MemoryWriteStream::new();
        dictionary.emit(&mut stream);
        let text = String::from_utf8(stream.read_data()).unwrap();
        assert!(text.contains("/ProcSet"));
        assert!(text.contains("/ExtGState <</G4 4 0 R>>"));
        assert!(text.contains("/X9 9 0 R"));
        assert!(text.contains("/X10 10 0 R"));
        assert!(!text.contains("/Font"));
    }
}
