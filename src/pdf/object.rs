//! The PDF primitive object model: a tagged value union, insertion-ordered
//! dictionaries, and arrays, each able to emit its textual PDF representation.

use log::error;

use crate::pdf::utils::{append_color_component_u8, append_float, HEX_UPPER};
use crate::stream::WriteStream;

/// A handle to an indirect object: a positive object number with generation zero.
/// The value 0 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    value: i32,
}

impl ObjectRef {
    pub fn new(value: i32) -> ObjectRef {
        debug_assert!(value > 0);
        ObjectRef { value }
    }

    pub fn get(self) -> i32 {
        self.value
    }
}

/// A composite PDF object.
pub enum PdfObject {
    Array(PdfArray),
    Dictionary(PdfDictionary),
}

impl PdfObject {
    pub fn emit(&self, stream: &mut dyn WriteStream) {
        match self {
            PdfObject::Array(array) => array.emit(stream),
            PdfObject::Dictionary(dictionary) => dictionary.emit(stream),
        }
    }
}

impl From<PdfArray> for PdfObject {
    fn from(array: PdfArray) -> PdfObject {
        PdfObject::Array(array)
    }
}

impl From<PdfDictionary> for PdfObject {
    fn from(dictionary: PdfDictionary) -> PdfObject {
        PdfObject::Dictionary(dictionary)
    }
}

/// The tagged union of PDF values.
pub enum PdfValue {
    Int(i32),
    /// A color component emitted as a 3-digit permil decimal.
    ColorComponent(u8),
    Bool(bool),
    Float(f32),
    Name(&'static str),
    ByteString(&'static [u8]),
    TextString(&'static str),
    NameOwned(String),
    ByteStringOwned(Vec<u8>),
    /// Owned text bytes; validated as UTF-8 at emission time.
    TextStringOwned(Vec<u8>),
    Object(Box<PdfObject>),
    Ref(ObjectRef),
}

impl PdfValue {
    pub fn text_string(text: impl Into<String>) -> PdfValue {
        PdfValue::TextStringOwned(text.into().into_bytes())
    }

    pub fn is_name(&self) -> bool {
        matches!(self, PdfValue::Name(_) | PdfValue::NameOwned(_))
    }

    pub fn emit(&self, stream: &mut dyn WriteStream) {
        match self {
            PdfValue::Int(value) => {
                stream.write_text(&value.to_string());
            }
            PdfValue::ColorComponent(value) => append_color_component_u8(*value, stream),
            PdfValue::Bool(value) => {
                stream.write_text(if *value { "true" } else { "false" });
            }
            PdfValue::Float(value) => append_float(*value, stream),
            PdfValue::Name(name) => {
                stream.write_text("/");
                write_name_escaped(stream, name);
            }
            PdfValue::NameOwned(name) => {
                stream.write_text("/");
                write_name_escaped(stream, name);
            }
            PdfValue::ByteString(bytes) => write_byte_string(stream, bytes),
            PdfValue::ByteStringOwned(bytes) => write_byte_string(stream, bytes),
            PdfValue::TextString(text) => write_text_string(stream, text.as_bytes()),
            PdfValue::TextStringOwned(bytes) => write_text_string(stream, bytes),
            PdfValue::Object(object) => object.emit(stream),
            PdfValue::Ref(reference) => {
                stream.write_text(&reference.get().to_string());
                // Generation number is always 0.
                stream.write_text(" 0 R");
            }
        }
    }
}

impl From<i32> for PdfValue {
    fn from(value: i32) -> PdfValue {
        PdfValue::Int(value)
    }
}

impl From<f32> for PdfValue {
    fn from(value: f32) -> PdfValue {
        PdfValue::Float(value)
    }
}

impl From<bool> for PdfValue {
    fn from(value: bool) -> PdfValue {
        PdfValue::Bool(value)
    }
}

impl From<ObjectRef> for PdfValue {
    fn from(reference: ObjectRef) -> PdfValue {
        PdfValue::Ref(reference)
    }
}

/// Characters that must be `#hh`-escaped inside names, beyond the non-printable range.
const NAME_ESCAPES: &[u8] = b"#/%()<>[]{}";

fn write_name_escaped(stream: &mut dyn WriteStream, name: &str) {
    for byte in name.bytes() {
        if !(b'!'..=b'~').contains(&byte) || NAME_ESCAPES.contains(&byte) {
            let escaped = [
                b'#',
                HEX_UPPER[usize::from(byte >> 4)],
                HEX_UPPER[usize::from(byte & 0xF)],
            ];
            stream.write(&escaped);
        } else {
            stream.write(&[byte]);
        }
    }
}

fn write_literal_byte_string(stream: &mut dyn WriteStream, data: &[u8]) {
    stream.write_text("(");
    for &byte in data {
        if byte < b' ' || byte > b'~' {
            let octal = [
                b'\\',
                b'0' | (byte >> 6),
                b'0' | ((byte >> 3) & 0x07),
                b'0' | (byte & 0x07),
            ];
            stream.write(&octal);
        } else {
            if byte == b'\\' || byte == b'(' || byte == b')' {
                stream.write_text("\\");
            }
            stream.write(&[byte]);
        }
    }
    stream.write_text(")");
}

fn write_hex_byte_string(stream: &mut dyn WriteStream, data: &[u8]) {
    stream.write_text("<");
    for &byte in data {
        let hex = [HEX_UPPER[usize::from(byte >> 4)], HEX_UPPER[usize::from(byte & 0xF)]];
        stream.write(&hex);
    }
    stream.write_text(">");
}

fn write_optimized_byte_string(stream: &mut dyn WriteStream, data: &[u8], literal_extras: usize) {
    let hex_length = 2 + 2 * data.len();
    let literal_length = 2 + data.len() + literal_extras;
    if literal_length <= hex_length {
        write_literal_byte_string(stream, data);
    } else {
        write_hex_byte_string(stream, data);
    }
}

/// Emits a byte string as whichever of the literal and hex forms is shorter.
pub fn write_byte_string(stream: &mut dyn WriteStream, data: &[u8]) {
    let mut literal_extras = 0usize;
    for &byte in data {
        if byte < b' ' || byte > b'~' {
            literal_extras += 3;
        } else if byte == b'\\' || byte == b'(' || byte == b')' {
            literal_extras += 1;
        }
    }
    write_optimized_byte_string(stream, data, literal_extras);
}

/// Emits a text string: PDFDocEncoding-compatible text as a byte string, anything
/// else as UTF-16BE hex prefixed with the byte-order mark. Invalid UTF-8 input emits
/// an empty hex string.
pub fn write_text_string(stream: &mut dyn WriteStream, data: &[u8]) {
    let Ok(text) = std::str::from_utf8(data) else {
        error!("invalid UTF-8 in PDF text string");
        stream.write_text("<>");
        return;
    };
    let mut is_pdf_doc_encoding = true;
    let mut literal_extras = 0usize;
    for character in text.chars() {
        let code = character as u32;
        // See Table D.2 (PDFDocEncoding Character Set) in PDF32000_2008.
        if (0x15 < code && code < 0x20) || 0x7E < code {
            is_pdf_doc_encoding = false;
            break;
        }
        if code < u32::from(b' ') || u32::from(b'~') < code {
            literal_extras += 3;
        } else if character == '\\' || character == '(' || character == ')' {
            literal_extras += 1;
        }
    }
    if is_pdf_doc_encoding {
        write_optimized_byte_string(stream, data, literal_extras);
        return;
    }
    stream.write_text("<FEFF");
    for character in text.chars() {
        let mut units = [0u16; 2];
        for unit in character.encode_utf16(&mut units) {
            let value = *unit;
            let hex = [
                HEX_UPPER[usize::from(value >> 12)],
                HEX_UPPER[usize::from((value >> 8) & 0xF)],
                HEX_UPPER[usize::from((value >> 4) & 0xF)],
                HEX_UPPER[usize::from(value & 0xF)],
            ];
            stream.write(&hex);
        }
    }
    stream.write_text(">");
}

/// A PDF array. Values keep insertion order.
#[derive(Default)]
pub struct PdfArray {
    values: Vec<PdfValue>,
}

impl PdfArray {
    pub fn new() -> PdfArray {
        PdfArray::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = PdfValue>) -> PdfArray {
        PdfArray { values: values.into_iter().collect() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional);
    }

    pub fn append(&mut self, value: PdfValue) {
        self.values.push(value);
    }

    pub fn append_int(&mut self, value: i32) {
        self.append(PdfValue::Int(value));
    }

    pub fn append_color_component(&mut self, value: u8) {
        self.append(PdfValue::ColorComponent(value));
    }

    pub fn append_bool(&mut self, value: bool) {
        self.append(PdfValue::Bool(value));
    }

    pub fn append_float(&mut self, value: f32) {
        self.append(PdfValue::Float(value));
    }

    pub fn append_name(&mut self, name: &'static str) {
        self.append(PdfValue::Name(name));
    }

    pub fn append_name_owned(&mut self, name: String) {
        self.append(PdfValue::NameOwned(name));
    }

    pub fn append_text_string(&mut self, value: impl Into<String>) {
        self.append(PdfValue::text_string(value));
    }

    pub fn append_byte_string(&mut self, value: Vec<u8>) {
        self.append(PdfValue::ByteStringOwned(value));
    }

    pub fn append_object(&mut self, object: impl Into<PdfObject>) {
        self.append(PdfValue::Object(Box::new(object.into())));
    }

    pub fn append_ref(&mut self, reference: ObjectRef) {
        self.append(PdfValue::Ref(reference));
    }

    pub fn emit(&self, stream: &mut dyn WriteStream) {
        stream.write_text("[");
        for (i, value) in self.values.iter().enumerate() {
            value.emit(stream);
            if i + 1 < self.values.len() {
                stream.write_text(" ");
            }
        }
        stream.write_text("]");
    }
}

/// Builds a [`PdfArray`] from a list of convertible values.
#[macro_export]
macro_rules! pdf_array {
    ($($value:expr),* $(,)?) => {{
        let mut array = $crate::pdf::PdfArray::new();
        $(array.append($crate::pdf::PdfValue::from($value));)*
        array
    }};
}

/// A PDF dictionary: an insertion-ordered list of name/value pairs. Callers must not
/// insert duplicate keys; there is no last-writer-wins.
#[derive(Default)]
pub struct PdfDictionary {
    records: Vec<(PdfValue, PdfValue)>,
}

impl PdfDictionary {
    pub fn new() -> PdfDictionary {
        PdfDictionary::default()
    }

    /// A dictionary with its `/Type` already set.
    pub fn of_type(type_name: &'static str) -> PdfDictionary {
        let mut dictionary = PdfDictionary::new();
        dictionary.insert_name("Type", type_name);
        dictionary
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.records.reserve(additional);
    }

    pub fn insert(&mut self, key: &'static str, value: PdfValue) {
        self.records.push((PdfValue::Name(key), value));
    }

    pub fn insert_key_owned(&mut self, key: String, value: PdfValue) {
        self.records.push((PdfValue::NameOwned(key), value));
    }

    pub fn insert_int(&mut self, key: &'static str, value: i32) {
        self.insert(key, PdfValue::Int(value));
    }

    pub fn insert_usize(&mut self, key: &'static str, value: usize) {
        self.insert(key, PdfValue::Int(value as i32));
    }

    pub fn insert_bool(&mut self, key: &'static str, value: bool) {
        self.insert(key, PdfValue::Bool(value));
    }

    pub fn insert_float(&mut self, key: &'static str, value: f32) {
        self.insert(key, PdfValue::Float(value));
    }

    pub fn insert_name(&mut self, key: &'static str, name: &'static str) {
        self.insert(key, PdfValue::Name(name));
    }

    pub fn insert_name_owned(&mut self, key: &'static str, name: String) {
        self.insert(key, PdfValue::NameOwned(name));
    }

    pub fn insert_text_string(&mut self, key: &'static str, value: impl Into<String>) {
        self.insert(key, PdfValue::text_string(value));
    }

    pub fn insert_byte_string(&mut self, key: &'static str, value: Vec<u8>) {
        self.insert(key, PdfValue::ByteStringOwned(value));
    }

    pub fn insert_object(&mut self, key: &'static str, object: impl Into<PdfObject>) {
        self.insert(key, PdfValue::Object(Box::new(object.into())));
    }

    pub fn insert_ref(&mut self, key: &'static str, reference: ObjectRef) {
        self.insert(key, PdfValue::Ref(reference));
    }

    pub fn insert_ref_owned(&mut self, key: String, reference: ObjectRef) {
        self.insert_key_owned(key, PdfValue::Ref(reference));
    }

    pub fn emit(&self, stream: &mut dyn WriteStream) {
        stream.write_text("<<");
        for (i, (key, value)) in self.records.iter().enumerate() {
            key.emit(stream);
            stream.write_text(" ");
            value.emit(stream);
            if i + 1 < self.records.len() {
                stream.write_text("\n");
            }
        }
        stream.write_text(">>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryWriteStream;

    fn emitted(value: PdfValue) -> String {
        let mut stream = MemoryWriteStream::new();
        value.emit(&mut stream);
        String::from_utf8(stream.read_data()).unwrap()
    }

    #[test]
    fn name_escaping() {
        assert_eq!(emitted(PdfValue::Name("Type")), "/Type");
        assert_eq!(emitted(PdfValue::NameOwned("a b#c".into())), "/a#20b#23c");
        assert_eq!(emitted(PdfValue::NameOwned("(x)".into())), "/#28x#29");
    }

    #[test]
    fn byte_string_picks_shorter_form() {
        // Printable text stays literal.
        assert_eq!(emitted(PdfValue::ByteStringOwned(b"hello".to_vec())), "(hello)");
        // Mostly control bytes flip to hex.
        assert_eq!(emitted(PdfValue::ByteStringOwned(vec![0x01, 0x02, 0x03])), "<010203>");
        // Parens are escaped in literal form.
        assert_eq!(emitted(PdfValue::ByteStringOwned(b"a(b)".to_vec())), "(a\\(b\\))");
    }

    #[test]
    fn text_string_unicode_fallback() {
        assert_eq!(emitted(PdfValue::text_string("plain")), "(plain)");
        // Non-PDFDocEncoding text becomes UTF-16BE with a BOM.
        assert_eq!(emitted(PdfValue::text_string("\u{00e9}")), "<FEFF00E9>");
        // Surrogate pairs.
        assert_eq!(emitted(PdfValue::text_string("\u{1F600}")), "<FEFFD83DDE00>");
        // Invalid UTF-8 bytes degrade to the empty hex string.
        assert_eq!(emitted(PdfValue::TextStringOwned(vec![0xFF, 0xFE])), "<>");
    }

    #[test]
    fn float_formatting() {
        assert_eq!(emitted(PdfValue::Float(0.5)), "0.5");
        assert_eq!(emitted(PdfValue::Float(-2.0)), "-2");
        assert_eq!(emitted(PdfValue::Float(f32::NAN)), "0");
        assert_eq!(emitted(PdfValue::Float(f32::INFINITY)), emitted(PdfValue::Float(f32::MAX)));
    }

    #[test]
    fn refs_and_composites() {
        assert_eq!(emitted(PdfValue::Ref(ObjectRef::new(7))), "7 0 R");
        let mut dictionary = PdfDictionary::of_type("Catalog");
        dictionary.insert_ref("Pages", ObjectRef::new(2));
        let mut stream = MemoryWriteStream::new();
        dictionary.emit(&mut stream);
        assert_eq!(
            String::from_utf8(stream.read_data()).unwrap(),
            "<</Type /Catalog\n/Pages 2 0 R>>"
        );

        let array = pdf_array![1, 0.25f32, true];
        let mut stream = MemoryWriteStream::new();
        array.emit(&mut stream);
        assert_eq!(String::from_utf8(stream.read_data()).unwrap(), "[1 0.25 true]");
    }
}
