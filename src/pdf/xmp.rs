//! Document identity and archival metadata: the Info dictionary, the MD5-based
//! document UUID, the XMP packet for PDF/A, and the embedded sRGB ICC profile.

use once_cell::sync::Lazy;

use crate::pdf::document::{PdfStreamCompression, PdfWriter};
use crate::pdf::metadata::PdfMetadata;
use crate::pdf::object::{ObjectRef, PdfArray, PdfDictionary, PdfObject};
use crate::pdf::utils::HEX_LOWER;

/// A 16-byte RFC 4122 identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Uuid {
    pub data: [u8; 16],
}

impl Uuid {
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|byte| *byte == 0)
    }
}

/// Builds the trailer `/Info` dictionary from the metadata strings and dates.
pub fn make_document_information_dict(metadata: &PdfMetadata) -> PdfDictionary {
    let mut dictionary = PdfDictionary::new();
    let entries: [(&'static str, &String); 6] = [
        ("Title", &metadata.title),
        ("Author", &metadata.author),
        ("Subject", &metadata.subject),
        ("Keywords", &metadata.keywords),
        ("Creator", &metadata.creator),
        ("Producer", &metadata.producer),
    ];
    for (key, value) in entries {
        if !value.is_empty() {
            dictionary.insert_text_string(key, value.clone());
        }
    }
    if let Some(creation) = metadata.creation {
        dictionary.insert_text_string("CreationDate", creation.to_pdf_date());
    }
    if let Some(modified) = metadata.modified {
        dictionary.insert_text_string("ModDate", modified.to_pdf_date());
    }
    dictionary
}

/// Derives the document UUID from the metadata alone, so identical inputs produce
/// identical files.
pub fn create_uuid(metadata: &PdfMetadata) -> Uuid {
    let mut hashed = Vec::new();
    hashed.extend_from_slice(b"gravure.pdf\n");
    for value in [
        &metadata.title,
        &metadata.author,
        &metadata.subject,
        &metadata.keywords,
        &metadata.creator,
        &metadata.producer,
    ] {
        hashed.extend_from_slice(value.as_bytes());
        hashed.push(0x1F);
    }
    for date in [metadata.creation, metadata.modified] {
        if let Some(date) = date {
            hashed.extend_from_slice(date.to_iso8601().as_bytes());
        }
        hashed.push(0x1E);
    }
    let mut digest = md5(&hashed);
    // RFC 4122: stamp the version and variant bits.
    digest[6] = (digest[6] & 0x0F) | 0x30;
    digest[8] = (digest[8] & 0x3F) | 0x80;
    Uuid { data: digest }
}

/// The trailer `/ID` array: two byte strings holding the raw UUID bytes.
pub fn make_pdf_id(document_uuid: &Uuid, instance_uuid: &Uuid) -> PdfObject {
    let mut array = PdfArray::new();
    array.append_byte_string(document_uuid.data.to_vec());
    array.append_byte_string(instance_uuid.data.to_vec());
    array.into()
}

fn count_xml_escape_size(input: &str) -> usize {
    input
        .chars()
        .map(|character| match character {
            '&' => 4,
            '<' => 3,
            _ => 0,
        })
        .sum()
}

/// Escapes `&` and `<` and wraps the result in the given XML fragments. Empty input
/// produces nothing.
fn escape_xml(input: &str, before: &str, after: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let mut output =
        String::with_capacity(input.len() + count_xml_escape_size(input) + before.len()
            + after.len());
    output.push_str(before);
    for character in input.chars() {
        match character {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            _ => output.push(character),
        }
    }
    output.push_str(after);
    output
}

fn uuid_to_string(uuid: &Uuid) -> String {
    // 8-4-4-4-12
    let mut out = String::with_capacity(36);
    for (index, byte) in uuid.data.iter().enumerate() {
        if matches!(index, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push(HEX_LOWER[usize::from(byte >> 4)] as char);
        out.push(HEX_LOWER[usize::from(byte & 0xF)] as char);
    }
    out
}

/// Serializes the XMP packet (ISO 16684-1) claiming PDF/A-2B conformance and emits it
/// as an uncompressed metadata stream.
pub fn make_xmp_object(
    metadata: &PdfMetadata, document_uuid: &Uuid, instance_uuid: &Uuid, writer: &mut PdfWriter,
) -> ObjectRef {
    let creation_date = metadata
        .creation
        .map(|date| format!("<xmp:CreateDate>{}</xmp:CreateDate>\n", date.to_iso8601()))
        .unwrap_or_default();
    let modification_date = metadata
        .modified
        .map(|date| format!("<xmp:ModifyDate>{}</xmp:ModifyDate>\n", date.to_iso8601()))
        .unwrap_or_default();
    let title = escape_xml(
        &metadata.title,
        "<dc:title><rdf:Alt><rdf:li xml:lang=\"x-default\">",
        "</rdf:li></rdf:Alt></dc:title>\n",
    );
    let author = escape_xml(
        &metadata.author,
        "<dc:creator><rdf:Seq><rdf:li>",
        "</rdf:li></rdf:Seq></dc:creator>\n",
    );
    let subject = escape_xml(
        &metadata.subject,
        "<dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\">",
        "</rdf:li></rdf:Alt></dc:description>\n",
    );
    let keywords1 = escape_xml(
        &metadata.keywords,
        "<dc:subject><rdf:Bag><rdf:li>",
        "</rdf:li></rdf:Bag></dc:subject>\n",
    );
    let keywords2 = escape_xml(&metadata.keywords, "<pdf:Keywords>", "</pdf:Keywords>\n");
    let producer = escape_xml(&metadata.producer, "<pdf:Producer>", "</pdf:Producer>\n");
    let creator = escape_xml(&metadata.creator, "<xmp:CreatorTool>", "</xmp:CreatorTool>\n");
    let document_id = uuid_to_string(document_uuid);
    let instance_id = uuid_to_string(instance_uuid);

    let value = format!(
        "<?xpacket begin=\"\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n\
         <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n\
         <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n\
         <rdf:Description rdf:about=\"\"\n\
         \x20xmlns:xmp=\"http://ns.adobe.com/xap/1.0/\"\n\
         \x20xmlns:dc=\"http://purl.org/dc/elements/1.1/\"\n\
         \x20xmlns:xmpMM=\"http://ns.adobe.com/xap/1.0/mm/\"\n\
         \x20xmlns:pdf=\"http://ns.adobe.com/pdf/1.3/\"\n\
         \x20xmlns:pdfaid=\"http://www.aiim.org/pdfa/ns/id/\">\n\
         <pdfaid:part>2</pdfaid:part>\n\
         <pdfaid:conformance>B</pdfaid:conformance>\n\
         {modification_date}{creation_date}{creator}\
         <dc:format>application/pdf</dc:format>\n\
         {title}{subject}{author}{keywords1}\
         <xmpMM:DocumentID>uuid:{document_id}</xmpMM:DocumentID>\n\
         <xmpMM:InstanceID>uuid:{instance_id}</xmpMM:InstanceID>\n\
         {producer}{keywords2}\
         </rdf:Description>\n\
         </rdf:RDF>\n\
         </x:xmpmeta>\n\
         <?xpacket end=\"w\"?>"
    );

    let mut dictionary = PdfDictionary::of_type("Metadata");
    dictionary.insert_name("Subtype", "XML");
    writer.emit_stream_data(dictionary, value.into_bytes(), PdfStreamCompression::No)
}

/// The sRGB OutputIntent array for PDF/A conformance.
pub fn make_srgb_output_intents(profile_ref: ObjectRef) -> PdfArray {
    let mut output_intent = PdfDictionary::of_type("OutputIntent");
    output_intent.insert_name("S", "GTS_PDFA1");
    output_intent.insert_text_string("RegistryName", "http://www.color.org");
    output_intent.insert_text_string("OutputConditionIdentifier", "Custom");
    output_intent.insert_text_string("Info", "sRGB IEC61966-2.1");
    output_intent.insert_ref("DestOutputProfile", profile_ref);
    let mut intents = PdfArray::new();
    intents.append_object(output_intent);
    intents
}

/// A compact sRGB display profile: matrix/TRC tags with D50 white point, enough for
/// viewers and PDF/A validators to interpret DeviceRGB content.
pub static SRGB_ICC_PROFILE: Lazy<Vec<u8>> = Lazy::new(build_srgb_icc_profile);

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_tag(out: &mut Vec<u8>, tag: &[u8; 4]) {
    out.extend_from_slice(tag);
}

/// s15Fixed16 encoding of an XYZ coordinate.
fn fixed_15_16(value: f64) -> u32 {
    (value * 65536.0).round() as i64 as u32
}

fn xyz_tag_data(x: f64, y: f64, z: f64) -> Vec<u8> {
    let mut data = Vec::with_capacity(20);
    push_tag(&mut data, b"XYZ ");
    push_u32(&mut data, 0);
    push_u32(&mut data, fixed_15_16(x));
    push_u32(&mut data, fixed_15_16(y));
    push_u32(&mut data, fixed_15_16(z));
    data
}

fn curv_tag_data(gamma: f64) -> Vec<u8> {
    let mut data = Vec::with_capacity(14);
    push_tag(&mut data, b"curv");
    push_u32(&mut data, 0);
    push_u32(&mut data, 1);
    // u8.8 fixed gamma plus 2 bytes of padding to a 4-byte boundary.
    let fixed = (gamma * 256.0).round() as u16;
    data.extend_from_slice(&fixed.to_be_bytes());
    data.extend_from_slice(&[0, 0]);
    data
}

fn desc_tag_data(text: &str) -> Vec<u8> {
    let mut data = Vec::new();
    push_tag(&mut data, b"desc");
    push_u32(&mut data, 0);
    push_u32(&mut data, text.len() as u32 + 1);
    data.extend_from_slice(text.as_bytes());
    data.push(0);
    // Unicode language/count, script code and the Macintosh name field, all empty.
    data.resize(data.len() + 4 + 4 + 2 + 1 + 67, 0);
    while data.len() % 4 != 0 {
        data.push(0);
    }
    data
}

fn text_tag_data(text: &str) -> Vec<u8> {
    let mut data = Vec::new();
    push_tag(&mut data, b"text");
    push_u32(&mut data, 0);
    data.extend_from_slice(text.as_bytes());
    data.push(0);
    while data.len() % 4 != 0 {
        data.push(0);
    }
    data
}

fn build_srgb_icc_profile() -> Vec<u8> {
    // D50-adapted sRGB primaries and white point.
    let tags: Vec<([u8; 4], Vec<u8>)> = vec![
        (*b"desc", desc_tag_data("sRGB IEC61966-2.1")),
        (*b"wtpt", xyz_tag_data(0.9642, 1.0, 0.8249)),
        (*b"rXYZ", xyz_tag_data(0.4360, 0.2225, 0.0139)),
        (*b"gXYZ", xyz_tag_data(0.3851, 0.7169, 0.0971)),
        (*b"bXYZ", xyz_tag_data(0.1431, 0.0606, 0.7139)),
        (*b"rTRC", curv_tag_data(2.2)),
        (*b"gTRC", curv_tag_data(2.2)),
        (*b"bTRC", curv_tag_data(2.2)),
        (*b"cprt", text_tag_data("no copyright, use freely")),
    ];

    let header_size = 128usize;
    let table_size = 4 + tags.len() * 12;
    let mut offset = header_size + table_size;
    let mut table = Vec::with_capacity(table_size);
    push_u32(&mut table, tags.len() as u32);
    let mut body = Vec::new();
    for (signature, data) in &tags {
        push_tag(&mut table, signature);
        push_u32(&mut table, offset as u32);
        push_u32(&mut table, data.len() as u32);
        offset += data.len();
        body.extend_from_slice(data);
    }

    let total_size = header_size + table_size + body.len();
    let mut profile = Vec::with_capacity(total_size);
    push_u32(&mut profile, total_size as u32);
    push_u32(&mut profile, 0); // preferred CMM
    push_u32(&mut profile, 0x02400000); // version 2.4
    push_tag(&mut profile, b"mntr");
    push_tag(&mut profile, b"RGB ");
    push_tag(&mut profile, b"XYZ ");
    profile.resize(profile.len() + 12, 0); // creation date
    push_tag(&mut profile, b"acsp");
    profile.resize(profile.len() + 4 + 4 + 4 + 4 + 8 + 4, 0);
    // PCS illuminant: D50.
    push_u32(&mut profile, fixed_15_16(0.9642));
    push_u32(&mut profile, fixed_15_16(1.0));
    push_u32(&mut profile, fixed_15_16(0.8249));
    profile.resize(header_size, 0);
    profile.extend_from_slice(&table);
    profile.extend_from_slice(&body);
    profile
}

/// Plain MD5, used only to derive document identifiers.
fn md5(input: &[u8]) -> [u8; 16] {
    const S: [u32; 64] = [
        7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20,
        5, 9, 14, 20, 5, 9, 14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23,
        6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
    ];
    const K: [u32; 64] = [
        0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613,
        0xfd469501, 0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193,
        0xa679438e, 0x49b40821, 0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d,
        0x02441453, 0xd8a1e681, 0xe7d3fbc8, 0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed,
        0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a, 0xfffa3942, 0x8771f681, 0x6d9d6122,
        0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70, 0x289b7ec6, 0xeaa127fa,
        0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665, 0xf4292244,
        0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
        0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb,
        0xeb86d391,
    ];

    let mut message = input.to_vec();
    let bit_length = (input.len() as u64).wrapping_mul(8);
    message.push(0x80);
    while message.len() % 64 != 56 {
        message.push(0);
    }
    message.extend_from_slice(&bit_length.to_le_bytes());

    let mut a0: u32 = 0x67452301;
    let mut b0: u32 = 0xefcdab89;
    let mut c0: u32 = 0x98badcfe;
    let mut d0: u32 = 0x10325476;

    for chunk in message.chunks(64) {
        let mut m = [0u32; 16];
        for (i, word) in m.iter_mut().enumerate() {
            *word = u32::from_le_bytes(chunk[i * 4..i * 4 + 4].try_into().unwrap());
        }
        let (mut a, mut b, mut c, mut d) = (a0, b0, c0, d0);
        for i in 0..64 {
            let (f, g) = match i {
                0..=15 => ((b & c) | (!b & d), i),
                16..=31 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                32..=47 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let temp = d;
            d = c;
            c = b;
            let rotated = a
                .wrapping_add(f)
                .wrapping_add(K[i])
                .wrapping_add(m[g])
                .rotate_left(S[i]);
            b = b.wrapping_add(rotated);
            a = temp;
        }
        a0 = a0.wrapping_add(a);
        b0 = b0.wrapping_add(b);
        c0 = c0.wrapping_add(c);
        d0 = d0.wrapping_add(d);
    }

    let mut digest = [0u8; 16];
    digest[0..4].copy_from_slice(&a0.to_le_bytes());
    digest[4..8].copy_from_slice(&b0.to_le_bytes());
    digest[8..12].copy_from_slice(&c0.to_le_bytes());
    digest[12..16].copy_from_slice(&d0.to_le_bytes());
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_known_vectors() {
        let hex = |digest: [u8; 16]| {
            digest.iter().map(|byte| format!("{byte:02x}")).collect::<String>()
        };
        assert_eq!(hex(md5(b"")), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(hex(md5(b"abc")), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            hex(md5(b"The quick brown fox jumps over the lazy dog")),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn uuid_is_deterministic_and_versioned() {
        let metadata = PdfMetadata { title: "report".into(), ..PdfMetadata::default() };
        let a = create_uuid(&metadata);
        let b = create_uuid(&metadata);
        assert_eq!(a, b);
        assert_eq!(a.data[6] >> 4, 3);
        assert_eq!(a.data[8] & 0xC0, 0x80);
        assert_eq!(uuid_to_string(&a).len(), 36);
    }

    #[test]
    fn icc_profile_structure() {
        let profile = &*SRGB_ICC_PROFILE;
        let size = u32::from_be_bytes(profile[0..4].try_into().unwrap()) as usize;
        assert_eq!(size, profile.len());
        assert_eq!(&profile[36..40], b"acsp");
        let tag_count = u32::from_be_bytes(profile[128..132].try_into().unwrap());
        assert_eq!(tag_count, 9);
    }
}
