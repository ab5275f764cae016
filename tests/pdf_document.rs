//! Whole-document export scenarios: structural invariants of the emitted PDF byte
//! stream.

use gravure::core::{DrawContext, Fill, GradientInfo, GradientType, MCState, Shader};
use gravure::geom::{Color, Point, Rect};
use gravure::pdf::{
    CompressionLevel, PdfDocument, PdfMetadata, PdfStructureElementNode,
};
use gravure::stream::SharedMemoryStream;

use std::sync::Arc;

/// Runs `draw` against a fresh document and returns the emitted bytes.
fn export_document(
    metadata: PdfMetadata, pages: usize, mut draw: impl FnMut(&mut PdfDocument, usize),
) -> Vec<u8> {
    let stream = SharedMemoryStream::new();
    let mut document = PdfDocument::new(Box::new(stream.clone()), metadata, None);
    for page in 0..pages {
        document.begin_page(595.0, 842.0, None).unwrap();
        draw(&mut document, page);
        document.end_page();
    }
    document.close();
    stream.bytes()
}

fn uncompressed_metadata() -> PdfMetadata {
    PdfMetadata { compression_level: CompressionLevel::None, ..PdfMetadata::default() }
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle.as_bytes())
}

#[test]
fn empty_page_has_required_structure() {
    let bytes = export_document(PdfMetadata::default(), 1, |_, _| {});
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.starts_with("%PDF-1.4\n"));
    // The binary marker line holds four bytes above 127.
    assert!(bytes[9] == b'%' && bytes[10] >= 128 && bytes[13] >= 128);
    assert!(contains(&bytes, "/MediaBox [0 0 595 842]"));
    assert!(contains(&bytes, "/Type /Catalog"));
    assert!(contains(&bytes, "/Type /Pages"));
    assert!(contains(&bytes, "/Type /Page"));
    assert!(contains(&bytes, "xref\n0 "));
    assert!(contains(&bytes, "trailer"));
    assert!(text.trim_end().ends_with("%%EOF"));
}

#[test]
fn xref_offsets_point_at_their_objects() {
    let bytes = export_document(uncompressed_metadata(), 2, |document, _| {
        let mut canvas = document.canvas().unwrap();
        let fill = Fill::from_color(Color::new(0.0, 0.5, 1.0, 1.0));
        canvas.draw_rect(&Rect::new(10.0, 10.0, 100.0, 50.0), &MCState::new(), &fill, None);
    });
    // All offsets are byte positions, so work on the raw bytes throughout.
    fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .enumerate()
            .rev()
            .find(|(_, window)| *window == needle)
            .map(|(index, _)| index)
    }
    let xref_at = rfind_bytes(&bytes, b"xref\n").unwrap();
    let table = String::from_utf8(bytes[xref_at..].to_vec()).unwrap();
    let mut lines = table.lines();
    assert_eq!(lines.next(), Some("xref"));
    let header = lines.next().unwrap();
    let count: usize = header.split(' ').nth(1).unwrap().parse().unwrap();
    assert!(count > 4);
    // Free-list head first.
    assert_eq!(lines.next(), Some("0000000000 65535 f "));
    for object_number in 1..count {
        let entry = lines.next().unwrap();
        let offset: usize = entry[..10].parse().unwrap();
        let expected = format!("{object_number} 0 obj");
        assert_eq!(
            &bytes[offset..offset + expected.len()],
            expected.as_bytes(),
            "object {object_number} not at its recorded offset"
        );
    }
    // startxref points at the table itself.
    let startxref_at = rfind_bytes(&bytes, b"startxref\n").unwrap();
    let tail = String::from_utf8(bytes[startxref_at + 10..].to_vec()).unwrap();
    let offset: usize = tail.lines().next().unwrap().trim().parse().unwrap();
    assert_eq!(offset, xref_at);
}

#[test]
fn rect_fill_emits_path_operators() {
    let bytes = export_document(uncompressed_metadata(), 1, |document, _| {
        let mut canvas = document.canvas().unwrap();
        let fill = Fill::from_color(Color::new(1.0, 0.0, 0.0, 1.0));
        canvas.draw_rect(&Rect::new(5.0, 5.0, 25.0, 15.0), &MCState::new(), &fill, None);
    });
    assert!(contains(&bytes, "5 5 20 10 re"));
    assert!(contains(&bytes, "1 0 0 scn"));
    assert!(contains(&bytes, "f\n"));
    // The page's initial transform flips y.
    assert!(contains(&bytes, "1 0 0 -1 0 842 cm"));
}

#[test]
fn linear_gradient_emits_axial_shading() {
    let bytes = export_document(uncompressed_metadata(), 1, |document, _| {
        let mut canvas = document.canvas().unwrap();
        let gradient = GradientInfo::linear(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            vec![Color::new(1.0, 0.0, 0.0, 1.0), Color::new(0.0, 0.0, 1.0, 1.0)],
            vec![0.0, 1.0],
        );
        let mut fill = Fill::default();
        fill.shader = Some(Arc::new(Shader::Gradient(GradientType::Linear, gradient)));
        canvas.draw_rect(&Rect::new(0.0, 0.0, 100.0, 100.0), &MCState::new(), &fill, None);
    });
    assert!(contains(&bytes, "/ShadingType 2"));
    assert!(contains(&bytes, "/Extend [true true]"));
    assert!(contains(&bytes, "/C0 [1 0 0]"));
    assert!(contains(&bytes, "/C1 [0 0 1]"));
    assert!(contains(&bytes, "/PatternType 2"));
    // The content selects the pattern color space.
    assert!(contains(&bytes, "/Pattern cs"));
}

#[test]
fn gradient_with_alpha_splits_into_smask_pattern() {
    let bytes = export_document(uncompressed_metadata(), 1, |document, _| {
        let mut canvas = document.canvas().unwrap();
        let gradient = GradientInfo::linear(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            vec![Color::new(1.0, 0.0, 0.0, 0.25), Color::new(0.0, 0.0, 1.0, 1.0)],
            vec![0.0, 1.0],
        );
        let mut fill = Fill::default();
        fill.shader = Some(Arc::new(Shader::Gradient(GradientType::Linear, gradient)));
        canvas.draw_rect(&Rect::new(0.0, 0.0, 100.0, 100.0), &MCState::new(), &fill, None);
    });
    assert!(contains(&bytes, "/PatternType 1"));
    assert!(contains(&bytes, "/S /Luminosity"));
    assert!(contains(&bytes, "/Group"));
}

#[test]
fn porter_duff_blend_runs_compositing_protocol() {
    let bytes = export_document(uncompressed_metadata(), 1, |document, _| {
        let mut canvas = document.canvas().unwrap();
        let base = Fill::from_color(Color::new(0.0, 1.0, 0.0, 1.0));
        canvas.draw_rect(&Rect::new(0.0, 0.0, 50.0, 50.0), &MCState::new(), &base, None);
        let mut src_in = Fill::from_color(Color::new(0.0, 0.0, 1.0, 1.0));
        src_in.blend_mode = gravure::core::BlendMode::SrcIn;
        canvas.draw_rect(&Rect::new(25.0, 25.0, 75.0, 75.0), &MCState::new(), &src_in, None);
    });
    // The destination was captured into a transparency-group form xobject and
    // re-composed through an alpha soft mask.
    assert!(contains(&bytes, "/Subtype /Form"));
    assert!(contains(&bytes, "/S /Transparency"));
    assert!(contains(&bytes, "/S /Alpha"));
    assert!(contains(&bytes, "/SMask /None"));
    assert!(contains(&bytes, " Do\n"));
}

#[test]
fn page_tree_uses_fanout_of_eight() {
    let bytes = export_document(PdfMetadata::default(), 20, |_, _| {});
    let text = String::from_utf8_lossy(&bytes);
    // 20 pages -> three leaf nodes plus one root.
    assert_eq!(text.matches("/Type /Pages").count(), 4);
    assert_eq!(text.matches("/Type /Page\n").count() + text.matches("/Type /Page>").count(), 20);
    assert!(contains(&bytes, "/Count 20"));
}

#[test]
fn pdfa_documents_carry_xmp_and_output_intent() {
    let metadata = PdfMetadata {
        title: "archival".into(),
        pdf_a: true,
        ..uncompressed_metadata()
    };
    let bytes = export_document(metadata, 1, |_, _| {});
    assert!(contains(&bytes, "<pdfaid:part>2</pdfaid:part>"));
    assert!(contains(&bytes, "<pdfaid:conformance>B</pdfaid:conformance>"));
    assert!(contains(&bytes, "/OutputIntents"));
    assert!(contains(&bytes, "GTS_PDFA1"));
    assert!(contains(&bytes, "/ID ["));
    assert!(contains(&bytes, "/ViewerPreferences"));
    // Identical metadata must yield an identical document ID.
    let metadata = PdfMetadata {
        title: "archival".into(),
        pdf_a: true,
        ..uncompressed_metadata()
    };
    let again = export_document(metadata, 1, |_, _| {});
    let id_of = |bytes: &[u8]| {
        let text = String::from_utf8_lossy(bytes).to_string();
        let at = text.find("/ID [").unwrap();
        text[at..at + 60].to_string()
    };
    assert_eq!(id_of(&bytes), id_of(&again));
}

#[test]
fn structure_tree_collects_marked_content() {
    let root = PdfStructureElementNode {
        type_string: "Document".into(),
        node_id: 1,
        children: vec![PdfStructureElementNode {
            type_string: "P".into(),
            node_id: 2,
            ..PdfStructureElementNode::default()
        }],
        ..PdfStructureElementNode::default()
    };
    let metadata = PdfMetadata {
        structure_element_tree_root: Some(root),
        ..uncompressed_metadata()
    };
    let bytes = export_document(metadata, 1, |document, _| {
        let mut canvas = document.canvas().unwrap();
        canvas.set_structure_node(Some(2));
        let fill = Fill::from_color(Color::BLACK);
        canvas.draw_rect(&Rect::new(0.0, 0.0, 10.0, 10.0), &MCState::new(), &fill, None);
        canvas.set_structure_node(None);
    });
    assert!(contains(&bytes, "/StructTreeRoot"));
    assert!(contains(&bytes, "/Type /StructElem"));
    assert!(contains(&bytes, "/S /P"));
    assert!(contains(&bytes, "/MCID 0"));
    assert!(contains(&bytes, "BDC"));
    assert!(contains(&bytes, "EMC"));
    assert!(contains(&bytes, "/ParentTree"));
    assert!(contains(&bytes, "(node00000002)"));
    assert!(contains(&bytes, "/Marked true"));
}

#[test]
fn compressed_content_streams_round_trip() {
    let draw = |document: &mut PdfDocument, _| {
        let mut canvas = document.canvas().unwrap();
        let fill = Fill::from_color(Color::new(0.2, 0.4, 0.6, 1.0));
        for i in 0..50 {
            let offset = i as f32 * 4.0;
            canvas.draw_rect(
                &Rect::new(offset, offset, offset + 40.0, offset + 20.0),
                &MCState::new(),
                &fill,
                None,
            );
        }
    };
    let compressed = export_document(PdfMetadata::default(), 1, draw);
    let plain = export_document(uncompressed_metadata(), 1, draw);
    assert!(compressed.len() < plain.len());
    assert!(contains(&compressed, "/Filter /FlateDecode"));

    // Inflate every flate stream; the page content must be among them and must
    // match the operators of the uncompressed document.
    fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
        haystack[from..]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|index| index + from)
    }
    let plain_text = String::from_utf8_lossy(&plain).to_string();
    let mut cursor = 0;
    let mut found_content = false;
    while let Some(start) = find_bytes(&compressed, b"/Filter /FlateDecode", cursor) {
        let stream_at =
            find_bytes(&compressed, b"stream\n", start).unwrap() + b"stream\n".len();
        let end = find_bytes(&compressed, b"\nendstream", stream_at).unwrap();
        let inflated =
            miniz_oxide::inflate::decompress_to_vec_zlib(&compressed[stream_at..end]).unwrap();
        if let Ok(inflated_text) = String::from_utf8(inflated) {
            if inflated_text.contains(" re\n") {
                found_content = true;
                assert!(plain_text.contains(&inflated_text[..40]));
            }
        }
        cursor = end;
    }
    assert!(found_content, "no inflatable content stream found");
}

#[test]
fn begin_page_rejects_bad_sizes_and_closed_documents() {
    let mut document = PdfDocument::new(
        Box::new(SharedMemoryStream::new()),
        PdfMetadata::default(),
        None,
    );
    assert!(document.begin_page(0.0, 100.0, None).is_err());
    assert!(document.begin_page(100.0, -1.0, None).is_err());
    document.begin_page(100.0, 100.0, None).unwrap();
    document.close();
    assert!(document.begin_page(100.0, 100.0, None).is_err());
}

#[test]
fn abort_discards_the_page_in_progress() {
    let mut document = PdfDocument::new(
        Box::new(SharedMemoryStream::new()),
        PdfMetadata::default(),
        None,
    );
    document.begin_page(100.0, 100.0, None).unwrap();
    document.abort();
    assert!(document.canvas().is_none());
    assert_eq!(document.page_count(), 0);
}
