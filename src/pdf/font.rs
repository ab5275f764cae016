//! PDF text support: per-typeface font resources with glyph-usage tracking, emitted
//! at close time as subsetted CID Type 2 fonts with Identity-H encoding and a
//! ToUnicode CMap.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::warn;

use crate::core::{GlyphId, Typeface};
use crate::pdf::document::{PdfStreamCompression, PdfWriter};
use crate::pdf::object::{ObjectRef, PdfArray, PdfDictionary};

/// One typeface's presence in the document: its reserved font reference and the set
/// of glyphs actually drawn.
pub struct PdfStrike {
    pub typeface: Arc<Typeface>,
    pub font_ref: ObjectRef,
    glyph_usage: BTreeSet<GlyphId>,
}

impl PdfStrike {
    /// Records that a glyph is used and must survive subsetting.
    pub fn note_glyph_usage(&mut self, glyph: GlyphId) {
        self.glyph_usage.insert(glyph);
    }

    /// Glyph IDs double as CIDs under Identity-H.
    pub fn glyph_to_font_encoding(&self, glyph: GlyphId) -> GlyphId {
        glyph
    }
}

/// Tracks all fonts used by a document.
#[derive(Default)]
pub struct FontManager {
    strikes: HashMap<usize, PdfStrike>,
    next_subset_tag: u32,
}

impl FontManager {
    pub fn new() -> FontManager {
        FontManager::default()
    }

    fn typeface_key(typeface: &Arc<Typeface>) -> usize {
        Arc::as_ptr(typeface) as usize
    }

    /// Returns the strike for a typeface, reserving its font reference on first use.
    pub fn strike_for(
        &mut self, writer: &mut PdfWriter, typeface: &Arc<Typeface>,
    ) -> &mut PdfStrike {
        let key = Self::typeface_key(typeface);
        self.strikes.entry(key).or_insert_with(|| PdfStrike {
            typeface: Arc::clone(typeface),
            font_ref: writer.reserve_ref(),
            glyph_usage: BTreeSet::new(),
        })
    }

    /// PDF 32000-1:2008 9.6.4: six uppercase letters followed by a plus sign, unique
    /// per subset within the file.
    fn next_font_subset_tag(&mut self) -> String {
        let mut value = self.next_subset_tag;
        self.next_subset_tag = (self.next_subset_tag + 1) % 308_915_776;
        let mut tag = String::with_capacity(7);
        for _ in 0..6 {
            tag.push((b'A' + (value % 26) as u8) as char);
            value /= 26;
        }
        tag.push('+');
        tag
    }

    /// Emits every font used by the document. Called once at close.
    pub fn emit_subsets(mut self, writer: &mut PdfWriter) {
        let mut strikes: Vec<PdfStrike> = self.strikes.drain().map(|(_, v)| v).collect();
        // Sort by reference so output is reproducible.
        strikes.sort_by_key(|strike| strike.font_ref);
        for strike in strikes {
            let tag = self.next_font_subset_tag();
            emit_font_subset(writer, &strike, &tag);
        }
    }
}

fn to_font_units(value: f32, units_per_em: u16) -> f32 {
    value / f32::from(units_per_em) * 1000.0
}

fn emit_font_subset(writer: &mut PdfWriter, strike: &PdfStrike, subset_tag: &str) {
    let typeface = &strike.typeface;
    let base_font = format!("{subset_tag}{}", typeface.post_script_name());
    let units_per_em = typeface.units_per_em();

    let cid_ref = writer.reserve_ref();
    let descriptor_ref = writer.reserve_ref();
    let cmap_ref = writer.reserve_ref();
    let data_ref = writer.reserve_ref();

    // The composite (Type 0) font the content streams reference.
    let mut type0 = PdfDictionary::of_type("Font");
    type0.insert_name("Subtype", "Type0");
    type0.insert_name_owned("BaseFont", base_font.clone());
    type0.insert_name("Encoding", "Identity-H");
    let mut descendants = PdfArray::new();
    descendants.append_ref(cid_ref);
    type0.insert_object("DescendantFonts", descendants);
    type0.insert_ref("ToUnicode", cmap_ref);
    writer.emit_dictionary_with_ref(&type0, strike.font_ref);

    // The CID font with per-glyph widths.
    let mut cid = PdfDictionary::of_type("Font");
    cid.insert_name("Subtype", "CIDFontType2");
    cid.insert_name_owned("BaseFont", base_font.clone());
    let mut system_info = PdfDictionary::new();
    system_info.insert_byte_string("Registry", b"Adobe".to_vec());
    system_info.insert_byte_string("Ordering", b"Identity".to_vec());
    system_info.insert_int("Supplement", 0);
    cid.insert_object("CIDSystemInfo", system_info);
    cid.insert_ref("FontDescriptor", descriptor_ref);
    cid.insert_int("DW", 0);
    cid.insert_name("CIDToGIDMap", "Identity");
    let mut widths = PdfArray::new();
    for &glyph in &strike.glyph_usage {
        let advance = to_font_units(f32::from(typeface.advance(glyph)), units_per_em);
        if advance != 0.0 {
            let mut entry = PdfArray::new();
            entry.append_float(advance);
            widths.append_int(i32::from(glyph));
            widths.append_object(entry);
        }
    }
    cid.insert_object("W", widths);
    writer.emit_dictionary_with_ref(&cid, cid_ref);

    // Descriptor with the face metrics.
    let metrics = typeface.metrics();
    let mut descriptor = PdfDictionary::of_type("FontDescriptor");
    descriptor.insert_name_owned("FontName", base_font);
    let mut flags = 0i32;
    flags |= 1 << 2; // Symbolic
    if metrics.is_fixed_pitch {
        flags |= 1 << 0;
    }
    if metrics.is_serif {
        flags |= 1 << 1;
    }
    if metrics.is_italic {
        flags |= 1 << 6;
    }
    descriptor.insert_int("Flags", flags);
    let bounds = metrics.bounds;
    let mut bbox = PdfArray::new();
    bbox.append_float(to_font_units(bounds.left, units_per_em));
    bbox.append_float(to_font_units(bounds.top, units_per_em));
    bbox.append_float(to_font_units(bounds.right, units_per_em));
    bbox.append_float(to_font_units(bounds.bottom, units_per_em));
    descriptor.insert_object("FontBBox", bbox);
    descriptor.insert_float("ItalicAngle", metrics.italic_angle);
    descriptor.insert_float("Ascent", to_font_units(metrics.ascent, units_per_em));
    descriptor.insert_float("Descent", to_font_units(metrics.descent, units_per_em));
    descriptor.insert_float("CapHeight", to_font_units(metrics.cap_height, units_per_em));
    descriptor.insert_float("StemV", 10.0 + 0.244 * (f32::from(metrics.weight) - 50.0));
    descriptor.insert_ref("FontFile2", data_ref);
    writer.emit_dictionary_with_ref(&descriptor, descriptor_ref);

    // The ToUnicode CMap for text extraction.
    let cmap = create_to_unicode_cmap(strike);
    writer.emit_stream_data_with_ref(
        PdfDictionary::new(),
        cmap,
        PdfStreamCompression::Yes,
        cmap_ref,
    );

    // The subset font program.
    let glyphs: Vec<u16> = strike.glyph_usage.iter().copied().collect();
    let data = match subsetter::subset(
        typeface.data(),
        typeface.index(),
        subsetter::Profile::pdf(&glyphs),
    ) {
        Ok(subset) => subset,
        Err(error) => {
            warn!("font subsetting failed ({error:?}); embedding the whole face");
            typeface.data().to_vec()
        }
    };
    writer.emit_stream_data_with_ref(
        PdfDictionary::new(),
        data,
        PdfStreamCompression::Yes,
        data_ref,
    );
}

fn create_to_unicode_cmap(strike: &PdfStrike) -> Vec<u8> {
    let mut cmap = String::new();
    cmap.push_str(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo <<\n\
         /Registry (Adobe)\n\
         /Ordering (UCS)\n\
         /Supplement 0\n\
         >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <ffff>\n\
         endcodespacerange\n",
    );
    let mapped: Vec<(GlyphId, u32)> = strike
        .glyph_usage
        .iter()
        .filter_map(|&glyph| {
            let unicode = strike.typeface.glyph_to_unicode(glyph);
            (unicode != 0).then_some((glyph, unicode))
        })
        .collect();
    // bfchar sections are limited to 100 entries each.
    for chunk in mapped.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (glyph, unicode) in chunk {
            cmap.push_str(&format!("<{glyph:04x}> <"));
            if let Some(character) = char::from_u32(*unicode) {
                let mut units = [0u16; 2];
                for unit in character.encode_utf16(&mut units) {
                    cmap.push_str(&format!("{:04x}", *unit));
                }
            } else {
                cmap.push_str("0000");
            }
            cmap.push_str(">\n");
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end",
    );
    cmap.into_bytes()
}
