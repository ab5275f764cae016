//! Document-level configuration: metadata strings, dates, compression and color
//! handling, and the tagged-structure input tree.

use crate::pdf::object::PdfArray;

/// The DPI at which untransformed content is emitted.
pub const DEFAULT_RASTER_DPI: f32 = 72.0;

/// A calendar timestamp with an explicit UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    /// Minutes ahead of (positive) or behind UTC.
    pub time_zone_minutes: i16,
    pub year: u16,
    pub month: u8,
    pub day_of_week: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// `D:YYYYMMDDHHMMSS+HH'MM'`, the form PDF Info dictionaries use.
    pub fn to_pdf_date(&self) -> String {
        let sign = if self.time_zone_minutes >= 0 { '+' } else { '-' };
        let minutes = i32::from(self.time_zone_minutes).abs();
        format!(
            "D:{:04}{:02}{:02}{:02}{:02}{:02}{}{:02}'{:02}'",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            sign,
            minutes / 60,
            minutes % 60,
        )
    }

    /// `YYYY-MM-DDTHH:MM:SS+HH:MM`, the form XMP uses.
    pub fn to_iso8601(&self) -> String {
        let sign = if self.time_zone_minutes >= 0 { '+' } else { '-' };
        let minutes = i32::from(self.time_zone_minutes).abs();
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}{:02}:{:02}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            sign,
            minutes / 60,
            minutes % 60,
        )
    }
}

/// Attributes attached to a structure element node. Each attribute carries an owner
/// (e.g. "Layout", "Table") and a name/value pair from PDF32000 14.8.5.
#[derive(Default)]
pub struct PdfAttributeList {
    pub(crate) attributes: Option<PdfArray>,
}

impl PdfAttributeList {
    pub fn new() -> Self {
        PdfAttributeList::default()
    }

    fn push(&mut self, owner: &str, build: impl FnOnce(&mut crate::pdf::PdfDictionary)) {
        let mut attribute = crate::pdf::PdfDictionary::new();
        attribute.insert_key_owned("O".to_string(), crate::pdf::PdfValue::NameOwned(owner.into()));
        build(&mut attribute);
        self.attributes.get_or_insert_with(PdfArray::new).append_object(attribute);
    }

    pub fn append_int(&mut self, owner: &str, name: &str, value: i32) {
        self.push(owner, |attribute| {
            attribute.insert_key_owned(name.to_string(), crate::pdf::PdfValue::Int(value));
        });
    }

    pub fn append_float(&mut self, owner: &str, name: &str, value: f32) {
        self.push(owner, |attribute| {
            attribute.insert_key_owned(name.to_string(), crate::pdf::PdfValue::Float(value));
        });
    }

    pub fn append_name(&mut self, owner: &str, name: &str, value: &str) {
        self.push(owner, |attribute| {
            attribute
                .insert_key_owned(name.to_string(), crate::pdf::PdfValue::NameOwned(value.into()));
        });
    }

    pub fn append_float_array(&mut self, owner: &str, name: &str, values: &[f32]) {
        let mut array = PdfArray::new();
        for value in values {
            array.append_float(*value);
        }
        self.push(owner, |attribute| {
            attribute.insert_key_owned(
                name.to_string(),
                crate::pdf::PdfValue::Object(Box::new(array.into())),
            );
        });
    }

    /// Appends an array of structure node IDs, stored as their padded ID strings.
    pub fn append_node_id_array(&mut self, owner: &str, name: &str, node_ids: &[i32]) {
        let mut array = PdfArray::new();
        for node_id in node_ids {
            array.append_byte_string(format!("node{node_id:08}").into_bytes());
        }
        self.push(owner, |attribute| {
            attribute.insert_key_owned(
                name.to_string(),
                crate::pdf::PdfValue::Object(Box::new(array.into())),
            );
        });
    }
}

/// A node of the caller-supplied semantic structure tree.
#[derive(Default)]
pub struct PdfStructureElementNode {
    /// The structure type, e.g. "Document", "H1", "P", "Figure".
    pub type_string: String,
    pub children: Vec<PdfStructureElementNode>,
    pub node_id: i32,
    /// Extra IDs that alias this node (content merged from elsewhere).
    pub additional_node_ids: Vec<i32>,
    pub attributes: PdfAttributeList,
    /// Alternate text for accessibility.
    pub alt: String,
    pub lang: String,
}

/// Which outline tree the document builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outline {
    #[default]
    None,
    /// Derive outline entries from H1..H6 structure elements.
    StructureElementHeaders,
}

/// Stream compression presets, mapping onto zlib levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    #[default]
    Default,
    None,
    LowButFast,
    Average,
    HighButSlow,
}

impl CompressionLevel {
    pub fn zlib_level(self) -> i32 {
        match self {
            CompressionLevel::Default => -1,
            CompressionLevel::None => 0,
            CompressionLevel::LowButFast => 1,
            CompressionLevel::Average => 6,
            CompressionLevel::HighButSlow => 9,
        }
    }
}

/// The color spaces the exporter can tag or convert into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
}

/// Everything configurable about one exported document.
pub struct PdfMetadata {
    /// The document's title.
    pub title: String,
    /// The person who created the document.
    pub author: String,
    pub subject: String,
    /// Comma-delimited keywords.
    pub keywords: String,
    /// The product the document was converted from, if any.
    pub creator: String,
    /// The product doing the conversion.
    pub producer: String,
    /// Creation timestamp; None omits the field.
    pub creation: Option<DateTime>,
    /// Modification timestamp; None omits the field.
    pub modified: Option<DateTime>,
    /// Catalog `/Lang`; when empty the structure tree root's language is used.
    pub lang: String,
    /// DPI used when rasterizing content PDF has no native form for.
    pub raster_dpi: f32,
    /// Emit XMP metadata, a document UUID and an sRGB output intent for PDF/A-2b
    /// conformance.
    pub pdf_a: bool,
    /// JPEG quality for opaque images; above 100 forces lossless encoding.
    pub encoding_quality: i32,
    /// Semantic structure of the content, if the caller has one.
    pub structure_element_tree_root: Option<PdfStructureElementNode>,
    pub outline: Outline,
    pub compression_level: CompressionLevel,
    /// Convert colors into this space before emission.
    pub dst_color_space: Option<ColorSpace>,
    /// Tag output with this space's ICC profile without converting.
    pub assign_color_space: Option<ColorSpace>,
}

impl Default for PdfMetadata {
    fn default() -> Self {
        PdfMetadata {
            title: String::new(),
            author: String::new(),
            subject: String::new(),
            keywords: String::new(),
            creator: String::new(),
            producer: format!("gravure {}", env!("CARGO_PKG_VERSION")),
            creation: None,
            modified: None,
            lang: String::new(),
            raster_dpi: DEFAULT_RASTER_DPI,
            pdf_a: false,
            encoding_quality: 101,
            structure_element_tree_root: None,
            outline: Outline::None,
            compression_level: CompressionLevel::Default,
            dst_color_space: None,
            assign_color_space: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_formats() {
        let date = DateTime {
            time_zone_minutes: -330,
            year: 2024,
            month: 3,
            day_of_week: 5,
            day: 8,
            hour: 14,
            minute: 30,
            second: 5,
        };
        assert_eq!(date.to_pdf_date(), "D:20240308143005-05'30'");
        assert_eq!(date.to_iso8601(), "2024-03-08T14:30:05-05:30");
    }
}
