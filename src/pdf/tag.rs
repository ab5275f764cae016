//! The tagged-structure tree: a parallel tree of structure elements accumulating
//! marked-content references from draw sites, emitted at close as the StructTreeRoot
//! with its parent tree and ID tree, plus an optional outline derived from headers.

use std::collections::HashMap;

use crate::geom::Point;
use crate::pdf::document::PdfWriter;
use crate::pdf::metadata::{Outline, PdfStructureElementNode};
use crate::pdf::object::{ObjectRef, PdfArray, PdfDictionary};

/// StructParents keys for annotations start far above any page index.
const FIRST_ANNOTATION_STRUCT_PARENT_KEY: i32 = 100_000;

/// The earliest/uppermost location of a node's content, used for outline targets.
#[derive(Clone, Copy)]
struct Location {
    point: Point,
    page_index: usize,
    valid: bool,
}

impl Location {
    fn invalid() -> Location {
        Location { point: Point::zero(), page_index: 0, valid: false }
    }

    fn accumulate(&mut self, other: &Location) {
        if !other.valid {
            return;
        }
        if !self.valid || other.page_index < self.page_index {
            *self = *other;
            return;
        }
        if other.page_index == self.page_index {
            self.point.x = self.point.x.min(other.point.x);
            // PDF y-axis points up: keep the topmost point.
            self.point.y = self.point.y.max(other.point.y);
        }
    }
}

struct MarkedContentInfo {
    location: Location,
    mark_id: i32,
}

struct AnnotationInfo {
    page_index: usize,
    annotation_ref: ObjectRef,
}

/// One node of the internal tree, addressed by arena index.
struct TagNode {
    node_id: i32,
    type_string: String,
    alt: String,
    lang: String,
    want_title: bool,
    title: String,
    children: Vec<usize>,
    marked_content: Vec<MarkedContentInfo>,
    annotations: Vec<AnnotationInfo>,
    attributes: Option<PdfArray>,
    reference: Option<ObjectRef>,
}

/// Node-id strings must sort lexicographically in numeric order, so the digits are
/// zero-padded.
fn node_id_to_string(node_id: i32) -> String {
    format!("node{node_id:08}")
}

fn is_header_type(type_string: &str) -> bool {
    let bytes = type_string.as_bytes();
    bytes.len() >= 2 && bytes[0] == b'H' && (b'1'..=b'6').contains(&bytes[1])
}

/// The structure tree for one document.
#[derive(Default)]
pub struct PdfTagTree {
    nodes: Vec<TagNode>,
    root: Option<usize>,
    node_map: HashMap<i32, usize>,
    outline: Outline,
    marks_per_page: Vec<Vec<usize>>,
    parent_tree_annotation_node_ids: Vec<i32>,
}

impl PdfTagTree {
    pub fn new() -> PdfTagTree {
        PdfTagTree::default()
    }

    /// Copies the caller's structure tree into the internal arena.
    pub fn init(&mut self, root: PdfStructureElementNode, outline: Outline) {
        self.outline = outline;
        let root_index = self.copy_node(root, false);
        self.root = Some(root_index);
    }

    fn copy_node(&mut self, mut node: PdfStructureElementNode, want_title: bool) -> usize {
        // Title accumulation must match the outline's header walk.
        let want_title = want_title
            || (self.outline == Outline::StructureElementHeaders
                && is_header_type(&node.type_string));
        let attributes = node.attributes.attributes.take();
        let children = std::mem::take(&mut node.children);
        let index = self.nodes.len();
        self.nodes.push(TagNode {
            node_id: node.node_id,
            type_string: node.type_string.clone(),
            alt: node.alt.clone(),
            lang: node.lang.clone(),
            want_title,
            title: String::new(),
            children: Vec::new(),
            marked_content: Vec::new(),
            annotations: Vec::new(),
            attributes,
            reference: None,
        });
        self.node_map.insert(node.node_id, index);
        for additional in &node.additional_node_ids {
            self.node_map.insert(*additional, index);
        }
        let child_indices: Vec<usize> =
            children.into_iter().map(|child| self.copy_node(child, want_title)).collect();
        self.nodes[index].children = child_indices;
        index
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Opens a marked-content ID for a node on a page. Returns the MCID to put in
    /// the `BDC` property list, or None when the node is unknown.
    pub fn create_mark_for_node(
        &mut self, node_id: i32, page_index: usize, point: Point,
    ) -> Option<i32> {
        self.root?;
        let index = *self.node_map.get(&node_id)?;
        if page_index >= self.marks_per_page.len() {
            self.marks_per_page.resize(page_index + 1, Vec::new());
        }
        let page_marks = &mut self.marks_per_page[page_index];
        let mark_id = page_marks.len() as i32;
        self.nodes[index].marked_content.push(MarkedContentInfo {
            location: Location { point, page_index, valid: true },
            mark_id,
        });
        page_marks.push(index);
        Some(mark_id)
    }

    /// Reserves a StructParents key for an annotation attached to a node.
    pub fn create_struct_parent_key_for_node(&mut self, node_id: i32) -> Option<i32> {
        self.root?;
        self.node_map.get(&node_id)?;
        let key = FIRST_ANNOTATION_STRUCT_PARENT_KEY
            + self.parent_tree_annotation_node_ids.len() as i32;
        self.parent_tree_annotation_node_ids.push(node_id);
        Some(key)
    }

    pub fn add_node_annotation(
        &mut self, node_id: i32, annotation_ref: ObjectRef, page_index: usize,
    ) {
        let Some(&index) = self.node_map.get(&node_id) else {
            return;
        };
        self.nodes[index].annotations.push(AnnotationInfo { page_index, annotation_ref });
    }

    /// Appends text to a header node's accumulated title, within a size cap.
    pub fn add_node_title(&mut self, node_id: i32, title: &str) {
        let Some(&index) = self.node_map.get(&node_id) else {
            return;
        };
        let node = &mut self.nodes[index];
        if node.want_title {
            node.title.push_str(title);
            if node.title.len() > 1023 {
                node.want_title = false;
            }
        }
    }

    pub fn root_language(&self) -> String {
        self.root.map(|index| self.nodes[index].lang.clone()).unwrap_or_default()
    }

    /// True when the node has no marked content anywhere below it.
    fn can_discard(&self, index: usize, memo: &mut HashMap<usize, bool>) -> bool {
        if let Some(&value) = memo.get(&index) {
            return value;
        }
        let node = &self.nodes[index];
        let discard = node.marked_content.is_empty()
            && node.annotations.is_empty()
            && node
                .children
                .clone()
                .into_iter()
                .all(|child| self.can_discard(child, memo));
        memo.insert(index, discard);
        discard
    }

    fn prepare_node_to_emit(
        &mut self, parent: ObjectRef, index: usize, writer: &mut PdfWriter,
        page_refs: &[ObjectRef], memo: &mut HashMap<usize, bool>,
        id_tree_entries: &mut Vec<(i32, ObjectRef)>,
    ) -> ObjectRef {
        let reference = writer.reserve_ref();
        self.nodes[index].reference = Some(reference);
        let mut kids = PdfArray::new();
        let children = self.nodes[index].children.clone();
        for child in children {
            if !self.can_discard(child, memo) {
                kids.append_ref(self.prepare_node_to_emit(
                    reference,
                    child,
                    writer,
                    page_refs,
                    memo,
                    id_tree_entries,
                ));
            }
        }
        let node = &mut self.nodes[index];
        for info in &node.marked_content {
            let mut mcr = PdfDictionary::of_type("MCR");
            mcr.insert_ref("Pg", page_refs[info.location.page_index]);
            mcr.insert_int("MCID", info.mark_id);
            kids.append_object(mcr);
        }
        for annotation in &node.annotations {
            let mut objr = PdfDictionary::of_type("OBJR");
            objr.insert_ref("Obj", annotation.annotation_ref);
            objr.insert_ref("Pg", page_refs[annotation.page_index]);
            kids.append_object(objr);
        }
        let mut dictionary = PdfDictionary::of_type("StructElem");
        if node.type_string.is_empty() {
            dictionary.insert_name("S", "NonStruct");
        } else {
            dictionary.insert_name_owned("S", node.type_string.clone());
        }
        if !node.alt.is_empty() {
            dictionary.insert_text_string("Alt", node.alt.clone());
        }
        if !node.lang.is_empty() {
            dictionary.insert_text_string("Lang", node.lang.clone());
        }
        dictionary.insert_ref("P", parent);
        dictionary.insert_object("K", kids);
        if let Some(attributes) = node.attributes.take() {
            dictionary.insert_object("A", attributes);
        }
        let id_string = node_id_to_string(node.node_id);
        dictionary.insert_byte_string("ID", id_string.into_bytes());
        id_tree_entries.push((node.node_id, reference));
        writer.emit_dictionary_with_ref(&dictionary, reference)
    }

    /// Emits the structure tree and returns the StructTreeRoot reference, or None
    /// when there is no retained structure.
    pub fn make_struct_tree_root(
        &mut self, writer: &mut PdfWriter, page_refs: &[ObjectRef],
    ) -> Option<ObjectRef> {
        let root = self.root?;
        let mut memo = HashMap::new();
        if self.can_discard(root, &mut memo) {
            return None;
        }
        let reference = writer.reserve_ref();
        let mut id_tree_entries = Vec::new();
        let mut struct_tree_root = PdfDictionary::of_type("StructTreeRoot");
        let kid =
            self.prepare_node_to_emit(reference, root, writer, page_refs, &mut memo,
                &mut id_tree_entries);
        struct_tree_root.insert_ref("K", kid);
        struct_tree_root.insert_usize("ParentTreeNextKey", page_refs.len());

        // The parent tree: per page, the MCID -> structure element mapping; then one
        // entry per annotation.
        let mut parent_tree = PdfDictionary::of_type("ParentTree");
        let mut nums = PdfArray::new();
        for (page, page_marks) in self.marks_per_page.iter().enumerate() {
            let mut mark_to_tag = PdfArray::new();
            for &mark_node in page_marks {
                mark_to_tag.append_ref(self.nodes[mark_node].reference.unwrap());
            }
            nums.append_int(page as i32);
            nums.append_ref(writer.emit_array(&mark_to_tag));
        }
        for (offset, node_id) in self.parent_tree_annotation_node_ids.iter().enumerate() {
            let Some(&index) = self.node_map.get(node_id) else {
                continue;
            };
            let Some(node_ref) = self.nodes[index].reference else {
                continue;
            };
            nums.append_int(FIRST_ANNOTATION_STRUCT_PARENT_KEY + offset as i32);
            nums.append_ref(node_ref);
        }
        parent_tree.insert_object("Nums", nums);
        struct_tree_root.insert_ref("ParentTree", writer.emit_dictionary(&parent_tree));

        // The ID tree: every node id string mapped to its element, in one leaf.
        if !id_tree_entries.is_empty() {
            id_tree_entries.sort_by_key(|(node_id, _)| *node_id);
            let mut leaf = PdfDictionary::new();
            let mut limits = PdfArray::new();
            limits.append_text_string(node_id_to_string(id_tree_entries[0].0));
            limits
                .append_text_string(node_id_to_string(id_tree_entries.last().unwrap().0));
            leaf.insert_object("Limits", limits);
            let mut names = PdfArray::new();
            for (node_id, node_ref) in &id_tree_entries {
                names.append_text_string(node_id_to_string(*node_id));
                names.append_ref(*node_ref);
            }
            leaf.insert_object("Names", names);
            let mut id_tree = PdfDictionary::new();
            let mut kids = PdfArray::new();
            kids.append_ref(writer.emit_dictionary(&leaf));
            id_tree.insert_object("Kids", kids);
            struct_tree_root.insert_ref("IDTree", writer.emit_dictionary(&id_tree));
        }
        Some(writer.emit_dictionary_with_ref(&struct_tree_root, reference))
    }

    fn outline_content(
        &self, index: usize, memo: &mut HashMap<usize, bool>,
    ) -> (String, Location) {
        let node = &self.nodes[index];
        let mut text = if !node.title.is_empty() {
            node.title.clone()
        } else {
            node.alt.clone()
        };
        let mut location = Location::invalid();
        for mark in &node.marked_content {
            location.accumulate(&mark.location);
        }
        for &child in &node.children {
            if self.can_discard(child, memo) {
                continue;
            }
            let (child_text, child_location) = self.outline_content(child, memo);
            text.push_str(&child_text);
            location.accumulate(&child_location);
        }
        (text, location)
    }

    fn collect_headers(
        &self, index: usize, memo: &mut HashMap<usize, bool>,
        headers: &mut Vec<(i32, String, Location, Option<ObjectRef>)>,
    ) {
        let node = &self.nodes[index];
        if is_header_type(&node.type_string) {
            let level = i32::from(node.type_string.as_bytes()[1] - b'0');
            let (text, location) = self.outline_content(index, memo);
            if !text.is_empty() {
                headers.push((level, text, location, node.reference));
                return;
            }
        }
        for &child in &node.children {
            if !self.can_discard(child, memo) {
                self.collect_headers(child, memo, headers);
            }
        }
    }

    /// Emits the outline built from header structure elements. Returns None when
    /// outlines are disabled or no titled header exists.
    pub fn make_outline(
        &mut self, writer: &mut PdfWriter, page_refs: &[ObjectRef],
    ) -> Option<ObjectRef> {
        let root = self.root?;
        if self.outline != Outline::StructureElementHeaders {
            return None;
        }
        let mut memo = HashMap::new();
        if self.can_discard(root, &mut memo) {
            return None;
        }
        let mut headers = Vec::new();
        self.collect_headers(root, &mut memo, &mut headers);
        if headers.is_empty() {
            return None;
        }

        // Nest by header level: an Hn entry becomes a child of the nearest previous
        // entry with a smaller level.
        struct Entry {
            reference: ObjectRef,
            level: i32,
            parent: usize,
            children: Vec<usize>,
            title: String,
            location: Location,
            structure_ref: Option<ObjectRef>,
        }
        let mut entries: Vec<Entry> = Vec::with_capacity(headers.len() + 1);
        entries.push(Entry {
            reference: writer.reserve_ref(),
            level: 0,
            parent: 0,
            children: Vec::new(),
            title: String::new(),
            location: Location::invalid(),
            structure_ref: None,
        });
        let mut stack = vec![0usize];
        for (level, title, location, structure_ref) in headers {
            while entries[*stack.last().unwrap()].level >= level {
                stack.pop();
            }
            let parent = *stack.last().unwrap();
            let index = entries.len();
            entries.push(Entry {
                reference: writer.reserve_ref(),
                level,
                parent,
                children: Vec::new(),
                title,
                location,
                structure_ref,
            });
            entries[parent].children.push(index);
            stack.push(index);
        }

        // Emit depth-first; counts cover all descendants.
        fn descendant_count(entries: &[Entry], index: usize) -> usize {
            entries[index]
                .children
                .iter()
                .map(|&child| 1 + descendant_count(entries, child))
                .sum()
        }
        for index in 1..entries.len() {
            let entry = &entries[index];
            let mut dictionary = PdfDictionary::new();
            dictionary.insert_text_string("Title", entry.title.clone());
            let mut destination = PdfArray::new();
            let page = entry.location.page_index.min(page_refs.len().saturating_sub(1));
            destination.append_ref(page_refs[page]);
            destination.append_name("XYZ");
            destination.append_float(entry.location.point.x);
            destination.append_float(entry.location.point.y);
            destination.append_int(0); // leave zoom unchanged
            dictionary.insert_object("Dest", destination);
            dictionary.insert_ref("Parent", entries[entry.parent].reference);
            if let Some(structure_ref) = entry.structure_ref {
                dictionary.insert_ref("SE", structure_ref);
            }
            let siblings = &entries[entry.parent].children;
            let position = siblings.iter().position(|&sibling| sibling == index).unwrap();
            if position > 0 {
                dictionary.insert_ref("Prev", entries[siblings[position - 1]].reference);
            }
            if position + 1 < siblings.len() {
                dictionary.insert_ref("Next", entries[siblings[position + 1]].reference);
            }
            if !entry.children.is_empty() {
                dictionary.insert_ref("First", entries[entry.children[0]].reference);
                dictionary
                    .insert_ref("Last", entries[*entry.children.last().unwrap()].reference);
                dictionary.insert_usize("Count", descendant_count(&entries, index));
            }
            writer.emit_dictionary_with_ref(&dictionary, entry.reference);
        }
        let top = &entries[0];
        let mut outline = PdfDictionary::of_type("Outlines");
        outline.insert_ref("First", entries[top.children[0]].reference);
        outline.insert_ref("Last", entries[*top.children.last().unwrap()].reference);
        outline.insert_usize("Count", descendant_count(&entries, 0));
        Some(writer.emit_dictionary_with_ref(&outline, top.reference))
    }
}
