//! Fixture documents for unit tests.

use crate::document::PdfDocument;
use crate::links::push_annotation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Object {
    Object::Array(vec![
        Object::Integer(x0),
        Object::Integer(y0),
        Object::Integer(x1),
        Object::Integer(y1),
    ])
}

fn font_resources(font: ObjectId) -> Dictionary {
    Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font))])),
    )])
}

fn new_font(doc: &mut Document) -> ObjectId {
    doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]))
}

fn new_page(doc: &mut Document, parent: ObjectId, label: &str) -> ObjectId {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", label);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
    doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(parent)),
        ("Contents", Object::Reference(content_id)),
    ]))
}

fn finish(mut doc: Document, pages_id: ObjectId) -> PdfDocument {
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));
    PdfDocument::from_lopdf(doc)
}

/// Flat document with `n` pages labelled `"{prefix} {i}"`.
///
/// Resources and MediaBox live on the root only, so every page inherits them.
pub fn build_labeled_document(n: usize, prefix: &str) -> PdfDocument {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font = new_font(&mut doc);

    let kids: Vec<Object> = (0..n)
        .map(|i| Object::Reference(new_page(&mut doc, pages_id, &format!("{} {}", prefix, i))))
        .collect();

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(n as i64)),
        ("Resources", Object::Dictionary(font_resources(font))),
        ("MediaBox", rect(0, 0, 612, 792)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    finish(doc, pages_id)
}

pub fn build_document(n: usize) -> PdfDocument {
    build_labeled_document(n, "Page")
}

/// Two-level tree: one intermediate node per entry of `groups`, holding
/// that many pages. Labels are numbered across the whole document. Each
/// intermediate node has its own MediaBox.
pub fn build_nested_document(groups: &[usize]) -> PdfDocument {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font = new_font(&mut doc);

    let mut label = 0;
    let mut children = Vec::new();
    for (k, &size) in groups.iter().enumerate() {
        let node_id = doc.new_object_id();
        let kids: Vec<Object> = (0..size)
            .map(|_| {
                let page = new_page(&mut doc, node_id, &format!("Page {}", label));
                label += 1;
                Object::Reference(page)
            })
            .collect();
        let node = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(size as i64)),
            ("MediaBox", rect(0, 0, 600 + 10 * k as i64, 800)),
        ]);
        doc.objects.insert(node_id, Object::Dictionary(node));
        children.push(Object::Reference(node_id));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(children)),
        ("Count", Object::Integer(label as i64)),
        ("Resources", Object::Dictionary(font_resources(font))),
        ("MediaBox", rect(0, 0, 612, 792)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    finish(doc, pages_id)
}

/// Decoded content stream of a page.
pub fn content_of(doc: &PdfDocument, page: ObjectId) -> Vec<u8> {
    let contents = doc.dict(page).unwrap().get(b"Contents").unwrap();
    let stream = doc.resolve(contents).unwrap().as_stream().unwrap();
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().unwrap()
    } else {
        stream.content.clone()
    }
}

/// The text shown by each page, in page order.
pub fn page_labels(doc: &PdfDocument) -> Vec<String> {
    doc.page_ids()
        .unwrap()
        .into_iter()
        .map(|id| {
            let content = String::from_utf8(content_of(doc, id)).unwrap();
            let start = content.find('(').unwrap() + 1;
            let end = content.rfind(')').unwrap();
            content[start..end].to_string()
        })
        .collect()
}

pub fn add_annotation(
    doc: &mut PdfDocument,
    page_idx: usize,
    subtype: &str,
    extra: &[(&str, Object)],
) -> ObjectId {
    let page = doc.page_ids().unwrap()[page_idx];
    let mut annot = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Annot".to_vec())),
        ("Subtype", Object::Name(subtype.as_bytes().to_vec())),
        ("Rect", rect(10, 10, 110, 40)),
        ("P", Object::Reference(page)),
    ]);
    for (key, value) in extra {
        annot.set(*key, value.clone());
    }
    let id = doc.add_object(annot);
    push_annotation(doc, page, id).unwrap();
    id
}

/// Link on `from_page` jumping to the top-left of `to_page`.
pub fn add_goto_link(doc: &mut PdfDocument, from_page: usize, to_page: usize) -> ObjectId {
    let target = doc.page_ids().unwrap()[to_page];
    let dest = Object::Array(vec![
        Object::Reference(target),
        Object::Name(b"XYZ".to_vec()),
        Object::Integer(72),
        Object::Integer(720),
        Object::Integer(0),
    ]);
    add_annotation(doc, from_page, "Link", &[("Dest", dest)])
}

pub fn add_uri_link(doc: &mut PdfDocument, page: usize, uri: &str) -> ObjectId {
    let action = Dictionary::from_iter(vec![
        ("S", Object::Name(b"URI".to_vec())),
        (
            "URI",
            Object::String(uri.as_bytes().to_vec(), StringFormat::Literal),
        ),
    ]);
    add_annotation(doc, page, "Link", &[("A", Object::Dictionary(action))])
}

/// Flat outline with one item per entry of `targets`, each jumping to that page.
pub fn add_outline(doc: &mut PdfDocument, targets: &[usize]) -> Vec<ObjectId> {
    let pages = doc.page_ids().unwrap();
    let root = doc.reserve_object_id();
    let items: Vec<ObjectId> = targets.iter().map(|_| doc.reserve_object_id()).collect();

    for (i, (&id, &target)) in items.iter().zip(targets).enumerate() {
        let mut item = Dictionary::from_iter(vec![
            (
                "Title",
                Object::String(format!("Item {}", i).into_bytes(), StringFormat::Literal),
            ),
            ("Parent", Object::Reference(root)),
            (
                "Dest",
                Object::Array(vec![
                    Object::Reference(pages[target]),
                    Object::Name(b"Fit".to_vec()),
                ]),
            ),
        ]);
        if i > 0 {
            item.set("Prev", Object::Reference(items[i - 1]));
        }
        if let Some(next) = items.get(i + 1) {
            item.set("Next", Object::Reference(*next));
        }
        doc.put_object(id, item);
    }

    let mut outlines = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Outlines".to_vec())),
        ("Count", Object::Integer(items.len() as i64)),
    ]);
    if let (Some(first), Some(last)) = (items.first(), items.last()) {
        outlines.set("First", Object::Reference(*first));
        outlines.set("Last", Object::Reference(*last));
    }
    doc.put_object(root, outlines);

    let catalog = doc.catalog_id().unwrap();
    doc.dict_mut(catalog)
        .unwrap()
        .set("Outlines", Object::Reference(root));
    items
}

fn root_font(doc: &PdfDocument) -> Object {
    let root = doc.pages_root_id().unwrap();
    let resources = doc.dict(root).unwrap().get(b"Resources").unwrap();
    doc.resolve_dict(resources).unwrap().get(b"Font").unwrap().clone()
}

/// Give `page` its own Resources: the inherited fonts plus `xobjects`.
fn set_page_xobjects(doc: &mut PdfDocument, page_idx: usize, xobjects: Dictionary) {
    let page = doc.page_ids().unwrap()[page_idx];
    let resources = Dictionary::from_iter(vec![
        ("Font", root_font(doc)),
        ("XObject", Object::Dictionary(xobjects)),
    ]);
    doc.dict_mut(page)
        .unwrap()
        .set("Resources", Object::Dictionary(resources));
}

fn new_image(doc: &mut PdfDocument) -> ObjectId {
    let dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(2)),
        ("Height", Object::Integer(2)),
        ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
    ]);
    doc.add_object(Stream::new(dict, vec![0xff; 12]))
}

/// One image object used by every page in `pages`.
pub fn add_shared_image(doc: &mut PdfDocument, pages: &[usize]) -> ObjectId {
    let image = new_image(doc);
    for &page in pages {
        set_page_xobjects(
            doc,
            page,
            Dictionary::from_iter(vec![("Im0", Object::Reference(image))]),
        );
    }
    image
}

/// A Form XObject drawn by `page_idx`. Its resources hold an image, or,
/// with `self_ref`, the form itself.
pub fn add_form_xobject(
    doc: &mut PdfDocument,
    page_idx: usize,
    self_ref: bool,
) -> (ObjectId, Option<ObjectId>) {
    let form = doc.reserve_object_id();
    let (inner, image) = if self_ref {
        (("Self", Object::Reference(form)), None)
    } else {
        let image = new_image(doc);
        (("Im1", Object::Reference(image)), Some(image))
    };
    let resources = Dictionary::from_iter(vec![(
        "XObject",
        Object::Dictionary(Dictionary::from_iter(vec![inner])),
    )]);
    let dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Form".to_vec())),
        ("BBox", rect(0, 0, 100, 100)),
        ("Resources", Object::Dictionary(resources)),
    ]);
    doc.put_object(form, Stream::new(dict, b"/Im1 Do".to_vec()));
    set_page_xobjects(
        doc,
        page_idx,
        Dictionary::from_iter(vec![("Fm0", Object::Reference(form))]),
    );
    (form, image)
}
