//! Synthetic documents shared by the integration tests.

#![allow(dead_code)]

use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, ObjectId, Stream};
use pdfgraft_core::PdfDocument;

fn media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ])
}

fn label_content(text: String) -> Vec<u8> {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
            ),
            Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
            Operation::new(
                "Tj",
                vec![Object::String(text.into_bytes(), lopdf::StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ],
    };
    content.encode().unwrap()
}

fn add_labeled_page(doc: &mut Document, parent: ObjectId, font_id: ObjectId, text: String) -> ObjectId {
    let content_id = doc.add_object(Stream::new(Dictionary::new(), label_content(text)));
    let resources = Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]);
    let page = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(parent)),
        ("MediaBox", media_box()),
        ("Resources", Object::Dictionary(resources)),
        ("Contents", Object::Reference(content_id)),
    ]);
    doc.add_object(page)
}

fn add_font(doc: &mut Document) -> ObjectId {
    doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]))
}

fn pages_node(parent: Option<ObjectId>, kids: &[ObjectId], count: usize) -> Dictionary {
    let mut node = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(count as i64)),
        (
            "Kids",
            Object::Array(kids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    if let Some(parent) = parent {
        node.set("Parent", Object::Reference(parent));
    }
    node
}

fn finish(mut doc: Document, pages_id: ObjectId) -> PdfDocument {
    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));
    PdfDocument::from_lopdf(doc)
}

/// Create a synthetic document whose page `i` shows `"{prefix} {i}"`.
pub fn synthetic_document(num_pages: usize, content_prefix: &str) -> PdfDocument {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = add_font(&mut doc);

    let page_ids: Vec<ObjectId> = (0..num_pages)
        .map(|i| add_labeled_page(&mut doc, pages_id, font_id, format!("{} {}", content_prefix, i)))
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(pages_node(None, &page_ids, num_pages)),
    );
    finish(doc, pages_id)
}

/// Like [`synthetic_document`], but the root holds one intermediate node per
/// entry of `groups`, each with that many pages. Labels run across groups.
pub fn synthetic_nested_document(groups: &[usize], content_prefix: &str) -> PdfDocument {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = add_font(&mut doc);

    let mut label = 0;
    let mut nodes = Vec::new();
    for &size in groups {
        let node_id = doc.new_object_id();
        let kids: Vec<ObjectId> = (0..size)
            .map(|_| {
                label += 1;
                add_labeled_page(&mut doc, node_id, font_id, format!("{} {}", content_prefix, label - 1))
            })
            .collect();
        doc.objects.insert(
            node_id,
            Object::Dictionary(pages_node(Some(pages_id), &kids, size)),
        );
        nodes.push(node_id);
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(pages_node(None, &nodes, label)),
    );
    finish(doc, pages_id)
}

/// Text drawn by the `Tj` operator of each page, in page order.
pub fn labels(doc: &PdfDocument) -> Vec<String> {
    doc.page_ids()
        .unwrap()
        .into_iter()
        .map(|id| {
            let contents = doc.dict(id).unwrap().get(b"Contents").unwrap();
            let stream = doc.resolve(contents).unwrap().as_stream().unwrap();
            let bytes = if stream.dict.has(b"Filter") {
                stream.decompressed_content().unwrap()
            } else {
                stream.content.clone()
            };
            let content = Content::decode(&bytes).unwrap();
            content
                .operations
                .iter()
                .find(|op| op.operator == "Tj")
                .and_then(|op| op.operands.first())
                .and_then(|text| text.as_str().ok())
                .map(|text| String::from_utf8_lossy(text).into_owned())
                .unwrap()
        })
        .collect()
}

fn append_annot(doc: &mut PdfDocument, page: ObjectId, annot: Dictionary) -> ObjectId {
    let id = doc.add_object(annot);
    let page_dict = doc.dict_mut(page).unwrap();
    match page_dict.get_mut(b"Annots") {
        Ok(Object::Array(arr)) => arr.push(Object::Reference(id)),
        _ => page_dict.set("Annots", Object::Array(vec![Object::Reference(id)])),
    }
    id
}

pub fn add_goto_link(doc: &mut PdfDocument, from_page: usize, to_page: usize) -> ObjectId {
    let pages = doc.page_ids().unwrap();
    let annot = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Annot".to_vec())),
        ("Subtype", Object::Name(b"Link".to_vec())),
        ("Rect", media_box()),
        (
            "Dest",
            Object::Array(vec![
                Object::Reference(pages[to_page]),
                Object::Name(b"XYZ".to_vec()),
                Object::Integer(0),
                Object::Integer(792),
                Object::Integer(0),
            ]),
        ),
    ]);
    append_annot(doc, pages[from_page], annot)
}

/// Single-level outline, one item per target page, linked through /Next.
pub fn add_outline(doc: &mut PdfDocument, targets: &[usize]) -> Vec<ObjectId> {
    let pages = doc.page_ids().unwrap();
    let root = doc.reserve_object_id();
    let items: Vec<ObjectId> = targets.iter().map(|_| doc.reserve_object_id()).collect();
    for (i, &target) in targets.iter().enumerate() {
        let mut item = Dictionary::from_iter(vec![
            ("Title", Object::string_literal(format!("Section {}", i))),
            ("Parent", Object::Reference(root)),
            (
                "Dest",
                Object::Array(vec![
                    Object::Reference(pages[target]),
                    Object::Name(b"Fit".to_vec()),
                ]),
            ),
        ]);
        if let Some(next) = items.get(i + 1) {
            item.set("Next", Object::Reference(*next));
        }
        doc.put_object(items[i], item);
    }
    let mut outlines = Dictionary::from_iter(vec![("Type", Object::Name(b"Outlines".to_vec()))]);
    if let Some(first) = items.first() {
        outlines.set("First", Object::Reference(*first));
    }
    doc.put_object(root, outlines);
    let catalog = doc.catalog_id().unwrap();
    doc.dict_mut(catalog)
        .unwrap()
        .set("Outlines", Object::Reference(root));
    items
}

fn xobject_resources(doc: &PdfDocument, page: ObjectId) -> Dictionary {
    let mut resources = doc
        .dict(page)
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap()
        .clone();
    if !resources.has(b"XObject") {
        resources.set("XObject", Object::Dictionary(Dictionary::new()));
    }
    resources
}

/// Add the same image to each page in `pages`; returns the image id.
pub fn share_image(doc: &mut PdfDocument, pages: &[usize]) -> ObjectId {
    let image = doc.add_object(Stream::new(
        Dictionary::from_iter(vec![
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(1)),
            ("Height", Object::Integer(1)),
            ("ColorSpace", Object::Name(b"DeviceGray".to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
        ]),
        vec![0x80],
    ));
    let ids = doc.page_ids().unwrap();
    for &p in pages {
        let mut resources = xobject_resources(doc, ids[p]);
        if let Ok(Object::Dictionary(x)) = resources.get_mut(b"XObject") {
            x.set("Im0", Object::Reference(image));
        }
        doc.dict_mut(ids[p])
            .unwrap()
            .set("Resources", Object::Dictionary(resources));
    }
    image
}

/// Make page `page` use an indirect resource dictionary that reaches itself
/// through a Form XObject.
pub fn self_referencing_resources(doc: &mut PdfDocument, page: usize) -> ObjectId {
    let page_id = doc.page_ids().unwrap()[page];
    let res_id = doc.reserve_object_id();
    let form = doc.add_object(Stream::new(
        Dictionary::from_iter(vec![
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Form".to_vec())),
            (
                "BBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(10),
                    Object::Integer(10),
                ]),
            ),
            ("Resources", Object::Reference(res_id)),
        ]),
        b"/Fm0 Do".to_vec(),
    ));
    let mut resources = xobject_resources(doc, page_id);
    if let Ok(Object::Dictionary(x)) = resources.get_mut(b"XObject") {
        x.set("Fm0", Object::Reference(form));
    }
    doc.put_object(res_id, resources);
    doc.dict_mut(page_id)
        .unwrap()
        .set("Resources", Object::Reference(res_id));
    res_id
}
