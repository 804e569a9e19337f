use dom::{DomPatch, PatchKey, Session, TreeCapability};
use dom_test_support::{PageBuilder, assert_lines_eq, snapshot_lines};

const SCRIPT: &str = r#"[
  [
    { "op": "create_document", "key": 1 },
    { "op": "create_element", "key": 2, "name": "body" },
    { "op": "append_child", "parent": 1, "child": 2 },
    { "op": "create_element", "key": 3, "name": "div",
      "attributes": [["class", "V6_4-message V6_4-bot-message"]] },
    { "op": "append_child", "parent": 2, "child": 3 }
  ],
  [
    { "op": "create_element", "key": 4, "name": "p" },
    { "op": "create_text", "key": 5, "text": "hello" },
    { "op": "append_child", "parent": 4, "child": 5 },
    { "op": "append_child", "parent": 3, "child": 4 }
  ]
]"#;

#[test]
fn json_script_replays_into_session() {
    let batches: Vec<Vec<DomPatch>> = serde_json::from_str(SCRIPT).unwrap();
    assert_eq!(batches.len(), 2);

    let mut session = Session::new();
    for batch in &batches {
        session.apply(batch).unwrap();
    }
    let tree = session.tree();
    assert_eq!(tree.root(), Some(PatchKey(1)));
    assert_lines_eq(
        &[
            "#document",
            "  <body>",
            r#"    <div class="V6_4-message V6_4-bot-message">"#,
            "      <p>",
            r#"        "hello""#,
        ],
        &snapshot_lines(tree, PatchKey(1)),
    );
}

#[test]
fn page_builder_batches_serialize_as_tagged_ops() {
    let mut page = PageBuilder::new();
    let body = page.element(page.root(), "body", &[]);
    page.text(body, "hi");
    let batch = page.take_batch();
    let json = serde_json::to_value(&batch).unwrap();
    assert_eq!(json[0]["op"], "create_document");
    assert_eq!(json[1]["op"], "create_element");
    assert_eq!(json[1]["name"], "body");
    assert_eq!(json[2]["op"], "append_child");
}

#[test]
fn moved_subtree_keeps_its_keys() {
    let mut page = PageBuilder::new();
    let body = page.element(page.root(), "body", &[]);
    let left = page.element(body, "section", &[]);
    let right = page.element(body, "aside", &[]);
    let p = page.element(left, "p", &[]);
    page.text(p, "moving");
    let mut session = Session::new();
    session.apply(&page.take_batch()).unwrap();

    page.remove(p);
    page.append(right, p);
    session.apply(&page.take_batch()).unwrap();

    let tree = session.tree();
    assert_eq!(tree.parent(p), Some(right));
    assert!(tree.children(left).is_empty());
    assert_eq!(tree.text_content(p), "moving");
}
