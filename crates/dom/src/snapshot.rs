//! Deterministic renderings of a materialized subtree.
//!
//! - `DomSnapshot`: one line per node, indented, for test comparisons.
//! - `to_markup`: compact HTML-like serialization of the rendered content,
//!   with presentation styles written as a `style` attribute.
//! - `outline_from_dom`: capped, human-oriented outline for the CLI.

use crate::types::Node;
use std::fmt::{self, Write};

#[derive(Clone, Copy, Debug)]
pub struct DomSnapshotOptions {
    pub ignore_ids: bool,
}

impl Default for DomSnapshotOptions {
    fn default() -> Self {
        Self { ignore_ids: true }
    }
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(root: &Node, options: DomSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk_snapshot(root, &options, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

fn walk_snapshot(node: &Node, options: &DomSnapshotOptions, depth: usize, out: &mut Vec<String>) {
    const INDENT_STEP: usize = 2;
    let mut line = " ".repeat(depth * INDENT_STEP);
    write_node_line(&mut line, node, options);
    out.push(line);
    for child in node.children() {
        walk_snapshot(child, options, depth + 1, out);
    }
}

fn write_node_line(out: &mut String, node: &Node, options: &DomSnapshotOptions) {
    match node {
        Node::Document { doctype, id, .. } => {
            out.push_str("#document");
            if let Some(dt) = doctype {
                out.push_str(" doctype=\"");
                write_escaped(out, dt);
                out.push('"');
            }
            if !options.ignore_ids {
                let _ = write!(out, " id={}", id.0);
            }
        }
        Node::Element {
            id,
            name,
            attributes,
            style,
            ..
        } => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(attr);
                if let Some(value) = value {
                    out.push_str("=\"");
                    write_escaped(out, value);
                    out.push('"');
                }
            }
            if !options.ignore_ids {
                let _ = write!(out, " data-node-id=\"{}\"", id.0);
            }
            if !style.is_empty() {
                out.push_str(" style=[");
                for (i, (k, v)) in style.iter().enumerate() {
                    if i != 0 {
                        out.push_str("; ");
                    }
                    out.push_str(k);
                    out.push_str(": ");
                    write_escaped(out, v);
                }
                out.push(']');
            }
            out.push('>');
        }
        Node::Text { text, id } => {
            out.push('"');
            write_escaped(out, text);
            out.push('"');
            if !options.ignore_ids {
                let _ = write!(out, " id={}", id.0);
            }
        }
        Node::Comment { text, id } => {
            out.push_str("<!-- ");
            write_escaped(out, text);
            out.push_str(" -->");
            if !options.ignore_ids {
                let _ = write!(out, " id={}", id.0);
            }
        }
    }
}

fn write_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
}

/// Serialize `node` as markup. Styles are folded into a trailing `style`
/// attribute (`prop: value;` pairs), mirroring how they would render inline.
pub fn to_markup(node: &Node) -> String {
    let mut out = String::new();
    write_markup(&mut out, node);
    out
}

/// Serialize only the children of `node`.
pub fn inner_markup(node: &Node) -> String {
    let mut out = String::new();
    for child in node.children() {
        write_markup(&mut out, child);
    }
    out
}

fn write_markup(out: &mut String, node: &Node) {
    match node {
        Node::Document { children, .. } => {
            for c in children {
                write_markup(out, c);
            }
        }
        Node::Element {
            name,
            attributes,
            style,
            children,
            ..
        } => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(attr);
                if let Some(value) = value {
                    out.push_str("=\"");
                    escape_markup(out, value, true);
                    out.push('"');
                }
            }
            if !style.is_empty() {
                out.push_str(" style=\"");
                for (i, (k, v)) in style.iter().enumerate() {
                    if i != 0 {
                        out.push(' ');
                    }
                    escape_markup(out, k, true);
                    out.push_str(": ");
                    escape_markup(out, v, true);
                    out.push(';');
                }
                out.push('"');
            }
            out.push('>');
            for c in children {
                write_markup(out, c);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Text { text, .. } => escape_markup(out, text, false),
        Node::Comment { text, .. } => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn escape_markup(out: &mut String, value: &str, in_attribute: bool) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

pub fn first_styles(style: &[(String, String)]) -> String {
    let mut out = String::new();
    for (i, (k, v)) in style.iter().take(3).enumerate() {
        if i != 0 {
            out.push(' ');
        }
        let _ = write!(&mut out, r#"{k}: {v};"#);
    }
    out
}

/// Indented outline of at most `cap` nodes, with the first styles of each
/// element shown as a trailing comment.
pub fn outline_from_dom(root: &Node, cap: usize) -> Vec<String> {
    const INDENT_STEP: &str = "  ";
    const PREVIEW_CHARS: usize = 40;

    fn push_preview(out: &mut String, s: &str) {
        for (i, ch) in s.chars().enumerate() {
            if i == PREVIEW_CHARS {
                out.push('…');
                break;
            }
            out.push(if ch == '\n' { ' ' } else { ch });
        }
    }

    fn walk(node: &Node, indent: &mut String, out: &mut Vec<String>, left: &mut usize) {
        if *left == 0 {
            return;
        }
        *left -= 1;
        let mut line = indent.clone();
        match node {
            Node::Document { doctype, .. } => match doctype {
                Some(dt) => {
                    line.push_str("<!DOCTYPE ");
                    line.push_str(dt);
                    line.push('>');
                }
                None => line.push_str("#document"),
            },
            Node::Element { name, style, .. } => {
                line.push('<');
                line.push_str(name);
                if let Some(id) = node.attr("id").filter(|v| !v.is_empty()) {
                    let _ = write!(line, r#" id="{id}""#);
                }
                if let Some(class) = node.attr("class").filter(|v| !v.is_empty()) {
                    let _ = write!(line, r#" class="{class}""#);
                }
                line.push('>');
                let styl = first_styles(style);
                if !styl.is_empty() {
                    let _ = write!(line, "  /* {styl} */");
                }
            }
            Node::Text { text, .. } => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return;
                }
                line.push('"');
                push_preview(&mut line, trimmed);
                line.push('"');
            }
            Node::Comment { text, .. } => {
                line.push_str("<!-- ");
                push_preview(&mut line, text);
                line.push_str(" -->");
            }
        }
        out.push(line);
        indent.push_str(INDENT_STEP);
        for c in node.children() {
            walk(c, indent, out, left);
        }
        indent.truncate(indent.len() - INDENT_STEP.len());
    }

    let mut out = Vec::new();
    let mut left = cap;
    let mut indent = String::new();
    walk(root, &mut indent, &mut out, &mut left);
    out
}

#[cfg(test)]
mod tests {
    use super::{DomSnapshot, DomSnapshotOptions, inner_markup, outline_from_dom, to_markup};
    use crate::types::{Id, Node};
    use std::sync::Arc;

    fn text(t: &str) -> Node {
        Node::Text {
            id: Id(0),
            text: t.to_string(),
        }
    }

    fn sample() -> Node {
        Node::Document {
            id: Id(1),
            doctype: None,
            children: vec![Node::Element {
                id: Id(2),
                name: Arc::from("p"),
                attributes: vec![(Arc::from("class"), Some("msg".to_string()))],
                style: vec![("color".to_string(), "red".to_string())],
                children: vec![text("a < b"), text("\"q\"")],
            }],
        }
    }

    #[test]
    fn snapshot_lines_are_indented_and_escaped() {
        let snapshot = DomSnapshot::new(&sample(), DomSnapshotOptions::default());
        assert_eq!(
            snapshot.as_lines(),
            [
                "#document",
                r#"  <p class="msg" style=[color: red]>"#,
                r#"    "a < b""#,
                r#"    "\"q\"""#,
            ]
        );
    }

    #[test]
    fn markup_folds_style_into_attribute() {
        let doc = sample();
        assert_eq!(
            to_markup(&doc),
            r#"<p class="msg" style="color: red;">a &lt; b"q"</p>"#
        );
        assert_eq!(inner_markup(&doc.children()[0]), r#"a &lt; b"q""#);
    }

    #[test]
    fn outline_respects_cap() {
        let lines = outline_from_dom(&sample(), 2);
        assert_eq!(lines, ["#document", r#"  <p class="msg">  /* color: red; */"#]);
    }
}
