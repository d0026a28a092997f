//! HTML → Markdown for the about sections.
//!
//! Covers the tag set that actually appears there: headings, paragraphs,
//! lists, emphasis, links, code, breaks. Everything else falls through
//! to its text content.

use super::{Document, ElementRef};

/// Convert an HTML fragment to Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let doc = Document::parse(html);
    let mut out = String::new();
    for root in doc.find_all(|el| el.parent().is_none()) {
        render_block(root, &mut out, 0);
    }
    // Root-level bare text (fragments without a wrapping element).
    if out.is_empty() {
        out = doc.text();
    }
    collapse_blank_lines(out.trim())
}

fn render_block(el: ElementRef<'_>, out: &mut String, list_depth: usize) {
    match el.tag() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = el.tag().as_bytes()[1] - b'0';
            ensure_blank_line(out);
            for _ in 0..level {
                out.push('#');
            }
            out.push(' ');
            out.push_str(&inline_text(el));
            out.push_str("\n\n");
        }
        "p" | "div" | "section" | "article" => {
            let has_block_children = el
                .children_elements()
                .iter()
                .any(|child| is_block(child.tag()));
            if has_block_children {
                for child in el.children_elements() {
                    render_block(child, out, list_depth);
                }
            } else {
                let text = inline_text(el);
                if !text.is_empty() {
                    ensure_blank_line(out);
                    out.push_str(&text);
                    out.push_str("\n\n");
                }
            }
        }
        "ul" => {
            ensure_blank_line(out);
            for item in el.descendants_with_tag("li") {
                push_list_item(out, list_depth, "-", &inline_text(item));
            }
            out.push('\n');
        }
        "ol" => {
            ensure_blank_line(out);
            for (position, item) in el.descendants_with_tag("li").iter().enumerate() {
                push_list_item(out, list_depth, &format!("{}.", position + 1), &inline_text(*item));
            }
            out.push('\n');
        }
        "br" => out.push('\n'),
        "hr" => {
            ensure_blank_line(out);
            out.push_str("---\n\n");
        }
        _ => {
            let text = inline_text(el);
            if !text.is_empty() {
                ensure_blank_line(out);
                out.push_str(&text);
                out.push_str("\n\n");
            }
        }
    }
}

fn push_list_item(out: &mut String, depth: usize, marker: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(marker);
    out.push(' ');
    out.push_str(text);
    out.push('\n');
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "section"
            | "article"
            | "ul"
            | "ol"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
    )
}

/// Render an element's subtree as one line of Markdown inline content.
fn inline_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    render_inline(el, &mut out);
    normalize_spaces(&out)
}

fn render_inline(el: ElementRef<'_>, out: &mut String) {
    for child in el.children_nodes() {
        match child {
            super::ChildNode::Text(text) => out.push_str(text),
            super::ChildNode::Element(child) => match child.tag() {
                "strong" | "b" => {
                    out.push_str("**");
                    render_inline(child, out);
                    out.push_str("**");
                }
                "em" | "i" => {
                    out.push('*');
                    render_inline(child, out);
                    out.push('*');
                }
                "code" => {
                    out.push('`');
                    render_inline(child, out);
                    out.push('`');
                }
                "a" => {
                    let mut label = String::new();
                    render_inline(child, &mut label);
                    match child.attr("href") {
                        Some(href) if !href.is_empty() => {
                            out.push('[');
                            out.push_str(label.trim());
                            out.push_str("](");
                            out.push_str(href);
                            out.push(')');
                        }
                        _ => out.push_str(&label),
                    }
                }
                "br" => out.push(' '),
                _ => render_inline(child, out),
            },
        }
    }
}

fn normalize_spaces(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}

fn collapse_blank_lines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            out.push_str(line.trim_end());
            out.push('\n');
            blank_run = 0;
        }
    }
    out.trim_end().to_string()
}

fn ensure_blank_line(out: &mut String) {
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}
