// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Helpers shared by the integration tests: parsing entry points and
//! a compact tree-outline dump to assert against.

// Not every test crate uses every helper.
#![allow(dead_code)]

use hazel::tendril::TendrilSink;
use hazel::{local_name, ns, parse_document, parse_fragment, LocalName, QualName};
use hazel_rcdom::{Handle, NodeData, RcDom};

pub fn parse(input: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(input)
}

pub fn parse_frag(context: LocalName, input: &str) -> RcDom {
    parse_fragment(
        RcDom::default(),
        Default::default(),
        QualName::new(None, ns!(html), context),
        vec![],
        false,
    )
    .one(input)
}

/// Render the tree as an indented outline, one node per line:
///
/// ```text
/// <!DOCTYPE html>
/// <html>
///   <head>
///   <body>
///     <p>
///       "hi"
/// ```
///
/// Elements outside the HTML namespace get a prefix (`<svg g>`), and
/// attributes are listed after the name, sorted. A template's contents
/// appear under a `content` line, as a separate subtree.
pub fn dump(handle: &Handle) -> String {
    let mut out = String::new();
    for child in handle.children.borrow().iter() {
        dump_node(child, 0, &mut out);
    }
    out
}

fn dump_node(handle: &Handle, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    match handle.data {
        NodeData::Document => out.push_str("#document\n"),

        NodeData::Doctype { ref name, .. } => {
            out.push_str(&format!("<!DOCTYPE {name}>\n"));
        },

        NodeData::Text { ref contents } => {
            out.push_str(&format!("\"{}\"\n", contents.borrow()));
        },

        NodeData::Comment { ref contents } => {
            out.push_str(&format!("<!-- {contents} -->\n"));
        },

        NodeData::Element {
            ref name,
            ref attrs,
            ref template_contents,
            ..
        } => {
            out.push('<');
            match name.ns {
                ns!(svg) => out.push_str("svg "),
                ns!(mathml) => out.push_str("math "),
                _ => (),
            }
            out.push_str(&name.local);

            let mut attrs = attrs.borrow().clone();
            attrs.sort_by(|x, y| x.name.local.cmp(&y.name.local));
            for attr in attrs {
                out.push(' ');
                match attr.name.ns {
                    ns!(xlink) => out.push_str("xlink "),
                    ns!(xml) => out.push_str("xml "),
                    ns!(xmlns) => out.push_str("xmlns "),
                    _ => (),
                }
                out.push_str(&format!("{}=\"{}\"", attr.name.local, attr.value));
            }
            out.push_str(">\n");

            if let Some(contents) = template_contents.borrow().as_ref() {
                for _ in 0..depth + 1 {
                    out.push_str("  ");
                }
                out.push_str("content\n");
                for child in contents.children.borrow().iter() {
                    dump_node(child, depth + 2, out);
                }
            }

            for child in handle.children.borrow().iter() {
                dump_node(child, depth + 1, out);
            }
        },
    }
}

/// Find the `body` element of a parsed document.
pub fn body(dom: &RcDom) -> Handle {
    let document = dom.document.clone();
    let html = child_elem(&document, &local_name!("html")).expect("no html root");
    child_elem(&html, &local_name!("body")).expect("no body")
}

/// Find the `head` element of a parsed document.
pub fn head(dom: &RcDom) -> Handle {
    let document = dom.document.clone();
    let html = child_elem(&document, &local_name!("html")).expect("no html root");
    child_elem(&html, &local_name!("head")).expect("no head")
}

fn child_elem(parent: &Handle, name: &LocalName) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| match child.data {
            NodeData::Element { name: ref n, .. } => &n.local == name,
            _ => false,
        })
        .cloned()
}
