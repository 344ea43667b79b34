// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Randomized properties of the parser: it is a total function, the
//! recovered tree always has the documented shape, and error records
//! come out in source order.

mod util;

use std::collections::HashSet;

use hazel::{local_name, ns};
use hazel_rcdom::{Handle, NodeData, RcDom};
use proptest::prelude::*;

use util::{dump, parse};

/// Walk every node of the tree (including template contents),
/// invoking `f` on each.
fn walk(handle: &Handle, f: &mut impl FnMut(&Handle)) {
    f(handle);
    if let NodeData::Element {
        ref template_contents,
        ..
    } = handle.data
    {
        if let Some(contents) = template_contents.borrow().as_ref() {
            walk(contents, f);
        }
    }
    for child in handle.children.borrow().iter() {
        walk(child, f);
    }
}

fn document_invariants(dom: &RcDom) {
    // Root shape: the document has exactly one element child, named
    // html, in the HTML namespace.
    let elements: Vec<Handle> = dom
        .document
        .children
        .borrow()
        .iter()
        .filter(|n| matches!(n.data, NodeData::Element { .. }))
        .cloned()
        .collect();
    assert_eq!(elements.len(), 1, "expected exactly one root element");
    match elements[0].data {
        NodeData::Element { ref name, .. } => {
            assert_eq!(name.local, local_name!("html"));
            assert_eq!(name.ns, ns!(html));
        },
        _ => unreachable!(),
    }

    walk(&dom.document, &mut |node| {
        // Attribute uniqueness: (namespace, local) pairs never repeat
        // on one element.
        if let NodeData::Element { ref attrs, .. } = node.data {
            let mut seen = HashSet::new();
            for attr in attrs.borrow().iter() {
                assert!(
                    seen.insert((attr.name.ns.clone(), attr.name.local.clone())),
                    "duplicate attribute {:?}",
                    attr.name
                );
            }
        }

        // Text coalescing: no two adjacent text siblings.
        let children = node.children.borrow();
        for pair in children.windows(2) {
            assert!(
                !(matches!(pair[0].data, NodeData::Text { .. })
                    && matches!(pair[1].data, NodeData::Text { .. })),
                "adjacent text nodes"
            );
        }
    });

    // Errors are recorded in non-decreasing source order.
    let errors = dom.errors.borrow();
    for pair in errors.windows(2) {
        assert!(
            pair[0].position <= pair[1].position,
            "errors out of order: {} then {}",
            pair[0],
            pair[1]
        );
    }
}

/// Markup snippets the soup generator glues together. Deliberately
/// heavy on the constructs with interesting tree-construction rules.
static SNIPPETS: &[&str] = &[
    "<p>",
    "</p>",
    "<b>",
    "</b>",
    "<i>",
    "</i>",
    "<table>",
    "</table>",
    "<tr>",
    "<td>",
    "<template>",
    "</template>",
    "<svg>",
    "<math>",
    "<select>",
    "<li>",
    "<a href='x'>",
    "<!DOCTYPE html>",
    "<!-- c -->",
    "<![CDATA[x]]>",
    "&amp;",
    "&not",
    "&#x41;",
    "&#1114112;",
    "\n",
    "\t ",
    "text",
    "<",
    ">",
    "/",
    "=\"",
    "'",
];

/// A generator biased towards markup-shaped input: random snippets of
/// tags, text, references and punctuation glued together, with some
/// printable noise mixed in.
fn tag_soup() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        4 => proptest::sample::select(SNIPPETS).prop_map(str::to_string),
        1 => "[ -~]{0,8}",
    ];
    proptest::collection::vec(fragment, 0..24).prop_map(|v| v.concat())
}

proptest! {
    #[test]
    fn parsing_is_total_and_invariants_hold_on_soup(input in tag_soup()) {
        let dom = parse(&input);
        document_invariants(&dom);
    }

    #[test]
    fn parsing_is_total_and_invariants_hold_on_noise(input in "\\PC{0,64}") {
        let dom = parse(&input);
        document_invariants(&dom);
    }

    #[test]
    fn newline_flavors_build_the_same_tree(input in tag_soup()) {
        let lf = parse(&input);
        let crlf = parse(&input.replace('\n', "\r\n"));
        let cr = parse(&input.replace('\n', "\r"));
        prop_assert_eq!(dump(&lf.document), dump(&crlf.document));
        prop_assert_eq!(dump(&lf.document), dump(&cr.document));
    }
}
