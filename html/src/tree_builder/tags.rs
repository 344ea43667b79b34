// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Fixed categories of element names: the scope definitions, the
//! "special" set, the implied-end-tag sets, and the integration-point
//! predicates.

use hazel_markup::{ns, ExpandedName};

/// The scope variants of the standard. Each is a predicate over the
/// stack of open elements: walking from the top, a search for some
/// target stops (fails) at the first element the scope names.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum Scope {
    Default,
    ListItem,
    Button,
    Table,
    Select,
}

impl Scope {
    /// Does an element with this name end the search?
    pub(crate) fn ends_search_at(self, name: ExpandedName) -> bool {
        match self {
            Scope::Default => in_default_scope_set(name),
            Scope::ListItem => {
                in_default_scope_set(name)
                    || (*name.ns == ns!(html) && matches!(&**name.local, "ol" | "ul"))
            },
            Scope::Button => {
                in_default_scope_set(name)
                    || (*name.ns == ns!(html) && &**name.local == "button")
            },
            Scope::Table => {
                *name.ns == ns!(html) && matches!(&**name.local, "html" | "table" | "template")
            },
            // Select scope is the inverted one: everything stops the
            // search except optgroup and option.
            Scope::Select => {
                !(*name.ns == ns!(html) && matches!(&**name.local, "optgroup" | "option"))
            },
        }
    }
}

fn in_default_scope_set(name: ExpandedName) -> bool {
    match *name.ns {
        ns!(html) => matches!(
            &**name.local,
            "applet" | "caption" | "html" | "table" | "td" | "th" | "marquee" | "object"
                | "template"
        ),
        ns!(mathml) => matches!(
            &**name.local,
            "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml"
        ),
        ns!(svg) => matches!(&**name.local, "foreignObject" | "desc" | "title"),
        _ => false,
    }
}

/// <https://html.spec.whatwg.org/#special>
pub(crate) fn is_special(name: ExpandedName) -> bool {
    match *name.ns {
        ns!(html) => matches!(
            &**name.local,
            "address" | "applet" | "area" | "article" | "aside" | "base" | "basefont" | "bgsound"
                | "blockquote" | "body" | "br" | "button" | "caption" | "center" | "col"
                | "colgroup" | "dd" | "details" | "dir" | "div" | "dl" | "dt" | "embed"
                | "fieldset" | "figcaption" | "figure" | "footer" | "form" | "frame" | "frameset"
                | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "head" | "header" | "hgroup" | "hr"
                | "html" | "iframe" | "img" | "input" | "keygen" | "li" | "link" | "listing"
                | "main" | "marquee" | "menu" | "meta" | "nav" | "noembed" | "noframes"
                | "noscript" | "object" | "ol" | "p" | "param" | "plaintext" | "pre" | "script"
                | "search" | "section" | "select" | "source" | "style" | "summary" | "table"
                | "tbody" | "td" | "template" | "textarea" | "tfoot" | "th" | "thead" | "title"
                | "tr" | "track" | "ul" | "wbr" | "xmp"
        ),
        ns!(mathml) => matches!(
            &**name.local,
            "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml"
        ),
        ns!(svg) => matches!(&**name.local, "foreignObject" | "desc" | "title"),
        _ => false,
    }
}

/// The elements closed by "generate implied end tags".
pub(crate) fn is_implied_end(name: ExpandedName) -> bool {
    *name.ns == ns!(html)
        && matches!(
            &**name.local,
            "dd" | "dt" | "li" | "optgroup" | "option" | "p" | "rb" | "rp" | "rt" | "rtc"
        )
}

/// The larger set used by "generate all implied end tags thoroughly".
pub(crate) fn is_thorough_implied_end(name: ExpandedName) -> bool {
    is_implied_end(name)
        || (*name.ns == ns!(html)
            && matches!(
                &**name.local,
                "caption" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead" | "tr"
            ))
}

pub(crate) fn is_heading(name: ExpandedName) -> bool {
    *name.ns == ns!(html) && matches!(&**name.local, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// The table-ish elements whose content gets foster-parented.
pub(crate) fn fosters_children(name: ExpandedName) -> bool {
    *name.ns == ns!(html)
        && matches!(&**name.local, "table" | "tbody" | "tfoot" | "thead" | "tr")
}

/// <https://html.spec.whatwg.org/#mathml-text-integration-point>
pub(crate) fn is_mathml_text_integration_point(name: ExpandedName) -> bool {
    *name.ns == ns!(mathml) && matches!(&**name.local, "mi" | "mo" | "mn" | "ms" | "mtext")
}

/// The SVG side of <https://html.spec.whatwg.org/#html-integration-point>.
/// MathML `annotation-xml` also qualifies depending on its `encoding`
/// attribute, which the sink answers for.
pub(crate) fn is_svg_html_integration_point(name: ExpandedName) -> bool {
    *name.ns == ns!(svg) && matches!(&**name.local, "foreignObject" | "desc" | "title")
}

#[cfg(test)]
mod test {
    use super::*;
    use hazel_markup::{LocalName, Namespace};

    fn name(ns: Namespace, local: &str) -> (Namespace, LocalName) {
        (ns, LocalName::from(local))
    }

    #[test]
    fn scopes_nest() {
        let (ns, table) = name(ns!(html), "table");
        let table = ExpandedName { ns: &ns, local: &table };
        assert!(Scope::Default.ends_search_at(table));
        assert!(Scope::Button.ends_search_at(table));

        let (ns, button) = name(ns!(html), "button");
        let button = ExpandedName { ns: &ns, local: &button };
        assert!(Scope::Button.ends_search_at(button));
        assert!(!Scope::Default.ends_search_at(button));
    }

    #[test]
    fn select_scope_is_inverted() {
        let (ns, option) = name(ns!(html), "option");
        let option = ExpandedName { ns: &ns, local: &option };
        assert!(!Scope::Select.ends_search_at(option));

        let (ns, div) = name(ns!(html), "div");
        let div = ExpandedName { ns: &ns, local: &div };
        assert!(Scope::Select.ends_search_at(div));
        assert!(!Scope::Default.ends_search_at(div));
    }

    #[test]
    fn integration_points_terminate_default_scope() {
        let (ns, mi) = name(ns!(mathml), "mi");
        let mi = ExpandedName { ns: &ns, local: &mi };
        assert!(Scope::Default.ends_search_at(mi));
        assert!(is_special(mi));
        assert!(is_mathml_text_integration_point(mi));

        let (ns, fo) = name(ns!(svg), "foreignObject");
        let fo = ExpandedName { ns: &ns, local: &fo };
        assert!(Scope::Default.ends_search_at(fo));
        assert!(is_special(fo));
        assert!(is_svg_html_integration_point(fo));
    }
}
