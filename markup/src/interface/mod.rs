// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Types for tag and attribute names, source positions, and parse
//! error records.

use std::borrow::Cow;
use std::fmt;

use tendril::StrTendril;

pub use self::tree_builder::{create_element, ElemName, ElementFlags, NodeOrText, Tracer, TreeSink};
pub use self::tree_builder::{AppendNode, AppendText};
pub use self::tree_builder::{LimitedQuirks, NoQuirks, Quirks, QuirksMode};

use crate::{LocalName, Namespace, Prefix};

/// A fully qualified name (with a namespace), used to depict names of
/// tags and attributes.
///
/// Namespaces can be used to differentiate between similar XML
/// fragments. For example:
///
/// ```text
/// // HTML
/// <table>
///   <tr>
///     <td>Apples</td>
///     <td>Bananas</td>
///   </tr>
/// </table>
///
/// // Furniture XML
/// <table>
///   <name>African Coffee Table</name>
///   <width>80</width>
///   <length>120</length>
/// </table>
/// ```
///
/// Without namespaces, the two `<table>`s above cannot be
/// distinguished; with a declared prefix (`<furn:table>`) the prefix
/// resolves to a namespace url and the names compare unequal.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
pub struct QualName {
    /// The prefix the name was written with, if any. Two names with
    /// different prefixes but the same namespace url are the same name.
    pub prefix: Option<Prefix>,
    /// The namespace url, resolved from the prefix.
    pub ns: Namespace,
    /// The local part of the name.
    pub local: LocalName,
}

impl QualName {
    /// Basic constructor.
    #[inline]
    pub fn new(prefix: Option<Prefix>, ns: Namespace, local: LocalName) -> QualName {
        QualName { prefix, ns, local }
    }

    /// Take a reference of this name's namespace and local name, for
    /// comparisons and pattern matching.
    #[inline]
    pub fn expanded(&self) -> ExpandedName {
        ExpandedName {
            ns: &self.ns,
            local: &self.local,
        }
    }
}

/// A name with a namespace, by reference. What a [`QualName`] is to an
/// element, an `ExpandedName` is to a match against one: the prefix is
/// ignored, only `(namespace, local)` matter.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName<'a> {
    pub ns: &'a Namespace,
    pub local: &'a LocalName,
}

impl fmt::Debug for ExpandedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}:{}", self.ns, self.local)
        }
    }
}

/// Construct an [`ExpandedName`] from namespace prefix and local name
/// literals. Usable in both expression and pattern position:
///
/// ```
/// # #[macro_use] extern crate hazel_markup;
/// # fn main() {
/// let name = expanded_name!(html "div");
/// assert!(matches!(name, expanded_name!(html "div")));
/// # }
/// ```
#[macro_export]
macro_rules! expanded_name {
    ("", $local:tt) => {
        $crate::ExpandedName {
            ns: &$crate::ns!(),
            local: &$crate::local_name!($local),
        }
    };
    ($ns:ident $local:tt) => {
        $crate::ExpandedName {
            ns: &$crate::ns!($ns),
            local: &$crate::local_name!($local),
        }
    };
}

/// A tag attribute, e.g. `class="test"` in `<div class="test" ...>`.
///
/// The namespace on the attribute name is almost always ns!("").
/// The tokenizer creates all attributes this way, but the tree
/// builder will adjust certain attribute names inside foreign
/// content (MathML, SVG).
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct Attribute {
    /// The name of the attribute (e.g. the `class` in `<div class="test">`)
    pub name: QualName,
    /// The value of the attribute (e.g. the `"test"` in `<div class="test">`)
    pub value: StrTendril,
}

/// A (line, column) cursor into the source text, 1-based.
///
/// Lines are counted after newline normalization; a LF advances the
/// line and resets the column, every other scalar advances the column.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Debug)]
pub struct Position {
    pub line: u64,
    pub column: u64,
}

impl Position {
    /// The position of the first character of the input.
    #[inline]
    pub fn start() -> Position {
        Position { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A recoverable deviation from well-formed HTML, recorded with the
/// source position it was detected at.
///
/// Parsing never stops for these; the sink accumulates them and the
/// recovered tree is always produced.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ParseError {
    /// What went wrong. A static description in the common case; with
    /// `exact_errors` enabled the parser produces more detailed,
    /// allocated messages.
    pub message: Cow<'static, str>,
    /// Where the deviation was detected.
    pub position: Position,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

// Declared after `expanded_name!` so the tree interface can use the
// macro unqualified.
pub mod tree_builder;

#[cfg(test)]
mod tests {
    use super::{Position, QualName};
    use crate::{LocalName, Namespace};

    #[test]
    fn ns_macro() {
        assert_eq!(ns!(), Namespace::from(""));

        assert_eq!(ns!(html), Namespace::from("http://www.w3.org/1999/xhtml"));
        assert_eq!(ns!(xml), Namespace::from("http://www.w3.org/XML/1998/namespace"));
        assert_eq!(ns!(xmlns), Namespace::from("http://www.w3.org/2000/xmlns/"));
        assert_eq!(ns!(xlink), Namespace::from("http://www.w3.org/1999/xlink"));
        assert_eq!(ns!(svg), Namespace::from("http://www.w3.org/2000/svg"));
        assert_eq!(ns!(mathml), Namespace::from("http://www.w3.org/1998/Math/MathML"));
    }

    #[test]
    fn qualname() {
        assert_eq!(
            QualName::new(None, ns!(), local_name!("")),
            QualName {
                prefix: None,
                ns: ns!(),
                local: LocalName::from("")
            }
        );
        assert_eq!(
            QualName::new(None, ns!(xml), local_name!("base")),
            QualName {
                prefix: None,
                ns: ns!(xml),
                local: local_name!("base")
            }
        );
    }

    #[test]
    fn expanded_name_matches() {
        let name = QualName::new(None, ns!(html), local_name!("template"));
        assert!(matches!(name.expanded(), expanded_name!(html "template")));
        assert!(!matches!(name.expanded(), expanded_name!(svg "template")));
    }

    #[test]
    fn positions_order() {
        let early = Position { line: 1, column: 9 };
        let late = Position { line: 2, column: 1 };
        assert!(early < late);
        assert_eq!(Position::start().to_string(), "1:1");
    }
}
