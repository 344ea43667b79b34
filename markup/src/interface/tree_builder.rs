// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The interface through which the tree builder grows a tree.
//!
//! The parser does not commit to a tree representation; it talks to a
//! [`TreeSink`] in terms of opaque handles. A sink is a translator: it
//! never rejects an operation.

use std::borrow::Cow;
use std::fmt::Debug;

use tendril::StrTendril;

pub use self::QuirksMode::{LimitedQuirks, NoQuirks, Quirks};

use super::{Attribute, ExpandedName, Position, QualName};
use crate::{LocalName, Namespace};

/// Something which can be inserted into the DOM.
///
/// Adjacent sibling text nodes are merged into a single node, so when
/// the parser inserts a character run it hands the sink `AppendText`
/// and lets the sink decide whether to grow the previous text node or
/// create a new one.
pub enum NodeOrText<Handle> {
    AppendNode(Handle),
    AppendText(StrTendril),
}

pub use self::NodeOrText::{AppendNode, AppendText};

/// A document's quirks mode, set by the doctype in the Initial
/// insertion mode. Influences a few tree-construction decisions
/// (notably whether `<table>` closes an open `<p>`).
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum QuirksMode {
    /// Full quirks mode
    Quirks,
    /// Almost standards mode
    LimitedQuirks,
    /// Standards mode
    NoQuirks,
}

/// Special properties of an element, useful for tagging elements with
/// this information while creating them.
#[derive(Default)]
pub struct ElementFlags {
    /// A document fragment should be created, associated with the
    /// element, and returned by [`TreeSink::get_template_contents`].
    ///
    /// This is only used by HTML `<template>` elements.
    pub template: bool,

    /// This boolean should be recorded with the element and returned
    /// from [`TreeSink::is_mathml_annotation_xml_integration_point`].
    ///
    /// This is only used by MathML `<annotation-xml>` elements whose
    /// `encoding` attribute is `text/html` or `application/xhtml+xml`.
    pub mathml_annotation_xml_integration_point: bool,

    // Prevent construction from outside module, so that adding fields
    // is not a breaking change.
    _private: (),
}

/// A constructor for an element, filling in [`ElementFlags`] from the
/// name and attributes per the "create an element for a token" steps.
///
/// Tree builders call this rather than [`TreeSink::create_element`]
/// directly.
pub fn create_element<Sink>(sink: &Sink, name: QualName, attrs: Vec<Attribute>) -> Sink::Handle
where
    Sink: TreeSink,
{
    let mut flags = ElementFlags::default();
    match name.expanded() {
        expanded_name!(html "template") => flags.template = true,
        expanded_name!(mathml "annotation-xml") => {
            flags.mathml_annotation_xml_integration_point = attrs.iter().any(|attr| {
                attr.name.expanded() == expanded_name!("", "encoding")
                    && (attr.value.eq_ignore_ascii_case("text/html")
                        || attr.value.eq_ignore_ascii_case("application/xhtml+xml"))
            })
        },
        _ => {},
    }
    sink.create_element(name, attrs, flags)
}

/// An element's name, abstracted over the sink's representation of it.
pub trait ElemName: Debug {
    fn ns(&self) -> &Namespace;
    fn local_name(&self) -> &LocalName;

    #[inline]
    fn expanded(&self) -> ExpandedName {
        ExpandedName {
            ns: self.ns(),
            local: self.local_name(),
        }
    }
}

impl ElemName for ExpandedName<'_> {
    #[inline]
    fn ns(&self) -> &Namespace {
        self.ns
    }

    #[inline]
    fn local_name(&self) -> &LocalName {
        self.local
    }
}

impl ElemName for &QualName {
    #[inline]
    fn ns(&self) -> &Namespace {
        &self.ns
    }

    #[inline]
    fn local_name(&self) -> &LocalName {
        &self.local
    }
}

/// Methods a parse tree provides to the tree builder.
///
/// The default implementations for the optional methods are no-ops;
/// sinks that do not care about scripts, forms or positions need not
/// override them.
pub trait TreeSink {
    /// `Handle` is a reference to a DOM node. The tree builder requires
    /// that a `Handle` implements `Clone` to get another reference to
    /// the same node.
    type Handle: Clone;

    /// The overall result of parsing.
    type Output;

    /// The sink's representation of an element's name.
    type ElemName<'a>: ElemName
    where
        Self: 'a;

    /// Consume this sink and return the overall result of parsing.
    fn finish(self) -> Self::Output;

    /// Signal a parse error. The position last given to
    /// [`set_current_position`](TreeSink::set_current_position)
    /// applies.
    fn parse_error(&self, msg: Cow<'static, str>);

    /// Called whenever the source position of the token being processed
    /// changes, so that subsequent `parse_error` calls can be stamped.
    fn set_current_position(&self, _pos: Position) {}

    /// Get a handle to the `Document` node.
    fn get_document(&self) -> Self::Handle;

    /// What is the name of the given element?
    ///
    /// Should never be called on a non-element node; feel free to
    /// `panic!`.
    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a>;

    /// Create an element.
    ///
    /// When creating a template element (`flags.template` is set), an
    /// associated document fragment called the "template contents"
    /// should also be created. Later calls to
    /// [`get_template_contents`](TreeSink::get_template_contents) with
    /// that given element return it.
    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> Self::Handle;

    /// Create a comment node.
    fn create_comment(&self, text: StrTendril) -> Self::Handle;

    /// Append a node as the last child of the given node. If this would
    /// produce adjacent sibling text nodes, it should concatenate the
    /// text instead.
    ///
    /// The child node will not already have a parent.
    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>);

    /// Append a node as the sibling immediately before the given node.
    ///
    /// The tree builder promises that `sibling` is not a text node.
    /// However its previous sibling, which would become the new node's
    /// previous sibling, could be a text node. If the new node is also
    /// a text node, the two should be merged, as in the behavior of
    /// `append`.
    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>);

    /// When the insertion point is decided by the existence of a parent
    /// node of the element, we consider both possibilities and send the
    /// element which will be used if a parent node exists, along with
    /// the element to be used if there isn't one.
    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    );

    /// Append a `DOCTYPE` element to the `Document` node.
    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    );

    /// Get a handle to a template's template contents. The tree builder
    /// promises this will never be called with something else than a
    /// template element.
    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle;

    /// Do two handles refer to the same node?
    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool;

    /// Set the document's quirks mode.
    fn set_quirks_mode(&self, mode: QuirksMode);

    /// Add each attribute to the given element, if no attribute with
    /// that name already exists. The tree builder promises this will
    /// never be called with something else than an element.
    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>);

    /// Detach the given node from its parent.
    fn remove_from_parent(&self, target: &Self::Handle);

    /// Remove all the children from node and append them to new_parent.
    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle);

    /// Mark a HTML `<script>` as "already started".
    fn mark_script_already_started(&self, _node: &Self::Handle) {}

    /// Indicate that a node was popped off the stack of open elements.
    fn pop(&self, _node: &Self::Handle) {}

    /// Associate the given form-associatable element with the form
    /// element.
    fn associate_with_form(
        &self,
        _target: &Self::Handle,
        _form: &Self::Handle,
        _nodes: (&Self::Handle, Option<&Self::Handle>),
    ) {
    }

    /// Returns true if the adjusted current node is an HTML integration
    /// point and the token is a start tag.
    fn is_mathml_annotation_xml_integration_point(&self, _handle: &Self::Handle) -> bool {
        false
    }
}

/// Trace hooks for a garbage-collected DOM.
pub trait Tracer {
    type Handle;

    /// Upon a call to `trace_handles`, the tree builder will call this
    /// method for each handle in its internal state.
    fn trace_handle(&self, node: &Self::Handle);
}
