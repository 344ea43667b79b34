// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The HTML5 tree builder: the insertion-mode state machine that
//! consumes the tokenizer's output and grows a tree through a
//! [`TreeSink`].
//!
//! This module holds the machinery the insertion modes share: the
//! stack of open elements with its scope searches, the list of active
//! formatting elements with reconstruction and the adoption agency
//! algorithm, element insertion (normal and foster-parented), and the
//! mode-reset logic. The per-mode token handlers live in `phases.rs`;
//! the fixed name categories and foreign-content tables in `tags.rs`
//! and `foreign.rs`.

use std::borrow::Cow::{self, Borrowed};
use std::cell::{Cell, Ref, RefCell};
use std::fmt;

use log::{debug, log_enabled, Level};
use tendril::StrTendril;

use hazel_markup::interface::{create_element, ElemName, Tracer, TreeSink};
use hazel_markup::interface::{AppendNode, AppendText, NodeOrText};
use hazel_markup::{ns, Attribute, ExpandedName, LocalName, Position, QualName};

pub use hazel_markup::interface::QuirksMode;

use self::tags::Scope;
use self::types::*;
use crate::tokenizer::states as tok_state;
use crate::tokenizer::{self, EndTag, StartTag, Tag, TokenSink, TokenSinkResult};
use crate::util::str::to_escaped_string;

mod data;
mod foreign;
mod phases;
mod tags;
mod types;

/// Tree builder options, with an impl for Default.
#[derive(Copy, Clone)]
pub struct TreeBuilderOpts {
    /// Report all parse errors described in the spec, at some
    /// performance penalty? Default: false
    pub exact_errors: bool,

    /// Is scripting enabled?
    ///
    /// With scripting on, the contents of a `<noscript>` element are a
    /// single text node; with scripting off they are parsed as a
    /// normal subtree.
    pub scripting_enabled: bool,

    /// Is this document the `srcdoc` of an `<iframe>`? Changes how
    /// quirks mode is inferred from the doctype.
    pub iframe_srcdoc: bool,

    /// Should the `<!DOCTYPE>` be left out of the tree?
    pub drop_doctype: bool,

    /// Initial quirks mode. Default: NoQuirks
    pub quirks_mode: QuirksMode,
}

impl Default for TreeBuilderOpts {
    fn default() -> TreeBuilderOpts {
        TreeBuilderOpts {
            exact_errors: false,
            scripting_enabled: true,
            iframe_srcdoc: false,
            drop_doctype: false,
            quirks_mode: QuirksMode::NoQuirks,
        }
    }
}

/// The HTML tree builder.
pub struct TreeBuilder<Handle, Sink> {
    /// Options controlling the behavior of the tree builder.
    opts: TreeBuilderOpts,

    /// Consumer of tree modifications.
    pub sink: Sink,

    /// The current insertion mode.
    mode: Cell<InsertionMode>,

    /// The mode to return to when the Text and InTableText excursions
    /// finish.
    original_mode: Cell<Option<InsertionMode>>,

    /// One insertion mode per open `<template>`.
    template_modes: RefCell<Vec<InsertionMode>>,

    /// Character tokens seen inside a table, held back until it is
    /// known whether they are whitespace-only.
    pending_table_text: RefCell<Vec<Token>>,

    /// Quirks mode as decided by the doctype.
    quirks_mode: Cell<QuirksMode>,

    /// The Document node, created by the sink.
    document: Handle,

    /// The stack of open elements, most recently opened on top (at
    /// the end).
    open_elements: RefCell<Vec<Handle>>,

    /// The list of active formatting elements.
    active_formatting: RefCell<Vec<FormatEntry<Handle>>>,

    /// The head element pointer.
    head_pointer: RefCell<Option<Handle>>,

    /// The form element pointer.
    form_pointer: RefCell<Option<Handle>>,

    /// The frameset-ok flag.
    frameset_ok: Cell<bool>,

    /// Drop a newline if it is the next character (set after `<pre>`
    /// and `<textarea>`).
    skip_next_newline: Cell<bool>,

    /// While set, insertions are redirected away from table-like
    /// current nodes (foster parenting).
    insert_from_table: Cell<bool>,

    /// The context element when parsing a fragment.
    context_element: RefCell<Option<Handle>>,

    /// Set by void-element handlers; checked after a self-closing
    /// start tag has been processed.
    self_closing_acknowledged: Cell<bool>,

    /// Source position of the token being processed, forwarded to the
    /// sink whenever it changes.
    position: Cell<Position>,
    // WARNING: If you add new fields that contain Handles, you
    // must add them to trace_handles() below to preserve memory
    // safety!
}

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    /// Create a new tree builder which sends tree modifications to a
    /// particular `TreeSink`.
    ///
    /// The tree builder is also a `TokenSink`.
    pub fn new(sink: Sink, opts: TreeBuilderOpts) -> TreeBuilder<Handle, Sink> {
        let document = sink.get_document();
        TreeBuilder {
            opts,
            sink,
            mode: Cell::new(InsertionMode::Initial),
            original_mode: Cell::new(None),
            template_modes: Default::default(),
            pending_table_text: Default::default(),
            quirks_mode: Cell::new(opts.quirks_mode),
            document,
            open_elements: Default::default(),
            active_formatting: Default::default(),
            head_pointer: Default::default(),
            form_pointer: Default::default(),
            frameset_ok: Cell::new(true),
            skip_next_newline: Cell::new(false),
            insert_from_table: Cell::new(false),
            context_element: Default::default(),
            self_closing_acknowledged: Cell::new(false),
            position: Cell::new(Position::start()),
        }
    }

    /// Create a tree builder for parsing a fragment in the context of
    /// the given element, per the fragment parsing algorithm: an
    /// `html` root is created up front and the insertion mode is
    /// chosen from the context.
    pub fn new_for_fragment(
        sink: Sink,
        context_element: Handle,
        form_element: Option<Handle>,
        opts: TreeBuilderOpts,
    ) -> TreeBuilder<Handle, Sink> {
        let context_is_template = {
            let name = sink.elem_name(&context_element);
            *name.ns() == ns!(html) && &**name.local_name() == "template"
        };

        let tb = TreeBuilder {
            template_modes: RefCell::new(if context_is_template {
                vec![InsertionMode::InTemplate]
            } else {
                vec![]
            }),
            form_pointer: RefCell::new(form_element),
            context_element: RefCell::new(Some(context_element)),
            ..TreeBuilder::new(sink, opts)
        };

        tb.insert_root(vec![]);
        tb.mode.set(tb.reset_insertion_mode());
        tb
    }

    /// The tokenizer state the fragment algorithm prescribes for the
    /// given context element.
    pub fn tokenizer_state_for_context_elem(
        &self,
        context_allows_scripting: bool,
    ) -> tok_state::State {
        let context = self.context_element.borrow();
        let node = context.as_ref().expect("no context element");
        let name = self.sink.elem_name(node);
        if *name.ns() != ns!(html) {
            return tok_state::State::Data;
        }
        match &**name.local_name() {
            "title" | "textarea" => tok_state::State::Raw(tok_state::RawKind::Rcdata),

            "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                tok_state::State::Raw(tok_state::RawKind::Rawtext)
            },

            "script" => tok_state::State::Raw(tok_state::RawKind::ScriptData),

            "noscript" if context_allows_scripting => {
                tok_state::State::Raw(tok_state::RawKind::Rawtext)
            },

            "plaintext" => tok_state::State::Plaintext,

            _ => tok_state::State::Data,
        }
    }

    /// Call the `Tracer`'s `trace_handle` method on every `Handle`
    /// held in internal state, to support garbage-collected DOMs.
    pub fn trace_handles(&self, tracer: &dyn Tracer<Handle = Handle>) {
        tracer.trace_handle(&self.document);
        for node in self.open_elements.borrow().iter() {
            tracer.trace_handle(node);
        }
        for entry in self.active_formatting.borrow().iter() {
            if let FormatEntry::Element(node, _) = entry {
                tracer.trace_handle(node);
            }
        }
        if let Some(head) = self.head_pointer.borrow().as_ref() {
            tracer.trace_handle(head);
        }
        if let Some(form) = self.form_pointer.borrow().as_ref() {
            tracer.trace_handle(form);
        }
        if let Some(context) = self.context_element.borrow().as_ref() {
            tracer.trace_handle(context);
        }
    }

    /// Are we parsing a HTML fragment?
    pub fn is_fragment(&self) -> bool {
        self.context_element.borrow().is_some()
    }
}

impl<Handle, Sink> TokenSink for TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    type Handle = Handle;

    fn process_token(&self, token: tokenizer::Token, pos: Position) -> TokenSinkResult<Handle> {
        if pos != self.position.get() {
            self.position.set(pos);
            self.sink.set_current_position(pos);
        }
        let skip_newline = self.skip_next_newline.take();

        match token {
            tokenizer::ParseError(msg) => {
                self.sink.parse_error(msg);
                TokenSinkResult::Continue
            },

            tokenizer::DoctypeToken(doctype) => {
                // Only the Initial mode does anything with a doctype;
                // everywhere else it is an error to ignore.
                if self.mode.get() == InsertionMode::Initial {
                    self.process_to_completion(Token::Doctype(doctype))
                } else {
                    self.sink.parse_error(if self.opts.exact_errors {
                        Cow::from(format!("DOCTYPE in insertion mode {:?}", self.mode.get()))
                    } else {
                        Borrowed("DOCTYPE in body")
                    });
                    TokenSinkResult::Continue
                }
            },

            tokenizer::TagToken(tag) => self.process_to_completion(Token::Tag(tag)),
            tokenizer::CommentToken(text) => self.process_to_completion(Token::Comment(text)),
            tokenizer::NullCharacterToken => self.process_to_completion(Token::Null),
            tokenizer::EOFToken => self.process_to_completion(Token::Eof),

            tokenizer::CharacterTokens(mut text) => {
                if skip_newline && text.starts_with("\n") {
                    text.pop_front(1);
                }
                // Split the run into whitespace and non-whitespace
                // pieces; the insertion modes distinguish exactly
                // those.
                let mut result = TokenSinkResult::Continue;
                while let Some((run, is_space)) =
                    text.pop_front_char_run(|c| c.is_ascii_whitespace())
                {
                    let token = if is_space {
                        Token::Spaces(run)
                    } else {
                        Token::Text(run)
                    };
                    result = self.process_to_completion(token);
                }
                result
            },
        }
    }

    fn end(&self) {
        for node in self.open_elements.borrow_mut().drain(..).rev() {
            self.sink.pop(&node);
        }
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        !self.open_elements.borrow().is_empty()
            && *self.sink.elem_name(&self.adjusted_current_node()).ns() != ns!(html)
    }
}

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    fn debug_step(&self, mode: InsertionMode, token: &Token) {
        if log_enabled!(Level::Debug) {
            debug!(
                "processing {} in insertion mode {:?}",
                to_escaped_string(token),
                mode
            );
        }
    }

    /// Run a token through the dispatch until it is consumed,
    /// including any reprocessing the modes ask for.
    fn process_to_completion(&self, mut token: Token) -> TokenSinkResult<Handle> {
        let wants_acknowledgement = matches!(
            token,
            Token::Tag(Tag {
                kind: StartTag,
                self_closing: true,
                ..
            })
        );
        self.self_closing_acknowledged.set(false);

        loop {
            let step = if self.dispatches_to_foreign(&token) {
                self.foreign_content(token)
            } else {
                self.step(self.mode.get(), token)
            };
            token = match step {
                Step::Done => {
                    if wants_acknowledgement && !self.self_closing_acknowledged.get() {
                        self.sink
                            .parse_error(Borrowed("Unacknowledged self-closing tag"));
                    }
                    return TokenSinkResult::Continue;
                },
                Step::Again(token) => token,
                Step::RawText(kind) => return TokenSinkResult::RawData(kind),
                Step::Plaintext => return TokenSinkResult::Plaintext,
                Step::Script(node) => return TokenSinkResult::Script(node),
            };
        }
    }

    /// Record that a void-element handler consumed the tag, so a
    /// self-closing slash on it is not an error.
    fn acknowledge_self_closing(&self) {
        self.self_closing_acknowledged.set(true);
    }

    fn unexpected<T: fmt::Debug>(&self, thing: &T) -> Step<Handle> {
        self.sink.parse_error(if self.opts.exact_errors {
            Cow::from(format!(
                "Unexpected token {} in insertion mode {:?}",
                to_escaped_string(thing),
                self.mode.get()
            ))
        } else {
            Borrowed("Unexpected token")
        });
        Step::Done
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        self.quirks_mode.set(mode);
        self.sink.set_quirks_mode(mode);
    }

    //§ the-stack-of-open-elements
    fn current_node(&self) -> Ref<'_, Handle> {
        Ref::map(self.open_elements.borrow(), |open| {
            open.last().expect("no current element")
        })
    }

    /// The context element stands in for the root while a fragment's
    /// stack holds only `html`.
    fn adjusted_current_node(&self) -> Ref<'_, Handle> {
        if self.open_elements.borrow().len() == 1 {
            let context = self.context_element.borrow();
            if let Ok(node) = Ref::filter_map(context, |c| c.as_ref()) {
                return node;
            }
        }
        self.current_node()
    }

    fn root_element(&self) -> Handle {
        self.open_elements.borrow()[0].clone()
    }

    /// The `body`, if it is where the parser put it: second on the
    /// stack.
    fn body_element(&self) -> Option<Handle> {
        let node = self.open_elements.borrow().get(1)?.clone();
        self.is_html_element_named(&node, "body").then_some(node)
    }

    fn is_html_element_named(&self, node: &Handle, name: &str) -> bool {
        let elem = self.sink.elem_name(node);
        *elem.ns() == ns!(html) && &**elem.local_name() == name
    }

    fn current_node_is(&self, name: &str) -> bool {
        self.is_html_element_named(&self.current_node(), name)
    }

    fn current_node_matches<F>(&self, pred: F) -> bool
    where
        F: Fn(ExpandedName) -> bool,
    {
        pred(self.sink.elem_name(&self.current_node()).expanded())
    }

    fn has_open_element(&self, name: &str) -> bool {
        self.open_elements
            .borrow()
            .iter()
            .any(|node| self.is_html_element_named(node, name))
    }

    /// Search the stack from the top for something matching `pred`,
    /// failing at the first element the scope names.
    fn any_in_scope<F>(&self, scope: Scope, pred: F) -> bool
    where
        F: Fn(ExpandedName) -> bool,
    {
        for node in self.open_elements.borrow().iter().rev() {
            let elem = self.sink.elem_name(node);
            let name = elem.expanded();
            if pred(name) {
                return true;
            }
            if scope.ends_search_at(name) {
                return false;
            }
        }
        // The root html element terminates every scope.
        false
    }

    fn name_in_scope(&self, name: &str, scope: Scope) -> bool {
        self.any_in_scope(scope, |n| *n.ns == ns!(html) && &**n.local == name)
    }

    fn node_in_scope(&self, target: &Handle, scope: Scope) -> bool {
        for node in self.open_elements.borrow().iter().rev() {
            if self.sink.same_node(node, target) {
                return true;
            }
            if scope.ends_search_at(self.sink.elem_name(node).expanded()) {
                return false;
            }
        }
        false
    }

    fn pop_current(&self) -> Handle {
        let node = self
            .open_elements
            .borrow_mut()
            .pop()
            .expect("no current element");
        self.sink.pop(&node);
        node
    }

    fn remove_from_open_elements(&self, target: &Handle) {
        let index = self
            .open_elements
            .borrow()
            .iter()
            .rposition(|node| self.sink.same_node(node, target));
        if let Some(index) = index {
            self.open_elements.borrow_mut().remove(index);
            self.sink.pop(target);
        }
    }

    /// Pop until an element matching `pred` has been popped; returns
    /// how many elements came off.
    fn pop_until<F>(&self, pred: F) -> usize
    where
        F: Fn(ExpandedName) -> bool,
    {
        let mut count = 0;
        loop {
            let Some(node) = self.open_elements.borrow_mut().pop() else {
                break;
            };
            self.sink.pop(&node);
            count += 1;
            if pred(self.sink.elem_name(&node).expanded()) {
                break;
            }
        }
        count
    }

    fn pop_until_popped(&self, name: &str) -> usize {
        self.pop_until(|n| *n.ns == ns!(html) && &**n.local == name)
    }

    /// Pop until `name` is popped, reporting an error if anything else
    /// had to come off first.
    fn close_element(&self, name: &str) {
        if self.pop_until_popped(name) != 1 {
            self.sink.parse_error(if self.opts.exact_errors {
                Cow::from(format!("Unexpected open element while closing {name}"))
            } else {
                Borrowed("Unexpected open element")
            });
        }
    }

    /// <https://html.spec.whatwg.org/#generate-implied-end-tags>
    fn generate_implied_end_tags(&self, exclude: Option<&str>) {
        loop {
            let popping = {
                let open = self.open_elements.borrow();
                let Some(node) = open.last() else { return };
                let elem = self.sink.elem_name(node);
                let name = elem.expanded();
                tags::is_implied_end(name) && exclude != Some(&**name.local)
            };
            if !popping {
                return;
            }
            self.pop_current();
        }
    }

    /// The "thoroughly" variant used by `</template>`.
    fn generate_all_implied_end_tags(&self) {
        loop {
            let popping = {
                let open = self.open_elements.borrow();
                let Some(node) = open.last() else { return };
                let result = tags::is_thorough_implied_end(self.sink.elem_name(node).expanded());
                result
            };
            if !popping {
                return;
            }
            self.pop_current();
        }
    }

    fn clear_to_table_context(&self) {
        while !self.current_node_matches(|n| {
            *n.ns == ns!(html) && matches!(&**n.local, "table" | "template" | "html")
        }) {
            self.pop_current();
        }
    }

    fn clear_to_table_body_context(&self) {
        while !self.current_node_matches(|n| {
            *n.ns == ns!(html)
                && matches!(&**n.local, "tbody" | "tfoot" | "thead" | "template" | "html")
        }) {
            self.pop_current();
        }
    }

    fn clear_to_table_row_context(&self) {
        while !self.current_node_matches(|n| {
            *n.ns == ns!(html) && matches!(&**n.local, "tr" | "template" | "html")
        }) {
            self.pop_current();
        }
    }

    fn close_p_element(&self) {
        self.generate_implied_end_tags(Some("p"));
        self.close_element("p");
    }

    fn close_p_if_in_button_scope(&self) {
        if self.name_in_scope("p", Scope::Button) {
            self.close_p_element();
        }
    }

    /// Close the `td` or `th` when a cell ends.
    fn close_cell(&self) {
        self.generate_implied_end_tags(None);
        if self.pop_until(|n| *n.ns == ns!(html) && matches!(&**n.local, "td" | "th")) != 1 {
            self.sink
                .parse_error(Borrowed("expected to close <td> or <th> with cell"));
        }
        self.clear_active_formatting_to_last_marker();
    }

    /// Report stray open elements when the body (or the document)
    /// ends.
    fn check_body_end_errors(&self) {
        for node in self.open_elements.borrow().iter() {
            let elem = self.sink.elem_name(node);
            let name = elem.expanded();
            let ok = *name.ns == ns!(html)
                && matches!(
                    &**name.local,
                    "dd" | "dt" | "li" | "optgroup" | "option" | "p" | "rp" | "rt" | "tbody"
                        | "td" | "tfoot" | "th" | "thead" | "tr" | "body" | "html"
                );
            if !ok {
                self.sink.parse_error(if self.opts.exact_errors {
                    Cow::from(format!("Unexpected open tag {name:?} at end of body"))
                } else {
                    Borrowed("Unexpected open tag at end of body")
                });
                // One report is enough.
                return;
            }
        }
    }

    /// <https://html.spec.whatwg.org/multipage/#reset-the-insertion-mode-appropriately>
    fn reset_insertion_mode(&self) -> InsertionMode {
        let open = self.open_elements.borrow();
        for (i, node) in open.iter().enumerate().rev() {
            let last = i == 0;
            let context = self.context_element.borrow();
            let node = if last {
                context.as_ref().unwrap_or(node)
            } else {
                node
            };
            let elem = self.sink.elem_name(node);
            if *elem.ns() != ns!(html) {
                continue;
            }
            match &**elem.local_name() {
                "select" => {
                    for ancestor in open[..i].iter().rev() {
                        if self.is_html_element_named(ancestor, "template") {
                            return InsertionMode::InSelect;
                        }
                        if self.is_html_element_named(ancestor, "table") {
                            return InsertionMode::InSelectInTable;
                        }
                    }
                    return InsertionMode::InSelect;
                },
                "td" | "th" if !last => return InsertionMode::InCell,
                "tr" => return InsertionMode::InRow,
                "tbody" | "thead" | "tfoot" => return InsertionMode::InTableBody,
                "caption" => return InsertionMode::InCaption,
                "colgroup" => return InsertionMode::InColumnGroup,
                "table" => return InsertionMode::InTable,
                "template" => {
                    return *self
                        .template_modes
                        .borrow()
                        .last()
                        .expect("template on stack but no template mode")
                },
                "head" if !last => return InsertionMode::InHead,
                "body" => return InsertionMode::InBody,
                "frameset" => return InsertionMode::InFrameset,
                "html" => {
                    return match *self.head_pointer.borrow() {
                        None => InsertionMode::BeforeHead,
                        Some(_) => InsertionMode::AfterHead,
                    }
                },
                _ => (),
            }
        }
        InsertionMode::InBody
    }

    //§ creating-and-inserting-nodes
    /// Where the next node goes, honoring templates and (when the
    /// flag is on) foster parenting.
    fn insertion_target(&self, override_target: Option<Handle>) -> Insert<Handle> {
        let target = override_target.unwrap_or_else(|| self.current_node().clone());

        let foster = self.insert_from_table.get()
            && tags::fosters_children(self.sink.elem_name(&target).expanded());
        if foster {
            // The foster parent is found from the most recently opened
            // table, or a template's contents if one is closer.
            let open = self.open_elements.borrow();
            for (i, node) in open.iter().enumerate().rev() {
                if self.is_html_element_named(node, "template") {
                    return Insert::Under(self.sink.get_template_contents(node));
                }
                if self.is_html_element_named(node, "table") {
                    return Insert::Foster {
                        table: node.clone(),
                        fallback: open[i - 1].clone(),
                    };
                }
            }
            return Insert::Under(open[0].clone());
        }

        if self.is_html_element_named(&target, "template") {
            Insert::Under(self.sink.get_template_contents(&target))
        } else {
            Insert::Under(target)
        }
    }

    fn attach(&self, target: Insert<Handle>, child: NodeOrText<Handle>) {
        match target {
            Insert::Under(parent) => self.sink.append(&parent, child),
            Insert::Foster { table, fallback } => {
                self.sink.append_based_on_parent_node(&table, &fallback, child)
            },
        }
    }

    fn add_text(&self, text: StrTendril) {
        let target = self.insertion_target(None);
        self.attach(target, AppendText(text));
    }

    fn add_comment(&self, text: StrTendril) {
        let comment = self.sink.create_comment(text);
        let target = self.insertion_target(None);
        self.attach(target, AppendNode(comment));
    }

    fn add_comment_to_document(&self, text: StrTendril) {
        let comment = self.sink.create_comment(text);
        self.sink.append(&self.document, AppendNode(comment));
    }

    fn add_comment_to_root(&self, text: StrTendril) {
        let comment = self.sink.create_comment(text);
        let root = self.root_element();
        self.sink.append(&root, AppendNode(comment));
    }

    /// Create the `html` root and put it on the stack.
    fn insert_root(&self, attrs: Vec<Attribute>) {
        let root = create_element(
            &self.sink,
            QualName::new(None, ns!(html), LocalName::from("html")),
            attrs,
        );
        self.open_elements.borrow_mut().push(root.clone());
        self.sink.append(&self.document, AppendNode(root));
    }

    /// Should the element about to be created get the open form as its
    /// owner? (The create-an-element-for-a-token steps.)
    fn wants_form_owner(&self, name: &QualName, attrs: &[Attribute]) -> bool {
        if name.ns != ns!(html)
            || !matches!(
                &*name.local,
                "button" | "fieldset" | "input" | "object" | "output" | "select" | "textarea"
                    | "img"
            )
        {
            return false;
        }
        if self.form_pointer.borrow().is_none() || self.has_open_element("template") {
            return false;
        }
        // A listed element with an explicit form attribute chooses its
        // own owner.
        let listed = &*name.local != "img";
        !(listed
            && attrs
                .iter()
                .any(|a| a.name.ns == ns!() && &*a.name.local == "form"))
    }

    /// Create an element for a tag and insert it at the appropriate
    /// place, optionally leaving it on the stack of open elements.
    fn insert_element(&self, name: QualName, attrs: Vec<Attribute>, push: bool) -> Handle {
        let associate = self.wants_form_owner(&name, &attrs);
        let element = create_element(&self.sink, name, attrs);

        let target = self.insertion_target(None);
        if associate {
            let form = self
                .form_pointer
                .borrow()
                .clone()
                .expect("checked by wants_form_owner");
            match &target {
                Insert::Under(parent) => {
                    self.sink.associate_with_form(&element, &form, (parent, None))
                },
                Insert::Foster { table, fallback } => {
                    self.sink
                        .associate_with_form(&element, &form, (table, Some(fallback)))
                },
            }
        }

        self.attach(target, AppendNode(element.clone()));
        if push {
            self.open_elements.borrow_mut().push(element.clone());
        }
        element
    }

    fn insert_element_for(&self, tag: Tag) -> Handle {
        self.insert_element(QualName::new(None, ns!(html), tag.name), tag.attrs, true)
    }

    /// Insert a void element: it never stays on the stack, and a
    /// self-closing slash on it is acknowledged.
    fn insert_void_element_for(&self, tag: Tag) -> Handle {
        let element =
            self.insert_element(QualName::new(None, ns!(html), tag.name), tag.attrs, false);
        self.acknowledge_self_closing();
        element
    }

    /// Insert an element the parser made up (no corresponding tag).
    fn insert_html_element(&self, name: LocalName) -> Handle {
        self.insert_element(QualName::new(None, ns!(html), name), vec![], true)
    }

    /// Insert an element in the MathML or SVG namespace; self-closing
    /// foreign elements never go on the stack.
    fn insert_foreign_element_for(&self, tag: Tag, ns: hazel_markup::Namespace) -> Step<Handle> {
        let push = !tag.self_closing;
        if tag.self_closing {
            self.acknowledge_self_closing();
        }
        self.insert_element(QualName::new(None, ns, tag.name), tag.attrs, push);
        Step::Done
    }

    /// Enter the Text mode for a raw-text element that was just
    /// opened.
    fn parse_as_raw_text(&self, tag: Tag, kind: tok_state::RawKind) -> Step<Handle> {
        self.insert_element_for(tag);
        self.original_mode.set(Some(self.mode.get()));
        self.mode.set(InsertionMode::Text);
        Step::RawText(kind)
    }

    /// Run `in_body` once with foster parenting switched on.
    fn foster_parent_in_body(&self, token: Token) -> Step<Handle> {
        self.insert_from_table.set(true);
        let step = self.in_body(token);
        self.insert_from_table.set(false);
        step
    }

    fn is_hidden_input(&self, tag: &Tag) -> bool {
        tag.attrs
            .iter()
            .find(|a| a.name.ns == ns!() && &*a.name.local == "type")
            .is_some_and(|a| a.value.eq_ignore_ascii_case("hidden"))
    }

    //§ the-list-of-active-formatting-elements
    fn insert_marker(&self) {
        self.active_formatting.borrow_mut().push(FormatEntry::Marker);
    }

    fn clear_active_formatting_to_last_marker(&self) {
        let mut list = self.active_formatting.borrow_mut();
        while let Some(entry) = list.pop() {
            if matches!(entry, FormatEntry::Marker) {
                break;
            }
        }
    }

    fn position_in_active_formatting(&self, target: &Handle) -> Option<usize> {
        self.active_formatting
            .borrow()
            .iter()
            .position(|entry| match entry {
                FormatEntry::Marker => false,
                FormatEntry::Element(node, _) => self.sink.same_node(node, target),
            })
    }

    /// Find an element by name between the end of the list and the
    /// last marker.
    fn formatting_element_named(&self, name: &str) -> Option<(usize, Handle, Tag)> {
        let list = self.active_formatting.borrow();
        for (i, entry) in list.iter().enumerate().rev() {
            match entry {
                FormatEntry::Marker => return None,
                FormatEntry::Element(node, tag) => {
                    if &*tag.name == name {
                        return Some((i, node.clone(), tag.clone()));
                    }
                },
            }
        }
        None
    }

    /// Append to the list, applying the Noah's Ark clause: if three
    /// entries since the last marker already match this tag, the
    /// oldest of them is evicted.
    fn push_active_formatting(&self, element: Handle, tag: Tag) {
        let mut evict = None;
        {
            let list = self.active_formatting.borrow();
            let mut matches = 0;
            for (i, entry) in list.iter().enumerate().rev() {
                match entry {
                    FormatEntry::Marker => break,
                    FormatEntry::Element(_, existing) => {
                        if existing.equiv_modulo_attr_order(&tag) {
                            matches += 1;
                            if matches == 3 {
                                evict = Some(i);
                                break;
                            }
                        }
                    },
                }
            }
        }
        if let Some(i) = evict {
            self.active_formatting.borrow_mut().remove(i);
        }
        self.active_formatting
            .borrow_mut()
            .push(FormatEntry::Element(element, tag));
    }

    /// Insert a formatting element and record it in the list.
    fn insert_formatting_element_for(&self, tag: Tag) -> Handle {
        let element = self.insert_element(
            QualName::new(None, ns!(html), tag.name.clone()),
            tag.attrs.clone(),
            true,
        );
        self.push_active_formatting(element.clone(), tag);
        element
    }

    fn entry_is_marker_or_open(&self, entry: &FormatEntry<Handle>) -> bool {
        match entry {
            FormatEntry::Marker => true,
            FormatEntry::Element(node, _) => self
                .open_elements
                .borrow()
                .iter()
                .any(|open| self.sink.same_node(open, node)),
        }
    }

    /// <https://html.spec.whatwg.org/#reconstruct-the-active-formatting-elements>
    fn reconstruct_active_formatting_elements(&self) {
        // Nothing to do if the list is empty or ends with a marker or
        // an element that is still open.
        let mut index = {
            let list = self.active_formatting.borrow();
            let Some(last) = list.last() else { return };
            if self.entry_is_marker_or_open(last) {
                return;
            }
            list.len() - 1
        };

        // Rewind to just after the last marker or open element.
        while index > 0 {
            if self.entry_is_marker_or_open(&self.active_formatting.borrow()[index - 1]) {
                break;
            }
            index -= 1;
        }

        // Recreate every entry from there to the end, replacing each
        // list entry with its fresh twin.
        loop {
            let tag = match self.active_formatting.borrow()[index] {
                FormatEntry::Element(_, ref tag) => tag.clone(),
                FormatEntry::Marker => panic!("marker in the middle of reconstruction"),
            };
            let new_element = self.insert_element(
                QualName::new(None, ns!(html), tag.name.clone()),
                tag.attrs.clone(),
                true,
            );
            self.active_formatting.borrow_mut()[index] = FormatEntry::Element(new_element, tag);
            index += 1;
            if index == self.active_formatting.borrow().len() {
                break;
            }
        }
    }

    //§ the-adoption-agency-algorithm
    /// The adoption agency algorithm, for end tags of mis-nested
    /// formatting elements. The outer loop runs at most eight times
    /// and the inner loop at most three; both bounds come from the
    /// standard.
    fn run_adoption_agency(&self, subject: LocalName) {
        // If the current node is already the subject and not in the
        // formatting list, this is a plain close.
        if self.current_node_is(&subject)
            && self
                .position_in_active_formatting(&self.current_node())
                .is_none()
        {
            self.pop_current();
            return;
        }

        for _ in 0..8 {
            // Find the formatting element for the subject; without
            // one, this end tag is handled generically.
            let Some((formatting_index, formatting_element, formatting_tag)) =
                self.formatting_element_named(&subject)
            else {
                return self.any_other_end_tag(Tag {
                    kind: EndTag,
                    name: subject,
                    self_closing: false,
                    attrs: vec![],
                });
            };

            let stack_index = self
                .open_elements
                .borrow()
                .iter()
                .rposition(|node| self.sink.same_node(node, &formatting_element));
            let Some(stack_index) = stack_index else {
                self.sink
                    .parse_error(Borrowed("Formatting element not open"));
                self.active_formatting.borrow_mut().remove(formatting_index);
                return;
            };

            if !self.node_in_scope(&formatting_element, Scope::Default) {
                self.sink
                    .parse_error(Borrowed("Formatting element not in scope"));
                return;
            }

            if !self
                .sink
                .same_node(&self.current_node(), &formatting_element)
            {
                self.sink
                    .parse_error(Borrowed("Formatting element not current node"));
                // Not fatal; continue.
            }

            // The furthest block: the topmost special element below
            // the formatting element on the stack.
            let furthest = {
                let open = self.open_elements.borrow();
                open.iter()
                    .enumerate()
                    .skip(stack_index + 1)
                    .find(|(_, node)| tags::is_special(self.sink.elem_name(node).expanded()))
                    .map(|(i, node)| (i, node.clone()))
            };

            let Some((furthest_index, furthest_block)) = furthest else {
                // No furthest block: pop through the formatting
                // element and drop its list entry.
                self.open_elements.borrow_mut().truncate(stack_index);
                self.active_formatting.borrow_mut().remove(formatting_index);
                return;
            };

            let common_ancestor = self.open_elements.borrow()[stack_index - 1].clone();

            // Where the replacement formatting element's list entry
            // will go: in place of the old one, or after `anchor`.
            let mut anchor: Option<Handle> = None;

            // Walk up from the furthest block, reparenting as we go.
            let mut last_node = furthest_block.clone();
            let mut node_index = furthest_index;
            let mut inner_counter = 0;
            loop {
                inner_counter += 1;
                node_index -= 1;
                let mut node = self.open_elements.borrow()[node_index].clone();

                if self.sink.same_node(&node, &formatting_element) {
                    break;
                }

                let list_index = self.position_in_active_formatting(&node);

                // Nodes visited more than three times are abandoned
                // entirely.
                if inner_counter > 3 {
                    if let Some(i) = list_index {
                        self.active_formatting.borrow_mut().remove(i);
                    }
                    self.open_elements.borrow_mut().remove(node_index);
                    continue;
                }

                // Nodes not in the formatting list just leave the
                // stack.
                let Some(list_index) = list_index else {
                    self.open_elements.borrow_mut().remove(node_index);
                    continue;
                };

                // Replace the node with a fresh twin, in both the
                // stack and the list.
                let tag = match self.active_formatting.borrow()[list_index] {
                    FormatEntry::Element(ref h, ref t) => {
                        debug_assert!(self.sink.same_node(h, &node));
                        t.clone()
                    },
                    FormatEntry::Marker => panic!("marker during adoption agency"),
                };
                let replacement = create_element(
                    &self.sink,
                    QualName::new(None, ns!(html), tag.name.clone()),
                    tag.attrs.clone(),
                );
                self.active_formatting.borrow_mut()[list_index] =
                    FormatEntry::Element(replacement.clone(), tag);
                self.open_elements.borrow_mut()[node_index] = replacement.clone();
                node = replacement;

                if self.sink.same_node(&last_node, &furthest_block) {
                    anchor = Some(node.clone());
                }

                self.sink.remove_from_parent(&last_node);
                self.sink.append(&node, AppendNode(last_node.clone()));
                last_node = node;
            }

            // Put what the walk collected under the common ancestor
            // (fostered if the ancestor is table-like and the flag is
            // on).
            self.sink.remove_from_parent(&last_node);
            let target = self.insertion_target(Some(common_ancestor));
            self.attach(target, AppendNode(last_node));

            // A fresh element for the formatting tag takes over the
            // furthest block's children.
            let replacement = create_element(
                &self.sink,
                QualName::new(None, ns!(html), formatting_tag.name.clone()),
                formatting_tag.attrs.clone(),
            );
            self.sink.reparent_children(&furthest_block, &replacement);
            self.sink
                .append(&furthest_block, AppendNode(replacement.clone()));

            // Update the formatting list: the new entry goes at the
            // bookmark, the old one goes away.
            let new_entry = FormatEntry::Element(replacement.clone(), formatting_tag);
            match anchor {
                None => {
                    let i = self
                        .position_in_active_formatting(&formatting_element)
                        .expect("formatting element vanished from list");
                    self.active_formatting.borrow_mut()[i] = new_entry;
                },
                Some(after) => {
                    let i = self
                        .position_in_active_formatting(&after)
                        .expect("bookmark vanished from list")
                        + 1;
                    self.active_formatting.borrow_mut().insert(i, new_entry);
                    let old = self
                        .position_in_active_formatting(&formatting_element)
                        .expect("formatting element vanished from list");
                    self.active_formatting.borrow_mut().remove(old);
                },
            }

            // And the stack: the formatting element leaves, the
            // replacement goes just below the furthest block.
            self.remove_from_open_elements(&formatting_element);
            let below = self
                .open_elements
                .borrow()
                .iter()
                .position(|node| self.sink.same_node(node, &furthest_block))
                .expect("furthest block vanished from stack");
            self.open_elements.borrow_mut().insert(below + 1, replacement);
        }
    }

    /// The "any other end tag" steps of InBody: close the matching
    /// open element, or ignore the tag if a special element is in the
    /// way.
    fn any_other_end_tag(&self, tag: Tag) {
        let mut target = None;
        for node in self.open_elements.borrow().iter().rev() {
            if self.is_html_element_named(node, &tag.name) {
                target = Some(node.clone());
                break;
            }
            if tags::is_special(self.sink.elem_name(node).expanded()) {
                break;
            }
        }

        let Some(target) = target else {
            self.sink
                .parse_error(Borrowed("Found special tag while closing generic tag"));
            return;
        };

        self.generate_implied_end_tags(Some(&tag.name));
        if !self.sink.same_node(&self.current_node(), &target) {
            self.unexpected(&tag);
        }
        loop {
            let popped = self.pop_current();
            if self.sink.same_node(&popped, &target) {
                break;
            }
        }
    }

    //§ tree-construction-dispatcher
    /// Should this token go to the foreign-content rules rather than
    /// the current insertion mode?
    fn dispatches_to_foreign(&self, token: &Token) -> bool {
        if matches!(token, Token::Eof) {
            return false;
        }
        if self.open_elements.borrow().is_empty() {
            return false;
        }

        let adjusted = self.adjusted_current_node();
        let elem = self.sink.elem_name(&adjusted);
        let name = elem.expanded();
        if *name.ns == ns!(html) {
            return false;
        }

        if tags::is_mathml_text_integration_point(name) {
            match token {
                Token::Spaces(..) | Token::Text(..) | Token::Null => return false,
                Token::Tag(Tag { kind: StartTag, name, .. })
                    if !matches!(&**name, "mglyph" | "malignmark") =>
                {
                    return false;
                },
                _ => (),
            }
        }

        if tags::is_svg_html_integration_point(name) {
            match token {
                Token::Spaces(..) | Token::Text(..) | Token::Null => return false,
                Token::Tag(Tag { kind: StartTag, .. }) => return false,
                _ => (),
            }
        }

        if *name.ns == ns!(mathml) && &**name.local == "annotation-xml" {
            match token {
                Token::Tag(Tag { kind: StartTag, name, .. }) if &**name == "svg" => return false,
                Token::Spaces(..)
                | Token::Text(..)
                | Token::Null
                | Token::Tag(Tag { kind: StartTag, .. }) => {
                    return !self.sink.is_mathml_annotation_xml_integration_point(&adjusted);
                },
                _ => (),
            }
        }

        true
    }
}
