// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! High-level interface to the parser.
//!
//! A [`Parser`] is a [`TendrilSink`]: push input into it with
//! [`process`](TendrilSink::process) (or the convenience methods
//! `one`, `from_utf8().read_from(..)`, ...) and take the sink's
//! output with [`finish`](TendrilSink::finish).

use std::borrow::Cow;

use hazel_markup::buffer_queue::BufferQueue;
use hazel_markup::interface::create_element;
use hazel_markup::{Attribute, ElemName, QualName, TreeSink};
use tendril::stream::{TendrilSink, Utf8LossyDecoder};
use tendril::StrTendril;

use crate::tokenizer::{Tokenizer, TokenizerOpts, TokenizerResult};
use crate::tree_builder::{TreeBuilder, TreeBuilderOpts};

/// All-encompassing options struct for the parser.
#[derive(Clone, Default)]
pub struct ParseOpts {
    /// Tokenizer options.
    pub tokenizer: TokenizerOpts,

    /// Tree builder options.
    pub tree_builder: TreeBuilderOpts,
}

/// Parse an HTML document.
///
/// The returned `Parser` implements [`TendrilSink`], so input can be
/// provided incrementally, or all at once with the `one` method:
///
/// ```
/// # use hazel_rcdom::RcDom;
/// # use hazel::parse_document;
/// # use hazel::tendril::TendrilSink;
/// let dom = parse_document(RcDom::default(), Default::default()).one("<title>hi</title>");
/// ```
pub fn parse_document<Sink>(sink: Sink, opts: ParseOpts) -> Parser<Sink>
where
    Sink: TreeSink,
{
    let tb = TreeBuilder::new(sink, opts.tree_builder);
    let tok = Tokenizer::new(tb, opts.tokenizer);
    Parser {
        tokenizer: tok,
        input_buffer: BufferQueue::default(),
    }
}

/// Parse an HTML fragment in the context of an element with the given
/// qualified name and attributes.
///
/// The returned tree is the fragment's contents: the children of the
/// `html` root, collected into the document.
pub fn parse_fragment<Sink>(
    sink: Sink,
    opts: ParseOpts,
    context_name: QualName,
    context_attrs: Vec<Attribute>,
    context_allows_scripting: bool,
) -> Parser<Sink>
where
    Sink: TreeSink,
{
    let context_elem = create_element(&sink, context_name, context_attrs);
    parse_fragment_for_element(sink, opts, context_elem, context_allows_scripting, None)
}

/// Like `parse_fragment`, but with an existing context element
/// and optionally a form element pointer.
pub fn parse_fragment_for_element<Sink>(
    sink: Sink,
    opts: ParseOpts,
    context_element: Sink::Handle,
    context_allows_scripting: bool,
    form_element: Option<Sink::Handle>,
) -> Parser<Sink>
where
    Sink: TreeSink,
{
    // The tokenizer remembers the context element as the most recent
    // start tag, so an appropriate end tag can close raw text.
    let last_start_tag_name = Some(sink.elem_name(&context_element).local_name().to_string());
    let tb = TreeBuilder::new_for_fragment(sink, context_element, form_element, opts.tree_builder);
    let tok_opts = TokenizerOpts {
        initial_state: Some(tb.tokenizer_state_for_context_elem(context_allows_scripting)),
        last_start_tag_name,
        ..opts.tokenizer
    };
    let tok = Tokenizer::new(tb, tok_opts);
    Parser {
        tokenizer: tok,
        input_buffer: BufferQueue::default(),
    }
}

/// An HTML parser, ready to receive Unicode input.
pub struct Parser<Sink>
where
    Sink: TreeSink,
{
    pub tokenizer: Tokenizer<TreeBuilder<Sink::Handle, Sink>>,
    pub input_buffer: BufferQueue,
}

impl<Sink: TreeSink> TendrilSink<tendril::fmt::UTF8> for Parser<Sink> {
    fn process(&mut self, t: StrTendril) {
        self.input_buffer.push_back(t);
        // The body of this loop is executed when the parser is
        // suspended at a `</script>`. Since scripts are never run
        // here, resume immediately.
        while let TokenizerResult::Script(_) = self.tokenizer.feed(&self.input_buffer) {}
    }

    // FIXME: Is it too noisy to report every character decoding error?
    fn error(&mut self, desc: Cow<'static, str>) {
        self.tokenizer.sink.sink.parse_error(desc)
    }

    type Output = Sink::Output;

    fn finish(self) -> Self::Output {
        // Process any remaining input before end() is invoked.
        while let TokenizerResult::Script(_) = self.tokenizer.feed(&self.input_buffer) {}
        assert!(self.input_buffer.is_empty());
        self.tokenizer.end();
        self.tokenizer.sink.sink.finish()
    }
}

impl<Sink: TreeSink> Parser<Sink> {
    /// Wrap this parser into a `TendrilSink` that accepts UTF-8 bytes.
    ///
    /// Use this when your input is bytes that are known to be in the
    /// UTF-8 encoding. Decoding is lossy, like `String::from_utf8_lossy`.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_utf8(self) -> Utf8LossyDecoder<Self> {
        Utf8LossyDecoder::new(self)
    }
}
