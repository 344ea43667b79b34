// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The HTML5 tokenizer: a deterministic state machine over code
//! points, emitting doctype, tag, comment, character and EOF tokens.
//!
//! Each state of the standard is one method here; [`Tokenizer::step`]
//! dispatches on the current state and every handler consumes one
//! input unit (a character, a lookahead, or a whole run of ordinary
//! text) before returning. The tree builder reaches back in through
//! [`TokenSinkResult`]: after certain start tags it switches the
//! content model (RCDATA, RAWTEXT, script data, PLAINTEXT), and the
//! name of the last emitted start tag is remembered so the matching
//! end tag can be recognized inside raw text.

pub use self::interface::{CharacterTokens, EOFToken, NullCharacterToken, ParseError};
pub use self::interface::{CommentToken, DoctypeToken, TagToken, Token};
pub use self::interface::{Doctype, EndTag, StartTag, Tag, TagKind};
pub use self::interface::{TokenSink, TokenSinkResult, TokenizerResult};

use std::borrow::Cow::{self, Borrowed};
use std::cell::{Cell, RefCell};
use std::mem;

use hazel_markup::buffer_queue::{BufferQueue, FromSet, NotFromSet, SetResult};
use hazel_markup::{ns, small_char_set, Attribute, LocalName, Position, QualName, SmallCharSet};
use log::{debug, trace};
use tendril::StrTendril;

use self::char_ref::CharRefTokenizer;
use self::states::AttrValueKind::{Quoted, Unquoted};
use self::states::DoctypeIdKind::{Public, System};
use self::states::RawKind::{Rawtext, Rcdata, ScriptData, ScriptDataEscaped};
use self::states::ScriptEscapeKind::{DoubleEscaped, Escaped};
use self::states::{DoctypeIdKind, Quote, RawKind, ScriptEscapeKind, State};
use crate::util::str::lower_ascii_letter;

mod char_ref;
mod interface;
pub mod states;

/// What one dispatch of the state machine accomplished.
enum Progress<Handle> {
    /// Keep going; the machine may have emitted tokens or changed
    /// state.
    Continue,
    /// The input ran dry (or a lookahead needs more characters).
    NeedInput,
    /// A `</script>` was emitted; the caller may run the script
    /// before feeding more input.
    Script(Handle),
}

/// The pieces of a tag token under construction, including the
/// attribute currently being collected.
struct TagBuilder {
    kind: TagKind,
    name: StrTendril,
    self_closing: bool,
    attrs: Vec<Attribute>,
    attr_name: StrTendril,
    attr_value: StrTendril,
}

impl Default for TagBuilder {
    fn default() -> TagBuilder {
        TagBuilder {
            kind: StartTag,
            name: StrTendril::new(),
            self_closing: false,
            attrs: vec![],
            attr_name: StrTendril::new(),
            attr_value: StrTendril::new(),
        }
    }
}

/// Tokenizer options, with an impl for `Default`.
#[derive(Clone)]
pub struct TokenizerOpts {
    /// Report all parse errors described in the spec, at some
    /// performance penalty? Default: false
    pub exact_errors: bool,

    /// Discard a `U+FEFF BYTE ORDER MARK` if we see one at the
    /// beginning of the stream? Default: true
    pub discard_bom: bool,

    /// Initial state override. Only the test runner and the fragment
    /// parsing algorithm use a non-`None` value.
    pub initial_state: Option<State>,

    /// Last start tag seen, for end-tag matching in raw text. Only
    /// the test runner and the fragment parsing algorithm use a
    /// non-`None` value.
    pub last_start_tag_name: Option<String>,
}

impl Default for TokenizerOpts {
    fn default() -> TokenizerOpts {
        TokenizerOpts {
            exact_errors: false,
            discard_bom: true,
            initial_state: None,
            last_start_tag_name: None,
        }
    }
}

/// The HTML tokenizer.
pub struct Tokenizer<Sink> {
    /// Options controlling the behavior of the tokenizer.
    opts: TokenizerOpts,

    /// Destination for tokens we emit.
    pub sink: Sink,

    /// The abstract machine state as described in the spec.
    state: Cell<State>,

    /// No further input will arrive once the buffered input has been
    /// consumed; lookaheads stop waiting.
    at_eof: Cell<bool>,

    /// A character handed back by a state that looked at it and
    /// declined it; the next read returns it again.
    reconsume: Cell<Option<char>>,

    /// A `\r` was just turned into `\n`; a directly following `\n`
    /// must be dropped.
    ignore_lf: Cell<bool>,

    /// Still waiting to see (and discard) a leading byte order mark?
    bom_pending: Cell<bool>,

    /// The tag token under construction.
    tag: RefCell<TagBuilder>,

    /// The comment under construction.
    comment: RefCell<StrTendril>,

    /// The doctype token under construction.
    doctype: RefCell<Doctype>,

    /// Name of the last start tag emitted, for "appropriate end tag"
    /// checks in raw text.
    last_start_tag: RefCell<Option<LocalName>>,

    /// The spec's "temporary buffer", shared by the raw-text end-tag
    /// scan, CDATA sections, and pending lookaheads.
    temp_buf: RefCell<StrTendril>,

    /// Sub-machine for the character reference being resolved, if any.
    char_ref: RefCell<Option<Box<CharRefTokenizer>>>,

    /// Line of the character last consumed, 1-based.
    line: Cell<u64>,

    /// Column of the character last consumed on the current line.
    /// Exact on the ordinary consume path, approximate where the
    /// machine reads by raw lookahead; never moves backwards.
    column: Cell<u64>,
}

impl<Sink: TokenSink> Tokenizer<Sink> {
    /// Create a new tokenizer which feeds tokens to a particular
    /// `TokenSink`.
    pub fn new(sink: Sink, mut opts: TokenizerOpts) -> Tokenizer<Sink> {
        let last_start_tag = opts.last_start_tag_name.take().map(|s| LocalName::from(&*s));
        let state = opts.initial_state.unwrap_or(State::Data);
        let bom_pending = opts.discard_bom;
        Tokenizer {
            opts,
            sink,
            state: Cell::new(state),
            at_eof: Cell::new(false),
            reconsume: Cell::new(None),
            ignore_lf: Cell::new(false),
            bom_pending: Cell::new(bom_pending),
            tag: RefCell::new(TagBuilder::default()),
            comment: RefCell::new(StrTendril::new()),
            doctype: RefCell::new(Doctype::default()),
            last_start_tag: RefCell::new(last_start_tag),
            temp_buf: RefCell::new(StrTendril::new()),
            char_ref: RefCell::new(None),
            line: Cell::new(1),
            column: Cell::new(0),
        }
    }

    /// Feed input into the tokenizer, running the state machine until
    /// it needs more characters (or stops at a `</script>`).
    pub fn feed(&self, input: &BufferQueue) -> TokenizerResult<Sink::Handle> {
        if input.is_empty() {
            return TokenizerResult::Done;
        }

        if self.bom_pending.get() {
            let Some(c) = input.peek() else {
                return TokenizerResult::Done;
            };
            if c == '\u{feff}' {
                input.next();
            }
            self.bom_pending.set(false);
        }

        self.run(input)
    }

    /// Indicate that the end of the input has been reached.
    pub fn end(&self) {
        // Wind down a half-resolved character reference first; it may
        // hand characters back for the ordinary states to re-read.
        let input = BufferQueue::default();
        if let Some(mut char_ref) = self.char_ref.take() {
            char_ref.end_of_file(self, &input);
            self.resolve_char_ref(char_ref.get_result());
        }

        self.at_eof.set(true);
        assert!(matches!(self.run(&input), TokenizerResult::Done));
        assert!(input.is_empty());

        loop {
            match self.finish_state_at_eof() {
                Progress::Continue => (),
                Progress::NeedInput => break,
                Progress::Script(_) => unreachable!("script at EOF"),
            }
        }

        self.sink.end();
    }

    fn run(&self, input: &BufferQueue) -> TokenizerResult<Sink::Handle> {
        loop {
            match self.step(input) {
                Progress::Continue => (),
                Progress::NeedInput => return TokenizerResult::Done,
                Progress::Script(handle) => return TokenizerResult::Script(handle),
            }
        }
    }

    //§ preprocessing-the-input-stream
    /// Normalize newlines, keep the position cursor current, and (in
    /// exact-errors mode) report forbidden scalars.
    fn preprocess(&self, mut c: char, input: &BufferQueue) -> Option<char> {
        if self.ignore_lf.take() && c == '\n' {
            c = input.next()?;
        }
        if c == '\r' {
            self.ignore_lf.set(true);
            c = '\n';
        }

        if c == '\n' {
            self.line.set(self.line.get() + 1);
            self.column.set(0);
        } else {
            self.column.set(self.column.get() + 1);
        }

        if self.opts.exact_errors
            && match c as u32 {
                0x01..=0x08 | 0x0B | 0x0E..=0x1F | 0x7F..=0x9F | 0xFDD0..=0xFDEF => true,
                n if (n & 0xFFFE) == 0xFFFE => true,
                _ => false,
            }
        {
            self.emit_error(Cow::Owned(format!("Bad character {c}")));
        }

        trace!("got character {c}");
        Some(c)
    }

    /// Consume the next (preprocessed) character.
    fn get_char(&self, input: &BufferQueue) -> Option<char> {
        if let Some(c) = self.reconsume.take() {
            return Some(c);
        }
        let c = input.next()?;
        self.preprocess(c, input)
    }

    /// Look at the next raw character without consuming it.
    fn peek(&self, input: &BufferQueue) -> Option<char> {
        self.reconsume.get().or_else(|| input.peek())
    }

    /// Throw away one raw character, the counterpart to [`peek`].
    ///
    /// [`peek`]: Tokenizer::peek
    fn discard_char(&self, input: &BufferQueue) {
        if self.reconsume.take().is_none() {
            input.next();
        }
    }

    /// Pop either one character from `set` or a whole run of text
    /// containing none of them. `\r` and `\n` are members of every
    /// set passed here, so runs never contain newlines and the column
    /// simply advances by the run's length.
    fn take_run(&self, input: &BufferQueue, set: SmallCharSet) -> Option<SetResult> {
        if self.opts.exact_errors || self.reconsume.get().is_some() || self.ignore_lf.get() {
            return self.get_char(input).map(FromSet);
        }

        match input.pop_except_from(set)? {
            FromSet(c) => self.preprocess(c, input).map(FromSet),
            NotFromSet(run) => {
                self.column
                    .set(self.column.get() + run.chars().count() as u64);
                Some(NotFromSet(run))
            },
        }
    }

    /// Try to match `pat` against the upcoming input, consuming it on
    /// success. Characters seen so far are parked in the temporary
    /// buffer while the match is undecided across input chunks.
    fn lookahead(&self, input: &BufferQueue, pat: &str, eq: fn(&u8, &u8) -> bool) -> Option<bool> {
        if self.ignore_lf.get() {
            self.ignore_lf.set(false);
            if self.peek(input) == Some('\n') {
                self.discard_char(input);
            }
        }

        input.push_front(mem::take(&mut *self.temp_buf.borrow_mut()));
        match input.eat(pat, eq) {
            Some(true) => {
                // The patterns matched here are ASCII without newlines.
                self.column.set(self.column.get() + pat.len() as u64);
                Some(true)
            },
            Some(false) => Some(false),
            None if self.at_eof.get() => Some(false),
            None => {
                while let Some(c) = input.next() {
                    self.temp_buf.borrow_mut().push_char(c);
                }
                None
            },
        }
    }

    //§ tokenization
    fn position(&self) -> Position {
        Position {
            line: self.line.get(),
            column: self.column.get(),
        }
    }

    fn process(&self, token: Token) -> TokenSinkResult<Sink::Handle> {
        self.sink.process_token(token, self.position())
    }

    fn emit(&self, token: Token) {
        assert!(matches!(self.process(token), TokenSinkResult::Continue));
    }

    fn emit_char(&self, c: char) {
        self.emit(match c {
            '\0' => NullCharacterToken,
            _ => CharacterTokens(StrTendril::from_char(c)),
        });
    }

    fn emit_error(&self, msg: Cow<'static, str>) {
        self.emit(ParseError(msg));
    }

    fn error_char(&self, c: char) {
        let msg = if self.opts.exact_errors {
            Cow::Owned(format!("Saw {c} in state {:?}", self.state.get()))
        } else {
            Borrowed("Bad character")
        };
        self.emit_error(msg);
    }

    fn error_eof(&self) {
        let msg = if self.opts.exact_errors {
            Cow::Owned(format!("Saw EOF in state {:?}", self.state.get()))
        } else {
            Borrowed("Unexpected EOF")
        };
        self.emit_error(msg);
    }

    fn switch(&self, state: State) {
        self.state.set(state);
    }

    /// Hand `c` back and continue in `state`; the next read sees `c`
    /// again.
    fn reconsume_in(&self, c: char, state: State) {
        self.reconsume.set(Some(c));
        self.state.set(state);
    }

    fn flush_temp_buf(&self) {
        let buf = mem::take(&mut *self.temp_buf.borrow_mut());
        if buf.len32() > 0 {
            self.emit(CharacterTokens(buf));
        }
    }

    //§ data-state building blocks
    fn begin_char_ref(&self) {
        let in_attribute = matches!(self.state.get(), State::AttrValue(_));
        *self.char_ref.borrow_mut() = Some(Box::new(CharRefTokenizer::new(in_attribute)));
    }

    fn step_char_ref(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        // Move the sub-machine out while it runs, since it calls back
        // into us to read characters and report errors.
        let mut char_ref = self.char_ref.take().expect("no char ref in progress");
        let status = char_ref.step(self, input);
        match status {
            char_ref::Status::Done => {
                self.resolve_char_ref(char_ref.get_result());
                Progress::Continue
            },
            char_ref::Status::Stuck => {
                *self.char_ref.borrow_mut() = Some(char_ref);
                Progress::NeedInput
            },
            char_ref::Status::Progress => {
                *self.char_ref.borrow_mut() = Some(char_ref);
                Progress::Continue
            },
        }
    }

    /// Route a resolved reference (or the literal `&` of a failed one)
    /// to wherever the current state collects characters.
    fn resolve_char_ref(&self, char_ref: char_ref::CharRef) {
        let mut chars = char_ref.chars;
        let mut len = char_ref.num_chars as usize;
        if len == 0 {
            chars[0] = '&';
            len = 1;
        }

        for &c in &chars[..len] {
            match self.state.get() {
                State::Data | State::Raw(Rcdata) => self.emit_char(c),
                State::AttrValue(_) => self.tag.borrow_mut().attr_value.push_char(c),
                s => panic!("character reference resolved in state {s:?}"),
            }
        }
    }

    //§ tag-token building blocks
    fn new_tag(&self, kind: TagKind, c: char) {
        let mut tag = self.tag.borrow_mut();
        tag.kind = kind;
        tag.name.clear();
        tag.name.push_char(c);
        tag.self_closing = false;
        tag.attrs.clear();
        tag.attr_name.clear();
        tag.attr_value.clear();
    }

    fn push_tag_name(&self, c: char) {
        self.tag.borrow_mut().name.push_char(c);
    }

    /// Drop a half-built raw-text end tag that turned out not to be
    /// one.
    fn abandon_tag(&self) {
        let mut tag = self.tag.borrow_mut();
        tag.name.clear();
        tag.self_closing = false;
        tag.attrs.clear();
    }

    /// Begin collecting an attribute, completing the previous one.
    fn start_attribute(&self, c: char) {
        self.finish_attribute();
        self.tag.borrow_mut().attr_name.push_char(c);
    }

    /// Complete the attribute being collected, dropping it (with an
    /// error) if the tag already has one with the same name.
    fn finish_attribute(&self) {
        let mut tag = self.tag.borrow_mut();
        if tag.attr_name.is_empty() {
            return;
        }

        let name = LocalName::from(&*mem::take(&mut tag.attr_name));
        let value = mem::take(&mut tag.attr_value);

        if tag.attrs.iter().any(|a| a.name.local == name) {
            drop(tag);
            self.emit_error(Borrowed("Duplicate attribute"));
        } else {
            tag.attrs.push(Attribute {
                // In a foreign element the tree builder may move the
                // attribute into a real namespace later.
                name: QualName::new(None, ns!(), name),
                value,
            });
        }
    }

    /// Is the end tag being collected the right one to close the
    /// current raw-text element?
    fn is_appropriate_end_tag(&self) -> bool {
        let tag = self.tag.borrow();
        if tag.kind != EndTag {
            return false;
        }
        match self.last_start_tag.borrow().as_ref() {
            Some(last) => *tag.name == **last,
            None => false,
        }
    }

    /// Emit the finished tag and let the sink steer the content
    /// model; `next` applies unless the sink overrides it.
    fn finish_tag(&self, next: State) -> Progress<Sink::Handle> {
        self.switch(next);
        self.finish_attribute();

        let token = {
            let mut tag = self.tag.borrow_mut();
            Tag {
                kind: tag.kind,
                name: LocalName::from(&*mem::take(&mut tag.name)),
                self_closing: mem::replace(&mut tag.self_closing, false),
                attrs: mem::take(&mut tag.attrs),
            }
        };

        match token.kind {
            StartTag => *self.last_start_tag.borrow_mut() = Some(token.name.clone()),
            EndTag => {
                if !token.attrs.is_empty() {
                    self.emit_error(Borrowed("Attributes on an end tag"));
                }
                if token.self_closing {
                    self.emit_error(Borrowed("Self-closing end tag"));
                }
            },
        }

        match self.process(TagToken(token)) {
            TokenSinkResult::Continue => Progress::Continue,
            TokenSinkResult::Plaintext => {
                self.switch(State::Plaintext);
                Progress::Continue
            },
            TokenSinkResult::RawData(kind) => {
                self.switch(State::Raw(kind));
                Progress::Continue
            },
            TokenSinkResult::Script(handle) => {
                self.switch(State::Data);
                Progress::Script(handle)
            },
        }
    }

    //§ comment and doctype building blocks
    fn push_comment(&self, c: char) {
        self.comment.borrow_mut().push_char(c);
    }

    fn append_comment(&self, s: &str) {
        self.comment.borrow_mut().push_slice(s);
    }

    fn finish_comment(&self) {
        let comment = mem::take(&mut *self.comment.borrow_mut());
        self.emit(CommentToken(comment));
    }

    fn new_doctype(&self) {
        *self.doctype.borrow_mut() = Doctype::default();
    }

    fn push_doctype_name(&self, c: char) {
        let mut doctype = self.doctype.borrow_mut();
        match doctype.name {
            Some(ref mut name) => name.push_char(c),
            None => doctype.name = Some(StrTendril::from_char(c)),
        }
    }

    fn push_doctype_id(&self, kind: DoctypeIdKind, c: char) {
        let mut doctype = self.doctype.borrow_mut();
        let id = match kind {
            Public => &mut doctype.public_id,
            System => &mut doctype.system_id,
        };
        match id {
            Some(s) => s.push_char(c),
            None => *id = Some(StrTendril::from_char(c)),
        }
    }

    fn blank_doctype_id(&self, kind: DoctypeIdKind) {
        let mut doctype = self.doctype.borrow_mut();
        let id = match kind {
            Public => &mut doctype.public_id,
            System => &mut doctype.system_id,
        };
        match id {
            Some(s) => s.clear(),
            None => *id = Some(StrTendril::new()),
        }
    }

    fn force_quirks(&self) {
        self.doctype.borrow_mut().force_quirks = true;
    }

    fn finish_doctype(&self) {
        let doctype = self.doctype.take();
        self.emit(DoctypeToken(doctype));
    }
}

/// Read the next character, or return `NeedInput` from the enclosing
/// state handler.
macro_rules! next ( ($me:expr, $input:expr) => (
    unwrap_or_return!($me.get_char($input), Progress::NeedInput)
));

impl<Sink: TokenSink> Tokenizer<Sink> {
    /// Run one dispatch of the machine: the current state consumes
    /// one input unit.
    fn step(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        if self.char_ref.borrow().is_some() {
            return self.step_char_ref(input);
        }

        trace!("processing in state {:?}", self.state.get());
        match self.state.get() {
            State::Data => self.data_state(input),
            State::Plaintext => self.plaintext_state(input),
            State::TagOpen => self.tag_open_state(input),
            State::EndTagOpen => self.end_tag_open_state(input),
            State::TagName => self.tag_name_state(input),

            State::Raw(Rcdata) => self.rcdata_state(input),
            State::Raw(Rawtext) => self.rawtext_state(input),
            State::Raw(ScriptData) => self.script_data_state(input),
            State::Raw(ScriptDataEscaped(kind)) => self.script_data_escaped_state(input, kind),
            State::RawLessThan(kind) => self.raw_less_than_state(input, kind),
            State::RawEndTagOpen(kind) => self.raw_end_tag_open_state(input, kind),
            State::RawEndTagName(kind) => self.raw_end_tag_name_state(input, kind),

            State::ScriptDataEscapeStart(Escaped) => self.script_data_escape_start_state(input),
            State::ScriptDataEscapeStart(DoubleEscaped) => {
                self.script_data_double_escape_start_state(input)
            },
            State::ScriptDataEscapeStartDash => self.script_data_escape_start_dash_state(input),
            State::ScriptDataEscapedDash(kind) => self.script_data_escaped_dash_state(input, kind),
            State::ScriptDataEscapedDashDash(kind) => {
                self.script_data_escaped_dash_dash_state(input, kind)
            },
            State::ScriptDataDoubleEscapeEnd => self.script_data_double_escape_end_state(input),

            State::BeforeAttributeName => self.before_attribute_name_state(input),
            State::AttributeName => self.attribute_name_state(input),
            State::AfterAttributeName => self.after_attribute_name_state(input),
            State::BeforeAttributeValue => self.before_attribute_value_state(input),
            State::AttrValue(Quoted(quote)) => self.attr_value_quoted_state(input, quote),
            State::AttrValue(Unquoted) => self.attr_value_unquoted_state(input),
            State::AfterQuotedAttributeValue => self.after_quoted_attribute_value_state(input),
            State::SelfClosingStartTag => self.self_closing_start_tag_state(input),

            State::BogusComment => self.bogus_comment_state(input),
            State::MarkupDeclarationOpen => self.markup_declaration_open_state(input),
            State::CommentStart => self.comment_start_state(input),
            State::CommentStartDash => self.comment_start_dash_state(input),
            State::Comment => self.comment_state(input),
            State::CommentLessThan => self.comment_less_than_state(input),
            State::CommentLessThanBang => self.comment_less_than_bang_state(input),
            State::CommentLessThanBangDash => self.comment_less_than_bang_dash_state(input),
            State::CommentLessThanBangDashDash => {
                self.comment_less_than_bang_dash_dash_state(input)
            },
            State::CommentEndDash => self.comment_end_dash_state(input),
            State::CommentEnd => self.comment_end_state(input),
            State::CommentEndBang => self.comment_end_bang_state(input),

            State::Doctype => self.doctype_state(input),
            State::BeforeDoctypeName => self.before_doctype_name_state(input),
            State::DoctypeName => self.doctype_name_state(input),
            State::AfterDoctypeName => self.after_doctype_name_state(input),
            State::AfterDoctypeKeyword(kind) => self.after_doctype_keyword_state(input, kind),
            State::BeforeDoctypeId(kind) => self.before_doctype_id_state(input, kind),
            State::DoctypeIdQuoted(kind, quote) => self.doctype_id_quoted_state(input, kind, quote),
            State::AfterDoctypeId(kind) => self.after_doctype_id_state(input, kind),
            State::BetweenDoctypeIds => self.between_doctype_ids_state(input),
            State::BogusDoctype => self.bogus_doctype_state(input),

            State::CdataSection => self.cdata_section_state(input),
            State::CdataSectionBracket => self.cdata_section_bracket_state(input),
            State::CdataSectionEnd => self.cdata_section_end_state(input),
        }
    }

    //§ data-state
    fn data_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let unit = self.take_run(input, small_char_set!('\r' '\0' '&' '<' '\n'));
        match unwrap_or_return!(unit, Progress::NeedInput) {
            FromSet('&') => self.begin_char_ref(),
            FromSet('<') => self.switch(State::TagOpen),
            FromSet('\0') => {
                self.error_char('\0');
                self.emit_char('\0');
            },
            FromSet(c) => self.emit_char(c),
            NotFromSet(run) => self.emit(CharacterTokens(run)),
        }
        Progress::Continue
    }

    //§ rcdata-state
    fn rcdata_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let unit = self.take_run(input, small_char_set!('\r' '\0' '&' '<' '\n'));
        match unwrap_or_return!(unit, Progress::NeedInput) {
            FromSet('&') => self.begin_char_ref(),
            FromSet('<') => self.switch(State::RawLessThan(Rcdata)),
            FromSet('\0') => {
                self.error_char('\0');
                self.emit_char('\u{fffd}');
            },
            FromSet(c) => self.emit_char(c),
            NotFromSet(run) => self.emit(CharacterTokens(run)),
        }
        Progress::Continue
    }

    //§ rawtext-state script-data-state
    fn rawtext_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        self.plain_raw_state(input, Rawtext)
    }

    fn script_data_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        self.plain_raw_state(input, ScriptData)
    }

    fn plain_raw_state(&self, input: &BufferQueue, kind: RawKind) -> Progress<Sink::Handle> {
        let unit = self.take_run(input, small_char_set!('\r' '\0' '<' '\n'));
        match unwrap_or_return!(unit, Progress::NeedInput) {
            FromSet('<') => self.switch(State::RawLessThan(kind)),
            FromSet('\0') => {
                self.error_char('\0');
                self.emit_char('\u{fffd}');
            },
            FromSet(c) => self.emit_char(c),
            NotFromSet(run) => self.emit(CharacterTokens(run)),
        }
        Progress::Continue
    }

    //§ script-data-escaped-state script-data-double-escaped-state
    fn script_data_escaped_state(
        &self,
        input: &BufferQueue,
        kind: ScriptEscapeKind,
    ) -> Progress<Sink::Handle> {
        let unit = self.take_run(input, small_char_set!('\r' '\0' '-' '<' '\n'));
        match unwrap_or_return!(unit, Progress::NeedInput) {
            FromSet('-') => {
                self.emit_char('-');
                self.switch(State::ScriptDataEscapedDash(kind));
            },
            FromSet('<') => {
                if kind == DoubleEscaped {
                    self.emit_char('<');
                }
                self.switch(State::RawLessThan(ScriptDataEscaped(kind)));
            },
            FromSet('\0') => {
                self.error_char('\0');
                self.emit_char('\u{fffd}');
            },
            FromSet(c) => self.emit_char(c),
            NotFromSet(run) => self.emit(CharacterTokens(run)),
        }
        Progress::Continue
    }

    //§ plaintext-state
    fn plaintext_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let unit = self.take_run(input, small_char_set!('\r' '\0' '\n'));
        match unwrap_or_return!(unit, Progress::NeedInput) {
            FromSet('\0') => {
                self.error_char('\0');
                self.emit_char('\u{fffd}');
            },
            FromSet(c) => self.emit_char(c),
            NotFromSet(run) => self.emit(CharacterTokens(run)),
        }
        Progress::Continue
    }

    //§ tag-open-state
    fn tag_open_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '!' => self.switch(State::MarkupDeclarationOpen),
            '/' => self.switch(State::EndTagOpen),
            '?' => {
                self.error_char(c);
                self.comment.borrow_mut().clear();
                self.reconsume_in(c, State::BogusComment);
            },
            _ => match lower_ascii_letter(c) {
                Some(lower) => {
                    self.new_tag(StartTag, lower);
                    self.switch(State::TagName);
                },
                None => {
                    self.error_char(c);
                    self.emit_char('<');
                    self.reconsume_in(c, State::Data);
                },
            },
        }
        Progress::Continue
    }

    //§ end-tag-open-state
    fn end_tag_open_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '>' => {
                self.error_char(c);
                self.switch(State::Data);
            },
            _ => match lower_ascii_letter(c) {
                Some(lower) => {
                    self.new_tag(EndTag, lower);
                    self.switch(State::TagName);
                },
                None => {
                    self.error_char(c);
                    self.comment.borrow_mut().clear();
                    self.reconsume_in(c, State::BogusComment);
                },
            },
        }
        Progress::Continue
    }

    //§ tag-name-state
    fn tag_name_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => self.switch(State::BeforeAttributeName),
            '/' => self.switch(State::SelfClosingStartTag),
            '>' => return self.finish_tag(State::Data),
            '\0' => {
                self.error_char(c);
                self.push_tag_name('\u{fffd}');
            },
            _ => self.push_tag_name(c.to_ascii_lowercase()),
        }
        Progress::Continue
    }

    //§ rcdata-less-than-sign-state rawtext-less-than-sign-state script-data-less-than-sign-state
    //§ script-data-escaped-less-than-sign-state script-data-double-escaped-less-than-sign-state
    fn raw_less_than_state(&self, input: &BufferQueue, kind: RawKind) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match kind {
            ScriptDataEscaped(Escaped) => match c {
                '/' => {
                    self.temp_buf.borrow_mut().clear();
                    self.switch(State::RawEndTagOpen(kind));
                },
                _ => match lower_ascii_letter(c) {
                    Some(lower) => {
                        self.temp_buf.borrow_mut().clear();
                        self.temp_buf.borrow_mut().push_char(lower);
                        self.emit_char('<');
                        self.emit_char(c);
                        self.switch(State::ScriptDataEscapeStart(DoubleEscaped));
                    },
                    None => {
                        self.emit_char('<');
                        self.reconsume_in(c, State::Raw(kind));
                    },
                },
            },

            ScriptDataEscaped(DoubleEscaped) => match c {
                '/' => {
                    self.temp_buf.borrow_mut().clear();
                    self.emit_char('/');
                    self.switch(State::ScriptDataDoubleEscapeEnd);
                },
                _ => self.reconsume_in(c, State::Raw(kind)),
            },

            _ => match c {
                '/' => {
                    self.temp_buf.borrow_mut().clear();
                    self.switch(State::RawEndTagOpen(kind));
                },
                '!' if kind == ScriptData => {
                    self.emit_char('<');
                    self.emit_char('!');
                    self.switch(State::ScriptDataEscapeStart(Escaped));
                },
                _ => {
                    self.emit_char('<');
                    self.reconsume_in(c, State::Raw(kind));
                },
            },
        }
        Progress::Continue
    }

    //§ rcdata-end-tag-open-state rawtext-end-tag-open-state script-data-end-tag-open-state script-data-escaped-end-tag-open-state
    fn raw_end_tag_open_state(&self, input: &BufferQueue, kind: RawKind) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match lower_ascii_letter(c) {
            Some(lower) => {
                self.new_tag(EndTag, lower);
                self.temp_buf.borrow_mut().push_char(c);
                self.switch(State::RawEndTagName(kind));
            },
            None => {
                self.emit_char('<');
                self.emit_char('/');
                self.reconsume_in(c, State::Raw(kind));
            },
        }
        Progress::Continue
    }

    //§ rcdata-end-tag-name-state rawtext-end-tag-name-state script-data-end-tag-name-state script-data-escaped-end-tag-name-state
    fn raw_end_tag_name_state(&self, input: &BufferQueue, kind: RawKind) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        if self.is_appropriate_end_tag() {
            match c {
                '\t' | '\n' | '\x0C' | ' ' => {
                    self.temp_buf.borrow_mut().clear();
                    self.switch(State::BeforeAttributeName);
                    return Progress::Continue;
                },
                '/' => {
                    self.temp_buf.borrow_mut().clear();
                    self.switch(State::SelfClosingStartTag);
                    return Progress::Continue;
                },
                '>' => {
                    self.temp_buf.borrow_mut().clear();
                    return self.finish_tag(State::Data);
                },
                _ => (),
            }
        }

        match lower_ascii_letter(c) {
            Some(lower) => {
                self.push_tag_name(lower);
                self.temp_buf.borrow_mut().push_char(c);
            },
            None => {
                // Not the appropriate end tag after all; everything
                // scanned so far was text.
                self.abandon_tag();
                self.emit_char('<');
                self.emit_char('/');
                self.flush_temp_buf();
                self.reconsume_in(c, State::Raw(kind));
            },
        }
        Progress::Continue
    }

    //§ script-data-escape-start-state
    fn script_data_escape_start_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => {
                self.emit_char('-');
                self.switch(State::ScriptDataEscapeStartDash);
            },
            _ => self.reconsume_in(c, State::Raw(ScriptData)),
        }
        Progress::Continue
    }

    //§ script-data-escape-start-dash-state
    fn script_data_escape_start_dash_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => {
                self.emit_char('-');
                self.switch(State::ScriptDataEscapedDashDash(Escaped));
            },
            _ => self.reconsume_in(c, State::Raw(ScriptData)),
        }
        Progress::Continue
    }

    //§ script-data-double-escape-start-state
    fn script_data_double_escape_start_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' | '/' | '>' => {
                let kind = if &**self.temp_buf.borrow() == "script" {
                    DoubleEscaped
                } else {
                    Escaped
                };
                self.emit_char(c);
                self.switch(State::Raw(ScriptDataEscaped(kind)));
            },
            _ => match lower_ascii_letter(c) {
                Some(lower) => {
                    self.temp_buf.borrow_mut().push_char(lower);
                    self.emit_char(c);
                },
                None => self.reconsume_in(c, State::Raw(ScriptDataEscaped(Escaped))),
            },
        }
        Progress::Continue
    }

    //§ script-data-escaped-dash-state script-data-double-escaped-dash-state
    fn script_data_escaped_dash_state(
        &self,
        input: &BufferQueue,
        kind: ScriptEscapeKind,
    ) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => {
                self.emit_char('-');
                self.switch(State::ScriptDataEscapedDashDash(kind));
            },
            '<' => {
                if kind == DoubleEscaped {
                    self.emit_char('<');
                }
                self.switch(State::RawLessThan(ScriptDataEscaped(kind)));
            },
            '\0' => {
                self.error_char(c);
                self.emit_char('\u{fffd}');
                self.switch(State::Raw(ScriptDataEscaped(kind)));
            },
            _ => {
                self.emit_char(c);
                self.switch(State::Raw(ScriptDataEscaped(kind)));
            },
        }
        Progress::Continue
    }

    //§ script-data-escaped-dash-dash-state script-data-double-escaped-dash-dash-state
    fn script_data_escaped_dash_dash_state(
        &self,
        input: &BufferQueue,
        kind: ScriptEscapeKind,
    ) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => self.emit_char('-'),
            '<' => {
                if kind == DoubleEscaped {
                    self.emit_char('<');
                }
                self.switch(State::RawLessThan(ScriptDataEscaped(kind)));
            },
            '>' => {
                self.emit_char('>');
                self.switch(State::Raw(ScriptData));
            },
            '\0' => {
                self.error_char(c);
                self.emit_char('\u{fffd}');
                self.switch(State::Raw(ScriptDataEscaped(kind)));
            },
            _ => {
                self.emit_char(c);
                self.switch(State::Raw(ScriptDataEscaped(kind)));
            },
        }
        Progress::Continue
    }

    //§ script-data-double-escape-end-state
    fn script_data_double_escape_end_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' | '/' | '>' => {
                let kind = if &**self.temp_buf.borrow() == "script" {
                    Escaped
                } else {
                    DoubleEscaped
                };
                self.emit_char(c);
                self.switch(State::Raw(ScriptDataEscaped(kind)));
            },
            _ => match lower_ascii_letter(c) {
                Some(lower) => {
                    self.temp_buf.borrow_mut().push_char(lower);
                    self.emit_char(c);
                },
                None => self.reconsume_in(c, State::Raw(ScriptDataEscaped(DoubleEscaped))),
            },
        }
        Progress::Continue
    }

    //§ before-attribute-name-state
    fn before_attribute_name_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => (),
            '/' => self.switch(State::SelfClosingStartTag),
            '>' => return self.finish_tag(State::Data),
            '\0' => {
                self.error_char(c);
                self.start_attribute('\u{fffd}');
                self.switch(State::AttributeName);
            },
            _ => {
                match lower_ascii_letter(c) {
                    Some(lower) => self.start_attribute(lower),
                    None => {
                        if matches!(c, '"' | '\'' | '<' | '=') {
                            self.error_char(c);
                        }
                        self.start_attribute(c);
                    },
                }
                self.switch(State::AttributeName);
            },
        }
        Progress::Continue
    }

    //§ attribute-name-state
    fn attribute_name_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => self.switch(State::AfterAttributeName),
            '/' => self.switch(State::SelfClosingStartTag),
            '=' => self.switch(State::BeforeAttributeValue),
            '>' => return self.finish_tag(State::Data),
            '\0' => {
                self.error_char(c);
                self.tag.borrow_mut().attr_name.push_char('\u{fffd}');
            },
            _ => match lower_ascii_letter(c) {
                Some(lower) => self.tag.borrow_mut().attr_name.push_char(lower),
                None => {
                    if matches!(c, '"' | '\'' | '<') {
                        self.error_char(c);
                    }
                    self.tag.borrow_mut().attr_name.push_char(c);
                },
            },
        }
        Progress::Continue
    }

    //§ after-attribute-name-state
    fn after_attribute_name_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => (),
            '/' => self.switch(State::SelfClosingStartTag),
            '=' => self.switch(State::BeforeAttributeValue),
            '>' => return self.finish_tag(State::Data),
            '\0' => {
                self.error_char(c);
                self.start_attribute('\u{fffd}');
                self.switch(State::AttributeName);
            },
            _ => {
                match lower_ascii_letter(c) {
                    Some(lower) => self.start_attribute(lower),
                    None => {
                        if matches!(c, '"' | '\'' | '<') {
                            self.error_char(c);
                        }
                        self.start_attribute(c);
                    },
                }
                self.switch(State::AttributeName);
            },
        }
        Progress::Continue
    }

    //§ before-attribute-value-state
    // Peek rather than consume, so the first value character can be
    // handled together with the rest of the run.
    fn before_attribute_value_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = unwrap_or_return!(self.peek(input), Progress::NeedInput);
        match c {
            '\t' | '\n' | '\r' | '\x0C' | ' ' => self.discard_char(input),
            '"' => {
                self.discard_char(input);
                self.switch(State::AttrValue(Quoted(Quote::Double)));
            },
            '\'' => {
                self.discard_char(input);
                self.switch(State::AttrValue(Quoted(Quote::Single)));
            },
            '>' => {
                self.discard_char(input);
                self.error_char(c);
                return self.finish_tag(State::Data);
            },
            _ => self.switch(State::AttrValue(Unquoted)),
        }
        Progress::Continue
    }

    //§ attribute-value-(double-quoted)-state attribute-value-(single-quoted)-state
    fn attr_value_quoted_state(&self, input: &BufferQueue, quote: Quote) -> Progress<Sink::Handle> {
        let set = match quote {
            Quote::Double => small_char_set!('\r' '"' '&' '\0' '\n'),
            Quote::Single => small_char_set!('\r' '\'' '&' '\0' '\n'),
        };
        match unwrap_or_return!(self.take_run(input, set), Progress::NeedInput) {
            FromSet(c) if c == quote.as_char() => self.switch(State::AfterQuotedAttributeValue),
            FromSet('&') => self.begin_char_ref(),
            FromSet('\0') => {
                self.error_char('\0');
                self.tag.borrow_mut().attr_value.push_char('\u{fffd}');
            },
            FromSet(c) => self.tag.borrow_mut().attr_value.push_char(c),
            NotFromSet(run) => self.tag.borrow_mut().attr_value.push_tendril(&run),
        }
        Progress::Continue
    }

    //§ attribute-value-(unquoted)-state
    fn attr_value_unquoted_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let set = small_char_set!('\r' '\t' '\n' '\x0C' ' ' '&' '>' '\0');
        match unwrap_or_return!(self.take_run(input, set), Progress::NeedInput) {
            FromSet('\t') | FromSet('\n') | FromSet('\x0C') | FromSet(' ') => {
                self.switch(State::BeforeAttributeName)
            },
            FromSet('&') => self.begin_char_ref(),
            FromSet('>') => return self.finish_tag(State::Data),
            FromSet('\0') => {
                self.error_char('\0');
                self.tag.borrow_mut().attr_value.push_char('\u{fffd}');
            },
            FromSet(c) => {
                if matches!(c, '"' | '\'' | '<' | '=' | '`') {
                    self.error_char(c);
                }
                self.tag.borrow_mut().attr_value.push_char(c);
            },
            NotFromSet(run) => self.tag.borrow_mut().attr_value.push_tendril(&run),
        }
        Progress::Continue
    }

    //§ after-attribute-value-(quoted)-state
    fn after_quoted_attribute_value_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => self.switch(State::BeforeAttributeName),
            '/' => self.switch(State::SelfClosingStartTag),
            '>' => return self.finish_tag(State::Data),
            _ => {
                self.error_char(c);
                self.reconsume_in(c, State::BeforeAttributeName);
            },
        }
        Progress::Continue
    }

    //§ self-closing-start-tag-state
    fn self_closing_start_tag_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '>' => {
                self.tag.borrow_mut().self_closing = true;
                return self.finish_tag(State::Data);
            },
            _ => {
                self.error_char(c);
                self.reconsume_in(c, State::BeforeAttributeName);
            },
        }
        Progress::Continue
    }

    //§ bogus-comment-state
    fn bogus_comment_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '>' => {
                self.finish_comment();
                self.switch(State::Data);
            },
            '\0' => {
                self.error_char(c);
                self.push_comment('\u{fffd}');
            },
            _ => self.push_comment(c),
        }
        Progress::Continue
    }

    //§ markup-declaration-open-state
    fn markup_declaration_open_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        if unwrap_or_return!(self.lookahead(input, "--", u8::eq), Progress::NeedInput) {
            self.comment.borrow_mut().clear();
            self.switch(State::CommentStart);
        } else if unwrap_or_return!(
            self.lookahead(input, "doctype", u8::eq_ignore_ascii_case),
            Progress::NeedInput
        ) {
            self.switch(State::Doctype);
        } else if self
            .sink
            .adjusted_current_node_present_but_not_in_html_namespace()
            && unwrap_or_return!(self.lookahead(input, "[CDATA[", u8::eq), Progress::NeedInput)
        {
            self.temp_buf.borrow_mut().clear();
            self.switch(State::CdataSection);
        } else {
            self.emit_error(Borrowed("Bad markup declaration"));
            self.comment.borrow_mut().clear();
            self.switch(State::BogusComment);
        }
        Progress::Continue
    }

    //§ comment-start-state
    fn comment_start_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => self.switch(State::CommentStartDash),
            '>' => {
                self.error_char(c);
                self.finish_comment();
                self.switch(State::Data);
            },
            '\0' => {
                self.error_char(c);
                self.push_comment('\u{fffd}');
                self.switch(State::Comment);
            },
            _ => {
                self.push_comment(c);
                self.switch(State::Comment);
            },
        }
        Progress::Continue
    }

    //§ comment-start-dash-state
    fn comment_start_dash_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => self.switch(State::CommentEnd),
            '>' => {
                self.error_char(c);
                self.finish_comment();
                self.switch(State::Data);
            },
            '\0' => {
                self.error_char(c);
                self.append_comment("-\u{fffd}");
                self.switch(State::Comment);
            },
            _ => {
                self.push_comment('-');
                self.push_comment(c);
                self.switch(State::Comment);
            },
        }
        Progress::Continue
    }

    //§ comment-state
    fn comment_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '<' => {
                self.push_comment(c);
                self.switch(State::CommentLessThan);
            },
            '-' => self.switch(State::CommentEndDash),
            '\0' => {
                self.error_char(c);
                self.push_comment('\u{fffd}');
            },
            _ => self.push_comment(c),
        }
        Progress::Continue
    }

    //§ comment-less-than-sign-state
    fn comment_less_than_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '!' => {
                self.push_comment(c);
                self.switch(State::CommentLessThanBang);
            },
            '<' => self.push_comment(c),
            _ => self.reconsume_in(c, State::Comment),
        }
        Progress::Continue
    }

    //§ comment-less-than-sign-bang-state
    fn comment_less_than_bang_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => self.switch(State::CommentLessThanBangDash),
            _ => self.reconsume_in(c, State::Comment),
        }
        Progress::Continue
    }

    //§ comment-less-than-sign-bang-dash-state
    fn comment_less_than_bang_dash_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => self.switch(State::CommentLessThanBangDashDash),
            _ => self.reconsume_in(c, State::CommentEndDash),
        }
        Progress::Continue
    }

    //§ comment-less-than-sign-bang-dash-dash-state
    fn comment_less_than_bang_dash_dash_state(
        &self,
        input: &BufferQueue,
    ) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '>' => self.reconsume_in(c, State::CommentEnd),
            _ => {
                self.error_char(c);
                self.reconsume_in(c, State::CommentEnd);
            },
        }
        Progress::Continue
    }

    //§ comment-end-dash-state
    fn comment_end_dash_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => self.switch(State::CommentEnd),
            '\0' => {
                self.error_char(c);
                self.append_comment("-\u{fffd}");
                self.switch(State::Comment);
            },
            _ => {
                self.push_comment('-');
                self.push_comment(c);
                self.switch(State::Comment);
            },
        }
        Progress::Continue
    }

    //§ comment-end-state
    fn comment_end_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '>' => {
                self.finish_comment();
                self.switch(State::Data);
            },
            '!' => self.switch(State::CommentEndBang),
            '-' => self.push_comment('-'),
            _ => {
                self.append_comment("--");
                self.reconsume_in(c, State::Comment);
            },
        }
        Progress::Continue
    }

    //§ comment-end-bang-state
    fn comment_end_bang_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '-' => {
                self.append_comment("--!");
                self.switch(State::CommentEndDash);
            },
            '>' => {
                self.error_char(c);
                self.finish_comment();
                self.switch(State::Data);
            },
            '\0' => {
                self.error_char(c);
                self.append_comment("--!\u{fffd}");
                self.switch(State::Comment);
            },
            _ => {
                self.append_comment("--!");
                self.push_comment(c);
                self.switch(State::Comment);
            },
        }
        Progress::Continue
    }

    //§ doctype-state
    fn doctype_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => self.switch(State::BeforeDoctypeName),
            '>' => self.reconsume_in(c, State::BeforeDoctypeName),
            _ => {
                self.error_char(c);
                self.reconsume_in(c, State::BeforeDoctypeName);
            },
        }
        Progress::Continue
    }

    //§ before-doctype-name-state
    fn before_doctype_name_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => (),
            '\0' => {
                self.error_char(c);
                self.new_doctype();
                self.push_doctype_name('\u{fffd}');
                self.switch(State::DoctypeName);
            },
            '>' => {
                self.error_char(c);
                self.new_doctype();
                self.force_quirks();
                self.finish_doctype();
                self.switch(State::Data);
            },
            _ => {
                self.new_doctype();
                self.push_doctype_name(c.to_ascii_lowercase());
                self.switch(State::DoctypeName);
            },
        }
        Progress::Continue
    }

    //§ doctype-name-state
    fn doctype_name_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => {
                self.temp_buf.borrow_mut().clear();
                self.switch(State::AfterDoctypeName);
            },
            '>' => {
                self.finish_doctype();
                self.switch(State::Data);
            },
            '\0' => {
                self.error_char(c);
                self.push_doctype_name('\u{fffd}');
            },
            _ => self.push_doctype_name(c.to_ascii_lowercase()),
        }
        Progress::Continue
    }

    //§ after-doctype-name-state
    fn after_doctype_name_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        if unwrap_or_return!(
            self.lookahead(input, "public", u8::eq_ignore_ascii_case),
            Progress::NeedInput
        ) {
            self.switch(State::AfterDoctypeKeyword(Public));
            return Progress::Continue;
        }
        if unwrap_or_return!(
            self.lookahead(input, "system", u8::eq_ignore_ascii_case),
            Progress::NeedInput
        ) {
            self.switch(State::AfterDoctypeKeyword(System));
            return Progress::Continue;
        }

        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => (),
            '>' => {
                self.finish_doctype();
                self.switch(State::Data);
            },
            _ => {
                self.error_char(c);
                self.force_quirks();
                self.reconsume_in(c, State::BogusDoctype);
            },
        }
        Progress::Continue
    }

    //§ after-doctype-public-keyword-state after-doctype-system-keyword-state
    fn after_doctype_keyword_state(
        &self,
        input: &BufferQueue,
        kind: DoctypeIdKind,
    ) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => self.switch(State::BeforeDoctypeId(kind)),
            '"' => {
                self.error_char(c);
                self.blank_doctype_id(kind);
                self.switch(State::DoctypeIdQuoted(kind, Quote::Double));
            },
            '\'' => {
                self.error_char(c);
                self.blank_doctype_id(kind);
                self.switch(State::DoctypeIdQuoted(kind, Quote::Single));
            },
            '>' => {
                self.error_char(c);
                self.force_quirks();
                self.finish_doctype();
                self.switch(State::Data);
            },
            _ => {
                self.error_char(c);
                self.force_quirks();
                self.reconsume_in(c, State::BogusDoctype);
            },
        }
        Progress::Continue
    }

    //§ before-doctype-public-identifier-state before-doctype-system-identifier-state
    fn before_doctype_id_state(
        &self,
        input: &BufferQueue,
        kind: DoctypeIdKind,
    ) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => (),
            '"' => {
                self.blank_doctype_id(kind);
                self.switch(State::DoctypeIdQuoted(kind, Quote::Double));
            },
            '\'' => {
                self.blank_doctype_id(kind);
                self.switch(State::DoctypeIdQuoted(kind, Quote::Single));
            },
            '>' => {
                self.error_char(c);
                self.force_quirks();
                self.finish_doctype();
                self.switch(State::Data);
            },
            _ => {
                self.error_char(c);
                self.force_quirks();
                self.reconsume_in(c, State::BogusDoctype);
            },
        }
        Progress::Continue
    }

    //§ doctype-public-identifier-(quoted)-state doctype-system-identifier-(quoted)-state
    fn doctype_id_quoted_state(
        &self,
        input: &BufferQueue,
        kind: DoctypeIdKind,
        quote: Quote,
    ) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            _ if c == quote.as_char() => self.switch(State::AfterDoctypeId(kind)),
            '\0' => {
                self.error_char(c);
                self.push_doctype_id(kind, '\u{fffd}');
            },
            '>' => {
                self.error_char(c);
                self.force_quirks();
                self.finish_doctype();
                self.switch(State::Data);
            },
            _ => self.push_doctype_id(kind, c),
        }
        Progress::Continue
    }

    //§ after-doctype-public-identifier-state after-doctype-system-identifier-state
    fn after_doctype_id_state(
        &self,
        input: &BufferQueue,
        kind: DoctypeIdKind,
    ) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match (kind, c) {
            (Public, '\t' | '\n' | '\x0C' | ' ') => self.switch(State::BetweenDoctypeIds),
            (System, '\t' | '\n' | '\x0C' | ' ') => (),
            (_, '>') => {
                self.finish_doctype();
                self.switch(State::Data);
            },
            (Public, '"') => {
                self.error_char(c);
                self.blank_doctype_id(System);
                self.switch(State::DoctypeIdQuoted(System, Quote::Double));
            },
            (Public, '\'') => {
                self.error_char(c);
                self.blank_doctype_id(System);
                self.switch(State::DoctypeIdQuoted(System, Quote::Single));
            },
            (Public, _) => {
                self.error_char(c);
                self.force_quirks();
                self.reconsume_in(c, State::BogusDoctype);
            },
            (System, _) => {
                self.error_char(c);
                self.reconsume_in(c, State::BogusDoctype);
            },
        }
        Progress::Continue
    }

    //§ between-doctype-public-and-system-identifiers-state
    fn between_doctype_ids_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '\t' | '\n' | '\x0C' | ' ' => (),
            '>' => {
                self.finish_doctype();
                self.switch(State::Data);
            },
            '"' => {
                self.blank_doctype_id(System);
                self.switch(State::DoctypeIdQuoted(System, Quote::Double));
            },
            '\'' => {
                self.blank_doctype_id(System);
                self.switch(State::DoctypeIdQuoted(System, Quote::Single));
            },
            _ => {
                self.error_char(c);
                self.force_quirks();
                self.reconsume_in(c, State::BogusDoctype);
            },
        }
        Progress::Continue
    }

    //§ bogus-doctype-state
    fn bogus_doctype_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            '>' => {
                self.finish_doctype();
                self.switch(State::Data);
            },
            '\0' => self.error_char(c),
            _ => (),
        }
        Progress::Continue
    }

    //§ cdata-section-state
    fn cdata_section_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            ']' => self.switch(State::CdataSectionBracket),
            '\0' => {
                self.flush_temp_buf();
                self.emit_char('\0');
            },
            _ => self.temp_buf.borrow_mut().push_char(c),
        }
        Progress::Continue
    }

    //§ cdata-section-bracket-state
    fn cdata_section_bracket_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            ']' => self.switch(State::CdataSectionEnd),
            _ => {
                self.temp_buf.borrow_mut().push_char(']');
                self.reconsume_in(c, State::CdataSection);
            },
        }
        Progress::Continue
    }

    //§ cdata-section-end-state
    fn cdata_section_end_state(&self, input: &BufferQueue) -> Progress<Sink::Handle> {
        let c = next!(self, input);
        match c {
            ']' => self.temp_buf.borrow_mut().push_char(']'),
            '>' => {
                self.flush_temp_buf();
                self.switch(State::Data);
            },
            _ => {
                self.temp_buf.borrow_mut().push_char(']');
                self.temp_buf.borrow_mut().push_char(']');
                self.reconsume_in(c, State::CdataSection);
            },
        }
        Progress::Continue
    }
    //§ END

    /// Apply the per-state EOF rules: flush or abandon whatever is
    /// half-built, then emit the EOF token.
    fn finish_state_at_eof(&self) -> Progress<Sink::Handle> {
        debug!("processing EOF in state {:?}", self.state.get());
        match self.state.get() {
            State::Data
            | State::Raw(Rcdata)
            | State::Raw(Rawtext)
            | State::Raw(ScriptData)
            | State::Plaintext => {
                self.emit(EOFToken);
                Progress::NeedInput
            },

            State::TagName
            | State::Raw(ScriptDataEscaped(_))
            | State::BeforeAttributeName
            | State::AttributeName
            | State::AfterAttributeName
            | State::AttrValue(_)
            | State::AfterQuotedAttributeValue
            | State::SelfClosingStartTag
            | State::ScriptDataEscapedDash(_)
            | State::ScriptDataEscapedDashDash(_) => {
                self.error_eof();
                self.switch(State::Data);
                Progress::Continue
            },

            State::BeforeAttributeValue => {
                // Nothing was consumed; let the unquoted-value state's
                // EOF rule apply.
                self.switch(State::AttrValue(Unquoted));
                Progress::Continue
            },

            State::TagOpen => {
                self.error_eof();
                self.emit_char('<');
                self.switch(State::Data);
                Progress::Continue
            },

            State::EndTagOpen => {
                self.error_eof();
                self.emit_char('<');
                self.emit_char('/');
                self.switch(State::Data);
                Progress::Continue
            },

            State::RawLessThan(ScriptDataEscaped(DoubleEscaped)) => {
                self.switch(State::Raw(ScriptDataEscaped(DoubleEscaped)));
                Progress::Continue
            },

            State::RawLessThan(kind) => {
                self.emit_char('<');
                self.switch(State::Raw(kind));
                Progress::Continue
            },

            State::RawEndTagOpen(kind) => {
                self.emit_char('<');
                self.emit_char('/');
                self.switch(State::Raw(kind));
                Progress::Continue
            },

            State::RawEndTagName(kind) => {
                self.emit_char('<');
                self.emit_char('/');
                self.flush_temp_buf();
                self.switch(State::Raw(kind));
                Progress::Continue
            },

            State::ScriptDataEscapeStart(kind) => {
                self.switch(State::Raw(ScriptDataEscaped(kind)));
                Progress::Continue
            },

            State::ScriptDataEscapeStartDash => {
                self.switch(State::Raw(ScriptData));
                Progress::Continue
            },

            State::ScriptDataDoubleEscapeEnd => {
                self.switch(State::Raw(ScriptDataEscaped(DoubleEscaped)));
                Progress::Continue
            },

            State::CommentStart
            | State::CommentStartDash
            | State::Comment
            | State::CommentEndDash
            | State::CommentEnd
            | State::CommentEndBang => {
                self.error_eof();
                self.finish_comment();
                self.switch(State::Data);
                Progress::Continue
            },

            State::CommentLessThan | State::CommentLessThanBang => {
                self.switch(State::Comment);
                Progress::Continue
            },

            State::CommentLessThanBangDash => {
                self.switch(State::CommentEndDash);
                Progress::Continue
            },

            State::CommentLessThanBangDashDash => {
                self.switch(State::CommentEnd);
                Progress::Continue
            },

            State::Doctype | State::BeforeDoctypeName => {
                self.error_eof();
                self.new_doctype();
                self.force_quirks();
                self.finish_doctype();
                self.switch(State::Data);
                Progress::Continue
            },

            State::DoctypeName
            | State::AfterDoctypeName
            | State::AfterDoctypeKeyword(_)
            | State::BeforeDoctypeId(_)
            | State::DoctypeIdQuoted(..)
            | State::AfterDoctypeId(_)
            | State::BetweenDoctypeIds => {
                self.error_eof();
                self.force_quirks();
                self.finish_doctype();
                self.switch(State::Data);
                Progress::Continue
            },

            State::BogusDoctype => {
                self.finish_doctype();
                self.switch(State::Data);
                Progress::Continue
            },

            State::BogusComment => {
                self.finish_comment();
                self.switch(State::Data);
                Progress::Continue
            },

            State::MarkupDeclarationOpen => {
                self.emit_error(Borrowed("Bad markup declaration"));
                self.switch(State::BogusComment);
                Progress::Continue
            },

            State::CdataSection => {
                self.flush_temp_buf();
                self.error_eof();
                self.switch(State::Data);
                Progress::Continue
            },

            State::CdataSectionBracket => {
                self.temp_buf.borrow_mut().push_char(']');
                self.switch(State::CdataSection);
                Progress::Continue
            },

            State::CdataSectionEnd => {
                self.temp_buf.borrow_mut().push_char(']');
                self.temp_buf.borrow_mut().push_char(']');
                self.switch(State::CdataSection);
                Progress::Continue
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use hazel_markup::buffer_queue::BufferQueue;
    use hazel_markup::{LocalName, Position};
    use tendril::{SliceExt, StrTendril};

    use super::interface::{CharacterTokens, EOFToken, NullCharacterToken, ParseError};
    use super::interface::{EndTag, StartTag, Tag, TagKind, TagToken, Token};
    use super::{TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts};

    // Collects non-character tokens along with the position they were
    // emitted at, for checking the (line, column) cursor.
    struct PositionMatch {
        tokens: RefCell<Vec<Token>>,
        current_str: RefCell<StrTendril>,
        positions: RefCell<Vec<(Token, Position)>>,
    }

    impl PositionMatch {
        fn new() -> PositionMatch {
            PositionMatch {
                tokens: RefCell::new(vec![]),
                current_str: RefCell::new(StrTendril::new()),
                positions: RefCell::new(vec![]),
            }
        }

        fn push(&self, token: Token, pos: Position) {
            self.finish_str();
            self.positions.borrow_mut().push((token, pos));
        }

        fn finish_str(&self) {
            if !self.current_str.borrow().is_empty() {
                let s = self.current_str.take();
                self.tokens.borrow_mut().push(CharacterTokens(s));
            }
        }
    }

    impl TokenSink for PositionMatch {
        type Handle = ();

        fn process_token(&self, token: Token, pos: Position) -> TokenSinkResult<Self::Handle> {
            match token {
                CharacterTokens(b) => {
                    self.current_str.borrow_mut().push_slice(&b);
                },

                NullCharacterToken => {
                    self.current_str.borrow_mut().push_char('\0');
                },

                ParseError(_) => {
                    panic!("unexpected parse error");
                },

                TagToken(mut t) => {
                    match t.kind {
                        EndTag => {
                            t.self_closing = false;
                            t.attrs = vec![];
                        },
                        _ => t.attrs.sort_by(|a1, a2| a1.name.cmp(&a2.name)),
                    }
                    self.push(TagToken(t), pos);
                },

                EOFToken => (),

                _ => self.push(token, pos),
            }
            TokenSinkResult::Continue
        }
    }

    fn tokenize(input: Vec<StrTendril>, opts: TokenizerOpts) -> Vec<(Token, Position)> {
        let sink = PositionMatch::new();
        let tok = Tokenizer::new(sink, opts);
        let buffer = BufferQueue::default();
        for chunk in input.into_iter() {
            buffer.push_back(chunk);
            let _ = tok.feed(&buffer);
        }
        tok.end();
        tok.sink.positions.take()
    }

    fn create_tag(name: StrTendril, kind: TagKind) -> Token {
        TagToken(Tag {
            kind,
            name: LocalName::from(&*name),
            self_closing: false,
            attrs: vec![],
        })
    }

    fn at(line: u64, column: u64) -> Position {
        Position { line, column }
    }

    #[test]
    fn check_lines() {
        let vector = vec![
            StrTendril::from("<a>\n"),
            StrTendril::from("<b>\n"),
            StrTendril::from("</b>\n"),
            StrTendril::from("</a>\n"),
        ];
        let expected = vec![
            (create_tag("a".to_tendril(), StartTag), at(1, 3)),
            (create_tag("b".to_tendril(), StartTag), at(2, 3)),
            (create_tag("b".to_tendril(), EndTag), at(3, 4)),
            (create_tag("a".to_tendril(), EndTag), at(4, 4)),
        ];
        let results = tokenize(vector, TokenizerOpts::default());
        assert_eq!(results, expected);
    }

    #[test]
    fn check_lines_with_crlf() {
        // CRLF is normalized to LF before the state machine sees it,
        // so positions are identical to the plain-LF case.
        let vector = vec![
            StrTendril::from("<a>\r\n"),
            StrTendril::from("<b>\r\n"),
            StrTendril::from("</b>\r\n"),
            StrTendril::from("</a>\r\n"),
        ];
        let expected = vec![
            (create_tag("a".to_tendril(), StartTag), at(1, 3)),
            (create_tag("b".to_tendril(), StartTag), at(2, 3)),
            (create_tag("b".to_tendril(), EndTag), at(3, 4)),
            (create_tag("a".to_tendril(), EndTag), at(4, 4)),
        ];
        let results = tokenize(vector, TokenizerOpts::default());
        assert_eq!(results, expected);
    }

    #[test]
    fn columns_advance_within_a_line() {
        let results = tokenize(vec![StrTendril::from("x<i>y</i>")], TokenizerOpts::default());
        assert_eq!(
            results,
            vec![
                (create_tag("i".to_tendril(), StartTag), at(1, 4)),
                (create_tag("i".to_tendril(), EndTag), at(1, 9)),
            ]
        );
    }

    #[test]
    fn raw_text_waits_for_the_appropriate_end_tag() {
        // `</span>` inside a title is text; only `</title>` ends the
        // RCDATA run.
        let opts = TokenizerOpts {
            initial_state: Some(super::states::State::Raw(super::states::RawKind::Rcdata)),
            last_start_tag_name: Some("title".to_string()),
            ..TokenizerOpts::default()
        };
        let results = tokenize(vec![StrTendril::from("a</span>b</title>")], opts);
        assert_eq!(
            results,
            vec![(create_tag("title".to_tendril(), EndTag), at(1, 17))]
        );
        // The rest of the input was character data, checked implicitly
        // by the absence of further tag tokens.
    }
}
