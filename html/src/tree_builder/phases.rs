// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The token handlers for each insertion mode, plus the
//! foreign-content rules. One method per mode; start and end tags
//! dispatch on the tag name inside it.
//!
//! Handlers update the current mode themselves and return a
//! [`Step`]: most tokens are consumed (`Done`), a few are handed
//! back for reprocessing (`Again`), and raw-text elements switch the
//! tokenizer (`RawText`, `Plaintext`, `Script`).

use std::borrow::Cow::Borrowed;

use tendril::SliceExt;

use hazel_markup::interface::{create_element, AppendNode, ElemName, TreeSink};
use hazel_markup::{ns, LocalName, Namespace, QualName};

use super::tags::{self, Scope};
use super::types::*;
use super::{data, foreign, QuirksMode, TreeBuilder};
use crate::tokenizer::states::RawKind::{Rawtext, Rcdata, ScriptData};
use crate::tokenizer::{Doctype, EndTag, StartTag, Tag};

impl<Handle, Sink> TreeBuilder<Handle, Sink>
where
    Handle: Clone,
    Sink: TreeSink<Handle = Handle>,
{
    /// Dispatch one token to the handler for `mode`.
    pub(crate) fn step(&self, mode: InsertionMode, token: Token) -> Step<Handle> {
        self.debug_step(mode, &token);

        if let Token::Doctype(doctype) = token {
            // Reachable only in the Initial mode; process_token drops
            // doctypes everywhere else.
            debug_assert_eq!(mode, InsertionMode::Initial);
            return self.doctype_in_initial(doctype);
        }

        match mode {
            InsertionMode::Initial => self.initial(token),
            InsertionMode::BeforeHtml => self.before_html(token),
            InsertionMode::BeforeHead => self.before_head(token),
            InsertionMode::InHead => self.in_head(token),
            InsertionMode::InHeadNoscript => self.in_head_noscript(token),
            InsertionMode::AfterHead => self.after_head(token),
            InsertionMode::InBody => self.in_body(token),
            InsertionMode::Text => self.text(token),
            InsertionMode::InTable => self.in_table(token),
            InsertionMode::InTableText => self.in_table_text(token),
            InsertionMode::InCaption => self.in_caption(token),
            InsertionMode::InColumnGroup => self.in_column_group(token),
            InsertionMode::InTableBody => self.in_table_body(token),
            InsertionMode::InRow => self.in_row(token),
            InsertionMode::InCell => self.in_cell(token),
            InsertionMode::InSelect => self.in_select(token),
            InsertionMode::InSelectInTable => self.in_select_in_table(token),
            InsertionMode::InTemplate => self.in_template(token),
            InsertionMode::AfterBody => self.after_body(token),
            InsertionMode::InFrameset => self.in_frameset(token),
            InsertionMode::AfterFrameset => self.after_frameset(token),
            InsertionMode::AfterAfterBody => self.after_after_body(token),
            InsertionMode::AfterAfterFrameset => self.after_after_frameset(token),
        }
    }

    //§ the-initial-insertion-mode
    fn doctype_in_initial(&self, doctype: Doctype) -> Step<Handle> {
        let (error, quirks) = data::doctype_error_and_quirks(&doctype, self.opts.iframe_srcdoc);
        if error {
            self.sink.parse_error(if self.opts.exact_errors {
                format!("Bad DOCTYPE: {doctype:?}").into()
            } else {
                Borrowed("Bad DOCTYPE")
            });
        }
        if !self.opts.drop_doctype {
            self.sink.append_doctype_to_document(
                doctype.name.unwrap_or_default(),
                doctype.public_id.unwrap_or_default(),
                doctype.system_id.unwrap_or_default(),
            );
        }
        self.set_quirks_mode(quirks);
        self.mode.set(InsertionMode::BeforeHtml);
        Step::Done
    }

    fn initial(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Spaces(_) => Step::Done,
            Token::Comment(text) => {
                self.add_comment_to_document(text);
                Step::Done
            },
            token => {
                // Everything else means the doctype is missing.
                if !self.opts.iframe_srcdoc {
                    self.unexpected(&token);
                    self.set_quirks_mode(QuirksMode::Quirks);
                }
                self.mode.set(InsertionMode::BeforeHtml);
                Step::Again(token)
            },
        }
    }

    //§ the-before-html-insertion-mode
    fn before_html(&self, token: Token) -> Step<Handle> {
        let make_root_and_retry = |token| {
            self.insert_root(vec![]);
            self.mode.set(InsertionMode::BeforeHead);
            Step::Again(token)
        };

        match token {
            Token::Spaces(_) => Step::Done,
            Token::Comment(text) => {
                self.add_comment_to_document(text);
                Step::Done
            },
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => {
                        self.insert_root(tag.attrs);
                        self.mode.set(InsertionMode::BeforeHead);
                        Step::Done
                    },
                    (EndTag, "head" | "body" | "html" | "br") => {
                        make_root_and_retry(Token::Tag(tag))
                    },
                    (EndTag, _) => self.unexpected(&tag),
                    _ => make_root_and_retry(Token::Tag(tag)),
                }
            },
            token => make_root_and_retry(token),
        }
    }

    //§ the-before-head-insertion-mode
    fn before_head(&self, token: Token) -> Step<Handle> {
        let make_head_and_retry = |token| {
            *self.head_pointer.borrow_mut() = Some(self.insert_html_element(LocalName::from("head")));
            self.mode.set(InsertionMode::InHead);
            Step::Again(token)
        };

        match token {
            Token::Spaces(_) => Step::Done,
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),
                    (StartTag, "head") => {
                        *self.head_pointer.borrow_mut() = Some(self.insert_element_for(tag));
                        self.mode.set(InsertionMode::InHead);
                        Step::Done
                    },
                    (EndTag, "head" | "body" | "html" | "br") => {
                        make_head_and_retry(Token::Tag(tag))
                    },
                    (EndTag, _) => self.unexpected(&tag),
                    _ => make_head_and_retry(Token::Tag(tag)),
                }
            },
            token => make_head_and_retry(token),
        }
    }

    //§ parsing-main-inhead
    fn in_head(&self, token: Token) -> Step<Handle> {
        let leave_head_and_retry = |token| {
            self.pop_current();
            self.mode.set(InsertionMode::AfterHead);
            Step::Again(token)
        };

        match token {
            Token::Spaces(text) => {
                self.add_text(text);
                Step::Done
            },
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),

                    (StartTag, "base" | "basefont" | "bgsound" | "link" | "meta") => {
                        // FIXME: a <meta charset=...> could switch the
                        // decoder, once one is attached.
                        self.insert_void_element_for(tag);
                        Step::Done
                    },

                    (StartTag, "title") => self.parse_as_raw_text(tag, Rcdata),

                    (StartTag, "noscript") if !self.opts.scripting_enabled => {
                        self.insert_element_for(tag);
                        self.mode.set(InsertionMode::InHeadNoscript);
                        Step::Done
                    },
                    (StartTag, "noframes" | "style" | "noscript") => {
                        self.parse_as_raw_text(tag, Rawtext)
                    },

                    (StartTag, "script") => {
                        // Scripts are created eagerly so a fragment
                        // parser can mark them already-started.
                        let element = create_element(
                            &self.sink,
                            QualName::new(None, ns!(html), LocalName::from("script")),
                            tag.attrs,
                        );
                        if self.is_fragment() {
                            self.sink.mark_script_already_started(&element);
                        }
                        let target = self.insertion_target(None);
                        self.attach(target, AppendNode(element.clone()));
                        self.open_elements.borrow_mut().push(element);
                        self.original_mode.set(Some(self.mode.get()));
                        self.mode.set(InsertionMode::Text);
                        Step::RawText(ScriptData)
                    },

                    (EndTag, "head") => {
                        self.pop_current();
                        self.mode.set(InsertionMode::AfterHead);
                        Step::Done
                    },

                    (StartTag, "template") => {
                        self.insert_element_for(tag);
                        self.insert_marker();
                        self.frameset_ok.set(false);
                        self.mode.set(InsertionMode::InTemplate);
                        self.template_modes
                            .borrow_mut()
                            .push(InsertionMode::InTemplate);
                        Step::Done
                    },

                    (EndTag, "template") => {
                        if !self.has_open_element("template") {
                            self.unexpected(&tag);
                        } else {
                            self.generate_all_implied_end_tags();
                            self.close_element("template");
                            self.clear_active_formatting_to_last_marker();
                            self.template_modes.borrow_mut().pop();
                            self.mode.set(self.reset_insertion_mode());
                        }
                        Step::Done
                    },

                    (EndTag, "body" | "html" | "br") => leave_head_and_retry(Token::Tag(tag)),

                    (StartTag, "head") | (EndTag, _) => self.unexpected(&tag),

                    _ => leave_head_and_retry(Token::Tag(tag)),
                }
            },
            token => leave_head_and_retry(token),
        }
    }

    //§ parsing-main-inheadnoscript
    fn in_head_noscript(&self, token: Token) -> Step<Handle> {
        let leave_noscript_and_retry = |token: Token| {
            self.unexpected(&token);
            self.pop_current();
            self.mode.set(InsertionMode::InHead);
            Step::Again(token)
        };

        match token {
            Token::Spaces(_) | Token::Comment(_) => self.in_head(token),
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),

                    (EndTag, "noscript") => {
                        self.pop_current();
                        self.mode.set(InsertionMode::InHead);
                        Step::Done
                    },

                    (StartTag, "basefont" | "bgsound" | "link" | "meta" | "noframes" | "style") => {
                        self.in_head(Token::Tag(tag))
                    },

                    (EndTag, "br") => leave_noscript_and_retry(Token::Tag(tag)),

                    (StartTag, "head" | "noscript") | (EndTag, _) => self.unexpected(&tag),

                    _ => leave_noscript_and_retry(Token::Tag(tag)),
                }
            },
            token => leave_noscript_and_retry(token),
        }
    }

    //§ the-after-head-insertion-mode
    fn after_head(&self, token: Token) -> Step<Handle> {
        let make_body_and_retry = |token| {
            self.insert_html_element(LocalName::from("body"));
            self.mode.set(InsertionMode::InBody);
            Step::Again(token)
        };

        match token {
            Token::Spaces(text) => {
                self.add_text(text);
                Step::Done
            },
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),

                    (StartTag, "body") => {
                        self.insert_element_for(tag);
                        self.frameset_ok.set(false);
                        self.mode.set(InsertionMode::InBody);
                        Step::Done
                    },

                    (StartTag, "frameset") => {
                        self.insert_element_for(tag);
                        self.mode.set(InsertionMode::InFrameset);
                        Step::Done
                    },

                    (
                        StartTag,
                        "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                        | "style" | "template" | "title",
                    ) => {
                        // Head content after the head: reopen the head
                        // for this one token.
                        self.unexpected(&tag);
                        let head = self
                            .head_pointer
                            .borrow()
                            .clone()
                            .expect("no head element");
                        self.open_elements.borrow_mut().push(head.clone());
                        let step = self.in_head(Token::Tag(tag));
                        self.remove_from_open_elements(&head);
                        step
                    },

                    (EndTag, "template") => self.in_head(Token::Tag(tag)),

                    (EndTag, "body" | "html" | "br") => make_body_and_retry(Token::Tag(tag)),

                    (StartTag, "head") | (EndTag, _) => self.unexpected(&tag),

                    _ => make_body_and_retry(Token::Tag(tag)),
                }
            },
            token => make_body_and_retry(token),
        }
    }

    //§ parsing-main-inbody
    pub(crate) fn in_body(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Null => self.unexpected(&token),
            Token::Spaces(text) => {
                self.reconstruct_active_formatting_elements();
                self.add_text(text);
                Step::Done
            },
            Token::Text(text) => {
                self.reconstruct_active_formatting_elements();
                self.frameset_ok.set(false);
                self.add_text(text);
                Step::Done
            },
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },
            Token::Eof => {
                if !self.template_modes.borrow().is_empty() {
                    self.in_template(Token::Eof)
                } else {
                    self.check_body_end_errors();
                    Step::Done
                }
            },
            Token::Tag(tag) => match tag.kind {
                StartTag => self.in_body_start_tag(tag),
                EndTag => self.in_body_end_tag(tag),
            },
            Token::Doctype(_) => unreachable!("doctype is handled before dispatch"),
        }
    }

    fn in_body_start_tag(&self, tag: Tag) -> Step<Handle> {
        let name = tag.name.clone();
        match &*name {
            "html" => {
                self.unexpected(&tag);
                if !self.has_open_element("template") {
                    let root = self.root_element();
                    self.sink.add_attrs_if_missing(&root, tag.attrs);
                }
                Step::Done
            },

            "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script" | "style"
            | "template" | "title" => self.in_head(Token::Tag(tag)),

            "body" => {
                self.unexpected(&tag);
                if self.open_elements.borrow().len() > 1 && !self.has_open_element("template") {
                    if let Some(body) = self.body_element() {
                        self.frameset_ok.set(false);
                        self.sink.add_attrs_if_missing(&body, tag.attrs);
                    }
                }
                Step::Done
            },

            "frameset" => {
                self.unexpected(&tag);
                if !self.frameset_ok.get() {
                    return Step::Done;
                }
                let Some(body) = self.body_element() else {
                    return Step::Done;
                };
                self.sink.remove_from_parent(&body);
                self.open_elements.borrow_mut().truncate(1);
                self.insert_element_for(tag);
                self.mode.set(InsertionMode::InFrameset);
                Step::Done
            },

            "address" | "article" | "aside" | "blockquote" | "center" | "details" | "dialog"
            | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer" | "header"
            | "hgroup" | "main" | "menu" | "nav" | "ol" | "p" | "search" | "section" | "summary"
            | "ul" => {
                self.close_p_if_in_button_scope();
                self.insert_element_for(tag);
                Step::Done
            },

            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.close_p_if_in_button_scope();
                if self.current_node_matches(tags::is_heading) {
                    self.sink.parse_error(Borrowed("nested heading tags"));
                    self.pop_current();
                }
                self.insert_element_for(tag);
                Step::Done
            },

            "pre" | "listing" => {
                self.close_p_if_in_button_scope();
                self.insert_element_for(tag);
                self.skip_next_newline.set(true);
                self.frameset_ok.set(false);
                Step::Done
            },

            "form" => {
                if self.form_pointer.borrow().is_some() && !self.has_open_element("template") {
                    self.sink.parse_error(Borrowed("nested forms"));
                } else {
                    self.close_p_if_in_button_scope();
                    let element = self.insert_element_for(tag);
                    if !self.has_open_element("template") {
                        *self.form_pointer.borrow_mut() = Some(element);
                    }
                }
                Step::Done
            },

            "li" | "dd" | "dt" => {
                let is_li = &*name == "li";
                self.frameset_ok.set(false);

                // Close an open item of the same family, unless a
                // special element (other than address, div, p)
                // intervenes.
                let mut to_close: Option<LocalName> = None;
                for node in self.open_elements.borrow().iter().rev() {
                    let elem = self.sink.elem_name(node);
                    let n = elem.expanded();
                    let in_html = *n.ns == ns!(html);
                    let closes = if is_li {
                        in_html && &**n.local == "li"
                    } else {
                        in_html && matches!(&**n.local, "dd" | "dt")
                    };
                    if closes {
                        to_close = Some(n.local.clone());
                        break;
                    }
                    if tags::is_special(n)
                        && !(in_html && matches!(&**n.local, "address" | "div" | "p"))
                    {
                        break;
                    }
                }
                if let Some(close) = to_close {
                    self.generate_implied_end_tags(Some(&close));
                    self.close_element(&close);
                }

                self.close_p_if_in_button_scope();
                self.insert_element_for(tag);
                Step::Done
            },

            "plaintext" => {
                self.close_p_if_in_button_scope();
                self.insert_element_for(tag);
                Step::Plaintext
            },

            "button" => {
                if self.name_in_scope("button", Scope::Default) {
                    self.sink.parse_error(Borrowed("nested buttons"));
                    self.generate_implied_end_tags(None);
                    self.pop_until_popped("button");
                }
                self.reconstruct_active_formatting_elements();
                self.insert_element_for(tag);
                self.frameset_ok.set(false);
                Step::Done
            },

            "a" => {
                // An unclosed <a> is adopted away first.
                if let Some((_, node, _)) = self.formatting_element_named("a") {
                    self.unexpected(&tag);
                    self.run_adoption_agency(tag.name.clone());
                    if let Some(i) = self.position_in_active_formatting(&node) {
                        self.active_formatting.borrow_mut().remove(i);
                    }
                    self.remove_from_open_elements(&node);
                }
                self.reconstruct_active_formatting_elements();
                self.insert_formatting_element_for(tag);
                Step::Done
            },

            "b" | "big" | "code" | "em" | "font" | "i" | "s" | "small" | "strike" | "strong"
            | "tt" | "u" => {
                self.reconstruct_active_formatting_elements();
                self.insert_formatting_element_for(tag);
                Step::Done
            },

            "nobr" => {
                self.reconstruct_active_formatting_elements();
                if self.name_in_scope("nobr", Scope::Default) {
                    self.sink.parse_error(Borrowed("Nested <nobr>"));
                    self.run_adoption_agency(tag.name.clone());
                    self.reconstruct_active_formatting_elements();
                }
                self.insert_formatting_element_for(tag);
                Step::Done
            },

            "applet" | "marquee" | "object" => {
                self.reconstruct_active_formatting_elements();
                self.insert_element_for(tag);
                self.insert_marker();
                self.frameset_ok.set(false);
                Step::Done
            },

            "table" => {
                if self.quirks_mode.get() != QuirksMode::Quirks {
                    self.close_p_if_in_button_scope();
                }
                self.insert_element_for(tag);
                self.frameset_ok.set(false);
                self.mode.set(InsertionMode::InTable);
                Step::Done
            },

            "area" | "br" | "embed" | "img" | "keygen" | "wbr" => {
                self.reconstruct_active_formatting_elements();
                self.insert_void_element_for(tag);
                self.frameset_ok.set(false);
                Step::Done
            },

            "input" => {
                let hidden = self.is_hidden_input(&tag);
                self.reconstruct_active_formatting_elements();
                self.insert_void_element_for(tag);
                if !hidden {
                    self.frameset_ok.set(false);
                }
                Step::Done
            },

            "param" | "source" | "track" => {
                self.insert_void_element_for(tag);
                Step::Done
            },

            "hr" => {
                self.close_p_if_in_button_scope();
                self.insert_void_element_for(tag);
                self.frameset_ok.set(false);
                Step::Done
            },

            "image" => {
                // The token is retried under its real name.
                self.unexpected(&tag);
                self.in_body_start_tag(Tag {
                    name: LocalName::from("img"),
                    ..tag
                })
            },

            "textarea" => {
                self.skip_next_newline.set(true);
                self.frameset_ok.set(false);
                self.parse_as_raw_text(tag, Rcdata)
            },

            "xmp" => {
                self.close_p_if_in_button_scope();
                self.reconstruct_active_formatting_elements();
                self.frameset_ok.set(false);
                self.parse_as_raw_text(tag, Rawtext)
            },

            "iframe" => {
                self.frameset_ok.set(false);
                self.parse_as_raw_text(tag, Rawtext)
            },

            "noembed" => self.parse_as_raw_text(tag, Rawtext),

            "select" => {
                self.reconstruct_active_formatting_elements();
                self.insert_element_for(tag);
                self.frameset_ok.set(false);
                // "As in body" may be running on behalf of a table
                // mode; the select mode has to match.
                self.mode.set(match self.mode.get() {
                    InsertionMode::InTable
                    | InsertionMode::InCaption
                    | InsertionMode::InTableBody
                    | InsertionMode::InRow
                    | InsertionMode::InCell => InsertionMode::InSelectInTable,
                    _ => InsertionMode::InSelect,
                });
                Step::Done
            },

            "optgroup" | "option" => {
                if self.current_node_is("option") {
                    self.pop_current();
                }
                self.reconstruct_active_formatting_elements();
                self.insert_element_for(tag);
                Step::Done
            },

            "rb" | "rtc" => {
                if self.name_in_scope("ruby", Scope::Default) {
                    self.generate_implied_end_tags(None);
                }
                if !self.current_node_is("ruby") {
                    self.unexpected(&tag);
                }
                self.insert_element_for(tag);
                Step::Done
            },

            "rp" | "rt" => {
                if self.name_in_scope("ruby", Scope::Default) {
                    self.generate_implied_end_tags(Some("rtc"));
                }
                if !self.current_node_is("rtc") && !self.current_node_is("ruby") {
                    self.unexpected(&tag);
                }
                self.insert_element_for(tag);
                Step::Done
            },

            "math" => self.enter_foreign(tag, ns!(mathml)),
            "svg" => self.enter_foreign(tag, ns!(svg)),

            "caption" | "col" | "colgroup" | "frame" | "head" | "tbody" | "td" | "tfoot" | "th"
            | "thead" | "tr" => self.unexpected(&tag),

            "noscript" if self.opts.scripting_enabled => self.parse_as_raw_text(tag, Rawtext),

            _ => {
                self.reconstruct_active_formatting_elements();
                self.insert_element_for(tag);
                Step::Done
            },
        }
    }

    fn in_body_end_tag(&self, tag: Tag) -> Step<Handle> {
        let name = tag.name.clone();
        match &*name {
            "template" => self.in_head(Token::Tag(tag)),

            "body" => {
                if self.name_in_scope("body", Scope::Default) {
                    self.check_body_end_errors();
                    self.mode.set(InsertionMode::AfterBody);
                } else {
                    self.sink
                        .parse_error(Borrowed("</body> with no <body> in scope"));
                }
                Step::Done
            },

            "html" => {
                if self.name_in_scope("body", Scope::Default) {
                    self.check_body_end_errors();
                    self.mode.set(InsertionMode::AfterBody);
                    Step::Again(Token::Tag(tag))
                } else {
                    self.sink
                        .parse_error(Borrowed("</html> with no <body> in scope"));
                    Step::Done
                }
            },

            "address" | "article" | "aside" | "blockquote" | "button" | "center" | "details"
            | "dialog" | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer"
            | "header" | "hgroup" | "listing" | "main" | "menu" | "nav" | "ol" | "pre" | "search"
            | "section" | "summary" | "ul" => {
                if self.name_in_scope(&name, Scope::Default) {
                    self.generate_implied_end_tags(None);
                    self.close_element(&name);
                } else {
                    self.unexpected(&tag);
                }
                Step::Done
            },

            "form" => {
                if !self.has_open_element("template") {
                    let node = self.form_pointer.borrow_mut().take();
                    let Some(node) = node else {
                        self.sink
                            .parse_error(Borrowed("Null form element pointer on </form>"));
                        return Step::Done;
                    };
                    if !self.node_in_scope(&node, Scope::Default) {
                        self.sink
                            .parse_error(Borrowed("Form element not in scope on </form>"));
                        return Step::Done;
                    }
                    self.generate_implied_end_tags(None);
                    let current = self.current_node().clone();
                    self.remove_from_open_elements(&node);
                    if !self.sink.same_node(&current, &node) {
                        self.sink
                            .parse_error(Borrowed("Bad open element on </form>"));
                    }
                } else {
                    if !self.name_in_scope("form", Scope::Default) {
                        self.sink
                            .parse_error(Borrowed("Form element not in scope on </form>"));
                        return Step::Done;
                    }
                    self.generate_implied_end_tags(None);
                    if !self.current_node_is("form") {
                        self.sink
                            .parse_error(Borrowed("Bad open element on </form>"));
                    }
                    self.pop_until_popped("form");
                }
                Step::Done
            },

            "p" => {
                if !self.name_in_scope("p", Scope::Button) {
                    self.sink.parse_error(Borrowed("No <p> tag to close"));
                    self.insert_html_element(LocalName::from("p"));
                }
                self.close_p_element();
                Step::Done
            },

            "li" | "dd" | "dt" => {
                let scope = if &*name == "li" {
                    Scope::ListItem
                } else {
                    Scope::Default
                };
                if self.name_in_scope(&name, scope) {
                    self.generate_implied_end_tags(Some(&name));
                    self.close_element(&name);
                } else {
                    self.sink.parse_error(Borrowed("No matching tag to close"));
                }
                Step::Done
            },

            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if self.any_in_scope(Scope::Default, tags::is_heading) {
                    self.generate_implied_end_tags(None);
                    if !self.current_node_is(&name) {
                        self.sink.parse_error(Borrowed("Closing wrong heading tag"));
                    }
                    self.pop_until(tags::is_heading);
                } else {
                    self.sink.parse_error(Borrowed("No heading tag to close"));
                }
                Step::Done
            },

            "a" | "b" | "big" | "code" | "em" | "font" | "i" | "nobr" | "s" | "small" | "strike"
            | "strong" | "tt" | "u" => {
                self.run_adoption_agency(tag.name);
                Step::Done
            },

            "applet" | "marquee" | "object" => {
                if self.name_in_scope(&name, Scope::Default) {
                    self.generate_implied_end_tags(None);
                    self.close_element(&name);
                    self.clear_active_formatting_to_last_marker();
                } else {
                    self.unexpected(&tag);
                }
                Step::Done
            },

            "br" => {
                // Treated as a start tag, minus its attributes.
                self.unexpected(&tag);
                self.in_body_start_tag(Tag {
                    kind: StartTag,
                    attrs: vec![],
                    ..tag
                })
            },

            _ => {
                self.any_other_end_tag(tag);
                Step::Done
            },
        }
    }

    //§ parsing-main-incdata
    fn text(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Spaces(text) | Token::Text(text) => {
                self.add_text(text);
                Step::Done
            },

            Token::Eof => {
                self.unexpected(&Token::Eof);
                if self.current_node_is("script") {
                    self.sink.mark_script_already_started(&self.current_node());
                }
                self.pop_current();
                self.mode
                    .set(self.original_mode.take().expect("no saved insertion mode"));
                Step::Again(Token::Eof)
            },

            Token::Tag(tag) => {
                debug_assert!(tag.kind == EndTag, "start tag cannot reach Text mode");
                let node = self.pop_current();
                self.mode
                    .set(self.original_mode.take().expect("no saved insertion mode"));
                if &*tag.name == "script" {
                    return Step::Script(node);
                }
                Step::Done
            },

            _ => unreachable!("impossible token in Text mode"),
        }
    }

    //§ parsing-main-intable
    fn in_table(&self, token: Token) -> Step<Handle> {
        match token {
            // Character tokens only start the pending-text excursion
            // when the current node can foster-parent them.
            Token::Null | Token::Spaces(_) | Token::Text(_) => {
                if self.current_node_matches(tags::fosters_children) {
                    debug_assert!(self.pending_table_text.borrow().is_empty());
                    self.original_mode.set(Some(self.mode.get()));
                    self.mode.set(InsertionMode::InTableText);
                    Step::Again(token)
                } else {
                    self.unexpected(&token);
                    self.foster_parent_in_body(token)
                }
            },

            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "caption") => {
                        self.clear_to_table_context();
                        self.insert_marker();
                        self.insert_element_for(tag);
                        self.mode.set(InsertionMode::InCaption);
                        Step::Done
                    },

                    (StartTag, "colgroup") => {
                        self.clear_to_table_context();
                        self.insert_element_for(tag);
                        self.mode.set(InsertionMode::InColumnGroup);
                        Step::Done
                    },

                    (StartTag, "col") => {
                        self.clear_to_table_context();
                        self.insert_html_element(LocalName::from("colgroup"));
                        self.mode.set(InsertionMode::InColumnGroup);
                        Step::Again(Token::Tag(tag))
                    },

                    (StartTag, "tbody" | "tfoot" | "thead") => {
                        self.clear_to_table_context();
                        self.insert_element_for(tag);
                        self.mode.set(InsertionMode::InTableBody);
                        Step::Done
                    },

                    (StartTag, "td" | "th" | "tr") => {
                        self.clear_to_table_context();
                        self.insert_html_element(LocalName::from("tbody"));
                        self.mode.set(InsertionMode::InTableBody);
                        Step::Again(Token::Tag(tag))
                    },

                    (StartTag, "table") => {
                        self.unexpected(&tag);
                        if self.name_in_scope("table", Scope::Table) {
                            self.pop_until_popped("table");
                            self.mode.set(self.reset_insertion_mode());
                            Step::Again(Token::Tag(tag))
                        } else {
                            Step::Done
                        }
                    },

                    (EndTag, "table") => {
                        if self.name_in_scope("table", Scope::Table) {
                            self.pop_until_popped("table");
                            self.mode.set(self.reset_insertion_mode());
                        } else {
                            self.unexpected(&tag);
                        }
                        Step::Done
                    },

                    (
                        EndTag,
                        "body" | "caption" | "col" | "colgroup" | "html" | "tbody" | "td"
                        | "tfoot" | "th" | "thead" | "tr",
                    ) => self.unexpected(&tag),

                    (StartTag, "style" | "script" | "template") | (EndTag, "template") => {
                        self.in_head(Token::Tag(tag))
                    },

                    (StartTag, "input") => {
                        self.unexpected(&tag);
                        if self.is_hidden_input(&tag) {
                            self.insert_void_element_for(tag);
                            Step::Done
                        } else {
                            self.foster_parent_in_body(Token::Tag(tag))
                        }
                    },

                    (StartTag, "form") => {
                        self.unexpected(&tag);
                        if !self.has_open_element("template")
                            && self.form_pointer.borrow().is_none()
                        {
                            let element = self.insert_element(
                                QualName::new(None, ns!(html), tag.name),
                                tag.attrs,
                                false,
                            );
                            *self.form_pointer.borrow_mut() = Some(element);
                        }
                        Step::Done
                    },

                    _ => {
                        self.unexpected(&tag);
                        self.foster_parent_in_body(Token::Tag(tag))
                    },
                }
            },

            Token::Eof => self.in_body(token),

            Token::Doctype(_) => unreachable!("doctype is handled before dispatch"),
        }
    }

    //§ parsing-main-intabletext
    fn in_table_text(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Null => self.unexpected(&token),

            Token::Spaces(_) | Token::Text(_) => {
                self.pending_table_text.borrow_mut().push(token);
                Step::Done
            },

            token => {
                let pending = self.pending_table_text.take();
                let misplaced = pending.iter().any(|t| matches!(t, Token::Text(_)));
                if misplaced {
                    self.sink.parse_error(Borrowed("Non-space table text"));
                }
                for t in pending {
                    if misplaced {
                        let _ = self.foster_parent_in_body(t);
                    } else if let Token::Spaces(text) | Token::Text(text) = t {
                        self.add_text(text);
                    }
                }
                self.mode
                    .set(self.original_mode.take().expect("no saved insertion mode"));
                Step::Again(token)
            },
        }
    }

    //§ parsing-main-incaption
    fn in_caption(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (
                        StartTag,
                        "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr",
                    )
                    | (EndTag, "table" | "caption") => {
                        if self.name_in_scope("caption", Scope::Table) {
                            self.generate_implied_end_tags(None);
                            self.close_element("caption");
                            self.clear_active_formatting_to_last_marker();
                            self.mode.set(InsertionMode::InTable);
                            if (tag.kind, &*name) == (EndTag, "caption") {
                                Step::Done
                            } else {
                                Step::Again(Token::Tag(tag))
                            }
                        } else {
                            self.unexpected(&tag)
                        }
                    },

                    (
                        EndTag,
                        "body" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th"
                        | "thead" | "tr",
                    ) => self.unexpected(&tag),

                    _ => self.in_body(Token::Tag(tag)),
                }
            },
            token => self.in_body(token),
        }
    }

    //§ parsing-main-incolgroup
    fn in_column_group(&self, token: Token) -> Step<Handle> {
        let leave_colgroup_and_retry = |token: Token| {
            if self.current_node_is("colgroup") {
                self.pop_current();
                self.mode.set(InsertionMode::InTable);
                Step::Again(token)
            } else {
                self.unexpected(&token)
            }
        };

        match token {
            Token::Spaces(text) => {
                self.add_text(text);
                Step::Done
            },
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),

                    (StartTag, "col") => {
                        self.insert_void_element_for(tag);
                        Step::Done
                    },

                    (EndTag, "colgroup") => {
                        if self.current_node_is("colgroup") {
                            self.pop_current();
                            self.mode.set(InsertionMode::InTable);
                        } else {
                            self.unexpected(&tag);
                        }
                        Step::Done
                    },

                    (EndTag, "col") => self.unexpected(&tag),

                    (StartTag, "template") | (EndTag, "template") => {
                        self.in_head(Token::Tag(tag))
                    },

                    _ => leave_colgroup_and_retry(Token::Tag(tag)),
                }
            },

            Token::Eof => self.in_body(token),

            token => leave_colgroup_and_retry(token),
        }
    }

    //§ parsing-main-intbody
    fn in_table_body(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "tr") => {
                        self.clear_to_table_body_context();
                        self.insert_element_for(tag);
                        self.mode.set(InsertionMode::InRow);
                        Step::Done
                    },

                    (StartTag, "th" | "td") => {
                        self.unexpected(&tag);
                        self.clear_to_table_body_context();
                        self.insert_html_element(LocalName::from("tr"));
                        self.mode.set(InsertionMode::InRow);
                        Step::Again(Token::Tag(tag))
                    },

                    (EndTag, "tbody" | "tfoot" | "thead") => {
                        if self.name_in_scope(&name, Scope::Table) {
                            self.clear_to_table_body_context();
                            self.pop_current();
                            self.mode.set(InsertionMode::InTable);
                        } else {
                            self.unexpected(&tag);
                        }
                        Step::Done
                    },

                    (StartTag, "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead")
                    | (EndTag, "table") => {
                        let any_body_in_scope = self.any_in_scope(Scope::Table, |n| {
                            *n.ns == ns!(html)
                                && matches!(&**n.local, "tbody" | "thead" | "tfoot")
                        });
                        if any_body_in_scope {
                            self.clear_to_table_body_context();
                            self.pop_current();
                            self.mode.set(InsertionMode::InTable);
                            Step::Again(Token::Tag(tag))
                        } else {
                            self.unexpected(&tag)
                        }
                    },

                    (
                        EndTag,
                        "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" | "tr",
                    ) => self.unexpected(&tag),

                    _ => self.in_table(Token::Tag(tag)),
                }
            },
            token => self.in_table(token),
        }
    }

    //§ parsing-main-intr
    fn in_row(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "th" | "td") => {
                        self.clear_to_table_row_context();
                        self.insert_element_for(tag);
                        self.mode.set(InsertionMode::InCell);
                        self.insert_marker();
                        Step::Done
                    },

                    (EndTag, "tr") => {
                        if self.name_in_scope("tr", Scope::Table) {
                            self.clear_to_table_row_context();
                            let row = self.pop_current();
                            debug_assert!(self.is_html_element_named(&row, "tr"));
                            self.mode.set(InsertionMode::InTableBody);
                        } else {
                            self.unexpected(&tag);
                        }
                        Step::Done
                    },

                    (StartTag, "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" | "tr")
                    | (EndTag, "table") => {
                        if self.name_in_scope("tr", Scope::Table) {
                            self.clear_to_table_row_context();
                            let row = self.pop_current();
                            debug_assert!(self.is_html_element_named(&row, "tr"));
                            self.mode.set(InsertionMode::InTableBody);
                            Step::Again(Token::Tag(tag))
                        } else {
                            self.unexpected(&tag)
                        }
                    },

                    (EndTag, "tbody" | "tfoot" | "thead") => {
                        if self.name_in_scope(&name, Scope::Table) {
                            if self.name_in_scope("tr", Scope::Table) {
                                self.clear_to_table_row_context();
                                let row = self.pop_current();
                                debug_assert!(self.is_html_element_named(&row, "tr"));
                                self.mode.set(InsertionMode::InTableBody);
                                Step::Again(Token::Tag(tag))
                            } else {
                                Step::Done
                            }
                        } else {
                            self.unexpected(&tag)
                        }
                    },

                    (EndTag, "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th") => {
                        self.unexpected(&tag)
                    },

                    _ => self.in_table(Token::Tag(tag)),
                }
            },
            token => self.in_table(token),
        }
    }

    //§ parsing-main-intd
    fn in_cell(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (EndTag, "td" | "th") => {
                        if self.name_in_scope(&name, Scope::Table) {
                            self.generate_implied_end_tags(None);
                            self.close_element(&name);
                            self.clear_active_formatting_to_last_marker();
                            self.mode.set(InsertionMode::InRow);
                        } else {
                            self.unexpected(&tag);
                        }
                        Step::Done
                    },

                    (
                        StartTag,
                        "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr",
                    ) => {
                        let cell_open = self.any_in_scope(Scope::Table, |n| {
                            *n.ns == ns!(html) && matches!(&**n.local, "td" | "th")
                        });
                        if cell_open {
                            self.close_cell();
                            self.mode.set(InsertionMode::InRow);
                            Step::Again(Token::Tag(tag))
                        } else {
                            self.unexpected(&tag)
                        }
                    },

                    (EndTag, "body" | "caption" | "col" | "colgroup" | "html") => {
                        self.unexpected(&tag)
                    },

                    (EndTag, "table" | "tbody" | "tfoot" | "thead" | "tr") => {
                        if self.name_in_scope(&name, Scope::Table) {
                            self.close_cell();
                            self.mode.set(InsertionMode::InRow);
                            Step::Again(Token::Tag(tag))
                        } else {
                            self.unexpected(&tag)
                        }
                    },

                    _ => self.in_body(Token::Tag(tag)),
                }
            },
            token => self.in_body(token),
        }
    }

    //§ parsing-main-inselect
    fn in_select(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Null => self.unexpected(&token),
            Token::Spaces(text) | Token::Text(text) => {
                self.add_text(text);
                Step::Done
            },
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),

                    (StartTag, "option") => {
                        if self.current_node_is("option") {
                            self.pop_current();
                        }
                        self.insert_element_for(tag);
                        Step::Done
                    },

                    (StartTag, "optgroup") => {
                        if self.current_node_is("option") {
                            self.pop_current();
                        }
                        if self.current_node_is("optgroup") {
                            self.pop_current();
                        }
                        self.insert_element_for(tag);
                        Step::Done
                    },

                    (StartTag, "hr") => {
                        if self.current_node_is("option") {
                            self.pop_current();
                        }
                        if self.current_node_is("optgroup") {
                            self.pop_current();
                        }
                        self.insert_void_element_for(tag);
                        Step::Done
                    },

                    (EndTag, "optgroup") => {
                        let under_optgroup = {
                            let open = self.open_elements.borrow();
                            open.len() >= 2
                                && self.is_html_element_named(&open[open.len() - 2], "optgroup")
                        };
                        if under_optgroup && self.current_node_is("option") {
                            self.pop_current();
                        }
                        if self.current_node_is("optgroup") {
                            self.pop_current();
                        } else {
                            self.unexpected(&tag);
                        }
                        Step::Done
                    },

                    (EndTag, "option") => {
                        if self.current_node_is("option") {
                            self.pop_current();
                        } else {
                            self.unexpected(&tag);
                        }
                        Step::Done
                    },

                    (StartTag, "select") | (EndTag, "select") => {
                        let in_scope = self.name_in_scope("select", Scope::Select);
                        if !in_scope || tag.kind == StartTag {
                            self.unexpected(&tag);
                        }
                        if in_scope {
                            self.pop_until_popped("select");
                            self.mode.set(self.reset_insertion_mode());
                        }
                        Step::Done
                    },

                    (StartTag, "input" | "keygen" | "textarea") => {
                        self.unexpected(&tag);
                        if self.name_in_scope("select", Scope::Select) {
                            self.pop_until_popped("select");
                            self.mode.set(self.reset_insertion_mode());
                            Step::Again(Token::Tag(tag))
                        } else {
                            Step::Done
                        }
                    },

                    (StartTag, "script" | "template") | (EndTag, "template") => {
                        self.in_head(Token::Tag(tag))
                    },

                    _ => self.unexpected(&tag),
                }
            },

            Token::Eof => self.in_body(token),

            Token::Doctype(_) => unreachable!("doctype is handled before dispatch"),
        }
    }

    //§ parsing-main-inselectintable
    fn in_select_in_table(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (
                        StartTag,
                        "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th",
                    ) => {
                        self.unexpected(&tag);
                        self.pop_until_popped("select");
                        self.mode.set(self.reset_insertion_mode());
                        Step::Again(Token::Tag(tag))
                    },

                    (
                        EndTag,
                        "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th",
                    ) => {
                        self.unexpected(&tag);
                        if self.name_in_scope(&name, Scope::Table) {
                            self.pop_until_popped("select");
                            self.mode.set(self.reset_insertion_mode());
                            Step::Again(Token::Tag(tag))
                        } else {
                            Step::Done
                        }
                    },

                    _ => self.in_select(Token::Tag(tag)),
                }
            },
            token => self.in_select(token),
        }
    }

    //§ parsing-main-intemplate
    fn in_template(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Null | Token::Spaces(_) | Token::Text(_) | Token::Comment(_) => {
                self.in_body(token)
            },

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (
                        StartTag,
                        "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                        | "style" | "template" | "title",
                    )
                    | (EndTag, "template") => self.in_head(Token::Tag(tag)),

                    (StartTag, "caption" | "colgroup" | "tbody" | "tfoot" | "thead") => {
                        self.retry_in_template_as(InsertionMode::InTable, tag)
                    },
                    (StartTag, "col") => {
                        self.retry_in_template_as(InsertionMode::InColumnGroup, tag)
                    },
                    (StartTag, "tr") => self.retry_in_template_as(InsertionMode::InTableBody, tag),
                    (StartTag, "td" | "th") => self.retry_in_template_as(InsertionMode::InRow, tag),
                    (StartTag, _) => self.retry_in_template_as(InsertionMode::InBody, tag),

                    (EndTag, _) => self.unexpected(&tag),
                }
            },

            Token::Eof => {
                if !self.has_open_element("template") {
                    // Parsing can just stop.
                    return Step::Done;
                }
                self.unexpected(&Token::Eof);
                self.pop_until_popped("template");
                self.clear_active_formatting_to_last_marker();
                self.template_modes.borrow_mut().pop();
                self.mode.set(self.reset_insertion_mode());
                Step::Again(Token::Eof)
            },

            Token::Doctype(_) => unreachable!("doctype is handled before dispatch"),
        }
    }

    /// Replace the current template insertion mode and reprocess the
    /// tag there.
    fn retry_in_template_as(&self, mode: InsertionMode, tag: Tag) -> Step<Handle> {
        self.template_modes.borrow_mut().pop();
        self.template_modes.borrow_mut().push(mode);
        self.mode.set(mode);
        Step::Again(Token::Tag(tag))
    }

    //§ parsing-main-afterbody
    fn after_body(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Spaces(_) => self.in_body(token),
            Token::Comment(text) => {
                self.add_comment_to_root(text);
                Step::Done
            },
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),
                    (EndTag, "html") => {
                        if self.is_fragment() {
                            self.unexpected(&tag);
                        } else {
                            self.mode.set(InsertionMode::AfterAfterBody);
                        }
                        Step::Done
                    },
                    _ => {
                        self.unexpected(&tag);
                        self.mode.set(InsertionMode::InBody);
                        Step::Again(Token::Tag(tag))
                    },
                }
            },
            Token::Eof => Step::Done,
            token => {
                self.unexpected(&token);
                self.mode.set(InsertionMode::InBody);
                Step::Again(token)
            },
        }
    }

    //§ parsing-main-inframeset
    fn in_frameset(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Spaces(text) => {
                self.add_text(text);
                Step::Done
            },
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),

                    (StartTag, "frameset") => {
                        self.insert_element_for(tag);
                        Step::Done
                    },

                    (EndTag, "frameset") => {
                        if self.open_elements.borrow().len() == 1 {
                            self.unexpected(&tag);
                        } else {
                            self.pop_current();
                            if !self.is_fragment() && !self.current_node_is("frameset") {
                                self.mode.set(InsertionMode::AfterFrameset);
                            }
                        }
                        Step::Done
                    },

                    (StartTag, "frame") => {
                        self.insert_void_element_for(tag);
                        Step::Done
                    },

                    (StartTag, "noframes") => self.in_head(Token::Tag(tag)),

                    _ => self.unexpected(&tag),
                }
            },
            Token::Eof => {
                if self.open_elements.borrow().len() != 1 {
                    self.unexpected(&token);
                }
                Step::Done
            },
            token => self.unexpected(&token),
        }
    }

    //§ parsing-main-afterframeset
    fn after_frameset(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Spaces(text) => {
                self.add_text(text);
                Step::Done
            },
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),
                    (EndTag, "html") => {
                        self.mode.set(InsertionMode::AfterAfterFrameset);
                        Step::Done
                    },
                    (StartTag, "noframes") => self.in_head(Token::Tag(tag)),
                    _ => self.unexpected(&tag),
                }
            },
            Token::Eof => Step::Done,
            token => self.unexpected(&token),
        }
    }

    //§ the-after-after-body-insertion-mode
    fn after_after_body(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Comment(text) => {
                self.add_comment_to_document(text);
                Step::Done
            },
            Token::Spaces(_) => self.in_body(token),
            Token::Tag(tag) => {
                if tag.kind == StartTag && &*tag.name == "html" {
                    self.in_body(Token::Tag(tag))
                } else {
                    self.unexpected(&tag);
                    self.mode.set(InsertionMode::InBody);
                    Step::Again(Token::Tag(tag))
                }
            },
            Token::Eof => Step::Done,
            token => {
                self.unexpected(&token);
                self.mode.set(InsertionMode::InBody);
                Step::Again(token)
            },
        }
    }

    //§ the-after-after-frameset-insertion-mode
    fn after_after_frameset(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Comment(text) => {
                self.add_comment_to_document(text);
                Step::Done
            },
            Token::Spaces(_) => self.in_body(token),
            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (StartTag, "html") => self.in_body(Token::Tag(tag)),
                    (StartTag, "noframes") => self.in_head(Token::Tag(tag)),
                    _ => self.unexpected(&tag),
                }
            },
            Token::Eof => Step::Done,
            token => self.unexpected(&token),
        }
    }

    //§ parsing-main-inforeign
    pub(crate) fn foreign_content(&self, token: Token) -> Step<Handle> {
        match token {
            Token::Null => {
                self.unexpected(&token);
                self.add_text("\u{fffd}".to_tendril());
                Step::Done
            },
            Token::Spaces(text) => {
                self.add_text(text);
                Step::Done
            },
            Token::Text(text) => {
                self.frameset_ok.set(false);
                self.add_text(text);
                Step::Done
            },
            Token::Comment(text) => {
                self.add_comment(text);
                Step::Done
            },

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match tag.kind {
                    StartTag => {
                        let font_breaks_out = &*name == "font"
                            && tag.attrs.iter().any(|a| {
                                a.name.ns == ns!()
                                    && matches!(&*a.name.local, "color" | "face" | "size")
                            });
                        if foreign::breaks_out_of_foreign(&name) || font_breaks_out {
                            self.unexpected(&tag);
                            self.pop_to_html_or_integration_point();
                            Step::Again(Token::Tag(tag))
                        } else {
                            self.foreign_start_tag(tag)
                        }
                    },

                    EndTag if matches!(&*name, "br" | "p") => {
                        self.unexpected(&tag);
                        self.pop_to_html_or_integration_point();
                        Step::Again(Token::Tag(tag))
                    },

                    EndTag => self.foreign_end_tag(tag),
                }
            },

            Token::Doctype(_) | Token::Eof => unreachable!("not dispatched to foreign content"),
        }
    }

    /// Enter MathML or SVG from the InBody mode.
    fn enter_foreign(&self, mut tag: Tag, ns: Namespace) -> Step<Handle> {
        match ns {
            ns!(mathml) => foreign::adjust_mathml_attributes(&mut tag),
            ns!(svg) => foreign::adjust_svg_attributes(&mut tag),
            _ => (),
        }
        foreign::adjust_foreign_attributes(&mut tag);
        self.insert_foreign_element_for(tag, ns)
    }

    /// A start tag inside foreign content stays in the namespace of
    /// the adjusted current node.
    fn foreign_start_tag(&self, mut tag: Tag) -> Step<Handle> {
        let ns = self
            .sink
            .elem_name(&self.adjusted_current_node())
            .ns()
            .clone();
        match ns {
            ns!(mathml) => foreign::adjust_mathml_attributes(&mut tag),
            ns!(svg) => {
                foreign::adjust_svg_tag_name(&mut tag);
                foreign::adjust_svg_attributes(&mut tag);
            },
            _ => (),
        }
        foreign::adjust_foreign_attributes(&mut tag);
        self.insert_foreign_element_for(tag, ns)
    }

    /// Unwind foreign elements until the HTML rules apply again.
    fn pop_to_html_or_integration_point(&self) {
        while !self.current_node_matches(|n| {
            *n.ns == ns!(html)
                || tags::is_mathml_text_integration_point(n)
                || tags::is_svg_html_integration_point(n)
        }) {
            self.pop_current();
        }
    }

    /// An end tag in foreign content closes the nearest foreign
    /// element with that (case-insensitive) name; an HTML ancestor
    /// before one hands the tag to the HTML rules instead.
    fn foreign_end_tag(&self, tag: Tag) -> Step<Handle> {
        let top = self.open_elements.borrow().len() - 1;
        let mut index = top;
        loop {
            if index == 0 {
                // Fragment case: only the root is left.
                return Step::Done;
            }

            let node = self.open_elements.borrow()[index].clone();
            let (is_html, name_matches) = {
                let elem = self.sink.elem_name(&node);
                (
                    *elem.ns() == ns!(html),
                    elem.local_name().eq_ignore_ascii_case(&tag.name),
                )
            };

            if index != top && is_html {
                let mode = self.mode.get();
                return self.step(mode, Token::Tag(tag));
            }

            if name_matches {
                self.open_elements.borrow_mut().truncate(index);
                return Step::Done;
            }

            if index == top {
                self.unexpected(&tag);
            }
            index -= 1;
        }
    }
}
