// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end tree-construction tests: literal inputs against
//! expected tree outlines.

mod util;

use hazel::interface::QuirksMode;
use hazel::local_name;
use util::{body, dump, head, parse, parse_frag};

#[test]
fn minimal_well_formed_document() {
    let dom = parse("<!DOCTYPE html><html><body><p>hi</p></body></html>");
    assert_eq!(
        dump(&dom.document),
        "<!DOCTYPE html>\n\
         <html>\n\
        \x20 <head>\n\
        \x20 <body>\n\
        \x20   <p>\n\
        \x20     \"hi\"\n"
    );
    assert_eq!(dom.errors.borrow().len(), 0, "{:?}", dom.errors.borrow());
    assert_eq!(dom.quirks_mode.get(), QuirksMode::NoQuirks);
}

#[test]
fn implied_html_head_and_body() {
    let dom = parse("<p>hi</p>");
    assert_eq!(
        dump(&dom.document),
        "<html>\n\
        \x20 <head>\n\
        \x20 <body>\n\
        \x20   <p>\n\
        \x20     \"hi\"\n"
    );
    // Missing doctype is a parse error (and quirks mode).
    assert!(!dom.errors.borrow().is_empty());
    assert_eq!(dom.quirks_mode.get(), QuirksMode::Quirks);
}

#[test]
fn optional_tags_do_not_change_the_tree() {
    let implied = parse("<p>hi</p>");
    let spelled_out = parse("<html><head></head><body><p>hi</p></body></html>");
    assert_eq!(dump(&implied.document), dump(&spelled_out.document));
}

#[test]
fn misnested_formatting_runs_the_adoption_agency() {
    let dom = parse("<!DOCTYPE html><p>1<b>2<i>3</b>4</i>5</p>");
    assert_eq!(
        dump(&body(&dom)),
        "<p>\n\
        \x20 \"1\"\n\
        \x20 <b>\n\
        \x20   \"2\"\n\
        \x20   <i>\n\
        \x20     \"3\"\n\
        \x20 <i>\n\
        \x20   \"4\"\n\
        \x20 \"5\"\n"
    );
}

#[test]
fn table_text_is_foster_parented() {
    let dom = parse("<!DOCTYPE html><table>abc<tr><td>x</table>");
    assert_eq!(
        dump(&body(&dom)),
        "\"abc\"\n\
         <table>\n\
        \x20 <tbody>\n\
        \x20   <tr>\n\
        \x20     <td>\n\
        \x20       \"x\"\n"
    );
}

#[test]
fn svg_subtree_keeps_its_namespace_and_casing() {
    let dom = parse("<!DOCTYPE html><svg><g><foreignObject><p>hi</p></foreignObject></g></svg>");
    assert_eq!(
        dump(&body(&dom)),
        "<svg svg>\n\
        \x20 <svg g>\n\
        \x20   <svg foreignObject>\n\
        \x20     <p>\n\
        \x20       \"hi\"\n"
    );
}

#[test]
fn svg_attributes_are_case_adjusted() {
    let dom = parse(
        "<!DOCTYPE html><svg viewbox=\"0 0 1 1\"><a xlink:href=\"x\">y</a></svg>",
    );
    assert_eq!(
        dump(&body(&dom)),
        "<svg svg viewBox=\"0 0 1 1\">\n\
        \x20 <svg a xlink href=\"x\">\n\
        \x20   \"y\"\n"
    );
}

#[test]
fn math_annotation_xml_is_an_integration_point() {
    let dom = parse(
        "<!DOCTYPE html><math><annotation-xml encoding=\"text/html\"><p>hi</p></annotation-xml></math>",
    );
    assert_eq!(
        dump(&body(&dom)),
        "<math math>\n\
        \x20 <math annotation-xml encoding=\"text/html\">\n\
        \x20   <p>\n\
        \x20     \"hi\"\n"
    );
}

#[test]
fn template_children_go_into_the_content_fragment() {
    let dom = parse("<!DOCTYPE html><template><p>x</p></template>");
    assert_eq!(
        dump(&head(&dom)),
        "<template>\n\
        \x20 content\n\
        \x20   <p>\n\
        \x20     \"x\"\n"
    );
}

#[test]
fn character_references_resolve_in_text() {
    let dom = parse("<!DOCTYPE html><p>&amp; &notin; &not x &AElig</p>");
    assert_eq!(
        dump(&body(&dom)),
        "<p>\n\
        \x20 \"& \u{2209} \u{ac} x \u{c6}\"\n"
    );
}

#[test]
fn legacy_reference_in_attribute_stays_literal_before_equals() {
    // "&copy" would resolve in text, but in an attribute value a
    // following `=` or alphanumeric keeps the ampersand literal.
    let dom = parse("<!DOCTYPE html><a href=\"?a=b&copy=1\" title=\"&copy;\">x</a>");
    assert_eq!(
        dump(&body(&dom)),
        "<a href=\"?a=b&copy=1\" title=\"\u{a9}\">\n\
        \x20 \"x\"\n"
    );
}

#[test]
fn script_content_is_raw_text() {
    let dom = parse("<!DOCTYPE html><body><script>if (a < b) x();</script>");
    assert_eq!(
        dump(&body(&dom)),
        "<script>\n\
        \x20 \"if (a < b) x();\"\n"
    );
}

#[test]
fn rcdata_resolves_references_but_not_tags() {
    let dom = parse("<!DOCTYPE html><title>a &amp; <b></title>");
    assert_eq!(
        dump(&head(&dom)),
        "<title>\n\
        \x20 \"a & <b>\"\n"
    );
}

#[test]
fn comments_attach_where_they_appear() {
    let dom = parse("<!-- before --><!DOCTYPE html><p>x</p><!-- after -->");
    let out = dump(&dom.document);
    assert!(out.starts_with("<!--  before  -->\n"), "{out}");
    assert!(out.contains("<!--  after  -->"), "{out}");
}

#[test]
fn reconstruction_is_bounded_by_noahs_ark() {
    // Four identical <b> elements are left open; only three survive in
    // the list of active formatting elements, so the second paragraph
    // reconstructs exactly three.
    let dom = parse("<!DOCTYPE html><p><b><b><b><b>a<p>b");
    assert_eq!(
        dump(&body(&dom)),
        "<p>\n\
        \x20 <b>\n\
        \x20   <b>\n\
        \x20     <b>\n\
        \x20       <b>\n\
        \x20         \"a\"\n\
         <p>\n\
        \x20 <b>\n\
        \x20   <b>\n\
        \x20     <b>\n\
        \x20       \"b\"\n"
    );
}

#[test]
fn quirks_mode_doctype_is_detected() {
    let dom = parse("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\"><p>x");
    assert_eq!(dom.quirks_mode.get(), QuirksMode::Quirks);
}

#[test]
fn quirks_mode_table_does_not_close_p() {
    let quirks = parse("<!DOCTYPE html PUBLIC \"html\"><p><table></table>");
    assert_eq!(
        dump(&body(&quirks)),
        "<p>\n\
        \x20 <table>\n"
    );

    let standards = parse("<!DOCTYPE html><p><table></table>");
    assert_eq!(
        dump(&body(&standards)),
        "<p>\n\
         <table>\n"
    );
}

#[test]
fn plaintext_swallows_everything() {
    let dom = parse("<!DOCTYPE html><body><plaintext></plaintext>x");
    assert_eq!(
        dump(&body(&dom)),
        "<plaintext>\n\
        \x20 \"</plaintext>x\"\n"
    );
}

#[test]
fn duplicate_attributes_are_dropped_with_an_error() {
    let dom = parse("<!DOCTYPE html><p id=\"a\" id=\"b\">x</p>");
    assert_eq!(
        dump(&body(&dom)),
        "<p id=\"a\">\n\
        \x20 \"x\"\n"
    );
    assert!(!dom.errors.borrow().is_empty());
}

#[test]
fn newline_conventions_are_equivalent() {
    let lf = parse("<!DOCTYPE html><pre>a\nb</pre>\n<p>x</p>");
    let crlf = parse("<!DOCTYPE html><pre>a\r\nb</pre>\r\n<p>x</p>");
    let cr = parse("<!DOCTYPE html><pre>a\rb</pre>\r<p>x</p>");
    assert_eq!(dump(&lf.document), dump(&crlf.document));
    assert_eq!(dump(&lf.document), dump(&cr.document));
}

#[test]
fn fragment_parsing_in_a_table_context() {
    let dom = parse_frag(local_name!("table"), "<tr><td>hi");
    // The fragment's nodes hang off the html root created for the
    // fragment algorithm.
    let html = dom.document.children.borrow()[0].clone();
    assert_eq!(
        dump(&html),
        "<tbody>\n\
        \x20 <tr>\n\
        \x20   <td>\n\
        \x20     \"hi\"\n"
    );
}

#[test]
fn fragment_parsing_in_a_div_context() {
    let dom = parse_frag(local_name!("div"), "<p>one<p>two");
    let html = dom.document.children.borrow()[0].clone();
    assert_eq!(
        dump(&html),
        "<p>\n\
        \x20 \"one\"\n\
         <p>\n\
        \x20 \"two\"\n"
    );
}

#[test]
fn fragment_parsing_in_a_title_context_is_rcdata() {
    let dom = parse_frag(local_name!("title"), "<b>&amp;</b>");
    let html = dom.document.children.borrow()[0].clone();
    assert_eq!(dump(&html), "\"<b>&</b>\"\n");
}

#[test]
fn eof_in_a_tag_is_recovered() {
    let dom = parse("<!DOCTYPE html><p>x<a href=");
    assert_eq!(
        dump(&body(&dom)),
        "<p>\n\
        \x20 \"x\"\n"
    );
    assert!(!dom.errors.borrow().is_empty());
}

#[test]
fn errors_carry_positions() {
    let dom = parse("<!DOCTYPE html>\n<p>\n</b>x");
    let errors = dom.errors.borrow();
    assert!(!errors.is_empty());
    // The stray </b> is reported on line 3.
    assert!(
        errors.iter().any(|e| e.position.line == 3),
        "{errors:?}"
    );
}
