// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The fixed case-adjustment tables for foreign (SVG and MathML)
//! content, and the list of tags that break out of it.
//!
//! Tag and attribute names arrive lowercased from the tokenizer; SVG
//! wants a number of them in their original camelCase, and a few
//! attributes belong in the XLink, XML or XMLNS namespaces.

use hazel_markup::{ns, LocalName, Namespace, Prefix, QualName};

use crate::tokenizer::Tag;

/// SVG tag names whose casing is restored, e.g. `foreignobject` to
/// `foreignObject`.
static SVG_TAG_NAMES: &[(&str, &str)] = &[
    ("altglyph", "altGlyph"),
    ("altglyphdef", "altGlyphDef"),
    ("altglyphitem", "altGlyphItem"),
    ("animatecolor", "animateColor"),
    ("animatemotion", "animateMotion"),
    ("animatetransform", "animateTransform"),
    ("clippath", "clipPath"),
    ("feblend", "feBlend"),
    ("fecolormatrix", "feColorMatrix"),
    ("fecomponenttransfer", "feComponentTransfer"),
    ("fecomposite", "feComposite"),
    ("feconvolvematrix", "feConvolveMatrix"),
    ("fediffuselighting", "feDiffuseLighting"),
    ("fedisplacementmap", "feDisplacementMap"),
    ("fedistantlight", "feDistantLight"),
    ("fedropshadow", "feDropShadow"),
    ("feflood", "feFlood"),
    ("fefunca", "feFuncA"),
    ("fefuncb", "feFuncB"),
    ("fefuncg", "feFuncG"),
    ("fefuncr", "feFuncR"),
    ("fegaussianblur", "feGaussianBlur"),
    ("feimage", "feImage"),
    ("femerge", "feMerge"),
    ("femergenode", "feMergeNode"),
    ("femorphology", "feMorphology"),
    ("feoffset", "feOffset"),
    ("fepointlight", "fePointLight"),
    ("fespecularlighting", "feSpecularLighting"),
    ("fespotlight", "feSpotLight"),
    ("fetile", "feTile"),
    ("feturbulence", "feTurbulence"),
    ("foreignobject", "foreignObject"),
    ("glyphref", "glyphRef"),
    ("lineargradient", "linearGradient"),
    ("radialgradient", "radialGradient"),
    ("textpath", "textPath"),
];

/// SVG attribute names whose casing is restored.
static SVG_ATTRIBUTES: &[(&str, &str)] = &[
    ("attributename", "attributeName"),
    ("attributetype", "attributeType"),
    ("basefrequency", "baseFrequency"),
    ("baseprofile", "baseProfile"),
    ("calcmode", "calcMode"),
    ("clippathunits", "clipPathUnits"),
    ("diffuseconstant", "diffuseConstant"),
    ("edgemode", "edgeMode"),
    ("filterunits", "filterUnits"),
    ("glyphref", "glyphRef"),
    ("gradienttransform", "gradientTransform"),
    ("gradientunits", "gradientUnits"),
    ("kernelmatrix", "kernelMatrix"),
    ("kernelunitlength", "kernelUnitLength"),
    ("keypoints", "keyPoints"),
    ("keysplines", "keySplines"),
    ("keytimes", "keyTimes"),
    ("lengthadjust", "lengthAdjust"),
    ("limitingconeangle", "limitingConeAngle"),
    ("markerheight", "markerHeight"),
    ("markerunits", "markerUnits"),
    ("markerwidth", "markerWidth"),
    ("maskcontentunits", "maskContentUnits"),
    ("maskunits", "maskUnits"),
    ("numoctaves", "numOctaves"),
    ("pathlength", "pathLength"),
    ("patterncontentunits", "patternContentUnits"),
    ("patterntransform", "patternTransform"),
    ("patternunits", "patternUnits"),
    ("pointsatx", "pointsAtX"),
    ("pointsaty", "pointsAtY"),
    ("pointsatz", "pointsAtZ"),
    ("preservealpha", "preserveAlpha"),
    ("preserveaspectratio", "preserveAspectRatio"),
    ("primitiveunits", "primitiveUnits"),
    ("refx", "refX"),
    ("refy", "refY"),
    ("repeatcount", "repeatCount"),
    ("repeatdur", "repeatDur"),
    ("requiredextensions", "requiredExtensions"),
    ("requiredfeatures", "requiredFeatures"),
    ("specularconstant", "specularConstant"),
    ("specularexponent", "specularExponent"),
    ("spreadmethod", "spreadMethod"),
    ("startoffset", "startOffset"),
    ("stddeviation", "stdDeviation"),
    ("stitchtiles", "stitchTiles"),
    ("surfacescale", "surfaceScale"),
    ("systemlanguage", "systemLanguage"),
    ("tablevalues", "tableValues"),
    ("targetx", "targetX"),
    ("targety", "targetY"),
    ("textlength", "textLength"),
    ("viewbox", "viewBox"),
    ("viewtarget", "viewTarget"),
    ("xchannelselector", "xChannelSelector"),
    ("ychannelselector", "yChannelSelector"),
    ("zoomandpan", "zoomAndPan"),
];

/// MathML attribute names whose casing is restored.
static MATHML_ATTRIBUTES: &[(&str, &str)] = &[("definitionurl", "definitionURL")];

/// Attributes that move into a real namespace in foreign content:
/// `(name as tokenized, prefix, local name)`; the namespace follows
/// from the prefix.
static NAMESPACED_ATTRIBUTES: &[(&str, Option<&str>, &str)] = &[
    ("xlink:actuate", Some("xlink"), "actuate"),
    ("xlink:arcrole", Some("xlink"), "arcrole"),
    ("xlink:href", Some("xlink"), "href"),
    ("xlink:role", Some("xlink"), "role"),
    ("xlink:show", Some("xlink"), "show"),
    ("xlink:title", Some("xlink"), "title"),
    ("xlink:type", Some("xlink"), "type"),
    ("xml:lang", Some("xml"), "lang"),
    ("xml:space", Some("xml"), "space"),
    ("xmlns", None, "xmlns"),
    ("xmlns:xlink", Some("xmlns"), "xlink"),
];

fn lookup(table: &[(&str, &'static str)], name: &LocalName) -> Option<&'static str> {
    table
        .iter()
        .find(|&&(from, _)| from == &**name)
        .map(|&(_, to)| to)
}

pub(crate) fn adjust_svg_tag_name(tag: &mut Tag) {
    if let Some(restored) = lookup(SVG_TAG_NAMES, &tag.name) {
        tag.name = LocalName::from(restored);
    }
}

pub(crate) fn adjust_svg_attributes(tag: &mut Tag) {
    for attr in &mut tag.attrs {
        if let Some(restored) = lookup(SVG_ATTRIBUTES, &attr.name.local) {
            attr.name = QualName::new(None, ns!(), LocalName::from(restored));
        }
    }
}

pub(crate) fn adjust_mathml_attributes(tag: &mut Tag) {
    for attr in &mut tag.attrs {
        if let Some(restored) = lookup(MATHML_ATTRIBUTES, &attr.name.local) {
            attr.name = QualName::new(None, ns!(), LocalName::from(restored));
        }
    }
}

pub(crate) fn adjust_foreign_attributes(tag: &mut Tag) {
    for attr in &mut tag.attrs {
        let adjusted = NAMESPACED_ATTRIBUTES
            .iter()
            .find(|&&(from, _, _)| from == &*attr.name.local);
        if let Some(&(_, prefix, local)) = adjusted {
            let ns: Namespace = match prefix {
                Some("xlink") => ns!(xlink),
                Some("xml") => ns!(xml),
                _ => ns!(xmlns),
            };
            attr.name = QualName::new(prefix.map(Prefix::from), ns, LocalName::from(local));
        }
    }
}

/// Start tags that abort foreign content and fall back to the HTML
/// rules (`<font>` only when it carries a `color`, `face` or `size`
/// attribute, which the caller checks).
pub(crate) fn breaks_out_of_foreign(name: &LocalName) -> bool {
    matches!(
        &**name,
        "b" | "big" | "blockquote" | "body" | "br" | "center" | "code" | "dd" | "div" | "dl"
            | "dt" | "em" | "embed" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "head" | "hr"
            | "i" | "img" | "li" | "listing" | "menu" | "meta" | "nobr" | "ol" | "p" | "pre"
            | "ruby" | "s" | "small" | "span" | "strong" | "strike" | "sub" | "sup" | "table"
            | "tt" | "u" | "ul" | "var"
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokenizer::StartTag;
    use hazel_markup::Attribute;
    use tendril::StrTendril;

    fn tag_with_attr(name: &str, attr: &str) -> Tag {
        Tag {
            kind: StartTag,
            name: LocalName::from(name),
            self_closing: false,
            attrs: vec![Attribute {
                name: QualName::new(None, ns!(), LocalName::from(attr)),
                value: StrTendril::from_slice("v"),
            }],
        }
    }

    #[test]
    fn svg_casing_is_restored() {
        let mut tag = tag_with_attr("foreignobject", "viewbox");
        adjust_svg_tag_name(&mut tag);
        adjust_svg_attributes(&mut tag);
        assert_eq!(&*tag.name, "foreignObject");
        assert_eq!(&*tag.attrs[0].name.local, "viewBox");
    }

    #[test]
    fn xlink_attributes_gain_a_namespace() {
        let mut tag = tag_with_attr("a", "xlink:href");
        adjust_foreign_attributes(&mut tag);
        let name = &tag.attrs[0].name;
        assert_eq!(name.ns, ns!(xlink));
        assert_eq!(&*name.local, "href");
        assert_eq!(name.prefix.as_deref(), Some("xlink"));
    }

    #[test]
    fn unrelated_names_pass_through() {
        let mut tag = tag_with_attr("circle", "cx");
        adjust_svg_tag_name(&mut tag);
        adjust_svg_attributes(&mut tag);
        adjust_foreign_attributes(&mut tag);
        assert_eq!(&*tag.name, "circle");
        assert_eq!(&*tag.attrs[0].name.local, "cx");
        assert_eq!(tag.attrs[0].name.ns, ns!());
    }
}
