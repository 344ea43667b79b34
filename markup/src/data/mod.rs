// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Static data tables consumed by the tokenizer.

pub use phf::Map;

/// The spec replaces most characters in the ISO-2022 C1 control code
/// range (U+0080 through U+009F) with these characters, based on
/// Windows 8-bit codepages.
pub static C1_REPLACEMENTS: [Option<char>; 32] = [
    Some('\u{20ac}'),
    None,
    Some('\u{201a}'),
    Some('\u{0192}'),
    Some('\u{201e}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02c6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017d}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201c}'),
    Some('\u{201d}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02dc}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203a}'),
    Some('\u{0153}'),
    None,
    Some('\u{017e}'),
    Some('\u{0178}'),
];

include!(concat!(env!("OUT_DIR"), "/named_entities.rs"));

#[cfg(test)]
mod test {
    use super::NAMED_ENTITIES;

    #[test]
    fn full_matches_resolve() {
        assert_eq!(NAMED_ENTITIES.get("amp;"), Some(&[0x26, 0]));
        assert_eq!(NAMED_ENTITIES.get("amp"), Some(&[0x26, 0]));
        assert_eq!(NAMED_ENTITIES.get("not;"), Some(&[0xAC, 0]));
        assert_eq!(NAMED_ENTITIES.get("notin;"), Some(&[0x2209, 0]));
    }

    #[test]
    fn prefixes_are_marked() {
        // "noti" can only continue towards "notin;" and friends.
        assert_eq!(NAMED_ENTITIES.get("noti"), Some(&[0, 0]));
        assert_eq!(NAMED_ENTITIES.get("a"), Some(&[0, 0]));
        assert_eq!(NAMED_ENTITIES.get("zzz"), None);
    }

    #[test]
    fn surrogate_pair_references() {
        // A handful of names expand to two scalars.
        assert_eq!(NAMED_ENTITIES.get("NotEqualTilde;"), Some(&[0x2242, 0x338]));
        assert_eq!(NAMED_ENTITIES.get("fjlig;"), Some(&[0x66, 0x6A]));
    }
}
