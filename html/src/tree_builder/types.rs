// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Types used within the tree builder code. Not exported to users.

use tendril::StrTendril;

use crate::tokenizer::states::RawKind;
use crate::tokenizer::{Doctype, Tag};

/// The insertion modes of the standard.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum InsertionMode {
    Initial,
    BeforeHtml,
    BeforeHead,
    InHead,
    InHeadNoscript,
    AfterHead,
    InBody,
    Text,
    InTable,
    InTableText,
    InCaption,
    InColumnGroup,
    InTableBody,
    InRow,
    InCell,
    InSelect,
    InSelectInTable,
    InTemplate,
    AfterBody,
    InFrameset,
    AfterFrameset,
    AfterAfterBody,
    AfterAfterFrameset,
}

/// The token vocabulary of the insertion modes.
///
/// Character data arrives pre-split into maximal runs that are either
/// all whitespace ([`Spaces`]) or contain at least one other character
/// ([`Text`]), since nearly every mode distinguishes exactly those two
/// cases. U+0000 is delivered on its own as [`Null`].
///
/// [`Spaces`]: Token::Spaces
/// [`Text`]: Token::Text
/// [`Null`]: Token::Null
#[derive(PartialEq, Eq, Clone, Debug)]
pub(crate) enum Token {
    Doctype(Doctype),
    Tag(Tag),
    Comment(StrTendril),
    Spaces(StrTendril),
    Text(StrTendril),
    Null,
    Eof,
}

/// The outcome of handing one token to an insertion mode.
///
/// Mode handlers update the current mode themselves; `Again` just
/// says "run the dispatch once more with this token", which also
/// repeats the foreign-content check.
pub(crate) enum Step<Handle> {
    /// The token has been fully consumed.
    Done,
    /// Reprocess the given token (the mode usually changed).
    Again(Token),
    /// A raw-text element was opened; the tokenizer must switch.
    RawText(RawKind),
    /// A `<plaintext>` tag was seen; the tokenizer never leaves that
    /// state again.
    Plaintext,
    /// A `</script>` completed; hand the element to the caller.
    Script(Handle),
}

/// An entry in the list of active formatting elements: an element
/// with the tag that created it, or a scope marker.
pub(crate) enum FormatEntry<Handle> {
    Element(Handle, Tag),
    Marker,
}

/// Where the next node is attached.
pub(crate) enum Insert<Handle> {
    /// As the last child of this node.
    Under(Handle),
    /// Fostered: before `table` if it has a parent, otherwise as the
    /// last child of `fallback` (the element just below the table on
    /// the stack).
    Foster { table: Handle, fallback: Handle },
}
