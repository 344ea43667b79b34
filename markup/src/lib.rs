// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Vocabulary shared between the hazel parser and its tree sinks:
//! interned names, qualified names, attributes, source positions, the
//! input buffer queue, and the static data tables the tokenizer
//! consumes.

// The generated `local_name!`/`namespace_url!`/`ns!` macros are
// `macro_export`ed from an `include!`d file, which trips this lint on
// newer rustc even though the macros are used correctly within the crate.
#![allow(macro_expanded_macro_exports_accessed_by_absolute_paths)]

// The atom types (`LocalName`, `Prefix`, `Namespace`) and their macros
// (`local_name!`, `namespace_prefix!`, `namespace_url!`, `ns!`) are
// generated by build.rs from local_names.txt.
include!(concat!(env!("OUT_DIR"), "/generated.rs"));

pub mod buffer_queue;
pub mod data;
pub mod interface;
mod smallcharset;

pub use interface::{Attribute, ExpandedName, ParseError, Position, QualName};
pub use interface::{ElemName, ElementFlags, NodeOrText, QuirksMode, Tracer, TreeSink};
pub use smallcharset::SmallCharSet;
