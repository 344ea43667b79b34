// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A conforming HTML5 parser.
//!
//! Input is consumed as a stream of Unicode scalar values and turned
//! into a tree through two interlocked state machines: the
//! [tokenizer](tokenizer) and the [tree builder](tree_builder), per
//! the WHATWG HTML standard, including all of its recovery rules for
//! non-well-formed input. The tree is grown through the
//! [`TreeSink`](hazel_markup::TreeSink) interface; `hazel-rcdom`
//! provides a simple reference implementation.
//!
//! The convenient entry points live in [`driver`]: see
//! [`parse_document`] and [`parse_fragment`].

pub use hazel_markup::*;

pub use driver::{parse_document, parse_fragment, ParseOpts, Parser};

/// Re-export of the tendril crate.
pub use tendril;

#[macro_use]
mod macros;

mod util {
    pub mod str;
}

pub mod driver;
pub mod tokenizer;
pub mod tree_builder;
