// Copyright 2025 The hazel Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Build-time codegen: the static atom sets (local names, namespace
//! prefixes and urls) and the named-character-reference table.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Deserialize;

static NAMESPACES: &[(&str, &str)] = &[
    ("", ""),
    ("*", "*"),
    ("html", "http://www.w3.org/1999/xhtml"),
    ("xml", "http://www.w3.org/XML/1998/namespace"),
    ("xmlns", "http://www.w3.org/2000/xmlns/"),
    ("xlink", "http://www.w3.org/1999/xlink"),
    ("svg", "http://www.w3.org/2000/svg"),
    ("mathml", "http://www.w3.org/1998/Math/MathML"),
];

/// One entry of the WHATWG `entities.json` table.
#[derive(Deserialize)]
struct NamedEntity {
    codepoints: Vec<u32>,
    #[allow(dead_code)]
    characters: String,
}

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let out_dir = env::var("OUT_DIR").unwrap();
    println!("cargo:rerun-if-changed=local_names.txt");
    println!("cargo:rerun-if-changed=build/entities.json");

    generate_atoms(
        &Path::new(&manifest_dir).join("local_names.txt"),
        &Path::new(&out_dir).join("generated.rs"),
    );
    generate_named_entities(
        &Path::new(&manifest_dir).join("build").join("entities.json"),
        &Path::new(&out_dir).join("named_entities.rs"),
    );
}

fn generate_atoms(local_names: &Path, to: &Path) {
    let mut generated = BufWriter::new(File::create(to).unwrap());

    // A string cache for element and attribute local names.
    let mut local_names_atom = string_cache_codegen::AtomType::new("LocalName", "local_name!");
    for line in BufReader::new(File::open(local_names).unwrap()).lines() {
        let local_name = line.unwrap();
        local_names_atom.atom(&local_name);
        local_names_atom.atom(&local_name.to_ascii_lowercase());
    }
    local_names_atom
        .with_macro_doc("Takes a local name as a string and returns its key in the string cache.")
        .write_to(&mut generated)
        .unwrap();

    // A string cache for namespace prefixes.
    string_cache_codegen::AtomType::new("Prefix", "namespace_prefix!")
        .with_macro_doc("Takes a namespace prefix string and returns its key in a string cache.")
        .atoms(NAMESPACES.iter().map(|&(prefix, _url)| prefix))
        .write_to(&mut generated)
        .unwrap();

    // A string cache for namespace urls.
    string_cache_codegen::AtomType::new("Namespace", "namespace_url!")
        .with_macro_doc("Takes a namespace url string and returns its key in a string cache.")
        .atoms(NAMESPACES.iter().map(|&(_prefix, url)| url))
        .write_to(&mut generated)
        .unwrap();

    writeln!(
        generated,
        r#"
        /// Maps the input of [`namespace_prefix!`](macro.namespace_prefix.html) to
        /// the output of [`namespace_url!`](macro.namespace_url.html).
        ///
        #[macro_export] macro_rules! ns {{
        "#
    )
    .unwrap();
    for &(prefix, url) in NAMESPACES {
        writeln!(
            generated,
            "({prefix}) => {{ $crate::namespace_url!({url:?}) }};"
        )
        .unwrap();
    }
    writeln!(generated, "}}").unwrap();
}

fn generate_named_entities(from: &Path, to: &Path) {
    let input = BufReader::new(File::open(from).unwrap());
    let json: BTreeMap<String, NamedEntity> = serde_json::from_reader(input).unwrap();

    let mut entities: HashMap<String, (u32, u32)> = HashMap::new();
    for (name, entity) in json {
        let name = name
            .strip_prefix('&')
            .expect("entity name without leading '&'");
        let c0 = entity.codepoints[0];
        let c1 = entity.codepoints.get(1).copied().unwrap_or(0);
        entities.insert(name.to_owned(), (c0, c1));
    }

    // Add every proper prefix of every name, mapped to [0, 0], so the
    // resolver can tell "keep reading" apart from "no entity starts
    // this way" with a single lookup per character.
    let names: Vec<String> = entities.keys().cloned().collect();
    for name in names {
        for len in 1..name.len() {
            entities
                .entry(name[..len].to_owned())
                .or_insert((0, 0));
        }
    }

    let mut phf_map = phf_codegen::Map::new();
    for (key, &(c0, c1)) in &entities {
        phf_map.entry(&**key, &format!("[{c0}, {c1}]"));
    }

    let mut file = BufWriter::new(File::create(to).unwrap());
    writeln!(
        &mut file,
        "/// Named character references, keyed without the leading `&`."
    )
    .unwrap();
    writeln!(
        &mut file,
        "/// A value of `[0, 0]` marks a proper prefix of one or more longer names."
    )
    .unwrap();
    write!(
        &mut file,
        "pub static NAMED_ENTITIES: Map<&'static str, [u32; 2]> = "
    )
    .unwrap();
    writeln!(&mut file, "{};", phf_map.build()).unwrap();
}
