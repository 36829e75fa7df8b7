#![allow(clippy::multiple_crate_versions)]

//! Ares - command-line front end for the Ares terminal engine.
//!
//! - `ares watch`: live console view of settings and theme
//! - `ares snapshot`: one-shot table or JSON output
//! - `ares schema`, `ares completions`: tooling helpers

fn main() {
    if let Err(err) = ares_lib::cli::run() {
        eprintln!("ares: {err}");
        std::process::exit(1);
    }
}
