//! Build script - hands the esp-hal and defmt linker scripts to the
//! embedded binary.
//!
//! Host builds (`cargo test`) never enable the `embedded` feature, so the
//! library and its tests link normally.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    // Only the firmware binary links against the target scripts.
    println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
