use anyhow::{Context, Result};
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use xshell::{Shell, cmd};

/// Fixture libraries: (name, extra compiler flags, env var exposing the path).
const FIXTURES: &[(&str, &[&str], &str)] = &[
    ("toy", &[], "TOY_DESIGN_LIB"),
    (
        "toy_named",
        &["-DDESIGN_CREATE=blinky_create"],
        "TOY_NAMED_LIB",
    ),
    ("toy_no_read", &["-DTOY_OMIT_VCD_READ"], "TOY_NO_READ_LIB"),
    (
        "toy_no_timescale",
        &["-DTOY_OMIT_VCD_TIMESCALE"],
        "TOY_NO_TIMESCALE_LIB",
    ),
];

fn main() -> Result<()> {
    let sh = Shell::new()?;

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=native/toy_design.c");
    println!("cargo:rerun-if-env-changed=CC");

    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let source = manifest_dir.join("native/toy_design.c");

    for (name, flags, var) in FIXTURES {
        let output = build_fixture(&sh, &source, &out_dir, name, flags)?;
        println!("cargo:rustc-env={var}={}", output.display());
    }

    Ok(())
}

/// Compile the toy design into a shared library in `out_dir`.
fn build_fixture(
    sh: &Shell,
    source: &Path,
    out_dir: &Path,
    name: &str,
    flags: &[&str],
) -> Result<PathBuf> {
    let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_owned());
    let output = out_dir.join(format!("{DLL_PREFIX}{name}{DLL_SUFFIX}"));

    cmd!(
        sh,
        "{cc} -std=c99 -O1 -Wall -shared -fPIC {flags...} -o {output} {source}"
    )
    .run()
    .with_context(|| format!("Failed to build fixture library: {name}"))?;

    Ok(output)
}
