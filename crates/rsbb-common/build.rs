//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "build"
//! rsbb_type: "source"
//! rsbb_scope: "build"
//! rsbb_description: "Emits git and cargo build metadata for version reporting."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Without git (source tarballs) vergen warns and emits placeholder values.
    EmitBuilder::builder()
        .build_timestamp()
        .all_cargo()
        .all_git()
        .emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
