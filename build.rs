fn main() {
    // Every address memsegs prints depends on the target, so the banner names it.
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=MEMSEGS_TARGET={target}");
    println!("cargo:rerun-if-changed=build.rs");

    // Only warn during test builds
    if std::env::var("CARGO_CFG_TEST").is_ok() {
        println!("cargo:warning=The tests are meant to be run with cargo-nextest.");
        println!("cargo:warning=Run: cargo nextest run");
    }
}
