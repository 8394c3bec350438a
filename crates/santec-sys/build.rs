//! Build script for santec-sys.
//!
//! With the `santec-sdk` feature the vendor import library is linked from
//! `SANTEC_SDK_DIR` (optionally overridden by `SANTEC_LIB_DIR`). Without it
//! nothing is linked and the crate exposes dummy entry points.

fn main() {
    println!("cargo:rerun-if-env-changed=SANTEC_SDK_DIR");
    println!("cargo:rerun-if-env-changed=SANTEC_LIB_DIR");

    #[cfg(feature = "santec-sdk")]
    link_sdk();
}

#[cfg(feature = "santec-sdk")]
fn link_sdk() {
    use std::env;
    use std::path::PathBuf;

    let lib_dir = match env::var("SANTEC_LIB_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => match env::var("SANTEC_SDK_DIR") {
            Ok(dir) => PathBuf::from(dir).join("x64"),
            Err(_) => {
                println!(
                    "cargo:warning=SANTEC_SDK_DIR is not set; relying on the default linker search path"
                );
                println!("cargo:rustc-link-lib=dylib=SLMFunc");
                return;
            }
        },
    };

    if !lib_dir.exists() {
        println!(
            "cargo:warning=Santec SDK lib path does not exist: {}",
            lib_dir.display()
        );
    }

    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=dylib=SLMFunc");
}
