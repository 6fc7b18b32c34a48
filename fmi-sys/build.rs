use std::{env, path::PathBuf};

fn main() {
    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    #[cfg(feature = "fmi2")]
    {
        println!("cargo:rerun-if-changed=src/fmi2/logger.c");
        println!("cargo:rerun-if-changed=fmi-standard2/headers");

        cc::Build::new()
            .file("src/fmi2/logger.c")
            .include("fmi-standard2/headers")
            .compile("fmi2logger");

        let bindings = bindgen::Builder::default()
            .header("fmi-standard2/headers/fmi2Functions.h")
            .dynamic_link_require_all(false)
            .dynamic_library_name("Fmi2Binding")
            .allowlist_item("fmi2.*")
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .wrap_unsafe_ops(true)
            .generate()
            .expect("Unable to generate FMI 2.0 bindings");

        bindings
            .write_to_file(out_path.join("fmi2_bindings.rs"))
            .expect("Couldn't write FMI 2.0 bindings");
    }
}
