fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "grpc")]
    {
        // This crate's own build.rs must call tonic_prost_build directly,
        // since it can't reference the crate being built.
        //
        // Consuming projects should use build_utils::compile_service_protos()
        // instead, which resolves proto/ (or VOICEHIVE_PROTO_DIR) on its own.
        let out_dir = std::env::var("OUT_DIR")?;

        tonic_prost_build::configure()
            .file_descriptor_set_path(format!("{}/recognizer_descriptor.bin", out_dir))
            .compile_protos(&["proto/recognizer.proto"], &["proto"])?;

        println!(
            "cargo:warning=Compiled recognizer.proto -> {}/recognizer_descriptor.bin",
            out_dir
        );
    }
    Ok(())
}
