use std::{env, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    // Rebuild triggers
    println!("cargo:rerun-if-changed=proto/tool_options.proto");
    println!("cargo:rerun-if-changed=proto/tool_group_set.proto");
    println!("cargo:rerun-if-changed=proto/testing");

    // Fixture services used by the test suites
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .protoc_arg("--experimental_allow_proto3_optional")
        .file_descriptor_set_path(out_dir.join("testing_descriptor.bin"))
        .compile_protos(
            &[
                "proto/testing/upper_case.proto",
                "proto/testing/messages.proto",
                "proto/testing/discovery.proto",
                "proto/testing/discovery2.proto",
            ],
            &["proto"],
        )?;

    // Option extensions and the persisted group set format. Compiled last so
    // the shared `smg.tool.v1` module keeps every message.
    tonic_prost_build::configure()
        .build_server(false)
        .build_client(false)
        .protoc_arg("--experimental_allow_proto3_optional")
        .file_descriptor_set_path(out_dir.join("smg_tool_descriptor.bin"))
        .compile_protos(
            &["proto/tool_options.proto", "proto/tool_group_set.proto"],
            &["proto"],
        )?;

    Ok(())
}
