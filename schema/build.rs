fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    let well_known = protoc_bin_vendored::include_path()?;
    std::fs::create_dir_all("src/proto")?;

    tonic_build::configure().out_dir("src/proto").compile(
        &[
            "proto/aero.proto",
        ],
        &[std::path::PathBuf::from("proto/"), well_known],
    )?;
    Ok(())
}
