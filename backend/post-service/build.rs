fn main() -> Result<(), Box<dyn std::error::Error>> {
    let services_dir = "../proto/services";

    println!("cargo:rerun-if-changed={}/post_service.proto", services_dir);

    tonic_build::configure().compile_protos(
        &[format!("{services_dir}/post_service.proto")],
        &[services_dir],
    )?;

    Ok(())
}
