// Build script for camera-provider-grpc
// Handles protobuf code generation for the Camera service

fn main() {
    // Use vendored protoc from protobuf-src
    std::env::set_var("PROTOC", protobuf_src::protoc());

    compile_protos();

    // Rebuild when protobuf files change
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../../proto/");
}

/// Compile protocol buffers for gRPC service
fn compile_protos() {
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true) // Enable client generation for testing
        .compile_protos(&["../../../proto/camera_provider.proto"], &["../../../proto/"])
        .unwrap_or_else(|e| panic!("Failed to compile protos: {}", e));
}
