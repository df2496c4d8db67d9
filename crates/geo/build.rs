fn main() {
    println!("cargo:rerun-if-changed=proto/vector_tile.proto");
    prost_build::compile_protos(&["proto/vector_tile.proto"], &["proto/"])
        .expect("compiling Mapbox Vector Tile protobuf schema");
}
