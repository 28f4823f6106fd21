//! Node manager Protocol Buffer generated code.
//!
//! This crate contains the generated Rust code for the `nodemgr.v1`
//! control-plane service. Messages also derive serde with PascalCase
//! field names, which is the shape the console prints for `--json`.

pub mod nodemgr {
    pub mod v1 {
        tonic::include_proto!("nodemgr.v1");
    }
}

// Re-export commonly used types at the crate root for convenience
pub use nodemgr::v1::*;
