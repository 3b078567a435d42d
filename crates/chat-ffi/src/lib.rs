//! UniFFI bindings crate for the chat library
//!
//! Builds the chat crate as a static/dynamic library for UniFFI library-mode
//! binding generation.
//!
//! ## Building for Swift
//!
//! 1. Build the library:
//!    ```bash
//!    cargo build --release -p chat-ffi --target aarch64-apple-ios
//!    ```
//!
//! 2. Generate Swift bindings:
//!    ```bash
//!    cargo run -p chat-ffi --features bindgen --bin uniffi-bindgen generate \
//!        --library target/aarch64-apple-ios/release/libchat_ffi.a \
//!        --language swift \
//!        --out-dir generated/swift
//!    ```

pub use chat::ffi::*;

// Library mode needs the scaffolding symbols in this artifact
chat::uniffi_reexport_scaffolding!();
