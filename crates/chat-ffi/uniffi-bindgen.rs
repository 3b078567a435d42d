//! Generates Swift/Kotlin bindings from the built chat-ffi library

fn main() {
    uniffi::uniffi_bindgen_main()
}
