cfg_if! {
    if #[cfg(not(target_arch = "wasm32"))] {
        mod native;
        pub use self::native::*;
    } else {
        compile_error!("meshnet-shared only supports native targets");
    }
}
