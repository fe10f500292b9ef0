fn main() {
    // ESP-IDF build-system env propagation. Host test builds (no espidf
    // feature) skip it so `cargo test` works without an ESP toolchain.
    if std::env::var("CARGO_FEATURE_ESPIDF").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
