fn main() {
    // ESP-IDF link arguments are only needed when building the firmware
    // binary; host test builds skip the embuild step entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
