fn main() {
    // Exports the ESP-IDF build environment when building for the device;
    // a no-op for host builds (library + unit tests).
    embuild::espidf::sysenv::output();
}
