fn main() {
    // ESP-IDF environment setup; no-op on host builds.
    embuild::espidf::sysenv::output();
}
