//! `redeven version`: print build info and exit.

/// Run `redeven version`.
pub fn run() {
    println!("redeven {} ({} {})", env!("CARGO_PKG_VERSION"), std::env::consts::OS, std::env::consts::ARCH);
}
