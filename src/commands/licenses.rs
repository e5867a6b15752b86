//! Bundled license text

/// License of this program, embedded at compile time
pub const LICENSE: &str = include_str!("../../LICENSE");

/// Print the bundled license text
pub fn execute() {
    println!("gobu {}", env!("CARGO_PKG_VERSION"));
    println!();
    print!("{}", LICENSE);
}
