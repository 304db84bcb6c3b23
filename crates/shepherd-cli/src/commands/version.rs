//! Version command implementation.

use crate::style::print_labeled;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("shepherd {VERSION}");
    println!();
    println!("A permission-aware SQL gateway.");
    println!();
    print_labeled("SQL dialect", "PostgreSQL");
    print_labeled("Parser recursion limit", &shepherd_query::RECURSION_LIMIT.to_string());
    print_labeled("Target", std::env::consts::ARCH);
    print_labeled("OS", std::env::consts::OS);
}
