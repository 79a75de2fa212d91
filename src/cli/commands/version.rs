//! Version command - show version information

use crate::endpoint::EndpointKind;

/// Print version information
///
/// With `verbose` the supported endpoints and build details follow.
pub fn print_version(verbose: bool) {
    println!("{} {}", crate::NAME, crate::VERSION);

    if verbose {
        println!();
        println!("Endpoints:");
        for kind in EndpointKind::ALL {
            println!("  {:<14} {}", kind.name(), kind.file_name());
        }
        println!();
        println!("Build info:");
        println!("  Target:    {}", std::env::consts::ARCH);
        println!("  OS:        {}", std::env::consts::OS);
        println!("  Rust:      {}", env!("RUSTC_VERSION"));
        if let Ok(exe) = std::env::current_exe() {
            println!("  Executable: {}", exe.display());
        }
    }
}
