//! cutout command-line tool
//!
//! Removes the background from a product photo using a segmentation model,
//! with a classical fallback when no model is available.

#[cfg(feature = "cli")]
use cutout::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
