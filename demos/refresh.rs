//! Refresh the page cache and print a page
//!
//! ```bash
//! RUST_LOG=tldr_mirror=debug cargo run --example refresh -- tar
//! ```
//!
//! Pass `--json` to print each refresh event as a JSON line instead of a label.

use tldr_mirror::{Config, Event, SyncCoordinator};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let json = if let Some(pos) = args.iter().position(|a| a == "--json") {
        args.remove(pos);
        true
    } else {
        false
    };
    let command = args.first().map(String::as_str).unwrap_or("tar");

    let sync = SyncCoordinator::new(Config::default())?;
    let info = sync.store().info();
    println!("active layer: {} ({})", info.layer, info.root.display());

    let mut refresh = sync.refresh()?;
    while let Some(event) = refresh.next_event().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }
        match event {
            Event::Progress { label, .. } => println!("{label}"),
            Event::Finished { message, .. } => println!("{message}"),
        }
    }
    if let Err(e) = refresh.wait().await {
        eprintln!("{}", e.user_message());
    }

    let index = sync.store().list_commands(&["en"], &["common", "linux", "osx"])?;
    println!("{} commands indexed", index.len());

    let page = sync.store().get_page("en", "common", command)?;
    println!("{}", page.into_text());

    Ok(())
}
