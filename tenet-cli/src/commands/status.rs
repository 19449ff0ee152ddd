use clap::Args;

use tenet_core::config::store_path;

use super::{Env, Format, print_json};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

pub async fn run(args: StatusArgs, env: &Env) -> anyhow::Result<()> {
    let service = env.open_service()?;
    let stats = service.store().stats().await?;
    let project_id = service.store().project_id().await?;
    let last = service.get_learning_history(1, None).await?;

    if args.format == Format::Json {
        return print_json(&serde_json::json!({
            "project_id": project_id,
            "root": service.root(),
            "stats": stats,
            "last_run": last.first(),
        }));
    }

    println!("Tenet status for {}", service.root().display());
    println!();
    println!("  Project:  {project_id}");
    println!("  Database: {}", store_path(service.root()).display());
    if stats.db_size_bytes > 0 {
        println!("  Size:     {}", format_bytes(stats.db_size_bytes));
    }
    println!();
    println!(
        "  Patterns:   {:>6}  ({} retired)",
        stats.patterns, stats.patterns_deleted
    );
    println!(
        "  Concepts:   {:>6}  ({} deleted)",
        stats.concepts, stats.concepts_deleted
    );
    println!(
        "  Violations: {:>6}  open, {} resolved",
        stats.open_violations, stats.resolved_violations
    );
    println!("  Exceptions: {:>6}", stats.exceptions);
    println!("  Runs:       {:>6}", stats.deltas);
    println!();
    match last.first() {
        Some(d) => println!(
            "  Last run:   {} ({}, {})",
            d.created_at.format("%Y-%m-%d %H:%M:%S"),
            d.status.as_str(),
            d.trigger.as_str()
        ),
        None => println!("  Last run:   never"),
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1_048_576), "3.0 MB");
    }
}
