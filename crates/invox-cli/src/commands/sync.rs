//! Sync command - reconcile file flags with the object store.

use console::style;

use crate::context::App;

pub async fn run(config_path: Option<&str>) -> anyhow::Result<()> {
    let app = App::load(config_path)?;
    let report = app.sweep().run().await?;

    println!(
        "{} Reconciled in {:?}: {} objects, {} invoices with files, {} missing",
        style("✓").green(),
        report.elapsed,
        report.keys_seen,
        style(report.present).green(),
        style(report.missing).red()
    );
    Ok(())
}
