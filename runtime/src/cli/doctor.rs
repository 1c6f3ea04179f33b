//! Environment readiness check.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::output;
use crate::renderer::chromium::find_chromium;

#[derive(Debug, Serialize)]
struct DoctorReport {
    os: &'static str,
    arch: &'static str,
    chromium: Option<String>,
    output_dir: String,
    output_writable: bool,
    /// A harvest can run at all (the static fetch needs no browser).
    ready: bool,
    /// The rendered fetch is available.
    rendered_fetch: bool,
}

/// Check Chromium availability and that the output directory is writable.
pub async fn run(output_dir: &Path) -> Result<()> {
    let chromium = find_chromium();
    let output_writable = check_writable(output_dir).await;

    let report = DoctorReport {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        chromium: chromium.as_ref().map(|p| p.display().to_string()),
        output_dir: output_dir.display().to_string(),
        output_writable,
        ready: output_writable,
        rendered_fetch: chromium.is_some(),
    };

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }

    println!("Harvest Doctor");
    println!("==============");
    println!();
    println!("OS:   {}", report.os);
    println!("Arch: {}", report.arch);
    println!();

    match &report.chromium {
        Some(path) => println!("[OK] Chromium found: {path}"),
        None => println!(
            "[!!] Chromium NOT found. Rendered fetch disabled; set HARVEST_CHROMIUM_PATH or install Chrome."
        ),
    }
    if report.output_writable {
        println!("[OK] Output directory {} is writable", report.output_dir);
    } else {
        println!("[!!] Output directory {} is not writable", report.output_dir);
    }

    println!();
    if report.ready && report.rendered_fetch {
        println!("Status: READY");
    } else if report.ready {
        println!("Status: READY (static fetch only)");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

/// Create the directory if needed and write (then remove) a scratch file.
async fn check_writable(dir: &Path) -> bool {
    if tokio::fs::create_dir_all(dir).await.is_err() {
        return false;
    }
    let scratch = dir.join(format!(".harvest-write-check-{}", std::process::id()));
    let ok = tokio::fs::write(&scratch, b"ok").await.is_ok();
    let _ = tokio::fs::remove_file(&scratch).await;
    ok
}
