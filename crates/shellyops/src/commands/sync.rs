//! `pull` and `push` handlers.

use serde::Serialize;
use tabled::Tabled;

use shellyops_core::{ClassReport, DeviceOutcome, PushOptions, SyncManager};

use crate::cli::{OutputFormat, PushArgs};
use crate::error::CliError;
use crate::output;

use super::Render;

pub async fn pull(manager: &SyncManager, render: Render) -> Result<(), CliError> {
    let outcomes = manager.pull().await?;
    report(&outcomes, render)
}

pub async fn push(manager: &SyncManager, args: PushArgs, render: Render) -> Result<(), CliError> {
    let values = args.values.map(std::path::absolute).transpose()?;
    let options = PushOptions {
        dry_run: args.dry_run,
        values,
        devices: args.devices,
    };
    let outcomes = manager.push(&options).await?;
    if options.dry_run && render.format == OutputFormat::Table && !render.quiet {
        eprintln!("{}", output::dim("dry run: no device was changed", render.color));
    }
    report(&outcomes, render)
}

// ── Reporting ────────────────────────────────────────────────────────

/// Serializable view of a `DeviceOutcome`.
#[derive(Debug, Serialize)]
struct OutcomeView<'a> {
    device_id: &'a str,
    name: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    reports: &'a [ClassReport],
    warnings: &'a [String],
}

impl<'a> From<&'a DeviceOutcome> for OutcomeView<'a> {
    fn from(o: &'a DeviceOutcome) -> Self {
        Self {
            device_id: &o.device_id,
            name: &o.name,
            success: o.success,
            error: o.error.as_ref().map(ToString::to_string),
            reports: &o.reports,
            warnings: &o.warnings,
        }
    }
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Changes")]
    changes: String,
}

fn to_row(view: &OutcomeView<'_>, color: bool) -> OutcomeRow {
    let status = if !view.success {
        output::bad("failed", color)
    } else if view.reports.iter().any(|r| !r.failures.is_empty()) {
        output::bad("partial", color)
    } else {
        output::ok("ok", color)
    };
    let changes = match &view.error {
        Some(err) => err.clone(),
        None => {
            let parts: Vec<String> = view.reports.iter().filter_map(ClassReport::summary).collect();
            if parts.is_empty() { "no changes".into() } else { parts.join("\n") }
        }
    };
    OutcomeRow {
        device: view.device_id.to_owned(),
        name: view.name.to_owned(),
        status,
        changes,
    }
}

/// Record failures, warnings and skipped classes, one per line.
fn details(outcomes: &[DeviceOutcome], color: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for outcome in outcomes {
        for report in &outcome.reports {
            for failure in &report.failures {
                lines.push(format!(
                    "{} {} {}/{}: {}",
                    output::bad("✗", color),
                    outcome.device_id,
                    report.class,
                    failure.key,
                    failure.message
                ));
            }
        }
        for warning in &outcome.warnings {
            lines.push(format!("{} {}: {warning}", output::dim("!", color), outcome.device_id));
        }
    }
    lines
}

/// Print the outcomes and turn device-level failures into an error.
fn report(outcomes: &[DeviceOutcome], render: Render) -> Result<(), CliError> {
    let views: Vec<OutcomeView<'_>> = outcomes.iter().map(OutcomeView::from).collect();
    let rendered = output::render_list(render.format, &views, |v| to_row(v, render.color));
    output::print_output(&rendered, render.quiet);

    if render.format == OutputFormat::Table {
        for line in details(outcomes, render.color) {
            eprintln!("{line}");
        }
    }

    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed > 0 {
        return Err(CliError::DeviceFailures {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shellyops_core::{CoreError, Device, ResourceClass};

    use super::*;

    fn device() -> Device {
        Device {
            device_id: "shellyplus1-a8032abe5400".into(),
            name: "Garden Pump".into(),
            folder: "garden-pump-shellyplus1-a8032abe5400".into(),
            ip_address: "10.0.0.9".into(),
            mac_address: String::new(),
            model: String::new(),
            last_sync: None,
        }
    }

    #[test]
    fn row_shows_partial_when_records_failed() {
        let mut outcome = DeviceOutcome::new(&device());
        let mut kvs = ClassReport::new(ResourceClass::Kvs);
        kvs.updated = 1;
        kvs.fail("broker", "undefined placeholder");
        outcome.reports.push(kvs);

        let row = to_row(&OutcomeView::from(&outcome), false);
        assert_eq!(row.status, "partial");
        assert_eq!(row.changes, "kvs: 1 updated, 1 failed");

        let lines = details(std::slice::from_ref(&outcome), false);
        assert_eq!(
            lines,
            vec!["✗ shellyplus1-a8032abe5400 kvs/broker: undefined placeholder".to_owned()]
        );
    }

    #[test]
    fn failed_device_maps_to_device_failures() {
        let ok = DeviceOutcome::new(&device());
        let failed = DeviceOutcome::failed(&device(), CoreError::Cancelled);
        let render = Render {
            format: OutputFormat::Json,
            quiet: true,
            color: false,
        };
        let err = report(&[ok, failed], render).unwrap_err();
        assert!(matches!(err, CliError::DeviceFailures { failed: 1, total: 2 }));
    }
}
