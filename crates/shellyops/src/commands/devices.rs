//! Device registry handlers.

use tabled::Tabled;

use shellyops_core::{Device, SyncManager};

use crate::cli::{DevicesArgs, DevicesCommand};
use crate::error::CliError;
use crate::output;

use super::Render;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Folder")]
    folder: String,
    #[tabled(rename = "Last Sync")]
    last_sync: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.device_id.clone(),
            name: d.name.clone(),
            model: d.model.clone(),
            ip: d.ip_address.clone(),
            folder: d.folder.clone(),
            last_sync: last_sync(d),
        }
    }
}

fn last_sync(d: &Device) -> String {
    d.last_sync
        .map_or_else(|| "never".into(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn detail(d: &Device) -> String {
    [
        format!("ID:        {}", d.device_id),
        format!("Name:      {}", d.name),
        format!("Model:     {}", if d.model.is_empty() { "-" } else { &d.model }),
        format!("IP:        {}", d.ip_address),
        format!("MAC:       {}", if d.mac_address.is_empty() { "-" } else { &d.mac_address }),
        format!("Folder:    {}", d.folder),
        format!("Last sync: {}", last_sync(d)),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(manager: &SyncManager, args: DevicesArgs, render: Render) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let devices = manager.registry().devices().await;
            let out = output::render_list(render.format, &devices, |d| DeviceRow::from(d));
            output::print_output(&out, render.quiet);
            Ok(())
        }

        DevicesCommand::Add { host } => {
            let device = manager.add_device(&host).await?;
            let out = output::render_single(render.format, &device, detail);
            output::print_output(&out, render.quiet);
            Ok(())
        }

        DevicesCommand::Remove { device_id } => {
            let device = manager.remove_device(&device_id).await?;
            if !render.quiet {
                eprintln!(
                    "Removed {} ({}); folder {} was kept",
                    device.device_id, device.name, device.folder
                );
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn row_formats_last_sync() {
        let mut device = Device {
            device_id: "shelly1-abc".into(),
            name: "Hallway".into(),
            folder: "hallway-shelly1-abc".into(),
            ip_address: "10.0.0.2".into(),
            mac_address: String::new(),
            model: "SNSW-001X16EU".into(),
            last_sync: None,
        };
        assert_eq!(DeviceRow::from(&device).last_sync, "never");

        device.last_sync = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).single();
        assert_eq!(DeviceRow::from(&device).last_sync, "2026-03-01 08:30:00 UTC");
        assert!(detail(&device).contains("MAC:       -"));
    }
}
