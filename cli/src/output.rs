//! Human-readable rendering of inspection reports.

use std::fmt::Write;

use comfy_table::{ContentArrangement, Table};
use mlist_registry::oci::{Descriptor, InspectReport};

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn size_of(descriptor: &Descriptor) -> String {
    format_bytes(descriptor.size.max(0) as u64)
}

/// Render an inspection report the way `mlist inspect` prints it.
pub fn render_report(report: &InspectReport) -> String {
    let mut out = String::new();
    match report {
        InspectReport::List {
            name,
            descriptor,
            entries,
        } => {
            let _ = writeln!(out, "Name:   {} (Type: {})", name, descriptor.media_type);
            let _ = writeln!(out, "Digest: {}", descriptor.digest);
            let _ = writeln!(out, " * Contains {} manifest references:", entries.len());

            let mut table = new_table(&["#", "PLATFORM", "OS VERSION", "DIGEST", "SIZE", "LAYERS"]);
            for (i, entry) in entries.iter().enumerate() {
                let platform = entry.platform.as_ref();
                table.add_row(vec![
                    (i + 1).to_string(),
                    platform.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                    platform
                        .map(|p| p.os_version.clone())
                        .filter(|v| !v.is_empty())
                        .unwrap_or_else(|| "-".to_string()),
                    entry.descriptor.digest.clone(),
                    size_of(&entry.descriptor),
                    entry.layers.len().to_string(),
                ]);
            }
            let _ = writeln!(out, "{table}");

            for (i, entry) in entries.iter().enumerate() {
                if entry.layers.is_empty() {
                    continue;
                }
                let _ = writeln!(out, "{}  Mfst Type: {}", i + 1, entry.descriptor.media_type);
                for (j, layer) in entry.layers.iter().enumerate() {
                    let _ = writeln!(out, "     layer {}: digest = {}", j + 1, layer.digest);
                }
            }
        }
        InspectReport::Image {
            name,
            descriptor,
            os,
            architecture,
            variant,
            layers,
        } => {
            let _ = writeln!(out, "Name: {} (Type: {})", name, descriptor.media_type);
            let _ = writeln!(out, "      Digest: {}", descriptor.digest);
            let _ = writeln!(out, "          OS: {}", os);
            let _ = writeln!(out, "        Arch: {}", architecture);
            if !variant.is_empty() {
                let _ = writeln!(out, "     Variant: {}", variant);
            }
            let _ = writeln!(out, "    # Layers: {}", layers.len());
            for (i, layer) in layers.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "      layer {}: digest = {} ({})",
                    i + 1,
                    layer.digest,
                    size_of(layer)
                );
            }
        }
    }
    out
}
