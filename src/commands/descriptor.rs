//! Report descriptor inspection.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use mech5_keypad::descriptor::{self, ReportDescriptor};
use mech5_transport::{is_supported, UsbDiscovery};

const SYSFS_HID_DEVICES: &str = "/sys/bus/hid/devices";

/// Parse a HID sysfs device name "BBBB:VVVV:PPPP.IIII" into (vid, pid)
fn parse_hid_device_name(name: &str) -> Option<(u16, u16)> {
    let mut parts = name.split(':');
    let _bus = parts.next()?;
    let vid = u16::from_str_radix(parts.next()?, 16).ok()?;
    let (pid, _id) = parts.next()?.split_once('.')?;
    let pid = u16::from_str_radix(pid, 16).ok()?;
    Some((vid, pid))
}

/// `report_descriptor` files of every supported keyboard known to the kernel
fn find_sysfs_descriptors() -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(SYSFS_HID_DEVICES) else {
        return Vec::new();
    };

    let mut found: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            parse_hid_device_name(&entry.file_name().to_string_lossy())
                .is_some_and(|(vid, pid)| is_supported(vid, pid))
        })
        .map(|entry| entry.path().join("report_descriptor"))
        .filter(|path| path.exists())
        .collect();
    found.sort();
    found
}

/// Read the descriptor straight from the keypad interface
fn read_live() -> anyhow::Result<Vec<u8>> {
    let discovery = UsbDiscovery::new();
    let devices = discovery.list_devices()?;
    let Some(device) = devices.first() else {
        bail!("No Mech5 keyboard found");
    };
    let transport = discovery.open_device(device)?;
    Ok(transport.read_report_descriptor()?)
}

/// Print report layout and normalization result of one descriptor
fn describe(source: &str, raw: &[u8]) -> Vec<u8> {
    let normalized = descriptor::normalize(raw);
    println!("{source}: {} bytes", raw.len());
    if descriptor::needs_fixup(raw) {
        println!(
            "  malformed, replaced by fixed descriptor ({} bytes)",
            normalized.len()
        );
    } else {
        println!("  no fixup needed");
    }

    match ReportDescriptor::parse(normalized) {
        Ok(parsed) => {
            for report in &parsed.reports {
                println!(
                    "  report {:>3}  page=0x{:02X}  in={} out={} feature={}",
                    report.id,
                    report.usage_page,
                    report.has_input,
                    report.has_output,
                    report.has_feature
                );
            }
        }
        Err(e) => println!("  {e}"),
    }

    normalized.to_vec()
}

fn hex_dump(data: &[u8]) {
    for chunk in data.chunks(16) {
        let line: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("  {}", line.join(" "));
    }
}

pub fn run(file: Option<&Path>, live: bool, output: Option<&Path>) -> anyhow::Result<()> {
    let sources: Vec<(String, Vec<u8>)> = if let Some(path) = file {
        let raw = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        vec![(path.display().to_string(), raw)]
    } else if live {
        vec![("usb".to_string(), read_live()?)]
    } else {
        let paths = find_sysfs_descriptors();
        if paths.is_empty() {
            bail!("No Mech5 HID device in {SYSFS_HID_DEVICES}; try --live");
        }
        paths
            .into_iter()
            .map(|p| {
                let raw = fs::read(&p).with_context(|| format!("read {}", p.display()))?;
                Ok((p.display().to_string(), raw))
            })
            .collect::<anyhow::Result<_>>()?
    };

    let mut normalized = Vec::new();
    for (source, raw) in &sources {
        normalized = describe(source, raw);
    }

    match output {
        Some(path) => {
            fs::write(path, &normalized).with_context(|| format!("write {}", path.display()))?;
            println!("Wrote {} bytes to {}", normalized.len(), path.display());
        }
        None => {
            println!("Normalized:");
            hex_dump(&normalized);
        }
    }

    Ok(())
}
