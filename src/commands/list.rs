//! Device listing.

use mech5_keypad::has_led_control;
use mech5_transport::{list_hid_collections, open_hidapi, UsbDiscovery};

/// Usage page of LED output reports
const USAGE_PAGE_LED: u16 = 0x08;

/// List keypad interfaces (libusb) and HID collections (hidapi)
pub fn run() -> anyhow::Result<()> {
    let discovery = UsbDiscovery::new();
    let devices = discovery.list_devices()?;
    if devices.is_empty() {
        println!("No Mech5 keyboard found.");
    } else {
        println!("Keypad interfaces:");
        for device in &devices {
            let info = &device.info;
            let product = discovery.product_name(device);
            println!(
                "  {}  {:04x}:{:04x}  {}  class={:?}  led={}",
                info.location(),
                info.vid,
                info.pid,
                product.as_deref().unwrap_or("Unknown"),
                info.interface_class,
                if has_led_control(info) { "yes" } else { "no" },
            );
        }
    }

    let api = open_hidapi()?;
    let collections = list_hid_collections(&api);
    if !collections.is_empty() {
        println!("HID collections:");
        for c in &collections {
            println!(
                "  if={} page={:04x} usage={:04x}{}  {}",
                c.interface_number,
                c.usage_page,
                c.usage,
                if c.usage_page == USAGE_PAGE_LED { " (LED)" } else { "" },
                c.path,
            );
        }
    }

    Ok(())
}
