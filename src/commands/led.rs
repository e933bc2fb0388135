//! Backlight command, talking to the daemon over D-Bus.

use anyhow::Context;
use mech5_driver::config::{BusKind, DriverConfig};
use mech5_driver::dbus::{self, BUS_NAME, INTERFACE_NAME};

/// Helper to create a D-Bus proxy for one keypad object.
async fn keypad_proxy(bus: BusKind, device: u32) -> anyhow::Result<zbus::Proxy<'static>> {
    let conn = match bus {
        BusKind::Session => zbus::Connection::session().await?,
        BusKind::System => zbus::Connection::system().await?,
    };
    let proxy = zbus::Proxy::new_owned(conn, BUS_NAME, dbus::object_path(device), INTERFACE_NAME)
        .await?;
    Ok(proxy)
}

/// Show the cached level, or write a new one.
pub async fn run(config: &DriverConfig, device: u32, value: Option<&str>) -> anyhow::Result<()> {
    let proxy = keypad_proxy(config.bus, device)
        .await
        .context("is the daemon running?")?;

    match value {
        None => {
            let level: String = proxy.get_property("Led").await?;
            let location: String = proxy.get_property("Location").await?;
            print!("Keypad {device} ({location}): {level}");
        }
        Some(value) => {
            let reply = proxy.call_method("StoreLed", &(value,)).await?;
            let consumed: u64 = reply.body().deserialize()?;
            let level: String = proxy.get_property("Led").await?;
            println!(
                "Stored {consumed} byte(s), backlight now {}",
                level.trim_end()
            );
        }
    }

    Ok(())
}
