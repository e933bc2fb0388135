//! Driver daemon: device supervisor + report reader threads + D-Bus server.
//!
//! Every poll interval the supervisor
//! - drops devices whose reader thread has ended
//! - attaches keypad interfaces that are not attached yet
//!
//! A device that fails to attach is logged and retried on the next poll; it
//! never affects the other devices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use mech5_keypad::{advertised_keys, DeviceContext, InputSink, KeypadError};
use mech5_transport::{
    run_report_reader_loop, ControlPipe, DiscoveredDevice, ReaderConfig, ReaderExit,
    UsbDiscovery, UsbKeypadTransport,
};
use tracing::{debug, error, info, warn};

use crate::config::{BusKind, DriverConfig};
use crate::dbus::{self, KeypadInterface, SharedBacklight};
use crate::uinput::VirtualKeypad;

type KeypadContext = DeviceContext<VirtualKeypad, Arc<dyn ControlPipe>>;

/// How long the shutdown flag may go unchecked while waiting
const SHUTDOWN_CHECK: Duration = Duration::from_millis(100);

/// One attached keypad interface
struct AttachedDevice {
    shutdown: Arc<AtomicBool>,
    reader: JoinHandle<ReaderExit>,
    /// D-Bus object index and path, when the led control is published
    object: Option<(u32, String)>,
}

impl AttachedDevice {
    fn is_finished(&self) -> bool {
        self.reader.is_finished()
    }
}

/// Open, read the descriptor, create the sink and start the reader thread
///
/// Blocking; run off the async runtime.
fn attach_device(
    discovery: &UsbDiscovery,
    found: &DiscoveredDevice,
    config: &DriverConfig,
) -> anyhow::Result<(AttachedDevice, Option<SharedBacklight>)> {
    let location = found.info.location();

    let transport = Arc::new(
        discovery
            .open_device(found)
            .with_context(|| format!("open {location}"))?,
    );
    let raw_descriptor = transport
        .read_report_descriptor()
        .with_context(|| format!("read report descriptor of {location}"))?;
    let keys = advertised_keys(&raw_descriptor)?;
    let mut sink = VirtualKeypad::new(&config.device_name, &keys)
        .with_context(|| format!("create virtual keypad for {location}"))?;
    if let Some(path) = sink.device_path() {
        info!("{}: virtual keypad at {}", location, path.display());
    }

    let control: Arc<dyn ControlPipe> = Arc::clone(&transport) as Arc<dyn ControlPipe>;
    let ctx: KeypadContext = DeviceContext::attach(
        transport.device_info().clone(),
        &raw_descriptor,
        config.device_config(),
        sink,
        control,
    )?;
    let backlight = ctx.backlight().ok();

    let shutdown = Arc::new(AtomicBool::new(false));
    let reader_shutdown = Arc::clone(&shutdown);
    let reader = std::thread::Builder::new()
        .name(format!("mech5-{location}"))
        .spawn(move || reader_thread(transport, ctx, reader_shutdown))
        .with_context(|| format!("spawn reader thread for {location}"))?;

    Ok((
        AttachedDevice {
            shutdown,
            reader,
            object: None,
        },
        backlight,
    ))
}

/// Pass one report to the context; false stops the reader
///
/// A broken virtual device stops the reader so the supervisor detaches the
/// keypad and attaches it again with a fresh one on the next poll.
fn handle_report<S: InputSink, C: ControlPipe>(
    ctx: &mut DeviceContext<S, C>,
    name: &str,
    report_id: u8,
    data: &[u8],
) -> bool {
    match ctx.raw_event(report_id, data) {
        Ok(disposition) => {
            if !disposition.is_consumed() {
                debug!("{}: unhandled report {:02X?}", name, data);
            }
            true
        }
        Err(KeypadError::Sink(e)) => {
            warn!("{}: failed to emit key events: {}", name, e);
            false
        }
        Err(e) => {
            warn!("{}: {}", name, e);
            true
        }
    }
}

/// Feed reports of one device into its context until it goes away
fn reader_thread(
    transport: Arc<UsbKeypadTransport>,
    mut ctx: KeypadContext,
    shutdown: Arc<AtomicBool>,
) -> ReaderExit {
    let config = ReaderConfig {
        name: ctx.info().location(),
        ..ReaderConfig::default()
    };

    let exit = run_report_reader_loop(&*transport, &shutdown, &config, |report_id, data| {
        handle_report(&mut ctx, &config.name, report_id, data)
    });

    match &exit {
        ReaderExit::Shutdown => {}
        ReaderExit::Stopped => info!("{}: virtual keypad lost, detaching", config.name),
        ReaderExit::Disconnected => info!("{}: device disconnected", config.name),
        ReaderExit::Failed(e) => error!("{}: giving up after read errors: {}", config.name, e),
    }
    exit
}

/// Lowest object index not in `used`
fn lowest_free_index(used: impl IntoIterator<Item = u32>) -> u32 {
    let mut used: Vec<u32> = used.into_iter().collect();
    used.sort_unstable();
    used.dedup();

    let mut free = 0;
    for index in used {
        if index != free {
            break;
        }
        free += 1;
    }
    free
}

/// Sleep for `duration`, returning early once `running` is cleared
async fn wait_while_running(running: &AtomicBool, duration: Duration) {
    let mut remaining = duration;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let step = remaining.min(SHUTDOWN_CHECK);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
}

/// Run the driver daemon until Ctrl-C.
pub async fn run(config: DriverConfig) -> anyhow::Result<()> {
    // Reject an unusable policy before touching any device
    config.keyup_policy.ensure_supported()?;

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let conn = builder
        .name(dbus::BUS_NAME)?
        .build()
        .await
        .context("connect to D-Bus")?;
    info!("D-Bus: {} on {:?} bus", dbus::BUS_NAME, config.bus);

    let discovery = Arc::new(UsbDiscovery::new());
    let config = Arc::new(config);
    let mut devices: HashMap<String, AttachedDevice> = HashMap::new();

    info!("Watching for keypads. Ctrl+C to stop.");

    while running.load(Ordering::SeqCst) {
        // Detach devices whose reader ended
        let finished: Vec<String> = devices
            .iter()
            .filter(|(_, dev)| dev.is_finished())
            .map(|(location, _)| location.clone())
            .collect();
        for location in finished {
            if let Some(dev) = devices.remove(&location) {
                detach_device(&conn, &location, dev).await;
            }
        }

        // Attach new devices
        let list_discovery = Arc::clone(&discovery);
        let found = match tokio::task::spawn_blocking(move || list_discovery.list_devices()).await
        {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!("Failed to list devices: {}", e);
                Vec::new()
            }
            Err(e) => {
                error!("Device listing task failed: {}", e);
                Vec::new()
            }
        };

        for found in found {
            let location = found.info.location();
            if devices.contains_key(&location) {
                continue;
            }

            let attach_discovery = Arc::clone(&discovery);
            let attach_config = Arc::clone(&config);
            let result = tokio::task::spawn_blocking(move || {
                attach_device(&attach_discovery, &found, &attach_config)
            })
            .await;

            let (mut dev, backlight) = match result {
                Ok(Ok(attached)) => attached,
                Ok(Err(e)) => {
                    warn!("Failed to attach {}: {:#}", location, e);
                    continue;
                }
                Err(e) => {
                    error!("Attach task for {} failed: {}", location, e);
                    continue;
                }
            };

            if let Some(backlight) = backlight {
                let index = lowest_free_index(
                    devices.values().filter_map(|d| d.object.as_ref().map(|(i, _)| *i)),
                );
                let path = dbus::object_path(index);
                let iface = KeypadInterface::new(backlight, location.clone());
                match conn.object_server().at(path.as_str(), iface).await {
                    Ok(_) => {
                        info!("{}: led control at {}", location, path);
                        dev.object = Some((index, path));
                    }
                    Err(e) => {
                        // Without its control surface the device is not usable
                        warn!("{}: failed to register {}: {}", location, path, e);
                        stop_device(dev).await;
                        continue;
                    }
                }
            }

            devices.insert(location, dev);
        }

        wait_while_running(&running, config.poll_interval()).await;
    }

    info!("Shutting down");
    for (location, dev) in devices.drain() {
        detach_device(&conn, &location, dev).await;
    }
    drop(conn);
    info!("Done.");
    Ok(())
}

/// Unpublish the control surface, then stop and join the reader
async fn detach_device(conn: &zbus::Connection, location: &str, dev: AttachedDevice) {
    if let Some((_, path)) = dev.object.as_ref() {
        if let Err(e) = conn
            .object_server()
            .remove::<KeypadInterface, _>(path.as_str())
            .await
        {
            warn!("{}: failed to remove {}: {}", location, path, e);
        }
    }
    stop_device(dev).await;
    info!("{}: removed", location);
}

async fn stop_device(dev: AttachedDevice) {
    dev.shutdown.store(true, Ordering::SeqCst);
    let reader = dev.reader;
    match tokio::task::spawn_blocking(move || reader.join()).await {
        Ok(Ok(exit)) => debug!("Reader exited: {:?}", exit),
        Ok(Err(_)) => error!("Reader thread panicked"),
        Err(e) => error!("Failed to join reader thread: {}", e),
    }
}
