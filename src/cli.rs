// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mech5_driver")]
#[command(author, version, about = "Azio Levetron Mech5 macro keypad driver")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/mech5/driver.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Attach to every keypad, emit macro keys and serve LED control
    #[command(visible_alias = "run")]
    Daemon,

    /// Show or set the backlight level (0-4) through the running daemon
    #[command(visible_aliases = ["light", "l"])]
    Led {
        /// New level; omit to show the current one
        value: Option<String>,

        /// Keypad number as registered by the daemon
        #[arg(short, long, default_value_t = 0)]
        device: u32,
    },

    /// List keypad interfaces and their HID collections
    #[command(visible_alias = "ls")]
    List,

    /// Inspect and normalize a report descriptor
    #[command(visible_alias = "rdesc")]
    Descriptor {
        /// Read from a file (e.g. /sys/class/hidraw/hidraw3/device/report_descriptor)
        #[arg(short, long, conflicts_with = "live")]
        file: Option<PathBuf>,

        /// Read from the device over USB instead of sysfs
        #[arg(long)]
        live: bool,

        /// Write the normalized descriptor to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
