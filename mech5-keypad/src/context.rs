//! Per-device state
//!
//! A [`DeviceContext`] is created once a keypad interface has been opened
//! and its report descriptor read. It owns everything the device needs and
//! is passed explicitly to every operation; nothing is kept in globals.

use std::sync::Arc;

use mech5_transport::{ControlPipe, TransportDeviceInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backlight::BacklightController;
use crate::descriptor::{self, ReportDescriptor};
use crate::error::KeypadError;
use crate::gate;
use crate::generic::GenericInput;
use crate::interpreter::{KeyEventInterpreter, KeyupPolicy, ReportDisposition};
use crate::keymap::{self, KeyCode};
use crate::sink::InputSink;

/// Keys a virtual device for this interface must declare
///
/// The macro keys plus every key the normalized descriptor can report.
pub fn advertised_keys(raw_descriptor: &[u8]) -> Result<Vec<KeyCode>, KeypadError> {
    let reports = ReportDescriptor::parse(descriptor::normalize(raw_descriptor))?;
    let mut keys: Vec<KeyCode> = keymap::mapped_keys()
        .chain(GenericInput::new(&reports).key_codes())
        .collect();
    keys.sort_unstable();
    keys.dedup();
    Ok(keys)
}

/// Per-device behaviour knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub keyup_policy: KeyupPolicy,
    /// Log every report at info level
    pub verbose: bool,
}

/// Attached keypad interface
pub struct DeviceContext<S: InputSink, C: ControlPipe> {
    info: TransportDeviceInfo,
    descriptor: Vec<u8>,
    reports: ReportDescriptor,
    interpreter: KeyEventInterpreter,
    generic: GenericInput,
    sink: S,
    backlight: Option<Arc<BacklightController<C>>>,
}

impl<S: InputSink, C: ControlPipe> DeviceContext<S, C> {
    /// Build the context for a freshly opened interface
    ///
    /// Normalizes and parses the descriptor, sets up the interpreter and,
    /// if the interface passes the capability gate, the backlight
    /// controller. Any failure drops what was acquired so far.
    pub fn attach(
        info: TransportDeviceInfo,
        raw_descriptor: &[u8],
        config: DeviceConfig,
        sink: S,
        control: C,
    ) -> Result<Self, KeypadError> {
        let descriptor = descriptor::normalize(raw_descriptor).to_vec();
        let reports = ReportDescriptor::parse(&descriptor)?;
        debug!(
            "{}: descriptor {} bytes, report ids {:?}",
            info.location(),
            descriptor.len(),
            reports.report_ids()
        );

        if !reports.has_macro_keys() {
            warn!(
                "{}: descriptor declares no macro key report",
                info.location()
            );
        }

        let interpreter = KeyEventInterpreter::new(config.keyup_policy, config.verbose)?;
        let generic = GenericInput::new(&reports);

        let backlight = if gate::has_led_control(&info) {
            if !reports.has_led_output() {
                warn!("{}: LED interface without LED output report", info.location());
            }
            Some(Arc::new(BacklightController::new(control)))
        } else {
            None
        };

        info!(
            "{}: attached, keyup policy {:?}, backlight {}",
            info.location(),
            config.keyup_policy,
            if backlight.is_some() { "available" } else { "unavailable" }
        );

        Ok(Self {
            info,
            descriptor,
            reports,
            interpreter,
            generic,
            sink,
            backlight,
        })
    }

    /// Feed one raw interrupt report
    ///
    /// The macro key interpreter sees it first, then the descriptor-driven
    /// translator, so consumer usages sharing report 2 still come through.
    pub fn raw_event(
        &mut self,
        report_id: u8,
        data: &[u8],
    ) -> Result<ReportDisposition, KeypadError> {
        let macro_keys = self.interpreter.process(report_id, data, &mut self.sink)?;
        let generic = self.generic.process(report_id, data, &mut self.sink)?;
        if macro_keys.is_consumed() || generic.is_consumed() {
            Ok(ReportDisposition::Consumed)
        } else {
            Ok(ReportDisposition::Unhandled)
        }
    }

    /// Shared handle to the backlight controller
    pub fn backlight(&self) -> Result<Arc<BacklightController<C>>, KeypadError> {
        self.backlight
            .clone()
            .ok_or(KeypadError::LedControlUnavailable)
    }

    pub fn has_backlight(&self) -> bool {
        self.backlight.is_some()
    }

    pub fn info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    /// Normalized report descriptor
    pub fn descriptor(&self) -> &[u8] {
        &self.descriptor
    }

    pub fn reports(&self) -> &ReportDescriptor {
        &self.reports
    }

    pub fn interpreter(&self) -> &KeyEventInterpreter {
        &self.interpreter
    }

    pub fn generic(&self) -> &GenericInput {
        &self.generic
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: InputSink, C: ControlPipe> Drop for DeviceContext<S, C> {
    fn drop(&mut self) {
        info!("{}: detached", self.info.location());
    }
}
