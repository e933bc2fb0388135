//! Key event interpreter
//!
//! The keypad sends report 2 as `[02, key_index, event]`. A press is
//! `event == 0x13` with the key index; there is no per-key release, only a
//! generic "neutral" report `[02, 00, 00]`. Which held keys that neutral
//! report releases, and whether a new press implicitly releases the previous
//! key, is decided by the [`KeyupPolicy`].

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::descriptor::REPORT_ID_MACRO_KEYS;
use crate::error::KeypadError;
use crate::keymap::{self, KEY_MAP_SIZE};
use crate::sink::InputSink;

/// Event code of a key press
pub const EVENT_KEY_DOWN: u8 = 0x13;

/// Event code of the neutral (release) report
pub const EVENT_NEUTRAL: u8 = 0x00;

/// Key index carried by the neutral report
pub const NEUTRAL_KEY_INDEX: u8 = 0x00;

/// Minimum length of a macro key report: id, key index, event
pub const MACRO_REPORT_LEN: usize = 3;

/// When a held macro key is considered released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyupPolicy {
    /// A new press releases the previously held key first. This is how the
    /// Windows driver behaves.
    #[default]
    OnNextPress,
    /// Keys stack up; the first neutral report releases all of them.
    OnFirstRelease,
    /// Keys stack up and are held until the release signal, which releases
    /// all of them.
    OnLastRelease,
    /// Keys released only when each one's release was observed. The device
    /// never reports per-key releases, so this cannot be implemented.
    OnAllReleased,
}

impl KeyupPolicy {
    /// Reject policies the wire protocol cannot support
    pub fn ensure_supported(self) -> Result<Self, KeypadError> {
        match self {
            KeyupPolicy::OnAllReleased => Err(KeypadError::UnsupportedPolicy(self)),
            other => Ok(other),
        }
    }
}

/// Which vendor key indices are currently held
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    pressed: [bool; KEY_MAP_SIZE],
}

impl KeyState {
    /// Mark `index` as held. Unmapped indices are never recorded.
    fn press(&mut self, index: u8) {
        if keymap::lookup(index).is_some() {
            self.pressed[usize::from(index)] = true;
        }
    }

    /// Clear all flags, returning the indices that were held
    fn take_held(&mut self) -> Vec<u8> {
        let held = self.held().collect();
        self.pressed = [false; KEY_MAP_SIZE];
        held
    }

    /// Whether `index` is held
    pub fn is_pressed(&self, index: u8) -> bool {
        self.pressed
            .get(usize::from(index))
            .copied()
            .unwrap_or(false)
    }

    /// Held indices in ascending order
    pub fn held(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..)
            .zip(self.pressed.iter())
            .filter_map(|(i, &p)| p.then_some(i))
    }

    pub fn is_empty(&self) -> bool {
        !self.pressed.iter().any(|&p| p)
    }
}

/// Whether a raw report was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDisposition {
    /// Report was a macro key report and has been handled
    Consumed,
    /// Not ours; state untouched, another layer may interpret it
    Unhandled,
}

impl ReportDisposition {
    pub fn is_consumed(self) -> bool {
        self == ReportDisposition::Consumed
    }
}

/// Stateful translator from raw macro key reports to key events
#[derive(Debug, Clone)]
pub struct KeyEventInterpreter {
    state: KeyState,
    policy: KeyupPolicy,
    verbose: bool,
}

impl KeyEventInterpreter {
    /// Create an interpreter with nothing held
    ///
    /// Fails with `UnsupportedPolicy` for [`KeyupPolicy::OnAllReleased`].
    pub fn new(policy: KeyupPolicy, verbose: bool) -> Result<Self, KeypadError> {
        Ok(Self {
            state: KeyState::default(),
            policy: policy.ensure_supported()?,
            verbose,
        })
    }

    pub fn policy(&self) -> KeyupPolicy {
        self.policy
    }

    pub fn key_state(&self) -> &KeyState {
        &self.state
    }

    /// Interpret one raw report
    ///
    /// `data` includes the report id as its first byte.
    pub fn process<S>(
        &mut self,
        report_id: u8,
        data: &[u8],
        sink: &mut S,
    ) -> Result<ReportDisposition, KeypadError>
    where
        S: InputSink + ?Sized,
    {
        if report_id != REPORT_ID_MACRO_KEYS
            || data.len() < MACRO_REPORT_LEN
            || data[0] != report_id
        {
            return Ok(ReportDisposition::Unhandled);
        }

        let key_index = data[1];
        let event_code = data[2];

        match (key_index, event_code) {
            (index, EVENT_KEY_DOWN) if index > 0 && usize::from(index) < KEY_MAP_SIZE => {
                self.key_down(index, sink)?;
            }
            (NEUTRAL_KEY_INDEX, EVENT_NEUTRAL) => {
                self.diag(format_args!("neutral report, releasing held keys"));
                self.release_all(sink)?;
            }
            _ => {
                trace!(
                    "Ignoring macro report index={} event=0x{:02X}",
                    key_index,
                    event_code
                );
            }
        }

        sink.sync().map_err(KeypadError::Sink)?;
        Ok(ReportDisposition::Consumed)
    }

    fn key_down<S>(&mut self, index: u8, sink: &mut S) -> Result<(), KeypadError>
    where
        S: InputSink + ?Sized,
    {
        match self.policy {
            KeyupPolicy::OnNextPress => self.release_all(sink)?,
            KeyupPolicy::OnFirstRelease | KeyupPolicy::OnLastRelease => {}
            KeyupPolicy::OnAllReleased => {
                return Err(KeypadError::UnsupportedPolicy(self.policy));
            }
        }

        if let Some(code) = keymap::lookup(index) {
            self.diag(format_args!(
                "key down {} -> code {}",
                keymap::key_label(index).unwrap_or("?"),
                code.code()
            ));
            self.state.press(index);
            sink.report_key(code, true).map_err(KeypadError::Sink)?;
        }
        Ok(())
    }

    /// Release every held key: key-up for each mapped held index, then clear
    fn release_all<S>(&mut self, sink: &mut S) -> Result<(), KeypadError>
    where
        S: InputSink + ?Sized,
    {
        for index in self.state.take_held() {
            if let Some(code) = keymap::lookup(index) {
                self.diag(format_args!(
                    "key up {} -> code {}",
                    keymap::key_label(index).unwrap_or("?"),
                    code.code()
                ));
                sink.report_key(code, false).map_err(KeypadError::Sink)?;
            }
        }
        Ok(())
    }

    fn diag(&self, args: std::fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", args);
        } else {
            trace!("{}", args);
        }
    }
}
