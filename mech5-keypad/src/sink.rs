//! Input event sink abstraction

use std::io;

use crate::keymap::KeyCode;

/// Receiver of interpreted key events
///
/// All `report_key` calls belonging to one raw report are followed by
/// exactly one `sync`, which makes the batch visible atomically.
pub trait InputSink: Send {
    /// Queue a key transition
    fn report_key(&mut self, code: KeyCode, pressed: bool) -> io::Result<()>;

    /// Flush queued transitions
    fn sync(&mut self) -> io::Result<()>;
}

/// Event as seen by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Key { code: KeyCode, pressed: bool },
    Sync,
}

impl SinkEvent {
    pub fn down(code: KeyCode) -> Self {
        Self::Key {
            code,
            pressed: true,
        }
    }

    pub fn up(code: KeyCode) -> Self {
        Self::Key {
            code,
            pressed: false,
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded events, leaving the sink empty
    pub fn take(&mut self) -> Vec<SinkEvent> {
        std::mem::take(&mut self.events)
    }

    /// Key events only, without syncs
    pub fn key_events(&self) -> impl Iterator<Item = (KeyCode, bool)> + '_ {
        self.events.iter().filter_map(|e| match *e {
            SinkEvent::Key { code, pressed } => Some((code, pressed)),
            SinkEvent::Sync => None,
        })
    }
}

impl InputSink for RecordingSink {
    fn report_key(&mut self, code: KeyCode, pressed: bool) -> io::Result<()> {
        self.events.push(SinkEvent::Key { code, pressed });
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.events.push(SinkEvent::Sync);
        Ok(())
    }
}
