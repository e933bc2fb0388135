//! Descriptor-driven input translation
//!
//! Decodes every input report the (normalized) descriptor declares into
//! key transitions, the way the kernel's generic HID input layer does. This
//! covers the system control report, the keyboard report and the regular
//! consumer usages that share report 2 with the macro keys.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::descriptor::{InputField, ReportDescriptor};
use crate::error::KeypadError;
use crate::hid_usage::{self, KEYBOARD_ERROR_ROLLOVER, PAGE_KEYBOARD};
use crate::interpreter::ReportDisposition;
use crate::keymap::KeyCode;
use crate::sink::InputSink;

/// Key-producing fields of one input report
#[derive(Debug, Clone, Default)]
struct ReportLayout {
    fields: Vec<InputField>,
}

/// Translator for the reports the key event interpreter leaves alone
#[derive(Debug, Clone)]
pub struct GenericInput {
    uses_report_ids: bool,
    layouts: BTreeMap<u8, ReportLayout>,
    /// Keys held per report ID
    pressed: BTreeMap<u8, BTreeSet<KeyCode>>,
}

impl GenericInput {
    pub fn new(descriptor: &ReportDescriptor) -> Self {
        let mut layouts: BTreeMap<u8, ReportLayout> = BTreeMap::new();
        for field in descriptor.inputs.iter().filter(|f| !f.is_constant()) {
            layouts
                .entry(field.report_id)
                .or_default()
                .fields
                .push(field.clone());
        }
        Self {
            uses_report_ids: descriptor.uses_report_ids,
            layouts,
            pressed: BTreeMap::new(),
        }
    }

    /// Every key code some input report can produce, ascending
    pub fn key_codes(&self) -> Vec<KeyCode> {
        let codes: BTreeSet<KeyCode> = self
            .layouts
            .values()
            .flat_map(|layout| layout.fields.iter())
            .flat_map(InputField::all_usages)
            .filter_map(hid_usage::to_key_code)
            .collect();
        codes.into_iter().collect()
    }

    /// Keys currently held by `report_id`
    pub fn pressed(&self, report_id: u8) -> impl Iterator<Item = KeyCode> + '_ {
        self.pressed.get(&report_id).into_iter().flatten().copied()
    }

    /// Translate one raw report
    ///
    /// `data` includes the report ID byte when the descriptor uses report
    /// IDs. Keys that disappeared are released before new ones are
    /// pressed; a sync follows only if anything changed.
    pub fn process<S>(
        &mut self,
        report_id: u8,
        data: &[u8],
        sink: &mut S,
    ) -> Result<ReportDisposition, KeypadError>
    where
        S: InputSink + ?Sized,
    {
        let (id, payload) = if self.uses_report_ids {
            match data.split_first() {
                Some((&first, rest)) if first == report_id => (report_id, rest),
                _ => return Ok(ReportDisposition::Unhandled),
            }
        } else {
            (0, data)
        };

        let Some(layout) = self.layouts.get(&id) else {
            return Ok(ReportDisposition::Unhandled);
        };

        let Some(now) = decode(layout, payload) else {
            trace!("report {id}: rollover error, keeping previous state");
            return Ok(ReportDisposition::Consumed);
        };

        let before = self.pressed.entry(id).or_default();
        let released: Vec<KeyCode> = before.difference(&now).copied().collect();
        let pressed: Vec<KeyCode> = now.difference(before).copied().collect();
        *before = now;

        for &code in &released {
            trace!("report {id}: key up {}", code.code());
            sink.report_key(code, false).map_err(KeypadError::Sink)?;
        }
        for &code in &pressed {
            trace!("report {id}: key down {}", code.code());
            sink.report_key(code, true).map_err(KeypadError::Sink)?;
        }
        if !released.is_empty() || !pressed.is_empty() {
            sink.sync().map_err(KeypadError::Sink)?;
        }

        Ok(ReportDisposition::Consumed)
    }
}

/// Keys asserted by a payload, or `None` on keyboard rollover error
fn decode(layout: &ReportLayout, payload: &[u8]) -> Option<BTreeSet<KeyCode>> {
    let rollover = hid_usage::usage(PAGE_KEYBOARD, KEYBOARD_ERROR_ROLLOVER);
    let mut keys = BTreeSet::new();

    for field in &layout.fields {
        for n in 0..field.report_count {
            let offset = field.bit_offset + n * field.report_size;
            let raw = extract_bits(payload, offset, field.report_size);

            let usage = if field.is_variable() {
                if raw == 0 {
                    continue;
                }
                field.usage(n)
            } else {
                let value = sign_extend(raw, field.report_size, field.logical_min < 0);
                if value < field.logical_min || value > field.logical_max {
                    continue;
                }
                u32::try_from(i64::from(value) - i64::from(field.logical_min))
                    .ok()
                    .and_then(|index| field.usage(index))
            };

            match usage {
                Some(u) if u == rollover => return None,
                Some(u) => keys.extend(hid_usage::to_key_code(u)),
                None => {}
            }
        }
    }

    Some(keys)
}

/// Little-endian bit field; bytes past the end read as zero
fn extract_bits(data: &[u8], offset: u32, size: u32) -> u32 {
    let size = size.min(32);
    let mut value = 0u32;
    for bit in 0..size {
        let pos = offset + bit;
        let byte = data.get((pos / 8) as usize).copied().unwrap_or(0);
        if byte & (1 << (pos % 8)) != 0 {
            value |= 1 << bit;
        }
    }
    value
}

fn sign_extend(raw: u32, size: u32, signed: bool) -> i32 {
    if signed && size > 0 && size < 32 && raw & (1 << (size - 1)) != 0 {
        (raw | (u32::MAX << size)) as i32
    } else {
        raw as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FIXED_DESCRIPTOR;
    use crate::sink::{RecordingSink, SinkEvent};

    fn fixed() -> GenericInput {
        GenericInput::new(&ReportDescriptor::parse(&FIXED_DESCRIPTOR).unwrap())
    }

    #[test]
    fn test_extract_bits() {
        assert_eq!(extract_bits(&[0xE9, 0x00], 0, 16), 0x00E9);
        assert_eq!(extract_bits(&[0x34, 0x12], 0, 16), 0x1234);
        assert_eq!(extract_bits(&[0b0000_0100], 2, 1), 1);
        assert_eq!(extract_bits(&[0xFF], 8, 8), 0);
        assert_eq!(extract_bits(&[0xF0, 0x0F], 4, 8), 0xFF);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xFF, 8, true), -1);
        assert_eq!(sign_extend(0xFF, 8, false), 255);
        assert_eq!(sign_extend(0x7F, 8, true), 127);
    }

    #[test]
    fn test_fixed_descriptor_key_codes() {
        let codes = fixed().key_codes();
        for code in [
            KeyCode::KEY_A,
            KeyCode::KEY_LEFTCTRL,
            KeyCode::KEY_VOLUMEUP,
            KeyCode::KEY_MUTE,
            KeyCode::KEY_POWER,
            KeyCode::KEY_SLEEP,
            KeyCode::KEY_WAKEUP,
        ] {
            assert!(codes.contains(&code), "missing {code:?}");
        }
        assert!(codes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_system_control_bits() {
        let mut generic = fixed();
        let mut sink = RecordingSink::new();

        let disposition = generic.process(3, &[0x03, 0x02], &mut sink).unwrap();
        assert!(disposition.is_consumed());
        generic.process(3, &[0x03, 0x00], &mut sink).unwrap();

        assert_eq!(
            sink.events,
            vec![
                SinkEvent::down(KeyCode::KEY_SLEEP),
                SinkEvent::Sync,
                SinkEvent::up(KeyCode::KEY_SLEEP),
                SinkEvent::Sync,
            ]
        );
    }

    #[test]
    fn test_padding_bits_are_ignored() {
        let mut generic = fixed();
        let mut sink = RecordingSink::new();

        generic.process(3, &[0x03, 0xF8], &mut sink).unwrap();
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_keyboard_array_diff() {
        let mut generic = fixed();
        let mut sink = RecordingSink::new();

        // A, then A+B, then B: short reports are zero-padded
        generic.process(7, &[0x07, 0x04], &mut sink).unwrap();
        generic.process(7, &[0x07, 0x04, 0x05], &mut sink).unwrap();
        generic.process(7, &[0x07, 0x05, 0x00], &mut sink).unwrap();
        assert_eq!(generic.pressed(7).collect::<Vec<_>>(), vec![KeyCode(48)]);
        generic.process(7, &[0x07], &mut sink).unwrap();

        assert_eq!(
            sink.events,
            vec![
                SinkEvent::down(KeyCode::KEY_A),
                SinkEvent::Sync,
                SinkEvent::down(KeyCode(48)),
                SinkEvent::Sync,
                SinkEvent::up(KeyCode::KEY_A),
                SinkEvent::Sync,
                SinkEvent::up(KeyCode(48)),
                SinkEvent::Sync,
            ]
        );
        assert_eq!(generic.pressed(7).count(), 0);
    }

    #[test]
    fn test_rollover_keeps_previous_state() {
        let mut generic = fixed();
        let mut sink = RecordingSink::new();

        generic.process(7, &[0x07, 0x04], &mut sink).unwrap();
        sink.take();
        generic.process(7, &[0x07, 0x01, 0x01, 0x01], &mut sink).unwrap();

        assert!(sink.events.is_empty());
        assert_eq!(generic.pressed(7).collect::<Vec<_>>(), vec![KeyCode::KEY_A]);
    }

    #[test]
    fn test_consumer_usage_on_macro_report() {
        let mut generic = fixed();
        let mut sink = RecordingSink::new();

        generic.process(2, &[0x02, 0xE9, 0x00], &mut sink).unwrap();
        generic.process(2, &[0x02, 0x00, 0x00], &mut sink).unwrap();
        assert_eq!(
            sink.events,
            vec![
                SinkEvent::down(KeyCode::KEY_VOLUMEUP),
                SinkEvent::Sync,
                SinkEvent::up(KeyCode::KEY_VOLUMEUP),
                SinkEvent::Sync,
            ]
        );
    }

    #[test]
    fn test_macro_key_press_yields_no_generic_key() {
        let mut generic = fixed();
        let mut sink = RecordingSink::new();

        for index in 1..=7u8 {
            generic.process(2, &[0x02, index, 0x13], &mut sink).unwrap();
        }
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_unknown_or_mismatched_reports() {
        let mut generic = fixed();
        let mut sink = RecordingSink::new();

        // Output-only report
        assert_eq!(
            generic.process(5, &[0x05, 0x04], &mut sink).unwrap(),
            ReportDisposition::Unhandled
        );
        // ID byte disagrees with the report ID
        assert_eq!(
            generic.process(7, &[0x03, 0x04], &mut sink).unwrap(),
            ReportDisposition::Unhandled
        );
        assert_eq!(
            generic.process(7, &[], &mut sink).unwrap(),
            ReportDisposition::Unhandled
        );
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_descriptor_without_report_ids() {
        // Consumer page, Usage (Volume Increment), 1 bit variable input
        let rdesc = [0x05, 0x0C, 0x09, 0xE9, 0x75, 0x01, 0x95, 0x01, 0x25, 0x01, 0x81, 0x02];
        let mut generic = GenericInput::new(&ReportDescriptor::parse(&rdesc).unwrap());
        let mut sink = RecordingSink::new();

        generic.process(0, &[0x01], &mut sink).unwrap();
        assert_eq!(
            sink.events,
            vec![SinkEvent::down(KeyCode::KEY_VOLUMEUP), SinkEvent::Sync]
        );
    }
}
