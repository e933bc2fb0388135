//! Report descriptor fixup for the macro keypad interface
//!
//! The keypad interface reports a descriptor whose keyboard collection
//! declares a wrong usage maximum, so the kernel (and any other HID parser)
//! maps the macro keys to garbage. When the known descriptor is detected it
//! is replaced wholesale by a hand-written one.

use tracing::info;

use crate::error::KeypadError;

/// First four bytes of the malformed descriptor:
/// Usage Page (Consumer), Usage (Consumer Control)
pub const MALFORMED_SIGNATURE: [u8; 4] = [0x05, 0x0C, 0x09, 0x01];

/// Descriptors at or below this size are left alone
pub const MALFORMED_MIN_SIZE: usize = 65;

/// Report ID of the consumer-control macro key report
pub const REPORT_ID_MACRO_KEYS: u8 = 0x02;
/// Report ID of the system power/sleep/wake report
pub const REPORT_ID_SYSTEM_CONTROL: u8 = 0x03;
/// Report ID of the LED output report
pub const REPORT_ID_LED: u8 = 0x05;
/// Report ID of the keyboard input report
pub const REPORT_ID_KEYBOARD: u8 = 0x07;

#[rustfmt::skip]
pub static FIXED_DESCRIPTOR: [u8; 103] = [
    0x05, 0x0C,             // Usage Page (Consumer)
    0x09, 0x01,             // Usage (Consumer Control)
    0xA1, 0x01,             // Collection (Application)
    0x85, 0x02,             //   Report ID (2)
    0x19, 0x00,             //   Usage Minimum (Unassigned)
    0x2A, 0xFF, 0x1F,       //   Usage Maximum (0x1FFF)
    0x15, 0x00,             //   Logical Minimum (0)
    0x26, 0xFF, 0x1F,       //   Logical Maximum (8191)
    0x75, 0x10,             //   Report Size (16)
    0x95, 0x01,             //   Report Count (1)
    0x81, 0x00,             //   Input (Data,Array,Abs)
    0xC0,                   // End Collection
    0x05, 0x01,             // Usage Page (Generic Desktop)
    0x09, 0x80,             // Usage (Sys Control)
    0xA1, 0x01,             // Collection (Application)
    0x85, 0x03,             //   Report ID (3)
    0x75, 0x01,             //   Report Size (1)
    0x95, 0x03,             //   Report Count (3)
    0x15, 0x00,             //   Logical Minimum (0)
    0x25, 0x01,             //   Logical Maximum (1)
    0x09, 0x81,             //   Usage (Sys Power Down)
    0x09, 0x82,             //   Usage (Sys Sleep)
    0x09, 0x83,             //   Usage (Sys Wake Up)
    0x81, 0x62,             //   Input (Data,Var,Abs,No Preferred,Null State)
    0x95, 0x05,             //   Report Count (5)
    0x81, 0x03,             //   Input (Const,Var,Abs)
    0xC0,                   // End Collection
    0x05, 0x08,             // Usage Page (LEDs)
    0x09, 0x89,             // Usage (0x89)
    0xA1, 0x01,             // Collection (Application)
    0x85, 0x05,             //   Report ID (5)
    0x19, 0x81,             //   Usage Minimum (0x81)
    0x29, 0x88,             //   Usage Maximum (0x88)
    0x15, 0x00,             //   Logical Minimum (0)
    0x25, 0x01,             //   Logical Maximum (1)
    0x95, 0x08,             //   Report Count (8)
    0x75, 0x01,             //   Report Size (1)
    0x91, 0x02,             //   Output (Data,Var,Abs)
    0xC0,                   // End Collection
    0x05, 0x01,             // Usage Page (Generic Desktop)
    0x09, 0x06,             // Usage (Keyboard)
    0xA1, 0x01,             // Collection (Application)
    0x05, 0x07,             //   Usage Page (Kbrd/Keypad)
    0x19, 0x00,             //   Usage Minimum (0x00)
    0x29, 0xE7,             //   Usage Maximum (0xE7)
    0x15, 0x00,             //   Logical Minimum (0)
    0x26, 0xE7, 0x00,       //   Logical Maximum (231)
    0x75, 0x08,             //   Report Size (8)
    0x95, 0x14,             //   Report Count (20)
    0x85, 0x07,             //   Report ID (7)
    0x81, 0x00,             //   Input (Data,Array,Abs)
    0xC0,                   // End Collection
];

/// Whether `rdesc` is the known-malformed keypad descriptor
pub fn needs_fixup(rdesc: &[u8]) -> bool {
    rdesc.len() > MALFORMED_MIN_SIZE && rdesc.starts_with(&MALFORMED_SIGNATURE)
}

/// Return the descriptor to parse in place of `rdesc`
///
/// Idempotent: the fixed descriptor itself matches the signature and is
/// replaced by itself.
pub fn normalize(rdesc: &[u8]) -> &[u8] {
    if needs_fixup(rdesc) {
        info!(
            "Fixing up Azio Levetron macro keypad report descriptor ({} -> {} bytes)",
            rdesc.len(),
            FIXED_DESCRIPTOR.len()
        );
        &FIXED_DESCRIPTOR
    } else {
        rdesc
    }
}

// === Minimal item walker ===

/// Main item kinds that define report fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Input,
    Output,
    Feature,
}

/// One report declared by a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Report ID (0 when the descriptor uses no report IDs)
    pub id: u8,
    /// Usage page in effect at the first field of the report
    pub usage_page: u16,
    pub has_input: bool,
    pub has_output: bool,
    pub has_feature: bool,
}

/// Main item flag: constant (padding)
pub const FLAG_CONSTANT: u32 = 0x01;
/// Main item flag: variable (one usage per element) instead of array
pub const FLAG_VARIABLE: u32 = 0x02;

/// One Input main item
///
/// Usages are extended (page << 16 | id). Offsets are in bits from the
/// start of the payload, after the report ID byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputField {
    pub report_id: u8,
    pub bit_offset: u32,
    pub report_size: u32,
    pub report_count: u32,
    pub flags: u32,
    pub logical_min: i32,
    pub logical_max: i32,
    /// Explicit Usage items, in order
    pub usages: Vec<u32>,
    /// Usage Minimum / Usage Maximum, when given
    pub usage_range: Option<(u32, u32)>,
}

impl InputField {
    pub fn is_constant(&self) -> bool {
        self.flags & FLAG_CONSTANT != 0
    }

    pub fn is_variable(&self) -> bool {
        self.flags & FLAG_VARIABLE != 0
    }

    /// Usage of the `n`th usage slot (element of a variable field, or
    /// logical value offset of an array field)
    pub fn usage(&self, n: u32) -> Option<u32> {
        if !self.usages.is_empty() {
            let index = (n as usize).min(self.usages.len() - 1);
            return self.usages.get(index).copied();
        }
        let (min, max) = self.usage_range?;
        min.checked_add(n).filter(|&u| u <= max)
    }

    /// Every usage this field can report
    pub fn all_usages(&self) -> Vec<u32> {
        if !self.usages.is_empty() {
            return self.usages.clone();
        }
        match self.usage_range {
            Some((min, max)) if min <= max => (min..=max).collect(),
            _ => Vec::new(),
        }
    }
}

/// Reports declared by a descriptor, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDescriptor {
    pub reports: Vec<ReportEntry>,
    /// Input fields in declaration order
    pub inputs: Vec<InputField>,
    /// Whether any Report ID item was seen
    pub uses_report_ids: bool,
}

/// Global items in effect at a main item
#[derive(Debug, Clone, Copy, Default)]
struct Globals {
    usage_page: u16,
    report_id: u8,
    report_size: u32,
    report_count: u32,
    logical_min: i32,
    logical_max: i32,
}

/// Local items, cleared after every main item
#[derive(Debug, Default)]
struct Locals {
    usages: Vec<u32>,
    usage_min: Option<u32>,
    usage_max: Option<u32>,
}

impl ReportDescriptor {
    /// Walk the short items of `rdesc`
    ///
    /// Tracks what is needed to list reports and to decode input fields:
    /// usage page, report ID, size/count, logical range, usages, collection
    /// nesting and the main items.
    pub fn parse(rdesc: &[u8]) -> Result<Self, KeypadError> {
        let mut parsed = Self::default();
        let mut globals = Globals::default();
        let mut locals = Locals::default();
        // Input bit offset per report ID
        let mut input_offsets: Vec<(u8, u32)> = Vec::new();
        let mut depth: usize = 0;
        let mut pos = 0;

        while pos < rdesc.len() {
            let prefix = rdesc[pos];

            // Long item: 0xFE, size, tag, data
            if prefix == 0xFE {
                let size = *rdesc.get(pos + 1).ok_or_else(|| truncated(pos))? as usize;
                pos += 3 + size;
                if pos > rdesc.len() {
                    return Err(truncated(pos));
                }
                continue;
            }

            let size = match prefix & 0x03 {
                3 => 4,
                n => n as usize,
            };
            let data = rdesc
                .get(pos + 1..pos + 1 + size)
                .ok_or_else(|| truncated(pos))?;
            let value = data
                .iter()
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            let item_type = (prefix >> 2) & 0x03;
            let tag = prefix >> 4;
            let page = u32::from(globals.usage_page);
            let extended = move |v: u32| if size == 4 { v } else { (page << 16) | v };

            match (item_type, tag) {
                // Main items
                (0, 0x8) => {
                    parsed.record(globals.report_id, globals.usage_page, ReportKind::Input);
                    let offset = match input_offsets
                        .iter_mut()
                        .find(|(id, _)| *id == globals.report_id)
                    {
                        Some((_, offset)) => offset,
                        None => {
                            input_offsets.push((globals.report_id, 0));
                            let last = input_offsets.len() - 1;
                            &mut input_offsets[last].1
                        }
                    };
                    let usage_range = match (locals.usage_min, locals.usage_max) {
                        (Some(min), Some(max)) => Some((min, max)),
                        _ => None,
                    };
                    parsed.inputs.push(InputField {
                        report_id: globals.report_id,
                        bit_offset: *offset,
                        report_size: globals.report_size,
                        report_count: globals.report_count,
                        flags: value,
                        logical_min: globals.logical_min,
                        logical_max: globals.logical_max,
                        usages: std::mem::take(&mut locals.usages),
                        usage_range,
                    });
                    *offset = offset
                        .saturating_add(globals.report_size.saturating_mul(globals.report_count));
                }
                (0, 0x9) => parsed.record(globals.report_id, globals.usage_page, ReportKind::Output),
                (0, 0xB) => {
                    parsed.record(globals.report_id, globals.usage_page, ReportKind::Feature)
                }
                (0, 0xA) => depth += 1,
                (0, 0xC) => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        KeypadError::InvalidDescriptor(format!(
                            "End Collection without Collection at offset {pos}"
                        ))
                    })?;
                }
                // Global items
                (1, 0x0) => globals.usage_page = value as u16,
                (1, 0x1) => globals.logical_min = sign_extend(value, size),
                (1, 0x2) => globals.logical_max = sign_extend(value, size),
                (1, 0x7) => globals.report_size = value,
                (1, 0x8) => {
                    if value == 0 || value > 0xFF {
                        return Err(KeypadError::InvalidDescriptor(format!(
                            "Report ID {value} at offset {pos}"
                        )));
                    }
                    globals.report_id = value as u8;
                    parsed.uses_report_ids = true;
                }
                (1, 0x9) => globals.report_count = value,
                // Local items
                (2, 0x0) => locals.usages.push(extended(value)),
                (2, 0x1) => locals.usage_min = Some(extended(value)),
                (2, 0x2) => locals.usage_max = Some(extended(value)),
                _ => {}
            }

            // Locals only apply to the next main item
            if item_type == 0 {
                locals = Locals::default();
            }

            pos += 1 + size;
        }

        if depth != 0 {
            return Err(KeypadError::InvalidDescriptor(format!(
                "{depth} unterminated collection(s)"
            )));
        }

        Ok(parsed)
    }

    fn record(&mut self, id: u8, usage_page: u16, kind: ReportKind) {
        let entry = match self.reports.iter_mut().position(|r| r.id == id) {
            Some(i) => &mut self.reports[i],
            None => {
                self.reports.push(ReportEntry {
                    id,
                    usage_page,
                    has_input: false,
                    has_output: false,
                    has_feature: false,
                });
                let last = self.reports.len() - 1;
                &mut self.reports[last]
            }
        };
        match kind {
            ReportKind::Input => entry.has_input = true,
            ReportKind::Output => entry.has_output = true,
            ReportKind::Feature => entry.has_feature = true,
        }
    }

    /// Report IDs in order of first appearance
    pub fn report_ids(&self) -> Vec<u8> {
        self.reports.iter().map(|r| r.id).collect()
    }

    /// Look up a report by ID
    pub fn report(&self, id: u8) -> Option<&ReportEntry> {
        self.reports.iter().find(|r| r.id == id)
    }

    /// Input fields of one report
    pub fn input_fields(&self, id: u8) -> impl Iterator<Item = &InputField> + '_ {
        self.inputs.iter().filter(move |f| f.report_id == id)
    }

    /// True if the descriptor declares the macro key input report
    pub fn has_macro_keys(&self) -> bool {
        self.report(REPORT_ID_MACRO_KEYS)
            .is_some_and(|r| r.has_input)
    }

    /// True if the descriptor declares the LED output report
    pub fn has_led_output(&self) -> bool {
        self.report(REPORT_ID_LED).is_some_and(|r| r.has_output)
    }
}

fn sign_extend(value: u32, size: usize) -> i32 {
    match size {
        1 => i32::from(value as u8 as i8),
        2 => i32::from(value as u16 as i16),
        _ => value as i32,
    }
}

fn truncated(offset: usize) -> KeypadError {
    KeypadError::InvalidDescriptor(format!("truncated item at offset {offset}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Descriptor captured from the keypad interface (first 77 bytes)
    #[rustfmt::skip]
    const CAPTURED: [u8; 77] = [
        5, 12, 9, 1, 161, 1, 133, 2, 25, 0, 42, 255, 31, 21, 0, 38, 255, 31,
        117, 16, 149, 1, 129, 0, 192, 5, 1, 9, 128, 161, 1, 133, 3, 117, 1, 149, 3, 21,
        0, 37, 1, 9, 129, 9, 130, 9, 131, 129, 98, 149, 5, 129, 3, 192, 5, 8, 9, 137,
        161, 1, 133, 5, 25, 129, 41, 136, 21, 0, 37, 1, 149, 8, 117, 1, 145, 2, 192,
    ];

    #[test]
    fn test_captured_descriptor_is_replaced() {
        let out = normalize(&CAPTURED);
        assert_eq!(out, &FIXED_DESCRIPTOR[..]);
        assert_eq!(out.len(), 103);
    }

    #[test]
    fn test_signature_with_padding_is_replaced() {
        let mut rdesc = vec![0x05, 0x0C, 0x09, 0x01];
        rdesc.resize(70, 0x00);
        assert_eq!(normalize(&rdesc), &FIXED_DESCRIPTOR[..]);
    }

    #[test]
    fn test_short_signature_passes_through() {
        let mut rdesc = vec![0x05, 0x0C, 0x09, 0x01];
        rdesc.resize(65, 0xAA);
        assert_eq!(normalize(&rdesc), rdesc.as_slice());
    }

    #[test]
    fn test_other_descriptor_passes_through() {
        // Boot keyboard descriptor of interface 0
        let mut rdesc = vec![0x05, 0x01, 0x09, 0x06, 0xA1, 0x01];
        rdesc.resize(120, 0x00);
        assert_eq!(normalize(&rdesc), rdesc.as_slice());
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(&CAPTURED);
        let twice = normalize(once);
        assert_eq!(once, twice);

        let other = [0x06, 0xFF, 0xFF, 0x09, 0x01];
        assert_eq!(normalize(normalize(&other)), normalize(&other));
    }

    #[test]
    fn test_fixed_descriptor_declares_four_reports() {
        let parsed = ReportDescriptor::parse(&FIXED_DESCRIPTOR).unwrap();
        assert_eq!(parsed.report_ids(), vec![2, 3, 5, 7]);

        let macro_keys = parsed.report(REPORT_ID_MACRO_KEYS).unwrap();
        assert_eq!(macro_keys.usage_page, 0x0C);
        assert!(macro_keys.has_input);

        let system = parsed.report(REPORT_ID_SYSTEM_CONTROL).unwrap();
        assert_eq!(system.usage_page, 0x01);

        let led = parsed.report(REPORT_ID_LED).unwrap();
        assert_eq!(led.usage_page, 0x08);
        assert!(led.has_output && !led.has_input);

        let keyboard = parsed.report(REPORT_ID_KEYBOARD).unwrap();
        assert_eq!(keyboard.usage_page, 0x07);

        assert!(parsed.has_macro_keys());
        assert!(parsed.has_led_output());
    }

    #[test]
    fn test_fixed_descriptor_input_fields() {
        let parsed = ReportDescriptor::parse(&FIXED_DESCRIPTOR).unwrap();
        assert!(parsed.uses_report_ids);

        let consumer: Vec<_> = parsed.input_fields(REPORT_ID_MACRO_KEYS).collect();
        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer[0].report_size, 16);
        assert_eq!(consumer[0].logical_max, 0x1FFF);
        assert!(!consumer[0].is_variable());
        assert_eq!(consumer[0].usage_range, Some((0x000C_0000, 0x000C_1FFF)));
        assert_eq!(consumer[0].usage(0xE9), Some(0x000C_00E9));

        let system: Vec<_> = parsed.input_fields(REPORT_ID_SYSTEM_CONTROL).collect();
        assert_eq!(system.len(), 2);
        assert!(system[0].is_variable());
        assert_eq!(
            system[0].usages,
            vec![0x0001_0081, 0x0001_0082, 0x0001_0083]
        );
        assert!(system[1].is_constant());
        assert_eq!(system[1].bit_offset, 3);

        let keyboard: Vec<_> = parsed.input_fields(REPORT_ID_KEYBOARD).collect();
        assert_eq!(keyboard.len(), 1);
        assert_eq!(keyboard[0].report_count, 20);
        assert_eq!(keyboard[0].logical_max, 231);
        assert_eq!(keyboard[0].usage(0x04), Some(0x0007_0004));
        assert_eq!(keyboard[0].usage(0xE8), None);

        assert_eq!(parsed.input_fields(REPORT_ID_LED).count(), 0);
    }

    #[test]
    fn test_negative_logical_minimum() {
        // Logical Minimum (-127), Logical Maximum (127), Input
        let parsed = ReportDescriptor::parse(&[0x15, 0x81, 0x25, 0x7F, 0x81, 0x06]).unwrap();
        assert_eq!(parsed.inputs[0].logical_min, -127);
        assert_eq!(parsed.inputs[0].logical_max, 127);
    }

    #[test]
    fn test_truncated_item_is_rejected() {
        // Usage Maximum with a 2-byte payload cut short
        let err = ReportDescriptor::parse(&[0x05, 0x0C, 0x2A, 0xFF]).unwrap_err();
        assert!(matches!(err, KeypadError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_unbalanced_collection_is_rejected() {
        assert!(ReportDescriptor::parse(&[0xA1, 0x01]).is_err());
        assert!(ReportDescriptor::parse(&[0xC0]).is_err());
    }

    #[test]
    fn test_descriptor_without_report_ids() {
        // Input (Data,Var,Abs) with no Report ID item
        let parsed = ReportDescriptor::parse(&[0x05, 0x01, 0x81, 0x02]).unwrap();
        assert_eq!(parsed.report_ids(), vec![0]);
        assert!(!parsed.has_macro_keys());
        assert!(!parsed.uses_report_ids);
    }
}
