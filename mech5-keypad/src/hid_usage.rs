//! HID usage to Linux key code conversion
//!
//! Covers the usage pages the keypad interface declares: Generic Desktop
//! system control, Keyboard/Keypad and the common Consumer usages.

use crate::keymap::KeyCode;

pub const PAGE_GENERIC_DESKTOP: u16 = 0x01;
pub const PAGE_KEYBOARD: u16 = 0x07;
pub const PAGE_CONSUMER: u16 = 0x0C;

/// Keyboard page usage reported for every slot on phantom state
pub const KEYBOARD_ERROR_ROLLOVER: u16 = 0x01;

/// Keyboard/Keypad page 0x00..=0x73
#[rustfmt::skip]
const KEYBOARD: [u16; 0x74] = [
      0,   0,   0,   0,  30,  48,  46,  32,  18,  33,  34,  35,  23,  36,  37,  38,
     50,  49,  24,  25,  16,  19,  31,  20,  22,  47,  17,  45,  21,  44,   2,   3,
      4,   5,   6,   7,   8,   9,  10,  11,  28,   1,  14,  15,  57,  12,  13,  26,
     27,  43,  43,  39,  40,  41,  51,  52,  53,  58,  59,  60,  61,  62,  63,  64,
     65,  66,  67,  68,  87,  88,  99,  70, 119, 110, 102, 104, 111, 107, 109, 106,
    105, 108, 103,  69,  98,  55,  74,  78,  96,  79,  80,  81,  75,  76,  77,  71,
     72,  73,  82,  83,  86, 127, 116, 117, 183, 184, 185, 186, 187, 188, 189, 190,
    191, 192, 193, 194,
];

fn keyboard(usage: u16) -> Option<u16> {
    match usage {
        0x7F => Some(113), // Mute
        0x80 => Some(115), // Volume Up
        0x81 => Some(114), // Volume Down
        // Left/right Ctrl, Shift, Alt, GUI
        0xE0 => Some(29),
        0xE1 => Some(42),
        0xE2 => Some(56),
        0xE3 => Some(125),
        0xE4 => Some(97),
        0xE5 => Some(54),
        0xE6 => Some(100),
        0xE7 => Some(126),
        _ => KEYBOARD.get(usize::from(usage)).copied().filter(|&c| c != 0),
    }
}

fn consumer(usage: u16) -> Option<u16> {
    let code = match usage {
        0x6F => 225,  // Display Brightness Increment
        0x70 => 224,  // Display Brightness Decrement
        0xB5 => 163,  // Scan Next Track
        0xB6 => 165,  // Scan Previous Track
        0xB7 => 166,  // Stop
        0xCD => 164,  // Play/Pause
        0xE2 => 113,  // Mute
        0xE9 => 115,  // Volume Increment
        0xEA => 114,  // Volume Decrement
        0x183 => 171, // AL Consumer Control Configuration
        0x18A => 155, // AL Email Reader
        0x192 => 140, // AL Calculator
        0x194 => 144, // AL Local Machine Browser
        0x221 => 217, // AC Search
        0x223 => 172, // AC Home
        0x224 => 158, // AC Back
        0x225 => 159, // AC Forward
        0x226 => 128, // AC Stop
        0x227 => 173, // AC Refresh
        0x22A => 156, // AC Bookmarks
        _ => return None,
    };
    Some(code)
}

fn generic_desktop(usage: u16) -> Option<u16> {
    match usage {
        0x81 => Some(116), // System Power Down
        0x82 => Some(142), // System Sleep
        0x83 => Some(143), // System Wake Up
        _ => None,
    }
}

/// Key code for an extended usage (page << 16 | id)
pub fn to_key_code(usage: u32) -> Option<KeyCode> {
    let page = (usage >> 16) as u16;
    let id = usage as u16;
    let code = match page {
        PAGE_KEYBOARD => keyboard(id),
        PAGE_CONSUMER => consumer(id),
        PAGE_GENERIC_DESKTOP => generic_desktop(id),
        _ => None,
    };
    code.map(KeyCode)
}

/// Extended usage from page and id
pub fn usage(page: u16, id: u16) -> u32 {
    (u32::from(page) << 16) | u32::from(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_page() {
        assert_eq!(to_key_code(usage(PAGE_KEYBOARD, 0x04)), Some(KeyCode::KEY_A));
        assert_eq!(to_key_code(usage(PAGE_KEYBOARD, 0x1D)), Some(KeyCode(44))); // Z
        assert_eq!(to_key_code(usage(PAGE_KEYBOARD, 0x27)), Some(KeyCode(11))); // 0
        assert_eq!(to_key_code(usage(PAGE_KEYBOARD, 0x45)), Some(KeyCode(88))); // F12
        assert_eq!(to_key_code(usage(PAGE_KEYBOARD, 0x6C)), Some(KeyCode::KEY_F17));
        assert_eq!(
            to_key_code(usage(PAGE_KEYBOARD, 0xE0)),
            Some(KeyCode::KEY_LEFTCTRL)
        );
        assert_eq!(to_key_code(usage(PAGE_KEYBOARD, 0x00)), None);
        assert_eq!(to_key_code(usage(PAGE_KEYBOARD, KEYBOARD_ERROR_ROLLOVER)), None);
        assert_eq!(to_key_code(usage(PAGE_KEYBOARD, 0xA0)), None);
    }

    #[test]
    fn test_consumer_and_system_pages() {
        assert_eq!(
            to_key_code(usage(PAGE_CONSUMER, 0xE9)),
            Some(KeyCode::KEY_VOLUMEUP)
        );
        assert_eq!(to_key_code(usage(PAGE_CONSUMER, 0xE2)), Some(KeyCode::KEY_MUTE));
        // Macro key events land in unassigned consumer usages
        assert_eq!(to_key_code(usage(PAGE_CONSUMER, 0x1301)), None);
        assert_eq!(
            to_key_code(usage(PAGE_GENERIC_DESKTOP, 0x82)),
            Some(KeyCode::KEY_SLEEP)
        );
        assert_eq!(to_key_code(usage(0x08, 0x81)), None);
    }
}
