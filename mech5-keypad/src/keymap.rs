//! Fixed macro key table
//!
//! The keypad reports a vendor key index 0..7. Index 1 is the A/B bank
//! toggle, 2..6 are the A1/B1..A5/B5 keys. 0 is the "neutral" index used by
//! release reports and 7 is never sent.

/// Linux input event key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const KEY_F17: Self = Self(187);
    pub const KEY_F18: Self = Self(188);
    pub const KEY_F19: Self = Self(189);
    pub const KEY_F20: Self = Self(190);
    pub const KEY_F21: Self = Self(191);
    pub const KEY_F22: Self = Self(192);

    pub const KEY_A: Self = Self(30);
    pub const KEY_LEFTCTRL: Self = Self(29);
    pub const KEY_MUTE: Self = Self(113);
    pub const KEY_VOLUMEDOWN: Self = Self(114);
    pub const KEY_VOLUMEUP: Self = Self(115);
    pub const KEY_POWER: Self = Self(116);
    pub const KEY_SLEEP: Self = Self(142);
    pub const KEY_WAKEUP: Self = Self(143);

    /// Raw code
    pub fn code(self) -> u16 {
        self.0
    }
}

/// Number of vendor key indices
pub const KEY_MAP_SIZE: usize = 8;

/// Vendor key index to key code
pub const KEY_MAP: [Option<KeyCode>; KEY_MAP_SIZE] = [
    None,
    Some(KeyCode::KEY_F17), // A/B toggle
    Some(KeyCode::KEY_F18), // A1/B1
    Some(KeyCode::KEY_F19), // A2/B2
    Some(KeyCode::KEY_F20), // A3/B3
    Some(KeyCode::KEY_F21), // A4/B4
    Some(KeyCode::KEY_F22), // A5/B5
    None,
];

/// Key codes of every mapped entry, in index order
pub fn mapped_keys() -> impl Iterator<Item = KeyCode> {
    KEY_MAP.iter().flatten().copied()
}

/// Look up a vendor key index
pub fn lookup(index: u8) -> Option<KeyCode> {
    KEY_MAP.get(usize::from(index)).copied().flatten()
}

/// Label printed on the physical key
pub fn key_label(index: u8) -> Option<&'static str> {
    match index {
        1 => Some("A/B"),
        2 => Some("A1/B1"),
        3 => Some("A2/B2"),
        4 => Some("A3/B3"),
        5 => Some("A4/B4"),
        6 => Some("A5/B5"),
        _ => None,
    }
}
