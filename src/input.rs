//! Keyboard capture.
//!
//! Raw key events arrive by DOM-style key name (`"w"`, `"ArrowUp"`, `"Escape"`)
//! and are folded into a fixed table of held keys. The session reads that table
//! once per tick through a [`Layout`], which turns it into [`Controls`].

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::spawn::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    S,
    A,
    D,
    R,
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
}

const KEY_COUNT: usize = 11;

impl Key {
    pub const ALL: [Key; KEY_COUNT] = [
        Key::W,
        Key::S,
        Key::A,
        Key::D,
        Key::R,
        Key::Up,
        Key::Down,
        Key::Left,
        Key::Right,
        Key::Enter,
        Key::Escape,
    ];

    const fn index(self) -> usize {
        match self {
            Key::W => 0,
            Key::S => 1,
            Key::A => 2,
            Key::D => 3,
            Key::R => 4,
            Key::Up => 5,
            Key::Down => 6,
            Key::Left => 7,
            Key::Right => 8,
            Key::Enter => 9,
            Key::Escape => 10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Key::W => "w",
            Key::S => "s",
            Key::A => "a",
            Key::D => "d",
            Key::R => "r",
            Key::Up => "ArrowUp",
            Key::Down => "ArrowDown",
            Key::Left => "ArrowLeft",
            Key::Right => "ArrowRight",
            Key::Enter => "Enter",
            Key::Escape => "Escape",
        }
    }

    /// Unrecognized names yield `None` and are ignored by callers.
    pub fn from_name(name: &str) -> Option<Key> {
        Key::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStates {
    down: [bool; KEY_COUNT],
}

impl KeyStates {
    pub fn set(&mut self, key: Key, is_down: bool) {
        self.down[key.index()] = is_down;
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.down[key.index()]
    }

    /// Apply a named key event. Returns false for keys we don't track.
    pub fn key_event(&mut self, name: &str, is_down: bool) -> bool {
        match Key::from_name(name) {
            Some(key) => {
                self.set(key, is_down);
                true
            }
            None => false,
        }
    }

    pub fn controls(&self, layout: Layout) -> Controls {
        let any = |keys: &[Key]| keys.iter().any(|k| self.is_down(*k));
        let exit = self.is_down(Key::Escape);
        match layout {
            Layout::Combined => Controls {
                accelerate: any(&[Key::W, Key::Up]),
                reverse: any(&[Key::S, Key::Down]),
                left: any(&[Key::A, Key::Left]),
                right: any(&[Key::D, Key::Right]),
                reset: self.is_down(Key::R),
                exit,
            },
            Layout::Split(Player::P1) => Controls {
                accelerate: self.is_down(Key::W),
                reverse: self.is_down(Key::S),
                left: self.is_down(Key::A),
                right: self.is_down(Key::D),
                reset: self.is_down(Key::R),
                exit,
            },
            Layout::Split(Player::P2) => Controls {
                accelerate: self.is_down(Key::Up),
                reverse: self.is_down(Key::Down),
                left: self.is_down(Key::Left),
                right: self.is_down(Key::Right),
                reset: self.is_down(Key::Enter),
                exit,
            },
        }
    }
}

/// How held keys map onto one car.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Letters and arrows both drive the same car.
    Combined,
    /// One keyboard, two cars: letters for p1, arrows for p2.
    Split(Player),
}

/// Held-control record for one car.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub accelerate: bool,
    pub reverse: bool,
    pub left: bool,
    pub right: bool,
    pub reset: bool,
    pub exit: bool,
}

impl Controls {
    /// Wire form: every control under its canonical key name.
    pub fn to_key_map(&self) -> BTreeMap<String, bool> {
        [
            (Key::W, self.accelerate),
            (Key::S, self.reverse),
            (Key::A, self.left),
            (Key::D, self.right),
            (Key::R, self.reset),
            (Key::Escape, self.exit),
        ]
        .into_iter()
        .map(|(key, down)| (key.name().to_string(), down))
        .collect()
    }

    /// Any recognized key name counts, so a peer sending `ArrowUp` still
    /// accelerates. Unknown names are dropped.
    pub fn from_key_map(map: &BTreeMap<String, bool>) -> Controls {
        let mut keys = KeyStates::default();
        for (name, down) in map {
            if let Some(key) = Key::from_name(name) {
                keys.set(key, keys.is_down(key) || *down);
            }
        }
        keys.controls(Layout::Combined)
    }
}

/// Shared handle the keyboard source writes into and the session reads from.
#[derive(Debug, Clone, Default)]
pub struct InputCapture {
    keys: Arc<Mutex<KeyStates>>,
}

impl InputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&self, name: &str) -> bool {
        self.keys.lock().key_event(name, true)
    }

    pub fn key_up(&self, name: &str) -> bool {
        self.keys.lock().key_event(name, false)
    }

    pub fn snapshot(&self) -> KeyStates {
        *self.keys.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_arrows_share_the_combined_layout() {
        let mut keys = KeyStates::default();
        keys.key_event("ArrowUp", true);
        keys.key_event("a", true);
        let c = keys.controls(Layout::Combined);
        assert!(c.accelerate && c.left);
        assert!(!c.reverse && !c.right && !c.reset && !c.exit);
    }

    #[test]
    fn split_layout_separates_the_cars() {
        let mut keys = KeyStates::default();
        keys.key_event("w", true);
        keys.key_event("Enter", true);

        let p1 = keys.controls(Layout::Split(Player::P1));
        let p2 = keys.controls(Layout::Split(Player::P2));
        assert!(p1.accelerate && !p1.reset);
        assert!(!p2.accelerate && p2.reset);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let capture = InputCapture::new();
        assert!(!capture.key_down("q"));
        assert!(capture.key_down("Escape"));
        assert!(capture.snapshot().controls(Layout::Combined).exit);
        capture.key_up("Escape");
        assert_eq!(capture.snapshot(), KeyStates::default());
    }

    #[test]
    fn key_map_uses_canonical_names() {
        let controls = Controls { accelerate: true, left: true, ..Default::default() };
        let map = controls.to_key_map();
        assert_eq!(map.get("w"), Some(&true));
        assert_eq!(map.get("a"), Some(&true));
        assert_eq!(map.get("s"), Some(&false));
        assert_eq!(map.len(), 6);
        assert_eq!(Controls::from_key_map(&map), controls);
    }

    #[test]
    fn key_map_decode_accepts_any_alias() {
        let map: BTreeMap<String, bool> = [
            ("ArrowDown".to_string(), true),
            ("s".to_string(), false),
            ("x".to_string(), true),
        ]
        .into_iter()
        .collect();
        let c = Controls::from_key_map(&map);
        assert!(c.reverse);
        assert_eq!(Controls { reverse: false, ..c }, Controls::default());
    }
}
