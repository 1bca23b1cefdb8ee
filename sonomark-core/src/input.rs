//! Pointer and keyboard input as the engine sees it, already converted to
//! canvas-relative pixels by the front end.

use crate::config::Modifier;
use crate::types::Pixel;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, ctrl: false, alt: false, meta: false };

    pub fn shift() -> Self {
        Modifiers { shift: true, ..Self::NONE }
    }

    pub fn ctrl() -> Self {
        Modifiers { ctrl: true, ..Self::NONE }
    }

    pub fn alt() -> Self {
        Modifiers { alt: true, ..Self::NONE }
    }

    /// Whether `binding` is satisfied. [`Modifier::None`] is satisfied by
    /// anything, so callers test specific bindings first.
    pub fn held(&self, binding: Modifier) -> bool {
        match binding {
            Modifier::None => true,
            Modifier::Shift => self.shift,
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Meta => self.meta,
        }
    }

    /// Like [`held`](Self::held) but [`Modifier::None`] never matches.
    pub fn held_specific(&self, binding: Modifier) -> bool {
        binding != Modifier::None && self.held(binding)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerInput {
    Down { pixel: Pixel, modifiers: Modifiers },
    Move { pixel: Pixel, modifiers: Modifiers },
    Up { pixel: Pixel, modifiers: Modifiers },
    DoubleClick { pixel: Pixel, modifiers: Modifiers },
    /// Positive `delta_y` scrolls down (zoom out).
    Wheel { pixel: Pixel, delta_y: f64, modifiers: Modifiers },
    Leave,
}

impl PointerInput {
    pub fn pixel(&self) -> Option<Pixel> {
        match *self {
            PointerInput::Down { pixel, .. }
            | PointerInput::Move { pixel, .. }
            | PointerInput::Up { pixel, .. }
            | PointerInput::DoubleClick { pixel, .. }
            | PointerInput::Wheel { pixel, .. } => Some(pixel),
            PointerInput::Leave => None,
        }
    }
}

/// Keys the engine reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Backspace,
    Delete,
    Next,
    Previous,
}
