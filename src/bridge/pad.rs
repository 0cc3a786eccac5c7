use bitflags::bitflags;

bitflags! {
    /// Buttons held in a pad sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PadButtons: u32 {
        const SELECT = 0x0001;
        const START = 0x0008;
        const UP = 0x0010;
        const RIGHT = 0x0020;
        const DOWN = 0x0040;
        const LEFT = 0x0080;
        const LTRIGGER = 0x0100;
        const RTRIGGER = 0x0200;
        const TRIANGLE = 0x1000;
        const CIRCLE = 0x2000;
        const CROSS = 0x4000;
        const SQUARE = 0x8000;
    }
}

pub const AXIS_CENTER: u8 = 128;
const AXIS_LOW: u8 = 80;
const AXIS_HIGH: u8 = 160;

/// Android key codes the image asks about.
pub mod keycode {
    pub const DPAD_UP: i32 = 19;
    pub const DPAD_DOWN: i32 = 20;
    pub const DPAD_LEFT: i32 = 21;
    pub const DPAD_RIGHT: i32 = 22;
    pub const BUTTON_A: i32 = 96;
    pub const BUTTON_B: i32 = 97;
    pub const BUTTON_X: i32 = 99;
    pub const BUTTON_Y: i32 = 100;
    pub const BUTTON_L1: i32 = 102;
    pub const BUTTON_R1: i32 = 103;
}

/// One reading of the pad: buttons plus both analog sticks, each axis in
/// `0..=255` with the rest position at [`AXIS_CENTER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadSample {
    pub buttons: PadButtons,
    pub lx: u8,
    pub ly: u8,
    pub rx: u8,
    pub ry: u8,
}

impl Default for PadSample {
    fn default() -> Self {
        Self {
            buttons: PadButtons::empty(),
            lx: AXIS_CENTER,
            ly: AXIS_CENTER,
            rx: AXIS_CENTER,
            ry: AXIS_CENTER,
        }
    }
}

impl PadSample {
    /// Whether the Android key `code` counts as held. The directional keys
    /// also fire when the left stick is pushed past the dead zone.
    pub fn is_pressed(&self, code: i32) -> bool {
        let held = |button| self.buttons.contains(button);
        match code {
            keycode::DPAD_UP => held(PadButtons::UP) || self.ly < AXIS_LOW,
            keycode::DPAD_DOWN => held(PadButtons::DOWN) || self.ly > AXIS_HIGH,
            keycode::DPAD_LEFT => held(PadButtons::LEFT) || self.lx < AXIS_LOW,
            keycode::DPAD_RIGHT => held(PadButtons::RIGHT) || self.lx > AXIS_HIGH,
            keycode::BUTTON_A => held(PadButtons::CROSS),
            keycode::BUTTON_B => held(PadButtons::CIRCLE),
            keycode::BUTTON_X => held(PadButtons::SQUARE),
            keycode::BUTTON_Y => held(PadButtons::TRIANGLE),
            keycode::BUTTON_L1 => held(PadButtons::LTRIGGER),
            keycode::BUTTON_R1 => held(PadButtons::RTRIGGER),
            _ => false,
        }
    }
}
