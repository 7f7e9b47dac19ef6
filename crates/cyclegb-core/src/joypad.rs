/// The eight DMG buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    /// Bit in the low nibble of P1.
    fn line(self) -> u8 {
        match self {
            Button::Right | Button::A => 0x01,
            Button::Left | Button::B => 0x02,
            Button::Up | Button::Select => 0x04,
            Button::Down | Button::Start => 0x08,
        }
    }

    /// P1 select bit that exposes this button's group.
    fn group(self) -> u8 {
        match self {
            Button::Right | Button::Left | Button::Up | Button::Down => 0x10,
            _ => 0x20,
        }
    }
}

/// P1 (0xFF00).
#[derive(Clone, Debug)]
pub struct Joypad {
    /// Bits 4-5 as last written. A 0 bit selects the group.
    select: u8,
    /// Pressed directions, active high.
    dpad: u8,
    /// Pressed action buttons, active high.
    buttons: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            dpad: 0,
            buttons: 0,
        }
    }

    pub fn read(&self) -> u8 {
        let mut pressed = 0;
        if self.select & 0x10 == 0 {
            pressed |= self.dpad;
        }
        if self.select & 0x20 == 0 {
            pressed |= self.buttons;
        }
        0xC0 | self.select | (!pressed & 0x0F)
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.group_state(button) & button.line() != 0
    }

    fn group_state(&self, button: Button) -> u8 {
        if button.group() == 0x10 {
            self.dpad
        } else {
            self.buttons
        }
    }

    /// Latch a button state. Returns true when a selected button goes from
    /// released to pressed, which requests the joypad interrupt.
    pub fn update(&mut self, button: Button, pressed: bool) -> bool {
        let was_pressed = self.is_pressed(button);
        let state = if button.group() == 0x10 {
            &mut self.dpad
        } else {
            &mut self.buttons
        };
        if pressed {
            *state |= button.line();
        } else {
            *state &= !button.line();
        }
        pressed && !was_pressed && self.select & button.group() == 0
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}
