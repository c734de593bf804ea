//! # ADB GLU shim
//!
//! Input events arrive from the host as ADB key codes and mouse/paddle
//! deltas; this module keeps enough GLU-visible state to satisfy the C0xx
//! registers the firmware and most software touch: the C000/C010 key
//! strobe, the C025 modifier byte, C024 mouse data, C026/C027
//! command/status, the C061-C063 switch inputs and the C064-C067 paddle
//! timers with their C070 trigger.  Host-side key translation tables stay
//! on the host.

use log::debug;

use super::irq;

pub const ADB_KEY_CODE_LIMIT: usize = 0x80;
const KEY_BUFFER_LIMIT: usize = 8;

//  modifier key codes (ADB address 2 device codes)
const KEY_LSHIFT: u8 = 0x38;
const KEY_RSHIFT: u8 = 0x7b;
const KEY_LCTRL: u8 = 0x36;
const KEY_RCTRL: u8 = 0x7d;
const KEY_OPTION: u8 = 0x3a;
const KEY_ROPTION: u8 = 0x7c;
const KEY_COMMAND: u8 = 0x37;
const KEY_CAPSLOCK: u8 = 0x39;
const KEY_RESET: u8 = 0x7f;

/// paddle timer full-scale time: 255 * 11 µs
const PADDLE_TIME_MAX_US: u32 = 2805;

/// Tagged host input event; key codes are ADB codes 0x00-0x7F
#[derive(Clone,Copy,Debug)]
pub enum InputEvent {
    KeyDown(u8),
    KeyUp(u8),
    MouseMove { dx: i16,dy: i16 },
    MouseButton(bool),
    Paddle { ax: u8,ay: u8,button_mask: u8 }
}

pub struct Adb {
    key_buffer: Vec<u8>,
    key_states: [bool;ADB_KEY_CODE_LIMIT],
    last_a2_key_down: u8,
    key_strobe: bool,
    any_key_down: bool,
    mod_latch: u8,
    mouse_dx: i16,
    mouse_dy: i16,
    mouse_btn: bool,
    pub paddle: [u8;4],
    paddle_timer_us: [u32;4],
    btn_mask: u8,
    cmd_reg: u8,
    cmd_status: u8,
    pub irq_line: u32
}

impl Adb {
    pub fn new() -> Self {
        Self {
            key_buffer: Vec::with_capacity(KEY_BUFFER_LIMIT),
            key_states: [false;ADB_KEY_CODE_LIMIT],
            last_a2_key_down: 0,
            key_strobe: false,
            any_key_down: false,
            mod_latch: 0,
            mouse_dx: 0,
            mouse_dy: 0,
            mouse_btn: false,
            paddle: [0x80;4],
            paddle_timer_us: [0;4],
            btn_mask: 0,
            cmd_reg: 0,
            cmd_status: 0,
            irq_line: 0
        }
    }
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn is_modifier(key: u8) -> bool {
        matches!(key,KEY_LSHIFT | KEY_RSHIFT | KEY_LCTRL | KEY_RCTRL
            | KEY_OPTION | KEY_ROPTION | KEY_COMMAND | KEY_CAPSLOCK)
    }

    fn refresh_mod_latch(&mut self) {
        let mut latch = 0u8;
        if self.key_states[KEY_COMMAND as usize] { latch |= 0x01; }
        if self.key_states[KEY_OPTION as usize] || self.key_states[KEY_ROPTION as usize] {
            latch |= 0x02;
        }
        if self.key_states[KEY_LSHIFT as usize] || self.key_states[KEY_RSHIFT as usize] {
            latch |= 0x40;
        }
        if self.key_states[KEY_LCTRL as usize] || self.key_states[KEY_RCTRL as usize] {
            latch |= 0x80;
        }
        if self.key_states[KEY_CAPSLOCK as usize] { latch |= 0x04; }
        self.mod_latch = latch;
    }

    /// Queue one host event; called between machine steps.
    pub fn input(&mut self,event: InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                let key = key & 0x7f;
                if key == KEY_RESET {
                    return;
                }
                self.key_states[key as usize] = true;
                if !Self::is_modifier(key) {
                    self.any_key_down = true;
                    self.last_a2_key_down = key;
                    self.key_strobe = true;
                    if self.key_buffer.len() < KEY_BUFFER_LIMIT {
                        self.key_buffer.push(key);
                    }
                }
                self.refresh_mod_latch();
            },
            InputEvent::KeyUp(key) => {
                let key = key & 0x7f;
                self.key_states[key as usize] = false;
                if !Self::is_modifier(key) {
                    self.any_key_down = self.key_states.iter().any(|s| *s);
                }
                self.refresh_mod_latch();
            },
            InputEvent::MouseMove { dx,dy } => {
                self.mouse_dx = self.mouse_dx.saturating_add(dx);
                self.mouse_dy = self.mouse_dy.saturating_add(dy);
            },
            InputEvent::MouseButton(state) => {
                self.mouse_btn = state;
            },
            InputEvent::Paddle { ax,ay,button_mask } => {
                self.paddle[0] = ax;
                self.paddle[1] = ay;
                self.btn_mask = button_mask;
            }
        }
    }

    /// 60 Hz poll; drains the paddle timers
    pub fn glu_sync(&mut self,delta_us: u32,irq_line: u32) -> u32 {
        for timer in self.paddle_timer_us.iter_mut() {
            *timer = timer.saturating_sub(delta_us);
        }
        irq_line | self.irq_line
    }

    /// C000 and its mirrors: last key with the strobe in bit 7
    pub fn keyb_read(&self) -> u8 {
        self.last_a2_key_down | if self.key_strobe { 0x80 } else { 0 }
    }
    /// C010 read or write: clear strobe; reads report any-key-down in bit 7
    pub fn clear_key_strobe(&mut self) -> u8 {
        self.key_strobe = false;
        (self.last_a2_key_down & 0x7f) | if self.any_key_down { 0x80 } else { 0 }
    }
    /// C024: mouse delta register, X and Y on alternating reads
    pub fn mouse_data(&mut self) -> u8 {
        let delta = if self.mouse_dx != 0 {
            let d = self.mouse_dx.clamp(-63,63);
            self.mouse_dx -= d;
            d
        } else {
            let d = self.mouse_dy.clamp(-63,63);
            self.mouse_dy -= d;
            d
        };
        (delta as u8 & 0x7f) | if self.mouse_btn { 0x80 } else { 0 }
    }
    /// C025 modifier latch
    pub fn modkeys(&self) -> u8 {
        self.mod_latch
    }
    /// C026 command/data register
    pub fn cmd_data_read(&mut self) -> u8 {
        let value = self.cmd_reg;
        self.cmd_reg = 0;
        value
    }
    pub fn cmd_data_write(&mut self,value: u8) {
        debug!("adb: command byte {:02X}",value);
        self.cmd_reg = value;
    }
    /// C027 status register: bit 3 = key data full
    pub fn status(&self) -> u8 {
        self.cmd_status | if self.key_strobe { 0x08 } else { 0 }
    }
    /// C061-C063: command/option keys double as switch 0/1
    pub fn switch(&self,index: u8) -> u8 {
        let down = match index {
            0 => self.btn_mask & 0x1 != 0 || self.mod_latch & 0x01 != 0,
            1 => self.btn_mask & 0x2 != 0 || self.mod_latch & 0x02 != 0,
            _ => self.mouse_btn
        };
        if down { 0x80 } else { 0x00 }
    }
    /// C064-C067: paddle timer state, bit 7 high while still counting
    pub fn paddle_axis(&self,index: u8) -> u8 {
        if self.paddle_timer_us[index as usize & 3] > 0 { 0x80 } else { 0x00 }
    }
    /// C070: retrigger all four paddle timers
    pub fn paddle_trigger(&mut self) {
        for (idx,timer) in self.paddle_timer_us.iter_mut().enumerate() {
            *timer = (self.paddle[idx] as u32 * PADDLE_TIME_MAX_US) / 255;
        }
    }
    pub fn clear_irq(&mut self,mask: u32) {
        self.irq_line &= !(mask & irq::ADB_MASK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_strobe_cycle() {
        let mut adb = Adb::new();
        adb.input(InputEvent::KeyDown(0x26));  // 'J' key position
        assert_eq!(adb.keyb_read() & 0x80,0x80);
        // reading C010 clears the strobe but reports the key still down
        let c010 = adb.clear_key_strobe();
        assert_eq!(c010 & 0x80,0x80);
        assert_eq!(adb.keyb_read() & 0x80,0x00);
        adb.input(InputEvent::KeyUp(0x26));
        assert_eq!(adb.clear_key_strobe() & 0x80,0x00);
    }

    #[test]
    fn modifier_latch_tracks_shift() {
        let mut adb = Adb::new();
        adb.input(InputEvent::KeyDown(0x38));
        assert_eq!(adb.modkeys() & 0x40,0x40);
        // modifiers do not strobe
        assert_eq!(adb.keyb_read() & 0x80,0x00);
        adb.input(InputEvent::KeyUp(0x38));
        assert_eq!(adb.modkeys() & 0x40,0x00);
    }

    #[test]
    fn paddle_timers_expire() {
        let mut adb = Adb::new();
        adb.input(InputEvent::Paddle { ax: 255,ay: 0,button_mask: 0 });
        adb.paddle_trigger();
        assert_eq!(adb.paddle_axis(0),0x80);
        assert_eq!(adb.paddle_axis(1),0x00);
        adb.glu_sync(PADDLE_TIME_MAX_US,0);
        assert_eq!(adb.paddle_axis(0),0x00);
    }
}
