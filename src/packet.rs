//! Protocol-neutral camera control packets.
//!
//! A camera control packet represents a single message to a camera receiver
//! driver. Each command group (pan, tilt, preset, menu, ...) holds at most
//! one command at a time.

use crate::clock::Timestamp;

/// Highest protocol-independent pan/tilt speed.
pub const SPEED_MAX: i32 = (1 << 11) - 1;

/// Receiver addresses fit in 1 to 1024.
pub const RECEIVER_MAX: i32 = 1024;

/// Special preset numbers for on-screen menu functions.
const MENU_OPEN_PRESET: i32 = 77;
const MENU_ENTER_PRESET: i32 = 78;
const MENU_CANCEL_PRESET: i32 = 79;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PanMode {
    Left,
    Right,
    Auto,
    Manual,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TiltMode {
    Up,
    Down,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PresetMode {
    Recall,
    Store,
    Clear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Open,
    Enter,
    Cancel,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CameraCommand {
    On,
    Off,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ZoomMode {
    In,
    Out,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FocusMode {
    Near,
    Far,
    Auto,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IrisMode {
    Close,
    Open,
    Auto,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LensCommand {
    Speed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WiperCommand {
    On,
    Off,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AckCommand {
    Alarm,
}

#[derive(Debug, Clone)]
pub struct CcPacket {
    receiver: i32,
    pan: Option<PanMode>,
    pan_speed: i32,
    tilt: Option<TiltMode>,
    tilt_speed: i32,
    preset: Option<PresetMode>,
    preset_num: i32,
    menu: Option<MenuCommand>,
    camera: Option<CameraCommand>,
    zoom: Option<ZoomMode>,
    focus: Option<FocusMode>,
    iris: Option<IrisMode>,
    lens: Option<LensCommand>,
    wiper: Option<WiperCommand>,
    ack: Option<AckCommand>,
    expire: Timestamp,
}

fn clamp_speed(speed: i32) -> i32 {
    if speed < 0 {
        0
    } else if speed > SPEED_MAX {
        SPEED_MAX
    } else {
        speed
    }
}

impl CcPacket {
    pub fn new() -> CcPacket {
        CcPacket {
            receiver: 0,
            pan: None,
            pan_speed: 0,
            tilt: None,
            tilt_speed: 0,
            preset: None,
            preset_num: 0,
            menu: None,
            camera: None,
            zoom: None,
            focus: None,
            iris: None,
            lens: None,
            wiper: None,
            ack: None,
            expire: Timestamp::now(),
        }
    }

    /// Reset every command field. Expiration is left alone.
    pub fn clear(&mut self) {
        self.receiver = 0;
        self.pan = None;
        self.pan_speed = 0;
        self.tilt = None;
        self.tilt_speed = 0;
        self.preset = None;
        self.preset_num = 0;
        self.menu = None;
        self.camera = None;
        self.zoom = None;
        self.focus = None;
        self.iris = None;
        self.lens = None;
        self.wiper = None;
        self.ack = None;
    }

    pub fn set_receiver(&mut self, receiver: i32) {
        self.receiver = receiver;
    }

    pub fn receiver(&self) -> i32 {
        self.receiver
    }

    pub fn set_pan(&mut self, pm: Option<PanMode>, speed: i32) {
        self.pan = pm;
        self.set_pan_speed(speed);
    }

    pub fn pan_mode(&self) -> Option<PanMode> {
        self.pan
    }

    pub fn set_pan_speed(&mut self, speed: i32) {
        self.pan_speed = clamp_speed(speed);
    }

    pub fn pan_speed(&self) -> i32 {
        self.pan_speed
    }

    /// Pan motion is present only for left/right with a nonzero speed.
    pub fn has_pan(&self) -> bool {
        match self.pan {
            Some(PanMode::Left) | Some(PanMode::Right) => self.pan_speed > 0,
            _ => false,
        }
    }

    pub fn set_tilt(&mut self, tm: Option<TiltMode>, speed: i32) {
        self.tilt = tm;
        self.set_tilt_speed(speed);
    }

    pub fn tilt_mode(&self) -> Option<TiltMode> {
        self.tilt
    }

    pub fn set_tilt_speed(&mut self, speed: i32) {
        self.tilt_speed = clamp_speed(speed);
    }

    pub fn tilt_speed(&self) -> i32 {
        self.tilt_speed
    }

    pub fn has_tilt(&self) -> bool {
        self.tilt.is_some() && self.tilt_speed > 0
    }

    /// Stamp the expiration time `timeout` milliseconds out.
    pub fn set_timeout(&mut self, timeout: u64) {
        self.expire = Timestamp::now().advanced(timeout);
    }

    /// Check whether the command is held longer than `timeout` milliseconds
    /// past now, meaning a refresh should be scheduled.
    pub fn is_expired(&self, timeout: u64) -> bool {
        self.expire.millis_until() > timeout
    }

    /// Set the preset mode and number. The predefined store presets 77, 78
    /// and 79 are replaced with menu open/enter/cancel commands.
    pub fn set_preset(&mut self, pm: Option<PresetMode>, p_num: i32) {
        let p = if p_num <= 0 { None } else { pm };
        if p == Some(PresetMode::Store) && self.menu_preset(p_num) {
            self.preset = None;
            self.preset_num = 0;
        } else {
            self.preset = p;
            self.preset_num = p_num;
        }
    }

    fn menu_preset(&mut self, p_num: i32) -> bool {
        match p_num {
            MENU_OPEN_PRESET => self.set_menu(Some(MenuCommand::Open)),
            MENU_ENTER_PRESET => self.set_menu(Some(MenuCommand::Enter)),
            MENU_CANCEL_PRESET => self.set_menu(Some(MenuCommand::Cancel)),
            _ => return false,
        }
        true
    }

    pub fn preset_mode(&self) -> Option<PresetMode> {
        self.preset
    }

    pub fn preset_number(&self) -> i32 {
        self.preset_num
    }

    pub fn set_menu(&mut self, mc: Option<MenuCommand>) {
        self.menu = mc;
    }

    pub fn menu(&self) -> Option<MenuCommand> {
        self.menu
    }

    pub fn set_camera(&mut self, cc: Option<CameraCommand>) {
        self.camera = cc;
    }

    pub fn camera(&self) -> Option<CameraCommand> {
        self.camera
    }

    pub fn set_zoom(&mut self, zm: Option<ZoomMode>) {
        self.zoom = zm;
    }

    pub fn zoom(&self) -> Option<ZoomMode> {
        self.zoom
    }

    pub fn set_focus(&mut self, fm: Option<FocusMode>) {
        self.focus = fm;
    }

    pub fn focus(&self) -> Option<FocusMode> {
        self.focus
    }

    pub fn set_iris(&mut self, im: Option<IrisMode>) {
        self.iris = im;
    }

    pub fn iris(&self) -> Option<IrisMode> {
        self.iris
    }

    pub fn set_lens(&mut self, lm: Option<LensCommand>) {
        self.lens = lm;
    }

    pub fn lens(&self) -> Option<LensCommand> {
        self.lens
    }

    pub fn set_wiper(&mut self, wm: Option<WiperCommand>) {
        self.wiper = wm;
    }

    pub fn wiper(&self) -> Option<WiperCommand> {
        self.wiper
    }

    pub fn set_ack(&mut self, am: Option<AckCommand>) {
        self.ack = am;
    }

    pub fn ack(&self) -> Option<AckCommand> {
        self.ack
    }

    /// A stop command: no motion and no discrete function at all.
    pub fn is_stop(&self) -> bool {
        self.pan_speed == 0
            && self.tilt_speed == 0
            && !self.has_autopan()
            && self.preset.is_none()
            && self.menu.is_none()
            && self.ack.is_none()
            && self.camera.is_none()
            && self.zoom.is_none()
            && self.focus.is_none()
            && self.iris.is_none()
            && self.wiper.is_none()
    }

    /// A command to encode in a protocol's base motion frame.
    pub fn has_command(&self) -> bool {
        self.pan.is_some()
            || self.tilt.is_some()
            || self.zoom.is_some()
            || self.focus.is_some()
            || self.iris.is_some()
    }

    pub fn has_autopan(&self) -> bool {
        matches!(self.pan, Some(PanMode::Auto) | Some(PanMode::Manual))
    }

    pub fn has_power(&self) -> bool {
        self.camera.is_some()
    }

    /// One-line command summary for packet logging.
    pub fn describe(&self) -> String {
        let mut s = String::new();
        self.describe_pan(&mut s);
        self.describe_tilt(&mut s);
        self.describe_lens(&mut s);
        if self.camera.is_some() {
            s.push_str(" camera");
        }
        if self.wiper.is_some() {
            s.push_str(" wiper");
        }
        if self.preset_num != 0 {
            self.describe_preset(&mut s);
        }
        self.describe_special(&mut s);
        s
    }

    fn describe_pan(&self, s: &mut String) {
        if self.pan_speed == 0 {
            s.push_str(" pan: 0");
        } else if self.pan == Some(PanMode::Left) {
            s.push_str(&format!(" pan left: {}", self.pan_speed));
        } else if self.pan == Some(PanMode::Right) {
            s.push_str(&format!(" pan right: {}", self.pan_speed));
        }
    }

    fn describe_tilt(&self, s: &mut String) {
        if self.tilt_speed == 0 {
            s.push_str(" tilt: 0");
        } else if self.tilt == Some(TiltMode::Up) {
            s.push_str(&format!(" tilt up: {}", self.tilt_speed));
        } else if self.tilt == Some(TiltMode::Down) {
            s.push_str(&format!(" tilt down: {}", self.tilt_speed));
        }
    }

    fn describe_lens(&self, s: &mut String) {
        match self.zoom {
            Some(ZoomMode::In) => s.push_str(" zoom IN"),
            Some(ZoomMode::Out) => s.push_str(" zoom OUT"),
            None => (),
        }
        match self.focus {
            Some(FocusMode::Near) => s.push_str(" focus NEAR"),
            Some(FocusMode::Far) => s.push_str(" focus FAR"),
            Some(FocusMode::Auto) => s.push_str(" focus AUTO"),
            None => (),
        }
        match self.iris {
            Some(IrisMode::Close) => s.push_str(" iris CLOSE"),
            Some(IrisMode::Open) => s.push_str(" iris OPEN"),
            Some(IrisMode::Auto) => s.push_str(" iris AUTO"),
            None => (),
        }
        if self.lens == Some(LensCommand::Speed) {
            s.push_str(" lens SPEED");
        }
    }

    fn describe_preset(&self, s: &mut String) {
        match self.preset {
            Some(PresetMode::Recall) => s.push_str(" recall"),
            Some(PresetMode::Store) => s.push_str(" store"),
            Some(PresetMode::Clear) => s.push_str(" clear"),
            None => (),
        }
        s.push_str(&format!(" preset: {}", self.preset_num));
    }

    fn describe_special(&self, s: &mut String) {
        if self.pan == Some(PanMode::Auto) {
            s.push_str(" auto-pan");
        }
        if self.pan == Some(PanMode::Manual) {
            s.push_str(" manual-pan");
        }
        match self.menu {
            Some(MenuCommand::Open) => s.push_str(" menu-open"),
            Some(MenuCommand::Enter) => s.push_str(" menu-enter"),
            Some(MenuCommand::Cancel) => s.push_str(" menu-cancel"),
            None => (),
        }
        if self.ack.is_some() {
            s.push_str(" ack-alarm");
        }
    }
}

impl Default for CcPacket {
    fn default() -> CcPacket {
        CcPacket::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speeds_are_clamped() {
        let mut pkt = CcPacket::new();
        pkt.set_pan(Some(PanMode::Right), 5000);
        assert_eq!(pkt.pan_speed(), SPEED_MAX);
        pkt.set_tilt(Some(TiltMode::Up), -3);
        assert_eq!(pkt.tilt_speed(), 0);
    }

    #[test]
    fn one_command_per_group() {
        let mut pkt = CcPacket::new();
        pkt.set_pan(Some(PanMode::Left), 100);
        pkt.set_pan(Some(PanMode::Right), 200);
        assert_eq!(pkt.pan_mode(), Some(PanMode::Right));
        assert_eq!(pkt.pan_speed(), 200);
        pkt.set_iris(Some(IrisMode::Open));
        pkt.set_iris(Some(IrisMode::Close));
        assert_eq!(pkt.iris(), Some(IrisMode::Close));
    }

    #[test]
    fn autopan_has_no_pan_motion() {
        let mut pkt = CcPacket::new();
        pkt.set_pan(Some(PanMode::Auto), 500);
        assert!(!pkt.has_pan());
        assert!(pkt.has_autopan());
        pkt.set_pan(Some(PanMode::Left), 500);
        assert!(pkt.has_pan());
        pkt.set_pan_speed(0);
        assert!(!pkt.has_pan());
    }

    #[test]
    fn menu_presets_replace_store() {
        for (num, menu) in [
            (77, MenuCommand::Open),
            (78, MenuCommand::Enter),
            (79, MenuCommand::Cancel),
        ]
        .iter()
        {
            let mut pkt = CcPacket::new();
            pkt.set_preset(Some(PresetMode::Store), *num);
            assert_eq!(pkt.preset_mode(), None);
            assert_eq!(pkt.preset_number(), 0);
            assert_eq!(pkt.menu(), Some(*menu));
        }
        // recall of the same numbers is a plain preset
        let mut pkt = CcPacket::new();
        pkt.set_preset(Some(PresetMode::Recall), 77);
        assert_eq!(pkt.preset_mode(), Some(PresetMode::Recall));
        assert_eq!(pkt.menu(), None);
    }

    #[test]
    fn preset_zero_clears() {
        let mut pkt = CcPacket::new();
        pkt.set_preset(Some(PresetMode::Recall), 4);
        assert_eq!(pkt.preset_mode(), Some(PresetMode::Recall));
        pkt.set_preset(None, 0);
        assert_eq!(pkt.preset_mode(), None);
        assert_eq!(pkt.preset_number(), 0);
    }

    #[test]
    fn stop_detection() {
        let mut pkt = CcPacket::new();
        assert!(pkt.is_stop());
        pkt.set_pan(Some(PanMode::Left), 0);
        assert!(pkt.is_stop());
        pkt.set_pan(Some(PanMode::Auto), 0);
        assert!(!pkt.is_stop());
        pkt.set_pan(None, 0);
        pkt.set_zoom(Some(ZoomMode::In));
        assert!(!pkt.is_stop());
        pkt.set_zoom(None);
        pkt.set_wiper(Some(WiperCommand::On));
        assert!(!pkt.is_stop());
    }

    #[test]
    fn command_detection() {
        let mut pkt = CcPacket::new();
        assert!(!pkt.has_command());
        pkt.set_focus(Some(FocusMode::Near));
        assert!(pkt.has_command());
        pkt.set_focus(None);
        pkt.set_wiper(Some(WiperCommand::On));
        assert!(!pkt.has_command());
    }
}
