//! Add-in types and metadata structures

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity assigned to an add-in by the host at import time.
///
/// Ids are non-zero and unique among the add-ins currently imported into a
/// registry. Add-ins pass their own id back to the host on every API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddinId(u32);

impl AddinId {
    /// Wrap a raw id, rejecting the reserved value zero.
    pub fn new(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AddinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

bitflags! {
    /// Reason an add-in is being started, passed to its `start` entry point.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StartArgs: u32 {
        /// Started automatically because the manifest asked for it
        const AUTO = 1;
        /// Started by the user
        const MANUAL = 2;
        /// Restarted after a stop
        const RELOAD = 4;
    }
}

/// Build flavor of the host executable.
///
/// An add-in must target the same flavor as the host that loads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostFlavor {
    /// Regular windowed build
    #[default]
    Windowed,
    /// Console (debugger) build
    Console,
}

impl HostFlavor {
    /// Flavor reported by `_addin_init`: non-zero means console.
    pub fn from_init_flag(flag: i32) -> Self {
        if flag != 0 {
            Self::Console
        } else {
            Self::Windowed
        }
    }

    pub fn as_init_flag(self) -> i32 {
        match self {
            Self::Windowed => 0,
            Self::Console => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windowed => "windowed",
            Self::Console => "console",
        }
    }
}

impl fmt::Display for HostFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host events an add-in can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum EventKind {
    Vblank = 0,
    Log,
    Input,
    AsyncInput,
    RgbEncode,
    Infrared,
    Rumble,
    UpdateInputHint,
    BootRomLoad,
    SerialBitStart,
    SerialBitEnd,
    JoypWrite,
    IcdPixel,
    IcdHreset,
    IcdVreset,
    Step,
    Fullscreen,
    Menu,
    Pause,
    RomRunState,
}

impl EventKind {
    /// Number of event kinds
    pub const COUNT: usize = 20;

    /// All event kinds in slot order
    pub const ALL: [EventKind; Self::COUNT] = [
        Self::Vblank,
        Self::Log,
        Self::Input,
        Self::AsyncInput,
        Self::RgbEncode,
        Self::Infrared,
        Self::Rumble,
        Self::UpdateInputHint,
        Self::BootRomLoad,
        Self::SerialBitStart,
        Self::SerialBitEnd,
        Self::JoypWrite,
        Self::IcdPixel,
        Self::IcdHreset,
        Self::IcdVreset,
        Self::Step,
        Self::Fullscreen,
        Self::Menu,
        Self::Pause,
        Self::RomRunState,
    ];

    /// Slot index of this kind in a subscription table
    pub fn index(self) -> usize {
        self as usize
    }

    /// Decode the raw value used across the FFI boundary
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vblank => "vblank",
            Self::Log => "log",
            Self::Input => "input",
            Self::AsyncInput => "async_input",
            Self::RgbEncode => "rgb_encode",
            Self::Infrared => "infrared",
            Self::Rumble => "rumble",
            Self::UpdateInputHint => "update_input_hint",
            Self::BootRomLoad => "boot_rom_load",
            Self::SerialBitStart => "serial_bit_start",
            Self::SerialBitEnd => "serial_bit_end",
            Self::JoypWrite => "joyp_write",
            Self::IcdPixel => "icd_pixel",
            Self::IcdHreset => "icd_hreset",
            Self::IcdVreset => "icd_vreset",
            Self::Step => "step",
            Self::Fullscreen => "fullscreen",
            Self::Menu => "menu",
            Self::Pause => "pause",
            Self::RomRunState => "rom_run_state",
        }
    }

    /// Symbol the host resolves when an add-in subscribes through the host
    /// API, e.g. `_fullscreen_handler`.
    ///
    /// The [`addin_handler!`](crate::addin_handler) macro exports handlers
    /// under exactly these names.
    pub fn handler_symbol(self) -> String {
        format!("_{}_handler", self.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown event kind: {s}"))
    }
}

/// Descriptive metadata read from an add-in's sidecar manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddinManifest {
    /// Name shown in menus
    pub display_name: String,
    /// Add-in author
    pub author: String,
    /// Free-form version string
    pub version: String,
    /// Start the add-in as soon as it is imported
    pub auto_start: bool,
}
