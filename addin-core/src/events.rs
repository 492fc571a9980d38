//! Host events and per-add-in subscription tables

use std::ffi::{CString, c_void};

use addin_api::EventKind;
use addin_api::ffi::{HandlerFn, LogEventArgs, RgbEncodeArgs};
use serde::{Deserialize, Serialize};

/// An event raised by the host, carrying its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddinEvent {
    Vblank,
    Log { text: String, attributes: u32 },
    Input,
    AsyncInput,
    RgbEncode { r: u8, g: u8, b: u8 },
    Infrared { on: bool },
    Rumble { amplitude: f64 },
    UpdateInputHint,
    BootRomLoad { rom_type: u32 },
    SerialBitStart { bit: bool },
    SerialBitEnd,
    JoypWrite { value: u8 },
    IcdPixel { row: u8 },
    IcdHreset,
    IcdVreset,
    Step,
    Fullscreen { is_fullscreen: bool },
    Menu { open: bool },
    Pause { paused: bool },
    RomRunState { running: bool },
}

impl AddinEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Vblank => EventKind::Vblank,
            Self::Log { .. } => EventKind::Log,
            Self::Input => EventKind::Input,
            Self::AsyncInput => EventKind::AsyncInput,
            Self::RgbEncode { .. } => EventKind::RgbEncode,
            Self::Infrared { .. } => EventKind::Infrared,
            Self::Rumble { .. } => EventKind::Rumble,
            Self::UpdateInputHint => EventKind::UpdateInputHint,
            Self::BootRomLoad { .. } => EventKind::BootRomLoad,
            Self::SerialBitStart { .. } => EventKind::SerialBitStart,
            Self::SerialBitEnd => EventKind::SerialBitEnd,
            Self::JoypWrite { .. } => EventKind::JoypWrite,
            Self::IcdPixel { .. } => EventKind::IcdPixel,
            Self::IcdHreset => EventKind::IcdHreset,
            Self::IcdVreset => EventKind::IcdVreset,
            Self::Step => EventKind::Step,
            Self::Fullscreen { .. } => EventKind::Fullscreen,
            Self::Menu { .. } => EventKind::Menu,
            Self::Pause { .. } => EventKind::Pause,
            Self::RomRunState { .. } => EventKind::RomRunState,
        }
    }

    /// Build an event of `kind` from a textual value, as typed on a command
    /// line (`fullscreen=true`, `rumble=0.5`, `log=hello`).
    pub fn parse(kind: EventKind, value: Option<&str>) -> Result<Self, String> {
        fn flag(value: Option<&str>) -> Result<bool, String> {
            match value.map(str::trim) {
                None => Ok(true),
                Some("1") | Some("true") | Some("on") => Ok(true),
                Some("0") | Some("false") | Some("off") => Ok(false),
                Some(other) => Err(format!("expected a boolean, got '{other}'")),
            }
        }
        fn number<T: std::str::FromStr>(value: Option<&str>) -> Result<T, String> {
            let value = value.ok_or_else(|| "missing value".to_string())?;
            value
                .trim()
                .parse()
                .map_err(|_| format!("invalid number '{value}'"))
        }

        Ok(match kind {
            EventKind::Vblank => Self::Vblank,
            EventKind::Log => Self::Log {
                text: value.unwrap_or_default().to_string(),
                attributes: 0,
            },
            EventKind::Input => Self::Input,
            EventKind::AsyncInput => Self::AsyncInput,
            EventKind::RgbEncode => {
                let value = value.ok_or_else(|| "expected r,g,b".to_string())?;
                let parts: Vec<&str> = value.split(',').collect();
                let [r, g, b] = parts.as_slice() else {
                    return Err(format!("expected r,g,b, got '{value}'"));
                };
                Self::RgbEncode {
                    r: number(Some(*r))?,
                    g: number(Some(*g))?,
                    b: number(Some(*b))?,
                }
            }
            EventKind::Infrared => Self::Infrared { on: flag(value)? },
            EventKind::Rumble => Self::Rumble {
                amplitude: number(value)?,
            },
            EventKind::UpdateInputHint => Self::UpdateInputHint,
            EventKind::BootRomLoad => Self::BootRomLoad {
                rom_type: number(value)?,
            },
            EventKind::SerialBitStart => Self::SerialBitStart { bit: flag(value)? },
            EventKind::SerialBitEnd => Self::SerialBitEnd,
            EventKind::JoypWrite => Self::JoypWrite {
                value: number(value)?,
            },
            EventKind::IcdPixel => Self::IcdPixel {
                row: number(value)?,
            },
            EventKind::IcdHreset => Self::IcdHreset,
            EventKind::IcdVreset => Self::IcdVreset,
            EventKind::Step => Self::Step,
            EventKind::Fullscreen => Self::Fullscreen {
                is_fullscreen: flag(value)?,
            },
            EventKind::Menu => Self::Menu { open: flag(value)? },
            EventKind::Pause => Self::Pause {
                paused: flag(value)?,
            },
            EventKind::RomRunState => Self::RomRunState {
                running: flag(value)?,
            },
        })
    }

    /// Call `handler` with this event's payload laid out as the C ABI
    /// expects for its kind.
    ///
    /// # Safety
    ///
    /// `handler` must be a live event handler compiled for this event kind.
    pub unsafe fn invoke(&self, handler: HandlerFn) -> i32 {
        fn by_ref<T>(value: &T) -> *const c_void {
            (value as *const T).cast()
        }

        unsafe {
            match self {
                Self::Vblank
                | Self::Input
                | Self::AsyncInput
                | Self::UpdateInputHint
                | Self::SerialBitEnd
                | Self::IcdHreset
                | Self::IcdVreset
                | Self::Step => handler(std::ptr::null()),
                Self::Log { text, attributes } => {
                    let text = CString::new(text.replace('\0', " ")).unwrap_or_default();
                    let args = LogEventArgs {
                        text: text.as_ptr(),
                        attributes: *attributes,
                    };
                    handler(by_ref(&args))
                }
                Self::RgbEncode { r, g, b } => handler(by_ref(&RgbEncodeArgs {
                    r: *r,
                    g: *g,
                    b: *b,
                })),
                Self::Infrared { on: value }
                | Self::SerialBitStart { bit: value }
                | Self::Fullscreen {
                    is_fullscreen: value,
                }
                | Self::Menu { open: value }
                | Self::Pause { paused: value }
                | Self::RomRunState { running: value } => handler(by_ref(value)),
                Self::Rumble { amplitude } => handler(by_ref(amplitude)),
                Self::BootRomLoad { rom_type } => handler(by_ref(rom_type)),
                Self::JoypWrite { value } | Self::IcdPixel { row: value } => handler(by_ref(value)),
            }
        }
    }
}

/// A handler resolved from an add-in library
#[derive(Debug, Clone)]
pub struct HandlerRef {
    pub symbol: String,
    pub func: HandlerFn,
}

/// One optional handler per [`EventKind`]
#[derive(Debug, Clone, Default)]
pub struct EventSubscriptionTable {
    slots: [Option<HandlerRef>; EventKind::COUNT],
}

impl EventSubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` for `kind`, returning what it replaced
    pub fn set(&mut self, kind: EventKind, handler: HandlerRef) -> Option<HandlerRef> {
        self.slots[kind.index()].replace(handler)
    }

    pub fn clear(&mut self, kind: EventKind) -> Option<HandlerRef> {
        self.slots[kind.index()].take()
    }

    pub fn clear_all(&mut self) {
        self.slots = Default::default();
    }

    pub fn get(&self, kind: EventKind) -> Option<&HandlerRef> {
        self.slots[kind.index()].as_ref()
    }

    /// Kinds with a handler, in slot order
    pub fn subscribed(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.slots[kind.index()].is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
