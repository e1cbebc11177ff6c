//! Foreground-application probe.
//!
//! On Linux the active window comes from X11 (`_NET_ACTIVE_WINDOW`, then
//! the window's `WM_CLASS` instance, lowercased, as the app identifier).
//! A short trailing window papers over the gaps where the active-window
//! property is briefly unset during switches, so a single empty query
//! does not read as "no foreground app".

use chrono::{DateTime, Duration, Utc};
use focusguard_core::{ForegroundProbe, PermissionError};

#[cfg(target_os = "linux")]
pub use x11::X11Probe as HostProbe;

#[cfg(not(target_os = "linux"))]
pub use unsupported::UnsupportedProbe as HostProbe;

/// Remembers the last identified app for `trailing_window` so transient
/// query gaps reuse it.
struct TrailingMemory {
    window: Duration,
    last_seen: Option<(String, DateTime<Utc>)>,
}

impl TrailingMemory {
    fn new(trailing_window_secs: i64) -> Self {
        Self {
            window: Duration::seconds(trailing_window_secs),
            last_seen: None,
        }
    }

    fn observe(&mut self, now: DateTime<Utc>, sample: Option<String>) -> Option<String> {
        match sample {
            Some(app) => {
                self.last_seen = Some((app.clone(), now));
                Some(app)
            }
            None => self
                .last_seen
                .as_ref()
                .filter(|(_, at)| now - *at <= self.window)
                .map(|(app, _)| app.clone()),
        }
    }
}

#[cfg(target_os = "linux")]
mod x11 {
    use super::*;
    use x11rb::connection::Connection;
    use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, Window};

    pub struct X11Probe {
        conn: x11rb::rust_connection::RustConnection,
        root: Window,
        active_window_atom: u32,
        memory: TrailingMemory,
    }

    impl X11Probe {
        pub fn new(trailing_window_secs: i64) -> Result<Self, PermissionError> {
            let (conn, screen_num) =
                x11rb::connect(None).map_err(|_| PermissionError::ForegroundQueryMissing)?;
            let root = conn.setup().roots[screen_num].root;
            let active_window_atom = conn
                .intern_atom(false, b"_NET_ACTIVE_WINDOW")
                .ok()
                .and_then(|c| c.reply().ok())
                .map(|r| r.atom)
                .ok_or(PermissionError::ForegroundQueryMissing)?;
            Ok(Self {
                conn,
                root,
                active_window_atom,
                memory: TrailingMemory::new(trailing_window_secs),
            })
        }

        fn active_window_id(&self) -> Result<Option<Window>, PermissionError> {
            let cookie = self
                .conn
                .get_property(
                    false,
                    self.root,
                    self.active_window_atom,
                    AtomEnum::WINDOW,
                    0,
                    1,
                )
                .map_err(|_| PermissionError::ForegroundQueryMissing)?;
            // A reply error (e.g. the window vanished) is a miss, not a
            // lost capability.
            let Ok(reply) = cookie.reply() else {
                return Ok(None);
            };
            if reply.value.len() >= 4 {
                Ok(Some(u32::from_ne_bytes([
                    reply.value[0],
                    reply.value[1],
                    reply.value[2],
                    reply.value[3],
                ])))
            } else {
                Ok(None)
            }
        }

        fn wm_class_instance(&self, window: Window) -> Result<Option<String>, PermissionError> {
            let cookie = self
                .conn
                .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::ANY, 0, 1024)
                .map_err(|_| PermissionError::ForegroundQueryMissing)?;
            let Ok(reply) = cookie.reply() else {
                return Ok(None);
            };
            if reply.value.is_empty() {
                return Ok(None);
            }
            let raw = String::from_utf8_lossy(&reply.value).into_owned();
            Ok(raw
                .split('\0')
                .next()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase()))
        }

        fn query(&self) -> Result<Option<String>, PermissionError> {
            match self.active_window_id()? {
                Some(window) if window != 0 => self.wm_class_instance(window),
                _ => Ok(None),
            }
        }
    }

    impl ForegroundProbe for X11Probe {
        fn foreground_app(
            &mut self,
            now: DateTime<Utc>,
        ) -> Result<Option<String>, PermissionError> {
            let sample = self.query()?;
            Ok(self.memory.observe(now, sample))
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use super::*;

    /// No foreground query on this platform; enforcement degrades to Idle.
    pub struct UnsupportedProbe;

    impl UnsupportedProbe {
        pub fn new(_trailing_window_secs: i64) -> Result<Self, PermissionError> {
            Err(PermissionError::ForegroundQueryMissing)
        }
    }

    impl ForegroundProbe for UnsupportedProbe {
        fn foreground_app(
            &mut self,
            _now: DateTime<Utc>,
        ) -> Result<Option<String>, PermissionError> {
            Err(PermissionError::ForegroundQueryMissing)
        }
    }
}
