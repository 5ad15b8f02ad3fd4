//! Shared text channel abstraction over the system clipboard.
//!
//! The core only needs three operations: read the current text, write text,
//! and a monotonically increasing change counter that bumps on every write,
//! external or internal. `SystemClipboard` shells out to the platform paste
//! tools; `MemoryChannel` backs tests.

use crate::errors::ChannelError;
use sha2::{Digest, Sha256};
use std::process::{Command, Stdio};
use std::sync::Mutex;

pub trait Channel: Send + Sync {
    fn read(&self) -> Result<String, ChannelError>;
    fn write(&self, text: &str) -> Result<(), ChannelError>;
    /// Monotonic counter that increments on every observed content change.
    fn change_count(&self) -> u64;
}

/// In-memory channel for tests and offline use.
#[derive(Default)]
pub struct MemoryChannel {
    state: Mutex<(String, u64)>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Channel for MemoryChannel {
    fn read(&self) -> Result<String, ChannelError> {
        Ok(self.state.lock().expect("channel lock").0.clone())
    }

    fn write(&self, text: &str) -> Result<(), ChannelError> {
        let mut state = self.state.lock().expect("channel lock");
        state.0 = text.to_string();
        state.1 += 1;
        Ok(())
    }

    fn change_count(&self) -> u64 {
        self.state.lock().expect("channel lock").1
    }
}

struct ClipState {
    counter: u64,
    content_hash: Option<[u8; 32]>,
    cached: String,
}

/// System clipboard backed by the platform's paste/copy command pair.
///
/// The OS gives us no change counter on Linux, so one is derived by hashing
/// the clipboard content on every poll and bumping an internal counter when
/// the hash moves.
pub struct SystemClipboard {
    paste_cmd: Vec<&'static str>,
    copy_cmd: Vec<&'static str>,
    state: Mutex<ClipState>,
}

impl SystemClipboard {
    /// Pick the paste/copy tool pair for the current platform.
    pub fn detect() -> Self {
        let (paste_cmd, copy_cmd): (Vec<&str>, Vec<&str>) = if cfg!(target_os = "macos") {
            (vec!["pbpaste"], vec!["pbcopy"])
        } else if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            (vec!["wl-paste", "--no-newline"], vec!["wl-copy"])
        } else {
            (
                vec!["xclip", "-selection", "clipboard", "-o"],
                vec!["xclip", "-selection", "clipboard"],
            )
        };
        Self {
            paste_cmd,
            copy_cmd,
            state: Mutex::new(ClipState {
                counter: 0,
                content_hash: None,
                cached: String::new(),
            }),
        }
    }

    fn run_paste(&self) -> Result<String, ChannelError> {
        let tool = self.paste_cmd[0];
        let output = Command::new(tool)
            .args(&self.paste_cmd[1..])
            .stderr(Stdio::null())
            .output()
            .map_err(|source| ChannelError::Tool {
                tool: tool.to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(ChannelError::ToolStatus {
                tool: tool.to_string(),
                status: output.status.code().unwrap_or(-1),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn hash(text: &str) -> [u8; 32] {
        Sha256::digest(text.as_bytes()).into()
    }
}

impl Channel for SystemClipboard {
    fn read(&self) -> Result<String, ChannelError> {
        Ok(self.state.lock().expect("clipboard lock").cached.clone())
    }

    fn write(&self, text: &str) -> Result<(), ChannelError> {
        use std::io::Write as _;

        let tool = self.copy_cmd[0];
        let mut child = Command::new(tool)
            .args(&self.copy_cmd[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ChannelError::Tool {
                tool: tool.to_string(),
                source,
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|source| ChannelError::Tool {
                    tool: tool.to_string(),
                    source,
                })?;
        }
        let status = child.wait().map_err(|source| ChannelError::Tool {
            tool: tool.to_string(),
            source,
        })?;
        if !status.success() {
            return Err(ChannelError::ToolStatus {
                tool: tool.to_string(),
                status: status.code().unwrap_or(-1),
            });
        }

        let mut state = self.state.lock().expect("clipboard lock");
        state.content_hash = Some(Self::hash(text));
        state.cached = text.to_string();
        state.counter += 1;
        Ok(())
    }

    fn change_count(&self) -> u64 {
        // Polling the counter is where the actual clipboard read happens;
        // read() then returns the cached text from the same observation.
        match self.run_paste() {
            Ok(text) => {
                let hash = Self::hash(&text);
                let mut state = self.state.lock().expect("clipboard lock");
                if state.content_hash != Some(hash) {
                    state.content_hash = Some(hash);
                    state.cached = text;
                    state.counter += 1;
                }
                state.counter
            }
            Err(err) => {
                tracing::debug!("clipboard poll failed: {err}");
                self.state.lock().expect("clipboard lock").counter
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_channel_counter_bumps_on_write() {
        let channel = MemoryChannel::new();
        assert_eq!(channel.change_count(), 0);
        channel.write("one").unwrap();
        assert_eq!(channel.change_count(), 1);
        assert_eq!(channel.read().unwrap(), "one");
        channel.write("two").unwrap();
        assert_eq!(channel.change_count(), 2);
        assert_eq!(channel.read().unwrap(), "two");
    }

    #[test]
    fn test_memory_channel_read_does_not_bump() {
        let channel = MemoryChannel::new();
        channel.write("stable").unwrap();
        let before = channel.change_count();
        channel.read().unwrap();
        channel.read().unwrap();
        assert_eq!(channel.change_count(), before);
    }
}
