use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// ## Key buffer
///
/// Keystrokes arrive from the terminal on any thread through a [`KeySender`]
/// and are consumed by the runtime through its [`KeyBuffer`]. Reading never
/// blocks. A `0x03` byte in any keystroke raises the break flag.

const CAPACITY: usize = 20;

/// Escape sequences for F1-F10 and the four cursor keys, which act as F11-F14.
pub const FUNCTION_KEYS: [&[u8]; 14] = [
    b"\x1bOP",
    b"\x1bOQ",
    b"\x1bOR",
    b"\x1bOS",
    b"\x1b[15~",
    b"\x1b[17~",
    b"\x1b[18~",
    b"\x1b[19~",
    b"\x1b[20~",
    b"\x1b[21~",
    b"\x1b[A",
    b"\x1b[D",
    b"\x1b[C",
    b"\x1b[B",
];

/// Function-key label (`F1`..`F14`) to macro text.
#[derive(Debug, Default, Clone)]
pub struct KeySettings {
    keys: HashMap<String, String>,
}

impl KeySettings {
    pub fn set(&mut self, label: &str, text: &str) {
        if text.is_empty() {
            self.keys.remove(label);
        } else {
            self.keys.insert(label.to_string(), text.to_string());
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.keys.get(label).map(|s| s.as_str())
    }
}

/// Label for an escape sequence, if it is one of the function keys.
pub fn function_key_label(seq: &[u8]) -> Option<String> {
    FUNCTION_KEYS
        .iter()
        .position(|k| *k == seq)
        .map(|i| format!("F{}", i + 1))
}

#[derive(Clone)]
pub struct KeySender {
    sender: SyncSender<Vec<u8>>,
    brk: Arc<AtomicBool>,
    settings: Arc<Mutex<KeySettings>>,
}

impl KeySender {
    /// Queue the bytes of one keystroke.
    pub fn save_key_stroke(&self, key: &[u8]) {
        let mut key = key.to_vec();
        if key.len() > 1 && key[0] == 0x1b {
            key = self.translate(&key);
        }
        if key.is_empty() {
            return;
        }
        if key.contains(&0x03) {
            self.brk.store(true, Ordering::SeqCst);
        }
        match self.sender.try_send(key) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("key buffer full, keystroke dropped"),
            Err(TrySendError::Disconnected(_)) => debug!("key buffer closed"),
        }
    }

    /// Signal a break without queuing anything.
    pub fn send_break(&self) {
        self.brk.store(true, Ordering::SeqCst);
    }

    fn translate(&self, seq: &[u8]) -> Vec<u8> {
        self.macro_text(seq)
            .map(String::into_bytes)
            .unwrap_or_default()
    }

    /// Text assigned with KEY to the function key sending `seq`.
    pub fn macro_text(&self, seq: &[u8]) -> Option<String> {
        let label = function_key_label(seq)?;
        let settings = self.settings.lock().ok()?;
        settings.get(&label).map(str::to_string)
    }
}

pub struct KeyBuffer {
    receiver: Receiver<Vec<u8>>,
    sender: KeySender,
    current: Vec<u8>,
    index: usize,
}

impl Default for KeyBuffer {
    fn default() -> KeyBuffer {
        let (sender, receiver) = sync_channel(CAPACITY);
        KeyBuffer {
            receiver,
            sender: KeySender {
                sender,
                brk: Arc::new(AtomicBool::new(false)),
                settings: Arc::new(Mutex::new(KeySettings::default())),
            },
            current: vec![],
            index: 0,
        }
    }
}

impl KeyBuffer {
    pub fn sender(&self) -> KeySender {
        self.sender.clone()
    }

    /// Next byte of keyboard input, `None` when nothing is waiting.
    pub fn read_byte(&mut self) -> Option<u8> {
        if self.index < self.current.len() {
            self.index += 1;
            return Some(self.current[self.index - 1]);
        }
        match self.receiver.try_recv() {
            Ok(key) => {
                self.current = key;
                self.index = 1;
                self.current.first().copied()
            }
            Err(_) => None,
        }
    }

    pub fn break_seen(&self) -> bool {
        self.sender.brk.load(Ordering::SeqCst)
    }

    pub fn clear_break(&self) {
        self.sender.brk.store(false, Ordering::SeqCst)
    }

    pub fn set_macro(&self, label: &str, text: &str) {
        if let Ok(mut settings) = self.sender.settings.lock() {
            settings.set(label, text);
        }
    }

    pub fn key_settings(&self) -> KeySettings {
        match self.sender.settings.lock() {
            Ok(settings) => settings.clone(),
            Err(_) => KeySettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_byte() {
        let mut buffer = KeyBuffer::default();
        assert_eq!(buffer.read_byte(), None);
        let sender = buffer.sender();
        sender.save_key_stroke(b"ab");
        sender.save_key_stroke(b"c");
        assert_eq!(buffer.read_byte(), Some(b'a'));
        assert_eq!(buffer.read_byte(), Some(b'b'));
        assert_eq!(buffer.read_byte(), Some(b'c'));
        assert_eq!(buffer.read_byte(), None);
    }

    #[test]
    fn test_break() {
        let buffer = KeyBuffer::default();
        assert!(!buffer.break_seen());
        buffer.sender().save_key_stroke(&[0x03]);
        assert!(buffer.break_seen());
        buffer.clear_break();
        assert!(!buffer.break_seen());
    }

    #[test]
    fn test_function_key_macros() {
        let mut buffer = KeyBuffer::default();
        let sender = buffer.sender();
        sender.save_key_stroke(b"\x1bOP");
        assert_eq!(buffer.read_byte(), None);
        buffer.set_macro("F1", "LIST");
        sender.save_key_stroke(b"\x1bOP");
        sender.save_key_stroke(b"\x1b[9~");
        let mut got = vec![];
        while let Some(b) = buffer.read_byte() {
            got.push(b);
        }
        assert_eq!(got, b"LIST");
    }

    #[test]
    fn test_labels() {
        assert_eq!(function_key_label(b"\x1b[21~"), Some("F10".to_string()));
        assert_eq!(function_key_label(b"\x1b[B"), Some("F14".to_string()));
        assert_eq!(function_key_label(b"\x1b[Z"), None);
    }

    #[test]
    fn test_full_buffer_drops() {
        let mut buffer = KeyBuffer::default();
        let sender = buffer.sender();
        for _ in 0..CAPACITY + 5 {
            sender.save_key_stroke(b"x");
        }
        let mut count = 0;
        while buffer.read_byte().is_some() {
            count += 1;
        }
        assert_eq!(count, CAPACITY);
    }
}
