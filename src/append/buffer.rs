// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::Error;

/// Number of messages buffered when auto flushing is turned off.
pub const DEFAULT_BUFFER_SIZE: usize = 500;

/// When a buffering appender writes its buffer to the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoFlush {
    /// Write every message straight through, bypassing the buffer.
    #[default]
    EveryMessage,
    /// Flush once this many messages are buffered.
    After(NonZeroUsize),
}

impl AutoFlush {
    /// Buffer [`DEFAULT_BUFFER_SIZE`] messages between flushes.
    pub fn buffered() -> Self {
        AutoFlush::from(DEFAULT_BUFFER_SIZE)
    }

    pub(crate) fn threshold(self) -> usize {
        match self {
            AutoFlush::EveryMessage => 1,
            AutoFlush::After(n) => n.get(),
        }
    }
}

impl From<bool> for AutoFlush {
    /// `true` flushes every message; `false` buffers [`DEFAULT_BUFFER_SIZE`] messages.
    fn from(on: bool) -> Self {
        if on {
            AutoFlush::EveryMessage
        } else {
            AutoFlush::buffered()
        }
    }
}

impl From<usize> for AutoFlush {
    /// `0` means [`DEFAULT_BUFFER_SIZE`] and `1` means [`AutoFlush::EveryMessage`].
    fn from(n: usize) -> Self {
        match n {
            0 => AutoFlush::buffered(),
            1 => AutoFlush::EveryMessage,
            n => AutoFlush::After(NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)),
        }
    }
}

impl FromStr for AutoFlush {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "true" => Ok(AutoFlush::EveryMessage),
            "false" => Ok(AutoFlush::buffered()),
            n => n.parse::<usize>().map(AutoFlush::from).map_err(|err| {
                Error::config("unrecognized auto flushing period")
                    .with_context("input", s)
                    .with_source(err)
            }),
        }
    }
}

/// Formatted messages waiting to be written.
#[derive(Debug)]
pub(crate) struct Buffer {
    items: Vec<String>,
    auto_flush: AutoFlush,
    immediate: HashSet<usize>,
}

/// What the caller must do after pushing a message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pushed {
    /// The buffer is bypassed; write this text now.
    WriteThrough(String),
    /// Buffered; flush now.
    Flush,
    /// Buffered; nothing else to do.
    Held,
}

impl Buffer {
    pub(crate) fn new(auto_flush: AutoFlush, immediate: HashSet<usize>) -> Self {
        let capacity = auto_flush.threshold().min(64);
        Buffer {
            items: Vec::with_capacity(capacity),
            auto_flush,
            immediate,
        }
    }

    pub(crate) fn push(&mut self, text: String, level: Option<usize>) -> Pushed {
        let threshold = self.auto_flush.threshold();
        if threshold == 1 {
            return Pushed::WriteThrough(text);
        }

        self.items.push(text);
        let immediate = level.is_some_and(|l| self.immediate.contains(&l));
        if self.items.len() >= threshold || immediate {
            Pushed::Flush
        } else {
            Pushed::Held
        }
    }

    /// Swap out the buffered messages and join them; `None` if nothing is buffered.
    pub(crate) fn take(&mut self) -> Option<String> {
        if self.items.is_empty() {
            return None;
        }
        let items = std::mem::take(&mut self.items);
        Some(items.concat())
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_flush_conversions() {
        assert_eq!(AutoFlush::from(true), AutoFlush::EveryMessage);
        assert_eq!(AutoFlush::from(false).threshold(), DEFAULT_BUFFER_SIZE);
        assert_eq!(AutoFlush::from(0usize).threshold(), DEFAULT_BUFFER_SIZE);
        assert_eq!(AutoFlush::from(1usize), AutoFlush::EveryMessage);
        assert_eq!(AutoFlush::from(42usize).threshold(), 42);
        assert_eq!("7".parse::<AutoFlush>().unwrap().threshold(), 7);
        assert!("-3".parse::<AutoFlush>().is_err());
    }

    #[test]
    fn test_push_until_threshold() {
        let mut buffer = Buffer::new(AutoFlush::from(3usize), HashSet::from([4]));
        assert_eq!(buffer.push("a".to_string(), Some(1)), Pushed::Held);
        assert_eq!(buffer.push("b".to_string(), None), Pushed::Held);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.push("c".to_string(), Some(1)), Pushed::Flush);
        assert_eq!(buffer.take().as_deref(), Some("abc"));
        assert_eq!(buffer.take(), None);

        assert_eq!(buffer.push("urgent".to_string(), Some(4)), Pushed::Flush);
    }

    #[test]
    fn test_every_message_bypasses_buffer() {
        let mut buffer = Buffer::new(AutoFlush::EveryMessage, HashSet::new());
        assert_eq!(
            buffer.push("x".to_string(), Some(0)),
            Pushed::WriteThrough("x".to_string())
        );
        assert_eq!(buffer.len(), 0);
    }
}
