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

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::append::Sink;

/// An in-memory sink, mostly useful in tests.
///
/// Clones share the same storage: hand one clone to an appender and keep another to read what
/// was written.
///
/// # Examples
///
/// ```
/// use logtree::Repository;
/// use logtree::append::Appender;
/// use logtree::append::StringIo;
///
/// let repo = Repository::new();
/// let output = StringIo::default();
/// let appender = Appender::builder("memory", output.clone())
///     .build(&repo)
///     .unwrap();
///
/// let root = repo.root();
/// root.add_appender(appender);
/// root.warn("disk almost full");
/// assert_eq!(output.contents(), " WARN - root - disk almost full\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StringIo {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    text: String,
    read: usize,
    writes: usize,
}

impl StringIo {
    /// Everything written so far.
    pub fn contents(&self) -> String {
        self.inner.lock().text.clone()
    }

    /// Everything written since the previous call to `read_new`.
    pub fn read_new(&self) -> String {
        let mut inner = self.inner.lock();
        let fresh = inner.text[inner.read..].to_string();
        inner.read = inner.text.len();
        fresh
    }

    /// Number of writes the destination received; a flushed batch counts once.
    pub fn writes(&self) -> usize {
        self.inner.lock().writes
    }

    /// Discard everything written so far.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.text.clear();
        inner.read = 0;
        inner.writes = 0;
    }
}

impl Sink for StringIo {
    fn write(&mut self, text: &str) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.text.push_str(text);
        inner.writes += 1;
        Ok(())
    }
}
