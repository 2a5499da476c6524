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

use std::fmt;
use std::io;
use std::io::Write;

use crate::append::Sink;

/// A sink around any [`Write`] implementation, e.g. a socket or a pipe.
///
/// The writer is flushed and dropped when the appender closes.
pub struct IoSink<W: Write + Send + 'static> {
    writer: W,
}

impl<W: Write + Send + 'static> fmt::Debug for IoSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IoSink<{}>", std::any::type_name::<W>())
    }
}

impl<W: Write + Send + 'static> IoSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        IoSink { writer }
    }

    /// The wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write + Send + 'static> Sink for IoSink<W> {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
