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

//! Dispatch log events to various destinations.
//!
//! Every built-in appender is an [`Appender`] around a destination specific [`Sink`]. The
//! appender carries the shared skeleton (layout, level threshold, closed flag, buffering and
//! the re-entrant lock) while the sink only knows how to write text.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::Error;
use crate::event::LogEvent;
use crate::level::LevelSpec;

mod appender;
mod buffer;
mod file;
mod flusher;
mod io_sink;
pub mod rolling_file;
mod stdio;
mod string_io;

pub use self::appender::Appender;
pub use self::appender::AppenderBuilder;
pub use self::buffer::AutoFlush;
pub use self::buffer::DEFAULT_BUFFER_SIZE;
pub use self::file::FileSink;
pub use self::io_sink::IoSink;
pub use self::rolling_file::RollingFile;
pub use self::rolling_file::RollingFileBuilder;
pub use self::stdio::Stderr;
pub use self::stdio::Stdout;
pub use self::string_io::StringIo;

/// Appenders registered by name.
pub(crate) type AppenderRegistry = RwLock<HashMap<String, Arc<dyn Append>>>;

/// An appender that can process log events.
pub trait Append: fmt::Debug + Send + Sync + 'static {
    /// The unique name of this appender.
    fn name(&self) -> &str;

    /// The minimum level ordinal this appender accepts.
    fn level(&self) -> usize;

    /// Change the minimum level; [`LevelSpec::Inherit`] accepts everything.
    fn set_level(&self, level: LevelSpec) -> Result<(), Error>;

    /// Format and write an event, unless its level is below this appender's threshold.
    ///
    /// # Errors
    ///
    /// Return a usage error if the appender is closed. Destination failures are not returned;
    /// the appender disables itself and reports them to its trap.
    fn append(&self, event: &LogEvent) -> Result<(), Error>;

    /// Write text as is, bypassing the layout and the level threshold.
    fn write_raw(&self, text: &str) -> Result<(), Error>;

    /// Flush any buffered messages.
    ///
    /// Default to a no-op.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Close the appender, optionally writing the layout's footer first.
    ///
    /// Closing twice is a no-op.
    fn close(&self, footer: bool) -> Result<(), Error>;

    /// Whether [`Append::close`] was called.
    fn is_closed(&self) -> bool;
}

/// A destination that an [`Appender`] writes formatted text to.
///
/// Calls are serialized by the owning appender's lock. A sink may log through a logger that
/// routes back to its own appender; such messages are written after the current call returns.
pub trait Sink: Send + 'static {
    /// Write one unit of text.
    fn write(&mut self, text: &str) -> io::Result<()>;

    /// Flush the destination.
    ///
    /// Default to a no-op.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Release the destination. Called once, when the appender closes.
    ///
    /// Default to [`Sink::flush`].
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }

    /// Close and reopen the destination, e.g. after an external tool moved a log file.
    ///
    /// Default to a no-op.
    fn reopen(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Take a failure that did not fail the write itself, such as a rotation that could not
    /// happen. The owning appender reports it to the repository's trap once the sink is
    /// released.
    ///
    /// Default to `None`.
    fn take_error(&mut self) -> Option<Error> {
        None
    }
}
