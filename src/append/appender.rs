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

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use parking_lot::ReentrantMutex;

use crate::Error;
use crate::ErrorKind;
use crate::Repository;
use crate::append::Append;
use crate::append::AppenderRegistry;
use crate::append::AutoFlush;
use crate::append::Sink;
use crate::append::buffer::Buffer;
use crate::append::buffer::Pushed;
use crate::append::flusher::Flusher;
use crate::event::LogEvent;
use crate::layout::BasicLayout;
use crate::layout::Layout;
use crate::level::LevelSpec;
use crate::level::LevelTable;
use crate::trap::Trap;

// Stored in place of a real threshold once a destination has failed.
const DISABLED: usize = usize::MAX;

/// The common appender skeleton around a destination [`Sink`].
///
/// Appenders are created through [`AppenderBuilder`], which writes the layout's header and
/// registers the appender by name in a [`Repository`].
///
/// The sink lock is re-entrant. A message logged back into the same appender from inside the
/// sink, or from the trap reporting a sink failure, is written once the outer call is done.
/// Messages those nested writes log in turn are dropped.
pub struct Appender<S: Sink> {
    name: String,
    layout: Arc<dyn Layout>,
    levels: Arc<LevelTable>,
    level: AtomicUsize,
    closed: AtomicBool,
    trap: Arc<dyn Trap>,
    guarded: ReentrantMutex<Guarded<S>>,
    // messages logged from inside the sink by the thread holding `guarded`
    nested: Mutex<Vec<(String, Option<usize>)>>,
    flusher: Mutex<Option<Flusher>>,
    registry: Weak<AppenderRegistry>,
}

struct Guarded<S> {
    state: RefCell<State<S>>,
    trapping: Cell<bool>,
}

struct State<S> {
    sink: Option<S>,
    buffer: Buffer,
}

impl<S: Sink> State<S> {
    fn sink(&mut self) -> Result<&mut S, Error> {
        self.sink
            .as_mut()
            .ok_or_else(|| Error::usage("appender is closed"))
    }

    fn write(&mut self, text: &str) -> Result<(), Error> {
        self.sink()?
            .write(text)
            .map_err(|err| Error::io("failed to write to destination").with_source(err))
    }

    fn flush_buffer(&mut self) -> Result<(), Error> {
        match self.buffer.take() {
            Some(text) => self.write(&text),
            None => Ok(()),
        }
    }

    fn push(&mut self, text: String, level: Option<usize>) -> Result<(), Error> {
        match self.buffer.push(text, level) {
            Pushed::WriteThrough(text) => self.write(&text),
            Pushed::Flush => self.flush_buffer(),
            Pushed::Held => Ok(()),
        }
    }

    fn take_error(&mut self) -> Option<Error> {
        self.sink.as_mut().and_then(Sink::take_error)
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.flush_buffer()?;
        self.sink()?
            .flush()
            .map_err(|err| Error::io("failed to flush destination").with_source(err))
    }

    fn close(&mut self, footer: &str) -> Result<(), Error> {
        let flushed = self.flush_buffer();
        let footer = if footer.is_empty() {
            Ok(())
        } else {
            self.write(footer)
        };
        let closed = match self.sink.take() {
            Some(mut sink) => {
                let closed = sink
                    .close()
                    .map_err(|err| Error::io("failed to close destination").with_source(err));
                match sink.take_error() {
                    Some(err) => closed.and(Err(err)),
                    None => closed,
                }
            }
            None => Ok(()),
        };
        flushed.and(footer).and(closed)
    }
}

impl<S: Sink> fmt::Debug for Appender<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Appender")
            .field("name", &self.name)
            .field("sink", &std::any::type_name::<S>())
            .field("level", &self.level.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<S: Sink> Appender<S> {
    /// Start building an appender named `name` writing to `sink`.
    pub fn builder(name: impl Into<String>, sink: S) -> AppenderBuilder<S> {
        AppenderBuilder::new(name, sink)
    }

    /// The layout used by this appender.
    pub fn layout(&self) -> &Arc<dyn Layout> {
        &self.layout
    }

    /// Number of formatted messages waiting in the buffer.
    pub fn buffered(&self) -> usize {
        let guard = self.guarded.lock();
        guard.state.try_borrow().map_or(0, |state| state.buffer.len())
    }

    /// Run `f` against the sink.
    ///
    /// Return `None` once the appender is closed, or when called from inside the sink.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        let guard = self.guarded.lock();
        let mut state = guard.state.try_borrow_mut().ok()?;
        state.sink.as_mut().map(f)
    }

    /// Flush buffered messages, then close and reopen the destination.
    pub fn reopen(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        let result = self.locked(|state| {
            state.flush()?;
            state
                .sink()?
                .reopen()
                .map_err(|err| Error::io("failed to reopen destination").with_source(err))
        });
        match result {
            Some(result) => result.or_else(|err| self.recover(err)),
            None => Err(Error::usage("cannot reopen from inside the destination")
                .with_context("appender", &self.name)),
        }
    }

    /// Run `f` against the state, then write the messages the sink logged meanwhile and
    /// report any failure the sink kept aside.
    ///
    /// Return `None`, without running `f`, when re-entered from inside the sink.
    fn locked(
        &self,
        f: impl FnOnce(&mut State<S>) -> Result<(), Error>,
    ) -> Option<Result<(), Error>> {
        let guard = self.guarded.lock();
        let (result, kept) = {
            let mut state = guard.state.try_borrow_mut().ok()?;
            let mut result = f(&mut *state);
            let nested = mem::take(&mut *self.nested.lock());
            for (text, level) in nested {
                result = result.and_then(|()| state.push(text, level));
            }
            self.nested.lock().clear();
            (result, state.take_error())
        };

        // a trap logging into this appender may fail the same way again
        if let Some(err) = kept {
            if !guard.trapping.replace(true) {
                self.trap.trap(&err.with_context("appender", &self.name));
                guard.trapping.set(false);
            }
        }
        Some(result)
    }

    fn closed_error(&self) -> Error {
        Error::usage("appender is closed").with_context("appender", &self.name)
    }

    // Destination failures disable the appender and go to the trap; usage errors surface.
    fn recover(&self, err: Error) -> Result<(), Error> {
        let err = err.with_context("appender", &self.name);
        if err.kind() == ErrorKind::Usage {
            return Err(err);
        }
        self.level.store(DISABLED, Ordering::Relaxed);
        self.trap.trap(&err);
        Ok(())
    }

    fn dispatch(&self, text: String, level: Option<usize>) -> Result<(), Error> {
        if text.is_empty() {
            return Ok(());
        }

        let mut message = Some((text, level));
        let result = self.locked(|state| match message.take() {
            Some((text, level)) => state.push(text, level),
            None => Ok(()),
        });
        match result {
            Some(result) => result.or_else(|err| self.recover(err)),
            None => {
                self.nested.lock().extend(message);
                Ok(())
            }
        }
    }

    fn unregister(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let removed = {
            let mut appenders = registry.write();
            let is_self = appenders
                .get(&self.name)
                .is_some_and(|a| std::ptr::addr_eq(Arc::as_ptr(a), self as *const Self));
            if is_self {
                appenders.remove(&self.name)
            } else {
                None
            }
        };
        drop(removed);
    }
}

impl<S: Sink> Append for Appender<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> usize {
        self.level.load(Ordering::Relaxed)
    }

    fn set_level(&self, level: LevelSpec) -> Result<(), Error> {
        let level = match level {
            LevelSpec::Inherit => 0,
            spec => self.levels.threshold(&spec)?,
        };
        self.level.store(level, Ordering::Relaxed);
        Ok(())
    }

    fn append(&self, event: &LogEvent) -> Result<(), Error> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        if event.level() < self.level() {
            return Ok(());
        }

        match self.layout.format(event) {
            Ok(text) => self.dispatch(text, Some(event.level())),
            Err(err) => self.recover(err),
        }
    }

    fn write_raw(&self, text: &str) -> Result<(), Error> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        if self.level() >= self.levels.len() {
            return Ok(());
        }
        self.dispatch(text.to_string(), None)
    }

    fn flush(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Ok(());
        }
        // a close may have won the race for the sink
        match self.locked(State::flush) {
            None | Some(Ok(())) => Ok(()),
            Some(Err(err)) if err.kind() == ErrorKind::Usage => Ok(()),
            Some(Err(err)) => self.recover(err),
        }
    }

    fn close(&self, footer: bool) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let flusher = self.flusher.lock().take();
        drop(flusher);
        self.unregister();

        let footer = if footer {
            self.layout.footer()
        } else {
            String::new()
        };
        // from inside the sink, the sink is released when the appender drops
        if let Some(Err(err)) = self.locked(|state| state.close(&footer)) {
            self.trap.trap(&err.with_context("appender", &self.name));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<S: Sink> Drop for Appender<S> {
    fn drop(&mut self) {
        let _ = self.close(true);
    }
}

/// A builder to configure and create an [`Appender`].
///
/// # Examples
///
/// ```
/// use logtree::Repository;
/// use logtree::append::Appender;
/// use logtree::append::AutoFlush;
/// use logtree::append::StringIo;
///
/// let repo = Repository::new();
/// let appender = Appender::builder("memory", StringIo::default())
///     .level("info")
///     .auto_flushing(AutoFlush::from(10usize))
///     .immediate_at(["error", "fatal"])
///     .build(&repo)
///     .unwrap();
/// ```
pub struct AppenderBuilder<S: Sink> {
    name: String,
    sink: S,
    layout: Arc<dyn Layout>,
    level: LevelSpec,
    auto_flush: AutoFlush,
    immediate: Vec<LevelSpec>,
    flush_period: Option<Duration>,
}

impl<S: Sink> fmt::Debug for AppenderBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppenderBuilder")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .field("level", &self.level)
            .field("auto_flush", &self.auto_flush)
            .field("immediate", &self.immediate)
            .field("flush_period", &self.flush_period)
            .finish()
    }
}

impl<S: Sink> AppenderBuilder<S> {
    /// Create a new appender builder.
    #[must_use]
    pub fn new(name: impl Into<String>, sink: S) -> Self {
        AppenderBuilder {
            name: name.into(),
            sink,
            layout: Arc::new(BasicLayout::default()),
            level: LevelSpec::Inherit,
            auto_flush: AutoFlush::EveryMessage,
            immediate: vec![],
            flush_period: None,
        }
    }

    /// Set the layout.
    ///
    /// Default to [`BasicLayout`]. Pass an `Arc<dyn Layout>` to share one layout between
    /// appenders.
    #[must_use]
    pub fn layout(mut self, layout: impl Layout) -> Self {
        self.layout = Arc::new(layout);
        self
    }

    /// Set the minimum level.
    ///
    /// Default to accepting every level.
    #[must_use]
    pub fn level(mut self, level: impl Into<LevelSpec>) -> Self {
        self.level = level.into();
        self
    }

    /// Set when buffered messages are written.
    ///
    /// Default to [`AutoFlush::EveryMessage`].
    #[must_use]
    pub fn auto_flushing(mut self, auto_flush: impl Into<AutoFlush>) -> Self {
        self.auto_flush = auto_flush.into();
        self
    }

    /// Set the levels that flush the buffer as soon as a message at that level arrives.
    #[must_use]
    pub fn immediate_at<I, L>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LevelSpec>,
    {
        self.immediate = levels.into_iter().map(Into::into).collect();
        self
    }

    /// Flush the buffer from a background thread every `period`.
    ///
    /// The thread stops when the appender closes.
    #[must_use]
    pub fn flush_period(mut self, period: Duration) -> Self {
        self.flush_period = Some(period);
        self
    }

    /// Build the appender, write the layout's header and register it in `repo`.
    ///
    /// An appender registered earlier under the same name is replaced in the registry but
    /// stays usable by the loggers holding it.
    ///
    /// # Errors
    ///
    /// Return a configuration error if a level is unknown or the flusher thread cannot start.
    pub fn build(self, repo: &Repository) -> Result<Arc<Appender<S>>, Error> {
        let AppenderBuilder {
            name,
            sink,
            layout,
            level,
            auto_flush,
            immediate,
            flush_period,
        } = self;

        let levels = repo.level_table();
        let level = match level {
            LevelSpec::Inherit => 0,
            spec => levels.threshold(&spec)?,
        };
        let immediate = immediate
            .iter()
            .map(|spec| levels.threshold(spec))
            .collect::<Result<HashSet<_>, _>>()?;

        let appender = Arc::new(Appender {
            name,
            layout,
            levels,
            level: AtomicUsize::new(level),
            closed: AtomicBool::new(false),
            trap: repo.trap(),
            guarded: ReentrantMutex::new(Guarded {
                state: RefCell::new(State {
                    sink: Some(sink),
                    buffer: Buffer::new(auto_flush, immediate),
                }),
                trapping: Cell::new(false),
            }),
            nested: Mutex::new(vec![]),
            flusher: Mutex::new(None),
            registry: Arc::downgrade(repo.appender_registry()),
        });

        let header = appender.layout.header();
        if !header.is_empty() {
            if let Some(Err(err)) = appender.locked(|state| state.write(&header)) {
                appender
                    .trap
                    .trap(&err.with_context("appender", &appender.name));
            }
        }

        if let Some(period) = flush_period {
            let weak: Weak<dyn Append> = Arc::downgrade(&appender) as Weak<dyn Append>;
            let flusher = Flusher::spawn(&appender.name, period, weak, appender.trap.clone())?;
            *appender.flusher.lock() = Some(flusher);
        }

        repo.register_appender(appender.clone());
        Ok(appender)
    }
}
