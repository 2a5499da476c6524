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

//! Named loggers and event dispatch.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use arc_swap::ArcSwap;
use arc_swap::ArcSwapOption;
use parking_lot::RwLock;

use crate::Error;
use crate::append::Append;
use crate::event::LogEvent;
use crate::event::Location;
use crate::event::Payload;
use crate::level::LevelSpec;
use crate::level::LevelTable;
use crate::trap::Trap;

const LEVEL_BITS: u32 = 16;
const LEVEL_MASK: u64 = (1 << LEVEL_BITS) - 1;

/// A named node in the logger hierarchy.
///
/// Loggers are created and owned by a [`Repository`](crate::Repository). A logger without a
/// level of its own inherits the effective level of its parent; the root logger always has a
/// level.
///
/// Log calls return `true` when an event was created and `false` when the level was disabled.
/// A disabled call does no work beyond one comparison against the cached effective level.
///
/// The level methods ([`Logger::info`] and friends) never return errors. Anything that goes
/// wrong while appending, including an appender that was already closed, is reported to the
/// repository's trap. Use [`Logger::try_log`] to get those errors back instead.
pub struct Logger {
    name: Arc<str>,
    root: bool,
    levels: Arc<LevelTable>,
    trap: Arc<dyn Trap>,
    level: RwLock<Option<usize>>,
    // epoch << LEVEL_BITS | effective level; zero is never a valid entry
    cache: AtomicU64,
    additive: AtomicBool,
    trace: AtomicBool,
    appenders: ArcSwap<Vec<Arc<dyn Append>>>,
    parent: ArcSwapOption<Logger>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &*self.level.read())
            .field("additive", &self.additive())
            .field("trace", &self.trace())
            .field("appenders", &self.appenders.load().len())
            .field("parent", &self.parent.load().as_ref().map(|p| p.name.clone()))
            .finish()
    }
}

impl Logger {
    pub(crate) fn new(
        name: impl Into<Arc<str>>,
        levels: Arc<LevelTable>,
        trap: Arc<dyn Trap>,
        parent: Option<Arc<Logger>>,
    ) -> Self {
        let root = parent.is_none();
        Logger {
            name: name.into(),
            root,
            levels,
            trap,
            level: RwLock::new(if root { Some(0) } else { None }),
            cache: AtomicU64::new(0),
            additive: AtomicBool::new(true),
            trace: AtomicBool::new(false),
            appenders: ArcSwap::from_pointee(vec![]),
            parent: ArcSwapOption::new(parent),
        }
    }

    /// The full name, e.g. `"app::db::pool"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the root logger.
    pub fn is_root(&self) -> bool {
        self.root
    }

    /// The closest registered ancestor; `None` for the root logger.
    pub fn parent(&self) -> Option<Arc<Logger>> {
        self.parent.load_full()
    }

    pub(crate) fn set_parent(&self, parent: Arc<Logger>) {
        self.parent.store(Some(parent));
    }

    /// The level table this logger resolves names against.
    pub fn level_table(&self) -> &Arc<LevelTable> {
        &self.levels
    }

    /// The level set on this logger; `None` means it inherits.
    pub fn level(&self) -> Option<usize> {
        *self.level.read()
    }

    /// Set the level of this logger.
    ///
    /// Accepts a level name, a raw ordinal, or [`LevelSpec::Inherit`] (also `None`) to inherit
    /// from the parent again. The root logger cannot inherit; setting it to inherit means `"all"`.
    ///
    /// # Errors
    ///
    /// Return a configuration error for unknown names and ordinals above `"off"`.
    pub fn set_level(&self, level: impl Into<LevelSpec>) -> Result<(), Error> {
        let level = match level.into() {
            LevelSpec::Inherit if self.root => Some(0),
            LevelSpec::Inherit => None,
            spec => Some(self.levels.threshold(&spec)?),
        };
        *self.level.write() = level;
        // descendants may inherit from us
        self.levels.invalidate();
        Ok(())
    }

    /// The level actually used to gate calls: our own, or the closest ancestor's.
    pub fn effective_level(&self) -> usize {
        let epoch = self.levels.epoch();
        let cached = self.cache.load(Ordering::Acquire);
        if cached >> LEVEL_BITS == epoch {
            return (cached & LEVEL_MASK) as usize;
        }

        let level = self.resolve_level().min(self.levels.len());
        self.cache
            .store((epoch << LEVEL_BITS) | level as u64, Ordering::Release);
        level
    }

    fn resolve_level(&self) -> usize {
        if let Some(level) = *self.level.read() {
            return level;
        }
        match self.parent.load().as_ref() {
            Some(parent) => parent.effective_level(),
            None => 0,
        }
    }

    /// Whether a call at `level` would create an event.
    pub fn is_enabled(&self, level: usize) -> bool {
        level < self.levels.len() && self.effective_level() <= level
    }

    /// Whether events also go to the parent's appenders. Default to `true`.
    pub fn additive(&self) -> bool {
        self.additive.load(Ordering::Relaxed)
    }

    /// Set additivity. Ignored on the root logger, which has no parent.
    pub fn set_additive(&self, additive: bool) {
        if !self.root {
            self.additive.store(additive, Ordering::Relaxed);
        }
    }

    /// Whether events record their call site. Default to `false`.
    pub fn trace(&self) -> bool {
        self.trace.load(Ordering::Relaxed)
    }

    /// Turn call site recording on or off.
    pub fn set_trace(&self, trace: bool) {
        self.trace.store(trace, Ordering::Relaxed);
    }

    /// The appenders of this logger, in registration order.
    pub fn appenders(&self) -> Vec<Arc<dyn Append>> {
        Vec::clone(&self.appenders.load())
    }

    /// Add an appender; adding the same appender twice is a no-op.
    pub fn add_appender(&self, appender: Arc<dyn Append>) {
        self.add_appenders([appender]);
    }

    /// Add appenders, skipping those already present.
    pub fn add_appenders(&self, appenders: impl IntoIterator<Item = Arc<dyn Append>>) {
        let added = appenders.into_iter().collect::<Vec<_>>();
        self.appenders.rcu(|current| {
            let mut next = Vec::clone(current);
            for appender in added.iter() {
                if !next.iter().any(|a| same_appender(a, appender)) {
                    next.push(appender.clone());
                }
            }
            next
        });
    }

    /// Replace all appenders.
    pub fn set_appenders(&self, appenders: impl IntoIterator<Item = Arc<dyn Append>>) {
        self.clear_appenders();
        self.add_appenders(appenders);
    }

    /// Remove an appender by identity. Returns whether it was present.
    pub fn remove_appender(&self, appender: &Arc<dyn Append>) -> bool {
        self.remove_where(|a| same_appender(a, appender))
    }

    /// Remove appenders by name. Returns whether any was present.
    pub fn remove_appender_named(&self, name: &str) -> bool {
        self.remove_where(|a| a.name() == name)
    }

    fn remove_where(&self, matches: impl Fn(&Arc<dyn Append>) -> bool) -> bool {
        let previous = self.appenders.rcu(|current| {
            current
                .iter()
                .filter(|a| !matches(a))
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(matches)
    }

    /// Remove every appender.
    pub fn clear_appenders(&self) {
        self.appenders.store(Arc::new(vec![]));
    }

    /// Log `payload` at `level`.
    #[track_caller]
    pub fn log(&self, level: usize, payload: impl Into<Payload>) -> bool {
        if !self.is_enabled(level) {
            return false;
        }
        self.emit(level, vec![payload.into()], self.call_site(None))
    }

    /// Log at `level`, building the payload only if the level is enabled.
    #[track_caller]
    pub fn log_with<P, F>(&self, level: usize, payload: F) -> bool
    where
        P: Into<Payload>,
        F: FnOnce() -> P,
    {
        if !self.is_enabled(level) {
            return false;
        }
        self.emit(level, vec![payload().into()], self.call_site(None))
    }

    /// Log several payload objects as one event.
    #[track_caller]
    pub fn log_all(&self, level: usize, payload: impl IntoIterator<Item = Payload>) -> bool {
        if !self.is_enabled(level) {
            return false;
        }
        let payload = payload.into_iter().collect();
        self.emit(level, payload, self.call_site(None))
    }

    /// Log at a level given by name or ordinal, surfacing errors instead of trapping them.
    ///
    /// # Errors
    ///
    /// Return an error if the level is unknown or an appender is closed.
    #[track_caller]
    pub fn try_log(
        &self,
        level: impl Into<LevelSpec>,
        payload: impl Into<Payload>,
    ) -> Result<bool, Error> {
        let level = self.levels.level_number(level)?;
        if !self.is_enabled(level) {
            return Ok(false);
        }
        let event = self.event(level, vec![payload.into()], self.call_site(None));
        self.log_event(&event)?;
        Ok(true)
    }

    #[doc(hidden)]
    pub fn __log_at(&self, level: usize, payload: Vec<Payload>, location: Location) -> bool {
        self.emit(level, payload, self.call_site(Some(location)))
    }

    #[doc(hidden)]
    pub fn __well_known(&self, idx: usize) -> Option<usize> {
        self.levels.well_known(idx)
    }

    #[track_caller]
    fn call_site(&self, location: Option<Location>) -> Option<Location> {
        if !self.trace() {
            return None;
        }
        match location {
            Some(location) => Some(location),
            None => Some(Location::caller()),
        }
    }

    fn event(&self, level: usize, payload: Vec<Payload>, location: Option<Location>) -> LogEvent {
        LogEvent::new(
            self.name.clone(),
            level,
            self.levels.snapshot(),
            payload,
            location,
        )
    }

    fn emit(&self, level: usize, payload: Vec<Payload>, location: Option<Location>) -> bool {
        let event = self.event(level, payload, location);
        if let Err(err) = self.log_event(&event) {
            self.trap.trap(&err);
        }
        true
    }

    /// Deliver an event to our appenders in order, then to the parent's if additive.
    ///
    /// No level filtering happens here; each appender applies its own threshold. Every appender
    /// is tried even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Return the first error raised by an appender, e.g. because it is closed.
    pub fn log_event(&self, event: &LogEvent) -> Result<(), Error> {
        let mut result = Ok(());
        for appender in self.appenders.load().iter() {
            if let Err(err) = appender.append(event) {
                result = result.and(Err(err));
            }
        }

        if self.additive() {
            if let Some(parent) = self.parent.load().as_ref() {
                if let Err(err) = parent.log_event(event) {
                    result = result.and(Err(err));
                }
            }
        }
        result
    }

    /// Write text to our appenders, and the parent's if additive, bypassing layouts and levels.
    ///
    /// # Errors
    ///
    /// Return the first error raised by an appender, e.g. because it is closed.
    pub fn write_raw(&self, text: &str) -> Result<(), Error> {
        let mut result = Ok(());
        for appender in self.appenders.load().iter() {
            if let Err(err) = appender.write_raw(text) {
                result = result.and(Err(err));
            }
        }

        if self.additive() {
            if let Some(parent) = self.parent.load().as_ref() {
                if let Err(err) = parent.write_raw(text) {
                    result = result.and(Err(err));
                }
            }
        }
        result
    }

    pub(crate) fn reset(&self) {
        *self.level.write() = if self.root { Some(0) } else { None };
        self.additive.store(true, Ordering::Relaxed);
        self.trace.store(false, Ordering::Relaxed);
        self.clear_appenders();
    }
}

fn same_appender(a: &Arc<dyn Append>, b: &Arc<dyn Append>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

macro_rules! level_methods {
    ($($idx:literal => $name:ident, $name_with:ident, $enabled:ident;)*) => {
        impl Logger {
            $(
                #[doc = concat!("Log at the `", stringify!($name), "` level.")]
                ///
                /// Returns `false` without doing anything if the level is disabled or missing
                /// from the level table. Appender errors, a closed appender included, go to
                /// the repository's trap; see [`Logger::try_log`].
                #[track_caller]
                pub fn $name(&self, payload: impl Into<Payload>) -> bool {
                    match self.levels.well_known($idx) {
                        Some(level) => self.log(level, payload),
                        None => false,
                    }
                }

                #[doc = concat!("Log at the `", stringify!($name), "` level, building the payload lazily.")]
                #[track_caller]
                pub fn $name_with<P, F>(&self, payload: F) -> bool
                where
                    P: Into<Payload>,
                    F: FnOnce() -> P,
                {
                    match self.levels.well_known($idx) {
                        Some(level) => self.log_with(level, payload),
                        None => false,
                    }
                }

                #[doc = concat!("Whether the `", stringify!($name), "` level is enabled.")]
                pub fn $enabled(&self) -> bool {
                    self.levels
                        .well_known($idx)
                        .is_some_and(|level| self.is_enabled(level))
                }
            )*
        }
    };
}

level_methods! {
    0 => debug, debug_with, is_debug_enabled;
    1 => info, info_with, is_info_enabled;
    2 => warn, warn_with, is_warn_enabled;
    3 => error, error_with, is_error_enabled;
    4 => fatal, fatal_with, is_fatal_enabled;
}

impl PartialEq for Logger {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.name == other.name
    }
}

impl Eq for Logger {}

impl PartialOrd for Logger {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Logger {
    /// The root logger sorts before every other logger; the rest sort by name.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .root
            .cmp(&self.root)
            .then_with(|| self.name.cmp(&other.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::append::Appender;
    use crate::append::StringIo;
    use crate::trap::CollectTrap;
    use crate::Repository;

    #[test]
    fn test_effective_level_follows_parent_changes() {
        let repo = Repository::new();
        let root = repo.root();
        let child = repo.logger("app::db").unwrap();

        assert_eq!(child.level(), None);
        assert_eq!(child.effective_level(), 0);

        root.set_level("warn").unwrap();
        assert_eq!(child.effective_level(), 2);
        assert!(!child.is_info_enabled());
        assert!(child.is_warn_enabled());

        child.set_level("debug").unwrap();
        assert!(child.is_debug_enabled());
        child.set_level(None::<&str>).unwrap();
        assert_eq!(child.effective_level(), 2);
    }

    #[test]
    fn test_root_never_inherits() {
        let repo = Repository::new();
        let root = repo.root();
        root.set_level("error").unwrap();
        root.set_level(LevelSpec::Inherit).unwrap();
        assert_eq!(root.level(), Some(0));
    }

    #[test]
    fn test_set_level_rejects_bad_input() {
        let repo = Repository::new();
        let logger = repo.logger("app").unwrap();
        assert!(logger.set_level("chatty").is_err());
        assert!(logger.set_level(6usize).is_err());
        logger.set_level("off").unwrap();
        assert!(!logger.is_fatal_enabled());
        assert_eq!(logger.level(), Some(5));
    }

    #[test]
    fn test_disabled_call_does_not_build_payload() {
        let repo = Repository::new();
        let logger = repo.logger("lazy").unwrap();
        logger.set_level("warn").unwrap();

        let mut built = false;
        assert!(!logger.debug_with(|| {
            built = true;
            "expensive"
        }));
        assert!(!built);

        assert!(logger.error_with(|| {
            built = true;
            "cheap enough"
        }));
        assert!(built);
    }

    #[test]
    fn test_appenders_are_deduplicated() {
        let repo = Repository::new();
        let logger = repo.logger("dedupe").unwrap();
        let appender: Arc<dyn Append> = Appender::builder("mem", StringIo::default())
            .build(&repo)
            .unwrap();

        logger.add_appenders([appender.clone(), appender.clone()]);
        logger.add_appender(appender.clone());
        assert_eq!(logger.appenders().len(), 1);

        assert!(logger.remove_appender_named("mem"));
        assert!(!logger.remove_appender(&appender));
        assert!(logger.appenders().is_empty());
    }

    #[test]
    fn test_trace_records_call_site() {
        let repo = Repository::new();
        let seen = Arc::new(parking_lot::Mutex::new(vec![]));
        let captured = seen.clone();
        let layout = crate::layout::CustomLayout::new(move |event| {
            captured.lock().push(event.location().copied());
            Ok(String::new())
        });
        let appender = Appender::builder("trace", StringIo::default())
            .layout(layout)
            .build(&repo)
            .unwrap();
        let logger = repo.logger("traced").unwrap();
        logger.add_appender(appender);

        logger.info("untraced");
        logger.set_trace(true);
        let line = line!() + 1;
        logger.info("traced");

        let seen = seen.lock();
        assert_eq!(seen[0], None);
        let location = seen[1].unwrap();
        assert_eq!(location.file(), file!());
        assert_eq!(location.line(), line);
    }

    #[test]
    fn test_closed_appender_is_a_usage_error() {
        let trap = CollectTrap::default();
        let repo = Repository::builder().trap(trap.clone()).build().unwrap();
        let appender = Appender::builder("closed", StringIo::default())
            .build(&repo)
            .unwrap();
        let logger = repo.logger("user").unwrap();
        logger.add_appender(appender.clone());
        appender.close(true).unwrap();

        let err = logger.try_log("info", "hello").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Usage);

        // the bool API reports it to the trap instead
        assert!(logger.info("hello"));
        assert_eq!(trap.kinds(), [crate::ErrorKind::Usage]);
    }

    #[test]
    fn test_ordering_puts_root_first() {
        let repo = Repository::new();
        let mut loggers = vec![
            repo.logger("b").unwrap(),
            repo.root(),
            repo.logger("a::z").unwrap(),
            repo.logger("A").unwrap(),
        ];
        loggers.sort();
        let names = loggers.iter().map(|l| l.name()).collect::<Vec<_>>();
        assert_eq!(names, ["root", "A", "a::z", "b"]);
    }
}
