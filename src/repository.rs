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

//! The registry owning the logger hierarchy.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::Error;
use crate::Logger;
use crate::append::Append;
use crate::append::AppenderRegistry;
use crate::level::LevelSpec;
use crate::level::LevelTable;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// Name of the root logger.
pub const ROOT: &str = "root";

/// Separator between the segments of a logger name.
pub const SEPARATOR: &str = "::";

/// A registry of loggers keyed by name, plus the appenders registered by name.
///
/// Loggers are created lazily the first time a name is asked for. A new logger's parent is its
/// closest registered ancestor, and existing descendants that now have a closer ancestor are
/// re-parented under it.
///
/// `Repository` is a cheap handle; clones share the same hierarchy.
///
/// # Examples
///
/// ```
/// use logtree::Repository;
///
/// let repo = Repository::new();
/// let db = repo.logger("app::db").unwrap();
/// assert_eq!(db.parent().unwrap().name(), "root");
///
/// let app = repo.logger("app").unwrap();
/// assert_eq!(db.parent().unwrap().name(), "app");
/// assert_eq!(app.parent().unwrap().name(), "root");
/// ```
#[derive(Clone)]
pub struct Repository {
    inner: Arc<Inner>,
}

struct Inner {
    levels: Arc<LevelTable>,
    trap: Arc<dyn Trap>,
    root: Arc<Logger>,
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
    appenders: Arc<AppenderRegistry>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("levels", &self.inner.levels.snapshot().names())
            .field("loggers", &self.inner.loggers.read().len())
            .field("appenders", &self.inner.appenders.read().len())
            .finish()
    }
}

impl Default for Repository {
    fn default() -> Self {
        Repository::new()
    }
}

impl Repository {
    /// Create a repository with the default levels, a root logger at `"all"` and
    /// [`DefaultTrap`].
    pub fn new() -> Self {
        Repository::with_parts(Arc::new(LevelTable::default()), Arc::new(DefaultTrap::default()))
    }

    /// Create a builder to configure a repository.
    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::default()
    }

    fn with_parts(levels: Arc<LevelTable>, trap: Arc<dyn Trap>) -> Self {
        let root = Arc::new(Logger::new(ROOT, levels.clone(), trap.clone(), None));
        Repository {
            inner: Arc::new(Inner {
                levels,
                trap,
                root,
                loggers: RwLock::new(HashMap::new()),
                appenders: Arc::new(RwLock::new(HashMap::new())),
            }),
        }
    }

    /// The root logger.
    pub fn root(&self) -> Arc<Logger> {
        self.inner.root.clone()
    }

    /// Return the logger named `name`, creating it on first use.
    ///
    /// Segments are separated by `::`, e.g. `"app::db::pool"`. The name `"root"` returns the
    /// root logger. Concurrent first calls with the same name all get the same logger.
    ///
    /// # Errors
    ///
    /// Return a usage error if the name is empty or has an empty segment.
    pub fn logger(&self, name: impl AsRef<str>) -> Result<Arc<Logger>, Error> {
        let name = name.as_ref();
        if name == ROOT {
            return Ok(self.root());
        }
        validate_name(name)?;

        if let Some(logger) = self.inner.loggers.read().get(name) {
            return Ok(logger.clone());
        }

        let mut loggers = self.inner.loggers.write();
        if let Some(logger) = loggers.get(name) {
            return Ok(logger.clone());
        }

        let parent = closest_ancestor(&loggers, name).unwrap_or_else(|| self.root());
        let logger = Arc::new(Logger::new(
            name,
            self.inner.levels.clone(),
            self.inner.trap.clone(),
            Some(parent),
        ));

        // re-thread descendants whose parent sits above the new logger
        let prefix = format!("{name}{SEPARATOR}");
        for existing in loggers.values() {
            if !existing.name().starts_with(&prefix) {
                continue;
            }
            let rethread = existing
                .parent()
                .is_none_or(|p| p.is_root() || !p.name().starts_with(&prefix));
            if rethread {
                existing.set_parent(logger.clone());
            }
        }

        loggers.insert(name.to_string(), logger.clone());
        self.inner.levels.invalidate();
        Ok(logger)
    }

    /// Return the logger for type `T`, named after its path, e.g. `"my_crate::db::Pool"`.
    ///
    /// Generic arguments are not part of the name.
    pub fn logger_for<T: ?Sized>(&self) -> Result<Arc<Logger>, Error> {
        self.logger(type_logger_name::<T>())
    }

    /// Return the logger for the type of `value`. See [`Repository::logger_for`].
    pub fn logger_of<T: ?Sized>(&self, _value: &T) -> Result<Arc<Logger>, Error> {
        self.logger_for::<T>()
    }

    /// Return the logger named `name` if it exists, without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        if name == ROOT {
            return Some(self.root());
        }
        self.inner.loggers.read().get(name).cloned()
    }

    /// Whether a logger named `name` exists.
    pub fn has_logger(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All loggers, root first, then by name.
    pub fn loggers(&self) -> Vec<Arc<Logger>> {
        let mut loggers = self
            .inner
            .loggers
            .read()
            .values()
            .cloned()
            .collect::<Vec<_>>();
        loggers.push(self.root());
        loggers.sort();
        loggers
    }

    /// The closest registered ancestor of `name`, or the root logger.
    ///
    /// The root logger has no parent.
    pub fn parent_of(&self, name: &str) -> Option<Arc<Logger>> {
        if name == ROOT {
            return None;
        }
        let loggers = self.inner.loggers.read();
        Some(closest_ancestor(&loggers, name).unwrap_or_else(|| self.root()))
    }

    /// The registered loggers whose parent is exactly the logger named `name`, sorted by name.
    pub fn children_of(&self, name: &str) -> Vec<Arc<Logger>> {
        let Some(parent) = self.get(name) else {
            return vec![];
        };
        let mut children = self
            .inner
            .loggers
            .read()
            .values()
            .filter(|logger| {
                logger
                    .parent()
                    .is_some_and(|p| Arc::ptr_eq(&p, &parent))
            })
            .cloned()
            .collect::<Vec<_>>();
        children.sort();
        children
    }

    /// The level table shared by every logger and appender of this repository.
    pub fn level_table(&self) -> Arc<LevelTable> {
        self.inner.levels.clone()
    }

    /// Replace the level names. See [`LevelTable::define`].
    ///
    /// Levels already set on loggers and appenders keep their ordinals.
    pub fn define_levels<I, S>(&self, names: I) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.levels.define(names)
    }

    /// The trap receiving errors that are not returned to callers.
    pub fn trap(&self) -> Arc<dyn Trap> {
        self.inner.trap.clone()
    }

    pub(crate) fn appender_registry(&self) -> &Arc<AppenderRegistry> {
        &self.inner.appenders
    }

    pub(crate) fn register_appender(&self, appender: Arc<dyn Append>) {
        let name = appender.name().to_string();
        let replaced = self.inner.appenders.write().insert(name, appender);
        drop(replaced);
    }

    /// Look up a registered appender by name.
    pub fn appender(&self, name: &str) -> Option<Arc<dyn Append>> {
        self.inner.appenders.read().get(name).cloned()
    }

    /// Forget the appender registered under `name`, without closing it.
    pub fn remove_appender(&self, name: &str) -> Option<Arc<dyn Append>> {
        self.inner.appenders.write().remove(name)
    }

    /// All registered appenders, sorted by name.
    pub fn appenders(&self) -> Vec<Arc<dyn Append>> {
        let mut appenders = self
            .inner
            .appenders
            .read()
            .values()
            .cloned()
            .collect::<Vec<_>>();
        appenders.sort_by(|a, b| a.name().cmp(b.name()));
        appenders
    }

    /// Flush every registered appender.
    pub fn flush_all(&self) {
        for appender in self.appenders() {
            if let Err(err) = appender.flush() {
                self.inner.trap.trap(&err);
            }
        }
    }

    /// Close every registered appender, drop every logger except the root, and restore the root
    /// logger to its defaults.
    ///
    /// Loggers handed out earlier keep working but are detached from the hierarchy.
    pub fn reset(&self) {
        for appender in self.appenders() {
            if let Err(err) = appender.close(true) {
                self.inner.trap.trap(&err);
            }
        }
        let appenders = std::mem::take(&mut *self.inner.appenders.write());
        drop(appenders);

        let loggers = std::mem::take(&mut *self.inner.loggers.write());
        for logger in loggers.values() {
            logger.clear_appenders();
        }
        drop(loggers);

        self.inner.root.reset();
        self.inner.levels.invalidate();
    }
}

/// A builder to configure a [`Repository`].
///
/// # Examples
///
/// ```
/// use logtree::Repository;
///
/// let repo = Repository::builder()
///     .levels(["trace", "debug", "info", "warn", "error"])
///     .root_level("info")
///     .build()
///     .unwrap();
/// assert!(!repo.root().is_debug_enabled());
/// ```
#[derive(Debug, Default)]
pub struct RepositoryBuilder {
    levels: Option<Vec<String>>,
    root_level: Option<LevelSpec>,
    root_level_env: Option<String>,
    trap: Option<Arc<dyn Trap>>,
}

impl RepositoryBuilder {
    /// Set the level names, least severe first.
    ///
    /// Default to [`DEFAULT_LEVELS`](crate::level::DEFAULT_LEVELS).
    #[must_use]
    pub fn levels<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.levels = Some(names.into_iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    /// Set the level of the root logger.
    ///
    /// Default to `"all"`.
    #[must_use]
    pub fn root_level(mut self, level: impl Into<LevelSpec>) -> Self {
        self.root_level = Some(level.into());
        self
    }

    /// Read the root level from the environment variable `var` at build time, if it is set.
    ///
    /// Takes precedence over [`RepositoryBuilder::root_level`].
    #[must_use]
    pub fn root_level_from_env(mut self, var: impl Into<String>) -> Self {
        self.root_level_env = Some(var.into());
        self
    }

    /// Set the trap receiving errors that are not returned to callers.
    ///
    /// Default to [`DefaultTrap`]. Appenders built against the repository, and their sinks'
    /// rotation failures, report to this trap.
    #[must_use]
    pub fn trap(mut self, trap: impl Trap) -> Self {
        self.trap = Some(Arc::new(trap));
        self
    }

    /// Build the repository.
    ///
    /// # Errors
    ///
    /// Return a configuration error if the level names are empty or the root level is unknown.
    pub fn build(self) -> Result<Repository, Error> {
        let RepositoryBuilder {
            levels,
            root_level,
            root_level_env,
            trap,
        } = self;

        let levels = match levels {
            Some(names) => LevelTable::new(names)?,
            None => LevelTable::default(),
        };
        let trap = trap.unwrap_or_else(|| Arc::new(DefaultTrap::default()));
        let repo = Repository::with_parts(Arc::new(levels), trap);

        let from_env = root_level_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|value| !value.trim().is_empty())
            .map(LevelSpec::from);
        if let Some(level) = from_env.or(root_level) {
            repo.root().set_level(level)?;
        }
        Ok(repo)
    }
}

/// The process wide repository, created on first use.
pub fn default_repository() -> &'static Repository {
    static DEFAULT: OnceLock<Repository> = OnceLock::new();
    DEFAULT.get_or_init(Repository::new)
}

/// Return a logger from the [`default_repository`].
pub fn logger(name: impl AsRef<str>) -> Result<Arc<Logger>, Error> {
    default_repository().logger(name)
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::usage("logger name must not be empty"));
    }
    if name.split(SEPARATOR).any(|segment| segment.trim().is_empty()) {
        return Err(Error::usage("logger name has an empty segment").with_context("name", name));
    }
    Ok(())
}

// walks `a::b::c` -> `a::b` -> `a`
fn closest_ancestor(loggers: &HashMap<String, Arc<Logger>>, name: &str) -> Option<Arc<Logger>> {
    let mut current = name;
    while let Some(pos) = current.rfind(SEPARATOR) {
        current = &current[..pos];
        if let Some(logger) = loggers.get(current) {
            return Some(logger.clone());
        }
    }
    None
}

fn type_logger_name<T: ?Sized>() -> &'static str {
    let name = type_name::<T>();
    match name.find('<') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::trap::CollectTrap;

    struct Widget;

    #[test]
    fn test_parent_is_closest_existing_ancestor() {
        let repo = Repository::new();
        let leaf = repo.logger("a::b::c").unwrap();
        assert!(leaf.parent().unwrap().is_root());

        let a = repo.logger("a").unwrap();
        assert!(Arc::ptr_eq(&leaf.parent().unwrap(), &a));
        assert!(a.parent().unwrap().is_root());

        let b = repo.logger("a::b").unwrap();
        assert!(Arc::ptr_eq(&leaf.parent().unwrap(), &b));
        assert!(Arc::ptr_eq(&b.parent().unwrap(), &a));
    }

    #[test]
    fn test_rethreading_keeps_closer_parents() {
        let repo = Repository::new();
        let deep = repo.logger("x::y::z").unwrap();
        let mid = repo.logger("x::y").unwrap();
        assert!(Arc::ptr_eq(&deep.parent().unwrap(), &mid));

        // `x` is further away from `x::y::z` than `x::y`
        let top = repo.logger("x").unwrap();
        assert!(Arc::ptr_eq(&deep.parent().unwrap(), &mid));
        assert!(Arc::ptr_eq(&mid.parent().unwrap(), &top));

        // siblings sharing a prefix are not descendants
        let other = repo.logger("xy").unwrap();
        assert!(other.parent().unwrap().is_root());
    }

    #[test]
    fn test_rethreading_refreshes_inherited_level() {
        let repo = Repository::new();
        let leaf = repo.logger("svc::api").unwrap();
        assert!(leaf.is_debug_enabled());

        let svc = repo.logger("svc").unwrap();
        svc.set_level("error").unwrap();
        assert!(!leaf.is_warn_enabled());
        assert!(leaf.is_error_enabled());
    }

    #[test]
    fn test_same_logger_for_same_name() {
        let repo = Repository::new();
        let a = repo.logger("same").unwrap();
        let b = repo.logger(String::from("same")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&repo.logger("root").unwrap(), &repo.root()));
    }

    #[test]
    fn test_malformed_names() {
        let repo = Repository::new();
        for name in ["", "a::", "::a", "a::::b", "a:: ::b"] {
            let err = repo.logger(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Usage, "{name:?}");
        }
    }

    #[test]
    fn test_children_and_parent_of() {
        let repo = Repository::new();
        repo.logger("p::c1").unwrap();
        repo.logger("p::c2::g").unwrap();
        repo.logger("q").unwrap();

        let names = |loggers: Vec<Arc<Logger>>| {
            loggers
                .iter()
                .map(|l| l.name().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(repo.children_of("root")), ["p::c1", "p::c2::g", "q"]);

        repo.logger("p").unwrap();
        assert_eq!(names(repo.children_of("root")), ["p", "q"]);
        assert_eq!(names(repo.children_of("p")), ["p::c1", "p::c2::g"]);
        assert!(repo.children_of("missing").is_empty());

        assert_eq!(repo.parent_of("p::c2::g::h").unwrap().name(), "p::c2::g");
        // p::c2 was never created
        assert_eq!(repo.parent_of("p::c2::x").unwrap().name(), "p");
        assert_eq!(repo.parent_of("zzz").unwrap().name(), "root");
        assert!(repo.parent_of("root").is_none());
        assert!(!repo.has_logger("p::c2"));
    }

    #[test]
    fn test_trap_can_be_shared() {
        let trap = CollectTrap::default();
        let first = Repository::builder().trap(trap.clone()).build().unwrap();
        let second = Repository::builder().trap(first.trap()).build().unwrap();

        second.trap().trap(&Error::io("disk full"));
        assert_eq!(trap.kinds(), [ErrorKind::Io]);
    }

    #[test]
    fn test_logger_for_type() {
        let repo = Repository::new();
        let logger = repo.logger_for::<Widget>().unwrap();
        assert_eq!(logger.name(), "logtree::repository::tests::Widget");
        assert!(Arc::ptr_eq(&repo.logger_of(&Widget).unwrap(), &logger));

        let logger = repo.logger_for::<Vec<u8>>().unwrap();
        assert_eq!(logger.name(), "alloc::vec::Vec");
    }

    #[test]
    fn test_builder() {
        let repo = Repository::builder()
            .levels(["low", "mid", "high"])
            .root_level("mid")
            .build()
            .unwrap();
        let root = repo.root();
        assert!(!root.is_enabled(0));
        assert!(root.is_enabled(2));
        // the named methods only exist for the default level names
        assert!(!root.warn("nobody listens"));

        let err = Repository::builder().root_level("loud").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = Repository::builder().levels(["off"]).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_define_levels_invalidates_loggers() {
        let repo = Repository::new();
        let logger = repo.logger("app").unwrap();
        logger.set_level("info").unwrap();
        assert!(logger.is_warn_enabled());

        repo.define_levels(["info", "notice", "alert"]).unwrap();
        // ordinal 1 now means `notice`; `warn` no longer exists
        assert!(!logger.is_warn_enabled());
        assert!(!logger.is_info_enabled());
        assert!(logger.is_enabled(2));
    }
}
