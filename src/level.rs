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

//! The level table: an ordered mapping between level names and numeric severities.
//!
//! Ordinals are dense, starting at `0` for the least severe level. Two sentinels exist on top of
//! the configured names: `"all"` resolves to `0` and `"off"` resolves to the number of levels,
//! one past the most severe level, so no event is ever emitted at `"off"`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use arc_swap::ArcSwap;

use crate::Error;
use crate::ErrorKind;

/// The level names used when none are configured.
pub const DEFAULT_LEVELS: [&str; 5] = ["debug", "info", "warn", "error", "fatal"];

/// Name of the sentinel below every level.
pub const ALL: &str = "all";

/// Name of the sentinel above every level.
pub const OFF: &str = "off";

// Ordinals and epochs are packed into one atomic word by loggers.
pub(crate) const MAX_LEVELS: usize = 0xFFFE;

/// An immutable snapshot of the configured levels.
#[derive(Debug, Clone)]
pub struct Levels {
    names: Vec<String>,
    display: Vec<String>,
    index: HashMap<String, usize>,
    max_name_len: usize,
    // ordinals of DEFAULT_LEVELS in this table, for the named logger methods
    well_known: [Option<usize>; DEFAULT_LEVELS.len()],
}

impl Levels {
    fn new(names: Vec<String>) -> Self {
        let display: Vec<String> = names.iter().map(|n| n.to_uppercase()).collect();
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let max_name_len = display
            .iter()
            .map(|n| n.chars().count())
            .max()
            .unwrap_or(0);
        let well_known = DEFAULT_LEVELS.map(|name| index.get(name).copied());
        Levels {
            names,
            display,
            index,
            max_name_len,
            well_known,
        }
    }

    /// Number of configured levels; also the ordinal of `"off"`.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: an empty table cannot be defined.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The canonical (lower case) names, in severity order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Look up the ordinal of a level name, including the `"all"` and `"off"` sentinels.
    pub fn number(&self, name: &str) -> Option<usize> {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            ALL => Some(0),
            OFF => Some(self.len()),
            name => self.index.get(name).copied(),
        }
    }

    /// The canonical name of an ordinal, or `None` if it is out of range.
    pub fn name(&self, ordinal: usize) -> Option<&str> {
        self.names.get(ordinal).map(String::as_str)
    }

    /// The upper case display name of an ordinal; `"OFF"` for anything past the last level.
    pub fn display_name(&self, ordinal: usize) -> &str {
        self.display.get(ordinal).map_or("OFF", String::as_str)
    }

    /// Length of the longest display name, used by layouts to align columns.
    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Ordinal of the `idx`-th entry of [`DEFAULT_LEVELS`], if this table defines it.
    pub(crate) fn well_known(&self, idx: usize) -> Option<usize> {
        self.well_known.get(idx).copied().flatten()
    }

    /// Resolve user input to an ordinal.
    ///
    /// Names are case insensitive. Numbers pass through unchecked. [`LevelSpec::Inherit`] has no
    /// ordinal and is reported as an unknown level.
    pub fn level_number(&self, spec: &LevelSpec) -> Result<usize, Error> {
        match spec {
            LevelSpec::Number(n) => Ok(*n),
            LevelSpec::Name(name) => self.number(name).ok_or_else(|| {
                Error::new(ErrorKind::UnknownLevel, "unknown level name")
                    .with_context("level", name)
                    .with_context("known", self.names.join(", "))
            }),
            LevelSpec::Inherit => Err(Error::new(
                ErrorKind::UnknownLevel,
                "an inherited level has no ordinal",
            )),
        }
    }
}

/// A level as written by a user: a name, a raw ordinal, or nothing at all.
///
/// `Inherit` is only meaningful for loggers, where it means "use the parent's level".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelSpec {
    /// A level name such as `"warn"`, `"all"` or `"off"`.
    Name(Cow<'static, str>),
    /// A raw ordinal.
    Number(usize),
    /// Inherit from the parent logger.
    Inherit,
}

impl From<&'static str> for LevelSpec {
    fn from(name: &'static str) -> Self {
        LevelSpec::Name(Cow::Borrowed(name))
    }
}

impl From<String> for LevelSpec {
    fn from(name: String) -> Self {
        LevelSpec::Name(Cow::Owned(name))
    }
}

impl From<usize> for LevelSpec {
    fn from(n: usize) -> Self {
        LevelSpec::Number(n)
    }
}

impl<T: Into<LevelSpec>> From<Option<T>> for LevelSpec {
    fn from(value: Option<T>) -> Self {
        value.map_or(LevelSpec::Inherit, Into::into)
    }
}

/// The level table shared by every logger, appender and layout of one repository.
///
/// Redefining the table swaps the snapshot and bumps the epoch, which invalidates the effective
/// level every logger has cached.
#[derive(Debug)]
pub struct LevelTable {
    current: ArcSwap<Levels>,
    epoch: AtomicU64,
}

impl Default for LevelTable {
    fn default() -> Self {
        LevelTable {
            current: ArcSwap::from_pointee(Levels::new(
                DEFAULT_LEVELS.iter().map(|s| s.to_string()).collect(),
            )),
            epoch: AtomicU64::new(1),
        }
    }
}

impl LevelTable {
    /// Create a table from the given names.
    pub fn new<I, S>(names: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = LevelTable::default();
        table.define(names)?;
        Ok(table)
    }

    /// Replace the level names.
    ///
    /// Names are lower-cased and de-duplicated keeping the first occurrence; `"all"` and `"off"`
    /// are dropped. Returns the canonical names.
    ///
    /// # Errors
    ///
    /// Return a configuration error if no names remain, or if too many names are given.
    pub fn define<I, S>(&self, names: I) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut canonical: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() || name == ALL || name == OFF || canonical.contains(&name) {
                continue;
            }
            canonical.push(name);
        }

        if canonical.is_empty() {
            return Err(Error::config("no level names to define"));
        }
        if canonical.len() > MAX_LEVELS {
            return Err(Error::config("too many levels").with_context("count", canonical.len()));
        }

        self.current.store(Arc::new(Levels::new(canonical.clone())));
        self.invalidate();
        Ok(canonical)
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Levels> {
        self.current.load_full()
    }

    /// Number of configured levels; also the ordinal of `"off"`.
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Always false: an empty table cannot be defined.
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// See [`Levels::level_number`].
    pub fn level_number(&self, spec: impl Into<LevelSpec>) -> Result<usize, Error> {
        self.current.load().level_number(&spec.into())
    }

    /// See [`Levels::max_name_len`].
    pub fn max_name_len(&self) -> usize {
        self.current.load().max_name_len()
    }

    pub(crate) fn well_known(&self, idx: usize) -> Option<usize> {
        self.current.load().well_known(idx)
    }

    /// Resolve a threshold for an appender or logger: `0..=len`, where `len` means "off".
    pub(crate) fn threshold(&self, spec: &LevelSpec) -> Result<usize, Error> {
        let levels = self.current.load();
        let n = levels
            .level_number(spec)
            .map_err(|err| Error::config("invalid level").with_source(err))?;
        if n > levels.len() {
            return Err(Error::config("level out of range")
                .with_context("level", n)
                .with_context("max", levels.len()));
        }
        Ok(n)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub(crate) fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}
