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

use std::sync::Arc;

use crate::Logger;
use crate::Repository;
use crate::event::Location;
use crate::event::Payload;

/// Forward records of the `log` crate to the loggers of a [`Repository`].
///
/// The record target picks the logger, so `log::info!(target: "app::db", ...)` goes to the
/// `app::db` logger, and records without an explicit target go to the logger named after their
/// module path. The level is matched by name; `trace` falls back to `debug` when the table has
/// no `trace` level, and records with other unknown levels are dropped.
#[derive(Debug, Clone)]
pub struct LogBridge {
    repo: Repository,
}

impl LogBridge {
    /// Create a bridge feeding `repo`.
    pub fn new(repo: Repository) -> Self {
        LogBridge { repo }
    }

    /// The repository records are forwarded to.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn logger(&self, target: &str) -> Arc<Logger> {
        match self.repo.logger(target) {
            Ok(logger) => logger,
            Err(_) => self.repo.root(),
        }
    }

    fn level(&self, level: log::Level) -> Option<usize> {
        let levels = self.repo.level_table().snapshot();
        let name = level.as_str().to_lowercase();
        levels.number(&name).or_else(|| match level {
            log::Level::Trace => levels.number("debug"),
            _ => None,
        })
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        match self.level(metadata.level()) {
            Some(level) => self.logger(metadata.target()).is_enabled(level),
            None => false,
        }
    }

    fn log(&self, record: &log::Record) {
        let Some(level) = self.level(record.level()) else {
            return;
        };
        let logger = self.logger(record.target());
        if !logger.is_enabled(level) {
            return;
        }

        let location = Location::new(
            record.file_static().unwrap_or("<unknown>"),
            record.line().unwrap_or(0),
            0,
            record.module_path_static(),
        );
        logger.__log_at(level, vec![Payload::from(*record.args())], location);
    }

    fn flush(&self) {
        self.repo.flush_all();
    }
}

/// Install a [`LogBridge`] for `repo` as the global logger of the `log` crate.
///
/// This function will set the global maximum log level to `Trace`. To override this, call
/// [`log::set_max_level`] after this function.
///
/// # Errors
///
/// Return an error if the log crate global logger has already been set.
pub fn try_setup_log_crate(repo: &Repository) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(LogBridge::new(repo.clone())))?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

/// Install a [`LogBridge`] for `repo` as the global logger of the `log` crate.
///
/// # Panics
///
/// Panic if the log crate global logger has already been set.
///
/// # Examples
///
/// ```
/// let repo = logtree::Repository::new();
/// logtree::bridge::setup_log_crate(&repo);
/// log::info!("hello from the log crate");
/// ```
pub fn setup_log_crate(repo: &Repository) {
    try_setup_log_crate(repo).expect(
        "logtree::bridge::setup_log_crate must be called before the log crate global logger initialized",
    )
}
