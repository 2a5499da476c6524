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

//! Logtree is a hierarchical logging framework: named loggers form a tree, events flow from a
//! logger to its appenders and, while additivity holds, on to every ancestor's appenders.
//!
//! # Overview
//!
//! A [`Repository`] owns the tree. Logger names use `::` as separator, so `app::db` is a child of
//! `app`, and every tree is rooted at the `root` logger. A logger without a level of its own
//! inherits the level of its closest ancestor.
//!
//! Levels are configurable. The defaults are `debug`, `info`, `warn`, `error` and `fatal`, plus
//! the sentinels `all` and `off`.
//!
//! Appenders write formatted events to a destination: standard output, a file, a rolling file,
//! any [`std::io::Write`], or an in-memory buffer. Each has its own level threshold and can
//! buffer events before writing them.
//!
//! # Examples
//!
//! ```
//! use logtree::Repository;
//! use logtree::append::Appender;
//! use logtree::append::StringIo;
//!
//! let repo = Repository::new();
//! let out = StringIo::default();
//! let appender = Appender::builder("memory", out.clone())
//!     .build(&repo)
//!     .unwrap();
//!
//! let root = repo.root();
//! root.add_appender(appender);
//! root.set_level("info").unwrap();
//!
//! let db = repo.logger("app::db").unwrap();
//! assert!(!db.debug("connecting"));
//! assert!(db.warn("slow query"));
//! assert_eq!(out.contents(), " WARN - app::db - slow query\n");
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod append;
#[cfg(feature = "bridge-log")]
pub mod bridge;
pub mod event;
pub mod layout;
pub mod level;
pub mod trap;

mod error;
mod logger;
mod macros;
mod repository;

pub use self::append::Append;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::event::LogEvent;
pub use self::event::Payload;
pub use self::layout::Layout;
pub use self::level::LevelSpec;
pub use self::logger::Logger;
pub use self::repository::ROOT;
pub use self::repository::Repository;
pub use self::repository::RepositoryBuilder;
pub use self::repository::SEPARATOR;
pub use self::repository::default_repository;
pub use self::repository::logger;
