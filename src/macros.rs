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

/// Log a formatted message at a level ordinal, recording the call site.
///
/// The message is only formatted if the level is enabled. Evaluates to `true` when an event was
/// created.
///
/// # Examples
///
/// ```
/// let repo = logtree::Repository::new();
/// let logger = repo.logger("app").unwrap();
/// let level = logger.level_table().level_number("warn").unwrap();
/// logtree::log!(logger, level, "disk {}% full", 91);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger: &$crate::Logger = &$logger;
        let level: usize = $level;
        if logger.is_enabled(level) {
            logger.__log_at(
                level,
                ::std::vec![$crate::event::Payload::from(::std::format_args!($($arg)+))],
                $crate::event::Location::new(
                    ::std::file!(),
                    ::std::line!(),
                    ::std::column!(),
                    ::std::option::Option::Some(::std::module_path!()),
                ),
            )
        } else {
            false
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_well_known {
    ($idx:expr, $logger:expr, $($arg:tt)+) => {{
        let logger: &$crate::Logger = &$logger;
        match logger.__well_known($idx) {
            ::std::option::Option::Some(level) => $crate::log!(logger, level, $($arg)+),
            ::std::option::Option::None => false,
        }
    }};
}

/// Log a formatted message at the `debug` level.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => { $crate::__log_well_known!(0, $logger, $($arg)+) };
}

/// Log a formatted message at the `info` level.
///
/// # Examples
///
/// ```
/// let repo = logtree::Repository::new();
/// let logger = repo.logger("app").unwrap();
/// logtree::info!(logger, "started in {} ms", 12);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => { $crate::__log_well_known!(1, $logger, $($arg)+) };
}

/// Log a formatted message at the `warn` level.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => { $crate::__log_well_known!(2, $logger, $($arg)+) };
}

/// Log a formatted message at the `error` level.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => { $crate::__log_well_known!(3, $logger, $($arg)+) };
}

/// Log a formatted message at the `fatal` level.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => { $crate::__log_well_known!(4, $logger, $($arg)+) };
}
