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

//! Layouts for formatting log events.

use std::fmt;
use std::sync::Arc;

use crate::Error;
use crate::event::LogEvent;

mod basic;
mod custom;
mod object;

pub use self::basic::BasicLayout;
pub use self::custom::CustomLayout;
pub use self::object::ObjectFormat;
pub use self::object::ObjectFormatter;

/// A layout for formatting log events.
///
/// A single layout may be shared by many appenders and invoked concurrently, so implementations
/// must not keep per-call mutable state.
pub trait Layout: fmt::Debug + Send + Sync + 'static {
    /// Formats a log event into destination ready text, including any trailing newline.
    fn format(&self, event: &LogEvent) -> Result<String, Error>;

    /// Text written once when an appender opens.
    ///
    /// Default to an empty string.
    fn header(&self) -> String {
        String::new()
    }

    /// Text written once when an appender closes.
    ///
    /// Default to an empty string.
    fn footer(&self) -> String {
        String::new()
    }
}

impl<T: Layout> From<T> for Box<dyn Layout> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// Lets one layout be shared by several appenders.
impl Layout for Arc<dyn Layout> {
    fn format(&self, event: &LogEvent) -> Result<String, Error> {
        (**self).format(event)
    }

    fn header(&self) -> String {
        (**self).header()
    }

    fn footer(&self) -> String {
        (**self).footer()
    }
}
