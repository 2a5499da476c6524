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

use crate::Error;
use crate::event::LogEvent;
use crate::layout::Layout;

type FormatFunction = dyn Fn(&LogEvent) -> Result<String, Error> + Send + Sync + 'static;

/// A layout that you can pass the custom layout function.
///
/// # Examples
///
/// ```
/// use logtree::layout::CustomLayout;
///
/// let layout = CustomLayout::new(|event| {
///     Ok(format!("[{}] {}\n", event.level_name(), event.logger()))
/// })
/// .with_header("--- start ---\n")
/// .with_footer("--- end ---\n");
/// ```
pub struct CustomLayout {
    f: Box<FormatFunction>,
    header: String,
    footer: String,
}

impl fmt::Debug for CustomLayout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CustomLayout {{ ... }}")
    }
}

impl CustomLayout {
    /// Create a layout from a closure.
    pub fn new(
        layout: impl Fn(&LogEvent) -> Result<String, Error> + Send + Sync + 'static,
    ) -> Self {
        CustomLayout {
            f: Box::new(layout),
            header: String::new(),
            footer: String::new(),
        }
    }

    /// Set the text written when an appender opens.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Set the text written when an appender closes.
    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }
}

impl Layout for CustomLayout {
    fn format(&self, event: &LogEvent) -> Result<String, Error> {
        (self.f)(event)
    }

    fn header(&self) -> String {
        self.header.clone()
    }

    fn footer(&self) -> String {
        self.footer.clone()
    }
}
