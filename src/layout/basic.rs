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

use std::fmt::Write;

use crate::Error;
use crate::event::LogEvent;
use crate::layout::Layout;
use crate::layout::ObjectFormat;
use crate::layout::ObjectFormatter;

/// A layout that writes one line per payload object.
///
/// Output format:
///
/// ```text
///  INFO - app::db - connected
/// ERROR - app::db - <Error> connection refused
/// ```
///
/// The level name is right aligned to the longest name in the level table.
///
/// # Examples
///
/// ```
/// use logtree::layout::BasicLayout;
/// use logtree::layout::ObjectFormat;
///
/// let layout = BasicLayout::default().object_format(ObjectFormat::Inspect);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BasicLayout {
    objects: ObjectFormatter,
}

impl BasicLayout {
    /// Set how non-text payload objects are rendered.
    ///
    /// Default to [`ObjectFormat::String`].
    #[must_use]
    pub fn object_format(mut self, format: ObjectFormat) -> Self {
        self.objects = ObjectFormatter::new(format, self.objects.backtrace());
        self
    }

    /// Set whether error causes are rendered.
    ///
    /// Default to `true`.
    #[must_use]
    pub fn backtrace(mut self, backtrace: bool) -> Self {
        self.objects = ObjectFormatter::new(self.objects.format(), backtrace);
        self
    }
}

impl Layout for BasicLayout {
    fn format(&self, event: &LogEvent) -> Result<String, Error> {
        let width = event.levels().max_name_len();
        let mut text = String::new();
        for payload in event.payload() {
            writeln!(
                &mut text,
                "{:>width$} - {} - {}",
                event.level_name(),
                event.logger(),
                self.objects.format_payload(payload),
            )
            .map_err(Error::from_fmt_error)?;
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::event::Payload;
    use crate::level::LevelTable;

    #[test]
    fn test_one_line_per_payload() {
        let levels = LevelTable::default().snapshot();
        let event = LogEvent::new(
            "app::db",
            1,
            Arc::clone(&levels),
            vec![Payload::from("connected"), Payload::object(42)],
            None,
        );
        let text = BasicLayout::default().format(&event).unwrap();
        assert_eq!(text, " INFO - app::db - connected\n INFO - app::db - <i32> 42\n");
    }

    #[test]
    fn test_alignment_follows_level_table() {
        let table = LevelTable::new(["trace", "verbose"]).unwrap();
        let event = LogEvent::new(
            "root",
            0,
            table.snapshot(),
            vec![Payload::from("x")],
            None,
        );
        let text = BasicLayout::default().format(&event).unwrap();
        assert_eq!(text, "  TRACE - root - x\n");
    }
}
