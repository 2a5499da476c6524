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

//! Log events: the immutable value built once per enabled log call.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::Error;
use crate::level::Levels;

/// An immutable record of one logging call.
///
/// Appenders and layouts only ever see `&LogEvent`; the same event is shared by every appender
/// along the additive ancestor chain.
#[derive(Debug, Clone)]
pub struct LogEvent {
    logger: Arc<str>,
    level: usize,
    levels: Arc<Levels>,
    payload: Vec<Payload>,
    location: Option<Location>,
    time: SystemTime,
}

impl LogEvent {
    /// Create a new event stamped with the current time.
    pub fn new(
        logger: impl Into<Arc<str>>,
        level: usize,
        levels: Arc<Levels>,
        payload: Vec<Payload>,
        location: Option<Location>,
    ) -> Self {
        LogEvent {
            logger: logger.into(),
            level,
            levels,
            payload,
            location,
            time: SystemTime::now(),
        }
    }

    /// The name of the logger the call was made on.
    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// The level ordinal.
    pub fn level(&self) -> usize {
        self.level
    }

    /// The upper case level name, e.g. `"WARN"`.
    pub fn level_name(&self) -> &str {
        self.levels.display_name(self.level)
    }

    /// The level table the event was created against.
    pub fn levels(&self) -> &Levels {
        &self.levels
    }

    /// The payload objects, in call order.
    pub fn payload(&self) -> &[Payload] {
        &self.payload
    }

    /// The call site, present only when the logger has tracing enabled.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// The time the event was created.
    pub fn time(&self) -> SystemTime {
        self.time
    }

    /// The creation time as a [`jiff::Timestamp`].
    pub fn timestamp(&self) -> jiff::Timestamp {
        jiff::Timestamp::try_from(self.time).unwrap_or(jiff::Timestamp::UNIX_EPOCH)
    }
}

/// A call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    file: &'static str,
    line: u32,
    column: u32,
    module: Option<&'static str>,
}

impl Location {
    /// Create a call site from its parts, as the logging macros do.
    pub const fn new(
        file: &'static str,
        line: u32,
        column: u32,
        module: Option<&'static str>,
    ) -> Self {
        Location {
            file,
            line,
            column,
            module,
        }
    }

    /// Capture the location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = std::panic::Location::caller();
        Location::new(loc.file(), loc.line(), loc.column(), None)
    }

    /// Source file path.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// Line number, starting at 1.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Column number, starting at 1.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// The enclosing module path when known (captured by the logging macros).
    pub fn module(&self) -> Option<&'static str> {
        self.module
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)?;
        if let Some(module) = self.module {
            write!(f, ":in `{module}'")?;
        }
        Ok(())
    }
}

/// One application supplied object carried by a [`LogEvent`].
#[derive(Clone)]
pub enum Payload {
    /// Plain text, passed through layouts unchanged.
    Message(Cow<'static, str>),
    /// An error with its chain of causes.
    Error(ErrorPayload),
    /// Any other value; layouts choose how to render it.
    Object(Arc<dyn LogObject>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Message(msg) => f.debug_tuple("Message").field(msg).finish(),
            Payload::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Payload::Object(obj) => f
                .debug_tuple("Object")
                .field(&obj.type_name())
                .field(&obj.to_inspect())
                .finish(),
        }
    }
}

impl Payload {
    /// Wrap an error, capturing its type name and its `source()` chain.
    ///
    /// Trait objects such as `&dyn Error` are accepted; their type name is the trait's.
    pub fn error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized + 'static,
    {
        Payload::Error(ErrorPayload::new(err))
    }

    /// Wrap an arbitrary value rendered through [`Display`](fmt::Display) or
    /// [`Debug`](fmt::Debug).
    pub fn object<T>(value: T) -> Self
    where
        T: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Payload::Object(Arc::new(DisplayObject(value)))
    }

    /// Wrap a value that can also be rendered as JSON.
    #[cfg(feature = "json")]
    pub fn json<T>(value: T) -> Self
    where
        T: serde::Serialize + fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Payload::Object(Arc::new(JsonObject(value)))
    }
}

impl From<&'static str> for Payload {
    fn from(msg: &'static str) -> Self {
        Payload::Message(Cow::Borrowed(msg))
    }
}

impl From<String> for Payload {
    fn from(msg: String) -> Self {
        Payload::Message(Cow::Owned(msg))
    }
}

impl From<Cow<'static, str>> for Payload {
    fn from(msg: Cow<'static, str>) -> Self {
        Payload::Message(msg)
    }
}

impl From<fmt::Arguments<'_>> for Payload {
    fn from(args: fmt::Arguments<'_>) -> Self {
        match args.as_str() {
            Some(msg) => Payload::Message(Cow::Borrowed(msg)),
            None => Payload::Message(Cow::Owned(args.to_string())),
        }
    }
}

impl From<&Error> for Payload {
    fn from(err: &Error) -> Self {
        Payload::error(err)
    }
}

impl From<ErrorPayload> for Payload {
    fn from(err: ErrorPayload) -> Self {
        Payload::Error(err)
    }
}

/// An error captured into a log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    type_name: &'static str,
    message: String,
    causes: Vec<String>,
}

impl ErrorPayload {
    /// Capture `err`.
    pub fn new<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized + 'static,
    {
        let mut causes = vec![];
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        ErrorPayload {
            type_name: short_type_name(type_name::<E>()),
            message: err.to_string(),
            causes,
        }
    }

    /// The short type name of the error, e.g. `Error` for `std::io::Error`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The error's own message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Messages of the `source()` chain, outermost first.
    pub fn causes(&self) -> &[String] {
        &self.causes
    }
}

/// A value that layouts can render in several ways.
pub trait LogObject: Send + Sync + 'static {
    /// The short type name of the value.
    fn type_name(&self) -> &'static str;

    /// Plain rendering.
    fn to_display(&self) -> String;

    /// Debug rendering.
    fn to_inspect(&self) -> String;

    /// Structured rendering; `None` if the value has no structured form.
    fn to_json(&self) -> Option<Result<String, Error>> {
        None
    }
}

struct DisplayObject<T>(T);

impl<T> LogObject for DisplayObject<T>
where
    T: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        short_type_name(type_name::<T>())
    }

    fn to_display(&self) -> String {
        self.0.to_string()
    }

    fn to_inspect(&self) -> String {
        format!("{:?}", self.0)
    }
}

#[cfg(feature = "json")]
struct JsonObject<T>(T);

#[cfg(feature = "json")]
impl<T> LogObject for JsonObject<T>
where
    T: serde::Serialize + fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        short_type_name(type_name::<T>())
    }

    fn to_display(&self) -> String {
        self.0.to_string()
    }

    fn to_inspect(&self) -> String {
        format!("{:?}", self.0)
    }

    fn to_json(&self) -> Option<Result<String, Error>> {
        Some(serde_json::to_string(&self.0).map_err(|err| {
            Error::config("failed to serialize payload object").with_source(err)
        }))
    }
}

// `alloc::vec::Vec<i32>` -> `Vec<i32>`; generic arguments keep their full path.
fn short_type_name(name: &'static str) -> &'static str {
    // `dyn core::error::Error + core::marker::Send` -> `core::error::Error`
    let name = match name.strip_prefix("dyn ") {
        Some(rest) => rest.split_once(" + ").map_or(rest, |(head, _)| head),
        None => name,
    };
    let head = match name.find('<') {
        Some(pos) => &name[..pos],
        None => name,
    };
    match head.rfind("::") {
        Some(pos) => &name[pos + 2..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[derive(Debug)]
    struct Outer(io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "outer failure")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_payload_captures_causes() {
        let err = Outer(io::Error::other("disk on fire"));
        let payload = ErrorPayload::new(&err);
        assert_eq!(payload.type_name(), "Outer");
        assert_eq!(payload.message(), "outer failure");
        assert_eq!(payload.causes(), ["disk on fire"]);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("alloc::vec::Vec<i32>"), "Vec<i32>");
        assert_eq!(short_type_name("u8"), "u8");
        assert_eq!(
            short_type_name("dyn core::error::Error + core::marker::Send + core::marker::Sync"),
            "Error"
        );
    }

    #[test]
    fn test_boxed_error_payload() {
        let boxed: Box<dyn std::error::Error + Send + Sync> =
            Box::new(Outer(io::Error::other("disk on fire")));
        let Payload::Error(payload) = Payload::error(boxed.as_ref()) else {
            panic!("expected an error payload");
        };
        assert_eq!(payload.type_name(), "Error");
        assert_eq!(payload.message(), "outer failure");
        assert_eq!(payload.causes(), ["disk on fire"]);

        let borrowed: &(dyn std::error::Error + 'static) = &io::Error::other("gone");
        let payload = ErrorPayload::new(borrowed);
        assert_eq!(payload.message(), "gone");
        assert!(payload.causes().is_empty());
    }

    #[test]
    fn test_location_caller() {
        let loc = Location::caller();
        assert_eq!(loc.file(), file!());
        assert_eq!(loc.line(), line!() - 2);
        assert_eq!(loc.module(), None);
    }
}
