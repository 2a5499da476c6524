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

use std::str::FromStr;

use crate::Error;
use crate::event::Payload;

/// How a layout renders payload objects that are neither text nor errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectFormat {
    /// Use [`Display`](std::fmt::Display).
    #[default]
    String,
    /// Use [`Debug`](std::fmt::Debug).
    Inspect,
    /// Serialize to JSON when the object supports it, falling back to `String`.
    Json,
}

impl FromStr for ObjectFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" => Ok(ObjectFormat::String),
            "inspect" => Ok(ObjectFormat::Inspect),
            "json" => Ok(ObjectFormat::Json),
            _ => Err(Error::config("unknown object format")
                .with_context("format", s)
                .with_context("expected", "string, inspect, json")),
        }
    }
}

/// Renders individual payload objects; shared by the built-in layouts.
///
/// * text passes through unchanged;
/// * errors render as `<Type> message`, followed by one tab-indented line per cause when
///   backtraces are on;
/// * any other object renders as `<Type> ` followed by the configured [`ObjectFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectFormatter {
    format: ObjectFormat,
    backtrace: bool,
}

impl Default for ObjectFormatter {
    fn default() -> Self {
        ObjectFormatter {
            format: ObjectFormat::String,
            backtrace: true,
        }
    }
}

impl ObjectFormatter {
    /// Create a formatter.
    pub fn new(format: ObjectFormat, backtrace: bool) -> Self {
        ObjectFormatter { format, backtrace }
    }

    /// The object format.
    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    /// Whether error causes are rendered.
    pub fn backtrace(&self) -> bool {
        self.backtrace
    }

    /// Render one payload object.
    pub fn format_payload(&self, payload: &Payload) -> String {
        match payload {
            Payload::Message(msg) => msg.to_string(),
            Payload::Error(err) => {
                let mut text = format!("<{}> {}", err.type_name(), err.message());
                if self.backtrace {
                    for cause in err.causes() {
                        text.push_str("\n\t");
                        text.push_str(cause);
                    }
                }
                text
            }
            Payload::Object(obj) => {
                let rendered = match self.format {
                    ObjectFormat::String => obj.to_display(),
                    ObjectFormat::Inspect => obj.to_inspect(),
                    ObjectFormat::Json => match obj.to_json() {
                        Some(Ok(json)) => json,
                        Some(Err(_)) | None => obj.to_display(),
                    },
                };
                format!("<{}> {rendered}", obj.type_name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::io;

    use super::*;
    use crate::ErrorKind;

    #[derive(Debug)]
    struct Chained {
        inner: io::Error,
    }

    impl fmt::Display for Chained {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "request failed")
        }
    }

    impl std::error::Error for Chained {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.inner)
        }
    }

    #[test]
    fn test_parse_object_format() {
        assert_eq!("JSON".parse::<ObjectFormat>().unwrap(), ObjectFormat::Json);
        assert_eq!(
            "inspect".parse::<ObjectFormat>().unwrap(),
            ObjectFormat::Inspect
        );
        let err = "yaml-ish".parse::<ObjectFormat>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_format_text_and_errors() {
        let f = ObjectFormatter::default();
        assert_eq!(f.format_payload(&Payload::from("plain")), "plain");

        let err = Chained {
            inner: io::Error::other("connection reset"),
        };
        assert_eq!(
            f.format_payload(&Payload::error(&err)),
            "<Chained> request failed\n\tconnection reset"
        );

        let f = ObjectFormatter::new(ObjectFormat::String, false);
        assert_eq!(
            f.format_payload(&Payload::error(&err)),
            "<Chained> request failed"
        );
    }

    #[test]
    fn test_format_objects() {
        let f = ObjectFormatter::new(ObjectFormat::Inspect, true);
        assert_eq!(
            f.format_payload(&Payload::object(Port(8080))),
            "<Port> Port(8080)"
        );
        let f = ObjectFormatter::new(ObjectFormat::String, true);
        assert_eq!(f.format_payload(&Payload::object(Port(8080))), "<Port> :8080");
        // objects without a structured form fall back to Display
        let f = ObjectFormatter::new(ObjectFormat::Json, true);
        assert_eq!(f.format_payload(&Payload::object(Port(8080))), "<Port> :8080");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_format_json_objects() {
        #[derive(Debug, serde::Serialize)]
        struct User {
            id: u32,
            name: &'static str,
        }

        impl fmt::Display for User {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "user#{}", self.id)
            }
        }

        let f = ObjectFormatter::new(ObjectFormat::Json, true);
        let payload = Payload::json(User { id: 7, name: "ann" });
        assert_eq!(f.format_payload(&payload), r#"<User> {"id":7,"name":"ann"}"#);
    }

    #[derive(Debug)]
    struct Port(u16);

    impl fmt::Display for Port {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, ":{}", self.0)
        }
    }
}
