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

//! A file sink that rotates by size or age.
//!
//! Given a live file `P` with extension `.ext`, rotated files are `P.1.ext, P.2.ext, ...` with
//! `1` the most recent; a path without extension gets a plain `P.1, P.2, ...` suffix.

mod clock;
mod rolling;
mod rotation;

pub use self::rolling::RollingFile;
pub use self::rolling::RollingFileBuilder;
pub use self::rotation::MaxAge;
