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

//! Traps for processing errors that must not reach the caller of a logging call.

use std::fmt;
use std::sync::Arc;

use crate::Error;

mod collect;
mod default;

pub use self::collect::CollectTrap;
pub use self::default::DefaultTrap;

/// A trap for processing errors raised inside appenders and layouts.
///
/// A failing log destination never propagates to the application; the error is reported here
/// instead.
pub trait Trap: fmt::Debug + Send + Sync + 'static {
    /// Process an error.
    fn trap(&self, err: &Error);
}

impl<T: Trap> From<T> for Box<dyn Trap> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// A shared trap, such as [`Repository::trap`](crate::Repository::trap), can be handed to
/// anything expecting a trap.
impl Trap for Arc<dyn Trap> {
    fn trap(&self, err: &Error) {
        (**self).trap(err);
    }
}
