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

use parking_lot::Mutex;

use crate::Error;
use crate::ErrorKind;
use crate::trap::Trap;

/// A trap that keeps the rendered errors in memory.
///
/// Clones share the same storage, so a clone can be handed to a repository or appender while
/// this handle is kept around to inspect what was reported.
///
/// # Examples
///
/// ```
/// use logtree::trap::CollectTrap;
///
/// let trap = CollectTrap::default();
/// assert!(trap.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollectTrap {
    errors: Arc<Mutex<Vec<(ErrorKind, String)>>>,
}

impl CollectTrap {
    /// Return the errors reported so far, rendered with [`Display`](std::fmt::Display).
    pub fn messages(&self) -> Vec<String> {
        self.errors.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Return the kinds of the errors reported so far.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.lock().iter().map(|(k, _)| *k).collect()
    }

    /// Return the number of reported errors.
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Return true if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

impl Trap for CollectTrap {
    fn trap(&self, err: &Error) {
        self.errors.lock().push((err.kind(), err.to_string()));
    }
}
