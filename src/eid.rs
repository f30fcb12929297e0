use std::fmt;

use rusty_ulid::Ulid;

/// Time-ordered unique id for sessions and temporary file names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Eid(Ulid);

impl Eid {
    pub fn new() -> Self {
        Eid(Ulid::generate())
    }
}

impl Default for Eid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
