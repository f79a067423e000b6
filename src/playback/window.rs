// SPDX-License-Identifier: GPL-2.0-or-later

use common::time::{Duration, UnixNano};

/// The requested half-open interval `[start_wall, start_wall + duration)`.
#[derive(Clone, Copy, Debug)]
pub struct Window {
    pub start_wall: UnixNano,
    pub duration: Duration,
}

impl Window {
    #[must_use]
    pub fn end_wall(&self) -> Option<UnixNano> {
        self.start_wall.add_duration(self.duration)
    }
}
