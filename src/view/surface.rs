//! Host-owned UI state of a rendered view: scroll position and form values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: u32,
    pub y: u32,
}

impl ScrollOffset {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub scroll: ScrollOffset,
    /// Named form-control values.
    pub form_values: BTreeMap<String, String>,
}

impl Surface {
    pub fn is_blank(&self) -> bool {
        self.scroll == ScrollOffset::default() && self.form_values.is_empty()
    }
}
