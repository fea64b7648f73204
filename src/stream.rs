use std::fmt;

use crate::objects::Dictionary;

/// A stream object whose data has already been run through its filter chain.
///
/// Decompression happens upstream; the function core only ever sees the
/// decoded bytes (packed sample tables for type 0 functions, calculator
/// program text for type 4)
#[derive(Clone)]
pub struct Stream {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("dict", &self.dict)
            .field("data", &format!("[ {} bytes ]", self.data.len()))
            .finish()
    }
}
