use std::fmt;

use crate::objects::{ObjectType, Reference};

pub type PdfResult<T> = anyhow::Result<T>;

#[derive(Debug)]
pub enum ParseError {
    UnexpectedEof,

    MismatchedObjectType {
        expected: ObjectType,
    },

    MissingRequiredKey {
        key: &'static str,
    },

    ArrayOfInvalidLength {
        expected: usize,
        found: usize,
    },

    UnrecognizedVariant {
        found: String,
        ty: &'static str,
    },

    /// A function object was reached a second time through the same chain of
    /// sub-function references
    CyclicReference {
        reference: Reference,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl std::error::Error for ParseError {}
