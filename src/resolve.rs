use crate::{
    error::{ParseError, PdfResult},
    objects::{Dictionary, Object, ObjectType, Reference},
    stream::Stream,
};

pub trait Resolve {
    fn resolve_reference(&mut self, reference: Reference) -> PdfResult<Object>;

    fn assert_integer(&mut self, obj: Object) -> PdfResult<i32> {
        match obj {
            Object::Integer(i) => Ok(i),
            Object::Reference(r) => {
                let obj = self.resolve_reference(r)?;
                self.assert_integer(obj)
            }
            _ => anyhow::bail!(ParseError::MismatchedObjectType {
                expected: ObjectType::Integer,
            }),
        }
    }

    /// Either an integer, or a real
    fn assert_number(&mut self, obj: Object) -> PdfResult<f32> {
        match obj {
            Object::Integer(i) => Ok(i as f32),
            Object::Real(n) => Ok(n),
            Object::Reference(r) => {
                let obj = self.resolve_reference(r)?;
                self.assert_number(obj)
            }
            _ => anyhow::bail!(ParseError::MismatchedObjectType {
                expected: ObjectType::Real,
            }),
        }
    }

    fn assert_arr(&mut self, obj: Object) -> PdfResult<Vec<Object>> {
        match obj {
            Object::Array(a) => Ok(a),
            Object::Reference(r) => {
                let obj = self.resolve_reference(r)?;
                self.assert_arr(obj)
            }
            _ => anyhow::bail!(ParseError::MismatchedObjectType {
                expected: ObjectType::Array,
            }),
        }
    }

    fn assert_dict(&mut self, obj: Object) -> PdfResult<Dictionary> {
        match obj {
            Object::Dictionary(d) => Ok(d),
            Object::Reference(r) => {
                let obj = self.resolve_reference(r)?;
                self.assert_dict(obj)
            }
            _ => anyhow::bail!(ParseError::MismatchedObjectType {
                expected: ObjectType::Dictionary,
            }),
        }
    }

    fn assert_stream(&mut self, obj: Object) -> PdfResult<Stream> {
        match obj {
            Object::Stream(s) => Ok(s),
            Object::Reference(r) => {
                let obj = self.resolve_reference(r)?;
                self.assert_stream(obj)
            }
            _ => anyhow::bail!(ParseError::MismatchedObjectType {
                expected: ObjectType::Stream,
            }),
        }
    }

    /// Resolve all references
    fn resolve(&mut self, obj: Object) -> PdfResult<Object> {
        match obj {
            Object::Reference(r) => {
                let obj = self.resolve_reference(r)?;
                self.resolve(obj)
            }
            obj => Ok(obj),
        }
    }
}

/// Resolver for object graphs known to contain no indirect references
pub struct NoResolve;

impl Resolve for NoResolve {
    fn resolve_reference(&mut self, reference: Reference) -> PdfResult<Object> {
        anyhow::bail!(
            "unexpected indirect reference to object {}",
            reference.object_number
        )
    }
}
