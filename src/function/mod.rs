use std::collections::HashSet;

use crate::{
    error::{ParseError, PdfResult},
    objects::{Dictionary, Object, ObjectType, Reference},
    resolve::Resolve,
    stream::Stream,
};

pub use self::{
    exponential_interpolation::ExponentialInterpolationFunction,
    postscript_calculator::{PostScriptCalculatorFunction, PostScriptError, PS_STACK_SIZE},
    sampled::{BitsPerSample, InterpolationOrder, SampledFunction},
    stitching::StitchingFunction,
};

mod exponential_interpolation;
mod postscript_calculator;
mod sampled;
mod stitching;

/// Maximum number of inputs a function may declare
pub const FUNC_MAX_INPUTS: usize = 32;

/// Maximum number of outputs a function may declare
pub const FUNC_MAX_OUTPUTS: usize = 32;

/// Sampled functions blend `2^m` corner samples per evaluation, so their
/// input arity is capped more tightly than the general limit
pub const SAMPLED_FUNC_MAX_INPUTS: usize = 16;

#[derive(Debug, Clone)]
pub struct Function {
    /// An array of 2 * m numbers, where m shall be the number of input values.
    /// For each i from 0 to m - 1, Domain2i shall be less than or equal to Domain2i+1,
    /// and the ith input value, xi, shall lie in the interval Domain2i <= xi <= Domain2i+1.
    /// Input values outside the declared domain shall be clipped to the nearest boundary
    /// value.
    domain: Vec<[f32; 2]>,

    /// An array of 2 * n numbers, where n shall be the number of output values. For
    /// each j from 0 to n - 1, Range2j shall be less than or equal to Range2j+1,
    /// and the jth output value, yj , shall lie in the interval Range2j <= yj <= Range2j+1.
    /// Output values outside the declared range shall be clipped to the nearest
    /// boundary value. If this entry is absent, no clipping shall be done.
    ///
    /// Required for sampled and PostScript calculator functions
    range: Option<Vec<[f32; 2]>>,

    /// Number of output values, derived from `Range` or from the subtype
    n: usize,

    subtype: FunctionSubtype,
}

#[derive(Debug, Clone)]
pub enum FunctionSubtype {
    /// Not a document-resident function type; passes its input tuple through
    /// untouched. Stands in for an absent transfer function and similar
    Identity,
    Sampled(SampledFunction),
    ExponentialInterpolation(ExponentialInterpolationFunction),
    Stitching(StitchingFunction),
    PostScriptCalculator(PostScriptCalculatorFunction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    Identity = -1,
    Sampled = 0,
    ExponentialInterpolation = 2,
    Stitching = 3,
    PostScriptCalculator = 4,
}

impl FunctionType {
    /// The identity type is used only internally and is never read from a
    /// document
    pub fn from_integer(i: i32) -> PdfResult<Self> {
        Ok(match i {
            0 => Self::Sampled,
            2 => Self::ExponentialInterpolation,
            3 => Self::Stitching,
            4 => Self::PostScriptCalculator,
            found => anyhow::bail!(ParseError::UnrecognizedVariant {
                found: found.to_string(),
                ty: "FunctionType",
            }),
        })
    }

    pub fn as_integer(self) -> i32 {
        self as i32
    }
}

#[derive(Debug)]
pub(crate) enum StreamOrDict {
    Stream(Stream),
    Dict(Dictionary),
}

impl StreamOrDict {
    pub fn dict(&mut self) -> &mut Dictionary {
        match self {
            Self::Dict(dict) => dict,
            Self::Stream(stream) => &mut stream.dict,
        }
    }

    pub fn expect_stream(self) -> PdfResult<Stream> {
        match self {
            Self::Dict(..) => anyhow::bail!(ParseError::MismatchedObjectType {
                expected: ObjectType::Stream,
            }),
            Self::Stream(stream) => Ok(stream),
        }
    }
}

impl Function {
    pub fn from_obj(obj: Object, resolver: &mut dyn Resolve) -> PdfResult<Self> {
        let mut seen = HashSet::new();

        Self::from_obj_guarded(obj, resolver, &mut seen)
    }

    /// Recursive entry point shared with sub-function parsing.
    ///
    /// `seen` holds the references on the active parse chain. An entry is
    /// removed once its subtree finishes, so two siblings referencing the
    /// same function object parse fine while ancestor cycles fail
    pub(crate) fn from_obj_guarded(
        obj: Object,
        resolver: &mut dyn Resolve,
        seen: &mut HashSet<Reference>,
    ) -> PdfResult<Self> {
        let reference = match &obj {
            Object::Reference(r) => Some(*r),
            _ => None,
        };

        if let Some(reference) = reference {
            if !seen.insert(reference) {
                anyhow::bail!(ParseError::CyclicReference { reference });
            }
        }

        let parsed = Self::parse(obj, resolver, seen);

        if let Some(reference) = reference {
            seen.remove(&reference);
        }

        parsed
    }

    fn parse(
        obj: Object,
        resolver: &mut dyn Resolve,
        seen: &mut HashSet<Reference>,
    ) -> PdfResult<Self> {
        let mut stream_or_dict = match resolver.resolve(obj)? {
            Object::Stream(stream) => StreamOrDict::Stream(stream),
            Object::Dictionary(dict) => StreamOrDict::Dict(dict),
            _ => anyhow::bail!(ParseError::MismatchedObjectType {
                expected: ObjectType::Dictionary,
            }),
        };

        let dict = stream_or_dict.dict();

        let function_type = FunctionType::from_integer(dict.expect_integer("FunctionType", resolver)?)?;

        let domain = min_max_pairs(dict.expect_arr("Domain", resolver)?, resolver)?;
        let range = dict
            .get_arr("Range", resolver)?
            .map(|arr| min_max_pairs(arr, resolver))
            .transpose()?;

        let m = domain.len();
        if m == 0 || m > FUNC_MAX_INPUTS {
            anyhow::bail!(
                "function declares {} inputs; between 1 and {} are supported",
                m,
                FUNC_MAX_INPUTS
            );
        }

        let (n, subtype) = match function_type {
            FunctionType::Sampled => {
                if m > SAMPLED_FUNC_MAX_INPUTS {
                    anyhow::bail!(
                        "sampled function declares {} inputs; at most {} are supported",
                        m,
                        SAMPLED_FUNC_MAX_INPUTS
                    );
                }

                let range = range
                    .as_deref()
                    .ok_or(ParseError::MissingRequiredKey { key: "Range" })?;

                let stream = stream_or_dict.expect_stream()?;
                let func = SampledFunction::from_stream(stream, &domain, range, resolver)?;

                (range.len(), FunctionSubtype::Sampled(func))
            }
            FunctionType::ExponentialInterpolation => {
                if m != 1 {
                    anyhow::bail!(
                        "exponential interpolation functions take a single input, found {}",
                        m
                    );
                }

                let func = ExponentialInterpolationFunction::from_dict(
                    stream_or_dict.dict(),
                    range.as_deref(),
                    resolver,
                )?;

                let n = func.c0().len();

                (n, FunctionSubtype::ExponentialInterpolation(func))
            }
            FunctionType::Stitching => {
                if m != 1 {
                    anyhow::bail!("stitching functions take a single input, found {}", m);
                }

                let func =
                    StitchingFunction::from_dict(stream_or_dict.dict(), domain[0], resolver, seen)?;

                (func.output_size(), FunctionSubtype::Stitching(func))
            }
            FunctionType::PostScriptCalculator => {
                let range = range
                    .as_deref()
                    .ok_or(ParseError::MissingRequiredKey { key: "Range" })?;

                let stream = stream_or_dict.expect_stream()?;
                let func = PostScriptCalculatorFunction::from_stream(stream, range.len())?;

                (range.len(), FunctionSubtype::PostScriptCalculator(func))
            }
            FunctionType::Identity => unreachable!("identity is never parsed from a document"),
        };

        if n == 0 || n > FUNC_MAX_OUTPUTS {
            anyhow::bail!(
                "function declares {} outputs; between 1 and {} are supported",
                n,
                FUNC_MAX_OUTPUTS
            );
        }

        Ok(Self {
            domain,
            range,
            n,
            subtype,
        })
    }

    /// The identity function passes tuples of any arity through unchanged
    pub fn identity() -> Self {
        Self {
            domain: vec![[0.0, 1.0]; FUNC_MAX_INPUTS],
            range: None,
            n: FUNC_MAX_INPUTS,
            subtype: FunctionSubtype::Identity,
        }
    }

    /// Transform an input tuple into an output tuple.
    ///
    /// Inputs are clipped to the declared domain before evaluation and
    /// outputs are clipped to the declared range, when one exists, after.
    /// PostScript calculator functions can fail here on inputs that drive
    /// the program into a stack or arithmetic fault; such failures are
    /// specific to the call and leave the function usable for other inputs
    pub fn transform(&self, input: &[f32]) -> PdfResult<Vec<f32>> {
        let subtype = match &self.subtype {
            FunctionSubtype::Identity => return Ok(input.to_vec()),
            subtype => subtype,
        };

        if input.len() != self.domain.len() {
            anyhow::bail!(ParseError::ArrayOfInvalidLength {
                expected: self.domain.len(),
                found: input.len(),
            });
        }

        let clamped = self
            .domain
            .iter()
            .zip(input)
            .map(|([lo, hi], &x)| clamp(x, *lo, *hi))
            .collect::<Vec<f32>>();

        let mut out = match subtype {
            FunctionSubtype::Identity => unreachable!(),
            FunctionSubtype::Sampled(func) => func.transform(&clamped),
            FunctionSubtype::ExponentialInterpolation(func) => func.transform(clamped[0]),
            FunctionSubtype::Stitching(func) => func.transform(clamped[0])?,
            FunctionSubtype::PostScriptCalculator(func) => func.transform(&clamped)?,
        };

        if let Some(range) = &self.range {
            for (value, [lo, hi]) in out.iter_mut().zip(range) {
                *value = clamp(*value, *lo, *hi);
            }
        }

        Ok(out)
    }

    pub fn input_size(&self) -> usize {
        self.domain.len()
    }

    pub fn output_size(&self) -> usize {
        self.n
    }

    pub fn domain(&self) -> &[[f32; 2]] {
        &self.domain
    }

    pub fn range(&self) -> Option<&[[f32; 2]]> {
        self.range.as_deref()
    }

    pub fn function_type(&self) -> FunctionType {
        match self.subtype {
            FunctionSubtype::Identity => FunctionType::Identity,
            FunctionSubtype::Sampled(..) => FunctionType::Sampled,
            FunctionSubtype::ExponentialInterpolation(..) => {
                FunctionType::ExponentialInterpolation
            }
            FunctionSubtype::Stitching(..) => FunctionType::Stitching,
            FunctionSubtype::PostScriptCalculator(..) => FunctionType::PostScriptCalculator,
        }
    }

    /// The parsed variant, for consumers that introspect structure (sample
    /// tables, stitching sub-functions) for caching or serialization
    pub fn subtype(&self) -> &FunctionSubtype {
        &self.subtype
    }
}

/// Clip `x` to `[lo, hi]`.
///
/// Unlike `f32::clamp`, never panics; construction validates `lo <= hi` for
/// document-supplied bounds, but grid coordinates computed from degenerate
/// encodings may still produce NaN, which passes through
pub(crate) fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

pub(crate) fn number_array(arr: Vec<Object>, resolver: &mut dyn Resolve) -> PdfResult<Vec<f32>> {
    arr.into_iter()
        .map(|obj| resolver.assert_number(obj))
        .collect()
}

/// Interpret a flat array of 2k numbers as k `[min, max]` pairs, validating
/// the ordering of each pair
fn min_max_pairs(arr: Vec<Object>, resolver: &mut dyn Resolve) -> PdfResult<Vec<[f32; 2]>> {
    let nums = number_array(arr, resolver)?;

    if nums.len() % 2 != 0 {
        anyhow::bail!(
            "min/max array must contain an even number of entries, found {}",
            nums.len()
        );
    }

    nums.chunks_exact(2)
        .map(|pair| {
            let (lo, hi) = (pair[0], pair[1]);

            if !(lo <= hi) {
                anyhow::bail!("min/max pair [{} {}] is out of order", lo, hi);
            }

            Ok([lo, hi])
        })
        .collect()
}
