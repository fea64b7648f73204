use std::collections::HashSet;

use crate::{
    error::{ParseError, PdfResult},
    objects::{Dictionary, Reference},
    resolve::Resolve,
};

use super::{number_array, Function};

/// Type 3 functions (PDF 1.3) define a stitching of the subdomains of several 1-input functions to
/// produce a single new 1-input function. Since the resulting stitching function is a 1-input function,
/// the domain is given by a twoelement array, [Domain0 Domain1].
#[derive(Debug, Clone)]
pub struct StitchingFunction {
    /// An array of k 1-input functions that shall make up the stitching function. The output
    /// dimensionality of all functions shall be the same, and compatible with the value of Range if Range
    /// is present
    functions: Vec<Function>,

    /// The k + 1 partition points delimiting the interval each function
    /// applies to: the parent domain endpoints with the k - 1 document
    /// `Bounds` values between them
    bounds: Vec<f32>,

    /// An array of 2 * k numbers that, taken in pairs, shall map each subset of the domain defined by
    /// Domain and the Bounds array to the domain of the corresponding function.
    ///
    /// Pairs may be reversed to flip a sub-function's direction
    encode: Vec<[f32; 2]>,

    /// Per-interval encode slope; 0 for zero-width intervals
    scale: Vec<f32>,
}

impl StitchingFunction {
    pub(crate) fn from_dict(
        dict: &mut Dictionary,
        domain: [f32; 2],
        resolver: &mut dyn Resolve,
        seen: &mut HashSet<Reference>,
    ) -> PdfResult<Self> {
        let functions = dict
            .expect_arr("Functions", resolver)?
            .into_iter()
            .map(|obj| Function::from_obj_guarded(obj, resolver, seen))
            .collect::<PdfResult<Vec<Function>>>()?;

        let k = functions.len();
        if k == 0 {
            anyhow::bail!("stitching function contains no sub-functions");
        }

        for func in &functions {
            if func.input_size() != 1 {
                anyhow::bail!(
                    "stitching sub-functions must take a single input, found {}",
                    func.input_size()
                );
            }

            if func.output_size() != functions[0].output_size() {
                anyhow::bail!(
                    "stitching sub-functions disagree on output arity: {} vs {}",
                    func.output_size(),
                    functions[0].output_size()
                );
            }
        }

        let inner_bounds = number_array(dict.expect_arr("Bounds", resolver)?, resolver)?;
        if inner_bounds.len() != k - 1 {
            anyhow::bail!(ParseError::ArrayOfInvalidLength {
                expected: k - 1,
                found: inner_bounds.len(),
            });
        }

        let mut bounds = Vec::with_capacity(k + 1);
        bounds.push(domain[0]);
        bounds.extend_from_slice(&inner_bounds);
        bounds.push(domain[1]);

        for pair in inner_bounds.windows(2) {
            if pair[0] >= pair[1] {
                anyhow::bail!("Bounds values must be ascending, found {} before {}", pair[0], pair[1]);
            }
        }

        if let Some((&first, &last)) = inner_bounds.first().zip(inner_bounds.last()) {
            if first <= domain[0] || last >= domain[1] {
                anyhow::bail!("Bounds values must lie strictly inside the domain");
            }
        }

        let encode_nums = number_array(dict.expect_arr("Encode", resolver)?, resolver)?;
        if encode_nums.len() != 2 * k {
            anyhow::bail!(ParseError::ArrayOfInvalidLength {
                expected: 2 * k,
                found: encode_nums.len(),
            });
        }

        let encode = encode_nums
            .chunks_exact(2)
            .map(|pair| [pair[0], pair[1]])
            .collect::<Vec<[f32; 2]>>();

        let scale = encode
            .iter()
            .zip(bounds.windows(2))
            .map(|([e0, e1], interval)| {
                if interval[1] == interval[0] {
                    0.0
                } else {
                    (e1 - e0) / (interval[1] - interval[0])
                }
            })
            .collect();

        Ok(Self {
            functions,
            bounds,
            encode,
            scale,
        })
    }

    /// The input arrives already clipped to the parent domain. A value equal
    /// to a partition point belongs to the lower-indexed interval
    pub(crate) fn transform(&self, x: f32) -> PdfResult<Vec<f32>> {
        let k = self.functions.len();

        let mut i = k - 1;
        for candidate in 0..k - 1 {
            if x <= self.bounds[candidate + 1] {
                i = candidate;
                break;
            }
        }

        let x = self.encode[i][0] + (x - self.bounds[i]) * self.scale[i];

        self.functions[i].transform(&[x])
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Includes the parent domain endpoints in the first and last positions
    pub fn bounds(&self) -> &[f32] {
        &self.bounds
    }

    pub fn encode(&self) -> &[[f32; 2]] {
        &self.encode
    }

    pub(crate) fn output_size(&self) -> usize {
        self.functions[0].output_size()
    }
}

#[cfg(test)]
mod test {
    use super::super::{test::*, Function};
    use crate::{objects::Object, resolve::NoResolve};

    fn constant(value: f32) -> Object {
        Object::Dictionary(dict(vec![
            ("FunctionType", Object::Integer(2)),
            ("Domain", real_arr(&[0.0, 1.0])),
            ("C0", real_arr(&[value])),
            ("C1", real_arr(&[value])),
            ("N", Object::Real(1.0)),
        ]))
    }

    fn linear() -> Object {
        Object::Dictionary(dict(vec![
            ("FunctionType", Object::Integer(2)),
            ("Domain", real_arr(&[0.0, 1.0])),
            ("C0", real_arr(&[0.0])),
            ("C1", real_arr(&[1.0])),
            ("N", Object::Real(1.0)),
        ]))
    }

    fn stitching(functions: Vec<Object>, bounds: &[f32], encode: &[f32]) -> Object {
        Object::Dictionary(dict(vec![
            ("FunctionType", Object::Integer(3)),
            ("Domain", real_arr(&[0.0, 1.0])),
            ("Functions", Object::Array(functions)),
            ("Bounds", real_arr(bounds)),
            ("Encode", real_arr(encode)),
        ]))
    }

    #[test]
    fn partition_point_belongs_to_lower_interval() {
        let obj = stitching(
            vec![constant(0.0), constant(1.0)],
            &[0.5],
            &[0.0, 1.0, 0.0, 1.0],
        );
        let func = Function::from_obj(obj, &mut NoResolve).unwrap();

        assert_eq!(func.transform(&[0.49]).unwrap(), vec![0.0]);
        assert_eq!(func.transform(&[0.5]).unwrap(), vec![0.0]);
        assert_eq!(func.transform(&[0.51]).unwrap(), vec![1.0]);
    }

    #[test]
    fn intervals_reencode_into_sub_function_domains() {
        let obj = stitching(
            vec![linear(), linear()],
            &[0.5],
            &[0.0, 1.0, 0.0, 1.0],
        );
        let func = Function::from_obj(obj, &mut NoResolve).unwrap();

        // each half of [0, 1] stretches over the full sub-function domain
        assert_eq!(func.transform(&[0.25]).unwrap(), vec![0.5]);
        assert_eq!(func.transform(&[0.75]).unwrap(), vec![0.5]);
        assert_eq!(func.transform(&[1.0]).unwrap(), vec![1.0]);
    }

    #[test]
    fn reversed_encode_pair_flips_a_sub_function() {
        let obj = stitching(vec![linear()], &[], &[1.0, 0.0]);
        let func = Function::from_obj(obj, &mut NoResolve).unwrap();

        assert_eq!(func.transform(&[0.0]).unwrap(), vec![1.0]);
        assert_eq!(func.transform(&[1.0]).unwrap(), vec![0.0]);
    }

    #[test]
    fn descending_bounds_are_rejected() {
        let obj = stitching(
            vec![constant(0.0), constant(1.0), constant(2.0)],
            &[0.75, 0.25],
            &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
        );

        assert!(Function::from_obj(obj, &mut NoResolve).is_err());
    }

    #[test]
    fn bounds_outside_domain_are_rejected() {
        let obj = stitching(
            vec![constant(0.0), constant(1.0)],
            &[2.0],
            &[0.0, 1.0, 0.0, 1.0],
        );

        assert!(Function::from_obj(obj, &mut NoResolve).is_err());
    }

    #[test]
    fn encode_of_wrong_length_is_rejected() {
        let obj = stitching(vec![constant(0.0), constant(1.0)], &[0.5], &[0.0, 1.0]);

        assert!(Function::from_obj(obj, &mut NoResolve).is_err());
    }

    #[test]
    fn multi_input_sub_function_is_rejected() {
        let two_input = Object::Stream(crate::stream::Stream {
            dict: dict(vec![
                ("FunctionType", Object::Integer(4)),
                ("Domain", real_arr(&[0.0, 1.0, 0.0, 1.0])),
                ("Range", real_arr(&[0.0, 1.0])),
            ]),
            data: b"{ add }".to_vec(),
        });

        let obj = stitching(vec![two_input], &[], &[0.0, 1.0]);

        assert!(Function::from_obj(obj, &mut NoResolve).is_err());
    }
}
