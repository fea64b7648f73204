use crate::{error::PdfResult, objects::Dictionary, resolve::Resolve};

use super::number_array;

/// Type 2 functions (PDF 1.3) include a set of parameters that define an exponential
/// interpolation of one input value and n output values
#[derive(Debug, Clone)]
pub struct ExponentialInterpolationFunction {
    /// An array of n numbers that shall define the function result when x = 0.0.
    ///
    /// Default value: [0.0]
    c0: Vec<f32>,

    /// An array of n numbers that shall define the function result when x = 1.0.
    ///
    /// Default value: [1.0]
    c1: Vec<f32>,

    /// The interpolation exponent. Each input value x shall return n values, given by
    /// yj = C0j + xN * (C1j - C0j), for 0 <= j < n
    n: f32,

    is_linear: bool,
}

impl ExponentialInterpolationFunction {
    pub(crate) fn from_dict(
        dict: &mut Dictionary,
        range: Option<&[[f32; 2]]>,
        resolver: &mut dyn Resolve,
    ) -> PdfResult<Self> {
        let c0 = dict
            .get_arr("C0", resolver)?
            .map(|arr| number_array(arr, resolver))
            .transpose()?
            .unwrap_or_else(|| vec![0.0]);

        let c1 = dict
            .get_arr("C1", resolver)?
            .map(|arr| number_array(arr, resolver))
            .transpose()?
            .unwrap_or_else(|| vec![1.0]);

        if c0.len() != c1.len() {
            anyhow::bail!(
                "C0 and C1 must have the same number of entries, found {} and {}",
                c0.len(),
                c1.len()
            );
        }

        if let Some(range) = range {
            if range.len() != c0.len() {
                anyhow::bail!(
                    "Range declares {} outputs but C0/C1 declare {}",
                    range.len(),
                    c0.len()
                );
            }
        }

        let n = dict.expect_number("N", resolver)?;

        Ok(Self {
            c0,
            c1,
            n,
            is_linear: n == 1.0,
        })
    }

    /// The input arrives already clipped to the domain. A negative input
    /// raised to a fractional exponent follows `f32::powf`, producing NaN
    /// rather than an error
    pub(crate) fn transform(&self, x: f32) -> Vec<f32> {
        let t = if self.is_linear { x } else { x.powf(self.n) };

        self.c0
            .iter()
            .zip(&self.c1)
            .map(|(&c0, &c1)| c0 + t * (c1 - c0))
            .collect()
    }

    pub fn c0(&self) -> &[f32] {
        &self.c0
    }

    pub fn c1(&self) -> &[f32] {
        &self.c1
    }

    pub fn exponent(&self) -> f32 {
        self.n
    }
}

#[cfg(test)]
mod test {
    use super::super::{test::*, Function};
    use crate::{objects::Object, resolve::NoResolve};

    fn build(entries: Vec<(&'static str, Object)>) -> Function {
        Function::from_obj(Object::Dictionary(dict(entries)), &mut NoResolve).unwrap()
    }

    #[test]
    fn linear_interpolation_is_exact() {
        let func = build(vec![
            ("FunctionType", Object::Integer(2)),
            ("Domain", real_arr(&[0.0, 1.0])),
            ("C0", real_arr(&[0.0])),
            ("C1", real_arr(&[1.0])),
            ("N", Object::Real(1.0)),
        ]);

        for x in [0.0, 0.125, 0.5, 0.75, 1.0] {
            assert_eq!(func.transform(&[x]).unwrap(), vec![x]);
        }
    }

    #[test]
    fn quadratic_interpolation() {
        let func = build(vec![
            ("FunctionType", Object::Integer(2)),
            ("Domain", real_arr(&[0.0, 1.0])),
            ("C0", real_arr(&[0.0, 1.0])),
            ("C1", real_arr(&[1.0, 3.0])),
            ("N", Object::Integer(2)),
        ]);

        let out = func.transform(&[0.5]).unwrap();

        assert!((out[0] - 0.25).abs() < 1e-6);
        assert!((out[1] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn c0_and_c1_default_to_unit_interval() {
        let func = build(vec![
            ("FunctionType", Object::Integer(2)),
            ("Domain", real_arr(&[0.0, 1.0])),
            ("N", Object::Real(1.0)),
        ]);

        assert_eq!(func.output_size(), 1);
        assert_eq!(func.transform(&[0.25]).unwrap(), vec![0.25]);
    }

    #[test]
    fn mismatched_coefficient_lengths_are_rejected() {
        let obj = Object::Dictionary(dict(vec![
            ("FunctionType", Object::Integer(2)),
            ("Domain", real_arr(&[0.0, 1.0])),
            ("C0", real_arr(&[0.0, 0.0])),
            ("C1", real_arr(&[1.0])),
            ("N", Object::Real(1.0)),
        ]));

        assert!(Function::from_obj(obj, &mut NoResolve).is_err());
    }

    #[test]
    fn negative_base_with_fractional_exponent_yields_nan() {
        let func = build(vec![
            ("FunctionType", Object::Integer(2)),
            ("Domain", real_arr(&[-1.0, 1.0])),
            ("C0", real_arr(&[0.0])),
            ("C1", real_arr(&[1.0])),
            ("N", Object::Real(0.5)),
        ]);

        assert!(func.transform(&[-0.5]).unwrap()[0].is_nan());
    }
}
