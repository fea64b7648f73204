use std::cell::RefCell;

use crate::{
    error::{ParseError, PdfResult},
    resolve::Resolve,
    stream::Stream,
};

use super::{clamp, number_array, SAMPLED_FUNC_MAX_INPUTS};

/// Type 0 functions use a sequence of sample values (contained in a stream) to provide an
/// approximation for functions whose domains and ranges are bounded. The samples are organized
/// as an m-dimensional table in which each entry has n components
#[derive(Debug, Clone)]
pub struct SampledFunction {
    /// An array of m positive integers that shall specify the number of samples in each
    /// input dimension of the sample table
    size: Vec<u32>,

    /// The number of bits that shall represent each sample. (If the function has multiple
    /// output values, each one shall occupy BitsPerSample bits.)
    bits_per_sample: BitsPerSample,

    /// The order of interpolation between samples. Valid values shall be 1 and 3, specifying
    /// linear and cubic spline interpolation, respectively. Accepted but evaluated linearly
    /// either way.
    ///
    /// Default value: 1
    order: InterpolationOrder,

    /// An array of 2 * m numbers specifying the linear mapping of input values into the domain
    /// of the function's sample table.
    ///
    /// Default value: [0 (Size0 - 1) 0 (Size1 - 1) ...]
    encode: Vec<[f32; 2]>,

    /// An array of 2 * n numbers specifying the linear mapping of sample values into the range
    /// appropriate for the function's output values
    ///
    /// Default value: same as the value of Range
    decode: Vec<[f32; 2]>,

    /// Slope and intercept folding the domain-to-encode mapping into a single
    /// affine step per input: grid = x * input_mul + input_ofs
    input_mul: Vec<f32>,
    input_ofs: Vec<f32>,

    /// Flat stride of each input dimension in `samples`; dimension 0 varies
    /// fastest and each grid cell holds n consecutive output components
    idx_offset: Vec<usize>,

    /// The decoded sample table, normalized to [0, 1]
    samples: Vec<f32>,

    cache: RefCell<Option<(Vec<f32>, Vec<f32>)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitsPerSample {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
    Twelve = 12,
    Sixteen = 16,
    TwentyFour = 24,
    ThirtyTwo = 32,
}

impl BitsPerSample {
    fn from_integer(i: i32) -> PdfResult<Self> {
        Ok(match i {
            1 => Self::One,
            2 => Self::Two,
            4 => Self::Four,
            8 => Self::Eight,
            12 => Self::Twelve,
            16 => Self::Sixteen,
            24 => Self::TwentyFour,
            32 => Self::ThirtyTwo,
            found => anyhow::bail!(ParseError::UnrecognizedVariant {
                found: found.to_string(),
                ty: "BitsPerSample",
            }),
        })
    }

    pub fn bits(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationOrder {
    #[default]
    Linear = 1,
    Cubic = 3,
}

impl InterpolationOrder {
    fn from_integer(i: i32) -> PdfResult<Self> {
        Ok(match i {
            1 => Self::Linear,
            3 => Self::Cubic,
            found => anyhow::bail!(ParseError::UnrecognizedVariant {
                found: found.to_string(),
                ty: "InterpolationOrder",
            }),
        })
    }
}

/// Big-endian bit cursor over the packed sample data; samples are 1..32 bit
/// unsigned integers packed without padding across byte boundaries
struct SampleBitReader<'a> {
    buffer: &'a [u8],
    bit_pos: usize,
}

impl<'a> SampleBitReader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, bit_pos: 0 }
    }

    fn read(&mut self, bits: u32) -> PdfResult<u32> {
        let mut value = 0_u32;

        for _ in 0..bits {
            let byte = self
                .buffer
                .get(self.bit_pos / 8)
                .ok_or(ParseError::UnexpectedEof)?;

            let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
            value = (value << 1) | u32::from(bit);
            self.bit_pos += 1;
        }

        Ok(value)
    }
}

impl SampledFunction {
    pub(crate) fn from_stream(
        stream: Stream,
        domain: &[[f32; 2]],
        range: &[[f32; 2]],
        resolver: &mut dyn Resolve,
    ) -> PdfResult<Self> {
        let Stream { mut dict, data } = stream;

        let m = domain.len();
        let n = range.len();

        let size_ints = dict.expect_arr("Size", resolver)?;
        if size_ints.len() != m {
            anyhow::bail!(ParseError::ArrayOfInvalidLength {
                expected: m,
                found: size_ints.len(),
            });
        }

        let size = size_ints
            .into_iter()
            .map(|obj| {
                let i = resolver.assert_integer(obj)?;

                if i < 1 {
                    anyhow::bail!("sample counts must be positive, found {}", i);
                }

                Ok(i as u32)
            })
            .collect::<PdfResult<Vec<u32>>>()?;

        let bits_per_sample =
            BitsPerSample::from_integer(dict.expect_integer("BitsPerSample", resolver)?)?;

        let order = dict
            .get_integer("Order", resolver)?
            .map(InterpolationOrder::from_integer)
            .transpose()?
            .unwrap_or_default();

        let encode = match dict.get_arr("Encode", resolver)? {
            Some(arr) => pairs_of(number_array(arr, resolver)?, m)?,
            None => size.iter().map(|&s| [0.0, (s - 1) as f32]).collect(),
        };

        let decode = match dict.get_arr("Decode", resolver)? {
            Some(arr) => pairs_of(number_array(arr, resolver)?, n)?,
            None => range.to_vec(),
        };

        let input_mul = domain
            .iter()
            .zip(&encode)
            .map(|([d0, d1], [e0, e1])| if d1 > d0 { (e1 - e0) / (d1 - d0) } else { 0.0 })
            .collect::<Vec<f32>>();

        let input_ofs = domain
            .iter()
            .zip(&encode)
            .zip(&input_mul)
            .map(|(([d0, _], [e0, _]), mul)| e0 - d0 * mul)
            .collect::<Vec<f32>>();

        let mut idx_offset = Vec::with_capacity(m);
        let mut stride = n;
        for &s in &size {
            idx_offset.push(stride);
            stride = stride
                .checked_mul(s as usize)
                .ok_or_else(|| anyhow::anyhow!("sample table dimensions overflow"))?;
        }

        let n_samples = stride;

        let available_bits = data.len() * 8;
        let required_bits = n_samples
            .checked_mul(bits_per_sample.bits() as usize)
            .ok_or_else(|| anyhow::anyhow!("sample table dimensions overflow"))?;
        if required_bits > available_bits {
            anyhow::bail!(ParseError::UnexpectedEof);
        }

        let max_sample = ((1_u64 << bits_per_sample.bits()) - 1) as f32;

        let mut reader = SampleBitReader::new(&data);
        let mut samples = Vec::with_capacity(n_samples);
        for _ in 0..n_samples {
            samples.push(reader.read(bits_per_sample.bits())? as f32 / max_sample);
        }

        Ok(Self {
            size,
            bits_per_sample,
            order,
            encode,
            decode,
            input_mul,
            input_ofs,
            idx_offset,
            samples,
            cache: RefCell::new(None),
        })
    }

    /// Multilinear interpolation over the 2^m grid cells surrounding the
    /// encoded input. The input arrives already clipped to the domain
    pub(crate) fn transform(&self, input: &[f32]) -> Vec<f32> {
        if let Some((cache_in, cache_out)) = &*self.cache.borrow() {
            if cache_in == input {
                return cache_out.clone();
            }
        }

        let m = self.size.len();
        let n = self.decode.len();

        let mut e0 = [0_usize; SAMPLED_FUNC_MAX_INPUTS];
        let mut e1 = [0_usize; SAMPLED_FUNC_MAX_INPUTS];
        let mut efrac = [0.0_f32; SAMPLED_FUNC_MAX_INPUTS];

        for i in 0..m {
            let top = (self.size[i] - 1) as f32;
            let x = clamp(input[i] * self.input_mul[i] + self.input_ofs[i], 0.0, top);

            e0[i] = x.floor() as usize;
            e1[i] = (e0[i] + 1).min(self.size[i] as usize - 1);
            efrac[i] = x - e0[i] as f32;
        }

        let mut out = Vec::with_capacity(n);

        for j in 0..n {
            let mut acc = 0.0_f32;

            for corner in 0..(1_usize << m) {
                let mut idx = j;
                let mut weight = 1.0_f32;

                for (k, &offset) in self.idx_offset.iter().enumerate() {
                    if corner & (1 << k) != 0 {
                        idx += offset * e1[k];
                        weight *= efrac[k];
                    } else {
                        idx += offset * e0[k];
                        weight *= 1.0 - efrac[k];
                    }
                }

                acc += weight * self.samples[idx];
            }

            let [d0, d1] = self.decode[j];
            out.push(d0 + acc * (d1 - d0));
        }

        *self.cache.borrow_mut() = Some((input.to_vec(), out.clone()));

        out
    }

    pub fn size(&self) -> &[u32] {
        &self.size
    }

    pub fn bits_per_sample(&self) -> BitsPerSample {
        self.bits_per_sample
    }

    pub fn order(&self) -> InterpolationOrder {
        self.order
    }

    pub fn encode(&self) -> &[[f32; 2]] {
        &self.encode
    }

    pub fn decode(&self) -> &[[f32; 2]] {
        &self.decode
    }

    /// The decoded sample table, normalized to [0, 1], laid out with input
    /// dimension 0 varying fastest and n output components per grid cell
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

fn pairs_of(nums: Vec<f32>, expected: usize) -> PdfResult<Vec<[f32; 2]>> {
    if nums.len() != 2 * expected {
        anyhow::bail!(ParseError::ArrayOfInvalidLength {
            expected: 2 * expected,
            found: nums.len(),
        });
    }

    Ok(nums
        .chunks_exact(2)
        .map(|pair| [pair[0], pair[1]])
        .collect())
}
