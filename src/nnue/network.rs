//! Network weights: on-disk format, quantization and inference layers.
//!
//! The weight file carries a magic string, a length-prefixed description
//! and raw little-endian f32 tensors in fixed order: feature-transformer
//! weights (768 x L1, feature-major), feature-transformer biases (L1),
//! L2 weights (buckets x L2 x L1), L2 biases (buckets x L2), output
//! weights (buckets x L2), output bias (buckets). Floats are quantized on
//! load by rounding `q * w` into the target integer range.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::{simd, FT_QUANT, FT_SIZE, L1_SIZE, L2_SIZE, LINEAR_QUANT, OUTPUT_BUCKETS};

/// Magic string opening every weight file.
pub const MAGIC: &[u8] = b"COBALT-QNNUE-1";

/// Errors from loading a weight file.
#[derive(Debug)]
pub enum NnueError {
    Io(io::Error),
    /// The file does not begin with the expected magic string.
    BadMagic,
    /// The description length field is implausible.
    BadDescription,
}

impl fmt::Display for NnueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnueError::Io(e) => write!(f, "io error: {e}"),
            NnueError::BadMagic => write!(f, "not a network file (magic mismatch)"),
            NnueError::BadDescription => write!(f, "malformed description field"),
        }
    }
}

impl std::error::Error for NnueError {}

impl From<io::Error> for NnueError {
    fn from(e: io::Error) -> Self {
        NnueError::Io(e)
    }
}

/// Capability for reading raw tensors, hiding the byte-level format.
pub trait TensorReader {
    /// Read and verify the file magic.
    fn read_magic(&mut self) -> Result<(), NnueError>;
    /// Read the length-prefixed description string.
    fn read_description(&mut self) -> Result<String, NnueError>;
    /// Fill `out` with the next `out.len()` f32 values.
    fn read_tensor(&mut self, out: &mut [f32]) -> Result<(), NnueError>;
}

/// Little-endian tensor reader over any byte stream.
pub struct LeTensorReader<R: Read> {
    inner: R,
}

impl<R: Read> LeTensorReader<R> {
    pub fn new(inner: R) -> Self {
        LeTensorReader { inner }
    }
}

impl<R: Read> TensorReader for LeTensorReader<R> {
    fn read_magic(&mut self) -> Result<(), NnueError> {
        let mut magic = vec![0u8; MAGIC.len()];
        self.inner.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(NnueError::BadMagic);
        }
        Ok(())
    }

    fn read_description(&mut self) -> Result<String, NnueError> {
        let mut len_bytes = [0u8; 4];
        self.inner.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > 4096 {
            return Err(NnueError::BadDescription);
        }
        let mut description = vec![0u8; len];
        self.inner.read_exact(&mut description)?;
        String::from_utf8(description).map_err(|_| NnueError::BadDescription)
    }

    fn read_tensor(&mut self, out: &mut [f32]) -> Result<(), NnueError> {
        let mut buf = [0u8; 4];
        for value in out.iter_mut() {
            self.inner.read_exact(&mut buf)?;
            *value = f32::from_le_bytes(buf);
        }
        Ok(())
    }
}

/// Quantized network, ready for inference.
pub struct Network {
    description: String,
    /// Feature-major: column `f` holds the L1 weights of feature `f`.
    ft_weights: Vec<i16>,
    ft_biases: Vec<i16>,
    /// Per bucket, row-major `[L2_SIZE][L1_SIZE]`.
    l1_weights: Vec<i8>,
    /// Per bucket, `[L2_SIZE]`, scaled by `FT_QUANT * LINEAR_QUANT`.
    l1_biases: Vec<i32>,
    /// Per bucket, `[L2_SIZE]`, unquantized.
    l2_weights: Vec<f32>,
    /// Per bucket, scaled by `FT_QUANT * LINEAR_QUANT`.
    l2_biases: Vec<f32>,
}

impl Network {
    /// Load and quantize a network from a weight file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NnueError> {
        let file = File::open(path)?;
        Self::load_from(LeTensorReader::new(BufReader::new(file)))
    }

    /// Load and quantize a network through any tensor reader.
    pub fn load_from<T: TensorReader>(mut reader: T) -> Result<Self, NnueError> {
        reader.read_magic()?;
        let description = reader.read_description()?;

        let mut ft_weights_f = vec![0f32; FT_SIZE * L1_SIZE];
        reader.read_tensor(&mut ft_weights_f)?;
        let mut ft_biases_f = vec![0f32; L1_SIZE];
        reader.read_tensor(&mut ft_biases_f)?;
        let mut l1_weights_f = vec![0f32; OUTPUT_BUCKETS * L2_SIZE * L1_SIZE];
        reader.read_tensor(&mut l1_weights_f)?;
        let mut l1_biases_f = vec![0f32; OUTPUT_BUCKETS * L2_SIZE];
        reader.read_tensor(&mut l1_biases_f)?;
        let mut l2_weights_f = vec![0f32; OUTPUT_BUCKETS * L2_SIZE];
        reader.read_tensor(&mut l2_weights_f)?;
        let mut l2_biases_f = vec![0f32; OUTPUT_BUCKETS];
        reader.read_tensor(&mut l2_biases_f)?;

        let quantize_i16 = |w: &f32| {
            (FT_QUANT as f32 * w)
                .round()
                .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
        };
        let quantize_i8 = |w: &f32| {
            (LINEAR_QUANT as f32 * w)
                .round()
                .clamp(f32::from(i8::MIN), f32::from(i8::MAX)) as i8
        };
        let bias_scale = (FT_QUANT * LINEAR_QUANT) as f32;

        Ok(Network {
            description,
            ft_weights: ft_weights_f.iter().map(quantize_i16).collect(),
            ft_biases: ft_biases_f.iter().map(quantize_i16).collect(),
            l1_weights: l1_weights_f.iter().map(quantize_i8).collect(),
            l1_biases: l1_biases_f
                .iter()
                .map(|w| (bias_scale * w).round() as i32)
                .collect(),
            l2_weights: l2_weights_f,
            l2_biases: l2_biases_f.iter().map(|b| b * bias_scale).collect(),
        })
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The L1 weight column of one input feature.
    #[inline]
    #[must_use]
    pub fn ft_column(&self, feature: usize) -> &[i16] {
        &self.ft_weights[feature * L1_SIZE..(feature + 1) * L1_SIZE]
    }

    #[inline]
    #[must_use]
    pub fn ft_biases(&self) -> &[i16] {
        &self.ft_biases
    }

    /// Run the layers after the feature transformer: clipped ReLU on the
    /// accumulator, the i8 linear layer with ReLU, then the f32 output
    /// layer, descaled to centipawns.
    #[must_use]
    pub fn propagate(&self, accumulator: &[i16], bucket: usize) -> i32 {
        debug_assert_eq!(accumulator.len(), L1_SIZE);
        debug_assert!(bucket < OUTPUT_BUCKETS);

        let mut clamped = [0u8; L1_SIZE];
        simd::clamp_to_u8(accumulator, FT_QUANT as i16, &mut clamped);

        let relu_limit = FT_QUANT * LINEAR_QUANT;
        let weights_base = bucket * L2_SIZE * L1_SIZE;
        let bias_base = bucket * L2_SIZE;

        let mut sum = self.l2_biases[bucket];
        for out in 0..L2_SIZE {
            let row = &self.l1_weights[weights_base + out * L1_SIZE..weights_base + (out + 1) * L1_SIZE];
            let mut activation = simd::dot_u8_i8(&clamped, row) + self.l1_biases[bias_base + out];
            activation = activation.clamp(0, relu_limit);
            sum += activation as f32 * self.l2_weights[bias_base + out];
        }

        (sum / (FT_QUANT * LINEAR_QUANT) as f32) as i32
    }
}

/// Serialize a float network in the on-disk layout. Only used to build
/// fixtures for tests and training round-trips.
#[cfg(test)]
pub(crate) fn write_network(
    description: &str,
    ft_weights: &[f32],
    ft_biases: &[f32],
    l1_weights: &[f32],
    l1_biases: &[f32],
    l2_weights: &[f32],
    l2_biases: &[f32],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(description.len() as u32).to_le_bytes());
    out.extend_from_slice(description.as_bytes());
    for tensor in [ft_weights, ft_biases, l1_weights, l1_biases, l2_weights, l2_biases] {
        for value in tensor {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

/// Deterministic pseudo-random float in roughly [-0.6, 0.6].
#[cfg(test)]
fn noise(state: &mut u64) -> f32 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    ((*state >> 40) as f32 / (1u64 << 24) as f32) * 1.2 - 0.6
}

/// A small deterministic network used by tests across the crate.
#[cfg(test)]
pub(crate) fn synthetic_network() -> Network {
    let mut state = 0x1234_5678_9ABC_DEF0u64;
    let ft_weights: Vec<f32> = (0..FT_SIZE * L1_SIZE).map(|_| noise(&mut state) * 0.5).collect();
    let ft_biases: Vec<f32> = (0..L1_SIZE).map(|_| noise(&mut state) * 0.1).collect();
    let l1_weights: Vec<f32> =
        (0..OUTPUT_BUCKETS * L2_SIZE * L1_SIZE).map(|_| noise(&mut state)).collect();
    let l1_biases: Vec<f32> = (0..OUTPUT_BUCKETS * L2_SIZE).map(|_| noise(&mut state)).collect();
    let l2_weights: Vec<f32> = (0..OUTPUT_BUCKETS * L2_SIZE).map(|_| noise(&mut state)).collect();
    let l2_biases: Vec<f32> = (0..OUTPUT_BUCKETS).map(|_| noise(&mut state)).collect();

    let bytes = write_network(
        "synthetic test net",
        &ft_weights,
        &ft_biases,
        &l1_weights,
        &l1_biases,
        &l2_weights,
        &l2_biases,
    );
    Network::load_from(LeTensorReader::new(std::io::Cursor::new(bytes))).unwrap()
}
