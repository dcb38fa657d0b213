use super::Sample;
use crate::Result;
use std::path::Path;

/// Decodes a file into a [`Sample`].
///
/// Decoders are collaborators of the engine; the sample manager only needs
/// this one entry point. Implementations run on the serialization thread and
/// may block on I/O.
pub trait SampleLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Sample>;
}

impl<F> SampleLoader for F
where
    F: Fn(&Path) -> Result<Sample> + Send + Sync,
{
    fn load(&self, path: &Path) -> Result<Sample> {
        self(path)
    }
}

/// PCM/float WAV decoder backed by `hound`.
#[cfg(feature = "wav")]
#[derive(Debug, Default, Clone, Copy)]
pub struct WavLoader;

#[cfg(feature = "wav")]
impl SampleLoader for WavLoader {
    fn load(&self, path: &Path) -> Result<Sample> {
        use crate::Error;
        use hound::{SampleFormat, WavReader};

        if !path.exists() {
            return Err(Error::SampleNotFound(path.to_path_buf()));
        }

        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channel_count = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(Error::UnsupportedFormat(format!(
                        "{} bits per sample",
                        spec.bits_per_sample
                    )));
                }
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        if interleaved.is_empty() {
            return Err(Error::EmptySample(path.to_path_buf()));
        }

        let kept = channel_count.min(2);
        let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); kept];
        for frame in interleaved.chunks_exact(channel_count) {
            for (channel, data) in channels.iter_mut().enumerate() {
                data.push(frame[channel]);
            }
        }

        tracing::debug!(
            path = %path.display(),
            channels = channel_count,
            sample_rate = spec.sample_rate,
            "decoded wav"
        );

        Ok(Sample::from_channels(spec.sample_rate as f64, channels).with_path(path))
    }
}
