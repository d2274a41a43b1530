use crate::recorder::RecorderError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Mono 16-bit PCM WAV file that is written while audio arrives
///
/// Only the header needs patching when the capture ends, so memory use does
/// not grow with the recording length.
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
    samples_written: u64,
}

impl WavSink {
    pub fn create(path: impl Into<PathBuf>, sample_rate: u32) -> Result<Self, RecorderError> {
        let path = path.into();
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&path, spec)
            .map_err(|e| RecorderError::Io(format!("Failed to create {:?}: {}", path, e)))?;

        debug!("Writing capture to {:?}", path);
        Ok(Self {
            writer,
            path,
            samples_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Append mono f32 samples, clamped to -1.0..=1.0
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<(), RecorderError> {
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            self.writer
                .write_sample(pcm)
                .map_err(|e| RecorderError::Io(format!("Failed to write sample: {}", e)))?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    /// Patch the header and close the file
    pub fn finalize(self) -> Result<PathBuf, RecorderError> {
        let Self {
            writer,
            path,
            samples_written,
        } = self;
        writer
            .finalize()
            .map_err(|e| RecorderError::Io(format!("Failed to finalize WAV file: {}", e)))?;

        info!("Wrote {} samples to {:?}", samples_written, path);
        Ok(path)
    }

    /// Close and delete the partial file
    pub fn discard(self) {
        let Self { writer, path, .. } = self;
        drop(writer);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("Failed to delete partial capture {:?}: {}", path, e);
        }
    }
}

/// Average interleaved frames down to a single channel
pub fn downmix(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    data.chunks(channels.max(1))
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_sink_appends_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = WavSink::create(dir.path().join("take.wav"), 16000).unwrap();

        sink.write_samples(&[0.0, 0.5, -0.5]).unwrap();
        sink.write_samples(&[2.0, -2.0]).unwrap();
        assert_eq!(sink.samples_written(), 5);
        let path = sink.finalize().unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);

        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read.len(), 5);
        assert_eq!(read[3], i16::MAX);
        assert_eq!(read[4], -i16::MAX);
    }

    #[test]
    fn test_discard_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.wav");
        let mut sink = WavSink::create(&path, 44100).unwrap();
        sink.write_samples(&[0.1; 64]).unwrap();
        assert!(path.exists());

        sink.discard();
        assert!(!path.exists());
    }

    #[test]
    fn test_downmix_stereo() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        assert_eq!(downmix(&stereo, 2).collect::<Vec<_>>(), vec![0.5, 0.5]);
        assert_eq!(downmix(&stereo, 1).collect::<Vec<_>>(), stereo.to_vec());
    }
}
