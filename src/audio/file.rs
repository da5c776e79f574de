use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::source::{SampleBlock, SampleSource};

/// Replays an audio file (or an in-memory recording) in fixed-size mono
/// blocks, decoding packets only as blocks are requested. The trailing
/// partial block is dropped, as a capture device would never deliver one.
pub struct FileSource {
    track: Option<TrackReader>,
    pending: VecDeque<i16>,
    sample_rate: u32,
    block_size: usize,
    frames: Option<u64>,
}

impl FileSource {
    pub fn open(path: &Path, block_size: usize) -> Result<Self> {
        let track = TrackReader::open(path)?;
        log::debug!(
            "{}: {} channel(s), {}Hz",
            path.display(),
            track.channels,
            track.sample_rate
        );
        Ok(Self {
            sample_rate: track.sample_rate,
            frames: track.frames,
            track: Some(track),
            pending: VecDeque::new(),
            block_size: block_size.max(1),
        })
    }

    pub fn from_samples(samples: Vec<i16>, sample_rate: u32, block_size: usize) -> Self {
        Self {
            track: None,
            frames: Some(samples.len() as u64),
            pending: samples.into(),
            sample_rate,
            block_size: block_size.max(1),
        }
    }

    /// Length of the recording, when the container declares it.
    pub fn duration_secs(&self) -> Option<f32> {
        self.frames.map(|frames| frames as f32 / self.sample_rate.max(1) as f32)
    }
}

impl SampleSource for FileSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_block(&mut self) -> Result<Option<SampleBlock>> {
        while self.pending.len() < self.block_size {
            let Some(track) = self.track.as_mut() else {
                return Ok(None);
            };
            match track.next_packet()? {
                Some(samples) => self.pending.extend(samples),
                None => self.track = None,
            }
        }
        Ok(Some(self.pending.drain(..self.block_size).collect()))
    }
}

/// The first decodable track of a container, read packet by packet.
struct TrackReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    sample_rate: u32,
    frames: Option<u64>,
}

impl TrackReader {
    fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .context("Failed to probe audio format")?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No audio tracks found")?;

        let track_id = track.id;
        let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
        let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
        let frames = track.codec_params.n_frames;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;

        Ok(Self {
            format,
            decoder,
            track_id,
            channels,
            sample_rate,
            frames,
        })
    }

    /// Mono samples of the next packet on this track; `None` at end of stream.
    fn next_packet(&mut self) -> Result<Option<Vec<i16>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(err)) => {
                    log::warn!("Skipping undecodable packet: {}", err);
                    continue;
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            };

            let spec = *decoded.spec();
            let mut interleaved = SampleBuffer::<i16>::new(decoded.frames() as u64, spec);
            interleaved.copy_interleaved_ref(decoded);
            return Ok(Some(downmix(interleaved.samples(), self.channels).collect()));
        }
    }
}

pub(crate) fn downmix(interleaved: &[i16], channels: usize) -> impl Iterator<Item = i16> + '_ {
    interleaved.chunks(channels.max(1)).map(|frame| {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        (sum / frame.len() as i32) as i16
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 16-bit PCM WAV file.
    fn wav_bytes(interleaved: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
        let data_len = (interleaved.len() * 2) as u32;
        let block_align = channels * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in interleaved {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn yields_whole_blocks_then_ends() {
        let samples = (0..2500).map(|i| i as i16).collect();
        let mut source = FileSource::from_samples(samples, 48_000, 1024);
        assert_eq!(source.sample_rate(), 48_000);
        let first = source.read_block().unwrap().unwrap();
        assert_eq!(first.len(), 1024);
        assert_eq!(first[0], 0);
        let second = source.read_block().unwrap().unwrap();
        assert_eq!(second[0], 1024);
        assert!(source.read_block().unwrap().is_none());
        assert!(source.read_block().unwrap().is_none());
    }

    #[test]
    fn streams_a_stereo_wav_as_mono_blocks() {
        // Left and right average to the frame index.
        let frames = 3000usize;
        let interleaved: Vec<i16> = (0..frames)
            .flat_map(|i| [i as i16 - 100, i as i16 + 100])
            .collect();
        let path = std::env::temp_dir()
            .join(format!("whistle-file-source-{}.wav", std::process::id()));
        std::fs::write(&path, wav_bytes(&interleaved, 2, 16_000)).unwrap();

        let mut source = FileSource::open(&path, 1024).unwrap();
        assert_eq!(source.sample_rate(), 16_000);
        assert_eq!(source.duration_secs(), Some(frames as f32 / 16_000.0));

        let mut mono = Vec::new();
        while let Some(block) = source.read_block().unwrap() {
            assert_eq!(block.len(), 1024);
            mono.extend(block);
        }
        std::fs::remove_file(&path).ok();

        assert_eq!(mono.len(), 2048);
        assert!(mono.iter().enumerate().all(|(i, &s)| s == i as i16));
    }

    #[test]
    fn downmix_averages_channels() {
        let stereo = [100i16, 300, -200, 200, i16::MAX, i16::MAX];
        let mono: Vec<i16> = downmix(&stereo, 2).collect();
        assert_eq!(mono, vec![200, 0, i16::MAX]);
        let same: Vec<i16> = downmix(&stereo, 1).collect();
        assert_eq!(same, stereo.to_vec());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(FileSource::open(Path::new("/nonexistent/whistle.wav"), 1024).is_err());
    }
}
