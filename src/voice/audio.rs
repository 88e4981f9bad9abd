//! Audio container detection and normalisation for transcription
//!
//! Transcription models want 16 kHz mono PCM. WAV and MP3 uploads are decoded
//! and resampled here; browser containers (WebM, Ogg, MP4) pass through
//! untouched and are left to the transcription service.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Sample rate expected by speech recognition models
pub const STT_SAMPLE_RATE: u32 = 16000;

/// Audio container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Ogg,
    Webm,
    Opus,
    Flac,
    Mp4,
    Unknown,
}

impl AudioFormat {
    /// File extension used when uploading to a provider
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Webm => "webm",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Mp4 => "m4a",
            Self::Unknown => "bin",
        }
    }

    /// MIME type for HTTP bodies and data URLs
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mp3",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::Webm => "audio/webm",
            Self::Opus => "audio/opus",
            Self::Flac => "audio/flac",
            Self::Mp4 => "audio/mp4",
            Self::Unknown => "application/octet-stream",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" | "mpeg" => Ok(Self::Mp3),
            "wav" | "wave" => Ok(Self::Wav),
            "ogg" => Ok(Self::Ogg),
            "webm" => Ok(Self::Webm),
            "opus" => Ok(Self::Opus),
            "flac" => Ok(Self::Flac),
            "mp4" | "m4a" => Ok(Self::Mp4),
            other => Err(Error::Config(format!("unsupported audio format: {other}"))),
        }
    }
}

/// Detect the container format from magic bytes
#[must_use]
pub fn sniff_format(data: &[u8]) -> AudioFormat {
    match data {
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => AudioFormat::Wav,
        [b'I', b'D', b'3', ..] => AudioFormat::Mp3,
        [0xFF, b, ..] if b & 0xE0 == 0xE0 => AudioFormat::Mp3,
        [b'O', b'g', b'g', b'S', ..] => AudioFormat::Ogg,
        [0x1A, 0x45, 0xDF, 0xA3, ..] => AudioFormat::Webm,
        [b'f', b'L', b'a', b'C', ..] => AudioFormat::Flac,
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => AudioFormat::Mp4,
        _ => AudioFormat::Unknown,
    }
}

/// Audio prepared for upload to a transcription service
#[derive(Debug, Clone)]
pub struct PreparedAudio {
    pub data: Vec<u8>,
    pub format: AudioFormat,
}

impl PreparedAudio {
    /// Filename to attach to a multipart upload
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("audio.{}", self.format.extension())
    }
}

/// Normalise uploaded audio for speech recognition
///
/// WAV and MP3 are converted to 16 kHz mono 16-bit WAV. Anything else is
/// returned unchanged with its detected format. When the bytes are not
/// recognised, the extension of `file_name` labels the upload instead.
///
/// # Errors
///
/// Returns error if a WAV or MP3 payload cannot be decoded
pub fn normalize_for_stt(data: &[u8], file_name: Option<&str>) -> Result<PreparedAudio> {
    let format = match sniff_format(data) {
        AudioFormat::Unknown => format_from_name(file_name),
        sniffed => return convert(data, sniffed),
    };

    tracing::debug!(format = %format, ?file_name, "audio not recognised, labelled by file name");
    Ok(PreparedAudio {
        data: data.to_vec(),
        format,
    })
}

/// Format implied by a file extension, `Unknown` when there is none
fn format_from_name(file_name: Option<&str>) -> AudioFormat {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
        .unwrap_or(AudioFormat::Unknown)
}

fn convert(data: &[u8], format: AudioFormat) -> Result<PreparedAudio> {
    let samples = match format {
        AudioFormat::Wav => {
            let (samples, rate) = decode_wav(data)?;
            resample(&samples, rate, STT_SAMPLE_RATE)?
        }
        AudioFormat::Mp3 => {
            let (samples, rate) = decode_mp3(data)?;
            resample(&samples, rate, STT_SAMPLE_RATE)?
        }
        _ => {
            tracing::debug!(format = %format, bytes = data.len(), "passing audio through unconverted");
            return Ok(PreparedAudio {
                data: data.to_vec(),
                format,
            });
        }
    };

    tracing::debug!(
        from = %format,
        samples = samples.len(),
        "converted audio to 16kHz mono wav"
    );

    Ok(PreparedAudio {
        data: samples_to_wav(&samples, STT_SAMPLE_RATE)?,
        format: AudioFormat::Wav,
    })
}

/// Decode WAV bytes into mono f32 samples and the source sample rate
#[allow(clippy::cast_precision_loss)]
fn decode_wav(data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::new(Cursor::new(data)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
    };

    Ok((downmix(&interleaved, channels), spec.sample_rate))
}

/// Decode MP3 bytes into mono f32 samples and the source sample rate
#[allow(clippy::cast_sign_loss)]
fn decode_mp3(data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(data);
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = STT_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&pcm, frame.channels.max(1)));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}

/// Average interleaved channels into a single channel
#[allow(clippy::cast_precision_loss)]
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio with rubato
///
/// The final partial chunk is zero-padded so trailing speech is not dropped.
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let chunk_size = 1024;
    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let mut output = Vec::with_capacity(samples.len() * to_rate as usize / from_rate as usize + 1);

    for chunk in samples.chunks(chunk_size) {
        let mut block: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        block.resize(chunk_size, 0.0);
        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    Ok(output)
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Encode audio as a `data:` URL a browser `Audio` element can play
#[must_use]
pub fn data_url(format: AudioFormat, audio: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(audio))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn sine(rate: u32, secs: f32) -> Vec<f32> {
        let n = (rate as f32 * secs) as usize;
        (0..n)
            .map(|i| 0.4 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn sniffs_common_containers() {
        let wav = samples_to_wav(&[0.0; 8], 16000).unwrap();
        assert_eq!(sniff_format(&wav), AudioFormat::Wav);
        assert_eq!(sniff_format(b"ID3\x04\x00rest"), AudioFormat::Mp3);
        assert_eq!(sniff_format(&[0xFF, 0xFB, 0x90, 0x00]), AudioFormat::Mp3);
        assert_eq!(sniff_format(b"OggS\x00\x02"), AudioFormat::Ogg);
        assert_eq!(sniff_format(&[0x1A, 0x45, 0xDF, 0xA3, 0x9F]), AudioFormat::Webm);
        assert_eq!(sniff_format(b"fLaC\x00"), AudioFormat::Flac);
        assert_eq!(sniff_format(b"\x00\x00\x00\x20ftypM4A \x00"), AudioFormat::Mp4);
        assert_eq!(sniff_format(b"hello"), AudioFormat::Unknown);
        assert_eq!(sniff_format(&[]), AudioFormat::Unknown);
    }

    #[test]
    fn safari_mp4_passes_through_as_m4a() {
        let m4a = b"\x00\x00\x00\x20ftypM4A \x00\x00\x00\x00";
        let prepared = normalize_for_stt(m4a, Some("recording.webm")).unwrap();
        assert_eq!(prepared.format, AudioFormat::Mp4);
        assert_eq!(prepared.file_name(), "audio.m4a");
    }

    #[test]
    fn unrecognised_bytes_fall_back_to_file_name() {
        let prepared = normalize_for_stt(b"\x01\x02\x03", Some("memo.OPUS")).unwrap();
        assert_eq!(prepared.format, AudioFormat::Opus);
        assert_eq!(prepared.data, b"\x01\x02\x03");

        let prepared = normalize_for_stt(b"\x01\x02\x03", Some("memo.xyz")).unwrap();
        assert_eq!(prepared.format, AudioFormat::Unknown);

        let prepared = normalize_for_stt(b"\x01\x02\x03", None).unwrap();
        assert_eq!(prepared.file_name(), "audio.bin");
    }

    #[test]
    fn webm_passes_through_unchanged() {
        let webm = [0x1A, 0x45, 0xDF, 0xA3, 1, 2, 3, 4];
        let prepared = normalize_for_stt(&webm, None).unwrap();
        assert_eq!(prepared.format, AudioFormat::Webm);
        assert_eq!(prepared.data, webm);
        assert_eq!(prepared.file_name(), "audio.webm");
    }

    #[test]
    fn stereo_44k_wav_becomes_16k_mono() {
        let mono = sine(44100, 0.5);
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in &mono {
                #[allow(clippy::cast_possible_truncation)]
                let v = (s * 32767.0) as i16;
                writer.write_sample(v).unwrap();
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }

        let prepared = normalize_for_stt(&cursor.into_inner(), None).unwrap();
        assert_eq!(prepared.format, AudioFormat::Wav);

        let reader = hound::WavReader::new(Cursor::new(prepared.data)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, STT_SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);

        // Roughly half a second survives resampling (padding adds at most one block)
        let len = reader.len();
        assert!(len >= 7000 && len <= 9000, "unexpected length {len}");
    }

    #[test]
    fn wav_already_at_target_rate_keeps_length() {
        let samples = sine(STT_SAMPLE_RATE, 0.25);
        let wav = samples_to_wav(&samples, STT_SAMPLE_RATE).unwrap();
        let prepared = normalize_for_stt(&wav, None).unwrap();
        let reader = hound::WavReader::new(Cursor::new(prepared.data)).unwrap();
        assert_eq!(reader.len() as usize, samples.len());
    }

    #[test]
    fn truncated_wav_is_an_audio_error() {
        let wav = samples_to_wav(&[0.1; 4], 16000).unwrap();
        let broken = &wav[..16];
        assert!(matches!(normalize_for_stt(broken, None), Err(Error::Audio(_))));
    }

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.3, 0.2], 1), vec![0.3, 0.2]);
    }

    #[test]
    fn data_url_has_mime_and_base64_payload() {
        let url = data_url(AudioFormat::Mp3, b"abc");
        assert_eq!(url, "data:audio/mp3;base64,YWJj");
    }

    #[test]
    fn format_parses_from_config_strings() {
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!("wav".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert!("aiff".parse::<AudioFormat>().is_err());
    }
}
