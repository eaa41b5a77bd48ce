use crate::{
    audio_data::{LoadOptions, SoundData},
    error::{Result, StarSonicError},
};
use std::io::Cursor;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer,
        codecs::DecoderOptions,
        errors::Error,
        formats::FormatOptions,
        io::MediaSourceStream,
        meta::MetadataOptions,
        probe::{Hint, ProbeResult},
    },
    default::{get_codecs, get_probe},
};

/// Lowercased extension of an asset path, without the dot.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Probe an in-memory container. Shared by whole-file loading and music streaming.
pub(crate) fn probe_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<ProbeResult> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| StarSonicError::AudioLoading(format!("Failed to probe audio format: {:?}", e)))
}

/// Decode a complete encoded file into PCM, then apply `options`.
pub fn decode_bytes(bytes: Vec<u8>, options: &LoadOptions) -> Result<SoundData> {
    let probed = probe_bytes(bytes, options.extension.as_deref())?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| StarSonicError::AudioLoading("No default audio track found".to_string()))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| StarSonicError::AudioLoading("Sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| StarSonicError::AudioLoading("Channel count not found".to_string()))?
        .count() as u16;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| StarSonicError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(e) => {
                return Err(StarSonicError::AudioLoading(format!(
                    "Error reading packet: {:?}",
                    e
                )));
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(e)) => {
                log::debug!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => {
                return Err(StarSonicError::AudioLoading(format!(
                    "Error decoding packet: {:?}",
                    e
                )));
            }
        };

        let spec = *decoded.spec();
        let mut tmp = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        tmp.copy_interleaved_ref(decoded);
        samples.extend_from_slice(tmp.samples());
    }

    let mut data = SoundData::new(samples, sample_rate, channels);
    if options.convert_to_mono {
        data = data.to_mono();
    }
    if let Some(target_rate) = options.target_sample_rate {
        data = data.resample(target_rate)?;
    }
    Ok(data)
}
