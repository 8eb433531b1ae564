/// Sound engine: looping background music and the flap effect via rodio.
///
/// `Music.ogg` and `Flap.wav` are read from the assets directory at init
/// time. A missing or undecodable `Flap.wav` is replaced by a synthesized
/// chirp; missing music just means silence. Playback is fire-and-forget.
///
/// Compile without the "sound" feature to disable audio entirely (the stub
/// SoundEngine does nothing).

use std::path::Path;

#[cfg_attr(not(feature = "sound"), allow(dead_code))]
const SAMPLE_RATE: u32 = 22050;

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

    use crate::config::AudioConfig;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        /// Kept alive for as long as the music should play.
        _music: Option<Sink>,
        sfx_flap: Option<Arc<Vec<u8>>>,
    }

    impl SoundEngine {
        pub fn new(assets: &Path, audio: &AudioConfig) -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("no audio device, running silent: {e}");
                    return None;
                }
            };

            let sfx_flap = audio.sound.then(|| Arc::new(flap_clip(assets)));
            let music = if audio.music { start_music(&handle, assets) } else { None };

            Some(SoundEngine { _stream: stream, handle, _music: music, sfx_flap })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        pub fn play_flap(&self) {
            if let Some(buf) = &self.sfx_flap {
                self.play(buf);
            }
        }
    }

    /// `Flap.wav` if it decodes, otherwise the synthesized chirp.
    fn flap_clip(assets: &Path) -> Vec<u8> {
        let path = assets.join("Flap.wav");
        if let Some(bytes) = super::read_clip(&path) {
            if Decoder::new(Cursor::new(bytes.clone())).is_ok() {
                return bytes;
            }
            log::warn!("{} is not a playable sound, using built-in chirp", path.display());
        }
        super::make_wav(&super::gen_chirp())
    }

    fn start_music(handle: &OutputStreamHandle, assets: &Path) -> Option<Sink> {
        let path = assets.join("Music.ogg");
        let bytes = super::read_clip(&path)?;
        let src = match Decoder::new(Cursor::new(bytes)) {
            Ok(src) => src,
            Err(e) => {
                log::warn!("could not decode {}: {e}", path.display());
                return None;
            }
        };
        let sink = Sink::try_new(handle).ok()?;
        sink.append(src.repeat_infinite());
        log::info!("music started from {}", path.display());
        Some(sink)
    }
}

// ════════════════════════════════════════════════════════════
//  Clip loading and synthesis
// ════════════════════════════════════════════════════════════

/// Raw bytes of an audio file, or `None` (logged) if it cannot be read.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn read_clip(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("could not read {}: {e}", path.display());
            None
        }
    }
}

/// Flap fallback: a quick rising chirp with a little wing-beat wobble.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_chirp() -> Vec<f32> {
    let duration = 0.09;
    let n = (SAMPLE_RATE as f32 * duration) as usize;
    let mut phase = 0.0_f32;
    (0..n)
        .map(|i| {
            let t = i as f32 / n as f32;
            let freq = 1800.0 + t * 1400.0 + (t * 40.0).sin() * 120.0;
            phase += freq / SAMPLE_RATE as f32 * 2.0 * std::f32::consts::PI;
            let env = (1.0 - t).powf(1.5);
            phase.sin() * env * 0.25
        })
        .collect()
}

/// Wrap mono f32 samples into a 16-bit PCM WAV buffer.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn make_wav(samples: &[f32]) -> Vec<u8> {
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
    let block_align = num_channels * bits_per_sample / 8;
    let data_size = samples.len() as u32 * 2;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&num_channels.to_le_bytes());
    buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());

    for &s in samples {
        let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        buf.extend_from_slice(&val.to_le_bytes());
    }

    buf
}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new(_assets: &Path, _audio: &crate::config::AudioConfig) -> Option<Self> {
        Some(SoundEngine)
    }
    pub fn play_flap(&self) {}
}
