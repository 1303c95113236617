//! Legacy CELT decoding through Valve's shared library.
//!
//! Source-1 voice uses a CELT build that only ships as a game
//! redistributable, so it is loaded at runtime from the configured library
//! directory (see [`crate::libs`]). The library is loaded once per process
//! and reused across demos; decoder state is created per player per render
//! pass.
//!
//! Wire shape: each voice chunk's audio region is a run of 64-byte CELT
//! frames, each decoding to 512 mono samples at 22050 Hz.

use std::ffi::{c_int, c_void};
use std::path::Path;

use libloading::Library;

use crate::chunk::{ChunkBody, VoiceChunk};
use crate::error::{Error, Result};
use crate::libs;
use crate::render::{SegmentDecoder, SegmentError};

/// Fixed output rate of the legacy voice codec.
pub const SAMPLE_RATE: u32 = 22_050;

const FRAME_SAMPLES: usize = 512;
const FRAME_BYTES: usize = 64;
const CHANNELS: c_int = 1;

type CeltModeCreateFn = unsafe extern "C" fn(c_int, c_int, *mut c_int) -> *mut c_void;
type CeltModeDestroyFn = unsafe extern "C" fn(*mut c_void);
type CeltDecoderCreateFn = unsafe extern "C" fn(*mut c_void, c_int, *mut c_int) -> *mut c_void;
type CeltDecoderDestroyFn = unsafe extern "C" fn(*mut c_void);
type CeltDecodeFn = unsafe extern "C" fn(*mut c_void, *const u8, c_int, *mut i16, c_int) -> c_int;

/// The loaded CELT library and its resolved entry points.
///
/// The function pointers stay valid for as long as `_library` is held.
#[derive(Debug)]
pub struct CeltLibrary {
    mode_create: CeltModeCreateFn,
    mode_destroy: CeltModeDestroyFn,
    decoder_create: CeltDecoderCreateFn,
    decoder_destroy: CeltDecoderDestroyFn,
    decode: CeltDecodeFn,
    _library: Library,
}

impl CeltLibrary {
    /// Load the CELT library from `dir` and resolve its symbols.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(libs::celt_library_file());

        // SAFETY: loading a foreign library runs its initializers; the
        // required files were asserted to exist and come from the game's
        // redistributable set.
        let library = unsafe { Library::new(&path) }
            .map_err(|err| Error::CeltLoad(format!("{}: {err}", path.display())))?;

        unsafe {
            let mode_create = *library
                .get::<CeltModeCreateFn>(b"celt_mode_create\0")
                .map_err(|err| Error::CeltLoad(format!("celt_mode_create: {err}")))?;
            let mode_destroy = *library
                .get::<CeltModeDestroyFn>(b"celt_mode_destroy\0")
                .map_err(|err| Error::CeltLoad(format!("celt_mode_destroy: {err}")))?;
            let decoder_create = *library
                .get::<CeltDecoderCreateFn>(b"celt_decoder_create_custom\0")
                .map_err(|err| Error::CeltLoad(format!("celt_decoder_create_custom: {err}")))?;
            let decoder_destroy = *library
                .get::<CeltDecoderDestroyFn>(b"celt_decoder_destroy\0")
                .map_err(|err| Error::CeltLoad(format!("celt_decoder_destroy: {err}")))?;
            let decode = *library
                .get::<CeltDecodeFn>(b"celt_decode\0")
                .map_err(|err| Error::CeltLoad(format!("celt_decode: {err}")))?;

            Ok(Self {
                mode_create,
                mode_destroy,
                decoder_create,
                decoder_destroy,
                decode,
                _library: library,
            })
        }
    }

    /// Create fresh decoder state for one player's render pass.
    pub fn new_decoder(&self) -> Result<CeltDecoder<'_>> {
        let mut error: c_int = 0;

        let mode = unsafe { (self.mode_create)(SAMPLE_RATE as c_int, FRAME_SAMPLES as c_int, &mut error) };
        if mode.is_null() {
            return Err(Error::Decoding(format!(
                "celt_mode_create failed with code {error}"
            )));
        }

        let state = unsafe { (self.decoder_create)(mode, CHANNELS, &mut error) };
        if state.is_null() {
            unsafe { (self.mode_destroy)(mode) };
            return Err(Error::Decoding(format!(
                "celt_decoder_create_custom failed with code {error}"
            )));
        }

        Ok(CeltDecoder {
            library: self,
            mode,
            state,
        })
    }
}

/// Per-player CELT decoder state.
pub struct CeltDecoder<'a> {
    library: &'a CeltLibrary,
    mode: *mut c_void,
    state: *mut c_void,
}

impl CeltDecoder<'_> {
    /// Decode a run of 64-byte CELT frames; trailing partial frames are
    /// ignored.
    fn decode_frames(&mut self, data: &[u8]) -> std::result::Result<Vec<i16>, SegmentError> {
        let mut pcm = Vec::with_capacity((data.len() / FRAME_BYTES) * FRAME_SAMPLES);

        for frame in data.chunks_exact(FRAME_BYTES) {
            let mut samples = [0i16; FRAME_SAMPLES];
            let written = unsafe {
                (self.library.decode)(
                    self.state,
                    frame.as_ptr(),
                    FRAME_BYTES as c_int,
                    samples.as_mut_ptr(),
                    FRAME_SAMPLES as c_int,
                )
            };

            if written <= 0 {
                return Err(SegmentError::Codec(format!(
                    "celt_decode returned {written}"
                )));
            }

            pcm.extend_from_slice(&samples);
        }

        Ok(pcm)
    }
}

impl SegmentDecoder for CeltDecoder<'_> {
    type Sample = i16;

    fn decode_segment(&mut self, payload: &[u8]) -> std::result::Result<Vec<i16>, SegmentError> {
        let chunk = VoiceChunk::parse(payload)?;
        match chunk.body {
            ChunkBody::Silence { .. } => Ok(Vec::new()),
            ChunkBody::Audio(data) => self.decode_frames(&data),
        }
    }
}

impl Drop for CeltDecoder<'_> {
    fn drop(&mut self) {
        unsafe {
            (self.library.decoder_destroy)(self.state);
            (self.library.mode_destroy)(self.mode);
        }
    }
}
