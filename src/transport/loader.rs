#![allow(unsafe_code)] // dlopen, dlsym, and raw FFI function pointer calls

//! Dynamic binding of the transport shared library.
//!
//! Resolves the five required entry points by name at load time and keeps
//! the library handle alive for as long as the transport handle exists.
//! Entry points use a raw string/slice calling convention: strings travel as
//! pointer+length pairs without a terminator, payload buffers as
//! pointer+length+capacity triples, and status is a plain integer where
//! zero means success.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};

use tracing::{debug, info, warn};

use super::{SessionInfo, SessionParams, Transport, TransportError, TransportResult};

/// Environment variable overriding the transport library lookup with an
/// explicit path.
pub const TRANSPORT_LIBRARY_ENV: &str = "CAST_TRANSPORT_LIBRARY";

/// Borrowed string view passed across the library boundary.
#[repr(C)]
struct RawStr {
    ptr: *const c_char,
    len: isize,
}

impl RawStr {
    fn from_str(s: &str) -> Self {
        Self {
            ptr: s.as_ptr().cast(),
            len: s.len() as isize,
        }
    }
}

/// Borrowed buffer view passed across the library boundary.
#[repr(C)]
struct RawSlice {
    ptr: *const c_void,
    len: isize,
    cap: isize,
}

impl RawSlice {
    fn from_bytes(data: &[u8]) -> Self {
        Self {
            ptr: data.as_ptr().cast(),
            len: data.len() as isize,
            cap: data.len() as isize,
        }
    }
}

/// Return value of the session-creation entry point.
///
/// The strings are owned by the transport and stay valid until the next
/// session-creation call; they are copied out immediately.
#[repr(C)]
struct CreateSessionReturn {
    channel_id: *const c_char,
    peer_token: *const c_char,
    status: i64,
}

type CreateSessionFn =
    unsafe extern "C" fn(RawStr, RawStr, RawStr, i64, i64) -> CreateSessionReturn;
type WriteFn = unsafe extern "C" fn(RawSlice, u64) -> i64;
type CloseFn = unsafe extern "C" fn();
type LastErrorFn = unsafe extern "C" fn() -> *const c_char;

const SYM_CREATE_SESSION: &[u8] = b"CastCreateSession\0";
const SYM_WRITE_VIDEO: &[u8] = b"CastWriteVideo\0";
const SYM_WRITE_AUDIO: &[u8] = b"CastWriteAudio\0";
const SYM_CLOSE_SESSION: &[u8] = b"CastCloseSession\0";
const SYM_LAST_ERROR: &[u8] = b"CastLastError\0";

/// A transport backed by a dynamically loaded shared library.
///
/// Entry points are resolved once at load time and owned by this handle,
/// so repeated session cycles reuse the same resolved table and dropping
/// the handle is the single point where the library is released.
pub struct NativeTransport {
    library_path: String,
    _library: libloading::Library,
    create_session: CreateSessionFn,
    write_video: WriteFn,
    write_audio: WriteFn,
    close: CloseFn,
    last_error: LastErrorFn,
}

// The function pointers remain valid for as long as the library stays
// loaded, and the library handle lives in this struct.
unsafe impl Send for NativeTransport {}
unsafe impl Sync for NativeTransport {}

impl std::fmt::Debug for NativeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeTransport")
            .field("library_path", &self.library_path)
            .finish_non_exhaustive()
    }
}

impl NativeTransport {
    /// Load the transport library and resolve its entry points.
    ///
    /// Lookup order:
    /// 1. `CAST_TRANSPORT_LIBRARY` environment variable (explicit path)
    /// 2. the platform loader's default search path, using the platform
    ///    file name for `name` (for example `libcastbridge.so`)
    pub fn load(name: &str) -> TransportResult<Self> {
        if let Ok(explicit_path) = std::env::var(TRANSPORT_LIBRARY_ENV) {
            match Self::try_load(&explicit_path) {
                Ok(transport) => return Ok(transport),
                Err(e) => {
                    warn!("{TRANSPORT_LIBRARY_ENV}={explicit_path} set but failed: {e}");
                }
            }
        }

        let file_name = libloading::library_filename(name);
        Self::try_load(&file_name.to_string_lossy())
    }

    /// Load a specific library path and resolve all five entry points.
    fn try_load(path: &str) -> TransportResult<Self> {
        // Safety: loading an operator-installed transport binary, not an
        // arbitrary blob.
        let library =
            unsafe { libloading::Library::new(path) }.map_err(|source| {
                TransportError::LoadFailed {
                    library: path.to_string(),
                    source,
                }
            })?;

        let create_session = resolve::<CreateSessionFn>(&library, SYM_CREATE_SESSION)?;
        let write_video = resolve::<WriteFn>(&library, SYM_WRITE_VIDEO)?;
        let write_audio = resolve::<WriteFn>(&library, SYM_WRITE_AUDIO)?;
        let close = resolve::<CloseFn>(&library, SYM_CLOSE_SESSION)?;
        let last_error = resolve::<LastErrorFn>(&library, SYM_LAST_ERROR)?;

        info!("loaded cast transport from {path}");

        Ok(Self {
            library_path: path.to_string(),
            _library: library,
            create_session,
            write_video,
            write_audio,
            close,
            last_error,
        })
    }

    /// Path the library was loaded from.
    pub fn library_path(&self) -> &str {
        &self.library_path
    }
}

/// Resolve one entry point, copying the raw function pointer out of the
/// temporary `Symbol` guard. The library outlives the pointer because both
/// live in the same [`NativeTransport`].
fn resolve<T: Copy>(
    library: &libloading::Library,
    symbol: &'static [u8],
) -> TransportResult<T> {
    let resolved = unsafe { library.get::<T>(symbol) }.map_err(|source| {
        TransportError::SymbolMissing {
            // trailing NUL is part of the lookup key, not the name
            symbol: std::str::from_utf8(&symbol[..symbol.len() - 1]).unwrap_or("?"),
            source,
        }
    })?;
    Ok(*resolved)
}

/// Copy a transport-owned C string, treating a null pointer as empty.
fn read_cstr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // Safety: the transport returns NUL-terminated strings it owns.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

impl Transport for NativeTransport {
    fn create_session(&self, params: &SessionParams) -> TransportResult<SessionInfo> {
        debug!(
            channel = %params.channel,
            video_interval_ns = params.video_frame_interval_ns,
            audio_interval_ns = params.audio_frame_interval_ns,
            "creating cast session"
        );

        let ret = unsafe {
            (self.create_session)(
                RawStr::from_str(&params.username),
                RawStr::from_str(&params.password),
                RawStr::from_str(&params.channel),
                params.video_frame_interval_ns,
                params.audio_frame_interval_ns,
            )
        };

        if ret.status != 0 {
            return Err(TransportError::SessionRejected { status: ret.status });
        }

        Ok(SessionInfo {
            peer_token: read_cstr(ret.peer_token),
            channel_id: read_cstr(ret.channel_id),
        })
    }

    fn write_video(&self, data: &[u8], timestamp_ms: u64) -> TransportResult<()> {
        let status = unsafe { (self.write_video)(RawSlice::from_bytes(data), timestamp_ms) };
        if status != 0 {
            return Err(TransportError::WriteRejected { status });
        }
        Ok(())
    }

    fn write_audio(&self, data: &[u8], timestamp_ms: u64) -> TransportResult<()> {
        let status = unsafe { (self.write_audio)(RawSlice::from_bytes(data), timestamp_ms) };
        if status != 0 {
            return Err(TransportError::WriteRejected { status });
        }
        Ok(())
    }

    fn close(&self) {
        debug!("closing cast session");
        unsafe { (self.close)() }
    }

    fn last_error(&self) -> String {
        read_cstr(unsafe { (self.last_error)() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_str_view() {
        let s = "user";
        let raw = RawStr::from_str(s);
        assert_eq!(raw.len, 4);
        assert_eq!(raw.ptr, s.as_ptr().cast());
    }

    #[test]
    fn test_raw_slice_view() {
        let data = [1u8, 2, 3];
        let raw = RawSlice::from_bytes(&data);
        assert_eq!(raw.len, 3);
        assert_eq!(raw.cap, 3);
    }

    #[test]
    fn test_read_cstr_null() {
        assert_eq!(read_cstr(std::ptr::null()), "");
    }

    #[test]
    fn test_read_cstr_owned_copy() {
        let owned = std::ffi::CString::new("stream rejected").unwrap();
        assert_eq!(read_cstr(owned.as_ptr()), "stream rejected");
    }

    #[test]
    fn test_load_missing_library_fails() {
        let err = NativeTransport::load("cast-output-test-no-such-library").unwrap_err();
        assert!(err.is_load_failure());
    }
}
