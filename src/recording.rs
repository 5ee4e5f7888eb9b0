//! Client-side recording sessions.
//!
//! A [`Recorder`] owns the camera for as long as it lives and at most one
//! [`RecordingSession`] at a time. Media chunks are appended to the session
//! in memory; stopping the session assembles them into a single [`Blob`]
//! ready for upload.

use crate::storage::{filename_timestamp, FILENAME_PREFIX};
use chrono::Utc;
use std::time::{Duration, Instant};

/// Container formats in order of preference.
pub const PREFERRED_MIME_TYPES: &[&str] =
    &["video/webm;codecs=vp8,opus", "video/webm", "video/mp4"];

/// Blob type used when the recorder picks its own container.
pub const DEFAULT_BLOB_TYPE: &str = "video/webm";

/// First preferred container the recorder supports, or `None` to let the
/// recorder use its default.
pub fn select_mime_type<S: AsRef<str>>(supported: &[S]) -> Option<&'static str> {
    PREFERRED_MIME_TYPES
        .iter()
        .copied()
        .find(|preferred| supported.iter().any(|s| s.as_ref() == *preferred))
}

/// `video/webm;codecs=vp8,opus` -> `video/webm`.
pub fn mime_essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or(mime_type).trim()
}

/// Filename extension for a container mime type.
pub fn extension_for(mime_type: &str) -> &'static str {
    if mime_type.starts_with("video/mp4") {
        "mp4"
    } else {
        "webm"
    }
}

/// Client-side name for a recording stopped now, e.g.
/// `bowling-2024-05-01T10-20-30-123Z.webm`.
pub fn recording_filename(mime_type: &str) -> String {
    format!(
        "{}-{}.{}",
        FILENAME_PREFIX,
        filename_timestamp(Utc::now()),
        extension_for(mime_type)
    )
}

/// Which camera the recorder captures from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

/// A device that yields media. Acquisition and release bracket the lifetime
/// of the recorder and every facing-mode switch.
pub trait CameraSource {
    fn acquire(&mut self, facing: FacingMode) -> Result<(), RecordingError>;
    fn release(&mut self);
    fn supported_mime_types(&self) -> Vec<String>;
}

/// One complete recording as a single binary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    data: Vec<u8>,
    mime_type: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// An in-progress recording.
#[derive(Debug)]
pub struct RecordingSession {
    pub facing: FacingMode,
    /// Container chosen at start, `None` if the recorder default is used.
    pub mime_type: Option<String>,
    started_at: Instant,
    chunks: Vec<Vec<u8>>,
}

impl RecordingSession {
    pub fn new(facing: FacingMode, mime_type: Option<String>) -> Self {
        Self {
            facing,
            mime_type,
            started_at: Instant::now(),
            chunks: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Append a chunk. Empty chunks are dropped.
    pub fn push_chunk(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        tracing::debug!("Data chunk received: {} bytes", data.len());
        self.chunks.push(data);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn into_blob(self) -> Blob {
        let mime_type = self
            .mime_type
            .as_deref()
            .map(mime_essence)
            .unwrap_or(DEFAULT_BLOB_TYPE)
            .to_string();
        Blob::new(self.chunks.concat(), mime_type)
    }
}

/// Owns a camera and at most one active recording session.
pub struct Recorder<C: CameraSource> {
    camera: C,
    facing: FacingMode,
    camera_ready: bool,
    session: Option<RecordingSession>,
}

impl<C: CameraSource> Recorder<C> {
    /// Acquire the camera facing `facing`.
    pub fn open(mut camera: C, facing: FacingMode) -> Result<Self, RecordingError> {
        camera.acquire(facing)?;
        Ok(Self {
            camera,
            facing,
            camera_ready: true,
            session: None,
        })
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn camera_ready(&self) -> bool {
        self.camera_ready
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Switch cameras: release the current one, then acquire the other.
    ///
    /// Refused while recording.
    pub fn toggle_camera(&mut self) -> Result<FacingMode, RecordingError> {
        if self.session.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let next = self.facing.toggled();
        self.camera.release();
        self.camera_ready = false;
        self.camera.acquire(next)?;
        self.camera_ready = true;
        self.facing = next;

        tracing::info!("Switched camera to {:?}", next);
        Ok(next)
    }

    pub fn start(&mut self) -> Result<(), RecordingError> {
        if !self.camera_ready {
            return Err(RecordingError::CameraUnavailable(
                "Camera stream not available".to_string(),
            ));
        }
        if self.session.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let supported = self.camera.supported_mime_types();
        let mime_type = select_mime_type(supported.as_slice()).map(str::to_string);
        tracing::info!(
            "Recording with mimeType: {}",
            mime_type.as_deref().unwrap_or("default")
        );

        self.session = Some(RecordingSession::new(self.facing, mime_type));
        Ok(())
    }

    pub fn push_chunk(&mut self, data: Vec<u8>) -> Result<(), RecordingError> {
        let session = self.session.as_mut().ok_or(RecordingError::NotRecording)?;
        session.push_chunk(data);
        Ok(())
    }

    /// Stop recording and assemble the chunks into one blob.
    pub fn stop(&mut self) -> Result<Blob, RecordingError> {
        let session = self.session.take().ok_or(RecordingError::NotRecording)?;

        tracing::info!(
            "Recording stopped: {} chunks, {} bytes, {:?}",
            session.chunk_count(),
            session.byte_len(),
            session.elapsed()
        );

        Ok(session.into_blob())
    }

    /// Release the camera. Any unfinished recording is discarded.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!(
                "Discarding unfinished recording of {} chunks",
                session.chunk_count()
            );
        }
        if self.camera_ready {
            self.camera.release();
            self.camera_ready = false;
        }
    }
}

impl<C: CameraSource> Drop for Recorder<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("Could not access camera: {0}")]
    CameraUnavailable(String),

    #[error("Not currently recording")]
    NotRecording,

    #[error("A recording is already in progress")]
    AlreadyRecording,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        events: Vec<String>,
    }

    struct FakeCamera {
        log: Rc<RefCell<Log>>,
        supported: Vec<String>,
        fail_on: Option<FacingMode>,
    }

    impl FakeCamera {
        fn new(log: Rc<RefCell<Log>>, supported: &[&str]) -> Self {
            Self {
                log,
                supported: supported.iter().map(|s| s.to_string()).collect(),
                fail_on: None,
            }
        }
    }

    impl CameraSource for FakeCamera {
        fn acquire(&mut self, facing: FacingMode) -> Result<(), RecordingError> {
            if self.fail_on == Some(facing) {
                return Err(RecordingError::CameraUnavailable("denied".into()));
            }
            self.log.borrow_mut().events.push(format!("acquire {:?}", facing));
            Ok(())
        }

        fn release(&mut self) {
            self.log.borrow_mut().events.push("release".into());
        }

        fn supported_mime_types(&self) -> Vec<String> {
            self.supported.clone()
        }
    }

    #[test]
    fn test_select_mime_type() {
        assert_eq!(
            select_mime_type(&["video/mp4", "video/webm;codecs=vp8,opus"][..]),
            Some("video/webm;codecs=vp8,opus")
        );
        assert_eq!(select_mime_type(&["video/mp4"][..]), Some("video/mp4"));
        assert_eq!(select_mime_type(&["video/quicktime"][..]), None);
        assert_eq!(mime_essence("video/webm;codecs=vp8,opus"), "video/webm");
    }

    #[test]
    fn test_recording_filename_extension() {
        let name = recording_filename("video/mp4");
        assert!(name.starts_with("bowling-"));
        assert!(name.ends_with(".mp4"));
        assert!(!name.contains(':'));
        assert!(recording_filename("video/webm;codecs=vp8,opus").ends_with(".webm"));
    }

    #[test]
    fn test_recording_lifecycle() {
        let log = Rc::new(RefCell::new(Log::default()));
        let camera = FakeCamera::new(log.clone(), &["video/webm;codecs=vp8,opus", "video/webm"]);
        let mut recorder = Recorder::open(camera, FacingMode::Environment).unwrap();

        assert!(recorder.camera_ready());
        assert!(!recorder.is_recording());
        assert!(matches!(recorder.stop(), Err(RecordingError::NotRecording)));

        recorder.start().unwrap();
        assert!(recorder.is_recording());
        assert!(matches!(
            recorder.start(),
            Err(RecordingError::AlreadyRecording)
        ));

        recorder.push_chunk(b"abc".to_vec()).unwrap();
        recorder.push_chunk(Vec::new()).unwrap();
        recorder.push_chunk(b"defg".to_vec()).unwrap();

        let blob = recorder.stop().unwrap();
        assert_eq!(blob.as_bytes(), b"abcdefg");
        assert_eq!(blob.len(), 7);
        assert_eq!(blob.mime_type(), "video/webm");
        assert!(!recorder.is_recording());

        assert!(matches!(
            recorder.push_chunk(b"late".to_vec()),
            Err(RecordingError::NotRecording)
        ));

        recorder.close();
        assert_eq!(
            log.borrow().events,
            vec!["acquire Environment".to_string(), "release".to_string()]
        );
    }

    #[test]
    fn test_default_container_blob_type() {
        let log = Rc::new(RefCell::new(Log::default()));
        let camera = FakeCamera::new(log, &[]);
        let mut recorder = Recorder::open(camera, FacingMode::User).unwrap();

        recorder.start().unwrap();
        recorder.push_chunk(vec![1, 2, 3]).unwrap();
        let blob = recorder.stop().unwrap();
        assert_eq!(blob.mime_type(), DEFAULT_BLOB_TYPE);
    }

    #[test]
    fn test_toggle_camera_reacquires() {
        let log = Rc::new(RefCell::new(Log::default()));
        let camera = FakeCamera::new(log.clone(), &["video/mp4"]);
        let mut recorder = Recorder::open(camera, FacingMode::Environment).unwrap();

        assert_eq!(recorder.toggle_camera().unwrap(), FacingMode::User);
        assert_eq!(recorder.facing(), FacingMode::User);

        recorder.start().unwrap();
        assert!(matches!(
            recorder.toggle_camera(),
            Err(RecordingError::AlreadyRecording)
        ));
        recorder.stop().unwrap();

        drop(recorder);
        assert_eq!(
            log.borrow().events,
            vec![
                "acquire Environment".to_string(),
                "release".to_string(),
                "acquire User".to_string(),
                "release".to_string(),
            ]
        );
    }

    #[test]
    fn test_failed_reacquire_leaves_camera_unavailable() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut camera = FakeCamera::new(log, &["video/webm"]);
        camera.fail_on = Some(FacingMode::User);
        let mut recorder = Recorder::open(camera, FacingMode::Environment).unwrap();

        assert!(recorder.toggle_camera().is_err());
        assert!(!recorder.camera_ready());
        assert!(matches!(
            recorder.start(),
            Err(RecordingError::CameraUnavailable(_))
        ));
    }
}
