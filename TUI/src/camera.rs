//! Camera boundary.
//!
//! A `CameraDevice` hands out a `MediaStream`; `CameraSession` owns at most
//! one live stream. A capture moves the stream into a `PendingCapture` that
//! runs on a background task, so a slow device never stalls the UI loop.
//! The stream is stopped exactly once: after a good frame, on release, or
//! when its owner is dropped. A failed grab hands the stream back.

use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::CameraError;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Which way the requested camera faces. Problems on paper are shot with
/// the rear camera, the only one requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Environment,
}

#[async_trait]
pub trait MediaStream: Send {
    /// Grab one still frame as PNG bytes.
    async fn grab_frame(&mut self) -> Result<Vec<u8>, CameraError>;

    /// Stop all tracks. Called at most once.
    fn stop(&mut self);
}

pub trait CameraDevice: Send {
    fn open(&mut self, facing: Facing) -> Result<Box<dyn MediaStream>, CameraError>;
}

/// Exclusive owner of the live camera stream.
pub struct CameraSession {
    device: Box<dyn CameraDevice>,
    stream: Option<Box<dyn MediaStream>>,
}

impl CameraSession {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self { device, stream: None }
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_some()
    }

    /// Acquire a rear-facing stream. A no-op while one is already live.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = self.device.open(Facing::Environment)?;
        info!("camera stream acquired");
        self.stream = Some(stream);
        Ok(())
    }

    /// Hand the live stream to a capture that gives up after `timeout`.
    pub fn begin_capture(&mut self, timeout: Duration) -> Result<PendingCapture, CameraError> {
        let stream = self.stream.take().ok_or(CameraError::NotStreaming)?;
        Ok(PendingCapture { stream: Some(stream), timeout })
    }

    /// Take back what a capture left behind. A stream returned by a failed
    /// grab becomes live again.
    pub fn finish_capture(&mut self, outcome: CaptureOutcome) -> Result<Vec<u8>, CameraError> {
        if let Some(mut stream) = outcome.stream {
            if self.stream.is_none() {
                self.stream = Some(stream);
            } else {
                stream.stop();
            }
        }
        outcome.frame
    }

    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("camera stream released");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// A capture in flight. Owns the stream until the grab settles.
pub struct PendingCapture {
    stream: Option<Box<dyn MediaStream>>,
    timeout: Duration,
}

impl PendingCapture {
    pub async fn run(mut self) -> CaptureOutcome {
        let Some(stream) = self.stream.as_mut() else {
            return CaptureOutcome::failed(CameraError::NotStreaming);
        };

        let frame = match tokio::time::timeout(self.timeout, stream.grab_frame()).await {
            Ok(frame) => frame,
            Err(_) => Err(CameraError::CaptureFailed(format!(
                "no frame within {}ms",
                self.timeout.as_millis()
            ))),
        };

        match frame {
            Ok(png) => {
                if let Some(mut stream) = self.stream.take() {
                    stream.stop();
                    info!("camera stream released after capture");
                }
                CaptureOutcome { frame: Ok(png), stream: None }
            }
            Err(e) => {
                warn!(error = %e, "frame grab failed");
                CaptureOutcome { frame: Err(e), stream: self.stream.take() }
            }
        }
    }
}

impl Drop for PendingCapture {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }
}

impl fmt::Debug for PendingCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCapture").field("timeout", &self.timeout).finish()
    }
}

/// Result of a capture plus the stream when it is still usable.
pub struct CaptureOutcome {
    frame: Result<Vec<u8>, CameraError>,
    stream: Option<Box<dyn MediaStream>>,
}

impl CaptureOutcome {
    /// A capture that never produced a frame and lost its stream.
    pub fn failed(error: CameraError) -> Self {
        Self { frame: Err(error), stream: None }
    }
}

/// V4L2 camera read through `ffmpeg`.
///
/// Opening holds the device node; each grab asks ffmpeg for a single PNG
/// frame on stdout.
pub struct FfmpegCamera {
    device: PathBuf,
    program: String,
}

impl FfmpegCamera {
    pub fn new(device: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self { device: device.into(), program: program.into() }
    }
}

impl CameraDevice for FfmpegCamera {
    fn open(&mut self, _facing: Facing) -> Result<Box<dyn MediaStream>, CameraError> {
        // A V4L2 node has no facing; the configured device is taken to be the rear one.
        let handle = File::open(&self.device).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::PermissionDenied => "permission denied".to_string(),
                ErrorKind::NotFound => "no such device".to_string(),
                _ => e.to_string(),
            };
            CameraError::AccessDenied(format!("{}: {}", self.device.display(), reason))
        })?;

        Ok(Box::new(FfmpegStream {
            device: self.device.clone(),
            program: self.program.clone(),
            handle: Some(handle),
        }))
    }
}

struct FfmpegStream {
    device: PathBuf,
    program: String,
    handle: Option<File>,
}

#[async_trait]
impl MediaStream for FfmpegStream {
    async fn grab_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        if self.handle.is_none() {
            return Err(CameraError::NotStreaming);
        }
        grab_png(&self.program, &self.device).await
    }

    fn stop(&mut self) {
        self.handle = None;
    }
}

async fn grab_png(program: &str, device: &Path) -> Result<Vec<u8>, CameraError> {
    // A timed-out grab drops this future; the child goes with it.
    let output = tokio::process::Command::new(program)
        .args(["-loglevel", "error", "-f", "v4l2", "-i"])
        .arg(device)
        .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CameraError::CaptureFailed(format!("{}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(CameraError::CaptureFailed(stderr));
    }
    if !output.stdout.starts_with(&PNG_SIGNATURE) {
        return Err(CameraError::CaptureFailed("capture output is not a PNG".to_string()));
    }
    Ok(output.stdout)
}

/// Stand-in when the camera is disabled on the command line.
pub struct NoCamera;

impl CameraDevice for NoCamera {
    fn open(&mut self, _facing: Facing) -> Result<Box<dyn MediaStream>, CameraError> {
        Err(CameraError::AccessDenied("camera disabled".to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockCamera;
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    async fn capture(
        session: &mut CameraSession,
        timeout: Duration,
    ) -> Result<Vec<u8>, CameraError> {
        let pending = session.begin_capture(timeout)?;
        let outcome = pending.run().await;
        session.finish_capture(outcome)
    }

    #[tokio::test]
    async fn test_capture_stops_stream_exactly_once() {
        let cam = MockCamera::default();
        let mut session = CameraSession::new(Box::new(cam.clone()));

        session.start().unwrap();
        let frame = capture(&mut session, WAIT).await.unwrap();

        assert!(frame.starts_with(&PNG_SIGNATURE));
        assert_eq!(cam.stops(), 1);
        assert!(!session.is_live());

        session.release();
        drop(session);
        assert_eq!(cam.stops(), 1);
    }

    #[test]
    fn test_start_is_idempotent_while_live() {
        let cam = MockCamera::default();
        let mut session = CameraSession::new(Box::new(cam.clone()));

        session.start().unwrap();
        session.start().unwrap();

        assert_eq!(cam.opens(), 1);
    }

    #[test]
    fn test_drop_releases_live_stream() {
        let cam = MockCamera::default();
        {
            let mut session = CameraSession::new(Box::new(cam.clone()));
            session.start().unwrap();
        }
        assert_eq!(cam.stops(), 1);
    }

    #[tokio::test]
    async fn test_failed_grab_keeps_stream_open() {
        let cam = MockCamera { fail_grab: true, ..MockCamera::default() };
        let mut session = CameraSession::new(Box::new(cam.clone()));

        session.start().unwrap();
        assert!(matches!(capture(&mut session, WAIT).await, Err(CameraError::CaptureFailed(_))));
        assert!(session.is_live());
        assert_eq!(cam.stops(), 0);
    }

    #[tokio::test]
    async fn test_hung_grab_times_out_and_returns_stream() {
        let cam = MockCamera { hang: true, ..MockCamera::default() };
        let mut session = CameraSession::new(Box::new(cam.clone()));
        session.start().unwrap();

        let pending = session.begin_capture(Duration::from_millis(20)).unwrap();
        assert!(!session.is_live());
        let outcome = pending.run().await;

        assert!(matches!(session.finish_capture(outcome), Err(CameraError::CaptureFailed(_))));
        assert!(session.is_live());
        assert_eq!(cam.stops(), 0);
    }

    #[tokio::test]
    async fn test_dropped_capture_stops_stream() {
        let cam = MockCamera::default();
        let mut session = CameraSession::new(Box::new(cam.clone()));
        session.start().unwrap();

        let pending = session.begin_capture(WAIT).unwrap();
        drop(pending);

        assert_eq!(cam.stops(), 1);
        drop(session);
        assert_eq!(cam.stops(), 1);
    }

    #[test]
    fn test_capture_without_stream() {
        let mut session = CameraSession::new(Box::new(MockCamera::default()));
        assert!(matches!(session.begin_capture(WAIT), Err(CameraError::NotStreaming)));
    }

    #[test]
    fn test_missing_device_is_access_denied() {
        let mut cam = FfmpegCamera::new("/nonexistent/video9", "ffmpeg");
        match cam.open(Facing::Environment) {
            Err(CameraError::AccessDenied(msg)) => assert!(msg.contains("no such device")),
            _ => panic!("expected AccessDenied"),
        }
    }

    #[test]
    fn test_no_camera_denies() {
        assert!(matches!(NoCamera.open(Facing::Environment), Err(CameraError::AccessDenied(_))));
    }

    #[cfg(unix)]
    mod ffmpeg {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// A stand-in capture program that ignores its arguments.
        fn fake_ffmpeg(dir: &tempfile::TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("fake-ffmpeg.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_ffmpeg_grab_reads_png_from_stdout() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(&dir, r"printf '\211PNG\r\n\032\nframe'");
            let cam = FfmpegCamera::new("/dev/null", program.to_string_lossy());
            let mut session = CameraSession::new(Box::new(cam));
            session.start().unwrap();

            let frame = capture(&mut session, WAIT).await.unwrap();
            assert!(frame.starts_with(&PNG_SIGNATURE));
            assert!(!session.is_live());
        }

        #[tokio::test(flavor = "current_thread")]
        async fn test_slow_grab_leaves_runtime_responsive() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(&dir, r"sleep 5; printf '\211PNG\r\n\032\n'");
            let cam = FfmpegCamera::new("/dev/null", program.to_string_lossy());
            let mut session = CameraSession::new(Box::new(cam));
            session.start().unwrap();

            let ticker = tokio::spawn(async {
                let mut interval = tokio::time::interval(Duration::from_millis(10));
                for _ in 0..5 {
                    interval.tick().await;
                }
            });

            let started = std::time::Instant::now();
            let pending = session.begin_capture(Duration::from_millis(300)).unwrap();
            let outcome = pending.run().await;

            assert!(started.elapsed() < Duration::from_secs(3));
            assert!(ticker.is_finished());
            assert!(matches!(session.finish_capture(outcome), Err(CameraError::CaptureFailed(_))));
            assert!(session.is_live());
        }
    }
}
