//! Transcodage ffmpeg en sous-processus
//!
//! The track file is ffmpeg's stdin, re-encoded mp3 comes out of its
//! stdout. A crash only affects the worker reading from it.

use crate::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

/// Running ffmpeg pipeline for one track
pub struct Transcoder {
    child: Child,
    stdout: ChildStdout,
}

impl Transcoder {
    pub async fn spawn(ffmpeg: &Path, input: &Path, bitrate_kbps: u32) -> Result<Self> {
        let file = tokio::fs::File::open(input).await?.into_std().await;
        let bitrate = format!("{}k", bitrate_kbps);

        let mut child = Command::new(ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i", "-"])
            .args(["-f", "mp3", "-ab", bitrate.as_str(), "-"])
            .stdin(Stdio::from(file))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Transcoder(format!("cannot start {}: {}", ffmpeg.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transcoder("ffmpeg stdout not captured".to_string()))?;

        debug!(input = %input.display(), bitrate = %bitrate, "Transcoder started");
        Ok(Self { child, stdout })
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stdout
            .read(buf)
            .await
            .map_err(|e| Error::Transcoder(format!("pipe read failed: {}", e)))
    }

    /// Waits for ffmpeg after end of stream; a non-zero exit is an error
    pub async fn finish(mut self) -> Result<()> {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Transcoder(format!("ffmpeg exited with {}", status)))
        }
    }

    /// Stops ffmpeg before the end of the track
    pub async fn abort(mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Transcoder already gone: {}", e);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn fake_ffmpeg(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn drain(transcoder: &mut Transcoder) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = transcoder.read(&mut buf).await.unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn test_pipes_file_through_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "cat");
        let input = dir.path().join("track.ogg");
        std::fs::write(&input, b"raw audio bytes").unwrap();

        let mut transcoder = Transcoder::spawn(&ffmpeg, &input, 128).await.unwrap();
        assert_eq!(drain(&mut transcoder).await, b"raw audio bytes");
        transcoder.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "cat >/dev/null; exit 3");
        let input = dir.path().join("track.ogg");
        std::fs::write(&input, b"raw").unwrap();

        let mut transcoder = Transcoder::spawn(&ffmpeg, &input, 128).await.unwrap();
        assert!(drain(&mut transcoder).await.is_empty());
        assert!(matches!(
            transcoder.finish().await,
            Err(Error::Transcoder(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("track.ogg");
        std::fs::write(&input, b"raw").unwrap();
        let result = Transcoder::spawn(&dir.path().join("nope"), &input, 128).await;
        assert!(matches!(result, Err(Error::Transcoder(_))));
    }
}
