//! Source d'octets d'un morceau : fichier brut ou sortie ffmpeg

use crate::mount::MountDescriptor;
use crate::transcoder::Transcoder;
use crate::Result;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Débit de transcodage utilisé si le montage n'en précise pas
pub const DEFAULT_TRANSCODE_KBPS: u32 = 128;

/// Active byte source of a worker for the current track
pub enum AudioSource {
    Passthrough(File),
    Transcoded(Transcoder),
}

impl AudioSource {
    pub async fn open(descriptor: &MountDescriptor, ffmpeg: &Path, track: &Path) -> Result<Self> {
        if descriptor.transcode {
            let bitrate = descriptor.bitrate_kbps.unwrap_or(DEFAULT_TRANSCODE_KBPS);
            Ok(AudioSource::Transcoded(
                Transcoder::spawn(ffmpeg, track, bitrate).await?,
            ))
        } else {
            Ok(AudioSource::Passthrough(File::open(track).await?))
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            AudioSource::Passthrough(file) => Ok(file.read(buf).await?),
            AudioSource::Transcoded(transcoder) => transcoder.read(buf).await,
        }
    }

    /// Releases the source; `completed` is false after a skip or an error
    pub async fn finish(self, completed: bool) -> Result<()> {
        match self {
            AudioSource::Passthrough(_) => Ok(()),
            AudioSource::Transcoded(transcoder) if completed => transcoder.finish().await,
            AudioSource::Transcoded(transcoder) => {
                transcoder.abort().await;
                Ok(())
            }
        }
    }
}
