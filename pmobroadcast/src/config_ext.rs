//! Extension de pmoconfig pour les points de montage

use crate::mount::{MountDescriptor, StreamFormat};
use crate::worker::WorkerSettings;
use std::time::Duration;

/// Trait d'extension pour pmoconfig::Config
pub trait BroadcastConfigExt {
    /// Ogg passthrough mount, plus the mp3 transcoded one when enabled
    fn mount_descriptors(&self) -> Vec<MountDescriptor>;

    fn worker_settings(&self) -> WorkerSettings;
}

impl BroadcastConfigExt for pmoconfig::Config {
    fn mount_descriptors(&self) -> Vec<MountDescriptor> {
        let base = |format| {
            let mut d = MountDescriptor::new(
                self.get_icecast_host(),
                self.get_icecast_port(),
                &self.get_icecast_mount(),
                format,
            )
            .with_credentials(self.get_icecast_user(), self.get_icecast_password());
            d.name = self.get_icecast_name();
            d.description = self.get_icecast_description();
            d.genre = self.get_icecast_genre();
            d.url = self.get_icecast_url();
            d.public = self.get_icecast_public();
            d
        };

        let mut mounts = vec![base(StreamFormat::Ogg)];
        if self.get_transcode_enabled() {
            let bitrate = u32::try_from(self.get_transcode_bitrate()).unwrap_or(u32::MAX);
            mounts.push(base(StreamFormat::Mp3).transcoded(bitrate));
        }
        mounts
    }

    fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            chunk_size: self.get_worker_chunk_size(),
            max_retries: u32::try_from(self.get_worker_max_retries()).unwrap_or(u32::MAX),
            retry_delay: Duration::from_millis(self.get_worker_retry_delay_ms() as u64),
            ffmpeg: self.get_ffmpeg_path(),
            pace: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mounts_follow_transcode_switch() {
        let config = pmoconfig::Config::from_yaml_str(
            "icecast:\n  mount: /live\n  password: secret\ntranscode:\n  enabled: true\n  bitrate_kbps: 192\n",
            ".",
        )
        .unwrap();
        let mounts = config.mount_descriptors();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].mount, "/live.ogg");
        assert!(!mounts[0].transcode);
        assert_eq!(mounts[1].mount, "/live.mp3");
        assert_eq!(mounts[1].bitrate_kbps, Some(192));
        assert_eq!(mounts[1].password, "secret");

        let config = pmoconfig::Config::from_yaml_str("{}", ".").unwrap();
        assert_eq!(config.mount_descriptors().len(), 1);
        assert_eq!(config.worker_settings().chunk_size, 4096);
    }
}
