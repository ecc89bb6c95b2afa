//! Description immuable d'un point de montage Icecast

use std::fmt;

/// Encodage diffusé sur un point de montage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFormat {
    Ogg,
    Mp3,
}

impl StreamFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StreamFormat::Ogg => "ogg",
            StreamFormat::Mp3 => "mp3",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            StreamFormat::Ogg => "application/ogg",
            StreamFormat::Mp3 => "audio/mpeg",
        }
    }

    /// Ogg carries its comments in-stream, mp3 needs the admin endpoint
    pub fn needs_metadata_update(self) -> bool {
        matches!(self, StreamFormat::Mp3)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Static connection parameters of one output
///
/// Never mutated after construction: a reconnect builds a fresh
/// connection from the same descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Chemin complet du montage, extension comprise (`/radio.ogg`)
    pub mount: String,
    pub format: StreamFormat,
    /// Re-encode the source through ffmpeg before sending
    pub transcode: bool,
    pub bitrate_kbps: Option<u32>,
    pub channels: u8,
    pub name: String,
    pub description: String,
    pub genre: String,
    pub url: String,
    pub public: bool,
}

impl MountDescriptor {
    /// Descriptor for `base_mount` + format extension, with default station info
    pub fn new(host: impl Into<String>, port: u16, base_mount: &str, format: StreamFormat) -> Self {
        Self {
            host: host.into(),
            port,
            user: "source".to_string(),
            password: String::new(),
            mount: format!("{}.{}", base_mount, format.extension()),
            format,
            transcode: false,
            bitrate_kbps: None,
            channels: 2,
            name: String::new(),
            description: String::new(),
            genre: String::new(),
            url: String::new(),
            public: false,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Sortie transcodée par ffmpeg au débit donné
    pub fn transcoded(mut self, bitrate_kbps: u32) -> Self {
        self.transcode = true;
        self.bitrate_kbps = Some(bitrate_kbps);
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `Ice-Audio-Info` header value
    pub fn audio_info(&self) -> String {
        match self.bitrate_kbps {
            Some(bitrate) => format!("channels={};bitrate={}", self.channels, bitrate),
            None => format!("channels={}", self.channels),
        }
    }
}

impl fmt::Display for MountDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.addr(), self.mount)
    }
}
