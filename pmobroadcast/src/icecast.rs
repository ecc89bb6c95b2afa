//! Client source Icecast
//!
//! The source connection is a plain HTTP `PUT` on the mount, kept open for
//! the lifetime of the connection; audio bytes are the request body.
//! Metadata for formats without in-band comments goes through the
//! `/admin/metadata` endpoint.

use crate::mount::MountDescriptor;
use crate::sink::{SinkFactory, StreamSink};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::prelude::*;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ADMIN_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RESPONSE_HEAD: usize = 8192;

/// Source connection to one Icecast mount
pub struct IcecastConnection {
    descriptor: MountDescriptor,
    stream: TcpStream,
    http: reqwest::Client,
}

impl IcecastConnection {
    pub async fn connect(descriptor: &MountDescriptor, http: reqwest::Client) -> Result<Self> {
        let addr = descriptor.addr();
        let connect_error = |source: io::Error| Error::Connect {
            addr: addr.clone(),
            source,
        };

        let mut stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| connect_error(io::ErrorKind::TimedOut.into()))?
            .map_err(connect_error)?;
        stream.set_nodelay(true)?;

        stream
            .write_all(source_request(descriptor).as_bytes())
            .await?;
        stream.flush().await?;

        let head = timeout(CONNECT_TIMEOUT, read_response_head(&mut stream))
            .await
            .map_err(|_| connect_error(io::ErrorKind::TimedOut.into()))??;
        let status = parse_status(&head)?;
        if status != 100 && status != 200 {
            return Err(Error::Handshake { status });
        }

        info!(mount = %descriptor, status, "Connected to Icecast");
        Ok(Self {
            descriptor: descriptor.clone(),
            stream,
            http,
        })
    }
}

fn source_request(d: &MountDescriptor) -> String {
    let credentials = BASE64_STANDARD.encode(format!("{}:{}", d.user, d.password));
    format!(
        "PUT {mount} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Authorization: Basic {credentials}\r\n\
         User-Agent: PMORadio/{version}\r\n\
         Content-Type: {content_type}\r\n\
         Expect: 100-continue\r\n\
         Ice-Public: {public}\r\n\
         Ice-Name: {name}\r\n\
         Ice-Description: {description}\r\n\
         Ice-Genre: {genre}\r\n\
         Ice-Url: {url}\r\n\
         Ice-Audio-Info: {audio_info}\r\n\
         \r\n",
        mount = d.mount,
        host = d.host,
        port = d.port,
        version = env!("CARGO_PKG_VERSION"),
        content_type = d.format.content_type(),
        public = u8::from(d.public),
        name = d.name,
        description = d.description,
        genre = d.genre,
        url = d.url,
        audio_info = d.audio_info(),
    )
}

async fn read_response_head(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection during handshake",
            )
            .into());
        }
        buf.push(byte[0]);
        if buf.len() > MAX_RESPONSE_HEAD {
            return Err(anyhow::anyhow!("response header too long").into());
        }
    }
    Ok(buf)
}

fn parse_status(head: &[u8]) -> Result<u16> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(anyhow::anyhow!("incomplete response").into());
        }
        Err(e) => return Err(anyhow::anyhow!("malformed response: {}", e).into()),
    }
    response
        .code
        .ok_or_else(|| anyhow::anyhow!("response without status").into())
}

#[async_trait]
impl StreamSink for IcecastConnection {
    async fn send(&mut self, chunk: &[u8]) -> Result<()> {
        self.stream.write_all(chunk).await.map_err(Error::Send)
    }

    async fn sync(&mut self) -> Result<()> {
        self.stream.flush().await.map_err(Error::Send)
    }

    async fn update_metadata(&mut self, song: &str) -> Result<()> {
        let d = &self.descriptor;
        let response = self
            .http
            .get(format!("http://{}/admin/metadata", d.addr()))
            .basic_auth(&d.user, Some(&d.password))
            .query(&[
                ("mount", d.mount.as_str()),
                ("mode", "updinfo"),
                ("song", song),
            ])
            .send()
            .await
            .map_err(|e| Error::Metadata(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Metadata(format!("server answered {}", status)));
        }
        debug!(mount = %d, song, "Metadata updated");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Opens real Icecast source connections
#[derive(Clone)]
pub struct IcecastFactory {
    http: reqwest::Client,
}

impl IcecastFactory {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(ADMIN_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Cannot build HTTP client: {}", e))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl SinkFactory for IcecastFactory {
    async fn connect(&self, descriptor: &MountDescriptor) -> Result<Box<dyn StreamSink>> {
        let connection = IcecastConnection::connect(descriptor, self.http.clone()).await?;
        Ok(Box::new(connection))
    }
}
