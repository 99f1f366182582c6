//! UDP transmission of RTP packets.

use anyhow::{Context, Result};
use rtp_red_common::RtpPacket;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error};

/// UDP sender for RTP packets.
///
/// Send failures are logged and counted but never stop the stream; a
/// dropped datagram is exactly what RED is there to cover.
///
/// # Example
///
/// ```ignore
/// use red_sender::network::RtpSender;
///
/// let mut sender = RtpSender::new("127.0.0.1:5004").await?;
/// sender.send(&packet).await?;
/// ```
pub struct RtpSender {
    // ---
    socket: UdpSocket,
    remote_addr: String,
    packets_sent: u64,
    bytes_sent: u64,
    send_errors: u64,
}

impl RtpSender {
    // ---
    /// Creates a sender bound to an ephemeral port.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - Destination address in "IP:port" format
    ///
    /// # Errors
    ///
    /// Returns error if socket binding fails.
    pub async fn new(remote_addr: impl Into<String>) -> Result<Self> {
        // ---
        let remote_addr = remote_addr.into();

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("failed to bind UDP socket")?;

        debug!("UDP socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            remote_addr,
            packets_sent: 0,
            bytes_sent: 0,
            send_errors: 0,
        })
    }

    /// Local address of the socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        // ---
        self.socket
            .local_addr()
            .context("failed to read local address")
    }

    /// Serializes and sends one RTP packet.
    ///
    /// # Errors
    ///
    /// Returns error only if the packet cannot be serialized; network
    /// failures are logged.
    pub async fn send(&mut self, packet: &RtpPacket) -> Result<usize> {
        // ---
        let data = packet
            .serialize()
            .with_context(|| format!("failed to serialize RTP packet seq={}", packet.sequence))?;

        Ok(self.send_raw(&data).await)
    }

    /// Sends bytes that are already in wire format.
    ///
    /// Returns the number of bytes sent, 0 if the send failed.
    pub async fn send_raw(&mut self, data: &[u8]) -> usize {
        // ---
        match self.socket.send_to(data, &self.remote_addr).await {
            Ok(bytes) => {
                self.packets_sent += 1;
                self.bytes_sent += bytes as u64;

                if self.packets_sent.is_multiple_of(100) {
                    debug!(
                        "Sent {} packets ({} bytes)",
                        self.packets_sent, self.bytes_sent
                    );
                }
                bytes
            }
            Err(e) => {
                self.send_errors += 1;
                error!("Failed to send {} bytes to {}: {}", data.len(), self.remote_addr, e);
                0
            }
        }
    }

    /// Returns (packets sent, bytes sent).
    pub fn stats(&self) -> (u64, u64) {
        // ---
        (self.packets_sent, self.bytes_sent)
    }

    /// Number of failed sends.
    pub fn send_errors(&self) -> u64 {
        // ---
        self.send_errors
    }
}
