use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use log::trace;

use super::codec::PacketBuffer;
use super::protocol::{PacketHeader, HEADER_SIZE};
use super::stats::NetworkStats;

/// Non-blocking UDP endpoint shared by host and client.
///
/// Receives are drained until the socket would block; datagrams that are too
/// short, fail the magic check, or do not contain their declared payload are
/// dropped before they reach the caller.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: NetworkStats,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            stats: NetworkStats::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn send_to(&mut self, buffer: &PacketBuffer, addr: SocketAddr) -> io::Result<usize> {
        let bytes = self.socket.send_to(&buffer.data[..buffer.write_pos], addr)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        Ok(bytes)
    }

    /// Drain every pending datagram. Returned buffers are positioned just
    /// past the header, ready for payload reads.
    pub fn receive(&mut self) -> io::Result<Vec<(PacketHeader, PacketBuffer, SocketAddr)>> {
        let mut packets = Vec::new();

        loop {
            let mut buffer = PacketBuffer::new();
            match self.socket.recv_from(&mut buffer.data) {
                Ok((size, addr)) => {
                    if size < HEADER_SIZE {
                        trace!("dropping runt datagram ({} bytes) from {}", size, addr);
                        continue;
                    }

                    buffer.write_pos = size;
                    let header = buffer.read_header();
                    if !header.is_valid() {
                        trace!("dropping datagram with bad magic from {}", addr);
                        continue;
                    }
                    if buffer.remaining() < header.payload_size as usize {
                        trace!("dropping truncated datagram from {}", addr);
                        continue;
                    }

                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;
                    packets.push((header, buffer, addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        Ok(packets)
    }
}
