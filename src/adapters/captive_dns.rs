//! Wildcard DNS responder for the setup access point.
//!
//! Every A (or ANY) question is answered with the AP address so phones
//! and laptops open their captive-portal browser on the setup page.
//! Other query types get an empty NOERROR answer.  Uses a plain
//! `std::net::UdpSocket`, which lwIP provides on ESP-IDF.

use core::net::Ipv4Addr;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use log::{debug, info};

pub const DNS_PORT: u16 = 53;
pub const ANSWER_TTL_SECS: u32 = 60;

/// Classic DNS-over-UDP payload limit.
const MAX_PACKET: usize = 512;
const HEADER_LEN: usize = 12;
const RECV_TIMEOUT: Duration = Duration::from_millis(10);

const QTYPE_A: u16 = 1;
const QTYPE_ANY: u16 = 255;
/// QR=1, RD=1, RA=1, RCODE=0.
const RESPONSE_FLAGS: u16 = 0x8180;
/// Compression pointer to the question name at offset 12.
const NAME_POINTER: u16 = 0xC00C;

// ───────────────────────────────────────────────────────────────
// Packet handling
// ───────────────────────────────────────────────────────────────

/// Build the response to `query`, or `None` if it is not a well-formed
/// standard query with at least one question.  Only the first question
/// is answered.
pub fn answer(query: &[u8], ip: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([query[2], query[3]]);
    let is_response = flags & 0x8000 != 0;
    let opcode = (flags >> 11) & 0x0F;
    let qdcount = u16::from_be_bytes([query[4], query[5]]);
    if is_response || opcode != 0 || qdcount == 0 {
        return None;
    }

    let question_end = question_end(query)?;
    let qtype = u16::from_be_bytes([query[question_end - 4], query[question_end - 3]]);
    let answered = qtype == QTYPE_A || qtype == QTYPE_ANY;

    let mut out = Vec::with_capacity(question_end + 16);
    out.extend_from_slice(&query[0..2]);
    out.extend_from_slice(&RESPONSE_FLAGS.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&u16::from(answered).to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.extend_from_slice(&query[HEADER_LEN..question_end]);

    if answered {
        out.extend_from_slice(&NAME_POINTER.to_be_bytes());
        out.extend_from_slice(&QTYPE_A.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&ip.octets());
    }
    Some(out)
}

/// Offset just past QTYPE/QCLASS of the first question.
fn question_end(packet: &[u8]) -> Option<usize> {
    let mut i = HEADER_LEN;
    loop {
        let len = usize::from(*packet.get(i)?);
        if len == 0 {
            i += 1;
            break;
        }
        // Pointers and extended label types never appear in a sane query.
        if len > 63 {
            return None;
        }
        i += 1 + len;
    }
    let end = i + 4;
    (end <= packet.len()).then_some(end)
}

// ───────────────────────────────────────────────────────────────
// UDP server
// ───────────────────────────────────────────────────────────────

pub struct CaptiveDns {
    socket: UdpSocket,
    ip: Ipv4Addr,
}

impl CaptiveDns {
    /// Listen on UDP/53 on all interfaces, answering with `ip`.
    pub fn bind(ip: Ipv4Addr) -> io::Result<Self> {
        Self::bind_to(SocketAddr::from((Ipv4Addr::UNSPECIFIED, DNS_PORT)), ip)
    }

    pub fn bind_to(addr: SocketAddr, ip: Ipv4Addr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        info!("DNS: captive responder on {} -> {}", socket.local_addr()?, ip);
        Ok(Self { socket, ip })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle at most one pending query.  Returns `true` if a response was
    /// sent.  Waits no longer than the socket read timeout.
    pub fn process_next(&self) -> bool {
        let mut buf = [0u8; MAX_PACKET];
        let (len, peer) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return false;
            }
            Err(e) => {
                debug!("DNS: recv failed: {}", e);
                return false;
            }
        };
        let Some(response) = answer(&buf[..len], self.ip) else {
            debug!("DNS: ignoring {} byte packet from {}", len, peer);
            return false;
        };
        match self.socket.send_to(&response, peer) {
            Ok(_) => true,
            Err(e) => {
                debug!("DNS: send to {} failed: {}", peer, e);
                false
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
