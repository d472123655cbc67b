//! SSDP discovery responder: a UDP multicast listener that answers
//! `M-SEARCH` requests with a unicast reply. Only the M-SEARCH response
//! half of SSDP is implemented — no periodic alive/byebye announcements.

use std::net::{Ipv4Addr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EemsError, Result};

const SSDP_PORT: u16 = 1900;
const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const SSDP_MULTICAST_TTL: u32 = 4;
const ROOT_DEVICE_ST: &str = "upnp:rootdevice";
const MEDIA_SERVER_ST: &str = "urn:schemas-upnp-org:device:MediaServer:1";

pub struct SsdpResponder {
    socket: UdpSocket,
    base_url: String,
    server_uuid: Uuid,
}

impl SsdpResponder {
    pub fn bind(base_url: String, server_uuid: Uuid) -> Result<SsdpResponder> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| EemsError::Fatal(format!("cannot create SSDP socket: {e}")))?;
        socket.set_reuse_address(true).map_err(|e| EemsError::Fatal(e.to_string()))?;
        #[cfg(unix)]
        socket.set_reuse_port(true).map_err(|e| EemsError::Fatal(e.to_string()))?;
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SSDP_PORT);
        socket
            .bind(&bind_addr.into())
            .map_err(|e| EemsError::Fatal(format!("cannot bind SSDP port {SSDP_PORT}: {e}")))?;
        socket
            .join_multicast_v4(&SSDP_MULTICAST_ADDR, &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| EemsError::Fatal(format!("cannot join SSDP multicast group: {e}")))?;
        socket.set_multicast_ttl_v4(SSDP_MULTICAST_TTL).map_err(|e| EemsError::Fatal(e.to_string()))?;
        socket.set_nonblocking(true).map_err(|e| EemsError::Fatal(e.to_string()))?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket).map_err(|e| EemsError::Fatal(e.to_string()))?;

        Ok(SsdpResponder { socket, base_url, server_uuid })
    }

    /// Runs the receive loop until the process shuts down. Malformed
    /// datagrams are logged and skipped; the loop never exits on a
    /// parse error.
    pub async fn run(self) -> Result<()> {
        info!(port = SSDP_PORT, "SSDP responder listening");
        let mut buf = [0u8; 1500];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "SSDP recv error, continuing");
                    continue;
                }
            };
            let Some(request) = parse_request(&buf[..len]) else {
                debug!(%from, "dropping unparsable SSDP datagram");
                continue;
            };
            if let Some(st) = matches_filter(&request) {
                let reply = self.build_reply(st);
                if let Err(e) = self.socket.send_to(reply.as_bytes(), from).await {
                    warn!(%from, error = %e, "failed to send SSDP reply");
                }
            }
        }
    }

    fn build_reply(&self, st: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nCache-Control: max-age=1800\r\nLocation: {}/upnp/device\r\nST: {}\r\nUSN: uuid:{}::{}\r\nEXT:\r\n\r\n",
            self.base_url, st, self.server_uuid, st
        )
    }
}

struct SsdpRequest {
    method: String,
    target: String,
    headers: std::collections::HashMap<String, String>,
}

fn parse_request(data: &[u8]) -> Option<SsdpRequest> {
    let text = std::str::from_utf8(data).ok()?;
    let mut lines = text.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = std::collections::HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_uppercase(), value.trim().to_string());
        }
    }

    Some(SsdpRequest { method, target, headers })
}

/// Returns the echoed `ST` value if `request` passes the M-SEARCH
/// filter, `None` otherwise.
fn matches_filter(request: &SsdpRequest) -> Option<&str> {
    if request.method != "M-SEARCH" || request.target != "*" {
        return None;
    }
    let man = request.headers.get("MAN")?;
    if man != "\"ssdp:discover\"" {
        return None;
    }
    let st = request.headers.get("ST")?;
    if st == ROOT_DEVICE_ST || st == MEDIA_SERVER_ST {
        Some(st.as_str())
    } else {
        None
    }
}
