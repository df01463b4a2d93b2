//! Startup banner: where viewers can reach the relay.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;
use tracing::info;

/// Any routable address works; nothing is sent.
const ROUTE_PROBE: &str = "8.8.8.8:80";

/// IPv4 address of the default outbound route, if there is one.
///
/// Connecting a UDP socket only selects a route, so this works offline as long
/// as a default route exists.
pub async fn primary_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    socket.connect(ROUTE_PROBE).await.ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// URLs to advertise for a relay bound to `host` and listening on `addr`.
pub fn viewer_urls(host: &str, addr: SocketAddr, lan: Option<Ipv4Addr>) -> Vec<String> {
    let port = addr.port();
    let mut urls = vec![format!("http://localhost:{port}")];
    let bound: Option<IpAddr> = host.parse().ok();
    match bound {
        Some(ip) if ip.is_unspecified() => {
            if let Some(lan) = lan {
                urls.push(format!("http://{lan}:{port}"));
            }
        }
        Some(ip) if ip.is_loopback() => {}
        Some(IpAddr::V6(ip)) => urls.push(format!("http://[{ip}]:{port}")),
        Some(IpAddr::V4(ip)) => urls.push(format!("http://{ip}:{port}")),
        None if host != "localhost" => urls.push(format!("http://{host}:{port}")),
        None => {}
    }
    urls
}

/// Log the viewer URLs.
pub async fn announce(host: &str, addr: SocketAddr) {
    let lan = primary_ipv4().await;
    for url in viewer_urls(host, addr, lan) {
        info!(%url, "viewer available");
    }
}
