use std::{
    io::ErrorKind,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};

use crate::{
    config::NetworkConfig,
    protocol::{self, ControlMessage, Telemetry},
};

const MAX_CONTROL_DATAGRAM: usize = 1024;

const GUIDE_COOLDOWN: Duration = Duration::from_secs(3);
const GUIDE_REPEAT_COOLDOWN: Duration = Duration::from_secs(8);
const GUIDE_FORCED_COOLDOWN: Duration = Duration::from_secs(1);

/// UDP endpoints towards the headset: one socket for telemetry, one bound
/// socket for start/stop control messages.
pub struct HeadsetLink {
    sender: UdpSocket,
    control: UdpSocket,
    headset_addr: SocketAddr,
}

impl HeadsetLink {
    pub fn bind(config: &NetworkConfig) -> Result<Self> {
        let headset_addr = config
            .headset_addr
            .to_socket_addrs()
            .with_context(|| format!("invalid headset address {}", config.headset_addr))?
            .next()
            .ok_or_else(|| anyhow!("headset address {} did not resolve", config.headset_addr))?;

        let local = if headset_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let sender = UdpSocket::bind(local).context("failed to bind telemetry socket")?;

        let control = UdpSocket::bind(&config.listen_addr)
            .with_context(|| format!("failed to bind control socket on {}", config.listen_addr))?;
        control
            .set_nonblocking(true)
            .context("failed to make control socket non-blocking")?;

        Ok(Self {
            sender,
            control,
            headset_addr,
        })
    }

    pub fn headset_addr(&self) -> SocketAddr {
        self.headset_addr
    }

    #[cfg(test)]
    pub fn control_addr(&self) -> Result<SocketAddr> {
        Ok(self.control.local_addr()?)
    }

    /// Fire-and-forget; failures are logged and swallowed.
    pub fn send(&self, message: &Telemetry) {
        let payload = match protocol::encode(message) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("failed to encode {message:?}: {err}");
                return;
            }
        };

        if let Err(err) = self.sender.send_to(&payload, self.headset_addr) {
            log::debug!("telemetry send to {} failed: {err}", self.headset_addr);
        }
    }

    /// Single non-blocking read of the control socket.
    pub fn poll_control(&self) -> Option<ControlMessage> {
        let mut buf = [0u8; MAX_CONTROL_DATAGRAM];
        match self.control.recv_from(&mut buf) {
            Ok((len, peer)) => decode_from(&buf[..len], peer),
            Err(err) if is_timeout(err.kind()) => None,
            Err(err) => {
                log::warn!("control socket read failed: {err}");
                None
            }
        }
    }

    /// Blocks for at most `timeout` waiting for a control message.
    pub fn wait_control(&self, timeout: Duration) -> Option<ControlMessage> {
        if let Err(err) = self.control.set_nonblocking(false) {
            log::warn!("failed to switch control socket to blocking: {err}");
            return self.poll_control();
        }
        if let Err(err) = self
            .control
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))
        {
            log::warn!("failed to set control read timeout: {err}");
            self.restore_nonblocking();
            return self.poll_control();
        }

        let mut buf = [0u8; MAX_CONTROL_DATAGRAM];
        let received = self.control.recv_from(&mut buf);
        self.restore_nonblocking();

        match received {
            Ok((len, peer)) => decode_from(&buf[..len], peer),
            Err(err) if is_timeout(err.kind()) => None,
            Err(err) => {
                log::warn!("control socket wait failed: {err}");
                None
            }
        }
    }

    fn restore_nonblocking(&self) {
        if let Err(err) = self.control.set_nonblocking(true) {
            log::warn!("failed to restore non-blocking control socket: {err}");
        }
    }
}

fn decode_from(payload: &[u8], peer: SocketAddr) -> Option<ControlMessage> {
    match protocol::decode_control(payload) {
        Ok(message) => {
            log::debug!("control message from {peer}: {message:?}");
            Some(message)
        }
        Err(err) => {
            log::warn!("ignoring control datagram from {peer}: {err}");
            None
        }
    }
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Rate limiter for spoken coach lines.
#[derive(Debug, Default)]
pub struct GuideThrottle {
    last_text: Option<String>,
    last_sent: Option<Instant>,
}

impl GuideThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `text` may be sent now, and records it as sent.
    pub fn admit(&mut self, text: &str, force: bool, now: Instant) -> bool {
        let cooldown = if force {
            GUIDE_FORCED_COOLDOWN
        } else if self.last_text.as_deref() == Some(text) {
            GUIDE_REPEAT_COOLDOWN
        } else {
            GUIDE_COOLDOWN
        };

        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < cooldown {
                return false;
            }
        }

        self.record(text, now);
        true
    }

    /// Marks `text` as sent without checking the cooldown.
    pub fn record(&mut self, text: &str, now: Instant) {
        self.last_text = Some(text.to_owned());
        self.last_sent = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_link() -> (HeadsetLink, UdpSocket) {
        let headset = UdpSocket::bind("127.0.0.1:0").unwrap();
        headset
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let config = NetworkConfig {
            headset_addr: headset.local_addr().unwrap().to_string(),
            listen_addr: "127.0.0.1:0".to_string(),
            standby_poll_ms: 50,
        };
        (HeadsetLink::bind(&config).unwrap(), headset)
    }

    #[test]
    fn telemetry_reaches_the_headset() {
        let (link, headset) = loopback_link();
        link.send(&Telemetry::Knee { is_good: true });

        let mut buf = [0u8; 256];
        let (len, _) = headset.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], br#"{"type": "knee", "isGood": true}"#);
    }

    #[test]
    fn poll_without_traffic_returns_none() {
        let (link, _headset) = loopback_link();
        assert_eq!(link.poll_control(), None);
    }

    #[test]
    fn wait_receives_start_message() {
        let (link, headset) = loopback_link();
        let control = link.control_addr().unwrap();
        headset
            .send_to(br#"{"type": "start", "difficulty": "Easy"}"#, control)
            .unwrap();

        let message = link.wait_control(Duration::from_secs(2));
        assert_eq!(
            message,
            Some(ControlMessage::Start {
                difficulty: Some("Easy".to_string())
            })
        );
        // Socket is back in non-blocking mode.
        assert_eq!(link.poll_control(), None);
    }

    #[test]
    fn wait_times_out_quietly() {
        let (link, _headset) = loopback_link();
        assert_eq!(link.wait_control(Duration::from_millis(20)), None);
    }

    #[test]
    fn malformed_control_is_dropped() {
        let (link, headset) = loopback_link();
        let control = link.control_addr().unwrap();
        headset.send_to(b"{oops", control).unwrap();
        assert_eq!(link.wait_control(Duration::from_secs(2)), None);
    }

    #[test]
    fn throttle_applies_normal_cooldown() {
        let mut throttle = GuideThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.admit("a", false, t0));
        assert!(!throttle.admit("b", false, t0 + Duration::from_millis(2_900)));
        assert!(throttle.admit("b", false, t0 + Duration::from_secs(3)));
    }

    #[test]
    fn throttle_holds_repeats_longer() {
        let mut throttle = GuideThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.admit("same", false, t0));
        assert!(!throttle.admit("same", false, t0 + Duration::from_secs(5)));
        assert!(throttle.admit("same", false, t0 + Duration::from_secs(8)));
    }

    #[test]
    fn forced_lines_wait_one_second() {
        let mut throttle = GuideThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.admit("3", true, t0));
        assert!(!throttle.admit("2", true, t0 + Duration::from_millis(500)));
        assert!(throttle.admit("2", true, t0 + Duration::from_secs(1)));
        // a forced repeat ignores the repeat cooldown
        assert!(throttle.admit("2", true, t0 + Duration::from_secs(2)));
    }

    #[test]
    fn recorded_line_starts_the_cooldown() {
        let mut throttle = GuideThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.admit("a", true, t0));
        throttle.record("b", t0 + Duration::from_millis(200));
        assert!(!throttle.admit("b", false, t0 + Duration::from_secs(5)));
        assert!(throttle.admit("c", false, t0 + Duration::from_millis(3_200)));
    }

    #[test]
    fn wait_leaves_the_socket_non_blocking() {
        let (link, headset) = loopback_link();
        assert_eq!(link.wait_control(Duration::from_millis(20)), None);

        let control = link.control_addr().unwrap();
        headset.send_to(br#"{"type": "stop"}"#, control).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut message = None;
        while message.is_none() && Instant::now() < deadline {
            message = link.poll_control();
        }
        assert_eq!(message, Some(ControlMessage::Stop));
    }

    #[test]
    fn rejected_line_does_not_reset_the_clock() {
        let mut throttle = GuideThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.admit("a", false, t0));
        assert!(!throttle.admit("b", false, t0 + Duration::from_secs(2)));
        assert!(throttle.admit("b", false, t0 + Duration::from_secs(3)));
    }
}
