use std::io::{self, ErrorKind};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use log::{debug, warn};

use crate::error::{TransportFault, TransportStep};

/// Delivers encoded records to the telemetry sink.
pub trait Transport {
    /// The broker session to keep alive, if this transport has one.
    fn session(&mut self) -> Option<&mut dyn BrokerSession> {
        None
    }

    fn send(&mut self, record: &str) -> Result<(), TransportFault>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn session(&mut self) -> Option<&mut dyn BrokerSession> {
        (**self).session()
    }

    fn send(&mut self, record: &str) -> Result<(), TransportFault> {
        (**self).send(record)
    }
}

/// Packet-at-a-time datagram socket: open, write the body, close to transmit.
pub trait DatagramSocket {
    fn begin_packet(&mut self) -> io::Result<()>;
    fn write(&mut self, body: &[u8]) -> io::Result<usize>;
    fn end_packet(&mut self) -> io::Result<()>;
}

/// Fire-and-forget transport; every failed step is fatal.
pub struct DatagramTransport<S> {
    socket: S,
}

impl<S: DatagramSocket> DatagramTransport<S> {
    pub fn new(socket: S) -> Self {
        Self { socket }
    }
}

impl<S: DatagramSocket> Transport for DatagramTransport<S> {
    fn send(&mut self, record: &str) -> Result<(), TransportFault> {
        self.socket
            .begin_packet()
            .map_err(failed_at(TransportStep::Open))?;

        let written = self
            .socket
            .write(record.as_bytes())
            .map_err(failed_at(TransportStep::Write))?;
        if written != record.len() {
            return Err(TransportFault {
                step: TransportStep::Write,
                source: io::Error::new(
                    ErrorKind::WriteZero,
                    format!("wrote {} of {} bytes", written, record.len()),
                ),
            });
        }

        self.socket
            .end_packet()
            .map_err(failed_at(TransportStep::Close))
    }
}

fn failed_at(step: TransportStep) -> impl FnOnce(io::Error) -> TransportFault {
    move |source| TransportFault { step, source }
}

/// UDP exchange over `std::net`: a fresh socket per packet, sent on close.
pub struct UdpDatagram {
    target: String,
    socket: Option<(UdpSocket, SocketAddr)>,
    packet: Vec<u8>,
}

impl UdpDatagram {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            socket: None,
            packet: Vec::new(),
        }
    }

    fn resolve(&self) -> io::Result<SocketAddr> {
        self.target.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                ErrorKind::AddrNotAvailable,
                format!("{} did not resolve", self.target),
            )
        })
    }
}

impl DatagramSocket for UdpDatagram {
    fn begin_packet(&mut self) -> io::Result<()> {
        let target = self.resolve()?;
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        self.socket = Some((UdpSocket::bind(local)?, target));
        self.packet.clear();
        Ok(())
    }

    fn write(&mut self, body: &[u8]) -> io::Result<usize> {
        if self.socket.is_none() {
            return Err(ErrorKind::NotConnected.into());
        }
        self.packet.extend_from_slice(body);
        Ok(body.len())
    }

    fn end_packet(&mut self) -> io::Result<()> {
        let (socket, target) = self.socket.take().ok_or(ErrorKind::NotConnected)?;
        let sent = socket.send_to(&self.packet, target)?;
        if sent != self.packet.len() {
            return Err(io::Error::new(
                ErrorKind::WriteZero,
                format!("sent {} of {} bytes", sent, self.packet.len()),
            ));
        }
        debug!("📡 {} bytes sent to {}", sent, target);
        Ok(())
    }
}

/// Connection-oriented broker client.
pub trait BrokerSession {
    fn is_connected(&self) -> bool;

    /// Starts a new connection attempt; completion shows up in [`is_connected`](Self::is_connected).
    fn reconnect(&mut self) -> anyhow::Result<()>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> anyhow::Result<()>;
}

/// Best-effort publisher. A failed publish is logged and swallowed; the next
/// cycle's session check repairs a dropped connection.
pub struct BrokerTransport<S> {
    session: S,
    topic: &'static str,
}

impl<S: BrokerSession> BrokerTransport<S> {
    pub fn new(session: S, topic: &'static str) -> Self {
        Self { session, topic }
    }
}

#[cfg(test)]
impl<S> BrokerTransport<S> {
    pub(crate) fn inner(&self) -> &S {
        &self.session
    }
}

impl<S: BrokerSession> Transport for BrokerTransport<S> {
    fn session(&mut self) -> Option<&mut dyn BrokerSession> {
        Some(&mut self.session)
    }

    fn send(&mut self, record: &str) -> Result<(), TransportFault> {
        if let Err(e) = self.session.publish(self.topic, record.as_bytes()) {
            warn!("📡 Publish to '{}' failed: {:#}", self.topic, e);
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::FlakySession;
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedSocket {
        fail_at: Option<TransportStep>,
        short_write: bool,
        calls: Vec<TransportStep>,
    }

    impl ScriptedSocket {
        fn step(&mut self, step: TransportStep) -> io::Result<()> {
            self.calls.push(step);
            if self.fail_at == Some(step) {
                return Err(io::Error::other("refused"));
            }
            Ok(())
        }
    }

    impl DatagramSocket for ScriptedSocket {
        fn begin_packet(&mut self) -> io::Result<()> {
            self.step(TransportStep::Open)
        }

        fn write(&mut self, body: &[u8]) -> io::Result<usize> {
            self.step(TransportStep::Write)?;
            Ok(if self.short_write { body.len() / 2 } else { body.len() })
        }

        fn end_packet(&mut self) -> io::Result<()> {
            self.step(TransportStep::Close)
        }
    }

    #[test]
    fn datagram_runs_open_write_close() {
        let mut transport = DatagramTransport::new(ScriptedSocket::default());
        transport.send("rssi value=-60").unwrap();
        assert_eq!(
            transport.socket.calls,
            [TransportStep::Open, TransportStep::Write, TransportStep::Close]
        );
    }

    #[test]
    fn datagram_fault_names_the_failed_step() {
        for step in [TransportStep::Open, TransportStep::Write, TransportStep::Close] {
            let mut transport = DatagramTransport::new(ScriptedSocket {
                fail_at: Some(step),
                ..Default::default()
            });
            let fault = transport.send("x value=1").unwrap_err();
            assert_eq!(fault.step, step);
            assert_eq!(transport.socket.calls.last(), Some(&step));
        }
    }

    #[test]
    fn short_write_is_a_write_fault() {
        let mut transport = DatagramTransport::new(ScriptedSocket {
            short_write: true,
            ..Default::default()
        });
        let fault = transport.send("pressure value=101325").unwrap_err();
        assert_eq!(fault.step, TransportStep::Write);
        assert_eq!(fault.source.kind(), ErrorKind::WriteZero);
    }

    #[test]
    fn udp_datagram_delivers_each_record_as_one_packet() {
        let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        sink.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let addr = sink.local_addr().unwrap();

        let mut transport = DatagramTransport::new(UdpDatagram::new(addr.to_string()));
        transport.send("humidity value=55.50").unwrap();
        transport.send("rssi value=-60").unwrap();

        let mut buf = [0u8; 128];
        let n = sink.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"humidity value=55.50");
        let n = sink.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"rssi value=-60");
    }

    #[test]
    fn udp_write_without_open_is_refused() {
        let mut socket = UdpDatagram::new("127.0.0.1:9");
        assert_eq!(
            socket.write(b"x").unwrap_err().kind(),
            ErrorKind::NotConnected
        );
        assert_eq!(
            socket.end_packet().unwrap_err().kind(),
            ErrorKind::NotConnected
        );
    }

    #[test]
    fn unresolvable_target_fails_on_open() {
        let mut transport = DatagramTransport::new(UdpDatagram::new("not an address"));
        let fault = transport.send("x value=1").unwrap_err();
        assert_eq!(fault.step, TransportStep::Open);
    }

    #[test]
    fn broker_publish_failure_is_swallowed() {
        let mut session = FlakySession::new(1);
        session.reject_publish = true;
        let mut transport = BrokerTransport::new(session, "meteo/telemetry");

        assert!(transport.send("rssi value=-60").is_ok());
        assert!(transport.session.published.is_empty());
    }

    #[test]
    fn broker_exposes_its_session() {
        let mut transport = BrokerTransport::new(FlakySession::new(1), "meteo/telemetry");
        let session = transport.session().unwrap();
        assert!(!session.is_connected());
        session.reconnect().unwrap();
        assert!(session.is_connected());

        transport.send("rssi value=-60").unwrap();
        assert_eq!(transport.session.published, ["rssi value=-60"]);
    }
}
