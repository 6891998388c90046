use log::{debug, error, info, warn};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use super::{Backoff, LinkError, LinkSettings};
use crate::codec::{format_hex, KissDecoder};
use crate::epoch::now_epoch;
use crate::rpc::RouterApi;
use crate::shutdown::Shutdown;
use crate::store::LinkId;

enum SessionEnd {
    Shutdown,
    Failed(LinkError),
}

/// Keeps one terminal connected and forwards its frames to the router.
///
/// Reconnects forever. The only way out of [`LinkAgent::run`] is shutdown.
pub struct LinkAgent<R> {
    link: LinkId,
    router: R,
    settings: LinkSettings,
    target: String,
}

impl<R: RouterApi> LinkAgent<R> {
    pub fn new(link: LinkId, router: R, settings: LinkSettings) -> Self {
        let target = format!("link::{}", link);
        Self {
            link,
            router,
            settings,
            target,
        }
    }

    pub fn link(&self) -> &LinkId {
        &self.link
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        let target = self.target.as_str();
        let mut backoff = Backoff::new(self.settings.backoff.clone());

        while !shutdown.is_triggered() {
            let connect = TcpStream::connect((self.link.host(), self.link.port()));
            let connected = tokio::select! {
                result = connect => result,
                _ = shutdown.wait() => break,
            };

            match connected {
                Ok(stream) => {
                    info!(target: target, "Connected to {}", self.link);
                    backoff.reset();
                    match self.session(stream, &mut shutdown).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Failed(e) => warn!(target: target, "Connection lost: {}", e),
                    }
                }
                Err(e) => warn!(target: target, "Cannot connect to {}: {}", self.link, e),
            }

            let delay = backoff.next_delay();
            info!(target: target, "Reconnecting in {:?}", delay);
            if !shutdown.sleep(delay).await {
                break;
            }
        }
        info!(target: target, "Link stopped");
    }

    async fn session(&self, mut stream: TcpStream, shutdown: &mut Shutdown) -> SessionEnd {
        let target = self.target.as_str();
        let mut decoder = KissDecoder::with_max_frame(self.settings.max_frame_len);
        let mut buffer = vec![0u8; self.settings.read_buffer.max(1)];

        loop {
            let read = tokio::select! {
                result = stream.read(&mut buffer) => result,
                _ = shutdown.wait() => return SessionEnd::Shutdown,
            };
            let n = match read {
                Ok(0) => return self.lost(&decoder, LinkError::Closed),
                Ok(n) => n,
                Err(e) => return self.lost(&decoder, e.into()),
            };
            let timestamp = now_epoch();

            if n < self.settings.min_read_bytes {
                debug!(target: target, "Dropping {} byte read", n);
                if !shutdown.sleep(self.settings.short_read_pause).await {
                    return SessionEnd::Shutdown;
                }
                continue;
            }

            for frame in decoder.decode(&buffer[..n]) {
                self.forward(&frame, timestamp).await;
            }
        }
    }

    fn lost(&self, decoder: &KissDecoder, err: LinkError) -> SessionEnd {
        let pending = decoder.pending();
        if pending > 0 {
            debug!(target: &self.target, "Discarding {} bytes of a partial frame", pending);
        }
        SessionEnd::Failed(err)
    }

    async fn forward(&self, frame: &[u8], timestamp: f64) {
        let payload = format_hex(frame);
        debug!(target: &self.target, "Frame received: {}", payload);
        if let Err(e) = self
            .router
            .receive_frame(
                payload,
                self.link.host().to_string(),
                self.link.port(),
                timestamp,
            )
            .await
        {
            error!(target: &self.target, "Frame not forwarded: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::codec::encode;
    use crate::link::BackoffSettings;
    use crate::predict::PassDescriptor;
    use crate::router::RouterError;
    use crate::rpc::RpcError;
    use crate::shutdown;

    #[derive(Debug, Clone, PartialEq)]
    struct Forwarded {
        payload: String,
        host: String,
        port: u16,
    }

    struct FakeRouter {
        tx: mpsc::UnboundedSender<Forwarded>,
        failures_left: AtomicUsize,
    }

    impl RouterApi for FakeRouter {
        async fn update_tle(&self, _tle: String) -> Result<(), RouterError> {
            Ok(())
        }

        async fn prepare_pass(&self, _pass: PassDescriptor) -> Result<(), RouterError> {
            Ok(())
        }

        async fn end_pass(&self) -> Result<(), RouterError> {
            Ok(())
        }

        async fn receive_frame(
            &self,
            payload: String,
            host: String,
            port: u16,
            _timestamp: f64,
        ) -> Result<(), RouterError> {
            let _ = self.tx.send(Forwarded {
                payload,
                host,
                port,
            });
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                Err(RouterError::Remote(RpcError::Rejected("receiveFrame")))
            } else {
                Ok(())
            }
        }
    }

    fn fast_settings() -> LinkSettings {
        LinkSettings {
            backoff: BackoffSettings {
                initial: Duration::from_millis(20),
                max: Duration::from_millis(20),
                multiplier: 1.0,
            },
            short_read_pause: Duration::from_millis(10),
            ..LinkSettings::default()
        }
    }

    fn agent(
        port: u16,
        failures: usize,
        settings: LinkSettings,
    ) -> (LinkAgent<Arc<FakeRouter>>, mpsc::UnboundedReceiver<Forwarded>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let router = Arc::new(FakeRouter {
            tx,
            failures_left: AtomicUsize::new(failures),
        });
        let agent = LinkAgent::new(LinkId::new("127.0.0.1", port), router, settings);
        (agent, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Forwarded>) -> Forwarded {
        timeout(WAIT, rx.recv())
            .await
            .expect("no frame forwarded in time")
            .expect("router dropped")
    }

    const WAIT: Duration = Duration::from_secs(5);

    const PAYLOAD: [u8; 12] = [
        0x86, 0xa2, 0x40, 0x40, 0x40, 0x40, 0x60, 0xc0, 0xdb, 0x03, 0xf0, 0x01,
    ];

    #[tokio::test]
    async fn forwards_decoded_frames_as_hex() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (agent, mut rx) = agent(port, 0, fast_settings());
        let (trigger, shutdown) = shutdown::channel();
        let task = tokio::spawn(agent.run(shutdown));

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut bytes = encode(&PAYLOAD);
        bytes.extend(encode(&[0x01; 10]));
        socket.write_all(&bytes).await.unwrap();

        let first = next(&mut rx).await;
        assert_eq!(
            first.payload,
            "0x86 0xa2 0x40 0x40 0x40 0x40 0x60 0xc0 0xdb 0x03 0xf0 0x01"
        );
        assert_eq!(first.host, "127.0.0.1");
        assert_eq!(first.port, port);
        assert_eq!(next(&mut rx).await.payload, vec!["0x01"; 10].join(" "));

        trigger.trigger();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn short_reads_are_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (agent, mut rx) = agent(port, 0, fast_settings());
        let (trigger, shutdown) = shutdown::channel();
        let task = tokio::spawn(agent.run(shutdown));

        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(&encode(&[1, 2, 3])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        socket.write_all(&encode(&PAYLOAD)).await.unwrap();

        assert!(next(&mut rx).await.payload.starts_with("0x86 0xa2"));

        trigger.trigger();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reconnects_after_peer_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (agent, mut rx) = agent(port, 0, fast_settings());
        let (trigger, shutdown) = shutdown::channel();
        let task = tokio::spawn(agent.run(shutdown));

        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(&encode(&PAYLOAD)).await.unwrap();
        next(&mut rx).await;
        drop(socket);

        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(&encode(&[0x07; 16])).await.unwrap();
        assert_eq!(next(&mut rx).await.payload, vec!["0x07"; 16].join(" "));

        trigger.trigger();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn forwarding_failure_does_not_stop_the_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (agent, mut rx) = agent(port, 1, fast_settings());
        let (trigger, shutdown) = shutdown::channel();
        let task = tokio::spawn(agent.run(shutdown));

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut bytes = encode(&PAYLOAD);
        bytes.extend(encode(&[0x02; 12]));
        socket.write_all(&bytes).await.unwrap();

        next(&mut rx).await;
        assert_eq!(next(&mut rx).await.payload, vec!["0x02"; 12].join(" "));

        trigger.trigger();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_cancels_backoff_wait() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let settings = LinkSettings {
            backoff: BackoffSettings {
                initial: Duration::from_secs(3600),
                max: Duration::from_secs(3600),
                multiplier: 1.0,
            },
            ..LinkSettings::default()
        };
        let (agent, _rx) = agent(port, 0, settings);
        let (trigger, shutdown) = shutdown::channel();
        let task = tokio::spawn(agent.run(shutdown));

        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
        timeout(WAIT, task).await.unwrap().unwrap();
    }
}
