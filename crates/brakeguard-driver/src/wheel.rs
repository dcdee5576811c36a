//! 轮速采集链路
//!
//! 宿主机没有霍尔中断，轮速采集板通过串口上报 `EDGES <n>` 行。
//! [`WheelReader`] 在独立线程中读取这些行并写入共享的 [`EdgeCounter`]，
//! 与中断处理函数的角色相同：只做原子累加，从不阻塞控制循环。

use crate::{DriverError, EdgeCounter, LineReader};
use brakeguard_io::{ByteTransport, IoError};
use brakeguard_protocol::WheelReport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 报告行最大长度
const MAX_REPORT_LEN: usize = 32;

/// 单次读取的缓冲大小
const READ_CHUNK: usize = 64;

/// 读取线程的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WheelStats {
    pub reports: u64,
    pub edges: u64,
    pub rejected: u64,
}

pub struct WheelReader<T> {
    transport: T,
    lines: LineReader,
    edges: Arc<EdgeCounter>,
    stats: WheelStats,
}

impl<T: ByteTransport> WheelReader<T> {
    pub fn new(transport: T, edges: Arc<EdgeCounter>) -> Self {
        Self {
            transport,
            lines: LineReader::new(MAX_REPORT_LEN),
            edges,
            stats: WheelStats::default(),
        }
    }

    /// 读取当前可用的字节并应用完整的报告行，返回本次记录的边沿数
    pub fn poll(&mut self) -> Result<u32, DriverError> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = self.transport.read_available(&mut buf)?;
            if n == 0 {
                break;
            }
            self.stats.rejected += self.lines.push(&buf[..n]) as u64;
        }

        let mut recorded = 0u32;
        while let Some(line) = self.lines.next_line() {
            match WheelReport::parse(&line) {
                Ok(report) => {
                    self.edges.record_edges(report.edges);
                    recorded = recorded.saturating_add(report.edges);
                    self.stats.reports += 1;
                    self.stats.edges += report.edges as u64;
                },
                Err(e) => {
                    self.stats.rejected += 1;
                    debug!("Ignoring wheel line {:?}: {}", line, e);
                },
            }
        }
        Ok(recorded)
    }

    pub fn stats(&self) -> WheelStats {
        self.stats
    }
}

impl<T: ByteTransport + Send + 'static> WheelReader<T> {
    /// 在后台线程中轮询，直到 `shutdown` 被置位或链路断开
    pub fn spawn(
        mut self,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Result<JoinHandle<WheelStats>, DriverError> {
        let handle = thread::Builder::new()
            .name("wheel-edges".to_string())
            .spawn(move || {
                info!("Wheel reader started: poll={:?}", poll_interval);
                let mut failing = false;
                while !shutdown.load(Ordering::Relaxed) {
                    match self.poll() {
                        Ok(_) => failing = false,
                        Err(DriverError::Io(IoError::Disconnected)) => {
                            warn!("Wheel link disconnected, stopping reader");
                            break;
                        },
                        Err(e) => {
                            if !failing {
                                warn!("Wheel link error: {}", e);
                            }
                            failing = true;
                        },
                    }
                    thread::sleep(poll_interval);
                }
                self.stats
            })
            .map_err(IoError::from)?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brakeguard_io::MockTransport;

    #[test]
    fn test_reports_become_edges() {
        let (transport, peer) = MockTransport::pair();
        let edges = Arc::new(EdgeCounter::new());
        let mut reader = WheelReader::new(transport, Arc::clone(&edges));

        peer.send_bytes(b"EDGES 3\nEDG");
        assert_eq!(reader.poll().unwrap(), 3);
        peer.send_bytes(b"ES 4\r\nSTAT rpm=10 v=0.1\n");
        assert_eq!(reader.poll().unwrap(), 4);

        assert_eq!(edges.drain(), 7);
        assert_eq!(
            reader.stats(),
            WheelStats {
                reports: 2,
                edges: 7,
                rejected: 1,
            }
        );
    }

    #[test]
    fn test_disconnect_is_io_error() {
        let (transport, peer) = MockTransport::pair();
        let mut reader = WheelReader::new(transport, Arc::new(EdgeCounter::new()));
        drop(peer);
        assert!(matches!(
            reader.poll(),
            Err(DriverError::Io(IoError::Disconnected))
        ));
    }

    #[test]
    fn test_spawned_reader_stops_on_disconnect() {
        let (transport, peer) = MockTransport::pair();
        let edges = Arc::new(EdgeCounter::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = WheelReader::new(transport, Arc::clone(&edges))
            .spawn(Arc::clone(&shutdown), Duration::from_millis(1))
            .unwrap();

        peer.send_line("EDGES 8");
        // 等待读取线程消费
        for _ in 0..1000 {
            if edges.total() == 8 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        drop(peer);

        let stats = handle.join().unwrap();
        assert_eq!(stats.edges, 8);
        assert_eq!(edges.drain(), 8);
        assert!(!shutdown.load(Ordering::Relaxed));
    }
}
