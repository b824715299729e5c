use crate::prelude::*;

use super::{retry_socket::RetrySocket, EventHandler};
use pulse_common::event::TIMESTAMP_PROPERTY;
use std::net::SocketAddr;

const NAME: &str = "graphite";
pub const DEFAULT_PREFIX: &str = "pulse";

/// Forwards numeric properties as Graphite plaintext lines
/// `<prefix>.<name> <value> <unix ts>`.
#[derive(Debug)]
pub struct GraphiteHandler {
    address: SocketAddr,
    prefix: String,
    socket: Option<RetrySocket>,
    lines_sent: u64,
}

impl GraphiteHandler {
    pub fn new(address: SocketAddr, prefix: impl Into<String>) -> Self {
        Self {
            address,
            prefix: prefix.into(),
            socket: None,
            lines_sent: 0,
        }
    }

    fn socket(&mut self) -> &mut RetrySocket {
        let address = self.address;
        self.socket.get_or_insert_with(|| RetrySocket::new(address))
    }
}

/// Graphite treats dots as path separators and whitespace as field separators.
fn metric_name(name: &str) -> String {
    name.replace("://", ".")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) fn render(prefix: &str, sample: &Sample) -> (String, usize) {
    let ts = sample.timestamp().timestamp();
    let mut res = String::new();
    let mut lines = 0;
    for prop in sample.properties() {
        if prop.name() == TIMESTAMP_PROPERTY {
            continue;
        }
        match prop.value().as_f64() {
            Some(value) => {
                res.push_str(&format!("{}.{} {} {}\n", prefix, metric_name(prop.name()), value, ts));
                lines += 1;
            }
            None => trace!("property {} is not numeric, skipped", prop.name()),
        }
    }
    (res, lines)
}

#[async_trait]
impl EventHandler for GraphiteHandler {
    async fn handle(&mut self, sample: &Sample) -> Result<(), Error> {
        let (data, lines) = render(&self.prefix, sample);
        if lines == 0 {
            return Ok(());
        }
        self.socket()
            .send(data.as_bytes())
            .await
            .map_err(|e| Error::consumer(NAME, e.to_string()))?;
        self.lines_sent += lines as u64;
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<(), Error> {
        info!("{} lines sent to graphite {}", self.lines_sent, self.address);
        self.socket = None;
        Ok(())
    }
}
