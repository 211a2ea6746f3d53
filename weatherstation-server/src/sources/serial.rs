use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use async_trait::async_trait;
use serialport::{SerialPort, available_ports};
use time::OffsetDateTime;
use weatherstation_api::RawSnapshot;
use weatherstation_api::wire::parse_record;

use crate::errors::SourceError;
use crate::sources::Source;

/// Live station link: newline-delimited JSON records over a byte stream.
pub struct SerialSource<R> {
    reader: Option<R>,
    idle_pause: Duration,
}

impl SerialSource<BufReader<Box<dyn SerialPort>>> {
    /// Open the station's serial port, or the first port found when no
    /// path is configured.
    pub fn open(
        port_path: Option<&str>,
        baud_rate: u32,
        timeout: Duration,
        idle_pause: Duration,
    ) -> Result<Self, SourceError> {
        let port_path = match port_path {
            Some(path) => path.to_string(),
            None => available_ports()?
                .first()
                .map(|port| port.port_name.clone())
                .ok_or_else(|| serialport::Error::new(serialport::ErrorKind::NoDevice, "no serial port found"))?,
        };

        tracing::debug!(port = %port_path, baud_rate, "connect to serial port");

        let port = serialport::new(&port_path, baud_rate).timeout(timeout).open()?;

        Ok(Self::new(BufReader::new(port), idle_pause))
    }
}

impl<R> SerialSource<R>
where
    R: BufRead + Send + 'static,
{
    pub fn new(reader: R, idle_pause: Duration) -> Self {
        Self { reader: Some(reader), idle_pause }
    }

    fn parse(line: &str) -> Result<RawSnapshot, SourceError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(SourceError::Idle);
        }

        parse_record(line, OffsetDateTime::now_utc()).map_err(|reason| SourceError::MalformedRecord {
            line: line.to_string(),
            reason,
        })
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();

    match reader.read_line(&mut line) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(line)),
        Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Some(String::new())),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl<R> Source for SerialSource<R>
where
    R: BufRead + Send + 'static,
{
    async fn produce_snapshot(&mut self) -> Result<RawSnapshot, SourceError> {
        let mut reader = self.reader.take().ok_or(SourceError::Closed)?;

        let (reader, read) = tokio::task::spawn_blocking(move || {
            let read = read_line(&mut reader);
            (reader, read)
        })
        .await
        .map_err(|e| SourceError::Transport(io::Error::other(e)))?;

        self.reader = Some(reader);

        match read? {
            Some(line) => Self::parse(&line),
            None => {
                self.reader = None;
                Err(SourceError::Closed)
            }
        }
    }

    fn cadence(&self) -> Duration {
        self.idle_pause
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use weatherstation_api::Channel;

    use super::*;

    fn source(input: &str) -> SerialSource<Cursor<Vec<u8>>> {
        SerialSource::new(Cursor::new(input.as_bytes().to_vec()), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_reads_records_in_order() {
        let mut source = source(concat!(
            r#"{"oxygen":512,"uv":93,"pressure":465,"solar":850,"temp_humidity":700,"co2":300,"air_quality":100}"#,
            "\n",
            r#"{"oxygen":1}"#,
            "\r\n",
        ));

        let first = source.produce_snapshot().await.unwrap();
        assert!(first.is_complete());
        assert_eq!(first.get(Channel::Co2), Some(300));

        let second = source.produce_snapshot().await.unwrap();
        assert_eq!(second.get(Channel::Oxygen), Some(1));
        assert_eq!(second.get(Channel::Uv), None);

        assert!(matches!(source.produce_snapshot().await, Err(SourceError::Closed)));
        assert!(matches!(source.produce_snapshot().await, Err(SourceError::Closed)));
    }

    #[tokio::test]
    async fn test_blank_line_is_idle() {
        let mut source = source("\n{\"uv\":5}\n");

        assert!(matches!(source.produce_snapshot().await, Err(SourceError::Idle)));
        assert_eq!(source.produce_snapshot().await.unwrap().get(Channel::Uv), Some(5));
    }

    #[tokio::test]
    async fn test_malformed_lines_are_reported() {
        let mut source = source("temperature=21\n{\"uv\": [1, 2]}\n{broken}\n{\"uv\":2}\n");

        for _ in 0..3 {
            match source.produce_snapshot().await {
                Err(SourceError::MalformedRecord { line, .. }) => assert!(!line.is_empty()),
                other => panic!("expected malformed record, got {other:?}"),
            }
        }

        assert_eq!(source.produce_snapshot().await.unwrap().get(Channel::Uv), Some(2));
    }

    #[test]
    fn test_timeout_reads_as_empty_line() {
        struct TimingOut;

        impl io::Read for TimingOut {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
            }
        }

        let mut reader = BufReader::new(TimingOut);
        assert_eq!(read_line(&mut reader).unwrap(), Some(String::new()));
    }
}
