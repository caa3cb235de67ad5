//! Request types and the request-line grammar.
//!
//! Accepted forms (fields separated by `,`, surrounding whitespace ignored):
//!
//! - `<paramMin>,<paramMax>` uses the gateway's default engine
//! - `<engine>,<paramMin>,<paramMax>` selects the engine explicitly

use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Read};
use std::num::IntErrorKind;

use crate::engine::EngineKind;
use crate::error::ProtocolError;

/// A validated job request.
///
/// Invariant: `param_min <= param_max`. Both are non-negative by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Engine the job runs on.
    pub engine: EngineKind,
    /// Lower bound of the generation range.
    pub param_min: u32,
    /// Upper bound of the generation range.
    pub param_max: u32,
}

impl JobRequest {
    /// Build a request, enforcing the range invariant.
    pub fn new(engine: EngineKind, param_min: u32, param_max: u32) -> Result<Self, ProtocolError> {
        if param_min > param_max {
            return Err(ProtocolError::invalid_request(format!(
                "paramMin ({}) must not exceed paramMax ({})",
                param_min, param_max
            )));
        }
        Ok(Self {
            engine,
            param_min,
            param_max,
        })
    }

    /// Arguments passed to the engine, in order.
    pub fn arguments(&self) -> Vec<String> {
        vec![self.param_min.to_string(), self.param_max.to_string()]
    }

    /// Number of generations covered by the request.
    pub fn span(&self) -> u32 {
        self.param_max - self.param_min
    }
}

/// Parse a request line.
///
/// `default_engine` is used for the two-field form.
pub fn parse_request(line: &str, default_engine: EngineKind) -> Result<JobRequest, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::invalid_request("empty request"));
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let (engine, min, max) = match fields.as_slice() {
        [min, max] => (default_engine, *min, *max),
        [engine, min, max] => (engine.parse::<EngineKind>()?, *min, *max),
        other => {
            return Err(ProtocolError::invalid_request(format!(
                "expected 2 or 3 comma-separated fields, got {}",
                other.len()
            )))
        }
    };

    let param_min = parse_param("paramMin", min)?;
    let param_max = parse_param("paramMax", max)?;
    JobRequest::new(engine, param_min, param_max)
}

fn parse_param(field: &str, value: &str) -> Result<u32, ProtocolError> {
    value.parse::<u32>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => ProtocolError::invalid_request(format!(
            "{} is out of range, got '{}' (maximum {})",
            field,
            value,
            u32::MAX
        )),
        _ => ProtocolError::invalid_request(format!(
            "{} must be a non-negative integer, got '{}'",
            field, value
        )),
    })
}

/// Read one request line from the client.
///
/// Reads up to `max_bytes` of content terminated by `\n` or EOF. A reader
/// that times out (`WouldBlock`/`TimedOut`) before any byte arrives gives
/// `READ_TIMEOUT`; bounding the total time is up to the reader.
pub fn read_request<R: BufRead>(reader: &mut R, max_bytes: usize) -> Result<String, ProtocolError> {
    let mut buffer = Vec::new();
    let mut limited = reader.by_ref().take(max_bytes as u64 + 1);

    match limited.read_until(b'\n', &mut buffer) {
        Ok(0) => return Err(ProtocolError::empty_request()),
        Ok(_) => {}
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            // A client that sends its line without a newline and waits gets
            // the partial line accepted once the read times out.
            if buffer.is_empty() {
                return Err(ProtocolError::read_timeout());
            }
        }
        Err(e) => {
            return Err(ProtocolError::invalid_request(format!(
                "failed to read request: {}",
                e
            )));
        }
    }

    if buffer.last() == Some(&b'\n') {
        buffer.pop();
        if buffer.last() == Some(&b'\r') {
            buffer.pop();
        }
    }
    if buffer.len() > max_bytes {
        return Err(ProtocolError::too_large(max_bytes));
    }

    String::from_utf8(buffer)
        .map_err(|_| ProtocolError::invalid_request("request is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Cursor;

    #[test]
    fn test_two_fields_use_default_engine() {
        let req = parse_request("3,4", EngineKind::Spark).unwrap();
        assert_eq!(req.engine, EngineKind::Spark);
        assert_eq!(req.param_min, 3);
        assert_eq!(req.param_max, 4);
        assert_eq!(req.arguments(), vec!["3", "4"]);

        let req = parse_request("3,4", EngineKind::Mpi).unwrap();
        assert_eq!(req.engine, EngineKind::Mpi);
    }

    #[test]
    fn test_three_fields_select_engine() {
        let req = parse_request("MPI, 2, 2\n", EngineKind::Spark).unwrap();
        assert_eq!(req.engine, EngineKind::Mpi);
        assert_eq!((req.param_min, req.param_max), (2, 2));
        assert_eq!(req.span(), 0);
    }

    #[test]
    fn test_rejects_min_greater_than_max() {
        let err = parse_request("5,4", EngineKind::Spark).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("must not exceed"));
    }

    #[test]
    fn test_rejects_negative_and_non_integer() {
        for line in ["-1,4", "a,4", "3,4.5", "3,", ",", "spark,x,2"] {
            let err = parse_request(line, EngineKind::Spark).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidRequest, "line {:?}", line);
        }
    }

    #[test]
    fn test_out_of_range_reported_separately() {
        let err = parse_request("0,4294967296", EngineKind::Spark).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("paramMax is out of range"), "{}", err.message);

        let err = parse_request("-1,4", EngineKind::Spark).unwrap_err();
        assert!(err.message.contains("non-negative integer"), "{}", err.message);

        let req = parse_request("0,4294967295", EngineKind::Spark).unwrap();
        assert_eq!(req.param_max, u32::MAX);
    }

    #[test]
    fn test_rejects_wrong_field_count() {
        for line in ["3", "spark,1,2,3", ""] {
            assert!(parse_request(line, EngineKind::Spark).is_err(), "line {:?}", line);
        }
    }

    #[test]
    fn test_rejects_unknown_engine() {
        let err = parse_request("flink,1,2", EngineKind::Spark).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("flink"));
    }

    #[test]
    fn test_read_request_line() {
        let mut reader = Cursor::new("3,4\r\nignored");
        assert_eq!(read_request(&mut reader, 1024).unwrap(), "3,4");
    }

    #[test]
    fn test_read_request_eof_delimited() {
        let mut reader = Cursor::new("mpi,2,2");
        assert_eq!(read_request(&mut reader, 1024).unwrap(), "mpi,2,2");
    }

    #[test]
    fn test_read_request_empty() {
        let mut reader = Cursor::new("");
        let err = read_request(&mut reader, 1024).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyRequest);
    }

    #[test]
    fn test_read_request_too_large() {
        let mut reader = Cursor::new("1".repeat(20));
        let err = read_request(&mut reader, 8).unwrap_err();
        assert_eq!(err.code, ErrorCode::RequestTooLarge);

        let mut reader = Cursor::new("12345678\n");
        assert_eq!(read_request(&mut reader, 8).unwrap(), "12345678");
    }

    /// Yields its data once, then times out like a socket with a read timeout.
    struct Stalling(Option<&'static [u8]>);

    impl io::Read for Stalling {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.take() {
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    #[test]
    fn test_read_request_timeout() {
        let mut reader = io::BufReader::new(Stalling(None));
        let err = read_request(&mut reader, 1024).unwrap_err();
        assert_eq!(err.code, ErrorCode::ReadTimeout);
    }

    #[test]
    fn test_read_request_partial_line_accepted_on_timeout() {
        let mut reader = io::BufReader::new(Stalling(Some(b"3,4")));
        assert_eq!(read_request(&mut reader, 1024).unwrap(), "3,4");
    }
}
