// # Results File Reader
//
// Reads the ranked CSV written by the speed-test tool.
//
// ## File Format
//
// ```text
// IP 地址,已发送,已接收,丢包率,平均延迟,下载速度 (MB/s)
// 104.16.1.1,4,4,0.00,152.34,12.51
// 104.16.2.2,4,4,0.00,160.02,11.87
// ```
//
// The first record is a header and is ignored. Record order is the ranking,
// best first. Only the first column (the address) is interpreted. Fields may
// be quoted, and a quoted header may span several lines.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::traits::{CandidateSource, EndpointCandidate};

/// Candidate source backed by the speed-test results file
#[derive(Debug, Clone)]
pub struct ResultFileReader {
    path: PathBuf,
}

impl ResultFileReader {
    /// Create a reader for the given results file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the results file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CandidateSource for ResultFileReader {
    async fn top(&self, count: usize) -> Vec<EndpointCandidate> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Results file {} unavailable: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let candidates = parse_results(&contents, count);
        if candidates.is_empty() {
            warn!("No candidate addresses found in {}", self.path.display());
        } else {
            debug!(
                "Read {} candidate(s) from {} (requested {})",
                candidates.len(),
                self.path.display(),
                count
            );
        }
        candidates
    }
}

/// Parse up to `count` data records, skipping the header and blank records
pub fn parse_results(contents: &str, count: usize) -> Vec<EndpointCandidate> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    reader
        .records()
        .filter_map(|record| match record {
            Ok(record) => parse_record(&record),
            Err(e) => {
                debug!("Skipping malformed results record: {}", e);
                None
            }
        })
        .take(count)
        .collect()
}

fn parse_record(record: &csv::StringRecord) -> Option<EndpointCandidate> {
    let address = record.get(0).filter(|address| !address.is_empty())?;

    Some(EndpointCandidate {
        address: address.to_string(),
        metrics: record.iter().skip(1).map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "IP 地址,已发送,已接收,丢包率,平均延迟,下载速度 (MB/s)";

    #[test]
    fn rows_keep_file_order_and_metrics() {
        let contents = format!(
            "{}\n1.2.3.4,4,4,0.00,150.1,12.5\n5.6.7.8,4,4,0.00,160.2,11.0\n",
            HEADER
        );
        let candidates = parse_results(&contents, 10);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].address, "1.2.3.4");
        assert_eq!(candidates[1].address, "5.6.7.8");
        assert_eq!(candidates[0].metrics, vec!["4", "4", "0.00", "150.1", "12.5"]);
    }

    #[test]
    fn count_limits_rows() {
        let contents = format!("{}\n1.1.1.1\n2.2.2.2\n3.3.3.3\n", HEADER);
        let candidates = parse_results(&contents, 2);

        assert_eq!(
            candidates.iter().map(|c| c.address.as_str()).collect::<Vec<_>>(),
            vec!["1.1.1.1", "2.2.2.2"]
        );
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(parse_results(HEADER, 3).is_empty());
        assert!(parse_results("", 3).is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let contents = format!("{}\n\n1.1.1.1,1\r\n\n2.2.2.2,2\n", HEADER);
        let candidates = parse_results(&contents, 2);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].address, "1.1.1.1");
        assert_eq!(candidates[0].metrics, vec!["1"]);
    }

    #[test]
    fn quoted_fields_are_unquoted() {
        let candidates = parse_results("IP,Sent\n\"1.2.3.4\",4\n\" 5.6.7.8 \",\"4\"\n", 2);

        assert_eq!(candidates[0].address, "1.2.3.4");
        assert_eq!(candidates[0].metrics, vec!["4"]);
        assert_eq!(candidates[1].address, "5.6.7.8");
    }

    #[test]
    fn quoted_header_spanning_lines_is_one_record() {
        let contents = "\"IP\naddr\",Sent\n1.2.3.4,4\n5.6.7.8,4\n";
        let candidates = parse_results(contents, 1);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].address, "1.2.3.4");
    }

    #[test]
    fn blank_first_field_is_skipped() {
        let contents = format!("{}\n ,4\n\"\",4\n9.9.9.9,4\n", HEADER);
        let candidates = parse_results(&contents, 1);

        assert_eq!(candidates[0].address, "9.9.9.9");
    }

    #[tokio::test]
    async fn missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ResultFileReader::new(dir.path().join("result.csv"));

        assert_eq!(reader.path(), dir.path().join("result.csv"));
        assert!(reader.top(2).await.is_empty());
    }

    #[tokio::test]
    async fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "2606:4700::1,4,4,0.00,80.0,20.0").unwrap();
        file.flush().unwrap();

        let reader = ResultFileReader::new(file.path());
        let candidates = reader.top(1).await;

        assert_eq!(candidates, vec![EndpointCandidate {
            address: "2606:4700::1".to_string(),
            metrics: vec!["4", "4", "0.00", "80.0", "20.0"]
                .into_iter()
                .map(String::from)
                .collect(),
        }]);
    }
}
