use adjacency::RunReport;
use adjacency::driver::time_string;

/// Split a comma-separated layer list into names, dropping empty segments
pub fn parse_layer_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// One-line summary for the end of a run
pub fn summarize(report: &RunReport) -> String {
    format!(
        "processed {} layers ({} failed) in {}",
        report.completed.len(),
        report.failed.len(),
        time_string(report.elapsed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_list_splits_and_trims() {
        assert_eq!(
            parse_layer_list("SEC_01.tif, SEC_02.tif"),
            vec!["SEC_01.tif".to_string(), "SEC_02.tif".to_string()]
        );
    }

    #[test]
    fn layer_list_drops_empty_segments() {
        assert_eq!(parse_layer_list("A,,B,"), vec!["A".to_string(), "B".to_string()]);
        assert!(parse_layer_list("").is_empty());
    }
}
