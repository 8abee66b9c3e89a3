use std::mem;

/// A package whose transfer did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFailure {
    pub package: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    Success,
    Failed(Vec<DownloadFailure>),
    PartiallySuccess(Vec<DownloadFailure>),
}

impl DownloadResult {
    pub fn new() -> DownloadResult {
        DownloadResult::Success
    }

    /// Classifies a finished batch of `total` jobs.
    pub fn from_failures(total: usize, failures: Vec<DownloadFailure>) -> DownloadResult {
        let mut result = DownloadResult::new();
        let all_failed = !failures.is_empty() && failures.len() == total;
        for failure in failures {
            result.add(failure);
        }
        if all_failed {
            result.change_to_failed();
        }
        result
    }

    pub fn len(&self) -> usize {
        self.failures().len()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DownloadResult::Success)
    }

    pub fn failures(&self) -> &[DownloadFailure] {
        match self {
            DownloadResult::Success => &[],
            DownloadResult::Failed(failures) | DownloadResult::PartiallySuccess(failures) => {
                failures.as_slice()
            }
        }
    }

    pub fn add(&mut self, failure: DownloadFailure) {
        if self.is_success() {
            *self = DownloadResult::PartiallySuccess(Vec::new());
        }
        match self {
            DownloadResult::Failed(failures) | DownloadResult::PartiallySuccess(failures) => {
                failures.push(failure)
            }
            DownloadResult::Success => {}
        }
    }

    pub fn change_to_failed(&mut self) {
        if let DownloadResult::PartiallySuccess(failures) = self {
            let failures = mem::take(failures);
            *self = DownloadResult::Failed(failures);
        }
    }

    pub fn print_result(&self) {
        for failure in self.failures() {
            println!("{}", failure_line(failure));
        }
        println!();
        println!("{}", self.summary());
    }

    pub fn summary(&self) -> String {
        match self {
            DownloadResult::Success => "All files downloaded successfully!".to_string(),
            DownloadResult::PartiallySuccess(failures) => {
                format!("Download was partially successful, {} package(s) missing", failures.len())
            }
            DownloadResult::Failed(failures) => {
                format!("Every download failed ({} package(s))", failures.len())
            }
        }
    }
}

impl Default for DownloadResult {
    fn default() -> Self {
        DownloadResult::new()
    }
}

pub fn failure_line(failure: &DownloadFailure) -> String {
    format!(
        "[!] Download of the package '{}' encountered an issue: {}",
        failure.package, failure.reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(package: &str) -> DownloadFailure {
        DownloadFailure {
            package: package.to_string(),
            url: format!("http://x/{}.exe", package),
            reason: "HTTP status 404".to_string(),
        }
    }

    #[test]
    fn no_failures_is_success() {
        let result = DownloadResult::from_failures(3, Vec::new());
        assert!(result.is_success());
        assert_eq!(result.len(), 0);
        assert_eq!(result.summary(), "All files downloaded successfully!");
    }

    #[test]
    fn empty_batch_is_success() {
        assert!(DownloadResult::from_failures(0, Vec::new()).is_success());
    }

    #[test]
    fn some_failures_is_partial() {
        let result = DownloadResult::from_failures(3, vec![failure("a")]);
        assert_eq!(result, DownloadResult::PartiallySuccess(vec![failure("a")]));
    }

    #[test]
    fn all_failures_is_failed() {
        let result = DownloadResult::from_failures(2, vec![failure("a"), failure("b")]);
        assert_eq!(result, DownloadResult::Failed(vec![failure("a"), failure("b")]));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn failure_line_names_the_package() {
        assert_eq!(
            failure_line(&failure("Chrome")),
            "[!] Download of the package 'Chrome' encountered an issue: HTTP status 404"
        );
    }
}
