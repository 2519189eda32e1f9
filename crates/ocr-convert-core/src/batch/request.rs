//! Batch request parameters.

use std::path::PathBuf;

/// One conversion batch as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// `<type>_<variant>` tokens, processed in order.
    pub tokens: Vec<String>,
    /// Receives the converted graphs, the manifest and the `temp/` scratch area.
    pub output_dir: PathBuf,
    /// Only reuse archives already present in the scratch area.
    pub skip_download: bool,
    /// Record raw converted graphs only.
    pub skip_optimization: bool,
    /// Leave the scratch area in place after the run.
    pub keep_scratch: bool,
}

impl BatchRequest {
    pub fn new<I, S>(output_dir: impl Into<PathBuf>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            output_dir: output_dir.into(),
            skip_download: false,
            skip_optimization: false,
            keep_scratch: false,
        }
    }

    pub fn skip_download(mut self, skip: bool) -> Self {
        self.skip_download = skip;
        self
    }

    pub fn skip_optimization(mut self, skip: bool) -> Self {
        self.skip_optimization = skip;
        self
    }

    pub fn keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = BatchRequest::new("/out", ["det_mobile", "rec_mobile_en"]);
        assert_eq!(request.tokens, vec!["det_mobile", "rec_mobile_en"]);
        assert!(!request.skip_download);
        assert!(!request.skip_optimization);
        assert!(!request.keep_scratch);
    }

    #[test]
    fn test_request_flags() {
        let request = BatchRequest::new("/out", Vec::<String>::new())
            .skip_download(true)
            .skip_optimization(true)
            .keep_scratch(true);
        assert!(request.skip_download && request.skip_optimization && request.keep_scratch);
    }
}
