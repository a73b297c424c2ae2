use std::time::{Duration, Instant};

/// Timing and size of a single classification call.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Wall time from tokenization to the ranked result.
    pub total_time: Duration,
    /// Number of tokens fed to the encoder, special tokens included.
    pub input_tokens: usize,
}

impl PipelineStats {
    /// Create a new stats tracker (call at start of operation).
    pub(crate) fn start() -> PipelineStatsBuilder {
        PipelineStatsBuilder {
            start_time: Instant::now(),
        }
    }
}

/// Builder for PipelineStats - tracks timing from creation to finalize.
pub(crate) struct PipelineStatsBuilder {
    start_time: Instant,
}

impl PipelineStatsBuilder {
    /// Finalize stats with the number of tokens the model saw.
    pub fn finish(self, input_tokens: usize) -> PipelineStats {
        PipelineStats {
            total_time: self.start_time.elapsed(),
            input_tokens,
        }
    }
}
