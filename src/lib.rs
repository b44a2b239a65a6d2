pub mod cache;
pub mod checker;
pub mod config;
pub mod dlp;
pub mod extractor;
pub mod heuristics;
pub mod intel;
pub mod moderation;
pub mod verdict;

pub use cache::{BlockedUrlRecord, BlockedUrlStore, CacheStats, CacheWriter};
pub use checker::{UrlCheckResult, UrlChecker};
pub use config::Config;
pub use moderation::{Decision, ModerationOutcome, ModerationPipeline};
pub use verdict::{DetectionSource, Evidence, Verdict};
