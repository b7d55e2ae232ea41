pub mod aggregator;
pub mod continue_watching;
pub mod enricher;
pub mod normalizer;
pub mod providers;

pub use continue_watching::ContinueWatchingService;
pub use enricher::DetailEnricher;
