pub mod baseline;
pub mod classify;
pub mod context;
pub mod score;
pub mod signals;
pub mod time_serde;

pub use baseline::{BaselineFit, FitContext, FitCounts, LeadType, MarketProfile};
pub use classify::{Orientation, PriceBand, buyer_share_percent, classify_orientation, classify_price};
pub use context::{FitReason, FitRequestContext, NormalizedContext};
pub use score::{
	ConfidenceBand, DimensionScores, DimensionWeights, Driver, DriverDirection, ScoreInputs,
	ScorePayload, clamp01, compose_score,
};
pub use signals::{AgentSignals, ClosedDeal, ScoringWindow};
