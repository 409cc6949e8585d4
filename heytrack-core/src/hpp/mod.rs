pub mod calculator;
pub mod models;
pub mod pricing;
pub mod service;

pub use calculator::HppCalculator;
pub use models::{
    ChangeSeverity, HppAlert, HppBreakdown, HppRecord, MarginAnalysis, MaterialLine,
    PriceSuggestion,
};
pub use pricing::{analyze_margin, round_up_to, suggest_prices};
pub use service::{HppBatchReport, HppRun, HppService, PricingReport};
