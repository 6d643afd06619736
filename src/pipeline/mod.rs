pub mod stage2_aggregate;
pub mod stage3_filter;
pub mod stage4_scores;
pub mod stage5_bootstrap;
pub mod stage6_report;
