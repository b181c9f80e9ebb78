pub mod cycles;
pub mod dependencies;
pub mod guards;
pub mod impact;
pub mod snapshot;

pub use cycles::find_cycles;
pub use dependencies::{dependency_chain, DependencyChain, DependencyLink};
pub use impact::{impact_analysis, ImpactReport, ImpactedNode, RiskLevel};
pub use snapshot::GraphSnapshot;
