pub mod coedit;
pub mod importance;
pub mod lessons;
pub mod model_ranking;
pub mod qa;
pub mod sessions;
pub mod similarity;

pub use lessons::{LessonQuery, LessonReport};
pub use model_ranking::{ModelCandidate, ModelQuery, ModelRecommendation};
pub use qa::{QaMatch, StoredQa};
pub use similarity::{JaccardSimilarity, TextSimilarity};
