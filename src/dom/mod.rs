pub mod extract;
pub mod results;

pub use extract::{extract_matching, page_summary};
pub use results::{extract_result_candidates, ResultCandidate};
