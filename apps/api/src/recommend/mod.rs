// Opportunity recommendation core.
// Eligibility gate first, then learned match scoring, then ranking and reason merge.
// Model training happens only in the offline commands, never on a request path.

pub mod candidates;
pub mod eligibility;
pub mod features;
pub mod feedback;
pub mod handlers;
pub mod model;
pub mod ranker;
pub mod reasons;
pub mod roster;
pub mod scorer;
pub mod training;
