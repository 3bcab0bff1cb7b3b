//! Multi-source review consensus.
//!
//! Specialist sources are fanned out in parallel ([`gather_reports`]) and
//! their reports merged by [`aggregate`] into one [`AggregateVerdict`](crate::domain::AggregateVerdict).

pub mod aggregate;
pub mod fanout;
pub mod policy;
pub mod render;

pub use aggregate::aggregate;
pub use fanout::{gather_reports, review, FanIn, FanOutConfig, SpecialistSource};
pub use policy::ConsensusPolicy;
pub use render::render_verdict_md;
