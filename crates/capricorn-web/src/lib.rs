//! capricorn-web: HTTP surface for the literature review service.
//!   - Streaming article retrieval and scoring (NDJSON)
//!   - Final case analysis
//!   - Abstract lookup
//!   - Disease / actionable event extraction from case notes
//!   - Health

pub mod router;
pub mod handlers;
pub mod state;
pub mod stream;
