// ============================================================================
// Core Actor Abstractions
// ============================================================================
//
// Types shared by every infrastructure actor: health reporting and the
// common stop message.
//
// ============================================================================

pub mod health;

// Re-export core types
pub use health::*;
