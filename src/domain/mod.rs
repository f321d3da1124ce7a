// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the data the
// encoders consume. No Burn types, no file I/O.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A pre-tokenised input example
pub mod sample;

// What the classifier predicted for one sample
pub mod prediction;

// Core abstractions (traits) that other layers implement
pub mod traits;
