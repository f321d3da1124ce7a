// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by the training and inference
// workflows:
//
//   checkpoint.rs — model weights (Burn CompactRecorder) plus
//                   the JSON configs needed to rebuild a model
//
//   metrics.rs    — per-epoch CSV log of losses, student/teacher
//                   agreement and accuracy
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
