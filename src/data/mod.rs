// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a JSONL file of token ids to tensor batches:
//
//   samples.jsonl
//       │
//       ▼
//   JsonlLoader       → parses one EncodedSample per line
//       │
//       ▼
//   EncodedSample::padded → every sample to max_seq_len
//       │
//       ▼
//   split_train_val   → seeded shuffle + split
//       │
//       ▼
//   DistillDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   DistillBatcher    → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads pre-tokenised samples from JSON lines
pub mod loader;

/// Implements Burn's Dataset trait for encoded samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;
