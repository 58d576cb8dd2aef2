//! # Mailcast
//!
//! Turn a mailbox message into a single spoken-audio file.
//!
//! Mailcast fetches one email, splits its body into provider-sized text
//! segments, synthesizes each segment through a remote text-to-speech API
//! strictly in order, and concatenates the chunk outputs byte-for-byte
//! into one merged artifact. Per-chunk audio is persisted alongside the
//! merged file for debuggability, and an append-only ledger keeps
//! already-processed messages from being synthesized (and billed) twice.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//! │ MessageSource │──▶│ Splitter │──▶│ Synthesizer  │──▶│ AudioStore  │
//! │   (Gmail)     │   │ (split)  │   │ (OpenAI TTS) │   │ parts/merged│
//! └───────────────┘   └──────────┘   └──────┬───────┘   └─────────────┘
//!                                           │ per chunk, in order
//!                                    ┌──────▼──────┐
//!                                    │   Ledger    │  appended on success
//!                                    └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy and pipeline stage tagging |
//! | [`models`] | Core data types |
//! | [`split`] | Byte/char bounded text splitting |
//! | [`name`] | Filesystem-safe artifact naming |
//! | [`source`] | Mailbox message source |
//! | [`synth`] | Text-to-speech adapter |
//! | [`rewrite`] | Pre-synthesis text reshaping |
//! | [`store`] | Audio persistence |
//! | [`ledger`] | Processed-message ledger |
//! | [`parts`] | On-disk `_part{N}` ordering |
//! | [`pipeline`] | Run orchestration |

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod name;
pub mod parts;
pub mod pipeline;
pub mod rewrite;
pub mod source;
pub mod split;
pub mod store;
pub mod synth;
