//! Command Module
//!
//! Maps parsed commands to store operations and RESP replies.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │ command_args()
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module, resolved through COMMANDS)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ KeyValueStore   │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;
pub mod table;

pub use handler::{command_args, CommandError, CommandHandler};
pub use table::{lookup, Arity, CommandSpec, COMMANDS};
