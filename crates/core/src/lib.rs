//! Scaffolding Core Library
//!
//! Room membership state, member models and room codes shared by the
//! Scaffolding host and client.

pub mod error;
pub mod invariants;
pub mod machine;
pub mod models;
pub mod room;
pub mod room_code;

pub use error::{Error, Result, RoomCodeError};
pub use machine::machine_id;
pub use models::*;
pub use room::Room;
pub use room_code::RoomCode;
