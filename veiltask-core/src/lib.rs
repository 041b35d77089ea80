pub mod digest;
pub mod errors;
pub mod identifier;
pub mod models;
pub mod protocol;

pub use digest::*;
pub use errors::*;
pub use identifier::*;
pub use models::*;
pub use protocol::*;

pub type StoreResult<T> = Result<T, StoreError>;
