// Ephemeral artifact storage: the on-disk store, the TTL sweeper that reclaims
// it, and the download routes that serve stored files back by id.

pub mod handlers;
pub mod store;
pub mod sweep;

pub use store::{ArtifactId, ArtifactKind, ArtifactStore, StoreError};
pub use sweep::{SweepPolicy, Sweeper};
