//! Runtime for page hooks: the hook host, the relay hooks it mounts next to
//! the editor and chart hooks, and reference adapters that run everything
//! against the in-memory page.

pub mod host;
pub mod keys;
pub mod rope_surface;
pub mod settings;
pub mod sparkline;
pub mod storage;
pub mod theme;

pub use host::{
  HookContext,
  HookHost,
  HostConfig,
  PushedEvent,
};
pub use keys::KeyEvent;
pub use rope_surface::{
  RopeAdapter,
  RopeSurface,
};
pub use sparkline::{
  SparklineConfig,
  SparklineRenderer,
};
pub use storage::{
  FileStorage,
  MemoryStorage,
  Storage,
  StorageError,
};
