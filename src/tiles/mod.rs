pub mod loader;
pub mod source;

// Re-exports for convenience
pub use loader::{HttpTileFetcher, MemoryTileFetcher, TileFetcher, TileLoader, TileOutcome};
pub use source::{TileSource, UrlTemplateSource};
