pub mod fetcher;
pub mod metadata;
pub mod reconciler;
