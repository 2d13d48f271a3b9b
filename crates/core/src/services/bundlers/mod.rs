#[cfg(feature = "esbuild-bundler")]
pub mod esbuild;
pub mod native;

#[cfg(feature = "esbuild-bundler")]
pub use esbuild::EsbuildBundler;
pub use native::NativeBundler;
