//! Content script entry point.
//!
//! Compiled to WASM and injected into the music page by the extension. On
//! other targets this binary does nothing.

fn main() {
    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    {
        if let Err(error) = tunebridge_content::web::start() {
            tracing::error!(%error, "content script failed to start");
        }
    }
}
