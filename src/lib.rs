//! Remove watermarks from images with a Gemini image model.
//!
//! The crate models one editing session: load an image, pick how
//! aggressively the model should work, send it off, and compare the result
//! with the original. The image work itself happens remotely; this crate
//! owns the state machine around it, the request/response adapter, and the
//! conversions between files and data URLs.
//!
//! # Quick Start
//!
//! ```no_run
//! use clearview::{GeminiClient, GeminiConfig, Phase, ProcessingOptions, Session};
//!
//! # async fn run() -> clearview::Result<()> {
//! let client = GeminiClient::new(GeminiConfig::from_env())?;
//! let mut session = Session::new(client);
//!
//! session.select_file("photo.png".as_ref()).await;
//! session.update_options(ProcessingOptions::new(80, false))?;
//! session.process().await;
//!
//! if session.phase() == Phase::Completed {
//!     if let Some(download) = session.download(chrono::Utc::now().timestamp_millis())? {
//!         download.save_to(".".as_ref())?;
//!     }
//! } else if let Some(note) = session.notification() {
//!     eprintln!("{}", note.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing with a fake processor
//!
//! [`Session`] is generic over [`ImageProcessor`], so the remote call can be
//! replaced without touching the network.
//!
//! ```
//! use clearview::{EncodedImage, ImageProcessor, ProcessingOptions, Result};
//!
//! struct Echo;
//!
//! impl ImageProcessor for Echo {
//!     async fn process(&self, image: &EncodedImage, _: &ProcessingOptions) -> Result<EncodedImage> {
//!         Ok(image.clone())
//!     }
//! }
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod encoded;
pub mod error;
mod options;
pub mod session;
pub mod view;

pub use client::{GeminiClient, GeminiConfig, ImageProcessor};
pub use encoded::{is_supported_image, Download, EncodedImage, MAX_UPLOAD_BYTES};
pub use error::{Error, Result};
pub use options::{Instruction, ProcessingOptions, DEFAULT_AGGRESSIVENESS};
pub use session::{Notification, NotificationKind, Phase, Session};
pub use view::View;
