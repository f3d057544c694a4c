//! The interaction state machine: upload, preview, processing, result.
//!
//! A [`Session`] is the single writer of all session state. Each
//! asynchronous step (reading a file, calling the model) is split into a
//! `begin_*` call that hands out a ticket and a `finish_*` call that applies
//! the outcome. Tickets carry the session generation at the time they were
//! issued; [`Session::reset`] and every accepted `begin_*` advance the
//! generation, so an outcome that arrives after the user has moved on is
//! dropped instead of applied.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::client::ImageProcessor;
use crate::encoded::{self, Download, EncodedImage, MAX_UPLOAD_BYTES};
use crate::error::{Error, Result};
use crate::options::ProcessingOptions;

/// How long a notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Shown when a failure carries no message of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process image. Please try again.";

/// Which step of the flow the session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No image loaded.
    #[default]
    Idle,
    /// An image is loaded and not yet processed.
    Preview,
    /// A request to the processor is in flight.
    Processing,
    /// A processed image is available next to the original.
    Completed,
}

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Something finished well.
    Success,
    /// Something failed.
    Error,
    /// Neutral information.
    Info,
}

/// A short-lived status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub kind: NotificationKind,
    /// Text shown to the user.
    pub message: String,
    created_at: Instant,
}

impl Notification {
    fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            created_at: Instant::now(),
        }
    }

    /// When this notification stops being shown.
    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.created_at + NOTIFICATION_TTL
    }

    /// Whether the notification has outlived [`NOTIFICATION_TTL`] at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// A pending file read, returned by [`Session::begin_select`].
#[derive(Debug)]
#[must_use = "pass the ticket to Session::finish_select"]
pub struct SelectTicket {
    generation: u64,
}

/// A pending processing request, returned by [`Session::begin_processing`].
///
/// Holds the image and options captured when processing started.
#[derive(Debug)]
#[must_use = "pass the ticket to Session::finish_processing"]
pub struct ProcessingTicket {
    generation: u64,
    image: EncodedImage,
    options: ProcessingOptions,
}

impl ProcessingTicket {
    /// The original image to send.
    #[must_use]
    pub fn image(&self) -> &EncodedImage {
        &self.image
    }

    /// The options in effect when processing started.
    #[must_use]
    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }
}

/// One user's editing session.
pub struct Session<P> {
    processor: P,
    phase: Phase,
    options: ProcessingOptions,
    original: Option<EncodedImage>,
    processed: Option<EncodedImage>,
    notification: Option<Notification>,
    generation: u64,
}

impl<P> Session<P> {
    /// Start an idle session with default options.
    pub fn new(processor: P) -> Self {
        Self {
            processor,
            phase: Phase::Idle,
            options: ProcessingOptions::default(),
            original: None,
            processed: None,
            notification: None,
            generation: 0,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> ProcessingOptions {
        self.options
    }

    /// The loaded image, if any.
    #[must_use]
    pub fn original_image(&self) -> Option<&EncodedImage> {
        self.original.as_ref()
    }

    /// The processed image, if any.
    #[must_use]
    pub fn processed_image(&self) -> Option<&EncodedImage> {
        self.processed.as_ref()
    }

    /// The processor this session sends images to.
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// The notification still visible now.
    #[must_use]
    pub fn notification(&self) -> Option<&Notification> {
        self.notification_at(Instant::now())
    }

    /// The notification still visible at `now`.
    #[must_use]
    pub fn notification_at(&self, now: Instant) -> Option<&Notification> {
        self.notification.as_ref().filter(|n| !n.is_expired(now))
    }

    /// Drop the notification if it has expired at `now`.
    pub fn expire_notification(&mut self, now: Instant) {
        if self.notification.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.notification = None;
        }
    }

    /// Drop the notification immediately.
    pub fn clear_notification(&mut self) {
        self.notification = None;
    }

    /// Replace the options wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while a request is in flight; the options a
    /// request captured never change under it.
    pub fn update_options(&mut self, options: ProcessingOptions) -> Result<()> {
        if self.phase == Phase::Processing {
            return Err(Error::Busy);
        }
        self.options = options;
        Ok(())
    }

    /// Start loading a file of `size` bytes.
    ///
    /// Files over [`MAX_UPLOAD_BYTES`] are rejected with an error
    /// notification and no state change. Selection is also refused while a
    /// request is in flight.
    pub fn begin_select(&mut self, size: u64) -> Option<SelectTicket> {
        if size > MAX_UPLOAD_BYTES {
            log::info!("rejecting {size} byte upload (limit {MAX_UPLOAD_BYTES})");
            let err = Error::FileTooLarge {
                size,
                limit: MAX_UPLOAD_BYTES,
            };
            self.notify(NotificationKind::Error, err.to_string());
            return None;
        }

        if self.phase == Phase::Processing {
            self.notify(
                NotificationKind::Info,
                "Please wait for the current image to finish processing.",
            );
            return None;
        }

        self.generation += 1;
        Some(SelectTicket {
            generation: self.generation,
        })
    }

    /// Apply the outcome of a file read.
    ///
    /// Returns `true` if the session moved to [`Phase::Preview`].
    pub fn finish_select(&mut self, ticket: SelectTicket, result: Result<EncodedImage>) -> bool {
        if ticket.generation != self.generation {
            log::debug!(
                "discarding stale file read (generation {} != {})",
                ticket.generation,
                self.generation
            );
            return false;
        }

        match result {
            Ok(image) => {
                self.original = Some(image);
                self.processed = None;
                self.notification = None;
                self.set_phase(Phase::Preview);
                true
            }
            Err(e) => {
                log::warn!("failed to read image: {e}");
                self.notify(NotificationKind::Error, format!("Failed to read image: {e}"));
                false
            }
        }
    }

    /// Start processing the loaded image with the current options.
    ///
    /// Does nothing unless an image is loaded and the session is in
    /// [`Phase::Preview`].
    pub fn begin_processing(&mut self) -> Option<ProcessingTicket> {
        if self.phase != Phase::Preview {
            log::debug!("ignoring process request in {:?}", self.phase);
            return None;
        }
        let image = self.original.clone()?;

        self.notification = None;
        self.generation += 1;
        self.set_phase(Phase::Processing);

        Some(ProcessingTicket {
            generation: self.generation,
            image,
            options: self.options,
        })
    }

    /// Apply the outcome of a processing request.
    ///
    /// Success moves to [`Phase::Completed`]; failure returns to
    /// [`Phase::Preview`] with an error notification. Returns `true` if the
    /// outcome was applied.
    pub fn finish_processing(
        &mut self,
        ticket: ProcessingTicket,
        result: Result<EncodedImage>,
    ) -> bool {
        if ticket.generation != self.generation || self.phase != Phase::Processing {
            log::debug!(
                "discarding stale processing result (generation {} != {}, phase {:?})",
                ticket.generation,
                self.generation,
                self.phase
            );
            return false;
        }

        match result {
            Ok(image) => {
                self.processed = Some(image);
                self.set_phase(Phase::Completed);
                self.notify(NotificationKind::Success, "Watermark removed");
            }
            Err(e) => {
                self.set_phase(Phase::Preview);
                self.notify(NotificationKind::Error, failure_message(&e));
            }
        }
        true
    }

    /// Clear both images and any notification and return to [`Phase::Idle`].
    ///
    /// Outcomes of requests still in flight are discarded when they arrive.
    pub fn reset(&mut self) {
        self.original = None;
        self.processed = None;
        self.notification = None;
        self.generation += 1;
        self.set_phase(Phase::Idle);
    }

    /// Prepare the processed image for saving, named after `timestamp_millis`.
    ///
    /// Returns `Ok(None)` when there is no processed image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Base64`] if the processed payload cannot be decoded.
    pub fn download(&self, timestamp_millis: i64) -> Result<Option<Download>> {
        self.processed
            .as_ref()
            .map(|image| Download::from_image(image, timestamp_millis))
            .transpose()
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("phase {:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.notification = Some(Notification::new(kind, message));
    }
}

impl<P: ImageProcessor> Session<P> {
    /// Load the file at `path`: size check, read, and transition.
    ///
    /// Returns `true` if the session moved to [`Phase::Preview`].
    pub async fn select_file(&mut self, path: &Path) -> bool {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                self.notify(
                    NotificationKind::Error,
                    format!("Failed to read image: {}", Error::Io(e)),
                );
                return false;
            }
        };

        let Some(ticket) = self.begin_select(size) else {
            return false;
        };
        let result = encoded::encode_file(path).await;
        self.finish_select(ticket, result)
    }

    /// Process the loaded image and apply the outcome.
    ///
    /// Returns `true` if the session reached [`Phase::Completed`].
    pub async fn process(&mut self) -> bool {
        let Some(ticket) = self.begin_processing() else {
            return false;
        };
        let result = self
            .processor
            .process(ticket.image(), ticket.options())
            .await;
        self.finish_processing(ticket, result);
        self.phase == Phase::Completed
    }
}

/// Notification text for a failure.
#[must_use]
pub fn failure_message(err: &Error) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        GENERIC_FAILURE_MESSAGE.to_string()
    } else {
        message
    }
}
