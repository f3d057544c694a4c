//! What each phase shows, derived from a [`Session`] and nothing else.

use crate::encoded::EncodedImage;
use crate::options::ProcessingOptions;
use crate::session::{Phase, Session};

/// Enabled state and labels of the editor controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    /// The process button can be pressed.
    pub process_enabled: bool,
    /// The cancel button can be pressed.
    pub cancel_enabled: bool,
    /// The options can be edited.
    pub options_enabled: bool,
    /// Label of the process button.
    pub process_label: &'static str,
}

impl Controls {
    fn for_phase(phase: Phase) -> Self {
        let busy = phase == Phase::Processing;
        Self {
            process_enabled: !busy,
            cancel_enabled: !busy,
            options_enabled: !busy,
            process_label: if busy {
                "Processing..."
            } else {
                "Remove Watermark"
            },
        }
    }
}

/// The screen for the current phase.
#[derive(Debug, Clone, PartialEq)]
pub enum View<'a> {
    /// Upload prompt.
    Upload,
    /// The loaded image with options and controls, possibly under a
    /// processing overlay.
    Editor {
        /// The loaded image.
        image: &'a EncodedImage,
        /// Current options.
        options: ProcessingOptions,
        /// Whether the processing overlay is shown.
        processing: bool,
        /// Control state.
        controls: Controls,
    },
    /// Before/after comparison.
    Comparison {
        /// The original image.
        before: &'a EncodedImage,
        /// The processed image.
        after: &'a EncodedImage,
    },
}

impl<'a> View<'a> {
    /// Derive the view for `session`.
    #[must_use]
    pub fn of<P>(session: &'a Session<P>) -> Self {
        let phase = session.phase();
        match (phase, session.original_image(), session.processed_image()) {
            (Phase::Completed, Some(before), Some(after)) => Self::Comparison { before, after },
            (Phase::Preview | Phase::Processing, Some(image), _) => Self::Editor {
                image,
                options: session.options(),
                processing: phase == Phase::Processing,
                controls: Controls::for_phase(phase),
            },
            _ => Self::Upload,
        }
    }

    /// One-line description, as printed by the command-line front end.
    #[must_use]
    pub fn status_line(&self) -> String {
        match self {
            Self::Upload => "Upload an image (PNG, JPEG or WebP, up to 5MB)".to_string(),
            Self::Editor {
                image,
                options,
                processing: true,
                ..
            } => format!(
                "Analyzing & Removing... ({}, {} {}%)",
                image.media_type(),
                options.instruction().label(),
                options.aggressiveness
            ),
            Self::Editor { image, options, .. } => format!(
                "Ready: {} at {}% aggressiveness",
                image.media_type(),
                options.aggressiveness
            ),
            Self::Comparison { before, after } => format!(
                "Result: {} -> {}",
                before.media_type(),
                after.media_type()
            ),
        }
    }
}
