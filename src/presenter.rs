//! The display side: what the dream flow asks the screen to do.

use std::time::Duration;

use tracing::{info, warn};

use crate::render::{DisplayedImage, ImageKind, preview};

/// Display regions that can be scrolled to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Region {
    /// Top of the form
    Form,
    /// Where the image (or its placeholder) goes
    Result,
    /// The error message
    Error,
}

/// Messages shown while the webhook works.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressStep {
    /// Reading the form
    AnalysingForm,
    /// Turning it into a prompt
    BuildingPrompt,
    /// Waiting for the image model
    GeneratingImage,
    /// Almost there
    FinishingTouches,
}

impl ProgressStep {
    /// All steps, in display order.
    pub const ALL: [ProgressStep; 4] = [
        ProgressStep::AnalysingForm,
        ProgressStep::BuildingPrompt,
        ProgressStep::GeneratingImage,
        ProgressStep::FinishingTouches,
    ];

    /// Text shown for the step.
    pub fn message(self) -> &'static str {
        match self {
            ProgressStep::AnalysingForm => "Analysing your form...",
            ProgressStep::BuildingPrompt => "Building the AI prompt...",
            ProgressStep::GeneratingImage => "Generating the image...",
            ProgressStep::FinishingTouches => "Adding the finishing touches...",
        }
    }

    /// How long the step stays up before the next one is shown.
    pub fn duration(self) -> Duration {
        match self {
            ProgressStep::AnalysingForm => Duration::from_secs(5),
            _ => Duration::from_secs(15),
        }
    }

    /// 1-based position, for progress dots.
    pub fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|step| *step == self)
            .map_or(0, |index| index + 1)
    }
}

/// Setter-style operations the dream flow performs on the display.
///
/// Implementations own the rendering; the flow never inspects display state.
pub trait PresentationPort {
    /// Enables or disables the submit control.
    fn set_submit_enabled(&mut self, enabled: bool);
    /// Shows the result region with its placeholder, hiding any old image and actions.
    fn show_loading(&mut self);
    /// Updates the placeholder with a progress step.
    fn show_progress(&mut self, step: ProgressStep);
    /// Tells the user generation is slower than usual.
    fn show_slow_warning(&mut self);
    /// Shows the image with a fade-in and exposes download/share.
    fn show_image(&mut self, image: &DisplayedImage);
    /// Hides the result region and shows an error message.
    fn show_error(&mut self, message: &str);
    /// Hides the error region.
    fn hide_error(&mut self);
    /// Hides the result region and resets it to its placeholder.
    fn clear_result(&mut self);
    /// Brings a region into view.
    fn scroll_into_view(&mut self, region: Region);
}

/// Prints to the terminal.
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    submit_enabled: bool,
}

impl TerminalPresenter {
    /// Whether a new dream can be submitted right now.
    pub fn submit_enabled(&self) -> bool {
        self.submit_enabled
    }
}

impl PresentationPort for TerminalPresenter {
    fn set_submit_enabled(&mut self, enabled: bool) {
        self.submit_enabled = enabled;
    }

    fn show_loading(&mut self) {
        eprintln!("Creating your dream world. This can take 30-60 seconds.");
    }

    fn show_progress(&mut self, step: ProgressStep) {
        eprintln!(
            "[{}/{}] {}",
            step.position(),
            ProgressStep::ALL.len(),
            step.message()
        );
    }

    fn show_slow_warning(&mut self) {
        warn!("Image generation is taking longer than usual. Please wait...");
    }

    fn show_image(&mut self, image: &DisplayedImage) {
        info!(
            "Image ready: {}x{} {}",
            image.info.width,
            image.info.height,
            image.info.format.as_deref().unwrap_or("image")
        );
        match image.kind {
            ImageKind::Remote => println!("{}", image.reference),
            ImageKind::Embedded => println!("{}", preview(&image.reference)),
        }
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("Error: {message}");
    }

    fn hide_error(&mut self) {}

    fn clear_result(&mut self) {}

    fn scroll_into_view(&mut self, _region: Region) {}
}

/// One call made on a [`RecordingPresenter`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PresenterEvent {
    /// `set_submit_enabled`
    SubmitEnabled(bool),
    /// `show_loading`
    Loading,
    /// `show_progress`
    Progress(ProgressStep),
    /// `show_slow_warning`
    SlowWarning,
    /// `show_image`, with the reference
    ImageShown(String),
    /// `show_error`
    Error(String),
    /// `hide_error`
    ErrorHidden,
    /// `clear_result`
    ResultCleared,
    /// `scroll_into_view`
    Scrolled(Region),
}

/// Keeps every call, for headless embedding and for tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingPresenter {
    /// Calls in order
    pub events: Vec<PresenterEvent>,
}

impl RecordingPresenter {
    /// Message of the most recent `show_error`.
    pub fn last_error(&self) -> Option<String> {
        self.events.iter().rev().find_map(|event| match event {
            PresenterEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
    }

    /// State of the submit control after the last toggle; enabled initially.
    pub fn submit_enabled(&self) -> bool {
        self.events
            .iter()
            .rev()
            .find_map(|event| match event {
                PresenterEvent::SubmitEnabled(enabled) => Some(*enabled),
                _ => None,
            })
            .unwrap_or(true)
    }
}

impl PresentationPort for RecordingPresenter {
    fn set_submit_enabled(&mut self, enabled: bool) {
        self.events.push(PresenterEvent::SubmitEnabled(enabled));
    }

    fn show_loading(&mut self) {
        self.events.push(PresenterEvent::Loading);
    }

    fn show_progress(&mut self, step: ProgressStep) {
        self.events.push(PresenterEvent::Progress(step));
    }

    fn show_slow_warning(&mut self) {
        self.events.push(PresenterEvent::SlowWarning);
    }

    fn show_image(&mut self, image: &DisplayedImage) {
        self.events
            .push(PresenterEvent::ImageShown(image.reference.clone()));
    }

    fn show_error(&mut self, message: &str) {
        self.events.push(PresenterEvent::Error(message.to_string()));
    }

    fn hide_error(&mut self) {
        self.events.push(PresenterEvent::ErrorHidden);
    }

    fn clear_result(&mut self) {
        self.events.push(PresenterEvent::ResultCleared);
    }

    fn scroll_into_view(&mut self, region: Region) {
        self.events.push(PresenterEvent::Scrolled(region));
    }
}
