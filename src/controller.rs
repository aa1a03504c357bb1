//! Ties the form, the webhook and the display together.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::actions::{self, DownloadOutcome, Platform, ShareOutcome};
use crate::client::DreamClient;
use crate::constants::SLOW_WARNING_AFTER;
use crate::dream::{DreamImage, DreamRequest, DreamResponse};
use crate::error::{ActionError, DreamError};
use crate::presenter::{PresentationPort, ProgressStep, Region};
use crate::render::{DisplayedImage, ImageDecoder, RenderState, Renderer};
use crate::validate::ValidationResult;

/// The image on screen and the dream that produced it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionState {
    current: Option<(String, DreamRequest)>,
}

impl SessionState {
    /// Session showing `image_ref`, generated from `request`.
    pub fn displayed(image_ref: String, request: DreamRequest) -> Self {
        Self {
            current: Some((image_ref, request)),
        }
    }

    /// The displayed image reference.
    pub fn image_ref(&self) -> Option<&str> {
        self.current.as_ref().map(|(image_ref, _)| image_ref.as_str())
    }

    /// The dream behind the displayed image.
    pub fn request(&self) -> Option<&DreamRequest> {
        self.current.as_ref().map(|(_, request)| request)
    }

    /// Name from the dream behind the displayed image.
    pub fn dreamer_name(&self) -> Option<&str> {
        self.request()
            .map(|request| request.name.trim())
            .filter(|name| !name.is_empty())
    }

    /// True when nothing is displayed.
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

/// Cancels the in-flight request generation from anywhere.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    generation: Arc<watch::Sender<u64>>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            generation: Arc::new(watch::Sender::new(0)),
        }
    }

    /// Starts a new generation; whatever is in flight becomes stale.
    pub fn cancel(&self) -> u64 {
        self.generation.send_modify(|generation| *generation += 1);
        self.current()
    }

    /// The current generation.
    pub fn current(&self) -> u64 {
        *self.generation.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

/// How a submit ended.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The form didn't validate; nothing was sent.
    Invalid(ValidationResult),
    /// The image is on screen.
    Displayed {
        /// What the webhook (or demo fallback) answered
        image: DreamImage,
        /// What was rendered
        displayed: DisplayedImage,
    },
    /// The request or the render failed; the error is on screen.
    Failed(DreamError),
    /// A new dream was started before this one finished; nothing was shown.
    Stale,
}

/// Owns the session and runs one dream at a time.
pub struct DreamController<P, D> {
    client: DreamClient,
    renderer: Renderer<D>,
    presenter: P,
    session: SessionState,
    cancel: CancelHandle,
}

impl<P: PresentationPort, D: ImageDecoder> DreamController<P, D> {
    /// Controller with an empty session.
    pub fn new(client: DreamClient, decoder: D, presenter: P) -> Self {
        let load_timeout = client.config().image_timeout;
        Self {
            client,
            renderer: Renderer::new(decoder).with_load_timeout(load_timeout),
            presenter,
            session: SessionState::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Handle for cancelling from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The displayed image, if any.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The presenter.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Where the renderer is.
    pub fn render_state(&self) -> &RenderState {
        self.renderer.state()
    }

    /// Validates, sends and renders one dream.
    ///
    /// Taking `&mut self` keeps it single-flight; the submit control is
    /// disabled for the duration and re-enabled on every path.
    pub async fn submit(&mut self, fields: &BTreeMap<String, String>) -> SubmitOutcome {
        let request = match DreamRequest::from_fields(fields) {
            Ok(request) => request,
            Err(result) => {
                self.presenter.show_error(&result.summary());
                self.presenter.scroll_into_view(Region::Error);
                return SubmitOutcome::Invalid(result);
            }
        };

        let generation = self.cancel.cancel();
        let mut cancelled = self.cancel.subscribe();
        info!("Submitting dream generation {}", generation);

        self.presenter.hide_error();
        self.presenter.set_submit_enabled(false);
        self.presenter.show_loading();
        self.presenter.scroll_into_view(Region::Result);

        let response = drive_request(
            &self.client,
            &mut self.presenter,
            &request,
            &mut cancelled,
        )
        .await;

        let outcome = match response {
            None => SubmitOutcome::Stale,
            Some(Err(err)) => {
                self.presenter.show_error(&err.to_string());
                self.presenter.scroll_into_view(Region::Error);
                SubmitOutcome::Failed(err.into())
            }
            Some(Ok(image)) => {
                let rendered = until_cancelled(
                    &mut cancelled,
                    self.renderer.render(&image.image_ref, &mut self.presenter),
                )
                .await;
                match rendered {
                    None => SubmitOutcome::Stale,
                    Some(Ok(_)) if self.cancel.current() != generation => SubmitOutcome::Stale,
                    Some(Ok(displayed)) => {
                        self.session = SessionState::displayed(image.image_ref.clone(), request);
                        SubmitOutcome::Displayed { image, displayed }
                    }
                    Some(Err(err)) => {
                        self.presenter.scroll_into_view(Region::Error);
                        SubmitOutcome::Failed(err.into())
                    }
                }
            }
        };

        if matches!(outcome, SubmitOutcome::Stale) || self.cancel.current() != generation {
            debug!("Dropping result of stale generation {}", generation);
            self.presenter.set_submit_enabled(true);
            return SubmitOutcome::Stale;
        }
        self.presenter.set_submit_enabled(true);
        outcome
    }

    /// Forgets the current dream and cancels anything in flight.
    pub fn new_dream(&mut self) {
        let generation = self.cancel.cancel();
        debug!("Starting a new dream, generation {}", generation);
        self.session = SessionState::default();
        self.renderer.reset();
        self.presenter.clear_result();
        self.presenter.hide_error();
        self.presenter.set_submit_enabled(true);
        self.presenter.scroll_into_view(Region::Form);
    }

    /// Saves the displayed image.
    pub async fn download<F: Platform>(
        &self,
        platform: &mut F,
    ) -> Result<DownloadOutcome, ActionError> {
        actions::download(&self.session, self.client.http(), platform).await
    }

    /// Shares the displayed image.
    pub fn share<F: Platform>(&self, platform: &mut F) -> Result<ShareOutcome, ActionError> {
        actions::share(&self.session, platform)
    }
}

/// Awaits `future` unless the generation moves on first.
async fn until_cancelled<F: Future>(
    cancelled: &mut watch::Receiver<u64>,
    future: F,
) -> Option<F::Output> {
    tokio::select! {
        output = future => Some(output),
        _ = cancelled.changed() => None,
    }
}

/// Runs the request while stepping the progress messages; `None` when cancelled.
async fn drive_request<P: PresentationPort>(
    client: &DreamClient,
    presenter: &mut P,
    request: &DreamRequest,
    cancelled: &mut watch::Receiver<u64>,
) -> Option<DreamResponse> {
    let started = Instant::now();
    let response = client.send_dream_request(request);
    tokio::pin!(response);
    let slow_warning = tokio::time::sleep_until(started + SLOW_WARNING_AFTER);
    tokio::pin!(slow_warning);

    let mut step = 0;
    presenter.show_progress(ProgressStep::ALL[step]);
    let mut next_step_at = started + ProgressStep::ALL[step].duration();
    let mut warned = false;

    loop {
        tokio::select! {
            response = &mut response => return Some(response),
            _ = cancelled.changed() => return None,
            _ = tokio::time::sleep_until(next_step_at), if step + 1 < ProgressStep::ALL.len() => {
                step += 1;
                presenter.show_progress(ProgressStep::ALL[step]);
                next_step_at += ProgressStep::ALL[step].duration();
            }
            _ = &mut slow_warning, if !warned => {
                warned = true;
                presenter.show_slow_warning();
            }
        }
    }
}
