use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::client::CardClient;
use super::notify::{self, Notifier};
use crate::render::{self, Capabilities, RenderError};

/// What the card panel is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing generated yet.
    Idle,
    /// Waiting on the proxy.
    Loading,
    /// A card is shown and can be exported.
    Loaded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardView {
    pub loading: bool,
    pub svg: Option<String>,
}

impl CardView {
    pub fn phase(&self) -> Phase {
        match (self.loading, &self.svg) {
            (true, _) => Phase::Loading,
            (false, Some(_)) => Phase::Loaded,
            (false, None) => Phase::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty input; nothing was sent.
    Rejected,
    /// The reply had an SVG and it is now displayed.
    Generated,
    /// The proxy answered without an SVG (including error replies).
    NoSvg,
    /// The proxy could not be reached or answered garbage.
    Failed,
}

/// One user's card panel: a form submit plus the three exports.
///
/// Overlapping submits are not coordinated; whichever reply lands last is
/// the one displayed.
pub struct CardSession {
    client: CardClient,
    capabilities: Box<dyn Capabilities>,
    notifier: Box<dyn Notifier>,
    view: RwLock<CardView>,
}

impl CardSession {
    pub fn new(
        client: CardClient,
        capabilities: Box<dyn Capabilities>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            capabilities,
            notifier,
            view: RwLock::new(CardView::default()),
        }
    }

    pub async fn view(&self) -> CardView {
        self.view.read().await.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.view.read().await.phase()
    }

    /// Shows `svg` as the current card.
    pub async fn display(&self, svg: impl Into<String>) {
        self.view.write().await.svg = Some(svg.into());
    }

    pub async fn submit(&self, word: &str) -> SubmitOutcome {
        if word.is_empty() {
            self.notifier.error(notify::EMPTY_INPUT);
            return SubmitOutcome::Rejected;
        }

        self.view.write().await.loading = true;
        let reply = self.client.generate(word).await;

        let mut view = self.view.write().await;
        view.loading = false;

        match reply {
            Ok(reply) => match reply.svg_content.filter(|svg| !svg.is_empty()) {
                Some(svg) => {
                    view.svg = Some(svg);
                    drop(view);
                    info!(word, "Card displayed");
                    self.notifier.success(notify::GENERATED);
                    SubmitOutcome::Generated
                }
                None => {
                    drop(view);
                    warn!(word, error = ?reply.error, "Proxy reply had no SVG");
                    self.notifier.error(notify::NO_SVG);
                    SubmitOutcome::NoSvg
                }
            },
            Err(e) => {
                drop(view);
                error!(word, error = %e, "Generation failed");
                self.notifier.error(notify::GENERATION_FAILED);
                SubmitOutcome::Failed
            }
        }
    }

    async fn current_svg(&self) -> Result<String, RenderError> {
        self.view
            .read()
            .await
            .svg
            .clone()
            .ok_or(RenderError::SvgElementMissing)
    }

    /// Copy raw markup.
    pub async fn copy_svg(&self) -> Result<(), RenderError> {
        let result = match self.current_svg().await {
            Ok(svg) => render::copy_svg(self.capabilities.as_ref(), &svg),
            Err(e) => Err(e),
        };
        self.report(&result, notify::SVG_COPIED, notify::SVG_COPY_FAILED);
        result
    }

    /// Download as PNG.
    pub async fn download_png(&self) -> Result<PathBuf, RenderError> {
        let result = match self.current_svg().await {
            Ok(svg) => render::download_png(self.capabilities.as_ref(), &svg),
            Err(e) => Err(e),
        };
        self.report(&result, notify::IMAGE_SAVED, notify::IMAGE_CREATE_FAILED);
        result
    }

    /// Copy as PNG.
    pub async fn copy_png(&self) -> Result<(), RenderError> {
        let result = match self.current_svg().await {
            Ok(svg) => render::copy_png(self.capabilities.as_ref(), &svg).map(|_| ()),
            Err(e) => Err(e),
        };
        self.report(&result, notify::IMAGE_COPIED, notify::IMAGE_COPY_FAILED);
        result
    }

    fn report<T>(&self, result: &Result<T, RenderError>, success: &str, failure: &str) {
        match result {
            Ok(_) => self.notifier.success(success),
            Err(RenderError::SvgElementMissing) => {
                warn!("Export requested with no card displayed");
                self.notifier.error(notify::SVG_ELEMENT_MISSING);
            }
            Err(e) => {
                error!(error = %e, "Export failed");
                self.notifier.error(failure);
            }
        }
    }
}
