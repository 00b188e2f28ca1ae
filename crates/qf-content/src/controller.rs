//! Page controller: one processing pass over the document, navigation
//! handling, and the overlay controls.

use crate::ancillary::AncillaryElementSuppressor;
use crate::gate::ProcessingGate;
use crate::matcher::Matcher;
use crate::mode_preventer::ModePreventer;
use crate::ownership::is_owned;
use crate::registry::ItemHandle;
use crate::registry::ItemState;
use crate::registry::SessionRegistry;
use crate::saved_panel::SavedItemsPanel;
use crate::suppressor::ItemSuppressor;
use crate::suppressor::SAVE_CLASS;
use crate::suppressor::SuppressOutcome;
use crate::suppressor::TOGGLE_CLASS;
use crate::suppressor::overlay_target;
use chrono::Utc;
use qf_core::QfError;
use qf_core::QfResult;
use qf_dom::Document;
use qf_dom::NodeId;
use qf_ipc::ExtensionBridge;
use qf_ipc::Request;
use qf_ipc::Response;
use qf_policy::BlockingPolicy;
use qf_policy::LocationMode;
use qf_storage::SavedItem;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    EnabledCheck,
    ModePreventer,
    Ancillary,
    Suppression,
    SavedPanel,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnabledCheck => "enabled-check",
            Self::ModePreventer => "mode-preventer",
            Self::Ancillary => "ancillary",
            Self::Suppression => "suppression",
            Self::SavedPanel => "saved-panel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: QfError,
}

/// Summary of one processing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub location: String,
    pub mode: LocationMode,
    pub enabled: bool,
    pub matched: usize,
    pub newly_suppressed: usize,
    pub ancillary_hidden: usize,
    pub scroll_locked: bool,
    pub panel_refreshed: bool,
    pub failures: Vec<StageFailure>,
}

impl PassReport {
    fn new(location: &str, mode: LocationMode) -> Self {
        Self {
            location: location.to_owned(),
            mode,
            enabled: true,
            matched: 0,
            newly_suppressed: 0,
            ancillary_hidden: 0,
            scroll_locked: false,
            panel_refreshed: false,
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, stage: Stage, error: QfError) {
        warn!(stage = stage.as_str(), %error, "pipeline stage failed");
        self.failures.push(StageFailure { stage, error });
    }
}

/// What a click on an overlay control did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Toggled { element: NodeId, state: ItemState },
    Saved { item: SavedItem },
}

/// Owns the session registry and the current location, and drives every
/// stage of a pass.
#[derive(Debug)]
pub struct PageController<B> {
    policy: BlockingPolicy,
    matcher: Matcher,
    suppressor: ItemSuppressor,
    ancillary: AncillaryElementSuppressor,
    mode: ModePreventer,
    panel: SavedItemsPanel,
    registry: SessionRegistry,
    gate: ProcessingGate,
    bridge: B,
    location: String,
}

impl<B: ExtensionBridge> PageController<B> {
    pub fn new(policy: BlockingPolicy, bridge: B, location: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::targets(&policy),
            suppressor: ItemSuppressor::new(),
            ancillary: AncillaryElementSuppressor::from_policy(&policy),
            mode: ModePreventer::from_policy(&policy),
            panel: SavedItemsPanel::from_policy(&policy),
            registry: SessionRegistry::new(),
            gate: ProcessingGate::new(),
            bridge,
            location: location.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &BlockingPolicy {
        &self.policy
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn location_mode(&self) -> LocationMode {
        self.policy.location_mode(&self.location)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn mode_preventer(&self) -> &ModePreventer {
        &self.mode
    }

    pub fn panel(&self) -> &SavedItemsPanel {
        &self.panel
    }

    pub fn gate(&self) -> &ProcessingGate {
        &self.gate
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    /// Runs one pass. Returns `None` when a pass is already running.
    pub fn process_page(&mut self, document: &mut Document) -> Option<PassReport> {
        let gate = self.gate.clone();
        let Some(_guard) = gate.try_enter() else {
            debug!("pass already running; trigger dropped");
            return None;
        };

        let mode = self.location_mode();
        let mut report = PassReport::new(&self.location, mode);

        report.enabled = match self.enabled_state() {
            Ok(enabled) => enabled,
            Err(error) => {
                report.fail(Stage::EnabledCheck, error);
                true
            }
        };
        if !report.enabled {
            if let Err(error) = self.mode.disable(document) {
                report.fail(Stage::ModePreventer, error);
            }
            info!(location = %self.location, "extension disabled; pass skipped");
            return Some(report);
        }

        if let Err(error) = self.mode.update(document, mode) {
            report.fail(Stage::ModePreventer, error);
        }
        report.scroll_locked = self.mode.is_active();

        match self.ancillary.run(document, &mut self.registry, mode) {
            Ok(hidden) => report.ancillary_hidden = hidden,
            Err(error) => report.fail(Stage::Ancillary, error),
        }

        let found = self.matcher.find(document);
        report.matched = found.len();
        for element in found {
            if self.registry.is_tracked(element) {
                continue;
            }
            match self.suppressor.suppress(document, &mut self.registry, element) {
                Ok(SuppressOutcome::Suppressed { .. }) => {
                    report.newly_suppressed = report.newly_suppressed.saturating_add(1);
                }
                Ok(SuppressOutcome::AlreadyTracked) => {}
                Err(error) => report.fail(Stage::Suppression, error),
            }
        }

        if mode == LocationMode::Landing {
            self.refresh_saved_panel(document, &mut report);
        }

        info!(
            location = %report.location,
            mode = mode.as_str(),
            matched = report.matched,
            suppressed = report.newly_suppressed,
            ancillary = report.ancillary_hidden,
            scroll_locked = report.scroll_locked,
            failures = report.failures.len(),
            "pass complete"
        );
        Some(report)
    }

    /// Starts a new session if `url` differs from the current location.
    /// Returns true if it did.
    pub fn handle_navigation(&mut self, document: &mut Document, url: &str) -> bool {
        if url == self.location {
            debug!(url, "navigation to current location ignored");
            return false;
        }

        info!(from = %self.location, to = url, "navigated; resetting session");
        self.location = url.to_owned();
        self.suppressor.reset(&mut self.registry);
        self.registry.reset_ancillary();
        self.panel.remove(document);
        true
    }

    pub fn handle_for(&self, element: NodeId) -> Option<ItemHandle> {
        self.registry.handle(element)
    }

    pub fn toggle(&mut self, document: &mut Document, handle: ItemHandle) -> QfResult<ItemState> {
        self.suppressor.toggle(document, &mut self.registry, handle)
    }

    /// Acts on a click whose target is (inside) an overlay control. Clicks
    /// anywhere else return `None`.
    pub fn handle_click(
        &mut self,
        document: &mut Document,
        target: NodeId,
    ) -> QfResult<Option<ClickOutcome>> {
        let Some(control) = std::iter::once(target)
            .chain(document.ancestors(target))
            .find(|node| {
                is_owned(document, *node)
                    && (document.has_class(*node, TOGGLE_CLASS) || document.has_class(*node, SAVE_CLASS))
            })
        else {
            return Ok(None);
        };

        let Some(element) = document
            .ancestors(control)
            .into_iter()
            .find_map(|node| overlay_target(document, node))
        else {
            return Ok(None);
        };

        if document.has_class(control, TOGGLE_CLASS) {
            let handle = self.registry.handle(element).ok_or_else(|| {
                QfError::new(
                    "content.click.untracked",
                    format!("overlay for element {element} belongs to an earlier session"),
                )
            })?;
            let state = self.toggle(document, handle)?;
            return Ok(Some(ClickOutcome::Toggled { element, state }));
        }

        let item = self.save_element(document, element)?;
        Ok(Some(ClickOutcome::Saved { item }))
    }

    /// Sends the element's short to the saved-item store.
    pub fn save_element(&mut self, document: &Document, element: NodeId) -> QfResult<SavedItem> {
        let item = extract_saved_item(document, element, &self.location)?;
        let response = self.bridge.send(&Request::SaveItem { item: item.clone() })?;
        expect_success(&response, "saveItem")?;
        info!(id = %item.id, "saved short");
        Ok(item)
    }

    /// Enabled flag from the background side; `true` whenever it can't be
    /// read.
    pub fn is_enabled(&mut self) -> bool {
        self.enabled_state().unwrap_or_else(|error| {
            warn!(%error, "enabled state unavailable; assuming enabled");
            true
        })
    }

    /// Undoes page-wide effects: scroll lock and panel.
    pub fn shutdown(&mut self, document: &mut Document) -> QfResult<()> {
        self.panel.remove(document);
        self.mode.disable(document).map(|_| ())
    }

    fn enabled_state(&mut self) -> QfResult<bool> {
        let response = self.bridge.send(&Request::GetEnabled)?;
        expect_success(&response, "getEnabled")?;
        Ok(response.enabled.unwrap_or(true))
    }

    fn saved_items(&mut self) -> QfResult<Vec<SavedItem>> {
        let response = self.bridge.send(&Request::GetSavedItems)?;
        expect_success(&response, "getSavedItems")?;
        Ok(response.items.unwrap_or_default())
    }

    fn refresh_saved_panel(&mut self, document: &mut Document, report: &mut PassReport) {
        let items = match self.saved_items() {
            Ok(items) => items,
            Err(error) => {
                report.fail(Stage::SavedPanel, error);
                Vec::new()
            }
        };
        match self.panel.refresh(document, &items) {
            Ok(_) => report.panel_refreshed = true,
            Err(error) => report.fail(Stage::SavedPanel, error),
        }
    }
}

fn expect_success(response: &Response, action: &str) -> QfResult<()> {
    if response.success {
        return Ok(());
    }
    Err(QfError::new(
        "content.bridge.request_failed",
        format!(
            "{action} failed: {}",
            response.error.as_deref().unwrap_or("no detail")
        ),
    ))
}

/// Builds a saved item from the first link inside `element`. The id is the
/// `v` query parameter when present, otherwise the last path segment.
pub fn extract_saved_item(
    document: &Document,
    element: NodeId,
    page_url: &str,
) -> QfResult<SavedItem> {
    let link = std::iter::once(element)
        .chain(document.descendants(element))
        .find(|node| document.tag_name(*node) == Some("a") && document.has_attribute(*node, "href"))
        .ok_or_else(|| {
            QfError::new(
                "content.save.no_link",
                format!("element {element} contains no link to save"),
            )
        })?;

    let href = document.attribute(link, "href").unwrap_or_default();
    let url = Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map_err(|error| {
            QfError::new(
                "content.save.link_invalid",
                format!("failed to resolve link `{href}` against `{page_url}`: {error}"),
            )
        })?;

    let id = url
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .or_else(|| {
            url.path_segments()
                .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
                .map(str::to_owned)
        })
        .ok_or_else(|| {
            QfError::new(
                "content.save.id_missing",
                format!("link `{url}` carries no video id"),
            )
        })?;

    let title = document
        .attribute(link, "title")
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| {
            let text = document.text_content(link).trim().to_owned();
            if text.is_empty() { id.clone() } else { text }
        });

    Ok(SavedItem {
        id,
        url: url.to_string(),
        title,
        saved_at: Utc::now(),
    })
}
