use qf_content::BackgroundService;
use qf_content::ClickOutcome;
use qf_content::ContentScript;
use qf_content::PassReport;
use qf_core::QfError;
use qf_core::QfResult;
use qf_dom::History;
use qf_dom::NodeId;
use qf_html::HtmlParser;
use qf_ipc::LocalBridge;
use qf_policy::BlockingPolicy;
use qf_policy::PipelineConfig;
use qf_storage::SavedItem;
use qf_storage::SavedItemStore;
use qf_storage::StorageConfig;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

type Script = ContentScript<LocalBridge<BackgroundService>>;

/// One scripted session over a page snapshot.
#[derive(Debug, Clone)]
pub struct Replay {
    pub html: String,
    pub url: String,
    pub navigations: Vec<String>,
    pub toggles: Vec<usize>,
    pub saves: Vec<usize>,
    pub config: PipelineConfig,
    /// `None` keeps saved items in memory.
    pub storage_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Toggle,
    Save,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub location: String,
    pub mode: &'static str,
    pub enabled: bool,
    pub matched: usize,
    pub newly_suppressed: usize,
    pub ancillary_hidden: usize,
    pub scroll_locked: bool,
    pub panel_refreshed: bool,
    pub failures: Vec<String>,
}

impl From<&PassReport> for PassSummary {
    fn from(report: &PassReport) -> Self {
        Self {
            location: report.location.clone(),
            mode: report.mode.as_str(),
            enabled: report.enabled,
            matched: report.matched,
            newly_suppressed: report.newly_suppressed,
            ancillary_hidden: report.ancillary_hidden,
            scroll_locked: report.scroll_locked,
            panel_refreshed: report.panel_refreshed,
            failures: report
                .failures
                .iter()
                .map(|failure| format!("{}: {}", failure.stage.as_str(), failure.error))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClickSummary {
    Toggled { item: usize, state: &'static str },
    Saved { item: usize, id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub location: String,
    pub passes: Vec<PassSummary>,
    pub clicks: Vec<ClickSummary>,
    pub suppressed: usize,
    pub revealed: usize,
    pub ancillary_hidden: usize,
    pub scroll_locked: bool,
    pub saved_items: Vec<SavedItem>,
}

impl Replay {
    pub fn run(self) -> QfResult<SessionSummary> {
        let store = self.open_store()?;
        let document = HtmlParser.parse(&self.html);
        let history = History::new(&self.url)?;
        let bridge = LocalBridge::new(BackgroundService::new(store))?;
        let mut script = ContentScript::new(document, history, BlockingPolicy::new(self.config), bridge);

        script.start();
        script.run_until_idle();

        let mut clicks = Vec::new();
        for index in self.toggles {
            clicks.push(click(&mut script, index, Control::Toggle)?);
        }
        for index in self.saves {
            clicks.push(click(&mut script, index, Control::Save)?);
        }
        script.run_until_idle();

        for url in &self.navigations {
            script.push_state(url)?;
            script.run_until_idle();
        }

        let registry = script.controller().registry();
        let summary = SessionSummary {
            location: script.history().location().to_owned(),
            passes: script.reports().iter().map(PassSummary::from).collect(),
            clicks,
            suppressed: registry.suppressed().len(),
            revealed: registry.revealed().len(),
            ancillary_hidden: registry.ancillary_count(),
            scroll_locked: script.controller().mode_preventer().is_active(),
            saved_items: script.controller().bridge().handler().store().list(),
        };
        info!(
            passes = summary.passes.len(),
            suppressed = summary.suppressed,
            "replay finished"
        );
        Ok(summary)
    }

    fn open_store(&self) -> QfResult<SavedItemStore> {
        let config = StorageConfig {
            max_items: self.config.saved_items.max_items,
            ephemeral_mode: self.storage_root.is_none(),
        };
        let store = SavedItemStore::new(config);
        match &self.storage_root {
            Some(root) => store.with_persistent_root(root.clone()),
            None => Ok(store),
        }
    }
}

fn click(script: &mut Script, index: usize, control: Control) -> QfResult<ClickSummary> {
    let items = script.tracked_items();
    let element = items.get(index).copied().ok_or_else(|| {
        QfError::new(
            "cli.item_out_of_range",
            format!("item {index} requested but only {} are tracked", items.len()),
        )
    })?;
    let button = control_for(script, element, control).ok_or_else(|| {
        QfError::new(
            "cli.control_missing",
            format!("item {index} has no overlay control"),
        )
    })?;

    match script.click(button)? {
        Some(ClickOutcome::Toggled { state, .. }) => Ok(ClickSummary::Toggled {
            item: index,
            state: state.as_str(),
        }),
        Some(ClickOutcome::Saved { item }) => Ok(ClickSummary::Saved {
            item: index,
            id: item.id,
        }),
        None => Err(QfError::new(
            "cli.click_ignored",
            format!("click on item {index} was not handled"),
        )),
    }
}

fn control_for(script: &Script, element: NodeId, control: Control) -> Option<NodeId> {
    match control {
        Control::Toggle => script.toggle_control(element),
        Control::Save => script.save_control(element),
    }
}

impl SessionSummary {
    pub fn to_json(&self) -> QfResult<String> {
        serde_json::to_string_pretty(self).map_err(|error| {
            QfError::new(
                "cli.summary_encode_failed",
                format!("failed to encode summary: {error}"),
            )
        })
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "location: {}", self.location);
        for (index, pass) in self.passes.iter().enumerate() {
            let _ = writeln!(
                out,
                "pass {}: {} [{}] matched={} suppressed+={} ancillary+={} scroll_locked={} panel={}",
                index.saturating_add(1),
                pass.location,
                pass.mode,
                pass.matched,
                pass.newly_suppressed,
                pass.ancillary_hidden,
                pass.scroll_locked,
                pass.panel_refreshed,
            );
            if !pass.enabled {
                let _ = writeln!(out, "  disabled");
            }
            for failure in &pass.failures {
                let _ = writeln!(out, "  failed {failure}");
            }
        }
        for click in &self.clicks {
            match click {
                ClickSummary::Toggled { item, state } => {
                    let _ = writeln!(out, "click: item {item} -> {state}");
                }
                ClickSummary::Saved { item, id } => {
                    let _ = writeln!(out, "click: item {item} saved as {id}");
                }
            }
        }
        let _ = writeln!(
            out,
            "tracked: {} suppressed, {} revealed, {} ancillary hidden",
            self.suppressed, self.revealed, self.ancillary_hidden
        );
        if self.scroll_locked {
            let _ = writeln!(out, "scrolling locked");
        }
        let _ = write!(out, "saved items: {}", self.saved_items.len());
        for item in &self.saved_items {
            let _ = write!(out, "\n  {} {}", item.id, item.url);
        }
        out
    }
}
