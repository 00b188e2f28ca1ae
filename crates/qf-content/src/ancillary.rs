//! One-way hiding of the immersive viewer's navigation controls.

use crate::matcher::Matcher;
use crate::registry::SessionRegistry;
use qf_core::QfResult;
use qf_dom::Document;
use qf_policy::BlockingPolicy;
use qf_policy::LocationMode;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AncillaryElementSuppressor {
    matcher: Matcher,
}

impl AncillaryElementSuppressor {
    pub fn new(matcher: Matcher) -> Self {
        Self { matcher }
    }

    pub fn from_policy(policy: &BlockingPolicy) -> Self {
        Self::new(Matcher::ancillary(policy))
    }

    pub fn applies_to(mode: LocationMode) -> bool {
        mode == LocationMode::ImmersiveViewer
    }

    /// Hides every not-yet-hidden match and returns how many were hidden now.
    /// Does nothing outside the immersive viewer.
    pub fn run(
        &self,
        document: &mut Document,
        registry: &mut SessionRegistry,
        mode: LocationMode,
    ) -> QfResult<usize> {
        if !Self::applies_to(mode) {
            return Ok(0);
        }

        let mut hidden = 0_usize;
        for node in self.matcher.find(document) {
            if registry.is_ancillary_hidden(node) {
                continue;
            }
            document.set_style_property(node, "display", "none")?;
            registry.mark_ancillary(node);
            hidden = hidden.saturating_add(1);
        }

        if hidden > 0 {
            debug!(hidden, "hid ancillary controls");
        }
        Ok(hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::AncillaryElementSuppressor;
    use crate::registry::SessionRegistry;
    use qf_dom::Document;
    use qf_policy::BlockingPolicy;
    use qf_policy::LocationMode;

    fn viewer_with_buttons() -> (Document, Vec<qf_dom::NodeId>) {
        let mut document = Document::new();
        let body = document.body();
        let mut buttons = Vec::new();
        for id in ["navigation-button-up", "navigation-button-down"] {
            let button = document.create_element("div");
            assert!(document.set_attribute(button, "id", id).is_ok());
            assert!(document.append_child(body, button).is_ok());
            buttons.push(button);
        }
        (document, buttons)
    }

    #[test]
    fn hides_each_control_once_in_the_viewer() {
        let (mut document, buttons) = viewer_with_buttons();
        let mut registry = SessionRegistry::new();
        let ancillary = AncillaryElementSuppressor::from_policy(&BlockingPolicy::default());

        let hidden = ancillary.run(&mut document, &mut registry, LocationMode::ImmersiveViewer);
        assert_eq!(hidden, Ok(2));
        for button in &buttons {
            assert_eq!(document.style_property(*button, "display"), Some("none"));
        }

        assert!(document.remove_style_property(buttons[0], "display").is_ok());
        let again = ancillary.run(&mut document, &mut registry, LocationMode::ImmersiveViewer);
        assert_eq!(again, Ok(0));
        assert_eq!(document.style_property(buttons[0], "display"), None);
    }

    #[test]
    fn idle_outside_the_viewer() {
        let (mut document, buttons) = viewer_with_buttons();
        let mut registry = SessionRegistry::new();
        let ancillary = AncillaryElementSuppressor::from_policy(&BlockingPolicy::default());

        for mode in [LocationMode::Landing, LocationMode::Other] {
            assert_eq!(ancillary.run(&mut document, &mut registry, mode), Ok(0));
        }
        assert_eq!(document.style_property(buttons[0], "display"), None);
        assert_eq!(registry.ancillary_count(), 0);
    }

    #[test]
    fn reset_allows_hiding_again() {
        let (mut document, buttons) = viewer_with_buttons();
        let mut registry = SessionRegistry::new();
        let ancillary = AncillaryElementSuppressor::from_policy(&BlockingPolicy::default());

        assert_eq!(
            ancillary.run(&mut document, &mut registry, LocationMode::ImmersiveViewer),
            Ok(2)
        );
        registry.reset_ancillary();
        assert!(document.remove_style_property(buttons[1], "display").is_ok());
        assert_eq!(
            ancillary.run(&mut document, &mut registry, LocationMode::ImmersiveViewer),
            Ok(2)
        );
        assert_eq!(document.style_property(buttons[1], "display"), Some("none"));
    }
}
