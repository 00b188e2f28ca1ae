//! Inline `style` declarations attached to elements.

/// Ordered inline declarations (`name: value`) of a single element.
///
/// Property names are stored lowercase. Setting an existing property keeps its
/// original position, matching how `element.style` serializes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `style` attribute value. Malformed declarations are dropped.
    pub fn parse(input: &str) -> Self {
        let mut style = Self::new();
        for declaration in split_declarations(input) {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }
            style.set(name, value);
        }
        style
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.trim().to_ascii_lowercase();
        self.declarations
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim().to_owned();
        if let Some(slot) = self.declarations.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
            return;
        }
        self.declarations.push((name, value));
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.trim().to_ascii_lowercase();
        let index = self.declarations.iter().position(|(key, _)| *key == name)?;
        Some(self.declarations.remove(index).1)
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Serializes back to `name: value; name: value` form.
    pub fn to_css_text(&self) -> String {
        self.declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn split_declarations(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0_usize;
    let mut idx = 0_usize;
    let mut in_single = false;
    let mut in_double = false;
    let mut paren_depth = 0_u32;

    while idx < bytes.len() {
        let byte = bytes[idx];
        match byte {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'(' if !in_single && !in_double => paren_depth = paren_depth.saturating_add(1),
            b')' if !in_single && !in_double => paren_depth = paren_depth.saturating_sub(1),
            b';' if !in_single && !in_double && paren_depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx.saturating_add(1);
            }
            _ => {}
        }
        idx = idx.saturating_add(1);
    }

    if start < input.len() {
        parts.push(&input[start..]);
    }

    parts
}
