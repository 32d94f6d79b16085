use crate::models::{WidgetDescriptor, WidgetDetails};

/// Read-only catalog of the widget types the host offers.
#[derive(Debug, Clone, Default)]
pub struct WidgetRegistry {
    entries: Vec<WidgetDescriptor>,
}

impl WidgetRegistry {
    pub fn new(entries: Vec<WidgetDescriptor>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, widget_type: &str) -> Option<&WidgetDescriptor> {
        if widget_type.is_empty() {
            return None;
        }
        self.entries.iter().find(|entry| entry.widget_type == widget_type)
    }

    pub fn contains(&self, widget_type: &str) -> bool {
        self.lookup(widget_type).is_some()
    }

    /// Entries in the order the host listed them, for the widget chooser.
    pub fn available_widgets(&self) -> &[WidgetDescriptor] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor derived purely from the registry, used for widgets that
    /// were just chosen locally and have nothing persisted yet.
    pub fn details_for(&self, widget_type: &str) -> Option<WidgetDetails> {
        self.lookup(widget_type).map(|entry| WidgetDetails {
            widget_type: entry.widget_type.clone(),
            title: entry.name.clone(),
            description: entry.description.clone(),
            icon: entry.icon.clone(),
        })
    }

    /// Merges fetched instance details over the registry. Fetched fields win
    /// when present; an empty fetched title pulls title, description and icon
    /// from the registry entry for the fetched type.
    pub fn merge_details(&self, base: &WidgetDetails, fetched: WidgetDetails) -> WidgetDetails {
        let mut merged = WidgetDetails {
            widget_type: pick(fetched.widget_type, &base.widget_type),
            title: pick(fetched.title, &base.title),
            description: pick(fetched.description, &base.description),
            icon: pick(fetched.icon, &base.icon),
        };

        if merged.title.is_empty() {
            if let Some(entry) = self.lookup(&merged.widget_type) {
                merged.title = entry.name.clone();
                merged.description = entry.description.clone();
                merged.icon = entry.icon.clone();
            }
        }
        merged
    }
}

fn pick(fetched: String, fallback: &str) -> String {
    if fetched.is_empty() {
        fallback.to_string()
    } else {
        fetched
    }
}
