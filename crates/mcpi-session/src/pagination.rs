//! Per-category cursor stores for paginated listings.

use mcpi_core::{ListCategory, ListItem, ListPage, ToolDescriptor};
use serde::Serialize;
use std::collections::BTreeMap;

/// Accumulated items and continuation cursor for one listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    accumulated: Vec<ListItem>,
    next_cursor: Option<String>,
}

impl PaginationState {
    /// Items collected so far, in page order.
    pub fn accumulated(&self) -> &[ListItem] {
        &self.accumulated
    }

    /// Cursor for the next page; `None` means no further pages (or nothing fetched yet).
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub(crate) fn append(&mut self, page: ListPage<ListItem>) {
        self.accumulated.extend(page.items);
        self.next_cursor = page.next_cursor;
    }

    pub(crate) fn clear(&mut self) {
        self.accumulated.clear();
        self.next_cursor = None;
    }
}

/// The full set of cursor stores owned by one connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct PaginationStore {
    states: BTreeMap<ListCategory, PaginationState>,
}

impl PaginationStore {
    pub(crate) fn get(&self, category: ListCategory) -> PaginationState {
        self.states.get(&category).cloned().unwrap_or_default()
    }

    pub(crate) fn cursor(&self, category: ListCategory) -> Option<String> {
        self.states
            .get(&category)
            .and_then(|state| state.next_cursor.clone())
    }

    pub(crate) fn append(&mut self, category: ListCategory, page: ListPage<ListItem>) {
        self.states.entry(category).or_default().append(page);
    }

    pub(crate) fn clear(&mut self, category: ListCategory) {
        if let Some(state) = self.states.get_mut(&category) {
            state.clear();
        }
    }

    pub(crate) fn clear_all(&mut self) {
        self.states.clear();
    }

    /// Tools accumulated so far, in listing order.
    pub(crate) fn tools(&self) -> Vec<ToolDescriptor> {
        self.states
            .get(&ListCategory::Tools)
            .map(|state| {
                state
                    .accumulated
                    .iter()
                    .filter_map(ListItem::as_tool)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_page(names: &[&str], next: Option<&str>) -> ListPage<ListItem> {
        ListPage {
            items: names
                .iter()
                .map(|name| ListItem::Tool(ToolDescriptor::new(*name)))
                .collect(),
            next_cursor: next.map(str::to_string),
        }
    }

    #[test]
    fn test_pages_accumulate_in_call_order() {
        let mut store = PaginationStore::default();
        store.append(ListCategory::Tools, tool_page(&["t1", "t2"], Some("c1")));
        assert_eq!(store.cursor(ListCategory::Tools).as_deref(), Some("c1"));

        store.append(ListCategory::Tools, tool_page(&["t3"], None));
        let state = store.get(ListCategory::Tools);
        let names: Vec<_> = state.accumulated().iter().map(ListItem::name).collect();
        assert_eq!(names, vec!["t1", "t2", "t3"]);
        assert!(!state.has_more());
    }

    #[test]
    fn test_clear_only_touches_one_category() {
        let mut store = PaginationStore::default();
        store.append(ListCategory::Tools, tool_page(&["t1"], Some("c1")));
        store.append(ListCategory::Prompts, ListPage {
            items: vec![],
            next_cursor: Some("p1".into()),
        });

        store.clear(ListCategory::Tools);
        assert!(store.get(ListCategory::Tools).accumulated().is_empty());
        assert!(store.cursor(ListCategory::Tools).is_none());
        assert_eq!(store.cursor(ListCategory::Prompts).as_deref(), Some("p1"));
    }

    #[test]
    fn test_tools_mirror_accumulated_listing() {
        let mut store = PaginationStore::default();
        assert!(store.tools().is_empty());
        store.append(ListCategory::Tools, tool_page(&["a", "b"], None));
        assert_eq!(store.tools().len(), 2);
        store.clear_all();
        assert!(store.tools().is_empty());
    }
}
