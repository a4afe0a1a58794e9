//! Page instance cache: generated id → page, plus a name index.

use std::collections::HashMap;

use crate::page::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u64);

#[derive(Default)]
pub struct PageArena {
    pages: HashMap<PageId, Page>,
    by_name: HashMap<String, PageId>,
    next_id: u64,
}

impl PageArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Page> {
        self.by_name
            .get(name)
            .and_then(|id| self.pages.get(id))
            .cloned()
    }

    pub fn id_of(&self, name: &str) -> Option<PageId> {
        self.by_name.get(name).copied()
    }

    pub fn by_id(&self, id: PageId) -> Option<Page> {
        self.pages.get(&id).cloned()
    }

    /// Store `page` under its page name. An already cached page of that name
    /// wins and its id is returned.
    pub fn insert(&mut self, page: Page) -> PageId {
        let name = page.page_name();
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        self.next_id += 1;
        let id = PageId(self.next_id);
        self.pages.insert(id, page);
        self.by_name.insert(name, id);
        id
    }

    /// Evict one page. The caller owns its destruction.
    pub fn remove(&mut self, name: &str) -> Option<Page> {
        let id = self.by_name.remove(name)?;
        self.pages.remove(&id)
    }

    /// Evict everything, oldest first.
    pub fn drain(&mut self) -> Vec<Page> {
        self.by_name.clear();
        let mut pages: Vec<(PageId, Page)> = self.pages.drain().collect();
        pages.sort_by_key(|(id, _)| *id);
        pages.into_iter().map(|(_, page)| page).collect()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<(PageId, String)> = self
            .by_name
            .iter()
            .map(|(name, id)| (*id, name.clone()))
            .collect();
        names.sort();
        names.into_iter().map(|(_, name)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
